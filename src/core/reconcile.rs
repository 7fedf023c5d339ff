use crate::io::{derived_table_path, FileQualityRecord, MetadataTable};
use crate::types::{AlignResult, BatchOutcome, OutcomeCategory};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Counts of the four mutually exclusive mask/expand combinations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub masked_expanded: usize,
    pub masked_only: usize,
    pub expanded_only: usize,
    pub untouched: usize,
}

impl CategoryCounts {
    pub fn from_outcomes<I: IntoIterator<Item = BatchOutcome>>(outcomes: I) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            counts.add(outcome);
        }
        counts
    }

    pub fn add(&mut self, outcome: BatchOutcome) {
        match outcome.category() {
            OutcomeCategory::MaskedExpanded => self.masked_expanded += 1,
            OutcomeCategory::MaskedOnly => self.masked_only += 1,
            OutcomeCategory::ExpandedOnly => self.expanded_only += 1,
            OutcomeCategory::Untouched => self.untouched += 1,
        }
    }

    pub fn get(&self, category: OutcomeCategory) -> usize {
        match category {
            OutcomeCategory::MaskedExpanded => self.masked_expanded,
            OutcomeCategory::MaskedOnly => self.masked_only,
            OutcomeCategory::ExpandedOnly => self.expanded_only,
            OutcomeCategory::Untouched => self.untouched,
        }
    }

    pub fn total(&self) -> usize {
        self.masked_expanded + self.masked_only + self.expanded_only + self.untouched
    }
}

impl std::fmt::Display for CategoryCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "masked+expanded: {}, masked only: {}, expanded only: {}, neither: {}",
            self.masked_expanded, self.masked_only, self.expanded_only, self.untouched
        )
    }
}

/// Metadata rows below the cloud-cover ceiling with Masked/Expanded filled in
#[derive(Debug, Clone)]
pub struct ReconciledTable {
    pub table: MetadataTable,
    pub counts: CategoryCounts,
    /// Rows whose flags came from an earlier run's outcome record
    pub restored_from_ledger: usize,
}

/// Paths written by `ReconciledTable::persist`
#[derive(Debug, Clone)]
pub struct PersistedTables {
    pub expanded: PathBuf,
    pub reference_candidates: PathBuf,
}

impl ReconciledTable {
    /// Untouched, full-extent, fully confident standard scenes
    pub fn reference_candidates(&self) -> MetadataTable {
        self.table.filtered(FileQualityRecord::is_reference_candidate)
    }

    /// Write `<stem>_expanded.csv` and `<stem>_reference_candidates.csv` next
    /// to the source table
    pub fn persist(&self, table_path: &Path) -> AlignResult<PersistedTables> {
        let expanded = derived_table_path(table_path, "_expanded");
        let reference_candidates = derived_table_path(table_path, "_reference_candidates");

        self.table.write_csv(&expanded, true)?;
        let candidates = self.reference_candidates();
        candidates.write_csv(&reference_candidates, true)?;
        log::info!("{} reference candidates", candidates.len());

        Ok(PersistedTables {
            expanded,
            reference_candidates,
        })
    }
}

/// Merges batch outcomes back into the metadata table
pub struct MetadataReconciler {
    max_cloud_cover: f64,
}

impl MetadataReconciler {
    pub fn new(max_cloud_cover: f64) -> Self {
        Self { max_cloud_cover }
    }

    /// Restrict the table to rows below the cloud-cover ceiling and set their
    /// Masked/Expanded flags. Outcomes of this run win; rows without one take
    /// the outcome recorded by an earlier run (`prior`), else 0/0.
    pub fn reconcile(
        &self,
        original: &MetadataTable,
        outcomes: &HashMap<String, BatchOutcome>,
        prior: &HashMap<String, BatchOutcome>,
    ) -> AlignResult<ReconciledTable> {
        let mut table = original.below_cloud_cover(self.max_cloud_cover);
        log::info!(
            "Dataframes; len of original: {}, len of filtered: {}",
            original.len(),
            table.len()
        );

        let names: Vec<String> = table.iter().map(|r| r.file_name.clone()).collect();
        for name in &names {
            table.get_mut(name)?.set_outcome(BatchOutcome::default());
        }

        for (name, outcome) in outcomes {
            table.get_mut(name)?.set_outcome(*outcome);
        }

        let mut restored_from_ledger = 0;
        for name in &names {
            if outcomes.contains_key(name) {
                continue;
            }
            if let Some(outcome) = prior.get(name) {
                table.get_mut(name)?.set_outcome(*outcome);
                restored_from_ledger += 1;
            }
        }

        let counts = CategoryCounts::from_outcomes(table.iter().map(FileQualityRecord::outcome));
        for category in OutcomeCategory::ALL {
            log::info!("num files {}: {}", category, counts.get(category));
        }

        Ok(ReconciledTable {
            table,
            counts,
            restored_from_ledger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlignError;

    fn record(name: &str, cloud_cover: f64, fullest: u8, clear: f64, quality: &str) -> FileQualityRecord {
        FileQualityRecord {
            file_name: name.to_string(),
            width: 8,
            height: 8,
            band_count: 4,
            epsg: Some(32610),
            clear_confidence_percent: clear,
            cloud_cover,
            heavy_haze_percent: 0.0,
            quality_category: quality.to_string(),
            visible_confidence_percent: 100.0,
            fullest,
            masked: None,
            expanded: None,
        }
    }

    fn table() -> MetadataTable {
        MetadataTable::new(vec![
            record("a.tif", 0.00, 1, 100.0, "standard"),
            record("b.tif", 0.05, 0, 100.0, "standard"),
            record("c.tif", 0.50, 1, 100.0, "standard"),
            record("d.tif", 0.02, 1, 98.0, "standard"),
            record("e.tif", 0.01, 1, 100.0, "test"),
            record("f.tif", 0.09, 0, 90.0, "standard"),
        ])
        .unwrap()
    }

    #[test]
    fn test_counts_cover_every_row_below_threshold() {
        let outcomes: HashMap<_, _> = [
            ("a.tif".to_string(), BatchOutcome::new(false, false)),
            ("b.tif".to_string(), BatchOutcome::new(true, true)),
            ("d.tif".to_string(), BatchOutcome::new(true, false)),
        ]
        .into_iter()
        .collect();

        let reconciled = MetadataReconciler::new(0.1)
            .reconcile(&table(), &outcomes, &HashMap::new())
            .unwrap();

        assert_eq!(reconciled.table.len(), 5);
        assert!(!reconciled.table.contains("c.tif"));
        assert_eq!(reconciled.counts.total(), reconciled.table.len());
        assert_eq!(
            reconciled.counts,
            CategoryCounts {
                masked_expanded: 1,
                masked_only: 1,
                expanded_only: 0,
                untouched: 3,
            }
        );
        assert_eq!(reconciled.table.get("e.tif").unwrap().masked, Some(0));
    }

    #[test]
    fn test_reference_candidates_filter() {
        let outcomes: HashMap<_, _> = [
            ("a.tif".to_string(), BatchOutcome::new(false, false)),
            ("d.tif".to_string(), BatchOutcome::new(false, false)),
            ("e.tif".to_string(), BatchOutcome::new(false, false)),
        ]
        .into_iter()
        .collect();

        let reconciled = MetadataReconciler::new(0.1)
            .reconcile(&table(), &outcomes, &HashMap::new())
            .unwrap();
        let candidates = reconciled.reference_candidates();

        // d fails on confidence, e on quality, b and f are not full extent
        assert_eq!(candidates.len(), 1);
        assert!(candidates.contains("a.tif"));
    }

    #[test]
    fn test_prior_outcomes_fill_skipped_rows() {
        let outcomes: HashMap<_, _> = [("a.tif".to_string(), BatchOutcome::new(false, false))]
            .into_iter()
            .collect();
        let prior: HashMap<_, _> = [
            ("a.tif".to_string(), BatchOutcome::new(true, true)),
            ("b.tif".to_string(), BatchOutcome::new(true, true)),
        ]
        .into_iter()
        .collect();

        let reconciled = MetadataReconciler::new(0.1)
            .reconcile(&table(), &outcomes, &prior)
            .unwrap();

        assert_eq!(reconciled.restored_from_ledger, 1);
        assert_eq!(reconciled.table.get("a.tif").unwrap().outcome(), BatchOutcome::new(false, false));
        assert_eq!(reconciled.table.get("b.tif").unwrap().outcome(), BatchOutcome::new(true, true));
    }

    #[test]
    fn test_outcome_for_excluded_row_is_an_error() {
        let outcomes: HashMap<_, _> = [("c.tif".to_string(), BatchOutcome::new(true, true))]
            .into_iter()
            .collect();
        let result = MetadataReconciler::new(0.1).reconcile(&table(), &outcomes, &HashMap::new());
        assert!(matches!(result, Err(AlignError::MetadataKeyMissing(name)) if name == "c.tif"));
    }

    #[test]
    fn test_persist_writes_both_views() {
        let dir = tempfile::tempdir().unwrap();
        let table_path = dir.path().join("downloaded_files_info.csv");
        let reconciled = MetadataReconciler::new(0.1)
            .reconcile(&table(), &HashMap::new(), &HashMap::new())
            .unwrap();

        let written = reconciled.persist(&table_path).unwrap();
        assert_eq!(written.expanded, dir.path().join("downloaded_files_info_expanded.csv"));

        let candidates = MetadataTable::read_csv(&written.reference_candidates).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates.get("a.tif").unwrap().masked, Some(0));
    }

    #[test]
    fn test_empty_candidate_view_keeps_outcome_columns() {
        let dir = tempfile::tempdir().unwrap();
        let table_path = dir.path().join("info.csv");
        let table = MetadataTable::new(vec![record("f.tif", 0.05, 0, 90.0, "standard")]).unwrap();
        let reconciled = MetadataReconciler::new(0.1)
            .reconcile(&table, &HashMap::new(), &HashMap::new())
            .unwrap();
        assert!(reconciled.reference_candidates().is_empty());

        let written = reconciled.persist(&table_path).unwrap();
        for path in [&written.expanded, &written.reference_candidates] {
            let content = std::fs::read_to_string(path).unwrap();
            let header = content.lines().next().unwrap();
            assert!(header.ends_with(",Fullest,Masked,Expanded"), "{}", header);
        }
        assert_eq!(
            std::fs::read_to_string(&written.reference_candidates)
                .unwrap()
                .lines()
                .count(),
            1
        );
    }

    #[test]
    fn test_counts_by_category() {
        let counts = CategoryCounts::from_outcomes([
            BatchOutcome::new(true, true),
            BatchOutcome::new(false, true),
            BatchOutcome::new(false, true),
        ]);
        assert_eq!(counts.get(OutcomeCategory::ExpandedOnly), 2);
        assert_eq!(counts.get(OutcomeCategory::Untouched), 0);
        assert_eq!(
            OutcomeCategory::ALL.iter().map(|c| counts.get(*c)).sum::<usize>(),
            counts.total()
        );
    }
}
