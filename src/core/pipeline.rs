use crate::core::batch::{BatchConfig, BatchOrchestrator, BatchReport};
use crate::core::reconcile::{CategoryCounts, MetadataReconciler, PersistedTables};
use crate::io::{MetadataTable, OutcomeLedger};
use crate::types::{AlignError, AlignResult};
use std::path::{Path, PathBuf};

/// Everything an alignment run produced
#[derive(Debug)]
pub struct PipelineSummary {
    pub reference_path: PathBuf,
    pub batch: BatchReport,
    /// Category counts over every reconciled row, not only this run's
    pub counts: CategoryCounts,
    pub reconciled_rows: usize,
    pub tables: PersistedTables,
}

impl PipelineSummary {
    pub fn is_success(&self) -> bool {
        self.batch.is_success()
    }
}

impl std::fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "considered: {}, succeeded: {}, failed: {}, skipped (already processed): {} | {}",
            self.batch.considered,
            self.batch.succeeded(),
            self.batch.failed(),
            self.batch.already_processed.len(),
            self.counts
        )
    }
}

/// First pristine full-extent scene of the table that exists in `input_dir`
pub fn find_reference(table: &MetadataTable, input_dir: &Path) -> Option<PathBuf> {
    table
        .iter()
        .filter(|r| r.is_pristine())
        .map(|r| input_dir.join(&r.file_name))
        .find(|path| path.is_file())
}

/// Mask, align and reconcile one directory of scenes against its metadata table
pub fn align_directory(mut config: BatchConfig, table_path: &Path) -> AlignResult<PipelineSummary> {
    let table = MetadataTable::read_csv(table_path)?;

    let reference_path = match config.reference_path.clone() {
        Some(path) => path,
        None => {
            let found = find_reference(&table, &config.input_dir).ok_or_else(|| {
                AlignError::Config(format!(
                    "No reference given and no pristine full-extent scene listed in {}",
                    table_path.display()
                ))
            })?;
            log::info!("Using reference candidate {}", found.display());
            config.reference_path = Some(found.clone());
            found
        }
    };

    let orchestrator = BatchOrchestrator::new(config);
    let batch = orchestrator.run(&table)?;

    let config = orchestrator.config();
    // Only outputs still on disk vouch for their recorded outcome
    let mut prior = OutcomeLedger::new(&config.output_dir).load_all()?;
    prior.retain(|name, _| config.output_dir.join(name).is_file());
    let reconciled = MetadataReconciler::new(config.max_cloud_cover).reconcile(
        &table,
        &batch.outcome_map(),
        &prior,
    )?;
    if reconciled.restored_from_ledger > 0 {
        log::info!(
            "{} rows took their flags from earlier runs",
            reconciled.restored_from_ledger
        );
    }
    let tables = reconciled.persist(table_path)?;

    let summary = PipelineSummary {
        reference_path,
        counts: reconciled.counts,
        reconciled_rows: reconciled.table.len(),
        tables,
        batch,
    };
    log::info!("This run: {}", summary.batch.category_counts());
    for failure in &summary.batch.failures {
        log::error!("{}: {}", failure.file_name, failure.error);
    }
    log::info!("{}", summary);
    Ok(summary)
}
