use crate::types::{AlignResult, BatchOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const LEDGER_DIR: &str = ".outcomes";

/// Outcome of one processed file, persisted next to its output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub file_name: String,
    pub masked: bool,
    pub expanded: bool,
    pub processed_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome::new(self.masked, self.expanded)
    }
}

/// Per-file outcome sidecars under `<output_dir>/.outcomes/`.
///
/// Each worker writes only its own sidecar, so no coordination is needed.
#[derive(Debug, Clone)]
pub struct OutcomeLedger {
    dir: PathBuf,
}

impl OutcomeLedger {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            dir: output_dir.as_ref().join(LEDGER_DIR),
        }
    }

    fn record_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_name))
    }

    pub fn record(&self, file_name: &str, outcome: BatchOutcome) -> AlignResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let record = OutcomeRecord {
            file_name: file_name.to_string(),
            masked: outcome.masked,
            expanded: outcome.expanded,
            processed_at: Utc::now(),
        };
        std::fs::write(self.record_path(file_name), serde_json::to_vec_pretty(&record)?)?;
        Ok(())
    }

    fn read_record(path: &Path) -> AlignResult<OutcomeRecord> {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Every recorded outcome; unreadable sidecars are skipped with a warning
    pub fn load_all(&self) -> AlignResult<HashMap<String, BatchOutcome>> {
        let mut outcomes = HashMap::new();
        if !self.dir.is_dir() {
            return Ok(outcomes);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) => {
                    outcomes.insert(record.file_name.clone(), record.outcome());
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable outcome record {}: {}", path.display(), e);
                }
            }
        }
        Ok(outcomes)
    }

    /// Drop the record of a file whose output is gone or never landed
    pub fn forget(&self, file_name: &str) -> AlignResult<()> {
        let path = self.record_path(file_name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = OutcomeLedger::new(dir.path());

        assert!(ledger.load_all().unwrap().is_empty());
        ledger.record("a_harmonized.tif", BatchOutcome::new(true, false)).unwrap();
        ledger.record("b_harmonized.tif", BatchOutcome::new(false, true)).unwrap();

        let all = ledger.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a_harmonized.tif"], BatchOutcome::new(true, false));

        assert_eq!(all["b_harmonized.tif"], BatchOutcome::new(false, true));

        ledger.forget("a_harmonized.tif").unwrap();
        ledger.forget("never_recorded.tif").unwrap();
        let remaining = ledger.load_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains_key("a_harmonized.tif"));
    }
}
