use crate::core::expand::{CanvasExpander, PlacementPolicy};
use crate::core::mask::{MaskParams, QualityMaskCompositor};
use crate::core::processor::{FileNaming, PerFileProcessor, WorkDirs};
use crate::core::reconcile::CategoryCounts;
use crate::io::{MetadataTable, RasterReader};
use crate::types::{AlignError, AlignResult, BatchOutcome};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default cloud-cover ceiling; scenes at or above it are never processed
pub const MAX_CLOUD_COVER: f64 = 0.1;

const MASKED_DIR_NAME: &str = "masked_files";

/// Batch alignment configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    /// Parent of the transient masked-files directory
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Full-extent raster defining the output canvas
    pub reference_path: Option<PathBuf>,
    pub max_cloud_cover: f64,
    pub num_workers: usize,
    pub naming: FileNaming,
    pub mask: MaskParams,
    pub placement: PlacementPolicy,
}

impl BatchConfig {
    pub fn new<P: Into<PathBuf>>(input_dir: P, temp_dir: P, output_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            temp_dir: temp_dir.into(),
            output_dir: output_dir.into(),
            reference_path: None,
            max_cloud_cover: MAX_CLOUD_COVER,
            num_workers: default_workers(),
            naming: FileNaming::default(),
            mask: MaskParams::default(),
            placement: PlacementPolicy::default(),
        }
    }

    pub fn masked_dir(&self) -> PathBuf {
        self.temp_dir.join(MASKED_DIR_NAME)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A scene selected for processing
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub file_name: String,
    pub is_fullest: bool,
}

/// Result of scanning the input directory against the metadata table
#[derive(Debug, Default)]
pub struct CandidateSelection {
    pub candidates: Vec<Candidate>,
    /// Images whose output already exists
    pub already_processed: Vec<String>,
    /// Images at or above the cloud-cover ceiling
    pub too_cloudy: Vec<String>,
    /// Images with no metadata row
    pub missing_metadata: Vec<String>,
}

/// Per-file failure, with the file it happened on
#[derive(Debug)]
pub struct FileFailure {
    pub file_name: String,
    pub error: AlignError,
}

/// Outcome of one batch pass
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Scenes that passed the eligibility filter, including those that
    /// failed before dispatch
    pub considered: usize,
    pub outcomes: Vec<(String, BatchOutcome)>,
    pub failures: Vec<FileFailure>,
    pub already_processed: Vec<String>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn outcome_map(&self) -> HashMap<String, BatchOutcome> {
        self.outcomes.iter().cloned().collect()
    }

    pub fn category_counts(&self) -> CategoryCounts {
        CategoryCounts::from_outcomes(self.outcomes.iter().map(|(_, outcome)| *outcome))
    }
}

/// Selects eligible scenes and runs the per-file processor over a worker pool
pub struct BatchOrchestrator {
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Scan the input directory (sorted by name). A file is a candidate iff it
    /// carries the image suffix, has no output yet and its cloud cover is
    /// strictly below the ceiling.
    pub fn select_candidates(&self, table: &MetadataTable) -> AlignResult<CandidateSelection> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.config.input_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut selection = CandidateSelection::default();
        for name in names {
            if !self.config.naming.is_image(&name) {
                continue;
            }
            if self.config.output_dir.join(&name).exists() {
                selection.already_processed.push(name);
                continue;
            }
            match table.get(&name) {
                Ok(record) if record.cloud_cover < self.config.max_cloud_cover => {
                    selection.candidates.push(Candidate {
                        is_fullest: record.is_fullest(),
                        file_name: name,
                    });
                }
                Ok(_) => selection.too_cloudy.push(name),
                Err(_) => {
                    log::warn!("No metadata row for {}, cannot decide eligibility", name);
                    selection.missing_metadata.push(name);
                }
            }
        }
        Ok(selection)
    }

    /// Run one pass. Pipeline-level problems (missing directories or reference)
    /// abort before any work is dispatched; per-file errors are collected in
    /// the report.
    pub fn run(&self, table: &MetadataTable) -> AlignResult<BatchReport> {
        let config = &self.config;
        log::info!("Running for dir: {}", config.input_dir.display());

        if !config.input_dir.is_dir() {
            return Err(AlignError::Config(format!(
                "Input directory does not exist: {}",
                config.input_dir.display()
            )));
        }
        if config.num_workers == 0 {
            return Err(AlignError::Config("Worker count must be positive".to_string()));
        }
        let reference_path = config
            .reference_path
            .as_ref()
            .ok_or_else(|| AlignError::Config("No reference full-extent file configured".to_string()))?;
        if !reference_path.is_file() {
            return Err(AlignError::Config(format!(
                "Reference file does not exist: {}",
                reference_path.display()
            )));
        }
        let reference = RasterReader::profile(reference_path)?;
        log::info!(
            "Reference canvas {}: {}x{}, {} bands",
            reference_path.display(),
            reference.width,
            reference.height,
            reference.band_count
        );

        let masked_dir = config.masked_dir();
        std::fs::create_dir_all(&masked_dir)?;
        std::fs::create_dir_all(&config.output_dir)?;

        let selection = self.select_candidates(table)?;
        log::info!(
            "No of files to process: {} ({} already processed, {} above cloud cover {})",
            selection.candidates.len(),
            selection.already_processed.len(),
            selection.too_cloudy.len(),
            config.max_cloud_cover
        );

        let processor = PerFileProcessor::new(
            WorkDirs {
                input_dir: config.input_dir.clone(),
                output_dir: config.output_dir.clone(),
                masked_dir: masked_dir.clone(),
            },
            config.naming.clone(),
            reference,
            QualityMaskCompositor::new(config.mask.clone()),
            CanvasExpander::new(config.placement),
        );

        let results = self.dispatch(&processor, &selection.candidates)?;
        log::info!("All files processed, len: {}", results.len());

        // Pool join above is the barrier for the transient directory
        if masked_dir.exists() {
            log::info!("Deleting: {}", masked_dir.display());
            std::fs::remove_dir_all(&masked_dir)?;
        }

        let mut report = BatchReport {
            considered: selection.candidates.len() + selection.missing_metadata.len(),
            already_processed: selection.already_processed,
            ..Default::default()
        };
        for name in selection.missing_metadata {
            report.failures.push(FileFailure {
                error: AlignError::MetadataKeyMissing(name.clone()),
                file_name: name,
            });
        }
        for (file_name, result) in results {
            match result {
                Ok(outcome) => report.outcomes.push((file_name, outcome)),
                Err(error) => {
                    log::error!("Failed to process {}: {}", file_name, error);
                    report.failures.push(FileFailure {
                        error: AlignError::WorkerTaskFailure {
                            filename: file_name.clone(),
                            source: Box::new(error),
                        },
                        file_name,
                    });
                }
            }
        }

        Ok(report)
    }

    #[cfg(feature = "parallel")]
    fn dispatch(
        &self,
        processor: &PerFileProcessor,
        candidates: &[Candidate],
    ) -> AlignResult<Vec<(String, AlignResult<BatchOutcome>)>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_workers)
            .build()
            .map_err(|e| AlignError::Config(format!("Failed to build worker pool: {}", e)))?;
        log::debug!("Dispatching {} files on {} workers", candidates.len(), self.config.num_workers);

        Ok(pool.install(|| {
            candidates
                .par_iter()
                .map(|c| (c.file_name.clone(), processor.process(&c.file_name, c.is_fullest)))
                .collect()
        }))
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch(
        &self,
        processor: &PerFileProcessor,
        candidates: &[Candidate],
    ) -> AlignResult<Vec<(String, AlignResult<BatchOutcome>)>> {
        Ok(candidates
            .iter()
            .map(|c| (c.file_name.clone(), processor.process(&c.file_name, c.is_fullest)))
            .collect())
    }
}
