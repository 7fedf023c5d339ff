//! Masking, alignment and bookkeeping stages

pub mod offset;
pub mod mask;
pub mod expand;
pub mod processor;
pub mod batch;
pub mod reconcile;
pub mod inventory;
pub mod pipeline;

// Re-export main types
pub use offset::pixel_offset;
pub use mask::{MaskParams, QualityMaskCompositor};
pub use expand::{CanvasExpander, Placement, PlacementPolicy};
pub use processor::{FileNaming, PerFileProcessor, WorkDirs};
pub use batch::{BatchConfig, BatchOrchestrator, BatchReport, Candidate, CandidateSelection, FileFailure, MAX_CLOUD_COVER};
pub use reconcile::{CategoryCounts, MetadataReconciler, PersistedTables, ReconciledTable};
pub use inventory::{Inventory, InventoryOutput};
pub use pipeline::{align_directory, find_reference, PipelineSummary};
