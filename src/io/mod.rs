//! I/O modules for rasters, the metadata table and per-scene sidecars

pub mod raster;
pub mod metadata_table;
pub mod scene_metadata;
pub mod outcome_ledger;

pub use raster::{RasterReader, RasterWriter};
pub use metadata_table::{FileQualityRecord, MetadataTable, derived_table_path};
pub use scene_metadata::{SceneMetadataReader, SceneProperties};
pub use outcome_ledger::{OutcomeLedger, OutcomeRecord};
