//! scenealign: cloud masking and canvas alignment for satellite scene batches
//!
//! Takes a directory of georeferenced scenes with companion quality masks,
//! blanks unusable pixels, places every partial-extent scene onto the grid of
//! a full-extent reference and keeps the per-scene metadata table in step.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AlignError, AlignResult, BatchOutcome, GeoTransform, OutcomeCategory, Raster, RasterProfile,
    SampleType,
};

pub use crate::io::{MetadataTable, RasterReader, RasterWriter};
pub use crate::core::{
    align_directory, pixel_offset, BatchConfig, BatchOrchestrator, CanvasExpander, Inventory,
    MetadataReconciler, PlacementPolicy, QualityMaskCompositor,
};

#[cfg(feature = "python")]
mod python {
    use crate::{align_directory, pixel_offset, AlignError, BatchConfig, GeoTransform, Inventory};
    use pyo3::prelude::*;
    use std::path::PathBuf;

    fn to_py_err(e: AlignError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(offset, m)?)?;
        m.add_function(wrap_pyfunction!(align, m)?)?;
        m.add_function(wrap_pyfunction!(inventory, m)?)?;
        Ok(())
    }

    /// Pixel offset of a small raster inside a big one, from GDAL geotransforms
    #[pyfunction]
    fn offset(small: [f64; 6], big: [f64; 6]) -> (i64, i64) {
        pixel_offset(&GeoTransform::from_gdal(small), &GeoTransform::from_gdal(big))
    }

    /// Run the alignment pipeline; returns the four category counts
    #[pyfunction]
    #[pyo3(signature = (input_dir, temp_dir, output_dir, table, reference=None, max_cloud_cover=0.1, workers=None))]
    #[allow(clippy::too_many_arguments)]
    fn align(
        input_dir: String,
        temp_dir: String,
        output_dir: String,
        table: String,
        reference: Option<String>,
        max_cloud_cover: f64,
        workers: Option<usize>,
    ) -> PyResult<(usize, usize, usize, usize)> {
        let mut config = BatchConfig::new(input_dir, temp_dir, output_dir);
        config.reference_path = reference.map(PathBuf::from);
        config.max_cloud_cover = max_cloud_cover;
        if let Some(n) = workers {
            config.num_workers = n;
        }

        let summary = align_directory(config, &PathBuf::from(table)).map_err(to_py_err)?;
        let c = summary.counts;
        Ok((c.masked_expanded, c.masked_only, c.expanded_only, c.untouched))
    }

    /// Build and persist the metadata table for a scene directory
    #[pyfunction]
    fn inventory(images_dir: String, table: String) -> PyResult<Vec<String>> {
        let inventory = Inventory::default();
        let images_dir = PathBuf::from(images_dir);
        let scanned = inventory.scan(&images_dir).map_err(to_py_err)?;
        let output = inventory
            .write(&scanned, &PathBuf::from(table), &images_dir, None)
            .map_err(to_py_err)?;
        Ok(output.pristine)
    }
}
