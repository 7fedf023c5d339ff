#![allow(dead_code)]

use ndarray::Array3;
use scenealign::io::{FileQualityRecord, MetadataTable};
use scenealign::{GeoTransform, Raster, RasterProfile, RasterWriter, SampleType};
use std::path::Path;

pub const ORIGIN_X: f64 = 500_000.0;
pub const ORIGIN_Y: f64 = 4_000_000.0;
pub const PIXEL: f64 = 3.0;

pub const IMAGE_SUFFIX: &str = "3B_AnalyticMS_SR_harmonized_clip_reproject.tif";
pub const MASK_SUFFIX: &str = "3B_udm2_clip_reproject.tif";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn image_name(scene: &str) -> String {
    format!("{}_{}", scene, IMAGE_SUFFIX)
}

pub fn mask_name(scene: &str) -> String {
    format!("{}_{}", scene, MASK_SUFFIX)
}

/// Profile of a north-up raster whose top-left pixel sits `col`/`row`
/// pixels away from the shared origin
pub fn profile(bands: usize, height: usize, width: usize, col: usize, row: usize, sample_type: SampleType) -> RasterProfile {
    RasterProfile {
        width,
        height,
        band_count: bands,
        geo_transform: GeoTransform::north_up(
            ORIGIN_X + col as f64 * PIXEL,
            ORIGIN_Y - row as f64 * PIXEL,
            PIXEL,
            -PIXEL,
        ),
        projection: String::new(),
        epsg: None,
        nodata: None,
        sample_type,
    }
}

/// 4-band uint16 image with distinct, non-zero samples
pub fn write_image(path: &Path, height: usize, width: usize, col: usize, row: usize) -> Raster {
    let data = Array3::from_shape_fn((4, height, width), |(b, r, c)| (1000 * (b + 1) + 10 * r + c) as f64);
    let raster = Raster::new(profile(4, height, width, col, row, SampleType::UInt16), data).unwrap();
    RasterWriter::write(path, &raster).unwrap();
    raster
}

/// 8-band uint8 quality mask flagging the given (band, row, col) pixels
pub fn write_mask(path: &Path, height: usize, width: usize, col: usize, row: usize, invalid: &[(usize, usize, usize)]) {
    let mut data = Array3::<f64>::zeros((8, height, width));
    for &(band, r, c) in invalid {
        data[[band, r, c]] = 1.0;
    }
    let raster = Raster::new(profile(8, height, width, col, row, SampleType::UInt8), data).unwrap();
    RasterWriter::write(path, &raster).unwrap();
}

pub fn record(name: &str, width: usize, height: usize, cloud_cover: f64, fullest: u8) -> FileQualityRecord {
    FileQualityRecord {
        file_name: name.to_string(),
        width,
        height,
        band_count: 4,
        epsg: None,
        clear_confidence_percent: 100.0,
        cloud_cover,
        heavy_haze_percent: 0.0,
        quality_category: "standard".to_string(),
        visible_confidence_percent: 100.0,
        fullest,
        masked: None,
        expanded: None,
    }
}

pub fn write_table(path: &Path, records: Vec<FileQualityRecord>) -> MetadataTable {
    let table = MetadataTable::new(records).unwrap();
    table.write_csv(path, false).unwrap();
    table
}
