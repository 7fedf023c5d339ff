use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sample values held in memory, (band x row x col)
pub type SampleCube = Array3<f64>;

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Every raster in the pipeline must be north-up: positive pixel width,
    /// negative pixel height.
    pub fn is_north_up(&self) -> bool {
        self.pixel_width > 0.0 && self.pixel_height < 0.0
    }
}

/// On-disk sample type of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleType::UInt8 => write!(f, "uint8"),
            SampleType::UInt16 => write!(f, "uint16"),
            SampleType::Int16 => write!(f, "int16"),
            SampleType::UInt32 => write!(f, "uint32"),
            SampleType::Int32 => write!(f, "int32"),
            SampleType::Float32 => write!(f, "float32"),
            SampleType::Float64 => write!(f, "float64"),
        }
    }
}

/// Spatial profile shared by a raster and anything derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geo_transform: GeoTransform,
    /// Projection as WKT, empty when the file carries none
    pub projection: String,
    pub epsg: Option<i32>,
    pub nodata: Option<f64>,
    pub sample_type: SampleType,
}

/// A raster loaded into memory. Identity is the path it was read from.
#[derive(Debug, Clone)]
pub struct Raster {
    pub path: Option<PathBuf>,
    pub profile: RasterProfile,
    pub data: SampleCube,
}

impl Raster {
    /// Build an in-memory raster, checking the data shape against the profile
    pub fn new(profile: RasterProfile, data: SampleCube) -> AlignResult<Self> {
        let expected = (profile.band_count, profile.height, profile.width);
        if data.dim() != expected {
            return Err(AlignError::InvalidFormat(format!(
                "data shape {:?} does not match profile {:?}",
                data.dim(),
                expected
            )));
        }
        Ok(Self {
            path: None,
            profile,
            data,
        })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.profile.width, self.profile.height)
    }

    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// What the per-file processor did to one scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub masked: bool,
    pub expanded: bool,
}

impl BatchOutcome {
    pub fn new(masked: bool, expanded: bool) -> Self {
        Self { masked, expanded }
    }

    pub fn category(&self) -> OutcomeCategory {
        match (self.masked, self.expanded) {
            (true, true) => OutcomeCategory::MaskedExpanded,
            (true, false) => OutcomeCategory::MaskedOnly,
            (false, true) => OutcomeCategory::ExpandedOnly,
            (false, false) => OutcomeCategory::Untouched,
        }
    }
}

/// The four mutually exclusive mask/expand combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeCategory {
    MaskedExpanded,
    MaskedOnly,
    ExpandedOnly,
    Untouched,
}

impl OutcomeCategory {
    pub const ALL: [OutcomeCategory; 4] = [
        OutcomeCategory::MaskedExpanded,
        OutcomeCategory::MaskedOnly,
        OutcomeCategory::ExpandedOnly,
        OutcomeCategory::Untouched,
    ];
}

impl std::fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeCategory::MaskedExpanded => write!(f, "masked and expanded"),
            OutcomeCategory::MaskedOnly => write!(f, "masked and not expanded"),
            OutcomeCategory::ExpandedOnly => write!(f, "not masked and expanded"),
            OutcomeCategory::Untouched => write!(f, "not masked and not expanded"),
        }
    }
}

/// Error types for masking and alignment
#[derive(Debug, thiserror::Error)]
pub enum AlignError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image is {image_width}x{image_height} but its quality mask is {mask_width}x{mask_height}")]
    DimensionMismatch {
        image_width: usize,
        image_height: usize,
        mask_width: usize,
        mask_height: usize,
    },

    #[error("No quality mask for {image}: expected {expected}")]
    MissingCompanionFile { image: String, expected: PathBuf },

    #[error("No metadata row for file: {0}")]
    MetadataKeyMissing(String),

    #[error(
        "Placement at offset ({offset_x}, {offset_y}) of a {source_width}x{source_height} raster \
         exceeds the {canvas_width}x{canvas_height} canvas"
    )]
    OutOfBoundsPlacement {
        offset_x: i64,
        offset_y: i64,
        source_width: usize,
        source_height: usize,
        canvas_width: usize,
        canvas_height: usize,
    },

    #[error("Source has {source_bands} bands but the reference canvas only {reference_bands}")]
    BandCountExceeded {
        source_bands: usize,
        reference_bands: usize,
    },

    #[error("Processing failed for {filename}: {source}")]
    WorkerTaskFailure {
        filename: String,
        #[source]
        source: Box<AlignError>,
    },
}

/// Result type for alignment operations
pub type AlignResult<T> = Result<T, AlignError>;
