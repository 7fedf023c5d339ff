use crate::types::{AlignError, AlignResult, BatchOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Quality category of a scene that is fit to become an alignment reference
pub const STANDARD_QUALITY: &str = "standard";

/// Columns of a table built by the inventory, in write order
const BASE_COLUMNS: [&str; 11] = [
    "File Name",
    "Width",
    "Height",
    "Count",
    "Epsg",
    "clear_confidence_percent",
    "cloud_cover",
    "heavy_haze_percent",
    "quality_category",
    "visible_confidence_percent",
    "Fullest",
];

const OUTCOME_COLUMNS: [&str; 2] = ["Masked", "Expanded"];

const LEGACY_CLEAR_COLUMN: &str = "clear_conf_perc";

fn is_typed_column(column: &str) -> bool {
    BASE_COLUMNS.contains(&column) || OUTCOME_COLUMNS.contains(&column) || column == LEGACY_CLEAR_COLUMN
}

fn unknown_percent() -> f64 {
    -1.0
}

/// One row of the metadata table, keyed by file name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileQualityRecord {
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Width", default)]
    pub width: usize,
    #[serde(rename = "Height", default)]
    pub height: usize,
    #[serde(rename = "Count", default)]
    pub band_count: usize,
    #[serde(rename = "Epsg", default)]
    pub epsg: Option<i32>,
    #[serde(alias = "clear_conf_perc", default = "unknown_percent")]
    pub clear_confidence_percent: f64,
    pub cloud_cover: f64,
    #[serde(default = "unknown_percent")]
    pub heavy_haze_percent: f64,
    pub quality_category: String,
    #[serde(default = "unknown_percent")]
    pub visible_confidence_percent: f64,
    #[serde(rename = "Fullest", default)]
    pub fullest: u8,
    #[serde(rename = "Masked", default)]
    pub masked: Option<u8>,
    #[serde(rename = "Expanded", default)]
    pub expanded: Option<u8>,
}

impl FileQualityRecord {
    pub fn is_fullest(&self) -> bool {
        self.fullest == 1
    }

    pub fn is_masked(&self) -> bool {
        self.masked == Some(1)
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded == Some(1)
    }

    pub fn set_outcome(&mut self, outcome: BatchOutcome) {
        self.masked = Some(outcome.masked as u8);
        self.expanded = Some(outcome.expanded as u8);
    }

    /// Outcome flags as recorded in the table, unset flags read as 0
    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome::new(self.is_masked(), self.is_expanded())
    }

    /// Untouched, already full-extent, fully confident standard scene
    pub fn is_reference_candidate(&self) -> bool {
        self.masked == Some(0)
            && self.expanded == Some(0)
            && self.is_fullest()
            && self.clear_confidence_percent == 100.0
            && self.quality_category == STANDARD_QUALITY
    }

    /// Full-extent scene without any cloud, haze or confidence loss
    pub fn is_pristine(&self) -> bool {
        self.is_fullest()
            && self.clear_confidence_percent == 100.0
            && self.cloud_cover == 0.0
            && self.heavy_haze_percent == 0.0
            && self.quality_category == STANDARD_QUALITY
            && self.visible_confidence_percent == 100.0
    }

    /// Rendered value of a column backed by a field, `None` for other columns
    fn typed_cell(&self, column: &str) -> Option<String> {
        let cell = match column {
            "File Name" => self.file_name.clone(),
            "Width" => self.width.to_string(),
            "Height" => self.height.to_string(),
            "Count" => self.band_count.to_string(),
            "Epsg" => self.epsg.map(|code| code.to_string()).unwrap_or_default(),
            "clear_confidence_percent" | LEGACY_CLEAR_COLUMN => self.clear_confidence_percent.to_string(),
            "cloud_cover" => self.cloud_cover.to_string(),
            "heavy_haze_percent" => self.heavy_haze_percent.to_string(),
            "quality_category" => self.quality_category.clone(),
            "visible_confidence_percent" => self.visible_confidence_percent.to_string(),
            "Fullest" => self.fullest.to_string(),
            "Masked" => self.masked.unwrap_or(0).to_string(),
            "Expanded" => self.expanded.unwrap_or(0).to_string(),
            _ => return None,
        };
        Some(cell)
    }
}

/// In-memory metadata table with a file-name index built once on load.
///
/// A table read from disk keeps its own column set: columns without a field
/// on `FileQualityRecord` are carried through verbatim and columns it never
/// had are not written back.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    /// Non-outcome columns in write order
    columns: Vec<String>,
    records: Vec<FileQualityRecord>,
    /// Cells of untyped columns, by file name then column
    extra: HashMap<String, HashMap<String, String>>,
    index: HashMap<String, usize>,
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self {
            columns: BASE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records: Vec::new(),
            extra: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

impl MetadataTable {
    /// Build a table with the inventory columns, rejecting duplicate file names
    pub fn new(records: Vec<FileQualityRecord>) -> AlignResult<Self> {
        Self::with_columns(Self::default().columns, records, HashMap::new())
    }

    fn with_columns(
        columns: Vec<String>,
        records: Vec<FileQualityRecord>,
        extra: HashMap<String, HashMap<String, String>>,
    ) -> AlignResult<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            if index.insert(record.file_name.clone(), row).is_some() {
                return Err(AlignError::InvalidFormat(format!(
                    "Duplicate file name in metadata table: {}",
                    record.file_name
                )));
            }
        }
        Ok(Self {
            columns,
            records,
            extra,
            index,
        })
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> AlignResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let columns: Vec<String> = headers
            .iter()
            .filter(|column| !OUTCOME_COLUMNS.contains(column))
            .map(str::to_string)
            .collect();

        let mut records = Vec::new();
        let mut extra = HashMap::new();
        for row in reader.records() {
            let row = row?;
            let record: FileQualityRecord = row.deserialize(Some(&headers))?;
            let cells: HashMap<String, String> = headers
                .iter()
                .zip(row.iter())
                .filter(|(column, _)| !is_typed_column(column))
                .map(|(column, value)| (column.to_string(), value.to_string()))
                .collect();
            if !cells.is_empty() {
                extra.insert(record.file_name.clone(), cells);
            }
            records.push(record);
        }
        log::info!("Loaded {}, num_records: {}", path.display(), records.len());
        Self::with_columns(columns, records, extra)
    }

    /// Persist the table with its own columns, followed by Masked/Expanded
    /// when `with_outcome` is set
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, with_outcome: bool) -> AlignResult<()> {
        let path = path.as_ref();
        let mut header: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        if with_outcome {
            header.extend(OUTCOME_COLUMNS);
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&header)?;
        for record in &self.records {
            let cells = self.extra.get(&record.file_name);
            let row: Vec<String> = header
                .iter()
                .map(|column| {
                    record
                        .typed_cell(column)
                        .or_else(|| cells.and_then(|c| c.get(*column)).cloned())
                        .unwrap_or_default()
                })
                .collect();
            writer.write_record(&row)?;
        }
        writer.flush()?;

        log::info!("Wrote {} rows to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Non-outcome column names in write order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, file_name: &str) -> AlignResult<&FileQualityRecord> {
        self.index
            .get(file_name)
            .map(|&row| &self.records[row])
            .ok_or_else(|| AlignError::MetadataKeyMissing(file_name.to_string()))
    }

    pub fn get_mut(&mut self, file_name: &str) -> AlignResult<&mut FileQualityRecord> {
        match self.index.get(file_name) {
            Some(&row) => Ok(&mut self.records[row]),
            None => Err(AlignError::MetadataKeyMissing(file_name.to_string())),
        }
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.index.contains_key(file_name)
    }

    pub fn records(&self) -> &[FileQualityRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileQualityRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows matching a predicate, in table order, with the same columns
    pub fn filtered<F>(&self, predicate: F) -> Self
    where
        F: Fn(&FileQualityRecord) -> bool,
    {
        let records: Vec<_> = self.records.iter().filter(|r| predicate(r)).cloned().collect();
        // Subset of a table with unique names stays unique
        let index = records
            .iter()
            .enumerate()
            .map(|(row, r)| (r.file_name.clone(), row))
            .collect();
        let extra = records
            .iter()
            .filter_map(|r| {
                self.extra
                    .get(&r.file_name)
                    .map(|cells| (r.file_name.clone(), cells.clone()))
            })
            .collect();
        Self {
            columns: self.columns.clone(),
            records,
            extra,
            index,
        }
    }

    /// Rows whose cloud cover is strictly below the threshold
    pub fn below_cloud_cover(&self, max_cloud_cover: f64) -> Self {
        self.filtered(|r| r.cloud_cover < max_cloud_cover)
    }
}

/// Sibling path of a table with a suffix appended to its stem,
/// e.g. `info.csv` + `_expanded` gives `info_expanded.csv`
pub fn derived_table_path(table_path: &Path, suffix: &str) -> PathBuf {
    let stem = table_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n).to_string())
        .unwrap_or_else(|| "metadata".to_string());
    table_path.with_file_name(format!("{}{}.csv", stem, suffix))
}
