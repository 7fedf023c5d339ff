use crate::core::processor::FileNaming;
use crate::io::{derived_table_path, FileQualityRecord, MetadataTable, RasterReader, SceneMetadataReader};
use crate::types::AlignResult;
use std::path::{Path, PathBuf};

/// Builds the metadata table from a directory of downloaded scenes
pub struct Inventory {
    naming: FileNaming,
}

/// Paths and subsets produced by `Inventory::write`
#[derive(Debug, Clone)]
pub struct InventoryOutput {
    pub table_path: PathBuf,
    pub fullest_path: Option<PathBuf>,
    /// Full-extent scenes with no cloud, haze or confidence loss
    pub pristine: Vec<String>,
}

impl Inventory {
    pub fn new(naming: FileNaming) -> Self {
        Self { naming }
    }

    /// Describe one scene from its raster profile and JSON sidecar
    pub fn describe(&self, images_dir: &Path, file_name: &str) -> AlignResult<FileQualityRecord> {
        let profile = RasterReader::profile(images_dir.join(file_name))?;
        let props = SceneMetadataReader::read(images_dir.join(self.naming.scene_metadata_name(file_name)))?;

        Ok(FileQualityRecord {
            file_name: file_name.to_string(),
            width: profile.width,
            height: profile.height,
            band_count: profile.band_count,
            epsg: profile.epsg,
            clear_confidence_percent: props.clear_confidence_percent.unwrap_or(-1.0),
            cloud_cover: props.cloud_cover,
            heavy_haze_percent: props.heavy_haze_percent.unwrap_or(-1.0),
            quality_category: props.quality_category,
            visible_confidence_percent: props.visible_confidence_percent.unwrap_or(-1.0),
            fullest: 0,
            masked: None,
            expanded: None,
        })
    }

    /// Scan `images_dir` (sorted by name) and flag the full-extent scenes
    pub fn scan(&self, images_dir: &Path) -> AlignResult<MetadataTable> {
        log::info!("Running for: {}", images_dir.display());

        let mut names = Vec::new();
        for entry in std::fs::read_dir(images_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if self.naming.is_image(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        log::info!("num_files: {}", names.len());

        let mut records = names
            .iter()
            .map(|name| self.describe(images_dir, name))
            .collect::<AlignResult<Vec<_>>>()?;

        if let Some((max_width, max_height)) = Self::fullest_dimensions(&records) {
            log::info!("Max dims: {}x{}", max_width, max_height);
            for record in records.iter_mut() {
                if (record.width, record.height) == (max_width, max_height) {
                    record.fullest = 1;
                }
            }
        }

        MetadataTable::new(records)
    }

    /// The (width, height) pair with the largest width+height; the first
    /// record in order wins ties
    pub fn fullest_dimensions(records: &[FileQualityRecord]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for record in records {
            let sum = record.width + record.height;
            if best.map_or(true, |(w, h)| sum > w + h) {
                best = Some((record.width, record.height));
            }
        }
        best
    }

    /// Persist the table plus a `<stem>_fullest.csv` view. When
    /// `selected_dir` is given, pristine scenes are copied there.
    pub fn write(
        &self,
        table: &MetadataTable,
        table_path: &Path,
        images_dir: &Path,
        selected_dir: Option<&Path>,
    ) -> AlignResult<InventoryOutput> {
        let mut output = InventoryOutput {
            table_path: table_path.to_path_buf(),
            fullest_path: None,
            pristine: table
                .iter()
                .filter(|r| r.is_pristine())
                .map(|r| r.file_name.clone())
                .collect(),
        };
        if table.is_empty() {
            log::warn!("No scenes found in {}, nothing written", images_dir.display());
            return Ok(output);
        }

        table.write_csv(table_path, false)?;

        let fullest = table.filtered(FileQualityRecord::is_fullest);
        if !fullest.is_empty() {
            let fullest_path = derived_table_path(table_path, "_fullest");
            fullest.write_csv(&fullest_path, false)?;
            output.fullest_path = Some(fullest_path);
        }

        if let Some(selected_dir) = selected_dir {
            if !output.pristine.is_empty() {
                std::fs::create_dir_all(selected_dir)?;
                log::info!(
                    "copying: {} selected files to: {}",
                    output.pristine.len(),
                    selected_dir.display()
                );
                for name in &output.pristine {
                    std::fs::copy(images_dir.join(name), selected_dir.join(name))?;
                }
            }
        }

        Ok(output)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(FileNaming::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, width: usize, height: usize) -> FileQualityRecord {
        FileQualityRecord {
            file_name: name.to_string(),
            width,
            height,
            band_count: 4,
            epsg: None,
            clear_confidence_percent: 100.0,
            cloud_cover: 0.0,
            heavy_haze_percent: 0.0,
            quality_category: "standard".to_string(),
            visible_confidence_percent: 100.0,
            fullest: 0,
            masked: None,
            expanded: None,
        }
    }

    #[test]
    fn test_fullest_dimensions_prefers_largest_sum() {
        let records = vec![record("a", 100, 80), record("b", 120, 90), record("c", 110, 95)];
        assert_eq!(Inventory::fullest_dimensions(&records), Some((110, 95)));
    }

    #[test]
    fn test_fullest_dimensions_first_wins_ties() {
        let records = vec![record("a", 100, 90), record("b", 90, 100)];
        assert_eq!(Inventory::fullest_dimensions(&records), Some((100, 90)));
        assert_eq!(Inventory::fullest_dimensions(&[]), None);
    }
}
