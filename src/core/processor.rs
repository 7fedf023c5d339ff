use crate::core::expand::CanvasExpander;
use crate::core::mask::QualityMaskCompositor;
use crate::io::{OutcomeLedger, RasterReader, RasterWriter};
use crate::types::{AlignError, AlignResult, BatchOutcome, RasterProfile};
use std::path::{Path, PathBuf};

/// File naming conventions of the download client's output directory
#[derive(Debug, Clone)]
pub struct FileNaming {
    /// Suffix identifying a primary image
    pub image_suffix: String,
    /// Suffix of the companion quality mask, appended to the scene prefix
    pub mask_suffix: String,
    /// The scene prefix runs up to the first occurrence of this marker
    pub prefix_delimiter: String,
    /// Suffix of the per-scene JSON sidecar, appended to the scene prefix
    pub scene_metadata_suffix: String,
}

impl Default for FileNaming {
    fn default() -> Self {
        Self {
            image_suffix: "harmonized_clip_reproject.tif".to_string(),
            mask_suffix: "3B_udm2_clip_reproject.tif".to_string(),
            prefix_delimiter: "3B".to_string(),
            scene_metadata_suffix: "metadata.json".to_string(),
        }
    }
}

impl FileNaming {
    pub fn is_image(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.image_suffix)
    }

    /// Scene prefix of a file name, e.g. `20230601_101010_12_2410_`
    pub fn scene_prefix<'a>(&self, file_name: &'a str) -> &'a str {
        match file_name.find(&self.prefix_delimiter) {
            Some(pos) => &file_name[..pos],
            None => file_name,
        }
    }

    pub fn mask_name(&self, image_name: &str) -> String {
        format!("{}{}", self.scene_prefix(image_name), self.mask_suffix)
    }

    pub fn scene_metadata_name(&self, image_name: &str) -> String {
        format!("{}{}", self.scene_prefix(image_name), self.scene_metadata_suffix)
    }
}

/// Directories one processing pass works in
#[derive(Debug, Clone)]
pub struct WorkDirs {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Transient home of masked copies, removed after the batch
    pub masked_dir: PathBuf,
}

/// Masks one scene and places it on the reference canvas (or copies it when
/// it is already full extent)
pub struct PerFileProcessor {
    dirs: WorkDirs,
    naming: FileNaming,
    reference: RasterProfile,
    compositor: QualityMaskCompositor,
    expander: CanvasExpander,
    ledger: OutcomeLedger,
}

impl PerFileProcessor {
    pub fn new(
        dirs: WorkDirs,
        naming: FileNaming,
        reference: RasterProfile,
        compositor: QualityMaskCompositor,
        expander: CanvasExpander,
    ) -> Self {
        let ledger = OutcomeLedger::new(&dirs.output_dir);
        Self {
            dirs,
            naming,
            reference,
            compositor,
            expander,
            ledger,
        }
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.dirs.output_dir.join(file_name)
    }

    fn partial_path(&self, file_name: &str) -> PathBuf {
        self.dirs.output_dir.join(format!(".{}.partial", file_name))
    }

    /// Process one scene. Writes exactly one output at `output_path(file_name)`
    /// and at most one transient masked copy.
    pub fn process(&self, file_name: &str, is_fullest: bool) -> AlignResult<BatchOutcome> {
        log::info!("Running for: {}", file_name);

        let partial = self.partial_path(file_name);
        let result = self.produce(file_name, is_fullest, &partial).and_then(|outcome| {
            self.ledger.record(file_name, outcome)?;
            std::fs::rename(&partial, self.output_path(file_name))?;
            Ok(outcome)
        });
        if result.is_err() {
            if partial.exists() {
                if let Err(e) = std::fs::remove_file(&partial) {
                    log::warn!("Could not remove partial output {}: {}", partial.display(), e);
                }
            }
            // A record left by an earlier run no longer matches any output
            if let Err(e) = self.ledger.forget(file_name) {
                log::warn!("Could not drop outcome record of {}: {}", file_name, e);
            }
        }
        let outcome = result?;

        log::info!(
            "Finished {}: masked={}, expanded={}",
            file_name,
            outcome.masked,
            outcome.expanded
        );
        Ok(outcome)
    }

    fn produce(&self, file_name: &str, is_fullest: bool, partial: &Path) -> AlignResult<BatchOutcome> {
        let image_path = self.dirs.input_dir.join(file_name);
        let mask_path = self.dirs.input_dir.join(self.naming.mask_name(file_name));
        if !mask_path.exists() {
            return Err(AlignError::MissingCompanionFile {
                image: file_name.to_string(),
                expected: mask_path,
            });
        }

        let image = RasterReader::read(&image_path)?;
        let mask = RasterReader::read(&mask_path)?;
        let masked = self.compositor.apply(&image, &mask)?;
        let masked_path = match &masked {
            Some(raster) => Some(QualityMaskCompositor::write_masked(raster, &image_path, &self.dirs.masked_dir)?),
            None => None,
        };

        if is_fullest {
            let source_path = masked_path.as_deref().unwrap_or(image_path.as_path());
            std::fs::copy(source_path, partial)?;
        } else {
            let source = masked.as_ref().unwrap_or(&image);
            let expanded = self.expander.expand(source, &self.reference)?;
            RasterWriter::write(partial, &expanded)?;
        }

        Ok(BatchOutcome::new(masked.is_some(), !is_fullest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_names_share_the_scene_prefix() {
        let naming = FileNaming::default();
        let image = "20230601_101010_12_2410_3B_AnalyticMS_SR_8b_harmonized_clip_reproject.tif";

        assert!(naming.is_image(image));
        assert_eq!(naming.scene_prefix(image), "20230601_101010_12_2410_");
        assert_eq!(
            naming.mask_name(image),
            "20230601_101010_12_2410_3B_udm2_clip_reproject.tif"
        );
        assert_eq!(
            naming.scene_metadata_name(image),
            "20230601_101010_12_2410_metadata.json"
        );
        assert!(!naming.is_image(&naming.mask_name(image)));
    }

    #[test]
    fn test_name_without_delimiter_is_its_own_prefix() {
        let naming = FileNaming::default();
        assert_eq!(naming.scene_prefix("plain.tif"), "plain.tif");
    }

    #[test]
    fn test_failure_drops_stale_outcome_record() {
        let root = tempfile::tempdir().unwrap();
        let dirs = WorkDirs {
            input_dir: root.path().join("input"),
            output_dir: root.path().join("output"),
            masked_dir: root.path().join("masked"),
        };
        std::fs::create_dir_all(&dirs.input_dir).unwrap();
        let name = "20230601_101010_12_2410_3B_AnalyticMS_SR_8b_harmonized_clip_reproject.tif";
        std::fs::write(dirs.input_dir.join(name), b"").unwrap();

        // Outcome left behind by an earlier run whose output was since removed
        let ledger = OutcomeLedger::new(&dirs.output_dir);
        ledger.record(name, BatchOutcome::new(true, true)).unwrap();

        let reference = RasterProfile {
            width: 10,
            height: 12,
            band_count: 4,
            geo_transform: crate::types::GeoTransform::north_up(0.0, 12.0, 1.0, -1.0),
            projection: String::new(),
            epsg: None,
            nodata: None,
            sample_type: crate::types::SampleType::UInt16,
        };
        let processor = PerFileProcessor::new(
            dirs,
            FileNaming::default(),
            reference,
            QualityMaskCompositor::default(),
            CanvasExpander::default(),
        );

        let result = processor.process(name, false);
        assert!(matches!(result, Err(AlignError::MissingCompanionFile { .. })));
        assert!(!processor.output_path(name).exists());
        assert!(ledger.load_all().unwrap().is_empty());
    }
}
