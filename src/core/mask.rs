use crate::io::RasterWriter;
use crate::types::{AlignError, AlignResult, Raster, SampleCube};
use ndarray::{Array2, Axis};
use std::path::{Path, PathBuf};

/// Quality-mask compositing parameters
#[derive(Debug, Clone)]
pub struct MaskParams {
    /// 0-indexed mask bands whose sum marks a pixel unusable
    /// (cloud, light haze/shadow, heavy haze in UDM2 ordering)
    pub invalid_bands: Vec<usize>,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            invalid_bands: vec![3, 4, 5],
        }
    }
}

/// Composites quality-mask bands into a validity map and blanks invalid pixels
pub struct QualityMaskCompositor {
    params: MaskParams,
}

impl QualityMaskCompositor {
    pub fn new(params: MaskParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MaskParams {
        &self.params
    }

    /// Pixel-wise sum of the designated invalidity bands
    pub fn composite(&self, mask: &SampleCube) -> AlignResult<Array2<f64>> {
        let (bands, height, width) = mask.dim();
        let mut combined = Array2::<f64>::zeros((height, width));
        for &band in &self.params.invalid_bands {
            if band >= bands {
                return Err(AlignError::InvalidFormat(format!(
                    "Quality mask has {} bands, band {} was requested",
                    bands, band
                )));
            }
            combined += &mask.index_axis(Axis(0), band);
        }
        Ok(combined)
    }

    /// 1 where the combined mask is zero, 0 elsewhere
    pub fn validity_map(combined: &Array2<f64>) -> Array2<f64> {
        combined.mapv(|v| if v == 0.0 { 1.0 } else { 0.0 })
    }

    /// Multiply every band by the validity map
    pub fn apply_validity(data: &SampleCube, validity: &Array2<f64>) -> SampleCube {
        let mut masked = data.clone();
        for mut band in masked.axis_iter_mut(Axis(0)) {
            band *= validity;
        }
        masked
    }

    /// Mask an image with its quality mask.
    ///
    /// Returns `Ok(None)` when the mask flags nothing, meaning the original image
    /// should be used unmodified.
    pub fn apply(&self, image: &Raster, mask: &Raster) -> AlignResult<Option<Raster>> {
        if image.dimensions() != mask.dimensions() {
            return Err(AlignError::DimensionMismatch {
                image_width: image.profile.width,
                image_height: image.profile.height,
                mask_width: mask.profile.width,
                mask_height: mask.profile.height,
            });
        }

        let combined = self.composite(&mask.data)?;
        let invalid = combined.iter().filter(|&&v| v != 0.0).count();
        if invalid == 0 {
            log::debug!("No invalid pixels in mask for {}", image.display_name());
            return Ok(None);
        }

        log::debug!(
            "Masking {} of {} pixels ({:.2}%) in {}",
            invalid,
            combined.len(),
            100.0 * invalid as f64 / combined.len() as f64,
            image.display_name()
        );

        let validity = Self::validity_map(&combined);
        let data = Self::apply_validity(&image.data, &validity);

        Ok(Some(Raster {
            path: None,
            profile: image.profile.clone(),
            data,
        }))
    }

    /// Persist a masked raster into `masked_dir` under the image's file name
    pub fn write_masked(masked: &Raster, image_path: &Path, masked_dir: &Path) -> AlignResult<PathBuf> {
        let file_name = image_path.file_name().ok_or_else(|| {
            AlignError::Processing(format!("Image path has no file name: {}", image_path.display()))
        })?;
        let masked_path = masked_dir.join(file_name);
        RasterWriter::write(&masked_path, masked)?;
        Ok(masked_path)
    }
}

impl Default for QualityMaskCompositor {
    fn default() -> Self {
        Self::new(MaskParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, RasterProfile, SampleType};
    use ndarray::Array3;

    fn raster(bands: usize, height: usize, width: usize, data: Array3<f64>) -> Raster {
        let profile = RasterProfile {
            width,
            height,
            band_count: bands,
            geo_transform: GeoTransform::north_up(0.0, 0.0, 3.0, -3.0),
            projection: String::new(),
            epsg: None,
            nodata: None,
            sample_type: SampleType::UInt16,
        };
        Raster::new(profile, data).unwrap()
    }

    fn image() -> Raster {
        let data = Array3::from_shape_fn((4, 3, 3), |(b, r, c)| (100 * (b + 1) + 10 * r + c) as f64);
        raster(4, 3, 3, data)
    }

    fn mask_with(invalid: &[(usize, usize, usize)]) -> Raster {
        let mut data = Array3::<f64>::zeros((8, 3, 3));
        // clear band is informational only
        data.index_axis_mut(Axis(0), 0).fill(1.0);
        for &(band, r, c) in invalid {
            data[[band, r, c]] = 1.0;
        }
        raster(8, 3, 3, data)
    }

    #[test]
    fn test_clean_mask_needs_no_masking() {
        let compositor = QualityMaskCompositor::default();
        let result = compositor.apply(&image(), &mask_with(&[])).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_bands_outside_the_invalid_set_are_ignored() {
        let compositor = QualityMaskCompositor::default();
        // band 2 (snow) and band 6 (confidence) do not invalidate pixels
        let result = compositor
            .apply(&image(), &mask_with(&[(2, 0, 0), (6, 1, 1)]))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_pixels_zeroed_in_every_band() {
        let compositor = QualityMaskCompositor::default();
        let original = image();
        let masked = compositor
            .apply(&original, &mask_with(&[(3, 0, 1), (4, 2, 2), (5, 2, 2)]))
            .unwrap()
            .unwrap();

        assert_eq!(masked.profile, original.profile);
        for b in 0..4 {
            assert_eq!(masked.data[[b, 0, 1]], 0.0);
            assert_eq!(masked.data[[b, 2, 2]], 0.0);
            assert_eq!(masked.data[[b, 1, 1]], original.data[[b, 1, 1]]);
            assert_eq!(masked.data[[b, 0, 0]], original.data[[b, 0, 0]]);
        }
    }

    #[test]
    fn test_masking_is_a_fixed_point() {
        let compositor = QualityMaskCompositor::default();
        let mask = mask_with(&[(3, 1, 0), (5, 0, 2)]);
        let once = compositor.apply(&image(), &mask).unwrap().unwrap();
        let twice = compositor.apply(&once, &mask).unwrap().unwrap();
        assert_eq!(once.data, twice.data);
    }

    #[test]
    fn test_dimension_mismatch_fails_fast() {
        let compositor = QualityMaskCompositor::default();
        let small_mask = raster(8, 2, 3, Array3::zeros((8, 2, 3)));
        match compositor.apply(&image(), &small_mask) {
            Err(AlignError::DimensionMismatch { mask_height, image_height, .. }) => {
                assert_eq!(mask_height, 2);
                assert_eq!(image_height, 3);
            }
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_mask_with_too_few_bands_is_rejected() {
        let compositor = QualityMaskCompositor::default();
        let thin_mask = raster(4, 3, 3, Array3::zeros((4, 3, 3)));
        assert!(matches!(
            compositor.apply(&image(), &thin_mask),
            Err(AlignError::InvalidFormat(_))
        ));
    }
}
