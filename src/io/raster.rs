use crate::types::{AlignError, AlignResult, GeoTransform, Raster, RasterProfile, SampleCube, SampleType};
use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::{Dataset, DriverManager};
use ndarray::{Array2, Array3, Axis};
use num_traits::NumCast;
use std::path::Path;

impl SampleType {
    fn from_gdal(data_type: GdalDataType) -> AlignResult<Self> {
        match data_type {
            GdalDataType::UInt8 => Ok(SampleType::UInt8),
            GdalDataType::UInt16 => Ok(SampleType::UInt16),
            GdalDataType::Int16 => Ok(SampleType::Int16),
            GdalDataType::UInt32 => Ok(SampleType::UInt32),
            GdalDataType::Int32 => Ok(SampleType::Int32),
            GdalDataType::Float32 => Ok(SampleType::Float32),
            GdalDataType::Float64 => Ok(SampleType::Float64),
            other => Err(AlignError::InvalidFormat(format!(
                "Unsupported raster sample type: {:?}",
                other
            ))),
        }
    }
}

/// GeoTIFF reader backed by GDAL
pub struct RasterReader;

impl RasterReader {
    /// Read only the spatial profile of a raster
    pub fn profile<P: AsRef<Path>>(path: P) -> AlignResult<RasterProfile> {
        let dataset = Dataset::open(path.as_ref())?;
        Self::profile_of(&dataset, path.as_ref())
    }

    /// Read every band of a raster into memory
    pub fn read<P: AsRef<Path>>(path: P) -> AlignResult<Raster> {
        let path = path.as_ref();
        log::debug!("Reading raster: {}", path.display());

        let dataset = Dataset::open(path)?;
        let profile = Self::profile_of(&dataset, path)?;
        let (width, height) = (profile.width, profile.height);

        let mut data: SampleCube = Array3::zeros((profile.band_count, height, width));
        for band_idx in 0..profile.band_count {
            let rasterband = dataset.rasterband(band_idx as isize + 1)?;
            let band_data = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
            let band = Array2::from_shape_vec((height, width), band_data.data)?;
            data.index_axis_mut(Axis(0), band_idx).assign(&band);
        }

        Ok(Raster {
            path: Some(path.to_path_buf()),
            profile,
            data,
        })
    }

    fn profile_of(dataset: &Dataset, path: &Path) -> AlignResult<RasterProfile> {
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;
        if width == 0 || height == 0 || band_count == 0 {
            return Err(AlignError::InvalidFormat(format!(
                "{} has an empty raster ({}x{}, {} bands)",
                path.display(),
                width,
                height,
                band_count
            )));
        }

        let geo_transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        if !geo_transform.is_north_up() {
            return Err(AlignError::InvalidFormat(format!(
                "{} is not north-up (pixel size {} x {})",
                path.display(),
                geo_transform.pixel_width,
                geo_transform.pixel_height
            )));
        }

        let first_band = dataset.rasterband(1)?;
        let sample_type = SampleType::from_gdal(first_band.band_type())?;
        let epsg = dataset
            .spatial_ref()
            .ok()
            .and_then(|srs| srs.auth_code().ok());

        Ok(RasterProfile {
            width,
            height,
            band_count,
            geo_transform,
            projection: dataset.projection(),
            epsg,
            nodata: first_band.no_data_value(),
            sample_type,
        })
    }
}

/// GeoTIFF writer backed by GDAL
pub struct RasterWriter;

impl RasterWriter {
    /// Write a raster using its own profile (sample type, transform, projection, nodata)
    pub fn write<P: AsRef<Path>>(path: P, raster: &Raster) -> AlignResult<()> {
        let path = path.as_ref();
        log::debug!(
            "Writing {} raster {}x{}x{} to {}",
            raster.profile.sample_type,
            raster.profile.band_count,
            raster.profile.height,
            raster.profile.width,
            path.display()
        );

        match raster.profile.sample_type {
            SampleType::UInt8 => Self::write_typed::<u8>(path, raster),
            SampleType::UInt16 => Self::write_typed::<u16>(path, raster),
            SampleType::Int16 => Self::write_typed::<i16>(path, raster),
            SampleType::UInt32 => Self::write_typed::<u32>(path, raster),
            SampleType::Int32 => Self::write_typed::<i32>(path, raster),
            SampleType::Float32 => Self::write_typed::<f32>(path, raster),
            SampleType::Float64 => Self::write_typed::<f64>(path, raster),
        }
    }

    fn write_typed<T: GdalType + NumCast + Copy>(path: &Path, raster: &Raster) -> AlignResult<()> {
        let profile = &raster.profile;
        let (width, height) = (profile.width, profile.height);

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<T, _>(
            path,
            width as isize,
            height as isize,
            profile.band_count as isize,
        )?;

        dataset.set_geo_transform(&profile.geo_transform.to_gdal())?;
        if !profile.projection.is_empty() {
            dataset.set_projection(&profile.projection)?;
        }

        for (band_idx, band) in raster.data.axis_iter(Axis(0)).enumerate() {
            let samples = band
                .iter()
                .map(|&value| {
                    <T as NumCast>::from(value).ok_or_else(|| {
                        AlignError::InvalidFormat(format!(
                            "Sample {} does not fit the {} output type",
                            value, profile.sample_type
                        ))
                    })
                })
                .collect::<AlignResult<Vec<T>>>()?;

            let mut rasterband = dataset.rasterband(band_idx as isize + 1)?;
            let buffer = Buffer::new((width, height), samples);
            rasterband.write((0, 0), (width, height), &buffer)?;

            if profile.nodata.is_some() {
                rasterband.set_no_data_value(profile.nodata)?;
            }
        }

        Ok(())
    }
}
