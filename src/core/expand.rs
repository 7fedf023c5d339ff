use crate::core::offset::pixel_offset;
use crate::types::{AlignError, AlignResult, Raster, RasterProfile, SampleCube};
use ndarray::{s, Array3};

/// What to do when the source does not fit inside the reference canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementPolicy {
    /// Keep only the part of the source that lands on the canvas
    #[default]
    Truncate,
    /// Fail with `OutOfBoundsPlacement`
    Reject,
}

/// Destination window of a placement, already clipped to the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub offset_x: i64,
    pub offset_y: i64,
    /// First source row/col that lands on the canvas
    pub src_row: usize,
    pub src_col: usize,
    /// First canvas row/col written
    pub dst_row: usize,
    pub dst_col: usize,
    /// Size of the copied window, zero when nothing overlaps
    pub rows: usize,
    pub cols: usize,
    pub truncated: bool,
}

impl Placement {
    /// Clip a `src_height x src_width` block placed at the offset to a
    /// `canvas_height x canvas_width` grid
    pub fn compute(
        offset: (i64, i64),
        src_height: usize,
        src_width: usize,
        canvas_height: usize,
        canvas_width: usize,
    ) -> Self {
        let (offset_x, offset_y) = offset;
        let (src_row, dst_row, rows) = clip_axis(offset_y, src_height, canvas_height);
        let (src_col, dst_col, cols) = clip_axis(offset_x, src_width, canvas_width);
        Self {
            offset_x,
            offset_y,
            src_row,
            src_col,
            dst_row,
            dst_col,
            rows,
            cols,
            truncated: rows != src_height || cols != src_width,
        }
    }
}

/// (source start, destination start, length) of the overlap along one axis
fn clip_axis(offset: i64, src_len: usize, canvas_len: usize) -> (usize, usize, usize) {
    let start = offset.max(0);
    let end = offset.saturating_add(src_len as i64).min(canvas_len as i64);
    if end <= start {
        return (0, 0, 0);
    }
    ((start - offset) as usize, start as usize, (end - start) as usize)
}

/// Places a raster onto a zero-filled canvas shaped like a reference raster
pub struct CanvasExpander {
    policy: PlacementPolicy,
}

impl CanvasExpander {
    pub fn new(policy: PlacementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// Expand `source` onto the grid of `reference`.
    ///
    /// The result carries the reference profile (transform, projection, extent,
    /// sample type) with the source pixels at the computed offset and zeros
    /// everywhere else.
    pub fn expand(&self, source: &Raster, reference: &RasterProfile) -> AlignResult<Raster> {
        let src = &source.profile;
        if src.band_count > reference.band_count {
            return Err(AlignError::BandCountExceeded {
                source_bands: src.band_count,
                reference_bands: reference.band_count,
            });
        }
        if src.epsg.is_some() && reference.epsg.is_some() && src.epsg != reference.epsg {
            log::warn!(
                "CRS of {} (EPSG:{:?}) differs from the reference (EPSG:{:?})",
                source.display_name(),
                src.epsg,
                reference.epsg
            );
        }
        if (src.geo_transform.pixel_width - reference.geo_transform.pixel_width).abs() > 1e-9
            || (src.geo_transform.pixel_height - reference.geo_transform.pixel_height).abs() > 1e-9
        {
            log::warn!(
                "Pixel size of {} ({} x {}) differs from the reference ({} x {})",
                source.display_name(),
                src.geo_transform.pixel_width,
                src.geo_transform.pixel_height,
                reference.geo_transform.pixel_width,
                reference.geo_transform.pixel_height
            );
        }

        let offset = pixel_offset(&src.geo_transform, &reference.geo_transform);
        let placement = Placement::compute(offset, src.height, src.width, reference.height, reference.width);
        log::debug!(
            "Placing {} ({}x{}) at offset ({}, {}) on {}x{} canvas",
            source.display_name(),
            src.width,
            src.height,
            placement.offset_x,
            placement.offset_y,
            reference.width,
            reference.height
        );

        if placement.truncated {
            let out_of_bounds = AlignError::OutOfBoundsPlacement {
                offset_x: placement.offset_x,
                offset_y: placement.offset_y,
                source_width: src.width,
                source_height: src.height,
                canvas_width: reference.width,
                canvas_height: reference.height,
            };
            match self.policy {
                PlacementPolicy::Reject => return Err(out_of_bounds),
                PlacementPolicy::Truncate => {
                    log::warn!("{}; keeping the overlapping {}x{} window", out_of_bounds, placement.cols, placement.rows)
                }
            }
        }

        let data = Self::place(&source.data, reference, &placement);
        Ok(Raster {
            path: None,
            profile: reference.clone(),
            data,
        })
    }

    /// Copy every source band into a zeroed reference-shaped canvas
    pub fn place(source: &SampleCube, reference: &RasterProfile, placement: &Placement) -> SampleCube {
        let mut canvas = Array3::<f64>::zeros((reference.band_count, reference.height, reference.width));
        if placement.rows == 0 || placement.cols == 0 {
            return canvas;
        }

        let bands = source.dim().0;
        let p = placement;
        canvas
            .slice_mut(s![..bands, p.dst_row..p.dst_row + p.rows, p.dst_col..p.dst_col + p.cols])
            .assign(&source.slice(s![.., p.src_row..p.src_row + p.rows, p.src_col..p.src_col + p.cols]));
        canvas
    }
}

impl Default for CanvasExpander {
    fn default() -> Self {
        Self::new(PlacementPolicy::default())
    }
}
