use crate::types::GeoTransform;

/// Integer pixel offset at which `small` should be placed inside the grid of `big`.
///
/// Both origins are differenced in world units and divided by the canvas pixel
/// size. The quotient is rounded to the nearest integer with ties going to the
/// even neighbour, so sub-pixel misalignment collapses to whole-pixel placement.
/// No bounds checking happens here; see `CanvasExpander` for placement policy.
pub fn pixel_offset(small: &GeoTransform, big: &GeoTransform) -> (i64, i64) {
    let offset_x = ((small.top_left_x - big.top_left_x) / big.pixel_width).round_ties_even();
    let offset_y = ((small.top_left_y - big.top_left_y) / big.pixel_height).round_ties_even();
    (offset_x as i64, offset_y as i64)
}
