// ============================================================================
// OPS MODULE — pixel operations on the working buffer
// ============================================================================
//
//   resample.rs — `Resampler` capability: smoothed shrink, nearest enlarge
//   mosaic.rs   — in-place pixelation of one rectangle
// ============================================================================

pub mod mosaic;
pub mod resample;
