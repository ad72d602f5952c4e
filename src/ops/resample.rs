// ============================================================================
// RESAMPLING — the scale-down / scale-up capability behind the mosaic
// ============================================================================
//
// The mosaic needs exactly two primitives: a smoothed shrink and a hard-edged
// (nearest-neighbour) enlarge. They sit behind `Resampler` so that any imaging
// backend can provide them.
//
// `AreaResampler` (the default) shares one integer partition between both
// directions: destination column `x` reads source column `x * src_w / dst_w`,
// and a shrunk pixel averages exactly the columns that map back onto it. A
// mosaicked block therefore shrinks to its own colour and re-expands onto the
// same pixels, which makes re-applying the mosaic a no-op.

use image::imageops::FilterType;
use image::RgbaImage;
use rayon::prelude::*;

/// Scale an RGBA image to an exact target size.
pub trait Resampler: Send + Sync {
    /// `smoothing = false` must be nearest-neighbour (hard block edges).
    fn resample(
        &self,
        source: &RgbaImage,
        target_width: u32,
        target_height: u32,
        smoothing: bool,
    ) -> RgbaImage;
}

/// Smoothing kernel used for the shrink step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SmoothingFilter {
    /// Exact box average over each source footprint.
    #[default]
    Area,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl SmoothingFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmoothingFilter::Area => "area",
            SmoothingFilter::Triangle => "triangle",
            SmoothingFilter::CatmullRom => "catmullrom",
            SmoothingFilter::Lanczos3 => "lanczos3",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "area" | "box" => Some(SmoothingFilter::Area),
            "triangle" | "linear" | "bilinear" => Some(SmoothingFilter::Triangle),
            "catmullrom" | "cubic" => Some(SmoothingFilter::CatmullRom),
            "lanczos3" | "lanczos" => Some(SmoothingFilter::Lanczos3),
            _ => None,
        }
    }

    /// Build the resampler that implements this kernel.
    pub fn resampler(&self) -> Box<dyn Resampler> {
        match self {
            SmoothingFilter::Area => Box::new(AreaResampler),
            SmoothingFilter::Triangle => Box::new(FilterResampler::new(FilterType::Triangle)),
            SmoothingFilter::CatmullRom => Box::new(FilterResampler::new(FilterType::CatmullRom)),
            SmoothingFilter::Lanczos3 => Box::new(FilterResampler::new(FilterType::Lanczos3)),
        }
    }
}

/// Box-average shrink + nearest enlarge on a shared integer grid.
#[derive(Clone, Copy, Debug, Default)]
pub struct AreaResampler;

impl Resampler for AreaResampler {
    fn resample(
        &self,
        source: &RgbaImage,
        target_width: u32,
        target_height: u32,
        smoothing: bool,
    ) -> RgbaImage {
        if smoothing {
            area_average(source, target_width, target_height)
        } else {
            nearest(source, target_width, target_height)
        }
    }
}

/// `image::imageops` kernel for the shrink; enlarge stays nearest-neighbour.
///
/// Convolution kernels reach into neighbouring blocks, so repeated mosaics
/// drift by a little blur instead of reaching an exact fixed point.
#[derive(Clone, Copy, Debug)]
pub struct FilterResampler {
    filter: FilterType,
}

impl FilterResampler {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Resampler for FilterResampler {
    fn resample(
        &self,
        source: &RgbaImage,
        target_width: u32,
        target_height: u32,
        smoothing: bool,
    ) -> RgbaImage {
        if !smoothing {
            return nearest(source, target_width, target_height);
        }
        if source.width() == 0 || source.height() == 0 || target_width == 0 || target_height == 0
        {
            return RgbaImage::new(target_width, target_height);
        }
        image::imageops::resize(source, target_width, target_height, self.filter)
    }
}

// ============================================================================
// SHARED GRID
// ============================================================================

/// Source index that destination index `dst` samples from.
#[inline]
fn source_index(dst: u32, src_len: u32, dst_len: u32) -> u32 {
    ((dst as u64 * src_len as u64) / dst_len as u64) as u32
}

/// Half-open range of source indices that map onto destination `dst`.
///
/// This is `{ s : source_index⁻¹ }`, i.e. every `s` with
/// `floor(s * dst_len / src_len) == dst`. When enlarging the range can be empty;
/// it is widened to the single nearest source index instead.
#[inline]
fn footprint(dst: u32, src_len: u32, dst_len: u32) -> (u32, u32) {
    let ceil_div = |n: u64, d: u64| n.div_ceil(d);
    let start = ceil_div(dst as u64 * src_len as u64, dst_len as u64) as u32;
    let end = ceil_div((dst as u64 + 1) * src_len as u64, dst_len as u64) as u32;
    let start = start.min(src_len - 1);
    let end = end.clamp(start + 1, src_len);
    (start, end)
}

fn nearest(source: &RgbaImage, target_width: u32, target_height: u32) -> RgbaImage {
    let (sw, sh) = source.dimensions();
    if sw == 0 || sh == 0 || target_width == 0 || target_height == 0 {
        return RgbaImage::new(target_width, target_height);
    }

    let src_raw = source.as_raw();
    let src_stride = sw as usize * 4;
    let stride = target_width as usize * 4;
    let mut dst_raw = vec![0u8; stride * target_height as usize];

    let columns: Vec<usize> = (0..target_width)
        .map(|x| source_index(x, sw, target_width) as usize * 4)
        .collect();

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let sy = source_index(y as u32, sh, target_height) as usize;
            let row_in = &src_raw[sy * src_stride..(sy + 1) * src_stride];
            for (x, &si) in columns.iter().enumerate() {
                row_out[x * 4..x * 4 + 4].copy_from_slice(&row_in[si..si + 4]);
            }
        });

    RgbaImage::from_raw(target_width, target_height, dst_raw)
        .unwrap_or_else(|| RgbaImage::new(target_width, target_height))
}

fn area_average(source: &RgbaImage, target_width: u32, target_height: u32) -> RgbaImage {
    let (sw, sh) = source.dimensions();
    if sw == 0 || sh == 0 || target_width == 0 || target_height == 0 {
        return RgbaImage::new(target_width, target_height);
    }

    let src_raw = source.as_raw();
    let src_stride = sw as usize * 4;
    let stride = target_width as usize * 4;
    let mut dst_raw = vec![0u8; stride * target_height as usize];

    let columns: Vec<(u32, u32)> = (0..target_width)
        .map(|x| footprint(x, sw, target_width))
        .collect();

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let (y0, y1) = footprint(y as u32, sh, target_height);
            for (x, &(x0, x1)) in columns.iter().enumerate() {
                let mut sum = [0u64; 4];
                for sy in y0..y1 {
                    let row = &src_raw[sy as usize * src_stride..(sy as usize + 1) * src_stride];
                    for sx in x0..x1 {
                        let pi = sx as usize * 4;
                        for c in 0..4 {
                            sum[c] += row[pi + c] as u64;
                        }
                    }
                }
                let count = ((y1 - y0) as u64) * ((x1 - x0) as u64);
                for c in 0..4 {
                    row_out[x * 4 + c] = ((sum[c] + count / 2) / count) as u8;
                }
            }
        });

    RgbaImage::from_raw(target_width, target_height, dst_raw)
        .unwrap_or_else(|| RgbaImage::new(target_width, target_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn footprints_partition_the_source() {
        for (src, dst) in [(100u32, 7u32), (15, 1), (31, 2), (60, 4)] {
            let mut next = 0;
            for d in 0..dst {
                let (a, b) = footprint(d, src, dst);
                assert_eq!(a, next, "gap before footprint {} of {}→{}", d, src, dst);
                assert!(b > a);
                for s in a..b {
                    assert_eq!(source_index(s, dst, src), d);
                }
                next = b;
            }
            assert_eq!(next, src);
        }
    }

    #[test]
    fn area_average_of_two_by_two_blocks() {
        let mut img = RgbaImage::new(4, 2);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([100, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([100, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([200, 0, 0, 255]));
        for x in 2..4 {
            for y in 0..2 {
                img.put_pixel(x, y, Rgba([10, 20, 30, 40]));
            }
        }
        let small = AreaResampler.resample(&img, 2, 1, true);
        assert_eq!(small.get_pixel(0, 0), &Rgba([100, 0, 0, 255]));
        assert_eq!(small.get_pixel(1, 0), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn nearest_enlarge_makes_hard_blocks() {
        let mut small = RgbaImage::new(2, 1);
        small.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        small.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let big = AreaResampler.resample(&small, 5, 3, false);
        for y in 0..3 {
            for x in 0..5 {
                let expected = if x < 3 { [255, 0, 0, 255] } else { [0, 0, 255, 255] };
                assert_eq!(big.get_pixel(x, y).0, expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn filter_resampler_keeps_flat_colour() {
        let img = RgbaImage::from_pixel(30, 30, Rgba([90, 120, 150, 255]));
        let small = FilterResampler::new(FilterType::Triangle).resample(&img, 2, 2, true);
        assert_eq!(small.dimensions(), (2, 2));
        for p in small.pixels() {
            for (got, want) in p.0.iter().zip([90u8, 120, 150, 255]) {
                assert!(got.abs_diff(want) <= 1);
            }
        }
    }

    #[test]
    fn smoothing_filter_names_round_trip() {
        for f in [
            SmoothingFilter::Area,
            SmoothingFilter::Triangle,
            SmoothingFilter::CatmullRom,
            SmoothingFilter::Lanczos3,
        ] {
            assert_eq!(SmoothingFilter::parse(f.as_str()), Some(f));
        }
        assert_eq!(SmoothingFilter::parse("bogus"), None);
    }
}
