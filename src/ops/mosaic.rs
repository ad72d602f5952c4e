// ============================================================================
// MOSAIC — irreversible pixelation of one rectangle, in place
// ============================================================================
//
// Shrink the region by the reduction factor with smoothing, then blow it back
// up with nearest-neighbour sampling. Block size stays uniform whatever the
// rectangle's size, and nothing outside the (clipped) rectangle is read or
// written.

use image::RgbaImage;

use crate::geometry::Rect;
use crate::ops::resample::Resampler;

/// Default shrink factor: one block per ~15×15 source pixels.
pub const DEFAULT_REDUCTION_FACTOR: u32 = 15;

/// Scratch-buffer size for a `width × height` region.
///
/// `max(1, round(len / factor))` per axis; a zero would leave an empty scratch
/// buffer and an undefined region.
pub fn block_grid(width: u32, height: u32, factor: u32) -> (u32, u32) {
    let k = factor.max(1) as f64;
    let shrink = |len: u32| ((len as f64 / k).round() as u32).clamp(1, len.max(1));
    (shrink(width), shrink(height))
}

/// Copy the `rect` region out of `buffer`. `rect` must already be clipped.
pub(crate) fn extract_region(buffer: &RgbaImage, rect: Rect) -> RgbaImage {
    let stride = buffer.width() as usize * 4;
    let row_len = rect.width as usize * 4;
    let src = buffer.as_raw();
    let mut out = Vec::with_capacity(row_len * rect.height as usize);
    for y in rect.y as usize..rect.y as usize + rect.height as usize {
        let start = y * stride + rect.x as usize * 4;
        out.extend_from_slice(&src[start..start + row_len]);
    }
    RgbaImage::from_raw(rect.width, rect.height, out)
        .unwrap_or_else(|| RgbaImage::new(rect.width, rect.height))
}

/// Paste `patch` into `buffer` at the clipped `rect`'s origin.
pub(crate) fn write_region(buffer: &mut RgbaImage, rect: Rect, patch: &RgbaImage) {
    let stride = buffer.width() as usize * 4;
    let row_len = rect.width as usize * 4;
    let src = patch.as_raw();
    let dst: &mut [u8] = buffer;
    for row in 0..rect.height as usize {
        let d = (rect.y as usize + row) * stride + rect.x as usize * 4;
        let s = row * row_len;
        dst[d..d + row_len].copy_from_slice(&src[s..s + row_len]);
    }
}

/// Pixelate `rect` inside `buffer`.
///
/// Returns the rectangle that was actually rewritten (after clipping to the
/// buffer), or `None` when the rectangle misses the buffer entirely.
pub fn apply_mosaic(
    buffer: &mut RgbaImage,
    rect: Rect,
    factor: u32,
    resampler: &dyn Resampler,
) -> Option<Rect> {
    let clipped = rect.clip(buffer.width(), buffer.height())?;
    let (small_w, small_h) = block_grid(clipped.width, clipped.height, factor);

    let region = extract_region(buffer, clipped);
    let small = resampler.resample(&region, small_w, small_h, true);
    let blocky = resampler.resample(&small, clipped.width, clipped.height, false);
    if blocky.dimensions() != (clipped.width, clipped.height) {
        return None;
    }

    write_region(buffer, clipped, &blocky);
    Some(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::resample::AreaResampler;
    use image::Rgba;
    use std::collections::HashSet;

    /// Every pixel different: a diagonal gradient with a checker twist.
    fn noisy(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 7 + y * 3) as u8,
                (x * 13 ^ y * 5) as u8,
                ((x + y) % 2 * 200) as u8,
                255,
            ])
        })
    }

    #[test]
    fn block_grid_rounds_and_floors_to_one() {
        assert_eq!(block_grid(100, 60, 15), (7, 4));
        assert_eq!(block_grid(150, 90, 15), (10, 6));
        assert_eq!(block_grid(5, 3, 15), (1, 1));
        assert_eq!(block_grid(40, 40, 0), (40, 40));
    }

    #[test]
    fn pixels_outside_rect_are_untouched() {
        let before = noisy(120, 80);
        let mut after = before.clone();
        let rect = Rect::new(20, 10, 47, 33);
        let written = apply_mosaic(&mut after, rect, 15, &AreaResampler);
        assert_eq!(written, Some(rect));
        for (x, y, p) in before.enumerate_pixels() {
            if !rect.contains(x, y) {
                assert_eq!(after.get_pixel(x, y), p, "outside pixel ({}, {}) changed", x, y);
            }
        }
        assert_ne!(before, after);
    }

    #[test]
    fn region_collapses_to_uniform_blocks() {
        let mut img = noisy(150, 90);
        let rect = Rect::new(0, 0, 150, 90);
        apply_mosaic(&mut img, rect, 15, &AreaResampler);

        let colours: HashSet<[u8; 4]> = img.pixels().map(|p| p.0).collect();
        assert!(colours.len() <= 10 * 6);
        for by in 0..6 {
            for bx in 0..10 {
                let first = *img.get_pixel(bx * 15, by * 15);
                for y in by * 15..(by + 1) * 15 {
                    for x in bx * 15..(bx + 1) * 15 {
                        assert_eq!(*img.get_pixel(x, y), first);
                    }
                }
            }
        }
    }

    #[test]
    fn second_application_is_a_fixed_point() {
        let mut img = noisy(97, 61);
        let rect = Rect::new(3, 4, 83, 51);
        apply_mosaic(&mut img, rect, 15, &AreaResampler);
        let once = img.clone();
        apply_mosaic(&mut img, rect, 15, &AreaResampler);
        assert_eq!(once, img);
    }

    #[test]
    fn partially_outside_rect_is_clipped() {
        let before = noisy(40, 30);
        let mut after = before.clone();
        let written = apply_mosaic(&mut after, Rect::new(25, -5, 50, 20), 15, &AreaResampler);
        assert_eq!(written, Some(Rect::new(25, 0, 15, 15)));
        for (x, y, p) in before.enumerate_pixels() {
            if x < 25 || y >= 15 {
                assert_eq!(after.get_pixel(x, y), p);
            }
        }
    }

    #[test]
    fn rect_outside_buffer_is_a_no_op() {
        let before = noisy(20, 20);
        let mut after = before.clone();
        assert_eq!(apply_mosaic(&mut after, Rect::new(30, 30, 10, 10), 15, &AreaResampler), None);
        assert_eq!(before, after);
    }

    #[test]
    fn tiny_region_becomes_single_average_block() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([200, 200, 200, 255]));
        img.put_pixel(2, 1, Rgba([200, 200, 200, 255]));
        let rect = Rect::new(1, 1, 2, 2);
        apply_mosaic(&mut img, rect, 15, &AreaResampler);
        for y in 1..3 {
            for x in 1..3 {
                assert_eq!(img.get_pixel(x, y), &Rgba([100, 100, 100, 255]));
            }
        }
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }
}
