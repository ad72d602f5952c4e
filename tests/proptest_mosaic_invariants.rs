//! Property-based invariant tests for the mosaic transform.
//!
//! 1. Pixels outside the (clipped) rectangle are never touched.
//! 2. Re-applying the mosaic over the same rectangle is a fixed point.
//! 3. The normalized selection does not depend on drag direction.
//! 4. Display → image and image → display → image mappings round-trip.

use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use redactfe::geometry::{CoordinateMapper, DisplayRect, ImagePoint, Rect, normalize_selection};
use redactfe::ops::mosaic::apply_mosaic;
use redactfe::ops::resample::{AreaResampler, SmoothingFilter};

// ── Helpers ─────────────────────────────────────────────────────────────

fn noise(w: u32, h: u32, seed: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let v = x.wrapping_mul(73).wrapping_add(y.wrapping_mul(151)).wrapping_add(seed);
        Rgba([v as u8, (v >> 3) as u8, (v >> 6) as u8, 255])
    })
}

fn image_and_rect() -> impl Strategy<Value = (u32, u32, u32, Rect, u32)> {
    (8u32..=96, 8u32..=96, any::<u32>(), 1u32..=24).prop_flat_map(|(w, h, seed, k)| {
        let x = -20i32..(w as i32 + 20);
        let y = -20i32..(h as i32 + 20);
        let rw = 1u32..=(w + 20);
        let rh = 1u32..=(h + 20);
        (Just(w), Just(h), Just(seed), (x, y, rw, rh), Just(k)).prop_map(
            |(w, h, seed, (x, y, rw, rh), k)| (w, h, seed, Rect::new(x, y, rw, rh), k),
        )
    })
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Outside pixels are untouched
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn outside_pixels_unchanged((w, h, seed, rect, k) in image_and_rect()) {
        let original = noise(w, h, seed);
        let mut buf = original.clone();
        let written = apply_mosaic(&mut buf, rect, k, &AreaResampler);

        match written {
            Some(clipped) => {
                prop_assert_eq!(Some(clipped), rect.clip(w, h));
                for (x, y, px) in buf.enumerate_pixels() {
                    if !clipped.contains(x, y) {
                        prop_assert_eq!(px, original.get_pixel(x, y), "({}, {}) changed", x, y);
                    }
                }
            }
            None => prop_assert_eq!(&buf, &original),
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Mosaic is idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reapplying_is_a_fixed_point((w, h, seed, rect, k) in image_and_rect()) {
        let mut once = noise(w, h, seed);
        apply_mosaic(&mut once, rect, k, &AreaResampler);
        let mut twice = once.clone();
        apply_mosaic(&mut twice, rect, k, &AreaResampler);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn every_filter_keeps_outside_pixels(
        (w, h, seed, rect, k) in image_and_rect(),
        filter in prop_oneof![
            Just(SmoothingFilter::Area),
            Just(SmoothingFilter::Triangle),
            Just(SmoothingFilter::CatmullRom),
            Just(SmoothingFilter::Lanczos3),
        ],
    ) {
        let original = noise(w, h, seed);
        let mut buf = original.clone();
        let resampler = filter.resampler();
        if let Some(clipped) = apply_mosaic(&mut buf, rect, k, resampler.as_ref()) {
            for (x, y, px) in buf.enumerate_pixels() {
                if !clipped.contains(x, y) {
                    prop_assert_eq!(px, original.get_pixel(x, y));
                }
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Selection normalization
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn normalization_is_symmetric(
        ax in -500.0f32..500.0, ay in -500.0f32..500.0,
        bx in -500.0f32..500.0, by in -500.0f32..500.0,
    ) {
        let a = ImagePoint::new(ax, ay);
        let b = ImagePoint::new(bx, by);
        let r = normalize_selection(a, b);
        prop_assert_eq!(r, normalize_selection(b, a));
        prop_assert_eq!(r.x as f32, ax.round().min(bx.round()));
        prop_assert_eq!(r.y as f32, ay.round().min(by.round()));
        prop_assert_eq!(r.width as f32, (ax.round() - bx.round()).abs());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Mapping round-trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn mapping_round_trips(
        left in -200.0f32..200.0, top in -200.0f32..200.0,
        dw in 10.0f32..2000.0, dh in 10.0f32..2000.0,
        bw in 1u32..4000, bh in 1u32..4000,
        fx in 0.0f32..1.0, fy in 0.0f32..1.0,
        rw in 1u32..500, rh in 1u32..500,
    ) {
        let mapper = CoordinateMapper::new(DisplayRect::new(left, top, dw, dh), bw, bh).unwrap();
        let (sx, sy) = mapper.scale();

        // display → image
        let p = mapper.to_image(left + fx * dw, top + fy * dh);
        prop_assert!((p.x - fx * bw as f32).abs() <= bw as f32 * 1e-4 + 1e-3);
        prop_assert!((p.y - fy * bh as f32).abs() <= bh as f32 * 1e-4 + 1e-3);

        // image → display → image
        let rect = Rect::new((fx * bw as f32) as i32, (fy * bh as f32) as i32, rw, rh);
        let d = mapper.to_display(rect);
        let near = |got: f32, want: f32, origin: f32, scale: f32| {
            (got - want).abs() <= 1e-3 + 1e-5 * (want.abs() + origin.abs() * scale)
        };
        let a = mapper.to_image(d.left, d.top);
        let b = mapper.to_image(d.left + d.width, d.top + d.height);
        prop_assert!(near(a.x, rect.x as f32, left, sx), "{} vs {}", a.x, rect.x);
        prop_assert!(near(a.y, rect.y as f32, top, sy), "{} vs {}", a.y, rect.y);
        prop_assert!(near(b.x, rect.right() as f32, left, sx), "{} vs {}", b.x, rect.right());
        prop_assert!(near(b.y, rect.bottom() as f32, top, sy), "{} vs {}", b.y, rect.bottom());
    }
}
