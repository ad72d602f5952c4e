// ============================================================================
// GEOMETRY — display-space → image-space mapping and selection rectangles
// ============================================================================
//
// The canvas is shown scaled to fit the workspace, but the pixel buffer always
// keeps the image's natural resolution. Every pointer position therefore goes
// through `CoordinateMapper` before it touches pixels, and every pair of drag
// end-points goes through `normalize_selection` before the mosaic sees it.

use crate::error::SessionError;

/// Selections narrower or shorter than this are treated as accidental clicks.
pub const DEFAULT_MIN_SELECTION: u32 = 5;

/// A point in image space (buffer pixels, possibly fractional).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// On-screen bounding box of the canvas, in display units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Image-space rectangle. Width and height are magnitudes, never negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        let (px, py) = (px as i64, py as i64);
        px >= self.x as i64 && px < self.right() && py >= self.y as i64 && py < self.bottom()
    }

    /// Intersect with a `buffer_width × buffer_height` buffer anchored at the
    /// origin. Returns `None` when nothing of the rectangle is inside.
    pub fn clip(&self, buffer_width: u32, buffer_height: u32) -> Option<Rect> {
        let x0 = (self.x as i64).clamp(0, buffer_width as i64);
        let y0 = (self.y as i64).clamp(0, buffer_height as i64);
        let x1 = self.right().clamp(0, buffer_width as i64);
        let y1 = self.bottom().clamp(0, buffer_height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(
            x0 as i32,
            y0 as i32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ ({}, {})", self.width, self.height, self.x, self.y)
    }
}

// ============================================================================
// COORDINATE MAPPER
// ============================================================================

/// Maps pointer positions on the displayed canvas to buffer pixels.
///
/// `scale = buffer size / displayed size`, independently per axis, so a canvas
/// squeezed non-uniformly by layout still maps correctly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    bounds: DisplayRect,
    scale_x: f32,
    scale_y: f32,
}

impl CoordinateMapper {
    pub fn new(
        bounds: DisplayRect,
        buffer_width: u32,
        buffer_height: u32,
    ) -> Result<Self, SessionError> {
        let usable = |v: f32| v.is_finite() && v > 0.0;
        if !usable(bounds.width) || !usable(bounds.height) {
            return Err(SessionError::InvalidGeometry(format!(
                "canvas displayed at {}x{}",
                bounds.width, bounds.height
            )));
        }
        if !bounds.left.is_finite() || !bounds.top.is_finite() {
            return Err(SessionError::InvalidGeometry(
                "canvas origin is not finite".into(),
            ));
        }
        if buffer_width == 0 || buffer_height == 0 {
            return Err(SessionError::InvalidGeometry(format!(
                "backing buffer is {}x{}",
                buffer_width, buffer_height
            )));
        }
        Ok(Self {
            bounds,
            scale_x: buffer_width as f32 / bounds.width,
            scale_y: buffer_height as f32 / bounds.height,
        })
    }

    pub fn scale(&self) -> (f32, f32) {
        (self.scale_x, self.scale_y)
    }

    /// Pointer position (same units as the bounding box) → image space.
    pub fn to_image(&self, client_x: f32, client_y: f32) -> ImagePoint {
        ImagePoint {
            x: (client_x - self.bounds.left) * self.scale_x,
            y: (client_y - self.bounds.top) * self.scale_y,
        }
    }

    /// Image-space rectangle → display rectangle, for drawing overlays.
    pub fn to_display(&self, rect: Rect) -> DisplayRect {
        DisplayRect {
            left: self.bounds.left + rect.x as f32 / self.scale_x,
            top: self.bounds.top + rect.y as f32 / self.scale_y,
            width: rect.width as f32 / self.scale_x,
            height: rect.height as f32 / self.scale_y,
        }
    }
}

/// One-shot form of [`CoordinateMapper::to_image`].
pub fn map_pointer(
    client_x: f32,
    client_y: f32,
    bounds: DisplayRect,
    buffer_width: u32,
    buffer_height: u32,
) -> Result<ImagePoint, SessionError> {
    CoordinateMapper::new(bounds, buffer_width, buffer_height)
        .map(|m| m.to_image(client_x, client_y))
}

// ============================================================================
// SELECTION NORMALIZER
// ============================================================================

/// Canonical rectangle spanned by two drag end-points, in any order.
///
/// End-points are rounded to whole pixels first; a negative delta moves the
/// origin back by its magnitude.
pub fn normalize_selection(start: ImagePoint, end: ImagePoint) -> Rect {
    let sx = round_px(start.x);
    let sy = round_px(start.y);
    let dx = round_px(end.x) - sx;
    let dy = round_px(end.y) - sy;

    let (x, width) = if dx < 0 { (sx + dx, -dx) } else { (sx, dx) };
    let (y, height) = if dy < 0 { (sy + dy, -dy) } else { (sy, dy) };

    Rect::new(
        clamp_i32(x),
        clamp_i32(y),
        width.min(u32::MAX as i64) as u32,
        height.min(u32::MAX as i64) as u32,
    )
}

/// Rejects selections below `min_size` on either axis.
pub fn accept_selection(rect: Rect, min_size: u32) -> Result<Rect, SessionError> {
    if rect.width < min_size || rect.height < min_size || rect.is_empty() {
        return Err(SessionError::NegligibleSelection {
            width: rect.width,
            height: rect.height,
        });
    }
    Ok(rect)
}

/// Normalize + threshold in one step.
pub fn select(start: ImagePoint, end: ImagePoint, min_size: u32) -> Result<Rect, SessionError> {
    accept_selection(normalize_selection(start, end), min_size)
}

fn round_px(v: f32) -> i64 {
    if v.is_finite() { v.round() as i64 } else { 0 }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
