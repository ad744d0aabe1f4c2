use std::fmt;
use std::time::Instant;

use image::{Rgb, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::ops::filters::MonochromePreview;

/// Canvas background: opaque white.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasError {
    OutOfBounds { x: i32, y: i32, width: u32, height: u32 },
    DimensionMismatch { expected: (u32, u32), found: (u32, u32) },
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasError::OutOfBounds { x, y, width, height } => {
                write!(f, "Pixel ({}, {}) is outside the {}x{} canvas", x, y, width, height)
            }
            CanvasError::DimensionMismatch { expected, found } => write!(
                f,
                "Snapshot is {}x{} but the canvas is {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for CanvasError {}

// ============================================================================
// RECTANGLES
// ============================================================================

/// Integer pixel rectangle.  Used for selections and dirty regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalised rectangle spanned by two drag corners, clamped to a
    /// `canvas_w` x `canvas_h` surface.  `None` when nothing of it remains.
    pub fn from_corners(a: (i32, i32), b: (i32, i32), canvas_w: u32, canvas_h: u32) -> Option<Self> {
        let min_x = a.0.min(b.0).max(0) as i64;
        let min_y = a.1.min(b.1).max(0) as i64;
        let max_x = (a.0.max(b.0) as i64).min(canvas_w as i64);
        let max_y = (a.1.max(b.1) as i64).min(canvas_h as i64);
        if max_x <= min_x || max_y <= min_y {
            return None;
        }
        Some(Self {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x as i32 && y >= self.y as i32 && x < self.right() as i32 && y < self.bottom() as i32
    }

    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PixelRect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Rectangle covering the float bounds `[min, max]`, clamped to the canvas.
    pub fn from_bounds_f32(min: (f32, f32), max: (f32, f32), canvas_w: u32, canvas_h: u32) -> Option<Self> {
        Self::from_corners(
            (min.0.floor() as i32, min.1.floor() as i32),
            (max.0.ceil() as i32 + 1, max.1.ceil() as i32 + 1),
            canvas_w,
            canvas_h,
        )
    }
}

// ============================================================================
// PIXEL MATH
// ============================================================================

/// Source-over blend of `top` (non-premultiplied) onto `base`, with `top`'s
/// alpha further scaled by `opacity`.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let opacity = opacity.clamp(0.0, 1.0);
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let top_a = (top[3] as f32 / 255.0) * opacity;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let t = top[c] as f32 / 255.0;
        let b = base[c] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        out[c] = to_byte(v);
    }
    out[3] = to_byte(out_a);
    Rgba(out)
}

/// Destination-out: removes `strength` of the existing alpha, colour kept.
pub fn erase_pixel(base: Rgba<u8>, strength: f32) -> Rgba<u8> {
    let strength = strength.clamp(0.0, 1.0);
    if strength >= 1.0 {
        return Rgba([base[0], base[1], base[2], 0]);
    }
    let a = base[3] as f32 / 255.0 * (1.0 - strength);
    Rgba([base[0], base[1], base[2], to_byte(a)])
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

#[inline]
pub fn opaque(color: Rgb<u8>) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], 255])
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Immutable deep copy of the surface taken at one point in time.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pixels: RgbaImage,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

// ============================================================================
// SURFACE
// ============================================================================

/// The single flat RGBA buffer the editor paints into.
///
/// Pointer-driven helpers (`blend_at`, `erase_at`, `put_clipped`) take signed
/// coordinates and silently drop anything outside the buffer.  The strict
/// `read_pixel` / `write_pixel` pair reports out-of-range access instead.
#[derive(Clone, Debug)]
pub struct Surface {
    pixels: RgbaImage,
    dirty: Option<PixelRect>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, BACKGROUND),
            dirty: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// True for a zero-area surface; every edit is a no-op then.
    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub(crate) fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.pixels.width() && (y as u32) < self.pixels.height()
    }

    fn check(&self, x: i32, y: i32) -> Result<(), CanvasError> {
        if self.in_bounds(x, y) {
            Ok(())
        } else {
            Err(CanvasError::OutOfBounds {
                x,
                y,
                width: self.width(),
                height: self.height(),
            })
        }
    }

    pub fn read_pixel(&self, x: i32, y: i32) -> Result<Rgba<u8>, CanvasError> {
        self.check(x, y)?;
        Ok(*self.pixels.get_pixel(x as u32, y as u32))
    }

    /// Overwrites one pixel; no blending.
    pub fn write_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) -> Result<(), CanvasError> {
        self.check(x, y)?;
        self.pixels.put_pixel(x as u32, y as u32, color);
        self.mark_dirty(Some(PixelRect::new(x as u32, y as u32, 1, 1)));
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pixels: self.pixels.clone(),
        }
    }

    /// Replace the contents with `snapshot`.  Dimensions must match.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), CanvasError> {
        if snapshot.width() != self.width() || snapshot.height() != self.height() {
            return Err(CanvasError::DimensionMismatch {
                expected: (self.width(), self.height()),
                found: (snapshot.width(), snapshot.height()),
            });
        }
        self.pixels.copy_from_slice(snapshot.pixels.as_raw());
        self.mark_dirty(None);
        Ok(())
    }

    /// Reallocate to `width` x `height`.  Existing pixels keep their position
    /// from the origin; newly exposed area is background white.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width() && height == self.height() {
            return;
        }
        let mut next = RgbaImage::from_pixel(width, height, BACKGROUND);
        let copy_w = width.min(self.width()) as usize;
        let copy_h = height.min(self.height());
        if copy_w > 0 {
            let src_stride = self.width() as usize * 4;
            let dst_stride = width as usize * 4;
            let src = self.pixels.as_raw();
            let dst: &mut [u8] = &mut next;
            for y in 0..copy_h as usize {
                let s = y * src_stride;
                let d = y * dst_stride;
                dst[d..d + copy_w * 4].copy_from_slice(&src[s..s + copy_w * 4]);
            }
        }
        self.pixels = next;
        self.dirty = None;
        self.mark_dirty(None);
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.pixels.pixels_mut() {
            *px = color;
        }
        self.mark_dirty(None);
    }

    /// Overwrite every pixel of `rect` (clipped) with `color`.
    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgba<u8>) {
        let Some(rect) = self.clip(rect) else { return };
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                self.pixels.put_pixel(x, y, color);
            }
        }
        self.mark_dirty(Some(rect));
    }

    /// Source-over `color` at `alpha` onto one pixel.  Off-canvas is ignored.
    #[inline]
    pub fn blend_at(&mut self, x: i32, y: i32, color: Rgba<u8>, alpha: f32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let px = self.pixels.get_pixel_mut(x as u32, y as u32);
        *px = blend_over(*px, color, alpha);
    }

    #[inline]
    pub fn erase_at(&mut self, x: i32, y: i32, strength: f32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let px = self.pixels.get_pixel_mut(x as u32, y as u32);
        *px = erase_pixel(*px, strength);
    }

    #[inline]
    pub fn put_clipped(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if self.in_bounds(x, y) {
            self.pixels.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Copy of exactly the pixels inside `rect` (clipped to the surface).
    pub fn copy_region(&self, rect: PixelRect) -> Option<RgbaImage> {
        let rect = self.clip(rect)?;
        Some(image::imageops::crop_imm(&self.pixels, rect.x, rect.y, rect.width, rect.height).to_image())
    }

    /// Overwrite the area at (`dst_x`, `dst_y`) with `src`, clipped.
    pub fn blit(&mut self, src: &RgbaImage, dst_x: i32, dst_y: i32) {
        for (sx, sy, px) in src.enumerate_pixels() {
            self.put_clipped(dst_x + sx as i32, dst_y + sy as i32, *px);
        }
        if let Some(r) = PixelRect::from_corners(
            (dst_x, dst_y),
            (dst_x + src.width() as i32, dst_y + src.height() as i32),
            self.width(),
            self.height(),
        ) {
            self.mark_dirty(Some(r));
        }
    }

    fn clip(&self, rect: PixelRect) -> Option<PixelRect> {
        PixelRect::from_corners(
            (rect.x as i32, rect.y as i32),
            (rect.right() as i32, rect.bottom() as i32),
            self.width(),
            self.height(),
        )
    }

    /// Record a changed region; `None` means the whole surface.
    pub fn mark_dirty(&mut self, rect: Option<PixelRect>) {
        let full = PixelRect::new(0, 0, self.width(), self.height());
        let rect = rect.unwrap_or(full);
        if rect.is_empty() {
            return;
        }
        self.dirty = Some(match self.dirty {
            Some(existing) => existing.union(&rect),
            None => rect,
        });
    }

    /// Region changed since the last call, for incremental repaint.
    pub fn take_dirty(&mut self) -> Option<PixelRect> {
        self.dirty.take()
    }
}

// ============================================================================
// CANVAS STATE
// ============================================================================

/// The surface plus the non-destructive overlay used for shape and selection
/// previews, and the transient monochrome preview.
pub struct CanvasState {
    pub surface: Surface,
    overlay: RgbaImage,
    overlay_used: bool,
    preview: Option<MonochromePreview>,
}

impl CanvasState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Surface::new(width, height),
            overlay: RgbaImage::new(width, height),
            overlay_used: false,
            preview: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn is_empty(&self) -> bool {
        self.surface.is_empty()
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay_used
    }

    pub fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    /// Clears the overlay and hands it out for a fresh preview frame.
    pub fn begin_overlay(&mut self) -> &mut RgbaImage {
        self.clear_overlay();
        self.overlay_used = true;
        self.surface.mark_dirty(None);
        &mut self.overlay
    }

    pub fn clear_overlay(&mut self) {
        if self.overlay_used {
            for px in self.overlay.pixels_mut() {
                *px = TRANSPARENT;
            }
            self.overlay_used = false;
            self.surface.mark_dirty(None);
        }
    }

    /// Resize surface and overlay together.  Drops any preview.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
        if self.overlay.dimensions() != (width, height) {
            self.overlay = RgbaImage::new(width, height);
        }
        self.overlay_used = false;
        self.preview = None;
    }

    /// Surface with the overlay composited on top.
    pub fn composite(&self) -> RgbaImage {
        let mut out = self.surface.image().clone();
        if !self.overlay_used || self.is_empty() {
            return out;
        }
        let row_len = self.width() as usize * 4;
        let overlay = self.overlay.as_raw();
        let dst: &mut [u8] = &mut out;
        dst.par_chunks_mut(row_len)
            .zip(overlay.par_chunks(row_len))
            .for_each(|(row, top_row)| {
                for (px, top) in row.chunks_exact_mut(4).zip(top_row.chunks_exact(4)) {
                    if top[3] == 0 {
                        continue;
                    }
                    let base = Rgba([px[0], px[1], px[2], px[3]]);
                    let top = Rgba([top[0], top[1], top[2], top[3]]);
                    px.copy_from_slice(&blend_over(base, top, 1.0).0);
                }
            });
        out
    }

    pub fn set_preview(&mut self, preview: MonochromePreview) {
        self.preview = Some(preview);
        self.surface.mark_dirty(None);
    }

    pub fn preview_active(&self) -> bool {
        self.preview.is_some()
    }

    /// Drops an expired monochrome preview.  Returns true if one was removed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.preview.as_ref().is_some_and(|p| p.expired(now)) {
            self.preview = None;
            self.surface.mark_dirty(None);
            return true;
        }
        false
    }

    /// What the UI should paint right now.
    pub fn display_image(&mut self, now: Instant) -> RgbaImage {
        self.tick(now);
        match &self.preview {
            Some(p) => p.image().clone(),
            None => self.composite(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_white() {
        let s = Surface::new(4, 3);
        assert_eq!(s.image().as_raw().len(), 4 * 3 * 4);
        assert!(s.image().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn read_and_write_report_out_of_bounds() {
        let mut s = Surface::new(10, 10);
        assert!(matches!(s.read_pixel(10, 0), Err(CanvasError::OutOfBounds { .. })));
        assert!(matches!(s.read_pixel(-1, 3), Err(CanvasError::OutOfBounds { .. })));
        assert!(s.write_pixel(0, 10, BACKGROUND).is_err());

        let red = Rgba([255, 0, 0, 255]);
        s.write_pixel(3, 4, red).unwrap();
        s.write_pixel(3, 4, Rgba([0, 0, 255, 128])).unwrap();
        assert_eq!(s.read_pixel(3, 4).unwrap(), Rgba([0, 0, 255, 128]));
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let mut s = Surface::new(5, 5);
        let snap = s.snapshot();
        s.write_pixel(1, 1, Rgba([0, 0, 0, 255])).unwrap();
        assert_eq!(*snap.pixels().get_pixel(1, 1), BACKGROUND);
        s.restore(&snap).unwrap();
        assert_eq!(s.read_pixel(1, 1).unwrap(), BACKGROUND);
    }

    #[test]
    fn restore_rejects_other_dimensions() {
        let small = Surface::new(2, 2).snapshot();
        let mut s = Surface::new(3, 2);
        let err = s.restore(&small).unwrap_err();
        assert_eq!(
            err,
            CanvasError::DimensionMismatch { expected: (3, 2), found: (2, 2) }
        );
    }

    #[test]
    fn resize_shrink_then_grow_keeps_origin_content() {
        let mut s = Surface::new(100, 100);
        let black = Rgba([0, 0, 0, 255]);
        s.write_pixel(10, 10, black).unwrap();
        s.write_pixel(80, 80, black).unwrap();

        s.resize(50, 50);
        assert_eq!(s.read_pixel(10, 10).unwrap(), black);

        s.resize(100, 100);
        assert_eq!(s.read_pixel(10, 10).unwrap(), black);
        assert_eq!(s.read_pixel(80, 80).unwrap(), BACKGROUND);
    }

    #[test]
    fn zero_sized_surface_is_empty() {
        let s = Surface::new(0, 0);
        assert!(s.is_empty());
        assert!(s.read_pixel(0, 0).is_err());
        assert!(s.copy_region(PixelRect::new(0, 0, 1, 1)).is_none());
    }

    #[test]
    fn rect_from_corners_normalises_and_clamps() {
        let r = PixelRect::from_corners((30, 40), (10, 5), 20, 100).unwrap();
        assert_eq!(r, PixelRect::new(10, 5, 10, 35));
        assert!(PixelRect::from_corners((5, 5), (5, 9), 20, 20).is_none());
        assert!(PixelRect::from_corners((-10, -10), (-1, -1), 20, 20).is_none());
    }

    #[test]
    fn blend_over_full_opacity_replaces() {
        let top = Rgba([10, 20, 30, 255]);
        assert_eq!(blend_over(BACKGROUND, top, 1.0), top);
        assert_eq!(blend_over(BACKGROUND, top, 0.0), BACKGROUND);
        let half = blend_over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), 0.5);
        assert!(half[0] >= 127 && half[0] <= 128);
        assert_eq!(half[3], 255);
    }

    #[test]
    fn erase_removes_alpha() {
        assert_eq!(erase_pixel(BACKGROUND, 1.0)[3], 0);
        assert_eq!(erase_pixel(BACKGROUND, 0.5)[3], 128);
    }

    #[test]
    fn dirty_regions_accumulate_until_taken() {
        let mut s = Surface::new(20, 20);
        s.write_pixel(2, 2, BACKGROUND).unwrap();
        s.write_pixel(5, 7, BACKGROUND).unwrap();
        assert_eq!(s.take_dirty(), Some(PixelRect::new(2, 2, 4, 6)));
        assert_eq!(s.take_dirty(), None);
    }

    #[test]
    fn composite_draws_overlay_without_touching_surface() {
        let mut c = CanvasState::new(4, 4);
        c.begin_overlay().put_pixel(1, 1, Rgba([0, 0, 255, 255]));
        let shown = c.composite();
        assert_eq!(*shown.get_pixel(1, 1), Rgba([0, 0, 255, 255]));
        assert_eq!(c.surface.read_pixel(1, 1).unwrap(), BACKGROUND);
        c.clear_overlay();
        assert_eq!(*c.composite().get_pixel(1, 1), BACKGROUND);
    }
}
