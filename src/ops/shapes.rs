use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{PixelRect, Surface, blend_over};

/// Stroke width of outlined shapes.
pub const OUTLINE_WIDTH: f32 = 2.0;

/// Sides of the polygon tool's regular polygon.
const POLYGON_SIDES: u32 = 8;
const STAR_POINTS: u32 = 5;
const STAR_INNER_RATIO: f32 = 0.4;

/// Shape primitives drawn by dragging from an anchor to a release point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangle,
    /// Centred on the anchor; radius is the drag distance.
    Circle,
    Line,
    Polygon,
    Star,
    /// Points from the anchor towards the release point.
    Arrow,
}

impl ShapeKind {
    pub fn all() -> &'static [ShapeKind] {
        &[
            ShapeKind::Rectangle,
            ShapeKind::Circle,
            ShapeKind::Line,
            ShapeKind::Polygon,
            ShapeKind::Star,
            ShapeKind::Arrow,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Circle => "Circle",
            ShapeKind::Line => "Line",
            ShapeKind::Polygon => "Polygon",
            ShapeKind::Star => "Star",
            ShapeKind::Arrow => "Arrow",
        }
    }
}

/// How a shape is painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ShapeFillMode {
    #[default]
    Outline,
    Filled,
}

impl ShapeFillMode {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeFillMode::Outline => "outline",
            ShapeFillMode::Filled => "filled",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outline" => Some(ShapeFillMode::Outline),
            "filled" | "fill" => Some(ShapeFillMode::Filled),
            _ => None,
        }
    }
}

/// A shape fully described by its drag gesture.
#[derive(Clone, Debug)]
pub struct PlacedShape {
    pub kind: ShapeKind,
    pub anchor: (f32, f32),
    pub end: (f32, f32),
    pub fill_mode: ShapeFillMode,
    /// Outline width; for `Line` the full stroke width.
    pub stroke_width: f32,
    pub color: Rgba<u8>,
    pub anti_alias: bool,
}

/// Local frame the SDF is evaluated in: centre, half extents, rotation.
#[derive(Clone, Copy, Debug)]
struct Frame {
    cx: f32,
    cy: f32,
    hx: f32,
    hy: f32,
    rotation: f32,
}

impl PlacedShape {
    fn drag_length(&self) -> f32 {
        let dx = self.end.0 - self.anchor.0;
        let dy = self.end.1 - self.anchor.1;
        (dx * dx + dy * dy).sqrt()
    }

    /// True when the drag produced nothing drawable (zero area or length).
    pub fn is_degenerate(&self) -> bool {
        match self.kind {
            ShapeKind::Circle | ShapeKind::Line | ShapeKind::Arrow => self.drag_length() < 0.5,
            _ => {
                (self.end.0 - self.anchor.0).abs() < 0.5 || (self.end.1 - self.anchor.1).abs() < 0.5
            }
        }
    }

    fn frame(&self) -> Frame {
        match self.kind {
            ShapeKind::Circle => {
                let r = self.drag_length();
                Frame { cx: self.anchor.0, cy: self.anchor.1, hx: r, hy: r, rotation: 0.0 }
            }
            ShapeKind::Line | ShapeKind::Arrow => {
                let len = self.drag_length();
                let dx = self.end.0 - self.anchor.0;
                let dy = self.end.1 - self.anchor.1;
                Frame {
                    cx: (self.anchor.0 + self.end.0) * 0.5,
                    cy: (self.anchor.1 + self.end.1) * 0.5,
                    hx: len * 0.5,
                    hy: (len * 0.3).max(self.stroke_width),
                    rotation: dy.atan2(dx),
                }
            }
            _ => Frame {
                cx: (self.anchor.0 + self.end.0) * 0.5,
                cy: (self.anchor.1 + self.end.1) * 0.5,
                hx: (self.end.0 - self.anchor.0).abs() * 0.5,
                hy: (self.end.1 - self.anchor.1).abs() * 0.5,
                rotation: 0.0,
            },
        }
    }

    /// Signed distance in the shape's local frame (negative inside).
    fn local_sdf(&self, frame: &Frame, lx: f32, ly: f32) -> f32 {
        let (hx, hy) = (frame.hx, frame.hy);
        match self.kind {
            ShapeKind::Rectangle => sdf_box(lx, ly, hx, hy),
            ShapeKind::Circle => (lx * lx + ly * ly).sqrt() - hx,
            ShapeKind::Line => sdf_line_segment(lx, ly, -hx, 0.0, hx, 0.0) - self.stroke_width * 0.5,
            ShapeKind::Polygon => sdf_polygon(lx, ly, hx.min(hy), POLYGON_SIDES),
            ShapeKind::Star => {
                let r = hx.min(hy);
                sdf_star(lx, ly, r, r * STAR_INNER_RATIO, STAR_POINTS)
            }
            ShapeKind::Arrow => sdf_arrow(lx, ly, hx, hy),
        }
    }

    fn coverage(&self, d: f32) -> f32 {
        let edge = match (self.kind, self.fill_mode) {
            (ShapeKind::Line, _) | (_, ShapeFillMode::Filled) => d,
            (_, ShapeFillMode::Outline) => d.abs() - self.stroke_width * 0.5,
        };
        if self.anti_alias {
            smoothstep(0.5, -0.5, edge)
        } else if edge < 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// SDF functions: signed distance, negative inside
// ============================================================================

#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// Regular `n`-gon with circumradius `r`, flat edge on top.
fn sdf_polygon(px: f32, py: f32, r: f32, n: u32) -> f32 {
    let sector = std::f32::consts::TAU / n as f32;
    let half = sector * 0.5;
    let theta = py.atan2(px) + std::f32::consts::FRAC_PI_2 + half;
    let theta = theta.rem_euclid(sector) - half;
    let len = (px * px + py * py).sqrt();
    len * theta.cos() - r * half.cos()
}

/// Star with `n` points, outer radius `ro`, inner radius `ri`.
fn sdf_star(px: f32, py: f32, ro: f32, ri: f32, n: u32) -> f32 {
    let angle = std::f32::consts::PI / n as f32;
    let theta = (py.atan2(px) + std::f32::consts::FRAC_PI_2).rem_euclid(2.0 * angle);
    let len = (px * px + py * py).sqrt();

    // Fold into one half-sector: outer tip on +x, inner notch at +angle.
    let phi = (theta - angle).abs();
    let qx = len * phi.cos();
    let qy = len * phi.sin();

    let (ax, ay) = (ro, 0.0);
    let (bx, by) = (ri * angle.cos(), ri * angle.sin());
    let ex = bx - ax;
    let ey = by - ay;
    let fx = qx - ax;
    let fy = qy - ay;
    let t = ((fx * ex + fy * ey) / (ex * ex + ey * ey)).clamp(0.0, 1.0);
    let cx = ax + ex * t - qx;
    let cy = ay + ey * t - qy;
    let dist = (cx * cx + cy * cy).sqrt();
    let cross = ex * fy - ey * fx;
    if cross > 0.0 { -dist } else { dist }
}

/// Arrow pointing along +x, filling the box (-hx..hx, -hy..hy).
fn sdf_arrow(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let head_len = (hx * 0.6).min(hy * 1.5);
    let head_base = hx - head_len;
    let shaft_half = hy * 0.3;

    let shaft = sdf_box(px - (head_base - hx) * 0.5, py, (head_base + hx) * 0.5, shaft_half);

    // Triangle head: tip (hx, 0), base corners (head_base, +-hy).
    let verts = [(hx, 0.0), (head_base, hy), (head_base, -hy)];
    let head = sdf_triangle(px, py, &verts);

    shaft.min(head)
}

fn sdf_triangle(px: f32, py: f32, v: &[(f32, f32); 3]) -> f32 {
    let mut d = f32::MAX;
    let mut inside = true;
    for i in 0..3 {
        let (ax, ay) = v[i];
        let (bx, by) = v[(i + 1) % 3];
        d = d.min(sdf_line_segment(px, py, ax, ay, bx, by));
        let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        if cross < 0.0 {
            inside = false;
        }
    }
    if inside { -d } else { d }
}

fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ============================================================================
// RASTERIZATION
// ============================================================================

/// RGBA stamp of a rasterized shape; alpha carries coverage.
pub struct ShapeRaster {
    pub buf: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

impl ShapeRaster {
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x as u32, self.y as u32, self.width, self.height)
    }

    /// Source-over the stamp onto `target` at `opacity`.
    pub fn blend_onto(&self, target: &mut RgbaImage, opacity: f32) {
        let row_bytes = self.width as usize * 4;
        for (row, src_row) in self.buf.chunks_exact(row_bytes).enumerate() {
            let ty = self.y as u32 + row as u32;
            for (col, px) in src_row.chunks_exact(4).enumerate() {
                if px[3] == 0 {
                    continue;
                }
                let tx = self.x as u32 + col as u32;
                let dst = target.get_pixel_mut(tx, ty);
                *dst = blend_over(*dst, Rgba([px[0], px[1], px[2], px[3]]), opacity);
            }
        }
    }
}

/// Rasterize `placed` clipped to a `canvas_w` x `canvas_h` area.  `None` when
/// degenerate or entirely off-canvas.
pub fn rasterize_shape(placed: &PlacedShape, canvas_w: u32, canvas_h: u32) -> Option<ShapeRaster> {
    if placed.is_degenerate() {
        return None;
    }
    let frame = placed.frame();
    let cos_r = frame.rotation.cos();
    let sin_r = frame.rotation.sin();

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (lx, ly) in [(-frame.hx, -frame.hy), (frame.hx, -frame.hy), (frame.hx, frame.hy), (-frame.hx, frame.hy)] {
        let rx = lx * cos_r - ly * sin_r + frame.cx;
        let ry = lx * sin_r + ly * cos_r + frame.cy;
        min_x = min_x.min(rx);
        min_y = min_y.min(ry);
        max_x = max_x.max(rx);
        max_y = max_y.max(ry);
    }
    let pad = placed.stroke_width + 2.0;

    let x0 = ((min_x - pad).floor() as i32).max(0);
    let y0 = ((min_y - pad).floor() as i32).max(0);
    let x1 = ((max_x + pad).ceil() as i32).min(canvas_w as i32);
    let y1 = ((max_y + pad).ceil() as i32).min(canvas_h as i32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let buf_w = (x1 - x0) as u32;
    let buf_h = (y1 - y0) as u32;

    let row_bytes = buf_w as usize * 4;
    let mut buf = vec![0u8; row_bytes * buf_h as usize];
    let color = placed.color;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row as i32) as f32 + 0.5;
            for col in 0..buf_w as usize {
                let px = (x0 + col as i32) as f32 + 0.5;
                // Inverse-rotate into the shape's local frame.
                let dx = px - frame.cx;
                let dy = py - frame.cy;
                let lx = dx * cos_r + dy * sin_r;
                let ly = -dx * sin_r + dy * cos_r;

                let cov = placed.coverage(placed.local_sdf(&frame, lx, ly));
                if cov > 0.001 {
                    let idx = col * 4;
                    row_buf[idx] = color[0];
                    row_buf[idx + 1] = color[1];
                    row_buf[idx + 2] = color[2];
                    row_buf[idx + 3] = (color[3] as f32 * cov).round().min(255.0) as u8;
                }
            }
        });

    Some(ShapeRaster {
        buf,
        width: buf_w,
        height: buf_h,
        x: x0,
        y: y0,
    })
}

/// Commit `placed` onto the surface.  Returns the painted region.
pub fn draw_shape(surface: &mut Surface, placed: &PlacedShape, opacity: f32) -> Option<PixelRect> {
    if surface.is_empty() {
        return None;
    }
    let raster = rasterize_shape(placed, surface.width(), surface.height())?;
    raster.blend_onto(surface.image_mut(), opacity);
    let rect = raster.rect();
    surface.mark_dirty(Some(rect));
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BACKGROUND;

    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn shape(kind: ShapeKind, anchor: (f32, f32), end: (f32, f32), fill_mode: ShapeFillMode) -> PlacedShape {
        PlacedShape {
            kind,
            anchor,
            end,
            fill_mode,
            stroke_width: OUTLINE_WIDTH,
            color: BLUE,
            anti_alias: true,
        }
    }

    #[test]
    fn filled_circle_covers_centre_but_not_far_pixels() {
        let mut s = Surface::new(40, 40);
        let c = shape(ShapeKind::Circle, (10.0, 10.0), (15.0, 10.0), ShapeFillMode::Filled);
        assert!(draw_shape(&mut s, &c, 1.0).is_some());
        assert_eq!(s.read_pixel(10, 10).unwrap(), BLUE);
        assert_eq!(s.read_pixel(10, 20).unwrap(), BACKGROUND);
    }

    #[test]
    fn outline_rectangle_leaves_interior_untouched() {
        let mut s = Surface::new(50, 50);
        let r = shape(ShapeKind::Rectangle, (10.0, 10.0), (40.0, 30.0), ShapeFillMode::Outline);
        draw_shape(&mut s, &r, 1.0);
        assert_eq!(s.read_pixel(25, 10).unwrap(), BLUE);
        assert_eq!(s.read_pixel(25, 20).unwrap(), BACKGROUND);
        assert_eq!(s.read_pixel(45, 20).unwrap(), BACKGROUND);
    }

    #[test]
    fn rectangle_from_any_drag_direction() {
        let mut a = Surface::new(30, 30);
        let mut b = Surface::new(30, 30);
        draw_shape(&mut a, &shape(ShapeKind::Rectangle, (5.0, 5.0), (20.0, 25.0), ShapeFillMode::Filled), 1.0);
        draw_shape(&mut b, &shape(ShapeKind::Rectangle, (20.0, 25.0), (5.0, 5.0), ShapeFillMode::Filled), 1.0);
        assert_eq!(a.image().as_raw(), b.image().as_raw());
    }

    #[test]
    fn degenerate_drags_draw_nothing() {
        let mut s = Surface::new(20, 20);
        for kind in ShapeKind::all() {
            let p = shape(*kind, (5.0, 5.0), (5.0, 5.0), ShapeFillMode::Filled);
            assert!(p.is_degenerate(), "{:?}", kind);
            assert!(draw_shape(&mut s, &p, 1.0).is_none());
        }
        let flat = shape(ShapeKind::Rectangle, (5.0, 5.0), (15.0, 5.0), ShapeFillMode::Filled);
        assert!(flat.is_degenerate());
        assert!(s.image().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn line_follows_drag() {
        let mut s = Surface::new(40, 40);
        let mut l = shape(ShapeKind::Line, (5.0, 20.5), (35.0, 20.5), ShapeFillMode::Outline);
        l.stroke_width = 3.0;
        draw_shape(&mut s, &l, 1.0);
        assert_eq!(s.read_pixel(20, 20).unwrap(), BLUE);
        assert_eq!(s.read_pixel(20, 25).unwrap(), BACKGROUND);
    }

    #[test]
    fn polygon_star_and_arrow_fill_their_centres() {
        for kind in [ShapeKind::Polygon, ShapeKind::Star, ShapeKind::Arrow] {
            let mut s = Surface::new(60, 60);
            let p = shape(kind, (10.0, 10.0), (50.0, 50.0), ShapeFillMode::Filled);
            draw_shape(&mut s, &p, 1.0);
            assert_eq!(s.read_pixel(30, 30).unwrap(), BLUE, "{:?}", kind);
            assert_eq!(s.read_pixel(1, 1).unwrap(), BACKGROUND, "{:?}", kind);
        }
    }

    #[test]
    fn arrow_points_towards_release() {
        let mut s = Surface::new(60, 40);
        let p = shape(ShapeKind::Arrow, (50.0, 20.0), (10.0, 20.0), ShapeFillMode::Filled);
        draw_shape(&mut s, &p, 1.0);
        // Head is at the release end, so it is wide there and narrow at the tail.
        assert_eq!(s.read_pixel(20, 14).unwrap(), BLUE);
        assert_eq!(s.read_pixel(40, 14).unwrap(), BACKGROUND);
    }

    #[test]
    fn raster_is_clipped_to_canvas() {
        let c = shape(ShapeKind::Circle, (0.0, 0.0), (30.0, 0.0), ShapeFillMode::Filled);
        let r = rasterize_shape(&c, 10, 10).unwrap();
        assert_eq!((r.x, r.y, r.width, r.height), (0, 0, 10, 10));
        assert!(rasterize_shape(&shape(ShapeKind::Circle, (-50.0, -50.0), (-45.0, -50.0), ShapeFillMode::Filled), 10, 10).is_none());
    }
}
