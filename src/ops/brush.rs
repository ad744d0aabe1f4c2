//! Freehand raster primitives: round brush segments, eraser, pencil, spray.
//!
//! Coordinates are continuous canvas positions; pixel (x, y) is sampled at
//! its centre (x + 0.5, y + 0.5).

use image::Rgba;

use crate::canvas::{PixelRect, Surface};

/// Dots stamped per spray extend.
pub const SPRAY_DOTS: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushMode {
    /// Source-over with the active colour.
    Paint,
    /// Destination-out: removes alpha, leaves colour.
    Erase,
}

/// Deterministic positional hash used as the spray's random source.
pub fn stamp_hash(x: f32, y: f32, counter: u32) -> u32 {
    let ix = (x * 100.0) as i32 as u32;
    let iy = (y * 100.0) as i32 as u32;
    let mut h = ix
        .wrapping_mul(374761393)
        .wrapping_add(iy.wrapping_mul(668265263))
        .wrapping_add(counter.wrapping_mul(1013904223));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

/// Maps a hash to [0, 1).
#[inline]
fn unit(h: u32) -> f32 {
    (h >> 8) as f32 / (1u32 << 24) as f32
}

/// Distance from `p` to the segment `a`-`b`.
#[inline]
pub fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (bax, bay) = (b.0 - a.0, b.1 - a.1);
    let (pax, pay) = (p.0 - a.0, p.1 - a.1);
    let len_sq = bax * bax + bay * bay;
    let t = if len_sq > 0.0 {
        ((pax * bax + pay * bay) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dx = pax - bax * t;
    let dy = pay - bay * t;
    (dx * dx + dy * dy).sqrt()
}

/// Coverage of a pixel whose centre is `dist` away from a stroke spine of
/// half-width `radius`.
#[inline]
fn coverage(dist: f32, radius: f32, anti_aliased: bool) -> f32 {
    if !anti_aliased {
        return if dist <= radius { 1.0 } else { 0.0 };
    }
    (radius + 0.5 - dist).clamp(0.0, 1.0)
}

/// Round-capped segment `from`-`to` of total width `width`.
///
/// Each pixel is touched once per segment, so opacity does not stack along
/// the segment.  Returns the region painted, if any.
pub fn draw_segment(
    surface: &mut Surface,
    from: (f32, f32),
    to: (f32, f32),
    width: f32,
    color: Rgba<u8>,
    opacity: f32,
    mode: BrushMode,
    anti_aliased: bool,
) -> Option<PixelRect> {
    if surface.is_empty() || width <= 0.0 {
        return None;
    }
    let radius = width * 0.5;
    let pad = radius + 1.0;
    let bounds = PixelRect::from_bounds_f32(
        (from.0.min(to.0) - pad, from.1.min(to.1) - pad),
        (from.0.max(to.0) + pad, from.1.max(to.1) + pad),
        surface.width(),
        surface.height(),
    )?;

    let mut touched = false;
    for py in bounds.y..bounds.bottom() {
        for px in bounds.x..bounds.right() {
            let centre = (px as f32 + 0.5, py as f32 + 0.5);
            let cov = coverage(distance_to_segment(centre, from, to), radius, anti_aliased);
            if cov <= 0.0 {
                continue;
            }
            touched = true;
            match mode {
                BrushMode::Paint => surface.blend_at(px as i32, py as i32, color, opacity * cov),
                BrushMode::Erase => surface.erase_at(px as i32, py as i32, opacity * cov),
            }
        }
    }

    if touched {
        surface.mark_dirty(Some(bounds));
        Some(bounds)
    } else {
        None
    }
}

/// Liang-Barsky clip of `a`-`b` to the canvas grown by one pixel on each
/// side.  `None` when the segment misses it or is not finite.
fn clip_segment(a: (f32, f32), b: (f32, f32), width: u32, height: u32) -> Option<((f32, f32), (f32, f32))> {
    let (ax, ay, bx, by) = (a.0 as f64, a.1 as f64, b.0 as f64, b.1 as f64);
    if !(ax.is_finite() && ay.is_finite() && bx.is_finite() && by.is_finite()) {
        return None;
    }
    let (min_x, min_y) = (-1.0, -1.0);
    let (max_x, max_y) = (width as f64 + 1.0, height as f64 + 1.0);
    let (dx, dy) = (bx - ax, by - ay);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in [(-dx, ax - min_x), (dx, max_x - ax), (-dy, ay - min_y), (dy, max_y - ay)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| ((ax + dx * t) as f32, (ay + dy * t) as f32);
    Some((at(t0), at(t1)))
}

/// Hard 1-pixel Bresenham line, clipped to the canvas before stepping.
pub fn draw_pencil_line(
    surface: &mut Surface,
    from: (f32, f32),
    to: (f32, f32),
    color: Rgba<u8>,
    opacity: f32,
) -> Option<PixelRect> {
    if surface.is_empty() {
        return None;
    }
    let (from, to) = clip_segment(from, to, surface.width(), surface.height())?;
    let (mut x0, mut y0) = (from.0.floor() as i32, from.1.floor() as i32);
    let (x1, y1) = (to.0.floor() as i32, to.1.floor() as i32);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        surface.blend_at(x0, y0, color, opacity);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }

    let bounds = PixelRect::from_corners(
        (x0.min(from.0.floor() as i32), y0.min(from.1.floor() as i32)),
        (x0.max(from.0.floor() as i32) + 1, y0.max(from.1.floor() as i32) + 1),
        surface.width(),
        surface.height(),
    );
    if let Some(r) = bounds {
        surface.mark_dirty(Some(r));
    }
    bounds
}

/// Stamp `SPRAY_DOTS` single pixels uniformly inside the square of side
/// `2 * size` centred on `centre`.  `counter` advances per call so repeated
/// extends at the same point scatter differently.
pub fn spray(
    surface: &mut Surface,
    centre: (f32, f32),
    size: f32,
    color: Rgba<u8>,
    opacity: f32,
    counter: &mut u32,
) -> Option<PixelRect> {
    if surface.is_empty() {
        return None;
    }
    let mut painted: Option<PixelRect> = None;
    for _ in 0..SPRAY_DOTS {
        *counter = counter.wrapping_add(1);
        let hx = stamp_hash(centre.0, centre.1, *counter);
        let hy = stamp_hash(centre.1, centre.0, hx);
        let ox = (unit(hx) - 0.5) * size * 2.0;
        let oy = (unit(hy) - 0.5) * size * 2.0;
        let x = (centre.0 + ox).floor() as i32;
        let y = (centre.1 + oy).floor() as i32;
        if !surface.in_bounds(x, y) {
            continue;
        }
        surface.blend_at(x, y, color, opacity);
        let dot = PixelRect::new(x as u32, y as u32, 1, 1);
        painted = Some(painted.map_or(dot, |r| r.union(&dot)));
    }
    if let Some(r) = painted {
        surface.mark_dirty(Some(r));
    }
    painted
}
