//! Bucket fill.

use image::Rgb;

use crate::canvas::{PixelRect, Surface};

/// Result of a bucket fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FillReport {
    pub filled: usize,
    pub bounds: Option<PixelRect>,
}

impl FillReport {
    pub fn changed(&self) -> bool {
        self.filled > 0
    }
}

/// 4-connected flood fill from (`seed_x`, `seed_y`).
///
/// Pixels join the region when their RGB equals the seed's RGB exactly
/// (alpha is not compared).  Every filled pixel gets `fill` with alpha 255.
/// Uses an explicit stack of flat indices, so region size is bounded only by
/// memory.  Filling with the seed's own colour, or seeding off-canvas, does
/// nothing.
pub fn flood_fill(surface: &mut Surface, seed_x: i32, seed_y: i32, fill: Rgb<u8>) -> FillReport {
    if surface.is_empty() || !surface.in_bounds(seed_x, seed_y) {
        return FillReport::default();
    }

    let w = surface.width() as usize;
    let h = surface.height() as usize;
    let flat: &mut [u8] = surface.image_mut();

    let seed_idx = seed_y as usize * w + seed_x as usize;
    let target = rgb_at(flat, seed_idx);
    let fill = fill.0;
    if target == fill {
        return FillReport::default();
    }

    #[inline(always)]
    fn rgb_at(flat: &[u8], idx: usize) -> [u8; 3] {
        let o = idx * 4;
        [flat[o], flat[o + 1], flat[o + 2]]
    }

    // Painting a pixel also marks it visited: it no longer matches `target`.
    #[inline(always)]
    fn paint(flat: &mut [u8], idx: usize, fill: [u8; 3]) {
        let o = idx * 4;
        flat[o] = fill[0];
        flat[o + 1] = fill[1];
        flat[o + 2] = fill[2];
        flat[o + 3] = 255;
    }

    let (mut min_x, mut min_y) = (seed_x as usize, seed_y as usize);
    let (mut max_x, mut max_y) = (min_x, min_y);
    let mut filled = 1usize;

    let mut stack: Vec<usize> = Vec::with_capacity(4096);
    paint(flat, seed_idx, fill);
    stack.push(seed_idx);

    while let Some(idx) = stack.pop() {
        let x = idx % w;
        let y = idx / w;

        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        let mut visit = |ni: usize, flat: &mut [u8]| {
            if rgb_at(flat, ni) == target {
                paint(flat, ni, fill);
                stack.push(ni);
                filled += 1;
            }
        };

        if x > 0 {
            visit(idx - 1, flat);
        }
        if x + 1 < w {
            visit(idx + 1, flat);
        }
        if y > 0 {
            visit(idx - w, flat);
        }
        if y + 1 < h {
            visit(idx + w, flat);
        }
    }

    let bounds = PixelRect::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    );
    surface.mark_dirty(Some(bounds));

    FillReport {
        filled,
        bounds: Some(bounds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BACKGROUND;
    use image::Rgba;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    #[test]
    fn fills_whole_uniform_canvas() {
        let mut s = Surface::new(10, 10);
        let report = flood_fill(&mut s, 0, 0, RED);
        assert_eq!(report.filled, 100);
        assert!(s.image().pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn large_region_does_not_overflow() {
        let mut s = Surface::new(2000, 2000);
        let report = flood_fill(&mut s, 1000, 1000, RED);
        assert_eq!(report.filled, 4_000_000);
        assert_eq!(report.bounds, Some(PixelRect::new(0, 0, 2000, 2000)));
        assert_eq!(s.read_pixel(1999, 0).unwrap(), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn same_colour_is_a_noop() {
        let mut s = Surface::new(8, 8);
        let before = s.snapshot();
        let report = flood_fill(&mut s, 3, 3, Rgb([255, 255, 255]));
        assert!(!report.changed());
        assert_eq!(s.image().as_raw(), before.pixels().as_raw());
    }

    #[test]
    fn stops_at_boundary_and_ignores_diagonals() {
        // A vertical black wall at x = 5 splits the canvas.
        let mut s = Surface::new(10, 10);
        for y in 0..10 {
            s.write_pixel(5, y, Rgba([0, 0, 0, 255])).unwrap();
        }
        let report = flood_fill(&mut s, 0, 0, RED);
        assert_eq!(report.filled, 50);
        assert_eq!(s.read_pixel(4, 9).unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(s.read_pixel(6, 0).unwrap(), BACKGROUND);

        // Diagonal neighbours are not connected.
        let mut d = Surface::new(3, 3);
        for (x, y) in [(1, 0), (0, 1)] {
            d.write_pixel(x, y, Rgba([0, 0, 0, 255])).unwrap();
        }
        assert_eq!(flood_fill(&mut d, 0, 0, RED).filled, 1);
        assert_eq!(d.read_pixel(1, 1).unwrap(), BACKGROUND);
    }

    #[test]
    fn alpha_is_ignored_for_matching_and_forced_opaque() {
        let mut s = Surface::new(2, 1);
        s.write_pixel(1, 0, Rgba([255, 255, 255, 10])).unwrap();
        let report = flood_fill(&mut s, 0, 0, RED);
        assert_eq!(report.filled, 2);
        assert_eq!(s.read_pixel(1, 0).unwrap(), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn seed_outside_or_empty_surface_is_ignored() {
        let mut s = Surface::new(4, 4);
        assert!(!flood_fill(&mut s, -1, 0, RED).changed());
        assert!(!flood_fill(&mut s, 0, 4, RED).changed());
        let mut empty = Surface::new(0, 0);
        assert!(!flood_fill(&mut empty, 0, 0, RED).changed());
    }
}
