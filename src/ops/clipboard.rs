// ============================================================================
// CLIPBOARD: process-wide image slot shared by every open project
// ============================================================================

use std::sync::Mutex;

use image::{Rgba, RgbaImage};

use crate::canvas::{PixelRect, Surface};

/// Channels at or above this value count as "white" when pasting.
pub const PASTE_WHITE_THRESHOLD: u8 = 250;

static APP_CLIPBOARD: Mutex<Option<RgbaImage>> = Mutex::new(None);

/// Replace the clipboard contents with a copy of `img`.
pub fn set_clipboard_image(img: RgbaImage) {
    *APP_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()) = Some(img);
}

pub fn get_clipboard_image() -> Option<RgbaImage> {
    APP_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

pub fn has_clipboard_image() -> bool {
    APP_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()).is_some()
}

pub fn clipboard_dimensions() -> Option<(u32, u32)> {
    APP_CLIPBOARD
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .map(|img| img.dimensions())
}

pub fn clear_clipboard() {
    *APP_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()) = None;
}

/// Pixels skipped by paste: near-white or fully transparent.
#[inline]
pub fn is_paste_transparent(px: &Rgba<u8>) -> bool {
    px[3] == 0
        || (px[0] >= PASTE_WHITE_THRESHOLD
            && px[1] >= PASTE_WHITE_THRESHOLD
            && px[2] >= PASTE_WHITE_THRESHOLD)
}

/// Stamp `img` with its top-left at (`x`, `y`), leaving the surface visible
/// wherever `img` is near-white.  Returns the painted region, if any.
pub fn paste_image(surface: &mut Surface, img: &RgbaImage, x: i32, y: i32) -> Option<PixelRect> {
    if surface.is_empty() {
        return None;
    }
    let mut painted: Option<PixelRect> = None;
    for (sx, sy, px) in img.enumerate_pixels() {
        if is_paste_transparent(px) {
            continue;
        }
        let (tx, ty) = (x + sx as i32, y + sy as i32);
        if !surface.in_bounds(tx, ty) {
            continue;
        }
        surface.blend_at(tx, ty, *px, 1.0);
        let dot = PixelRect::new(tx as u32, ty as u32, 1, 1);
        painted = Some(painted.map_or(dot, |r| r.union(&dot)));
    }
    if let Some(r) = painted {
        surface.mark_dirty(Some(r));
    }
    painted
}

/// Paste the clipboard at (`x`, `y`).  `None` when empty or nothing landed.
pub fn paste_clipboard(surface: &mut Surface, x: i32, y: i32) -> Option<PixelRect> {
    let img = get_clipboard_image()?;
    paste_image(surface, &img, x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BACKGROUND;

    fn two_tone() -> RgbaImage {
        // Left column red, right column near-white.
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([252, 251, 255, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([255, 0, 0, 255]));
        img
    }

    #[test]
    fn near_white_and_clear_pixels_are_skipped() {
        assert!(is_paste_transparent(&Rgba([250, 250, 250, 255])));
        assert!(is_paste_transparent(&Rgba([0, 0, 0, 0])));
        assert!(!is_paste_transparent(&Rgba([249, 255, 255, 255])));
    }

    #[test]
    fn paste_keeps_background_under_white() {
        let mut s = Surface::new(10, 10);
        s.write_pixel(6, 5, Rgba([0, 255, 0, 255])).unwrap();
        let region = paste_image(&mut s, &two_tone(), 5, 5).unwrap();
        assert_eq!(region, PixelRect::new(5, 5, 1, 2));
        assert_eq!(s.read_pixel(5, 5).unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(s.read_pixel(6, 5).unwrap(), Rgba([0, 255, 0, 255]));
        assert_eq!(s.read_pixel(6, 6).unwrap(), BACKGROUND);
    }

    #[test]
    fn paste_clips_at_edges() {
        let mut s = Surface::new(4, 4);
        assert!(paste_image(&mut s, &two_tone(), 3, 3).is_some());
        assert_eq!(s.read_pixel(3, 3).unwrap(), Rgba([255, 0, 0, 255]));
        assert!(paste_image(&mut s, &two_tone(), 10, 10).is_none());
    }

    // The slot is process-wide, so everything touching it lives in one test.
    #[test]
    fn global_slot_round_trip() {
        set_clipboard_image(two_tone());
        assert!(has_clipboard_image());
        assert_eq!(clipboard_dimensions(), Some((2, 2)));

        let mut s = Surface::new(8, 8);
        assert!(paste_clipboard(&mut s, 0, 0).is_some());
        assert_eq!(s.read_pixel(0, 1).unwrap(), Rgba([255, 0, 0, 255]));

        clear_clipboard();
        assert!(!has_clipboard_image());
        assert!(paste_clipboard(&mut s, 0, 0).is_none());
    }
}
