// ============================================================================
// PREVIEW FILTERS: "view in black" monochrome threshold
// ============================================================================

use std::time::{Duration, Instant};

use image::RgbaImage;
use rayon::prelude::*;

/// Mean-of-RGB cut-off: below goes black, at or above goes white.
pub const MONO_THRESHOLD: u32 = 128;
pub const DEFAULT_PREVIEW_DURATION: Duration = Duration::from_millis(2000);

/// Two-level copy of `src`: each pixel becomes black or white by the mean of
/// its RGB channels.  Alpha is kept.
pub fn monochrome_threshold(src: &RgbaImage) -> RgbaImage {
    let mut out = src.clone();
    let row_len = src.width() as usize * 4;
    if row_len == 0 {
        return out;
    }
    let dst: &mut [u8] = &mut out;
    dst.par_chunks_mut(row_len).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let avg = (px[0] as u32 + px[1] as u32 + px[2] as u32) / 3;
            let v = if avg < MONO_THRESHOLD { 0 } else { 255 };
            px[0] = v;
            px[1] = v;
            px[2] = v;
        }
    });
    out
}

/// A threshold view that expires on its own.  Never written to the surface
/// and never recorded in history.
#[derive(Clone, Debug)]
pub struct MonochromePreview {
    image: RgbaImage,
    expires_at: Instant,
}

impl MonochromePreview {
    pub fn new(source: &RgbaImage, now: Instant, duration: Duration) -> Self {
        Self {
            image: monochrome_threshold(source),
            expires_at: now + duration,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
