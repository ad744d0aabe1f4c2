//! Rectangular selection: drag to select, drag inside to move, commit on
//! release.  Previews live on the canvas overlay; the surface is only touched
//! by a commit, delete or cut.

use image::{Rgba, RgbaImage};

use crate::canvas::{BACKGROUND, CanvasState, PixelRect};
use crate::ops::clipboard;

pub type SelectionRect = PixelRect;

/// Length of one dash in the marching-ants outline.
const DASH: i32 = 5;
const DASH_DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const DASH_LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    #[default]
    Idle,
    /// Dragging out a new rectangle.
    Selecting,
    Selected,
    /// Dragging the captured pixels.
    Moving,
}

/// What a selection input did, so the caller knows whether to snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionEvent {
    None,
    Started,
    Selected(SelectionRect),
    /// Zero-area drag, dropped silently.
    Discarded,
    MoveStarted,
    /// Pixels were written; the caller should push a snapshot.
    Committed(PixelRect),
    /// Selection dropped without touching pixels.
    Cleared,
}

impl SelectionEvent {
    pub fn committed(&self) -> bool {
        matches!(self, SelectionEvent::Committed(_))
    }
}

#[derive(Default)]
pub struct SelectionManager {
    phase: SelectionPhase,
    anchor: (i32, i32),
    current: (i32, i32),
    rect: Option<SelectionRect>,
    capture: Option<RgbaImage>,
    /// Pointer position relative to the capture's top-left at grab time.
    grab_offset: (i32, i32),
    /// Top-left of the capture while moving.
    origin: (i32, i32),
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn rect(&self) -> Option<SelectionRect> {
        self.rect
    }

    pub fn capture(&self) -> Option<&RgbaImage> {
        self.capture.as_ref()
    }

    /// Top-left the capture would land at if committed now.
    pub fn move_origin(&self) -> Option<(i32, i32)> {
        (self.phase == SelectionPhase::Moving).then_some(self.origin)
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SelectionPhase::Idle
    }

    /// Pointer down.  Inside an existing selection this grabs it; elsewhere it
    /// starts a new rectangle unless `allow_new` is false (Move tool).
    pub fn begin(&mut self, canvas: &mut CanvasState, x: i32, y: i32, allow_new: bool) -> SelectionEvent {
        if canvas.is_empty() {
            return SelectionEvent::None;
        }

        // A move left open by a missed release is committed first.
        if self.phase == SelectionPhase::Moving {
            let committed = self.commit_move(canvas);
            return match self.begin(canvas, x, y, allow_new) {
                SelectionEvent::None => committed,
                _ if committed.committed() => committed,
                other => other,
            };
        }

        if self.phase == SelectionPhase::Selected
            && let Some(rect) = self.rect
            && rect.contains(x, y)
        {
            if self.capture.is_none() {
                self.capture = canvas.surface.copy_region(rect);
            }
            if self.capture.is_none() {
                self.reset(canvas);
                return SelectionEvent::Cleared;
            }
            self.origin = (rect.x as i32, rect.y as i32);
            self.grab_offset = (x - self.origin.0, y - self.origin.1);
            self.phase = SelectionPhase::Moving;
            self.render_moving(canvas);
            return SelectionEvent::MoveStarted;
        }

        if !allow_new {
            return SelectionEvent::None;
        }

        self.reset(canvas);
        self.phase = SelectionPhase::Selecting;
        self.anchor = (x, y);
        self.current = (x, y);
        SelectionEvent::Started
    }

    pub fn extend(&mut self, canvas: &mut CanvasState, x: i32, y: i32) {
        match self.phase {
            SelectionPhase::Selecting => {
                self.current = (x, y);
                let preview = PixelRect::from_corners(self.anchor, self.current, canvas.width(), canvas.height());
                match preview {
                    Some(r) => draw_dashed_rect(canvas.begin_overlay(), r),
                    None => canvas.clear_overlay(),
                }
            }
            SelectionPhase::Moving => {
                self.origin = (x - self.grab_offset.0, y - self.grab_offset.1);
                self.render_moving(canvas);
            }
            SelectionPhase::Idle | SelectionPhase::Selected => {}
        }
    }

    /// Pointer up.
    pub fn end(&mut self, canvas: &mut CanvasState) -> SelectionEvent {
        match self.phase {
            SelectionPhase::Selecting => {
                match PixelRect::from_corners(self.anchor, self.current, canvas.width(), canvas.height()) {
                    Some(rect) => {
                        self.rect = Some(rect);
                        self.capture = canvas.surface.copy_region(rect);
                        self.phase = SelectionPhase::Selected;
                        draw_dashed_rect(canvas.begin_overlay(), rect);
                        SelectionEvent::Selected(rect)
                    }
                    None => {
                        self.reset(canvas);
                        SelectionEvent::Discarded
                    }
                }
            }
            SelectionPhase::Moving => self.commit_move(canvas),
            SelectionPhase::Idle | SelectionPhase::Selected => SelectionEvent::None,
        }
    }

    /// Leave the selection tools: commits an in-flight move, otherwise just
    /// drops the selection.
    pub fn finalize(&mut self, canvas: &mut CanvasState) -> SelectionEvent {
        match self.phase {
            SelectionPhase::Moving => self.commit_move(canvas),
            SelectionPhase::Idle => SelectionEvent::None,
            SelectionPhase::Selecting | SelectionPhase::Selected => {
                self.reset(canvas);
                SelectionEvent::Cleared
            }
        }
    }

    /// Escape: back to idle from anything, nothing committed.
    pub fn cancel(&mut self, canvas: &mut CanvasState) {
        self.reset(canvas);
    }

    /// Fill the selected rectangle with background white.
    pub fn delete(&mut self, canvas: &mut CanvasState) -> SelectionEvent {
        if self.phase != SelectionPhase::Selected {
            return SelectionEvent::None;
        }
        let Some(rect) = self.rect else {
            return SelectionEvent::None;
        };
        canvas.surface.fill_rect(rect, BACKGROUND);
        self.reset(canvas);
        SelectionEvent::Committed(rect)
    }

    /// Put the captured pixels on the process clipboard.
    pub fn copy(&self) -> bool {
        if !matches!(self.phase, SelectionPhase::Selected | SelectionPhase::Moving) {
            return false;
        }
        match &self.capture {
            Some(img) => {
                clipboard::set_clipboard_image(img.clone());
                true
            }
            None => false,
        }
    }

    pub fn cut(&mut self, canvas: &mut CanvasState) -> SelectionEvent {
        if self.phase != SelectionPhase::Selected || !self.copy() {
            return SelectionEvent::None;
        }
        self.delete(canvas)
    }

    /// Select the whole surface.  A move in flight must be finalized by the
    /// caller first; until then this is refused.
    pub fn select_all(&mut self, canvas: &mut CanvasState) -> SelectionEvent {
        if self.phase == SelectionPhase::Moving {
            return SelectionEvent::None;
        }
        self.reset(canvas);
        let Some(rect) = PixelRect::from_corners(
            (0, 0),
            (canvas.width() as i32, canvas.height() as i32),
            canvas.width(),
            canvas.height(),
        ) else {
            return SelectionEvent::None;
        };
        self.rect = Some(rect);
        self.capture = canvas.surface.copy_region(rect);
        self.phase = SelectionPhase::Selected;
        draw_dashed_rect(canvas.begin_overlay(), rect);
        SelectionEvent::Selected(rect)
    }

    /// Clear the source to white, stamp the capture at its new spot, go idle.
    fn commit_move(&mut self, canvas: &mut CanvasState) -> SelectionEvent {
        let (Some(rect), Some(capture)) = (self.rect, self.capture.take()) else {
            self.reset(canvas);
            return SelectionEvent::Cleared;
        };
        let (dx, dy) = self.origin;
        canvas.surface.fill_rect(rect, BACKGROUND);
        canvas.surface.blit(&capture, dx, dy);

        let landed = PixelRect::from_corners(
            (dx, dy),
            (dx + capture.width() as i32, dy + capture.height() as i32),
            canvas.width(),
            canvas.height(),
        );
        crate::log_debug!(
            "selection: moved {}x{} from ({}, {}) to ({}, {})",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            dx,
            dy
        );
        self.reset(canvas);
        SelectionEvent::Committed(landed.map_or(rect, |l| l.union(&rect)))
    }

    fn render_moving(&self, canvas: &mut CanvasState) {
        let Some(capture) = &self.capture else { return };
        let (w, h) = (canvas.width(), canvas.height());
        let overlay = canvas.begin_overlay();
        let (ox, oy) = self.origin;
        for (sx, sy, px) in capture.enumerate_pixels() {
            let (tx, ty) = (ox + sx as i32, oy + sy as i32);
            if tx >= 0 && ty >= 0 && (tx as u32) < w && (ty as u32) < h {
                overlay.put_pixel(tx as u32, ty as u32, *px);
            }
        }
        if let Some(r) = PixelRect::from_corners(
            (ox, oy),
            (ox + capture.width() as i32, oy + capture.height() as i32),
            w,
            h,
        ) {
            draw_dashed_rect(overlay, r);
        }
    }

    fn reset(&mut self, canvas: &mut CanvasState) {
        self.phase = SelectionPhase::Idle;
        self.rect = None;
        self.capture = None;
        self.grab_offset = (0, 0);
        canvas.clear_overlay();
    }
}

/// One-pixel marching-ants border just inside `rect`.
fn draw_dashed_rect(overlay: &mut RgbaImage, rect: PixelRect) {
    let (x0, y0) = (rect.x as i32, rect.y as i32);
    let (x1, y1) = (rect.right() as i32 - 1, rect.bottom() as i32 - 1);
    let mut step = 0;
    let mut put = |x: i32, y: i32, step: i32| {
        if x < 0 || y < 0 || x as u32 >= overlay.width() || y as u32 >= overlay.height() {
            return;
        }
        let color = if (step / DASH) % 2 == 0 { DASH_DARK } else { DASH_LIGHT };
        overlay.put_pixel(x as u32, y as u32, color);
    };
    for x in x0..=x1 {
        put(x, y0, step);
        put(x, y1, step);
        step += 1;
    }
    for y in y0..=y1 {
        put(x0, y, step);
        put(x1, y, step);
        step += 1;
    }
}
