use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ab_glyph::FontArc;
use image::{Rgb, RgbaImage};
use uuid::Uuid;

use crate::canvas::{BACKGROUND, CanvasState, PixelRect, Snapshot, blend_over};
use crate::components::history::HistoryManager;
use crate::components::tools::{GestureKind, StrokeCompositor, Tool, ToolProperties};
use crate::input::{EditorAction, KeyBindings, KeyPress};
use crate::io::{self, ImageIoError};
use crate::ops::clipboard;
use crate::ops::fill::flood_fill;
use crate::ops::filters::{DEFAULT_PREVIEW_DURATION, MonochromePreview};
use crate::ops::selection::{SelectionEvent, SelectionManager, SelectionPhase, SelectionRect};
use crate::ops::text;
use crate::settings::AppSettings;

pub const DEFAULT_TITLE: &str = "Untitled";

/// What a pointer event did, for the host to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerResponse {
    /// Not consumed (empty canvas, no gesture in progress, ...).
    Ignored,
    Handled,
    /// Pixels changed and a history entry was pushed.
    Committed,
    /// Eyedropper picked this colour; it is now the active colour.
    ColorPicked(Rgb<u8>),
    /// Text tool: the host should prompt for text, then call `place_text`.
    TextRequested { x: f32, y: f32 },
}

/// Discrete edits a host can apply without going through pointer events.
#[derive(Clone, Debug, PartialEq)]
pub enum EditOp {
    /// Bucket fill at a point with the active colour.
    Fill { x: i32, y: i32 },
    /// A whole gesture: press at the first point, drag through the rest,
    /// release.  Works for freehand and shape tools.
    Stroke { tool: Tool, points: Vec<(f32, f32)> },
    Text { x: f32, y: f32, text: String },
    Paste { x: i32, y: i32 },
    DeleteSelection,
    Resize { width: u32, height: u32 },
    Clear,
}

/// Single open document: the pixels, their history and the editing state
/// that acts on them.
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub canvas: CanvasState,
    pub history: HistoryManager,
    pub props: ToolProperties,
    pub keybindings: KeyBindings,
    pub is_dirty: bool,
    tool: Tool,
    stroke: StrokeCompositor,
    selection: SelectionManager,
    last_pointer: (f32, f32),
    font_path: Option<PathBuf>,
    fonts: HashMap<String, FontArc>,
    preview_duration: Duration,
}

impl Project {
    /// White canvas with the blank state recorded as the history baseline.
    pub fn new(width: u32, height: u32) -> Self {
        let mut project = Self {
            id: Uuid::new_v4(),
            title: DEFAULT_TITLE.to_string(),
            canvas: CanvasState::new(width, height),
            history: HistoryManager::default(),
            props: ToolProperties::default(),
            keybindings: KeyBindings::default(),
            is_dirty: false,
            tool: Tool::default(),
            stroke: StrokeCompositor::new(),
            selection: SelectionManager::new(),
            last_pointer: (0.0, 0.0),
            font_path: None,
            fonts: HashMap::new(),
            preview_duration: DEFAULT_PREVIEW_DURATION,
        };
        project.history.push("New Image", project.canvas.surface.snapshot());
        project
    }

    pub fn with_settings(settings: &AppSettings) -> Self {
        let mut project = Self::new(settings.canvas_width, settings.canvas_height);
        project.history = HistoryManager::new(settings.max_undo_steps)
            .with_memory_limit(settings.history_memory_limit());
        project.history.push("New Image", project.canvas.surface.snapshot());
        project.props.set_size(settings.brush_size);
        project.props.set_opacity(settings.opacity);
        project.props.anti_aliased = settings.anti_aliased;
        project.props.font_family = settings.font_family.clone();
        project.props.set_font_size(settings.font_size);
        project.keybindings = settings.keybindings.clone();
        project.font_path = settings.font_path();
        project.preview_duration = Duration::from_millis(settings.mono_preview_ms);
        project
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn selection_phase(&self) -> SelectionPhase {
        self.selection.phase()
    }

    pub fn selection_rect(&self) -> Option<SelectionRect> {
        self.selection.rect()
    }

    pub fn is_gesture_active(&self) -> bool {
        self.stroke.is_active() || matches!(self.selection.phase(), SelectionPhase::Selecting | SelectionPhase::Moving)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Title with a trailing `*` when there are unexported changes.
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.title)
        } else {
            self.title.clone()
        }
    }

    pub fn set_title(&mut self, title: &str) {
        let trimmed = title.trim();
        self.title = if trimmed.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            trimmed.to_string()
        };
    }

    pub fn suggested_filename(&self) -> String {
        io::suggested_filename(&self.title)
    }

    // ========================================================================
    // TOOLS
    // ========================================================================

    /// Switch tools.  Leaving the selection tools commits a pending move.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        self.flush_stroke();
        if !tool.is_selection_tool() {
            let event = self.selection.finalize(&mut self.canvas);
            self.record_selection(&event);
        }
        crate::log_debug!("tool: {} -> {}", self.tool.name(), tool.name());
        self.tool = tool;
    }

    // ========================================================================
    // POINTER INPUT
    // ========================================================================

    /// Pointer/touch press at buffer coordinates.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> PointerResponse {
        if self.canvas.is_empty() {
            return PointerResponse::Ignored;
        }
        self.flush_stroke();
        self.last_pointer = (x, y);
        let (px, py) = pixel_of(x, y);

        match self.tool.gesture() {
            GestureKind::Freehand | GestureKind::Shape(_) => {
                if self.stroke.begin(self.tool, x, y, &mut self.canvas, &self.props) {
                    PointerResponse::Handled
                } else {
                    PointerResponse::Ignored
                }
            }
            GestureKind::Selection => {
                let allow_new = self.tool == Tool::Select;
                let event = self.selection.begin(&mut self.canvas, px, py, allow_new);
                match event {
                    SelectionEvent::None => PointerResponse::Ignored,
                    _ if self.record_selection(&event) => PointerResponse::Committed,
                    _ => PointerResponse::Handled,
                }
            }
            GestureKind::SingleShot => match self.tool {
                Tool::Bucket => {
                    if self.fill_at(px, py) {
                        PointerResponse::Committed
                    } else {
                        PointerResponse::Handled
                    }
                }
                Tool::Eyedropper => match self.canvas.surface.read_pixel(px, py) {
                    Ok(c) => {
                        let picked = Rgb([c[0], c[1], c[2]]);
                        self.props.color = picked;
                        PointerResponse::ColorPicked(picked)
                    }
                    Err(_) => PointerResponse::Ignored,
                },
                Tool::Text => PointerResponse::TextRequested { x, y },
                _ => PointerResponse::Ignored,
            },
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> PointerResponse {
        self.last_pointer = (x, y);
        if self.stroke.is_active() {
            self.stroke.extend(x, y, &mut self.canvas, &self.props);
            return PointerResponse::Handled;
        }
        if matches!(self.selection.phase(), SelectionPhase::Selecting | SelectionPhase::Moving) {
            let (px, py) = pixel_of(x, y);
            self.selection.extend(&mut self.canvas, px, py);
            return PointerResponse::Handled;
        }
        PointerResponse::Ignored
    }

    pub fn pointer_up(&mut self) -> PointerResponse {
        if self.stroke.is_active() {
            return if self.flush_stroke() {
                PointerResponse::Committed
            } else {
                PointerResponse::Handled
            };
        }
        let event = self.selection.end(&mut self.canvas);
        match event {
            SelectionEvent::None => PointerResponse::Ignored,
            _ if self.record_selection(&event) => PointerResponse::Committed,
            _ => PointerResponse::Handled,
        }
    }

    /// Pointer left the canvas mid-gesture: finish it as if released.
    pub fn pointer_leave(&mut self) -> PointerResponse {
        self.pointer_up()
    }

    // ========================================================================
    // EDITS
    // ========================================================================

    /// Apply a discrete edit.  Returns true when a history entry was pushed.
    pub fn apply_edit(&mut self, op: EditOp) -> bool {
        match op {
            EditOp::Fill { x, y } => {
                self.flush_gestures();
                self.fill_at(x, y)
            }
            EditOp::Stroke { tool, points } => {
                let Some((&(x0, y0), rest)) = points.split_first() else {
                    return false;
                };
                if !matches!(tool.gesture(), GestureKind::Freehand | GestureKind::Shape(_)) {
                    return false;
                }
                self.set_tool(tool);
                self.flush_gestures();
                if !self.stroke.begin(tool, x0, y0, &mut self.canvas, &self.props) {
                    return false;
                }
                for &(x, y) in rest {
                    self.stroke.extend(x, y, &mut self.canvas, &self.props);
                }
                self.last_pointer = points.last().copied().unwrap_or((x0, y0));
                self.flush_stroke()
            }
            EditOp::Text { x, y, text } => self.place_text(x, y, &text),
            EditOp::Paste { x, y } => {
                self.last_pointer = (x as f32, y as f32);
                self.paste()
            }
            EditOp::DeleteSelection => self.delete_selection(),
            EditOp::Resize { width, height } => self.resize(width, height),
            EditOp::Clear => {
                self.clear();
                true
            }
        }
    }

    fn fill_at(&mut self, x: i32, y: i32) -> bool {
        let report = flood_fill(&mut self.canvas.surface, x, y, self.props.color);
        if !report.changed() {
            return false;
        }
        self.commit(Tool::Bucket.history_label());
        true
    }

    /// Stamp `text` with its baseline starting at (`x`, `y`).
    pub fn place_text(&mut self, x: f32, y: f32, content: &str) -> bool {
        if self.canvas.is_empty() || content.trim().is_empty() {
            return false;
        }
        self.flush_gestures();
        let Some(font) = self.font() else {
            crate::log_warn!("text: no font available for '{}'", self.props.font_family);
            return false;
        };
        let stamped = text::stamp_text(
            &mut self.canvas.surface,
            &font,
            content,
            self.props.font_size,
            (x, y),
            self.props.paint_color(),
            self.props.opacity,
            self.props.anti_aliased,
        );
        if stamped.is_none() {
            return false;
        }
        self.commit(Tool::Text.history_label());
        true
    }

    fn font(&mut self) -> Option<FontArc> {
        let family = self.props.font_family.clone();
        if let Some(font) = self.fonts.get(&family) {
            return Some(font.clone());
        }
        let font = text::resolve_font(&family, self.font_path.as_deref())?;
        self.fonts.insert(family, font.clone());
        Some(font)
    }

    /// Reset to a white canvas of the current size with a fresh history.
    pub fn clear(&mut self) {
        self.stroke.cancel(&mut self.canvas);
        self.selection.cancel(&mut self.canvas);
        self.canvas.surface.fill(BACKGROUND);
        self.history.clear();
        self.history.push("New Image", self.canvas.surface.snapshot());
        self.is_dirty = false;
        crate::log_info!("project: cleared {}x{}", self.width(), self.height());
    }

    /// Change the canvas size, keeping content at the origin.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width(), self.height()) {
            return false;
        }
        self.flush_gestures();
        self.selection.cancel(&mut self.canvas);
        self.canvas.resize(width, height);
        self.commit("Resize Canvas");
        true
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn undo(&mut self) -> bool {
        self.flush_gestures();
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        restore_snapshot(&mut self.canvas, snapshot);
        self.is_dirty = true;
        true
    }

    pub fn redo(&mut self) -> bool {
        self.flush_gestures();
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        restore_snapshot(&mut self.canvas, snapshot);
        self.is_dirty = true;
        true
    }

    fn commit(&mut self, label: &str) {
        self.history.push(label, self.canvas.surface.snapshot());
        self.is_dirty = true;
        crate::log_debug!("history: '{}' ({} entries)", label, self.history.len());
    }

    /// Commit an in-flight stroke.  True if it pushed a history entry.
    fn flush_stroke(&mut self) -> bool {
        match self.stroke.end(&mut self.canvas, &self.props) {
            Some(stroke) => {
                self.commit(stroke.label);
                true
            }
            None => false,
        }
    }

    /// Finish anything mid-gesture so the surface is a settled state.
    fn flush_gestures(&mut self) {
        self.flush_stroke();
        self.flush_move();
        if !self.selection.is_idle() {
            self.selection.cancel(&mut self.canvas);
        }
    }

    /// Commit a selection move in flight.  A settled selection is kept.
    fn flush_move(&mut self) {
        if self.selection.phase() == SelectionPhase::Moving {
            let event = self.selection.finalize(&mut self.canvas);
            self.record_selection(&event);
        }
    }

    fn record_selection(&mut self, event: &SelectionEvent) -> bool {
        if event.committed() {
            self.commit(Tool::Move.history_label());
            true
        } else {
            false
        }
    }

    // ========================================================================
    // SELECTION + CLIPBOARD
    // ========================================================================

    pub fn copy(&self) -> bool {
        self.selection.copy()
    }

    pub fn cut(&mut self) -> bool {
        self.flush_stroke();
        if !self.selection.cut(&mut self.canvas).committed() {
            return false;
        }
        self.commit("Cut");
        true
    }

    /// Paste the clipboard with its top-left at the last pointer position.
    pub fn paste(&mut self) -> bool {
        self.flush_gestures();
        let (x, y) = pixel_of(self.last_pointer.0, self.last_pointer.1);
        if clipboard::paste_clipboard(&mut self.canvas.surface, x, y).is_none() {
            return false;
        }
        self.commit("Paste");
        true
    }

    pub fn delete_selection(&mut self) -> bool {
        self.flush_stroke();
        if !self.selection.delete(&mut self.canvas).committed() {
            return false;
        }
        self.commit("Delete Selection");
        true
    }

    /// Escape: drop the selection or move and any shape preview.  Freehand
    /// paint already on the surface is kept and committed.
    pub fn cancel_selection(&mut self) {
        if let Some(tool) = self.stroke.active_tool() {
            if matches!(tool.gesture(), GestureKind::Shape(_)) {
                self.stroke.cancel(&mut self.canvas);
            } else {
                self.flush_stroke();
            }
        }
        self.selection.cancel(&mut self.canvas);
    }

    pub fn select_all(&mut self) -> bool {
        self.flush_gestures();
        if !self.tool.is_selection_tool() {
            self.tool = Tool::Select;
        }
        let event = self.selection.select_all(&mut self.canvas);
        matches!(event, SelectionEvent::Selected(_))
    }

    // ========================================================================
    // IMAGE I/O
    // ========================================================================

    /// Flattened PNG of the surface, tagged with the title.
    pub fn export_png(&mut self) -> Result<Vec<u8>, ImageIoError> {
        self.flush_stroke();
        self.flush_move();
        let bytes = io::encode_png(self.canvas.surface.image(), Some(&self.title))?;
        self.is_dirty = false;
        crate::log_info!("project: exported '{}' ({} bytes)", self.title, bytes.len());
        Ok(bytes)
    }

    /// Decode `bytes` and replace the canvas with the image.
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<(), ImageIoError> {
        let image = io::decode_image(bytes)?;
        if let Some(title) = io::read_png_title(bytes) {
            self.set_title(&title);
        }
        self.apply_loaded_image(&image);
        Ok(())
    }

    /// Resize to the image, draw it over white, snapshot.  Also the landing
    /// point for results of `io::spawn_decode`.
    pub fn apply_loaded_image(&mut self, image: &RgbaImage) {
        if image.width() == 0 || image.height() == 0 {
            return;
        }
        self.stroke.cancel(&mut self.canvas);
        self.selection.cancel(&mut self.canvas);
        self.canvas.resize(image.width(), image.height());
        self.canvas.surface.fill(BACKGROUND);
        for (dst, src) in self.canvas.surface.image_mut().pixels_mut().zip(image.pixels()) {
            *dst = blend_over(*dst, *src, 1.0);
        }
        self.canvas.surface.mark_dirty(None);
        self.commit("Open Image");
        crate::log_info!("project: loaded {}x{} image", image.width(), image.height());
    }

    // ========================================================================
    // DISPLAY
    // ========================================================================

    /// Show a black/white threshold of the canvas for the preview duration.
    pub fn view_in_black(&mut self, now: Instant) {
        if self.canvas.is_empty() {
            return;
        }
        let preview = MonochromePreview::new(self.canvas.surface.image(), now, self.preview_duration);
        self.canvas.set_preview(preview);
    }

    pub fn display_image(&mut self, now: Instant) -> RgbaImage {
        self.canvas.display_image(now)
    }

    pub fn take_dirty(&mut self) -> Option<PixelRect> {
        self.canvas.surface.take_dirty()
    }

    // ========================================================================
    // KEYBOARD
    // ========================================================================

    /// Route a key press through the bindings.  Save and Open are returned
    /// for the host to carry out; everything else is performed here.
    pub fn handle_key(&mut self, press: &KeyPress) -> Option<EditorAction> {
        let action = self.keybindings.action_for(press)?;
        self.perform(action, Instant::now());
        Some(action)
    }

    pub fn perform(&mut self, action: EditorAction, now: Instant) {
        if let Some(tool) = action.tool() {
            self.set_tool(tool);
            return;
        }
        match action {
            EditorAction::Undo => {
                self.undo();
            }
            EditorAction::Redo => {
                self.redo();
            }
            EditorAction::Copy => {
                self.copy();
            }
            EditorAction::Cut => {
                self.cut();
            }
            EditorAction::Paste => {
                self.paste();
            }
            EditorAction::SelectAll => {
                self.select_all();
            }
            EditorAction::DeleteSelection => {
                self.delete_selection();
            }
            EditorAction::CancelSelection => self.cancel_selection(),
            EditorAction::Clear => self.clear(),
            EditorAction::ViewInBlack => self.view_in_black(now),
            EditorAction::BrushSizeDecrease => self.props.set_size(self.props.size.saturating_sub(1)),
            EditorAction::BrushSizeIncrease => self.props.set_size(self.props.size + 1),
            // Host-side: file dialogs and downloads live outside the core.
            EditorAction::Save | EditorAction::Open => {}
            _ => {}
        }
    }
}

/// Continuous pointer position → the pixel under it.
fn pixel_of(x: f32, y: f32) -> (i32, i32) {
    (x.floor() as i32, y.floor() as i32)
}

/// Load a history snapshot into the canvas, resizing first if the snapshot
/// predates a size change.
fn restore_snapshot(canvas: &mut CanvasState, snapshot: &Snapshot) {
    canvas.clear_overlay();
    if (snapshot.width(), snapshot.height()) != (canvas.width(), canvas.height()) {
        canvas.resize(snapshot.width(), snapshot.height());
    }
    if let Err(e) = canvas.surface.restore(snapshot) {
        crate::log_err!("history: restore failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::opaque;
    use crate::input::Key;
    use image::Rgba;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    fn px(p: &Project, x: u32, y: u32) -> Rgba<u8> {
        *p.canvas.surface.image().get_pixel(x, y)
    }

    fn project(w: u32, h: u32) -> Project {
        let mut p = Project::new(w, h);
        p.props.anti_aliased = false;
        p
    }

    #[test]
    fn new_project_has_white_baseline() {
        let p = project(8, 6);
        assert!(p.canvas.surface.image().pixels().all(|c| *c == BACKGROUND));
        assert_eq!(p.history.len(), 1);
        assert!(!p.can_undo());
        assert!(!p.can_redo());
        assert!(!p.is_dirty);
    }

    #[test]
    fn brush_gesture_commits_once_and_undoes() {
        let mut p = project(40, 40);
        p.props.color = RED;
        p.props.set_size(4);
        assert_eq!(p.pointer_down(5.0, 20.0), PointerResponse::Handled);
        p.pointer_move(15.0, 20.0);
        p.pointer_move(30.0, 20.0);
        assert_eq!(p.history.len(), 1);
        assert_eq!(p.pointer_up(), PointerResponse::Committed);
        assert_eq!(p.history.len(), 2);
        assert_eq!(px(&p, 20, 20), opaque(RED));
        assert_eq!(p.history.undo_description(), Some("Brush Stroke"));

        assert!(p.undo());
        assert_eq!(px(&p, 20, 20), BACKGROUND);
        assert!(p.redo());
        assert_eq!(px(&p, 20, 20), opaque(RED));
    }

    #[test]
    fn bucket_commits_only_when_pixels_change() {
        let mut p = project(10, 10);
        p.set_tool(Tool::Bucket);
        p.props.color = RED;
        assert_eq!(p.pointer_down(3.0, 3.0), PointerResponse::Committed);
        assert!(p.canvas.surface.image().pixels().all(|c| *c == opaque(RED)));
        assert_eq!(p.pointer_down(3.0, 3.0), PointerResponse::Handled);
        assert_eq!(p.history.len(), 2);
        assert_eq!(p.pointer_move(4.0, 4.0), PointerResponse::Ignored);
        assert_eq!(p.pointer_up(), PointerResponse::Ignored);
    }

    #[test]
    fn eyedropper_sets_colour_without_history() {
        let mut p = project(10, 10);
        p.canvas.surface.write_pixel(2, 7, Rgba([10, 20, 30, 255])).unwrap();
        p.set_tool(Tool::Eyedropper);
        assert_eq!(p.pointer_down(2.5, 7.5), PointerResponse::ColorPicked(Rgb([10, 20, 30])));
        assert_eq!(p.props.color, Rgb([10, 20, 30]));
        assert_eq!(p.history.len(), 1);
        assert_eq!(p.pointer_down(-1.0, 3.0), PointerResponse::Ignored);
    }

    #[test]
    fn circle_tool_previews_then_commits() {
        let mut p = project(30, 30);
        p.set_tool(Tool::Circle);
        p.props.color = BLUE;
        p.props.shape_fill = crate::ops::shapes::ShapeFillMode::Filled;
        p.pointer_down(10.0, 10.0);
        p.pointer_move(13.0, 14.0);
        assert!(p.canvas.has_overlay());
        assert_eq!(px(&p, 10, 10), BACKGROUND);
        p.pointer_up();
        assert!(!p.canvas.has_overlay());
        assert_eq!(px(&p, 10, 10), opaque(BLUE));
        assert_eq!(px(&p, 10, 20), BACKGROUND);
        assert_eq!(p.history.len(), 2);
    }

    #[test]
    fn move_selection_with_pointer() {
        let mut p = project(100, 100);
        p.canvas.surface.fill_rect(PixelRect::new(10, 10, 20, 20), opaque(RED));
        p.commit("Paint");
        p.set_tool(Tool::Select);
        p.pointer_down(10.0, 10.0);
        p.pointer_move(30.0, 30.0);
        p.pointer_up();
        assert_eq!(p.selection_phase(), SelectionPhase::Selected);
        assert_eq!(p.history.len(), 2);

        p.pointer_down(15.0, 15.0);
        assert_eq!(p.selection_phase(), SelectionPhase::Moving);
        p.pointer_move(55.0, 55.0);
        assert_eq!(px(&p, 55, 55), BACKGROUND);
        assert_eq!(p.pointer_up(), PointerResponse::Committed);

        assert_eq!(px(&p, 15, 15), BACKGROUND);
        assert_eq!(px(&p, 50, 50), opaque(RED));
        assert_eq!(px(&p, 69, 69), opaque(RED));
        assert_eq!(p.history.len(), 3);
        assert!(p.undo());
        assert_eq!(px(&p, 15, 15), opaque(RED));
        assert_eq!(px(&p, 55, 55), BACKGROUND);
    }

    #[test]
    fn select_all_mid_move_records_the_move() {
        let mut p = project(50, 50);
        p.canvas.surface.fill_rect(PixelRect::new(0, 0, 10, 10), opaque(RED));
        p.commit("Paint");
        p.set_tool(Tool::Select);
        p.pointer_down(0.0, 0.0);
        p.pointer_move(10.0, 10.0);
        p.pointer_up();
        p.pointer_down(5.0, 5.0);
        p.pointer_move(35.0, 35.0);

        assert_eq!(p.handle_key(&KeyPress::ctrl(Key::char('a'))), Some(EditorAction::SelectAll));
        assert_eq!(px(&p, 30, 30), opaque(RED));
        assert_eq!(p.history.len(), 3);
        assert_eq!(p.history.undo_description(), Some("Move Selection"));
        assert_eq!(p.selection_rect(), Some(PixelRect::new(0, 0, 50, 50)));

        assert!(p.undo());
        assert_eq!(px(&p, 0, 0), opaque(RED));
        assert_eq!(px(&p, 30, 30), BACKGROUND);
    }

    #[test]
    fn export_keeps_a_settled_selection() {
        let mut p = project(20, 20);
        p.set_tool(Tool::Select);
        p.pointer_down(2.0, 2.0);
        p.pointer_move(8.0, 8.0);
        p.pointer_up();
        assert!(p.export_png().is_ok());
        assert_eq!(p.selection_phase(), SelectionPhase::Selected);
        assert_eq!(p.history.len(), 1);
    }

    #[test]
    fn switching_tool_mid_move_commits_it() {
        let mut p = project(50, 50);
        p.canvas.surface.fill_rect(PixelRect::new(0, 0, 10, 10), opaque(RED));
        p.set_tool(Tool::Select);
        p.pointer_down(0.0, 0.0);
        p.pointer_move(10.0, 10.0);
        p.pointer_up();
        p.pointer_down(5.0, 5.0);
        p.pointer_move(25.0, 25.0);
        p.set_tool(Tool::Brush);
        assert_eq!(p.selection_phase(), SelectionPhase::Idle);
        assert_eq!(px(&p, 20, 20), opaque(RED));
        assert_eq!(px(&p, 5, 5), BACKGROUND);
        assert_eq!(p.history.len(), 2);
    }

    #[test]
    fn undo_flushes_an_open_stroke_first() {
        let mut p = project(30, 30);
        p.props.color = RED;
        p.pointer_down(2.0, 2.0);
        p.pointer_move(20.0, 2.0);
        assert!(p.undo());
        assert!(!p.is_gesture_active());
        assert_eq!(px(&p, 10, 2), BACKGROUND);
        assert!(p.can_redo());
    }

    #[test]
    fn resize_is_undoable_across_dimensions() {
        let mut p = project(100, 100);
        p.canvas.surface.write_pixel(80, 80, opaque(RED)).unwrap();
        assert!(p.resize(50, 50));
        assert_eq!((p.width(), p.height()), (50, 50));
        assert!(p.resize(100, 100));
        assert_eq!(px(&p, 80, 80), BACKGROUND);
        assert!(p.undo());
        assert_eq!((p.width(), p.height()), (50, 50));
        assert!(!p.resize(50, 50));
    }

    #[test]
    fn clear_resets_history() {
        let mut p = project(10, 10);
        p.apply_edit(EditOp::Fill { x: 0, y: 0 });
        p.props.color = RED;
        assert!(p.apply_edit(EditOp::Fill { x: 0, y: 0 }));
        assert!(p.apply_edit(EditOp::Clear));
        assert_eq!(p.history.len(), 1);
        assert!(!p.can_undo());
        assert_eq!(px(&p, 0, 0), BACKGROUND);
    }

    #[test]
    fn stroke_edit_draws_a_line_shape() {
        let mut p = project(40, 40);
        p.props.color = BLUE;
        p.props.set_size(3);
        let op = EditOp::Stroke { tool: Tool::Line, points: vec![(5.0, 20.0), (20.0, 20.0), (35.0, 20.0)] };
        assert!(p.apply_edit(op));
        assert_eq!(p.tool(), Tool::Line);
        assert_eq!(px(&p, 20, 20), opaque(BLUE));
        assert!(!p.apply_edit(EditOp::Stroke { tool: Tool::Bucket, points: vec![(1.0, 1.0)] }));
        assert!(!p.apply_edit(EditOp::Stroke { tool: Tool::Brush, points: vec![] }));
    }

    #[test]
    fn load_and_export_png() {
        let mut p = project(10, 10);
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let bytes = io::encode_png(&img, Some("Loaded")).unwrap();

        p.load_image(&bytes).unwrap();
        assert_eq!((p.width(), p.height()), (4, 3));
        assert_eq!(px(&p, 0, 0), BACKGROUND);
        assert_eq!(px(&p, 3, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(p.title, "Loaded");
        assert_eq!(p.history.undo_description(), Some("Open Image"));

        assert!(p.load_image(b"junk").is_err());
        assert_eq!((p.width(), p.height()), (4, 3));

        p.set_title("Exported art");
        let out = p.export_png().unwrap();
        assert!(!p.is_dirty);
        assert_eq!(io::read_png_title(&out).as_deref(), Some("Exported art"));
        assert_eq!(io::decode_image(&out).unwrap(), *p.canvas.surface.image());
        assert_eq!(p.suggested_filename(), "Exported art.png");
    }

    #[test]
    fn keyboard_shortcuts_drive_the_editor() {
        let mut p = project(10, 10);
        assert_eq!(p.handle_key(&KeyPress::plain(Key::char('f'))), Some(EditorAction::ToolBucket));
        assert_eq!(p.tool(), Tool::Bucket);
        p.props.color = RED;
        p.pointer_down(1.0, 1.0);
        assert_eq!(p.handle_key(&KeyPress::ctrl(Key::char('z'))), Some(EditorAction::Undo));
        assert_eq!(px(&p, 1, 1), BACKGROUND);
        p.handle_key(&KeyPress::ctrl(Key::char('y')));
        assert_eq!(px(&p, 1, 1), opaque(RED));
        assert_eq!(p.handle_key(&KeyPress::ctrl(Key::char('s'))), Some(EditorAction::Save));

        let size = p.props.size;
        p.handle_key(&KeyPress::plain(Key::char(']')));
        assert_eq!(p.props.size, size + 1);
    }

    #[test]
    fn delete_and_escape() {
        let mut p = project(20, 20);
        p.props.color = RED;
        p.apply_edit(EditOp::Fill { x: 0, y: 0 });
        p.set_tool(Tool::Select);
        p.pointer_down(2.0, 2.0);
        p.pointer_move(6.0, 6.0);
        p.pointer_up();
        p.handle_key(&KeyPress::plain(Key::Escape));
        assert_eq!(p.selection_phase(), SelectionPhase::Idle);
        assert!(!p.delete_selection());

        p.pointer_down(2.0, 2.0);
        p.pointer_move(6.0, 6.0);
        p.pointer_up();
        p.handle_key(&KeyPress::plain(Key::Delete));
        assert_eq!(px(&p, 3, 3), BACKGROUND);
        assert_eq!(px(&p, 7, 7), opaque(RED));
        assert_eq!(p.history.undo_description(), Some("Delete Selection"));
    }

    #[test]
    fn escape_drops_shape_preview() {
        let mut p = project(20, 20);
        p.set_tool(Tool::Rectangle);
        p.pointer_down(2.0, 2.0);
        p.pointer_move(12.0, 12.0);
        p.cancel_selection();
        assert!(!p.canvas.has_overlay());
        assert_eq!(p.pointer_up(), PointerResponse::Ignored);
        assert_eq!(p.history.len(), 1);
    }

    #[test]
    fn pointer_leave_ends_the_gesture() {
        let mut p = project(20, 20);
        p.pointer_down(2.0, 2.0);
        p.pointer_move(12.0, 2.0);
        assert_eq!(p.pointer_leave(), PointerResponse::Committed);
        assert!(!p.is_gesture_active());
    }

    #[test]
    fn text_tool_requests_text() {
        let mut p = project(20, 20);
        p.set_tool(Tool::Text);
        assert_eq!(p.pointer_down(4.0, 9.0), PointerResponse::TextRequested { x: 4.0, y: 9.0 });
        assert!(!p.place_text(4.0, 9.0, "   "));
        assert_eq!(p.history.len(), 1);
    }

    #[test]
    fn monochrome_preview_is_transient() {
        let mut p = project(4, 4);
        p.canvas.surface.write_pixel(0, 0, Rgba([100, 100, 100, 255])).unwrap();
        let now = Instant::now();
        p.view_in_black(now);
        let shown = p.display_image(now);
        assert_eq!(*shown.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(px(&p, 0, 0), Rgba([100, 100, 100, 255]));
        assert_eq!(p.history.len(), 1);
        let later = p.display_image(now + Duration::from_secs(3));
        assert_eq!(*later.get_pixel(0, 0), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn empty_canvas_ignores_input() {
        let mut p = project(0, 0);
        assert_eq!(p.pointer_down(0.0, 0.0), PointerResponse::Ignored);
        assert!(!p.apply_edit(EditOp::Fill { x: 0, y: 0 }));
        assert!(!p.select_all());
    }

    #[test]
    fn settings_shape_the_project() {
        let mut s = AppSettings::default();
        s.canvas_width = 30;
        s.canvas_height = 20;
        s.max_undo_steps = 3;
        s.brush_size = 7;
        let mut p = Project::with_settings(&s);
        assert_eq!((p.width(), p.height()), (30, 20));
        assert_eq!(p.props.size, 7);
        assert_eq!(p.history.len(), 1);
        for i in 0..5u8 {
            p.props.color = Rgb([i, 0, 0]);
            p.apply_edit(EditOp::Fill { x: 0, y: 0 });
        }
        assert_eq!(p.history.len(), 3);
    }
}
