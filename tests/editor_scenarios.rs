//! End-to-end editing scenarios through the public API.

use image::{Rgb, Rgba};
use retropaint::canvas::{BACKGROUND, PixelRect, Surface};
use retropaint::components::history::HistoryManager;
use retropaint::components::tools::Tool;
use retropaint::input::{EditorAction, Key, KeyPress};
use retropaint::ops::fill::flood_fill;
use retropaint::ops::selection::SelectionPhase;
use retropaint::ops::shapes::ShapeFillMode;
use retropaint::{EditOp, PointerResponse, Project};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn pixel(p: &Project, x: u32, y: u32) -> Rgba<u8> {
    *p.canvas.surface.image().get_pixel(x, y)
}

fn crisp(w: u32, h: u32) -> Project {
    let mut p = Project::new(w, h);
    p.props.anti_aliased = false;
    p
}

#[test]
fn history_after_n_edits() {
    let mut p = crisp(16, 16);
    for i in 0..5u8 {
        p.props.color = Rgb([i * 40, 0, 0]);
        assert!(p.apply_edit(EditOp::Fill { x: 0, y: 0 }));
    }
    assert_eq!(p.history.len(), 6);
    assert_eq!(p.history.cursor(), Some(5));
    for _ in 0..5 {
        assert!(p.undo());
    }
    assert!(!p.undo());
    assert!(p.canvas.surface.image().pixels().all(|c| *c == BACKGROUND));
}

#[test]
fn fifty_first_snapshot_evicts_the_oldest() {
    let mut history = HistoryManager::default();
    let mut surface = Surface::new(2, 1);
    for i in 0..51u8 {
        surface.write_pixel(0, 0, Rgba([i, 0, 0, 255])).unwrap();
        history.push(format!("edit {}", i), surface.snapshot());
    }
    assert_eq!(history.len(), 50);
    let mut oldest = None;
    while let Some(s) = history.undo() {
        oldest = Some(*s.pixels().get_pixel(0, 0));
    }
    assert_eq!(oldest, Some(Rgba([1, 0, 0, 255])));
}

#[test]
fn undo_redo_round_trip_is_exact() {
    let mut p = crisp(40, 40);
    p.props.color = Rgb([10, 200, 30]);
    p.props.set_size(5);
    p.apply_edit(EditOp::Stroke { tool: Tool::Brush, points: vec![(2.0, 2.0), (30.0, 25.0), (35.0, 5.0)] });
    let after = p.canvas.surface.image().clone();
    p.undo();
    p.redo();
    assert_eq!(*p.canvas.surface.image(), after);
}

#[test]
fn new_edit_after_undo_discards_redo() {
    let mut p = crisp(10, 10);
    p.props.color = Rgb([255, 0, 0]);
    p.apply_edit(EditOp::Fill { x: 0, y: 0 });
    p.undo();
    assert!(p.can_redo());
    p.props.color = Rgb([0, 255, 0]);
    p.apply_edit(EditOp::Fill { x: 0, y: 0 });
    assert!(!p.can_redo());
    assert!(!p.redo());
    assert_eq!(pixel(&p, 5, 5), Rgba([0, 255, 0, 255]));
}

#[test]
fn large_uniform_fill_completes() {
    let mut s = Surface::new(2000, 2000);
    let report = flood_fill(&mut s, 1000, 1000, Rgb([0, 128, 255]));
    assert_eq!(report.filled, 4_000_000);
    assert!(s.image().pixels().all(|c| *c == Rgba([0, 128, 255, 255])));
}

#[test]
fn fill_with_target_colour_is_a_no_op() {
    let mut p = crisp(12, 12);
    p.props.color = Rgb([255, 255, 255]);
    let before = p.canvas.surface.image().clone();
    assert!(!p.apply_edit(EditOp::Fill { x: 4, y: 4 }));
    assert_eq!(*p.canvas.surface.image(), before);
    assert_eq!(p.history.len(), 1);
}

#[test]
fn red_bucket_on_white_ten_by_ten() {
    let mut p = crisp(10, 10);
    p.set_tool(Tool::Bucket);
    p.props.color = Rgb([255, 0, 0]);
    assert_eq!(p.pointer_down(0.0, 0.0), PointerResponse::Committed);
    assert!(p.canvas.surface.image().pixels().all(|c| *c == RED));
    assert_eq!(p.history.len(), 2);
    assert_eq!(p.history.undo_description(), Some("Fill"));
}

#[test]
fn blue_circle_of_radius_five() {
    let mut p = crisp(40, 40);
    p.set_tool(Tool::Circle);
    p.props.shape_fill = ShapeFillMode::Filled;
    p.props.color = Rgb([0, 0, 255]);
    p.pointer_down(10.0, 10.0);
    p.pointer_move(12.0, 12.0);
    p.pointer_move(15.0, 10.0);
    assert_eq!(pixel(&p, 10, 10), BACKGROUND);
    assert_eq!(p.pointer_up(), PointerResponse::Committed);
    assert_eq!(pixel(&p, 10, 10), BLUE);
    assert_eq!(pixel(&p, 10, 20), BACKGROUND);
    assert_eq!(p.history.len(), 2);
    assert!(!p.canvas.has_overlay());
}

#[test]
fn selection_moves_a_block() {
    let mut p = crisp(100, 100);
    p.canvas.surface.fill_rect(PixelRect::new(10, 10, 20, 20), RED);
    p.set_tool(Tool::Select);
    p.pointer_down(10.0, 10.0);
    p.pointer_move(30.0, 30.0);
    p.pointer_up();
    assert_eq!(p.selection_rect(), Some(PixelRect::new(10, 10, 20, 20)));

    p.pointer_down(10.0, 10.0);
    p.pointer_move(50.0, 50.0);
    p.pointer_up();

    for y in 10..30 {
        for x in 10..30 {
            assert_eq!(pixel(&p, x, y), BACKGROUND, "source ({x},{y}) should be cleared");
        }
    }
    for y in 50..70 {
        for x in 50..70 {
            assert_eq!(pixel(&p, x, y), RED, "destination ({x},{y}) should be red");
        }
    }
    assert_eq!(p.selection_phase(), SelectionPhase::Idle);
    assert_eq!(p.history.len(), 2);
}

#[test]
fn resize_shrink_then_grow() {
    let mut p = crisp(100, 100);
    p.canvas.surface.write_pixel(80, 80, RED).unwrap();
    p.canvas.surface.write_pixel(10, 10, RED).unwrap();
    p.apply_edit(EditOp::Resize { width: 50, height: 50 });
    p.apply_edit(EditOp::Resize { width: 100, height: 100 });
    assert_eq!(pixel(&p, 80, 80), BACKGROUND);
    assert_eq!(pixel(&p, 10, 10), RED);
    assert_eq!(p.canvas.surface.image().as_raw().len(), 100 * 100 * 4);
}

#[test]
fn keyboard_session() {
    let mut p = crisp(30, 30);
    p.handle_key(&KeyPress::plain(Key::char('r')));
    assert_eq!(p.tool(), Tool::Rectangle);
    p.pointer_down(5.0, 5.0);
    p.pointer_move(20.0, 20.0);
    p.handle_key(&KeyPress::plain(Key::Escape));
    assert_eq!(p.pointer_up(), PointerResponse::Ignored);
    assert_eq!(p.history.len(), 1);

    p.apply_edit(EditOp::Stroke { tool: Tool::Rectangle, points: vec![(5.0, 5.0), (20.0, 20.0)] });
    assert_eq!(p.history.len(), 2);
    assert_eq!(p.handle_key(&KeyPress::meta(Key::char('z'))), Some(EditorAction::Undo));
    assert!(p.canvas.surface.image().pixels().all(|c| *c == BACKGROUND));
    assert_eq!(p.handle_key(&KeyPress::ctrl_shift(Key::char('z'))), Some(EditorAction::Redo));
    assert_eq!(pixel(&p, 5, 5), Rgba([0, 0, 0, 255]));
}

// The only test in this binary that touches the process-wide clipboard.
#[test]
fn copy_then_paste_skips_white() {
    let mut p = crisp(40, 40);
    p.canvas.surface.fill_rect(PixelRect::new(0, 0, 4, 4), BLUE);
    p.set_tool(Tool::Select);
    p.pointer_down(0.0, 0.0);
    p.pointer_move(8.0, 8.0);
    p.pointer_up();
    assert!(p.copy());

    p.canvas.surface.fill_rect(PixelRect::new(20, 20, 10, 10), RED);
    assert!(p.apply_edit(EditOp::Paste { x: 20, y: 20 }));
    assert_eq!(pixel(&p, 21, 21), BLUE);
    // White part of the copied region does not cover the red underneath.
    assert_eq!(pixel(&p, 26, 26), RED);
    assert_eq!(p.history.undo_description(), Some("Paste"));

    p.set_tool(Tool::Select);
    p.pointer_down(20.0, 20.0);
    p.pointer_move(24.0, 24.0);
    p.pointer_up();
    assert!(p.cut());
    assert_eq!(pixel(&p, 21, 21), BACKGROUND);
    assert!(p.apply_edit(EditOp::Paste { x: 0, y: 30 }));
    assert_eq!(pixel(&p, 1, 31), BLUE);
}
