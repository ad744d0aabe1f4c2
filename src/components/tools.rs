use image::{Rgb, Rgba};

use crate::canvas::{CanvasState, PixelRect, opaque};
use crate::ops::brush::{self, BrushMode};
use crate::ops::shapes::{self, OUTLINE_WIDTH, PlacedShape, ShapeFillMode, ShapeKind};
use crate::ops::text;

pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 200;

// ============================================================================
// TOOLS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Brush,
    Pencil,
    Eraser,
    Spray,
    Bucket,
    Eyedropper,
    Rectangle,
    Circle,
    Line,
    Polygon,
    Star,
    Arrow,
    Text,
    Select,
    Move,
}

/// How a tool consumes pointer input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureKind {
    /// Paints on every extend; committed on end.
    Freehand,
    /// Previews on the overlay; one commit on end.
    Shape(ShapeKind),
    /// Acts once on pointer down.
    SingleShot,
    /// Routed to the selection manager.
    Selection,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Brush,
            Tool::Pencil,
            Tool::Eraser,
            Tool::Spray,
            Tool::Bucket,
            Tool::Eyedropper,
            Tool::Rectangle,
            Tool::Circle,
            Tool::Line,
            Tool::Polygon,
            Tool::Star,
            Tool::Arrow,
            Tool::Text,
            Tool::Select,
            Tool::Move,
        ]
    }

    /// Stable lowercase identifier used in config files and scripts.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush => "brush",
            Tool::Pencil => "pencil",
            Tool::Eraser => "eraser",
            Tool::Spray => "spray",
            Tool::Bucket => "bucket",
            Tool::Eyedropper => "eyedropper",
            Tool::Rectangle => "rectangle",
            Tool::Circle => "circle",
            Tool::Line => "line",
            Tool::Polygon => "polygon",
            Tool::Star => "star",
            Tool::Arrow => "arrow",
            Tool::Text => "text",
            Tool::Select => "select",
            Tool::Move => "move",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        let name = name.trim().to_ascii_lowercase();
        Tool::all().iter().copied().find(|t| t.name() == name)
    }

    pub fn gesture(&self) -> GestureKind {
        match self {
            Tool::Brush | Tool::Pencil | Tool::Eraser | Tool::Spray => GestureKind::Freehand,
            Tool::Rectangle => GestureKind::Shape(ShapeKind::Rectangle),
            Tool::Circle => GestureKind::Shape(ShapeKind::Circle),
            Tool::Line => GestureKind::Shape(ShapeKind::Line),
            Tool::Polygon => GestureKind::Shape(ShapeKind::Polygon),
            Tool::Star => GestureKind::Shape(ShapeKind::Star),
            Tool::Arrow => GestureKind::Shape(ShapeKind::Arrow),
            Tool::Bucket | Tool::Eyedropper | Tool::Text => GestureKind::SingleShot,
            Tool::Select | Tool::Move => GestureKind::Selection,
        }
    }

    pub fn is_selection_tool(&self) -> bool {
        matches!(self, Tool::Select | Tool::Move)
    }

    /// Label stored with the history entry this tool produces.
    pub fn history_label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush Stroke",
            Tool::Pencil => "Pencil Stroke",
            Tool::Eraser => "Eraser Stroke",
            Tool::Spray => "Spray",
            Tool::Bucket => "Fill",
            Tool::Eyedropper => "Pick Color",
            Tool::Rectangle => "Rectangle",
            Tool::Circle => "Circle",
            Tool::Line => "Line",
            Tool::Polygon => "Polygon",
            Tool::Star => "Star",
            Tool::Arrow => "Arrow",
            Tool::Text => "Text",
            Tool::Select | Tool::Move => "Move Selection",
        }
    }
}

// ============================================================================
// TOOL PROPERTIES
// ============================================================================

#[derive(Clone, Debug)]
pub struct ToolProperties {
    pub color: Rgb<u8>,
    /// Brush diameter in pixels.
    pub size: u32,
    /// 0.0..=1.0
    pub opacity: f32,
    pub shape_fill: ShapeFillMode,
    pub anti_aliased: bool,
    pub font_family: String,
    pub font_size: f32,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            color: Rgb([0, 0, 0]),
            size: 2,
            opacity: 1.0,
            shape_fill: ShapeFillMode::Outline,
            anti_aliased: true,
            font_family: text::DEFAULT_FONT_FAMILY.to_string(),
            font_size: text::DEFAULT_FONT_SIZE,
        }
    }
}

impl ToolProperties {
    pub fn set_size(&mut self, size: u32) {
        self.size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn set_font_size(&mut self, size: f32) {
        self.font_size = text::clamp_font_size(size);
    }

    pub fn paint_color(&self) -> Rgba<u8> {
        opaque(self.color)
    }

    pub fn color_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.color[0], self.color[1], self.color[2])
    }
}

/// Parse `#rrggbb`, `rrggbb` or `#rgb`.
pub fn parse_hex_color(s: &str) -> Option<Rgb<u8>> {
    let hex = s.trim().trim_start_matches('#');
    let expand = |c: u8| c * 17;
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
            let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
            let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
            Some(Rgb([r, g, b]))
        }
        3 => {
            let r = u8::from_str_radix(hex.get(0..1)?, 16).ok()?;
            let g = u8::from_str_radix(hex.get(1..2)?, 16).ok()?;
            let b = u8::from_str_radix(hex.get(2..3)?, 16).ok()?;
            Some(Rgb([expand(r), expand(g), expand(b)]))
        }
        _ => None,
    }
}

// ============================================================================
// STROKE COMPOSITOR - one pointer gesture at a time
// ============================================================================

/// A finished gesture that changed pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommittedStroke {
    pub label: &'static str,
    pub region: PixelRect,
}

struct Gesture {
    tool: Tool,
    anchor: (f32, f32),
    last: (f32, f32),
    painted: Option<PixelRect>,
    spray_counter: u32,
}

impl Gesture {
    fn expand(&mut self, rect: Option<PixelRect>) {
        if let Some(r) = rect {
            self.painted = Some(match self.painted {
                Some(p) => p.union(&r),
                None => r,
            });
        }
    }
}

/// Runs begin → extend × N → end for freehand and shape tools.
#[derive(Default)]
pub struct StrokeCompositor {
    active: Option<Gesture>,
}

impl StrokeCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_tool(&self) -> Option<Tool> {
        self.active.as_ref().map(|g| g.tool)
    }

    /// Start a gesture.  Returns false for tools that are not stroke tools
    /// and for an empty canvas.
    pub fn begin(&mut self, tool: Tool, x: f32, y: f32, canvas: &mut CanvasState, props: &ToolProperties) -> bool {
        if canvas.is_empty() || !matches!(tool.gesture(), GestureKind::Freehand | GestureKind::Shape(_)) {
            return false;
        }
        if self.active.is_some() {
            self.cancel(canvas);
        }
        let mut gesture = Gesture {
            tool,
            anchor: (x, y),
            last: (x, y),
            painted: None,
            spray_counter: 0,
        };
        if tool == Tool::Pencil {
            let r = brush::draw_pencil_line(&mut canvas.surface, (x, y), (x, y), props.paint_color(), props.opacity);
            gesture.expand(r);
        }
        self.active = Some(gesture);
        true
    }

    pub fn extend(&mut self, x: f32, y: f32, canvas: &mut CanvasState, props: &ToolProperties) {
        let Some(g) = self.active.as_mut() else { return };
        let color = props.paint_color();
        let size = props.size as f32;
        let from = g.last;
        let to = (x, y);

        match g.tool.gesture() {
            GestureKind::Freehand => {
                let painted = match g.tool {
                    Tool::Brush => brush::draw_segment(
                        &mut canvas.surface,
                        from,
                        to,
                        size,
                        color,
                        props.opacity,
                        BrushMode::Paint,
                        props.anti_aliased,
                    ),
                    Tool::Eraser => brush::draw_segment(
                        &mut canvas.surface,
                        from,
                        to,
                        size * 2.0,
                        color,
                        props.opacity,
                        BrushMode::Erase,
                        props.anti_aliased,
                    ),
                    Tool::Pencil => brush::draw_pencil_line(&mut canvas.surface, from, to, color, props.opacity),
                    Tool::Spray => {
                        brush::spray(&mut canvas.surface, to, size, color, props.opacity, &mut g.spray_counter)
                    }
                    _ => None,
                };
                g.expand(painted);
            }
            GestureKind::Shape(kind) => {
                let placed = placed_shape(kind, g.anchor, to, props);
                match shapes::rasterize_shape(&placed, canvas.width(), canvas.height()) {
                    Some(raster) => raster.blend_onto(canvas.begin_overlay(), props.opacity),
                    None => canvas.clear_overlay(),
                }
            }
            GestureKind::SingleShot | GestureKind::Selection => {}
        }
        g.last = to;
    }

    /// Finish the gesture.  `Some` when pixels changed and a snapshot is due.
    pub fn end(&mut self, canvas: &mut CanvasState, props: &ToolProperties) -> Option<CommittedStroke> {
        let mut g = self.active.take()?;
        if let GestureKind::Shape(kind) = g.tool.gesture() {
            canvas.clear_overlay();
            let placed = placed_shape(kind, g.anchor, g.last, props);
            let r = shapes::draw_shape(&mut canvas.surface, &placed, props.opacity);
            g.expand(r);
        }
        let region = g.painted?;
        crate::log_debug!(
            "stroke: {} committed over {}x{} at ({}, {})",
            g.tool.name(),
            region.width,
            region.height,
            region.x,
            region.y
        );
        Some(CommittedStroke {
            label: g.tool.history_label(),
            region,
        })
    }

    /// Drop the gesture.  Shape previews vanish; freehand paint already on
    /// the surface stays until the caller restores a snapshot.
    pub fn cancel(&mut self, canvas: &mut CanvasState) {
        if self.active.take().is_some() {
            canvas.clear_overlay();
        }
    }
}

fn placed_shape(kind: ShapeKind, anchor: (f32, f32), end: (f32, f32), props: &ToolProperties) -> PlacedShape {
    PlacedShape {
        kind,
        anchor,
        end,
        fill_mode: props.shape_fill,
        stroke_width: if kind == ShapeKind::Line {
            props.size as f32
        } else {
            OUTLINE_WIDTH
        },
        color: props.paint_color(),
        anti_alias: props.anti_aliased,
    }
}
