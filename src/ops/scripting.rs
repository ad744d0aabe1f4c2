// ============================================================================
// Edit scripts: a sandboxed Rhai engine driving a Project
// ============================================================================
//
// Scripts replay the same operations a user performs with the pointer and
// keyboard (tools, strokes, fills, selections, undo) so drawings can be
// produced headlessly from the CLI.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position, Scope};

use crate::components::tools::{Tool, parse_hex_color};
use crate::ops::shapes::ShapeFillMode;
use crate::project::{EditOp, Project};

pub const MAX_OPERATIONS: u64 = 50_000_000;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn at(message: String, pos: Position) -> Self {
        Self {
            message,
            line: pos.line().filter(|l| *l > 0),
            column: pos.position().filter(|c| *c > 0),
        }
    }

    /// Error explanation with location and a hint for the common mistakes.
    pub fn friendly_message(&self) -> String {
        let raw = &self.message;
        let short = raw.split(" (line ").next().unwrap_or(raw).trim();
        let mut parts = vec![match (self.line, self.column) {
            (Some(line), Some(col)) => format!("Error on line {}, column {}:", line, col),
            (Some(line), None) => format!("Error on line {}:", line),
            _ => "Script error:".to_string(),
        }];

        if let Some(fn_desc) = raw.strip_prefix("Function not found: ") {
            let fn_desc = fn_desc.split(" (line ").next().unwrap_or(fn_desc).trim();
            parts.push(format!("  Could not find function: {}", fn_desc));
            parts.push(String::new());
            parts.push("  Tip: coordinates accept ints or floats, colours are \"#rrggbb\" strings,".to_string());
            parts.push("  and tool names are lowercase, e.g. set_tool(\"brush\").".to_string());
        } else if let Some(var) = raw.split("Variable not found:").nth(1) {
            let var = var.split('(').next().unwrap_or(var).trim();
            parts.push(format!("  Variable '{}' is not defined.", var));
            parts.push(String::new());
            parts.push(format!("  Tip: declare it first with: let {} = 0;", var));
        } else if raw.contains("Syntax error") || raw.contains("Expected") {
            parts.push(format!("  Syntax error: {}", short));
            parts.push(String::new());
            parts.push("  Tip: check for missing semicolons or brackets near this line.".to_string());
        } else if raw.contains("Too many operations") {
            parts.push(format!("  Script exceeded the limit of {} operations.", MAX_OPERATIONS));
            parts.push(String::new());
            parts.push("  Tip: look for a loop that never ends.".to_string());
        } else {
            parts.push(format!("  {}", short));
        }
        parts.join("\n")
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "Line {}, Col {}: {}", line, col, self.message)
        } else if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

// ============================================================================
// Script context: the project being edited plus console output
// ============================================================================

struct ScriptContext {
    project: Project,
    console_output: Vec<String>,
}

type SharedContext = Arc<Mutex<ScriptContext>>;

fn with_project<R>(ctx: &SharedContext, f: impl FnOnce(&mut Project) -> R) -> R {
    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut lock.project)
}

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

// ============================================================================
// Engine construction
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    register_canvas_api(&mut engine, ctx.clone());
    register_tool_api(&mut engine, ctx.clone());
    register_gesture_api(&mut engine, ctx.clone());
    register_history_api(&mut engine, ctx.clone());
    register_selection_api(&mut engine, ctx.clone());

    let c = ctx;
    engine.on_print(move |msg| {
        crate::log_info!("script: {}", msg);
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.console_output.push(msg.to_string());
    });

    engine
}

// ============================================================================
// Canvas API
// ============================================================================

fn register_canvas_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("width", move || -> i64 { with_project(&c, |p| p.width() as i64) });

    let c = ctx.clone();
    engine.register_fn("height", move || -> i64 { with_project(&c, |p| p.height() as i64) });

    // get_pixel(x, y) -> [r, g, b, a]; zeros off-canvas
    let c = ctx.clone();
    engine.register_fn("get_pixel", move |x: i64, y: i64| -> Array {
        let px = with_project(&c, |p| p.canvas.surface.read_pixel(x as i32, y as i32).ok());
        let channels = px.map_or([0u8; 4], |p| p.0);
        channels.iter().map(|v| Dynamic::from(*v as i64)).collect()
    });

    let c = ctx.clone();
    engine.register_fn("clear", move || with_project(&c, |p| p.clear()));

    let c = ctx;
    engine.register_fn("resize", move |w: i64, h: i64| -> RhaiResult<bool> {
        if w <= 0 || h <= 0 || w > 16_384 || h > 16_384 {
            return Err(format!("resize: invalid size {}x{}", w, h).into());
        }
        Ok(with_project(&c, |p| p.apply_edit(EditOp::Resize { width: w as u32, height: h as u32 })))
    });
}

// ============================================================================
// Tool state API
// ============================================================================

fn register_tool_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("set_tool", move |name: ImmutableString| -> RhaiResult<()> {
        let tool = Tool::from_name(&name).ok_or_else(|| format!("unknown tool '{}'", name))?;
        with_project(&c, |p| p.set_tool(tool));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_color", move |hex: ImmutableString| -> RhaiResult<()> {
        let color = parse_hex_color(&hex).ok_or_else(|| format!("invalid colour '{}'", hex))?;
        with_project(&c, |p| p.props.color = color);
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_color", move |r: i64, g: i64, b: i64| {
        let ch = |v: i64| v.clamp(0, 255) as u8;
        with_project(&c, |p| p.props.color = image::Rgb([ch(r), ch(g), ch(b)]));
    });

    let c = ctx.clone();
    engine.register_fn("set_size", move |size: i64| {
        with_project(&c, |p| p.props.set_size(size.clamp(0, u32::MAX as i64) as u32));
    });

    let c = ctx.clone();
    engine.register_fn("set_opacity", move |opacity: f64| {
        with_project(&c, |p| p.props.set_opacity(opacity as f32));
    });

    let c = ctx.clone();
    engine.register_fn("set_filled", move |filled: bool| {
        with_project(&c, |p| {
            p.props.shape_fill = if filled { ShapeFillMode::Filled } else { ShapeFillMode::Outline };
        });
    });

    let c = ctx.clone();
    engine.register_fn("set_antialias", move |on: bool| {
        with_project(&c, |p| p.props.anti_aliased = on);
    });

    let c = ctx.clone();
    engine.register_fn("set_font", move |family: ImmutableString, size: i64| {
        with_project(&c, |p| {
            p.props.font_family = family.to_string();
            p.props.set_font_size(size as f32);
        });
    });

    let c = ctx;
    engine.register_fn("set_font", move |family: ImmutableString, size: f64| {
        with_project(&c, |p| {
            p.props.font_family = family.to_string();
            p.props.set_font_size(size as f32);
        });
    });
}

// ============================================================================
// Pointer gestures and single-shot tools
// ============================================================================

fn register_gesture_api(engine: &mut Engine, ctx: SharedContext) {
    // down/drag_to take ints or floats.
    let c = ctx.clone();
    engine.register_fn("down", move |x: f64, y: f64| {
        with_project(&c, |p| {
            p.pointer_down(x as f32, y as f32);
        });
    });
    let c = ctx.clone();
    engine.register_fn("down", move |x: i64, y: i64| {
        with_project(&c, |p| {
            p.pointer_down(x as f32, y as f32);
        });
    });

    let c = ctx.clone();
    engine.register_fn("drag_to", move |x: f64, y: f64| {
        with_project(&c, |p| {
            p.pointer_move(x as f32, y as f32);
        });
    });
    let c = ctx.clone();
    engine.register_fn("drag_to", move |x: i64, y: i64| {
        with_project(&c, |p| {
            p.pointer_move(x as f32, y as f32);
        });
    });

    let c = ctx.clone();
    engine.register_fn("up", move || {
        with_project(&c, |p| {
            p.pointer_up();
        });
    });

    // line(x0, y0, x1, y1): one press-drag-release with the current tool
    let c = ctx.clone();
    engine.register_fn("line", move |x0: i64, y0: i64, x1: i64, y1: i64| -> bool {
        with_project(&c, |p| {
            let tool = p.tool();
            let points = vec![(x0 as f32, y0 as f32), (x1 as f32, y1 as f32)];
            p.apply_edit(EditOp::Stroke { tool, points })
        })
    });

    let c = ctx.clone();
    engine.register_fn("fill", move |x: i64, y: i64| -> bool {
        with_project(&c, |p| p.apply_edit(EditOp::Fill { x: x as i32, y: y as i32 }))
    });

    let c = ctx;
    engine.register_fn("text", move |x: i64, y: i64, content: ImmutableString| -> bool {
        with_project(&c, |p| {
            p.apply_edit(EditOp::Text { x: x as f32, y: y as f32, text: content.to_string() })
        })
    });
}

fn register_history_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("undo", move || -> bool { with_project(&c, |p| p.undo()) });
    let c = ctx.clone();
    engine.register_fn("redo", move || -> bool { with_project(&c, |p| p.redo()) });
    let c = ctx.clone();
    engine.register_fn("can_undo", move || -> bool { with_project(&c, |p| p.can_undo()) });
    let c = ctx;
    engine.register_fn("can_redo", move || -> bool { with_project(&c, |p| p.can_redo()) });
}

fn register_selection_api(engine: &mut Engine, ctx: SharedContext) {
    // select(x0, y0, x1, y1): drag out a rectangle with the select tool
    let c = ctx.clone();
    engine.register_fn("select", move |x0: i64, y0: i64, x1: i64, y1: i64| -> bool {
        with_project(&c, |p| {
            p.cancel_selection();
            p.set_tool(Tool::Select);
            p.pointer_down(x0 as f32, y0 as f32);
            p.pointer_move(x1 as f32, y1 as f32);
            p.pointer_up();
            p.selection_rect().is_some()
        })
    });

    let c = ctx.clone();
    engine.register_fn("select_all", move || -> bool { with_project(&c, |p| p.select_all()) });
    let c = ctx.clone();
    engine.register_fn("copy", move || -> bool { with_project(&c, |p| p.copy()) });
    let c = ctx.clone();
    engine.register_fn("cut", move || -> bool { with_project(&c, |p| p.cut()) });
    let c = ctx.clone();
    engine.register_fn("paste", move |x: i64, y: i64| -> bool {
        with_project(&c, |p| p.apply_edit(EditOp::Paste { x: x as i32, y: y as i32 }))
    });
    let c = ctx.clone();
    engine.register_fn("delete_selection", move || -> bool { with_project(&c, |p| p.delete_selection()) });
    let c = ctx;
    engine.register_fn("cancel_selection", move || with_project(&c, |p| p.cancel_selection()));
}

// ============================================================================
// Public execution API
// ============================================================================

/// Check a script for syntax errors without running it.
pub fn compile_script(source: &str) -> Result<(), ScriptError> {
    Engine::new()
        .compile(source)
        .map(|_| ())
        .map_err(|e| ScriptError::at(e.to_string(), e.position()))
}

/// Run a script against `project` on the calling thread.  Edits made before
/// a runtime error are kept.  Returns the script's printed output.
pub fn execute_script_sync(source: &str, project: &mut Project) -> Result<Vec<String>, ScriptError> {
    let start = Instant::now();
    let working = std::mem::replace(project, Project::new(0, 0));
    let ctx = Arc::new(Mutex::new(ScriptContext {
        project: working,
        console_output: Vec::new(),
    }));

    let result = {
        let engine = create_engine(ctx.clone());
        let mut scope = Scope::new();
        engine
            .compile(source)
            .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            .and_then(|ast| {
                engine
                    .run_ast_with_scope(&mut scope, &ast)
                    .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            })
    };

    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    std::mem::swap(project, &mut lock.project);
    // Finish a gesture the script left open.
    project.pointer_up();
    let output = std::mem::take(&mut lock.console_output);
    drop(lock);

    match result {
        Ok(()) => {
            crate::log_info!("script: finished in {} ms", start.elapsed().as_millis());
            Ok(output)
        }
        Err(e) => {
            crate::log_warn!("script: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BACKGROUND;
    use image::Rgba;

    fn px(p: &Project, x: u32, y: u32) -> Rgba<u8> {
        *p.canvas.surface.image().get_pixel(x, y)
    }

    #[test]
    fn fill_and_undo_from_script() {
        let mut p = Project::new(20, 20);
        let out = execute_script_sync(
            r##"
                set_color("#ff0000");
                fill(3, 3);
                print(`${width()}x${height()}`);
                undo();
                print(can_redo());
            "##,
            &mut p,
        )
        .unwrap();
        assert_eq!(out, vec!["20x20".to_string(), "true".to_string()]);
        assert_eq!(px(&p, 3, 3), BACKGROUND);
        assert!(p.can_redo());
    }

    #[test]
    fn strokes_shapes_and_pixels() {
        let mut p = Project::new(40, 40);
        let out = execute_script_sync(
            r#"
                set_antialias(false);
                set_color(0, 0, 255);
                set_tool("circle");
                set_filled(true);
                down(10, 10);
                drag_to(15.0, 10.0);
                up();
                let c = get_pixel(10, 10);
                print(c[2]);
                set_tool("brush");
                set_size(3);
                line(0, 30, 39, 30);
            "#,
            &mut p,
        )
        .unwrap();
        assert_eq!(out, vec!["255".to_string()]);
        assert_eq!(px(&p, 20, 30), Rgba([0, 0, 255, 255]));
        assert_eq!(p.history.len(), 3);
    }

    #[test]
    fn selection_delete_from_script() {
        let mut p = Project::new(30, 30);
        execute_script_sync(
            r##"
                set_color("#000");
                fill(0, 0);
                select(5, 5, 10, 10);
                delete_selection();
            "##,
            &mut p,
        )
        .unwrap();
        assert_eq!(px(&p, 7, 7), BACKGROUND);
        assert_eq!(px(&p, 12, 12), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn runtime_errors_keep_earlier_edits() {
        let mut p = Project::new(10, 10);
        let err = execute_script_sync("set_color(\"#00ff00\");\nfill(0, 0);\nset_tool(\"lasso\");", &mut p)
            .unwrap_err();
        assert!(err.message.contains("unknown tool"));
        assert_eq!(px(&p, 5, 5), Rgba([0, 255, 0, 255]));
        assert_eq!(p.width(), 10);
    }

    #[test]
    fn compile_errors_have_positions() {
        let err = compile_script("let x = ;").unwrap_err();
        assert_eq!(err.line, Some(1));
        assert!(err.friendly_message().starts_with("Error on line 1"));

        let err = ScriptError { message: "Variable not found: foo (line 2, position 1)".into(), line: Some(2), column: Some(1) };
        assert!(err.friendly_message().contains("let foo = 0;"));
    }

    #[test]
    fn operation_limit_is_explained() {
        let err = ScriptError { message: "Too many operations (line 1, position 1)".into(), line: Some(1), column: None };
        let msg = err.friendly_message();
        assert!(msg.starts_with("Error on line 1:"));
        assert!(msg.contains("50000000 operations"));
    }

    #[test]
    fn open_gesture_is_finished_after_the_script() {
        let mut p = Project::new(20, 20);
        execute_script_sync("down(1, 1); drag_to(15, 1);", &mut p).unwrap();
        assert!(!p.is_gesture_active());
        assert_eq!(p.history.len(), 2);
    }
}
