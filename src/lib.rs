//! RetroPaint: a Paint-style raster editor core.
//!
//! One flat RGBA surface, the tools that paint on it, rectangular
//! selections, and a bounded snapshot history for undo/redo.  The
//! [`project::Project`] type ties them together behind a pointer/keyboard
//! interface; the binary drives it headlessly through Rhai scripts.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod input;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{CanvasError, CanvasState, PixelRect, Snapshot, Surface};
pub use components::history::HistoryManager;
pub use project::{EditOp, PointerResponse, Project};
