pub mod brush;
pub mod clipboard;
pub mod fill;
pub mod filters;
pub mod scripting;
pub mod selection;
pub mod shapes;
pub mod text;
