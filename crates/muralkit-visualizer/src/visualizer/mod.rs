//! 2D plan rendering
//!
//! This module provides:
//! - The millimeter to pixel viewport transform
//! - Drawing primitives over an abstract render target
//! - A recording display list with SVG export

pub mod canvas_renderer;
pub mod display_list;
pub mod viewport;

pub use canvas_renderer::{
    draw_background, draw_crosshair, draw_paused_banner, draw_planned_path,
    draw_planned_path_sync, draw_start_marker, drawn_stroke, grid_step, palette, CircleStyle,
    Color, RenderTarget, Stroke, TextAlign, TextStyle,
};
pub use display_list::{svg_document, DisplayList, DrawOp};
pub use viewport::{Bounds, Point, ViewportTransform};
