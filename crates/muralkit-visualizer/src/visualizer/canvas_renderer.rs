//! Canvas drawing primitives for the plan preview and live view.
//!
//! Everything is drawn through [`RenderTarget`], so the same code paints an
//! in-memory [`DisplayList`](super::display_list::DisplayList) for SVG export
//! and a real canvas in a UI shell.

use std::time::Instant;

use muralkit_core::CancelToken;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::viewport::{Point, ViewportTransform};
use crate::commands::PathModel;

/// Straight-alpha RGBA color, channels 0-255 and alpha 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// CSS `rgba(...)` notation
    pub fn to_css(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }
}

/// Colors used by the plan views.
pub mod palette {
    use super::Color;

    pub const BACKGROUND: Color = Color::rgba(8, 10, 20, 0.70);
    /// Grid stroke, already multiplied by the grid layer alpha (0.22 * 0.18)
    pub const GRID: Color = Color::rgba(255, 255, 255, 0.0396);
    pub const PLAN_PEN_DOWN: Color = Color::rgba(255, 255, 255, 0.14);
    pub const PLAN_TRAVEL: Color = Color::rgba(120, 170, 255, 0.08);
    pub const DRAWN_PEN_DOWN: Color = Color::rgba(255, 241, 0, 0.95);
    pub const DRAWN_TRAVEL: Color = Color::rgba(255, 255, 255, 0.10);
    pub const CROSSHAIR: Color = Color::rgba(255, 255, 255, 0.55);
    pub const CROSSHAIR_DOT: Color = Color::rgba(255, 255, 255, 0.85);
    pub const START_MARKER: Color = Color::rgba(0, 255, 255, 0.85);
    pub const PAUSE_DIM: Color = Color::rgba(0, 0, 0, 0.35);
    pub const PAUSE_TEXT: Color = Color::rgba(255, 255, 255, 0.90);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
}

impl Stroke {
    pub const fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

/// How a circle is painted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CircleStyle {
    Fill(Color),
    Outline(Stroke),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Start,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub color: Color,
    pub size_px: f64,
    pub align: TextAlign,
}

/// A 2D surface the plan views can be drawn on.
///
/// Lines are drawn with round caps and joins.
pub trait RenderTarget {
    /// Surface size in pixels, `(width, height)`
    fn size(&self) -> (f64, f64);

    /// Erase everything drawn so far
    fn clear(&mut self);

    fn fill_rect(&mut self, origin: Point, width: f64, height: f64, color: Color);

    fn line(&mut self, from: Point, to: Point, stroke: Stroke);

    fn circle(&mut self, center: Point, radius: f64, style: CircleStyle);

    fn text(&mut self, text: &str, at: Point, style: TextStyle);
}

/// Half-length of the crosshair arms, in pixels
const CROSSHAIR_ARM_PX: f64 = 18.0;
const CROSSHAIR_DOT_RADIUS_PX: f64 = 3.0;
const START_MARKER_RADIUS_PX: f64 = 7.0;
const LABEL_SIZE_PX: f64 = 12.0;
const BANNER_SIZE_PX: f64 = 20.0;
const MIN_GRID_STEP_PX: f64 = 40.0;

/// Grid spacing for a canvas: `max(40, floor(min(w, h) / 12))`
pub fn grid_step(width: f64, height: f64) -> f64 {
    MIN_GRID_STEP_PX.max((width.min(height) / 12.0).floor())
}

/// Clear the target, fill it with the backdrop color and draw the grid.
pub fn draw_background<T: RenderTarget + ?Sized>(target: &mut T) {
    let (w, h) = target.size();
    target.clear();
    target.fill_rect(Point::new(0.0, 0.0), w, h, palette::BACKGROUND);

    let step = grid_step(w, h);
    let stroke = Stroke::new(palette::GRID, 1.0);

    let mut x = 0.0;
    while x < w {
        target.line(Point::new(x, 0.0), Point::new(x, h), stroke);
        x += step;
    }
    let mut y = 0.0;
    while y < h {
        target.line(Point::new(0.0, y), Point::new(w, y), stroke);
        y += step;
    }
}

fn plan_stroke(pen_down: bool) -> Stroke {
    if pen_down {
        Stroke::new(palette::PLAN_PEN_DOWN, 2.0)
    } else {
        Stroke::new(palette::PLAN_TRAVEL, 1.0)
    }
}

/// Stroke for progress drawn on top of the plan
pub fn drawn_stroke(pen_down: bool) -> Stroke {
    if pen_down {
        Stroke::new(palette::DRAWN_PEN_DOWN, 2.6)
    } else {
        Stroke::new(palette::DRAWN_TRAVEL, 1.2)
    }
}

/// Draw every segment of the plan in its faint planned color.
///
/// Yields to the runtime every `segments_per_tick` segments. Returns `false`
/// if the token was cancelled before the plan was complete.
pub async fn draw_planned_path<T: RenderTarget + ?Sized>(
    target: &mut T,
    model: &PathModel,
    transform: &ViewportTransform,
    segments_per_tick: usize,
    cancel: &CancelToken,
) -> bool {
    let started = Instant::now();
    let segments_per_tick = segments_per_tick.max(1);

    for (i, seg) in model.segments().iter().enumerate() {
        target.line(
            transform.mm_to_px(seg.start),
            transform.mm_to_px(seg.end),
            plan_stroke(seg.pen_down),
        );

        if i % segments_per_tick == 0 {
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                debug!("Planned path drawing cancelled at segment {}", i);
                return false;
            }
        }
    }

    debug!(
        "Planned path: {} segments in {:.1}ms",
        model.segment_count(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    true
}

/// Draw every segment of the plan without yielding.
pub fn draw_planned_path_sync<T: RenderTarget + ?Sized>(
    target: &mut T,
    model: &PathModel,
    transform: &ViewportTransform,
) {
    for seg in model.segments() {
        target.line(
            transform.mm_to_px(seg.start),
            transform.mm_to_px(seg.end),
            plan_stroke(seg.pen_down),
        );
    }
}

/// Clear the overlay and draw a crosshair at `at` with an optional label.
pub fn draw_crosshair<T: RenderTarget + ?Sized>(target: &mut T, at: Point, label: Option<&str>) {
    let (w, _) = target.size();
    target.clear();

    let stroke = Stroke::new(palette::CROSSHAIR, 1.0);
    target.line(
        Point::new(at.x - CROSSHAIR_ARM_PX, at.y),
        Point::new(at.x + CROSSHAIR_ARM_PX, at.y),
        stroke,
    );
    target.line(
        Point::new(at.x, at.y - CROSSHAIR_ARM_PX),
        Point::new(at.x, at.y + CROSSHAIR_ARM_PX),
        stroke,
    );
    target.circle(
        at,
        CROSSHAIR_DOT_RADIUS_PX,
        CircleStyle::Fill(palette::CROSSHAIR_DOT),
    );

    if let Some(label) = label.filter(|l| !l.is_empty()) {
        // Kept inside the canvas near the right and top edges
        let pos = Point::new((w - 8.0).min(at.x + 10.0), 14.0_f64.max(at.y - 10.0));
        target.text(
            label,
            pos,
            TextStyle {
                color: palette::CROSSHAIR_DOT,
                size_px: LABEL_SIZE_PX,
                align: TextAlign::Start,
            },
        );
    }
}

/// Cyan ring marking where the job or preview starts.
pub fn draw_start_marker<T: RenderTarget + ?Sized>(target: &mut T, at: Point) {
    target.circle(
        at,
        START_MARKER_RADIUS_PX,
        CircleStyle::Outline(Stroke::new(palette::START_MARKER, 2.0)),
    );
}

/// Dim the overlay and print a centered "PAUSE".
pub fn draw_paused_banner<T: RenderTarget + ?Sized>(target: &mut T) {
    let (w, h) = target.size();
    target.fill_rect(Point::new(0.0, 0.0), w, h, palette::PAUSE_DIM);
    target.text(
        "PAUSE",
        Point::new(w / 2.0, h / 2.0),
        TextStyle {
            color: palette::PAUSE_TEXT,
            size_px: BANNER_SIZE_PX,
            align: TextAlign::Center,
        },
    );
}
