//! Shared viewport helpers for 2D plan rendering.

use muralkit_core::constants::{CANVAS_PADDING_PX, MIN_FIT_EXTENT_MM};
use serde::{Deserialize, Serialize};

/// A point in plan millimeters or canvas pixels, depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation towards `other`, `t` in [0, 1].
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Axis-aligned bounding box accumulated while parsing a plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Degenerate box containing a single point.
    pub fn around(point: Point) -> Self {
        Self {
            min_x: point.x,
            max_x: point.x,
            min_y: point.y,
            max_y: point.y,
        }
    }

    pub fn update(&mut self, point: Point) {
        self.min_x = self.min_x.min(point.x);
        self.max_x = self.max_x.max(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_y = self.max_y.max(point.y);
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::around(Point::default())
    }
}

/// Maps plan millimeters onto canvas pixels.
///
/// Left/top aligned with a fixed padding and no axis flip: the plotter's
/// Y axis already grows downwards like the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl ViewportTransform {
    /// Fit `bounds` into a `canvas_w` x `canvas_h` canvas.
    ///
    /// Extents below one millimeter are floored so a single point or a
    /// straight horizontal line still produces a finite scale.
    pub fn fit(bounds: &Bounds, canvas_w: f64, canvas_h: f64, padding: f64) -> Self {
        let w = bounds.width().max(MIN_FIT_EXTENT_MM);
        let h = bounds.height().max(MIN_FIT_EXTENT_MM);

        let scale = ((canvas_w - 2.0 * padding) / w).min((canvas_h - 2.0 * padding) / h);

        Self {
            scale,
            offset_x: padding - bounds.min_x * scale,
            offset_y: padding - bounds.min_y * scale,
        }
    }

    /// Fit with the default canvas padding.
    pub fn fit_default(bounds: &Bounds, canvas_w: f64, canvas_h: f64) -> Self {
        Self::fit(bounds, canvas_w, canvas_h, CANVAS_PADDING_PX)
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    #[inline]
    pub fn mm_to_px(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale + self.offset_x,
            point.y * self.scale + self.offset_y,
        )
    }
}
