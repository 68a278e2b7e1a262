//! Arc-length indexed path model.

use serde::Serialize;

use crate::visualizer::viewport::{Bounds, Point};

/// One straight move of the plan.
///
/// Occupies the half-open interval `[cum_start, cum_end)` of cumulative
/// distance along the whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
    /// Euclidean length in millimeters, always positive
    pub len: f64,
    pub cum_start: f64,
    pub cum_end: f64,
    /// Pen down (drawing) or up (travel)
    pub pen_down: bool,
    /// Source line index after the two header lines
    pub line_index: usize,
}

impl Segment {
    /// Position at fraction `t` along the segment, clamped to [0, 1].
    pub fn point_at(&self, t: f64) -> Point {
        self.start.lerp(self.end, t.clamp(0.0, 1.0))
    }
}

/// Parsed command stream.
///
/// Built once per stream by the parser and shared read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PathModel {
    segments: Vec<Segment>,
    header_total: f64,
    total_distance: f64,
    height: f64,
    line_count: usize,
    bounds: Bounds,
}

impl PathModel {
    pub(crate) fn new(
        segments: Vec<Segment>,
        header_total: f64,
        height: f64,
        line_count: usize,
        bounds: Bounds,
    ) -> Self {
        let computed = segments.last().map(|s| s.cum_end).unwrap_or(0.0);
        let total_distance = if header_total > 0.0 {
            header_total
        } else {
            computed
        };

        Self {
            segments,
            header_total,
            total_distance,
            height,
            line_count,
            bounds,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total declared by the `d` header; 0 when absent or unparsable
    pub fn header_total(&self) -> f64 {
        self.header_total
    }

    /// Authoritative plan length: the header total when positive, otherwise
    /// the computed sum of segment lengths
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Sum of all segment lengths
    pub fn computed_distance(&self) -> f64 {
        self.segments.last().map(|s| s.cum_end).unwrap_or(0.0)
    }

    /// Canvas height from the `h` header
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Source lines after the header
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Bounding box of every visited point, home position included
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Pen-down length of the plan
    pub fn drawn_distance(&self) -> f64 {
        self.segments
            .iter()
            .filter(|s| s.pen_down)
            .map(|s| s.len)
            .sum()
    }

    /// One-line summary in the shape `Lines: N, Moves: M, Total: X.XXm`
    pub fn summary(&self) -> String {
        format!(
            "Lines: {}, Moves: {}, Total: {:.2}m",
            self.line_count,
            self.segments.len(),
            self.total_distance / 1000.0
        )
    }
}
