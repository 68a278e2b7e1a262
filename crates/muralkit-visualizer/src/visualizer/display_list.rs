//! In-memory render target.
//!
//! Records draw calls so a layer can be snapshotted (`Clone`), replayed, or
//! exported as an SVG document.

use std::fmt::Write;

use super::canvas_renderer::{CircleStyle, Color, RenderTarget, Stroke, TextAlign, TextStyle};
use super::viewport::Point;

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect {
        origin: Point,
        width: f64,
        height: f64,
        color: Color,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Circle {
        center: Point,
        radius: f64,
        style: CircleStyle,
    },
    Text {
        text: String,
        at: Point,
        style: TextStyle,
    },
}

/// A recorded layer of draw calls.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList {
    width: f64,
    height: f64,
    ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of recorded line segments
    pub fn line_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Line { .. }))
            .count()
    }

    /// Replay every recorded call onto another target.
    pub fn replay_onto<T: RenderTarget + ?Sized>(&self, target: &mut T) {
        for op in &self.ops {
            match op {
                DrawOp::FillRect {
                    origin,
                    width,
                    height,
                    color,
                } => target.fill_rect(*origin, *width, *height, *color),
                DrawOp::Line { from, to, stroke } => target.line(*from, *to, *stroke),
                DrawOp::Circle {
                    center,
                    radius,
                    style,
                } => target.circle(*center, *radius, *style),
                DrawOp::Text { text, at, style } => target.text(text, *at, *style),
            }
        }
    }

    /// Append this layer's calls as SVG elements.
    pub fn write_svg_elements(&self, out: &mut String) {
        for op in &self.ops {
            // Writing into a String cannot fail
            let _ = match op {
                DrawOp::FillRect {
                    origin,
                    width,
                    height,
                    color,
                } => writeln!(
                    out,
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
                    origin.x,
                    origin.y,
                    width,
                    height,
                    color.to_css()
                ),
                DrawOp::Line { from, to, stroke } => writeln!(
                    out,
                    r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="{}" stroke-linecap="round"/>"#,
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                    stroke.color.to_css(),
                    stroke.width
                ),
                DrawOp::Circle {
                    center,
                    radius,
                    style: CircleStyle::Fill(color),
                } => writeln!(
                    out,
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}"/>"#,
                    center.x,
                    center.y,
                    radius,
                    color.to_css()
                ),
                DrawOp::Circle {
                    center,
                    radius,
                    style: CircleStyle::Outline(stroke),
                } => writeln!(
                    out,
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
                    center.x,
                    center.y,
                    radius,
                    stroke.color.to_css(),
                    stroke.width
                ),
                DrawOp::Text { text, at, style } => writeln!(
                    out,
                    r#"<text x="{:.2}" y="{:.2}" font-family="system-ui, sans-serif" font-size="{}" fill="{}" text-anchor="{}">{}</text>"#,
                    at.x,
                    at.y,
                    style.size_px,
                    style.color.to_css(),
                    match style.align {
                        TextAlign::Start => "start",
                        TextAlign::Center => "middle",
                    },
                    escape_xml(text)
                ),
            };
        }
    }

    /// Standalone SVG document of this layer.
    pub fn to_svg(&self) -> String {
        svg_document(self.width, self.height, &[self])
    }
}

impl RenderTarget for DisplayList {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.ops.clear();
    }

    fn fill_rect(&mut self, origin: Point, width: f64, height: f64, color: Color) {
        self.ops.push(DrawOp::FillRect {
            origin,
            width,
            height,
            color,
        });
    }

    fn line(&mut self, from: Point, to: Point, stroke: Stroke) {
        self.ops.push(DrawOp::Line { from, to, stroke });
    }

    fn circle(&mut self, center: Point, radius: f64, style: CircleStyle) {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            style,
        });
    }

    fn text(&mut self, text: &str, at: Point, style: TextStyle) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            at,
            style,
        });
    }
}

/// Compose layers bottom-to-top into one SVG document.
pub fn svg_document(width: f64, height: f64, layers: &[&DisplayList]) -> String {
    let capacity = layers.iter().map(|l| l.len() * 120).sum::<usize>() + 256;
    let mut out = String::with_capacity(capacity);

    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    for (i, layer) in layers.iter().enumerate() {
        let _ = writeln!(out, r#"<g id="layer-{}">"#, i);
        layer.write_svg_elements(&mut out);
        out.push_str("</g>\n");
    }
    out.push_str("</svg>\n");
    out
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::canvas_renderer::palette;

    #[test]
    fn test_records_and_clears() {
        let mut list = DisplayList::new(10.0, 10.0);
        list.line(
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Stroke::new(palette::GRID, 1.0),
        );
        list.circle(
            Point::new(1.0, 1.0),
            3.0,
            CircleStyle::Fill(palette::CROSSHAIR_DOT),
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list.line_count(), 1);

        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut base = DisplayList::new(10.0, 10.0);
        base.fill_rect(Point::default(), 10.0, 10.0, palette::BACKGROUND);
        let snapshot = base.clone();

        base.line(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Stroke::new(palette::DRAWN_PEN_DOWN, 2.6),
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_replay() {
        let mut src = DisplayList::new(10.0, 10.0);
        src.text(
            "a",
            Point::new(1.0, 2.0),
            TextStyle {
                color: palette::PAUSE_TEXT,
                size_px: 12.0,
                align: TextAlign::Start,
            },
        );
        let mut dst = DisplayList::new(10.0, 10.0);
        src.replay_onto(&mut dst);
        assert_eq!(src.ops(), dst.ops());
    }

    #[test]
    fn test_svg_export() {
        let mut list = DisplayList::new(100.0, 50.0);
        list.line(
            Point::new(0.0, 0.0),
            Point::new(10.0, 20.0),
            Stroke::new(palette::DRAWN_PEN_DOWN, 2.6),
        );
        list.text(
            "<50%>",
            Point::new(1.0, 1.0),
            TextStyle {
                color: palette::PAUSE_TEXT,
                size_px: 12.0,
                align: TextAlign::Center,
            },
        );

        let svg = list.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 0 100 50""#));
        assert!(svg.contains(r#"x2="10.00" y2="20.00""#));
        assert!(svg.contains("rgba(255,241,0,0.95)"));
        assert!(svg.contains("&lt;50%&gt;"));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}
