//! Command stream parser.
//!
//! Stream format, one instruction per line:
//!
//! ```text
//! d<total-distance-mm>
//! h<canvas-height-mm>
//! p1            pen down (p0 / bare p: pen up)
//! <x> <y>       absolute move
//! ```
//!
//! Only the two header lines are strict. Anything unrecognized after them
//! advances the line counter and is otherwise ignored.

use std::time::Instant;

use muralkit_core::constants::MIN_SEGMENT_LEN_MM;
use muralkit_core::{CancelToken, ParseError};
use tracing::{debug, trace};

use super::model::{PathModel, Segment};
use crate::visualizer::viewport::{Bounds, Point};

/// Parse a command stream, yielding to the runtime every `lines_per_tick`
/// source lines.
///
/// The cancel token is checked at each yield point and once more before the
/// model is returned; a cancelled parse produces nothing.
pub async fn parse_commands(
    text: &str,
    home: Point,
    lines_per_tick: usize,
    cancel: &CancelToken,
) -> Result<PathModel, ParseError> {
    let started = Instant::now();
    let lines = split_lines(text);
    let (header_total, height) = parse_header(&lines)?;
    let lines_per_tick = lines_per_tick.max(1);

    let mut interpreter = LineInterpreter::new(home);
    for (i, line) in lines.iter().enumerate().skip(2) {
        interpreter.feed(line);

        if i % lines_per_tick == 0 {
            if cancel.is_cancelled() {
                debug!("Parse cancelled at line {}", i);
                return Err(ParseError::Cancelled { lines_read: i });
            }
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                debug!("Parse cancelled at line {}", i);
                return Err(ParseError::Cancelled { lines_read: i });
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(ParseError::Cancelled {
            lines_read: lines.len(),
        });
    }

    let model = interpreter.finish(header_total, height);
    log_parse_stats(&model, text.len(), started);
    Ok(model)
}

/// Parse a command stream in one go.
pub fn parse_commands_sync(text: &str, home: Point) -> Result<PathModel, ParseError> {
    let started = Instant::now();
    let lines = split_lines(text);
    let (header_total, height) = parse_header(&lines)?;

    let mut interpreter = LineInterpreter::new(home);
    for line in &lines[2..] {
        interpreter.feed(line);
    }

    let model = interpreter.finish(header_total, height);
    log_parse_stats(&model, text.len(), started);
    Ok(model)
}

fn log_parse_stats(model: &PathModel, bytes: usize, started: Instant) {
    debug!(
        "Parse complete: {} bytes, {} lines, {} segments, total={:.2}mm (header {:.2}mm, computed {:.2}mm) in {:.1}ms",
        bytes,
        model.line_count(),
        model.segment_count(),
        model.total_distance(),
        model.header_total(),
        model.computed_distance(),
        started.elapsed().as_secs_f64() * 1000.0
    );
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

fn parse_header(lines: &[&str]) -> Result<(f64, f64), ParseError> {
    if lines.len() < 2 {
        return Err(ParseError::TooShort { lines: lines.len() });
    }

    let header_total = lines[0]
        .strip_prefix('d')
        .map(lenient_float)
        .ok_or_else(|| ParseError::MissingDistanceHeader {
            found: lines[0].to_string(),
        })?;
    let height = lines[1]
        .strip_prefix('h')
        .map(lenient_float)
        .ok_or_else(|| ParseError::MissingHeightHeader {
            found: lines[1].to_string(),
        })?;

    Ok((header_total, height))
}

/// Parse the longest numeric prefix of `s`, falling back to 0.
///
/// `"12.5mm"` reads as 12.5 and `"abc"` as 0; the stream is produced by
/// another tool and trailing noise must not discard a coordinate.
pub(crate) fn lenient_float(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if has_digits || frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        }
    }
    if !has_digits {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Per-line state machine shared by the async and sync parsers.
struct LineInterpreter {
    pen_down: bool,
    cursor: Point,
    bounds: Bounds,
    segments: Vec<Segment>,
    cum: f64,
    line_index: usize,
    skipped_zero_length: usize,
}

impl LineInterpreter {
    fn new(home: Point) -> Self {
        let home = Point::new(finite_or_zero(home.x), finite_or_zero(home.y));
        Self {
            pen_down: false,
            cursor: home,
            bounds: Bounds::around(home),
            segments: Vec::new(),
            cum: 0.0,
            line_index: 0,
            skipped_zero_length: 0,
        }
    }

    fn feed(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix('p') {
            self.pen_down = rest.starts_with('1');
        } else if let Some((x, y)) = line.split_once(' ') {
            self.move_to(Point::new(lenient_float(x), lenient_float(y)));
        } else {
            trace!("Line {}: ignored '{}'", self.line_index, line);
        }
        self.line_index += 1;
    }

    fn move_to(&mut self, target: Point) {
        let len = self.cursor.distance_to(target);

        if len > MIN_SEGMENT_LEN_MM {
            let cum_start = self.cum;
            self.cum += len;
            self.segments.push(Segment {
                start: self.cursor,
                end: target,
                len,
                cum_start,
                cum_end: self.cum,
                pen_down: self.pen_down,
                line_index: self.line_index,
            });
        } else {
            self.skipped_zero_length += 1;
        }

        self.cursor = target;
        self.bounds.update(target);
    }

    fn finish(self, header_total: f64, height: f64) -> PathModel {
        if self.skipped_zero_length > 0 {
            debug!("Skipped {} zero-length moves", self.skipped_zero_length);
        }
        PathModel::new(
            self.segments,
            header_total,
            height,
            self.line_index,
            self.bounds,
        )
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "d40\nh100\np1\n10 0\n10 10\n0 10\n0 0\n";

    #[test]
    fn test_parse_square() {
        let model = parse_commands_sync(SQUARE, Point::default()).unwrap();
        assert_eq!(model.segment_count(), 4);
        assert_eq!(model.line_count(), 5);
        assert_eq!(model.total_distance(), 40.0);
        assert_eq!(model.height(), 100.0);
        assert!(model.segments().iter().all(|s| s.pen_down));
        assert_eq!(model.segments()[0].line_index, 1);
        assert_eq!(model.segments()[3].cum_end, 40.0);
    }

    #[test]
    fn test_header_errors() {
        assert_eq!(
            parse_commands_sync("d10\n", Point::default()).unwrap_err(),
            ParseError::TooShort { lines: 1 }
        );
        assert_eq!(
            parse_commands_sync("\n\n  \n", Point::default()).unwrap_err(),
            ParseError::TooShort { lines: 0 }
        );
        assert!(matches!(
            parse_commands_sync("x10\nh5\n", Point::default()),
            Err(ParseError::MissingDistanceHeader { .. })
        ));
        assert!(matches!(
            parse_commands_sync("d10\np1\n", Point::default()),
            Err(ParseError::MissingHeightHeader { .. })
        ));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let model =
            parse_commands_sync("d0\r\nh50\r\n\r\np1\r\n3 4\r\n\r\n", Point::default()).unwrap();
        assert_eq!(model.segment_count(), 1);
        assert_eq!(model.total_distance(), 5.0);
    }

    #[test]
    fn test_pen_lines() {
        let model = parse_commands_sync("d0\nh0\np1\n1 0\np0\n2 0\np\n3 0\np1x\n4 0\n", Point::default())
            .unwrap();
        let pens: Vec<bool> = model.segments().iter().map(|s| s.pen_down).collect();
        assert_eq!(pens, vec![true, false, false, true]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let model = parse_commands_sync("d0\nh0\nhello\n5 0\nabc def\n", Point::default()).unwrap();
        // "abc def" moves to (0, 0)
        assert_eq!(model.segment_count(), 2);
        assert_eq!(model.line_count(), 3);
        assert_eq!(model.segments()[0].line_index, 1);
        assert_eq!(model.segments()[1].end, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_home_position_in_bounds() {
        let model = parse_commands_sync("d0\nh0\n10 10\n", Point::new(50.0, -5.0)).unwrap();
        let bounds = model.bounds();
        assert_eq!(bounds.min_x, 10.0);
        assert_eq!(bounds.max_x, 50.0);
        assert_eq!(bounds.min_y, -5.0);
        assert_eq!(bounds.max_y, 10.0);
        assert_eq!(model.segments()[0].start, Point::new(50.0, -5.0));
    }

    #[test]
    fn test_lenient_float() {
        assert_eq!(lenient_float("12.5"), 12.5);
        assert_eq!(lenient_float(" -3"), -3.0);
        assert_eq!(lenient_float("12.5mm"), 12.5);
        assert_eq!(lenient_float(".5"), 0.5);
        assert_eq!(lenient_float("1e3x"), 1000.0);
        assert_eq!(lenient_float("1e"), 1.0);
        assert_eq!(lenient_float("abc"), 0.0);
        assert_eq!(lenient_float(""), 0.0);
        assert_eq!(lenient_float("-"), 0.0);
        assert_eq!(lenient_float("1e999"), 0.0);
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let mut text = String::from("d0\nh0\np1\n");
        for i in 0..1000 {
            text.push_str(&format!("{} {}\n", i % 37, i % 11));
        }
        let token = CancelToken::new();
        let a = parse_commands(&text, Point::default(), 50, &token)
            .await
            .unwrap();
        let b = parse_commands_sync(&text, Point::default()).unwrap();
        assert_eq!(a.segments(), b.segments());
        assert_eq!(a.line_count(), b.line_count());
    }

    #[tokio::test]
    async fn test_cancelled_parse_returns_error() {
        let mut text = String::from("d0\nh0\n");
        for i in 0..500 {
            text.push_str(&format!("{} 0\n", i));
        }
        let token = CancelToken::new();
        token.cancel();
        let err = parse_commands(&text, Point::default(), 100, &token)
            .await
            .unwrap_err();
        assert_eq!(err, ParseError::Cancelled { lines_read: 100 });
    }
}
