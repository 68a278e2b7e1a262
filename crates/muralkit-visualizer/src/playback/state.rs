//! Playback cursor and the shared advance algorithm.

use muralkit_core::constants::{MIN_SEGMENT_LEN_MM, SEGMENT_COMPLETE_FRACTION};
use serde::Serialize;
use tracing::trace;

use crate::commands::{find_segment_index_by_distance, PathModel};
use crate::visualizer::canvas_renderer::{drawn_stroke, RenderTarget};
use crate::visualizer::viewport::{Point, ViewportTransform};

/// Cursor over a [`PathModel`].
///
/// `dist` never decreases while the cursor is advanced; only a reset moves
/// it backwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlaybackState {
    pub segment_index: usize,
    /// Progress within the current segment, in [0, 1)
    pub fraction: f64,
    /// Cumulative distance traveled, in millimeters
    pub dist: f64,
}

impl PlaybackState {
    /// Cursor at the start of the segment containing `dist`.
    pub fn at_distance(model: &PathModel, dist: f64) -> Self {
        Self {
            segment_index: find_segment_index_by_distance(model, dist),
            fraction: 0.0,
            dist,
        }
    }

    /// Whether every segment has been traversed
    pub fn is_finished(&self, model: &PathModel) -> bool {
        self.segment_index >= model.segment_count()
    }
}

/// Redraw the stretch of plan between `from` and `to` millimeters.
///
/// Used to re-render covered progress onto a fresh layer, e.g. after the
/// viewport changed. Draws nothing when `to <= from`.
pub fn replay<T: RenderTarget + ?Sized>(
    target: &mut T,
    model: &PathModel,
    transform: &ViewportTransform,
    from: f64,
    to: f64,
) {
    let mut scratch = PlaybackState::at_distance(model, from);
    advance(target, model, transform, to - from, &mut scratch);
}

/// Consume `delta` millimeters of arc length, drawing each traversed piece.
///
/// Walks forward across segments from the state's position, styling each
/// piece by pen state. A non-positive (or NaN) delta leaves the state
/// untouched and draws nothing.
pub fn advance<T: RenderTarget + ?Sized>(
    target: &mut T,
    model: &PathModel,
    transform: &ViewportTransform,
    delta: f64,
    state: &mut PlaybackState,
) {
    let segments = model.segments();
    let mut remaining = delta;
    let mut drawn = 0usize;

    while remaining > 0.0 && state.segment_index < segments.len() {
        let seg = &segments[state.segment_index];
        if seg.len <= MIN_SEGMENT_LEN_MM {
            state.segment_index += 1;
            state.fraction = 0.0;
            continue;
        }

        let seg_remaining = seg.len * (1.0 - state.fraction);
        let step = remaining.min(seg_remaining);
        let t0 = state.fraction;
        let t1 = t0 + step / seg.len;

        target.line(
            transform.mm_to_px(seg.start.lerp(seg.end, t0)),
            transform.mm_to_px(seg.start.lerp(seg.end, t1)),
            drawn_stroke(seg.pen_down),
        );
        drawn += 1;

        state.fraction = t1;
        remaining -= step;
        state.dist += step;

        if state.fraction >= SEGMENT_COMPLETE_FRACTION {
            state.segment_index += 1;
            state.fraction = 0.0;
        }
    }

    if drawn > 0 {
        trace!(
            "advance {:.3}mm: {} pieces, now segment {} at {:.3}mm",
            delta,
            drawn,
            state.segment_index,
            state.dist
        );
    }
}

/// Interpolated plan position of a cursor, in millimeters.
///
/// The index is clamped to the last segment, so a finished cursor reports
/// the segment's start. An empty plan reports the origin.
pub fn current_position(model: &PathModel, state: &PlaybackState) -> Point {
    let segments = model.segments();
    if segments.is_empty() {
        return Point::default();
    }
    let index = state.segment_index.min(segments.len() - 1);
    segments[index].point_at(state.fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_commands_sync;
    use crate::visualizer::display_list::DisplayList;

    fn setup() -> (PathModel, ViewportTransform, DisplayList) {
        let model = parse_commands_sync("d0\nh0\np1\n10 0\np0\n10 10\n", Point::default()).unwrap();
        let transform = ViewportTransform::fit_default(model.bounds(), 100.0, 100.0);
        (model, transform, DisplayList::new(100.0, 100.0))
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let (model, tr, mut list) = setup();
        let mut state = PlaybackState::at_distance(&model, 0.0);
        let before = state;

        advance(&mut list, &model, &tr, 0.0, &mut state);
        advance(&mut list, &model, &tr, -4.0, &mut state);
        advance(&mut list, &model, &tr, f64::NAN, &mut state);

        assert_eq!(state, before);
        assert!(list.is_empty());
    }

    #[test]
    fn test_partial_advance() {
        let (model, tr, mut list) = setup();
        let mut state = PlaybackState::at_distance(&model, 0.0);

        advance(&mut list, &model, &tr, 2.5, &mut state);
        assert_eq!(state.segment_index, 0);
        assert_eq!(state.fraction, 0.25);
        assert_eq!(state.dist, 2.5);
        assert_eq!(list.line_count(), 1);
        assert_eq!(current_position(&model, &state), Point::new(2.5, 0.0));
    }

    #[test]
    fn test_advance_crosses_segments() {
        let (model, tr, mut list) = setup();
        let mut state = PlaybackState::at_distance(&model, 0.0);

        advance(&mut list, &model, &tr, 15.0, &mut state);
        assert_eq!(state.segment_index, 1);
        assert!((state.fraction - 0.5).abs() < 1e-12);
        assert_eq!(state.dist, 15.0);
        assert_eq!(list.line_count(), 2);
    }

    #[test]
    fn test_advance_stops_at_end() {
        let (model, tr, mut list) = setup();
        let mut state = PlaybackState::at_distance(&model, 0.0);

        advance(&mut list, &model, &tr, 1000.0, &mut state);
        assert!(state.is_finished(&model));
        assert_eq!(state.dist, 20.0);
        assert_eq!(current_position(&model, &state), Point::new(10.0, 0.0));
    }

    #[test]
    fn test_split_advance_draws_same_distance() {
        let (model, tr, mut once) = setup();
        let mut a = PlaybackState::at_distance(&model, 0.0);
        advance(&mut once, &model, &tr, 12.0, &mut a);

        let mut steps = DisplayList::new(100.0, 100.0);
        let mut b = PlaybackState::at_distance(&model, 0.0);
        for _ in 0..4 {
            advance(&mut steps, &model, &tr, 3.0, &mut b);
        }

        assert_eq!(a.segment_index, b.segment_index);
        assert!((a.dist - b.dist).abs() < 1e-9);
    }

    #[test]
    fn test_at_distance_uses_segment_lookup() {
        let (model, _, _) = setup();
        let state = PlaybackState::at_distance(&model, 10.0);
        assert_eq!(state.segment_index, 1);
        assert_eq!(state.fraction, 0.0);
        assert_eq!(state.dist, 10.0);
    }

    #[test]
    fn test_position_on_empty_model() {
        let model = parse_commands_sync("d0\nh0\n", Point::default()).unwrap();
        assert_eq!(
            current_position(&model, &PlaybackState::default()),
            Point::default()
        );
    }
}
