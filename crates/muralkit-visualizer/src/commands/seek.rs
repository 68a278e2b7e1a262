//! Percent and distance lookups over a [`PathModel`].
//!
//! Segments are sorted by `cum_end` by construction, so both lookups are a
//! binary search for the first segment whose interval `[cum_start, cum_end)`
//! contains the target.

use serde::{Deserialize, Serialize};

use super::model::PathModel;

/// Where a job (or the preview) starts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Source line to resume from (after the header)
    pub start_line: usize,
    /// Cumulative distance of the segment start, in millimeters
    pub start_dist: f64,
    /// Requested percentage after clamping (100 when past the last segment)
    pub percent: f64,
}

/// Resume point for a percentage of the plan's total distance.
pub fn find_start_by_percent(model: &PathModel, percent: f64) -> ResumePoint {
    let percent = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    };

    let segments = model.segments();
    let Some(last) = segments.last() else {
        return ResumePoint::default();
    };

    let target = percent / 100.0 * model.total_distance();
    let index = segments.partition_point(|s| s.cum_end <= target);

    match segments.get(index) {
        Some(seg) => ResumePoint {
            start_line: seg.line_index,
            start_dist: seg.cum_start,
            percent,
        },
        None => ResumePoint {
            start_line: last.line_index,
            start_dist: last.cum_start,
            percent: 100.0,
        },
    }
}

/// Index of the segment containing `distance`.
///
/// The distance is clamped to `[0, total_distance]`; past the last segment
/// (the exact-end case) the last index is returned, 0 for an empty model.
pub fn find_segment_index_by_distance(model: &PathModel, distance: f64) -> usize {
    let distance = if distance.is_nan() {
        0.0
    } else {
        distance.clamp(0.0, model.total_distance().max(0.0))
    };

    let segments = model.segments();
    let index = segments.partition_point(|s| s.cum_end <= distance);
    index.min(segments.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_commands_sync;
    use crate::visualizer::viewport::Point;

    fn two_tens() -> PathModel {
        parse_commands_sync("d20\nh0\np1\n10 0\n20 0\n", Point::default()).unwrap()
    }

    #[test]
    fn test_percent_bounds() {
        let model = two_tens();

        let start = find_start_by_percent(&model, 0.0);
        assert_eq!(start.start_line, 1);
        assert_eq!(start.start_dist, 0.0);
        assert_eq!(start.percent, 0.0);

        let end = find_start_by_percent(&model, 100.0);
        assert_eq!(end.start_line, 2);
        assert_eq!(end.start_dist, 10.0);
        assert_eq!(end.percent, 100.0);
    }

    #[test]
    fn test_percent_on_boundary_picks_next_segment() {
        let model = two_tens();
        let mid = find_start_by_percent(&model, 50.0);
        assert_eq!(mid.start_dist, 10.0);
        assert_eq!(mid.start_line, 2);
        assert_eq!(mid.percent, 50.0);
    }

    #[test]
    fn test_percent_clamps_and_nan() {
        let model = two_tens();
        assert_eq!(find_start_by_percent(&model, -20.0).percent, 0.0);
        assert_eq!(find_start_by_percent(&model, f64::NAN).percent, 0.0);
        assert_eq!(find_start_by_percent(&model, 250.0).start_dist, 10.0);
    }

    #[test]
    fn test_empty_model() {
        let model = parse_commands_sync("d100\nh0\np1\n", Point::default()).unwrap();
        assert_eq!(find_start_by_percent(&model, 40.0), ResumePoint::default());
        assert_eq!(find_segment_index_by_distance(&model, 40.0), 0);
    }

    #[test]
    fn test_distance_lookup() {
        let model = two_tens();
        assert_eq!(find_segment_index_by_distance(&model, 0.0), 0);
        assert_eq!(find_segment_index_by_distance(&model, 9.99), 0);
        assert_eq!(find_segment_index_by_distance(&model, 10.0), 1);
        assert_eq!(find_segment_index_by_distance(&model, 20.0), 1);
        assert_eq!(find_segment_index_by_distance(&model, 1e9), 1);
        assert_eq!(find_segment_index_by_distance(&model, -5.0), 0);
    }

    #[test]
    fn test_header_total_larger_than_plan() {
        // Declared 100mm, plan only covers 20mm
        let model = parse_commands_sync("d100\nh0\np1\n10 0\n20 0\n", Point::default()).unwrap();
        let start = find_start_by_percent(&model, 50.0);
        assert_eq!(start.start_line, 2);
        assert_eq!(start.percent, 100.0);
    }
}
