//! Chapter edit operations.
//!
//! Every operation computes a candidate segment set and commits it through
//! [`Timeline::apply`], so a rejected edit never changes the timeline.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EditLimits;
use crate::error::{EngineError, Result};
use crate::gaps::true_available_tl;
use crate::timeline::{Segment, SegmentId, Timeline};

/// Which edge of a segment a resize moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Edge {
    Start,
    End,
}

/// Default label for the chapter at 1-based chronological `rank`.
pub fn chapter_label(rank: usize) -> String {
    format!("Chapter {rank}")
}

fn label_for_new_segment(segments: &[Segment], start_tl: i64) -> String {
    let rank = segments
        .iter()
        .filter(|segment| segment.start_tl < start_tl)
        .count()
        + 1;
    chapter_label(rank)
}

fn insert_segment(timeline: &Timeline, segment: Segment) -> Result<Timeline> {
    let mut candidate = timeline.segments().to_vec();
    candidate.push(segment);
    timeline.apply(candidate)
}

fn position_of(timeline: &Timeline, segment_id: SegmentId) -> Result<usize> {
    timeline
        .segment_position(segment_id)
        .ok_or(EngineError::SegmentIdNotFound { segment_id })
}

/// Creates a segment growing forward from `at_tl` into the gap around it.
///
/// The new segment spans `[at_tl, at_tl + min(requested_tl, room))` where
/// `room` is the unfloored distance to the next segment or the timeline end.
/// Fails with `InsufficientSpace` when that room is below the minimum length.
pub fn create_in_gap(
    timeline: &Timeline,
    limits: &EditLimits,
    new_id: SegmentId,
    at_tl: i64,
    requested_tl: i64,
    label: Option<String>,
) -> Result<Timeline> {
    let available_tl = true_available_tl(at_tl, timeline.segments(), timeline.duration_tl());
    if available_tl < limits.min_segment_tl {
        debug!(at_tl, available_tl, "create rejected: insufficient space");
        return Err(EngineError::InsufficientSpace {
            at_tl,
            available_tl,
        });
    }

    let end_tl = at_tl + requested_tl.min(available_tl);
    let label = label.unwrap_or_else(|| label_for_new_segment(timeline.segments(), at_tl));
    debug!(new_id, at_tl, end_tl, %label, "create accepted");
    insert_segment(
        timeline,
        Segment {
            id: new_id,
            label,
            start_tl: at_tl,
            end_tl,
        },
    )
}

/// Moves one edge of a segment, avoiding collisions and snapping to neighbors.
///
/// The edge is clamped so the segment keeps the minimum length, then clamped
/// so it cannot cross the neighboring segment on the moved side (the timeline
/// edge when there is none). Landing within the snap threshold of that
/// boundary sets the edge exactly on it. Snapping is idempotent.
///
/// # Example
/// ```
/// use chapter_engine::config::EditLimits;
/// use chapter_engine::edit::{Edge, resize_edge};
/// use chapter_engine::timeline::{Segment, Timeline};
///
/// let timeline = Timeline::new(100_000_000, 500_000)
///     .expect("valid duration")
///     .apply(vec![
///         Segment { id: 1, label: "A".into(), start_tl: 0, end_tl: 25_000_000 },
///         Segment { id: 2, label: "B".into(), start_tl: 30_000_000, end_tl: 40_000_000 },
///     ])
///     .expect("valid segments");
///
/// let resized = resize_edge(&timeline, &EditLimits::default(), 2, Edge::Start, 24_900_000)
///     .expect("resize succeeds");
/// assert_eq!(resized.segment(2).map(|segment| segment.start_tl), Some(25_000_000));
/// ```
pub fn resize_edge(
    timeline: &Timeline,
    limits: &EditLimits,
    segment_id: SegmentId,
    edge: Edge,
    proposed_tl: i64,
) -> Result<Timeline> {
    let index = position_of(timeline, segment_id)?;
    let segments = timeline.segments();
    let current = &segments[index];

    let mut updated = current.clone();
    match edge {
        Edge::Start => {
            let lower_tl = index
                .checked_sub(1)
                .map(|previous| segments[previous].end_tl)
                .unwrap_or(0);
            let mut start_tl = proposed_tl
                .min(current.end_tl - limits.min_segment_tl)
                .max(lower_tl);
            if start_tl - lower_tl <= limits.snap_threshold_tl {
                start_tl = lower_tl;
            }
            updated.start_tl = start_tl;
        }
        Edge::End => {
            let upper_tl = segments
                .get(index + 1)
                .map(|next| next.start_tl)
                .unwrap_or(timeline.duration_tl());
            let mut end_tl = proposed_tl
                .max(current.start_tl + limits.min_segment_tl)
                .min(upper_tl);
            if upper_tl - end_tl <= limits.snap_threshold_tl {
                end_tl = upper_tl;
            }
            updated.end_tl = end_tl;
        }
    }

    if &updated == current {
        return Ok(timeline.clone());
    }

    debug!(
        segment_id,
        ?edge,
        proposed_tl,
        start_tl = updated.start_tl,
        end_tl = updated.end_tl,
        "resize accepted"
    );
    let mut candidate = segments.to_vec();
    candidate[index] = updated;
    timeline.apply(candidate)
}

/// Splits a segment at `at_tl`.
///
/// The left half keeps the id and label; the right half gets `new_id` and a
/// chapter label for its rank. `at_tl` must lie strictly inside the segment.
pub fn split_at(
    timeline: &Timeline,
    segment_id: SegmentId,
    new_id: SegmentId,
    at_tl: i64,
) -> Result<Timeline> {
    let index = position_of(timeline, segment_id)?;
    let current = &timeline.segments()[index];
    if at_tl <= current.start_tl || at_tl >= current.end_tl {
        debug!(segment_id, at_tl, "split rejected: outside segment");
        return Err(EngineError::OutOfRange { segment_id, at_tl });
    }

    let left = Segment {
        end_tl: at_tl,
        ..current.clone()
    };
    let right = Segment {
        id: new_id,
        label: label_for_new_segment(timeline.segments(), at_tl),
        start_tl: at_tl,
        end_tl: current.end_tl,
    };

    debug!(segment_id, new_id, at_tl, "split accepted");
    let mut candidate = timeline.segments().to_vec();
    candidate[index] = left;
    candidate.push(right);
    timeline.apply(candidate)
}

/// Applies the "split here" gesture at `at_tl`.
///
/// Inside a segment this splits it. In the gap before the first segment or
/// after the last one, the whole gap out to the timeline edge is filled with a
/// new segment, or the neighboring segment is extended to the edge when the gap
/// is too short for a segment of its own. Any other gap gets a new segment of
/// `default_length_tl` (or whatever fits) starting at `at_tl`.
pub fn click_at(
    timeline: &Timeline,
    limits: &EditLimits,
    new_id: SegmentId,
    at_tl: i64,
    default_length_tl: i64,
) -> Result<Timeline> {
    let at_tl = at_tl.clamp(0, timeline.duration_tl());
    if let Some(index) = timeline.find_segment_index(at_tl) {
        let segment_id = timeline.segments()[index].id;
        return split_at(timeline, segment_id, new_id, at_tl);
    }

    let (Some(first), Some(last)) = (timeline.segments().first(), timeline.segments().last())
    else {
        return create_in_gap(timeline, limits, new_id, at_tl, default_length_tl, None);
    };

    if at_tl >= last.end_tl {
        let room_tl = timeline.duration_tl() - last.end_tl;
        if room_tl >= limits.min_segment_tl {
            return create_in_gap(timeline, limits, new_id, last.end_tl, room_tl, None);
        }
        if room_tl == 0 {
            return Err(EngineError::InsufficientSpace {
                at_tl,
                available_tl: 0,
            });
        }
        debug!(segment_id = last.id, "extending last segment to timeline end");
        return resize_to(timeline, last.id, last.start_tl, timeline.duration_tl());
    }

    if at_tl < first.start_tl {
        let room_tl = first.start_tl;
        if room_tl >= limits.min_segment_tl {
            return create_in_gap(timeline, limits, new_id, 0, room_tl, None);
        }
        debug!(segment_id = first.id, "extending first segment to timeline start");
        return resize_to(timeline, first.id, 0, first.end_tl);
    }

    create_in_gap(timeline, limits, new_id, at_tl, default_length_tl, None)
}

fn resize_to(
    timeline: &Timeline,
    segment_id: SegmentId,
    start_tl: i64,
    end_tl: i64,
) -> Result<Timeline> {
    let index = position_of(timeline, segment_id)?;
    let mut candidate = timeline.segments().to_vec();
    candidate[index].start_tl = start_tl;
    candidate[index].end_tl = end_tl;
    timeline.apply(candidate)
}

/// Removes a segment. Removing the last one leaves a valid empty timeline.
pub fn delete_segment(timeline: &Timeline, segment_id: SegmentId) -> Result<Timeline> {
    let index = position_of(timeline, segment_id)?;
    let mut candidate = timeline.segments().to_vec();
    candidate.remove(index);
    debug!(segment_id, remaining = candidate.len(), "delete accepted");
    timeline.apply(candidate)
}

/// Replaces a segment label.
pub fn rename_segment(
    timeline: &Timeline,
    segment_id: SegmentId,
    label: String,
) -> Result<Timeline> {
    let index = position_of(timeline, segment_id)?;
    let mut candidate = timeline.segments().to_vec();
    candidate[index].label = label;
    timeline.apply(candidate)
}

#[cfg(test)]
mod tests {
    use super::{
        Edge, click_at, create_in_gap, delete_segment, rename_segment, resize_edge, split_at,
    };
    use crate::config::EditLimits;
    use crate::error::EngineError;
    use crate::timeline::{Segment, Timeline};

    const SECOND: i64 = 1_000_000;

    fn timeline(duration_s: i64, ranges: &[(u64, i64, i64)]) -> Timeline {
        let segments = ranges
            .iter()
            .map(|&(id, start_tl, end_tl)| Segment {
                id,
                label: format!("Chapter {id}"),
                start_tl,
                end_tl,
            })
            .collect();
        Timeline::new(duration_s * SECOND, 500_000)
            .expect("timeline")
            .apply(segments)
            .expect("valid segments")
    }

    fn bounds(timeline: &Timeline, id: u64) -> (i64, i64) {
        let segment = timeline.segment(id).expect("segment exists");
        (segment.start_tl, segment.end_tl)
    }

    #[test]
    fn create_in_empty_timeline_uses_requested_length() {
        let empty = timeline(100, &[]);

        let next = create_in_gap(&empty, &EditLimits::default(), 1, 10 * SECOND, 15 * SECOND, None)
            .expect("create succeeds");

        assert_eq!(bounds(&next, 1), (10 * SECOND, 25 * SECOND));
        assert_eq!(next.segments()[0].label, "Chapter 1");
    }

    #[test]
    fn create_truncates_to_next_segment_start() {
        let base = timeline(100, &[(1, 20 * SECOND, 30 * SECOND)]);

        let next = create_in_gap(&base, &EditLimits::default(), 2, 12 * SECOND, 15 * SECOND, None)
            .expect("create succeeds");

        assert_eq!(bounds(&next, 2), (12 * SECOND, 20 * SECOND));
    }

    #[test]
    fn create_rejects_gap_below_minimum_using_true_distance() {
        let base = timeline(30, &[(1, 20 * SECOND, 30 * SECOND)]);

        let result = create_in_gap(
            &base,
            &EditLimits::default(),
            2,
            19_700_000,
            5 * SECOND,
            None,
        );

        assert!(matches!(
            result,
            Err(EngineError::InsufficientSpace {
                at_tl: 19_700_000,
                available_tl: 300_000
            })
        ));
    }

    #[test]
    fn new_label_reflects_rank_without_renaming_others() {
        let base = timeline(100, &[(1, 0, 10 * SECOND), (2, 30 * SECOND, 40 * SECOND)]);

        let next = create_in_gap(&base, &EditLimits::default(), 3, 15 * SECOND, 5 * SECOND, None)
            .expect("create succeeds");

        let labels: Vec<_> = next.segments().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Chapter 1", "Chapter 2", "Chapter 2"]);
    }

    #[test]
    fn resize_start_without_nearby_neighbor_does_not_snap() {
        let base = timeline(100, &[(1, 0, 10 * SECOND), (2, 30 * SECOND, 40 * SECOND)]);

        let next = resize_edge(&base, &EditLimits::default(), 2, Edge::Start, 24 * SECOND)
            .expect("resize succeeds");

        assert_eq!(bounds(&next, 2), (24 * SECOND, 40 * SECOND));
    }

    #[test]
    fn resize_start_cannot_cross_previous_segment() {
        let base = timeline(100, &[(1, 0, 25 * SECOND), (2, 30 * SECOND, 40 * SECOND)]);

        let next = resize_edge(&base, &EditLimits::default(), 2, Edge::Start, 5 * SECOND)
            .expect("resize succeeds");

        assert_eq!(bounds(&next, 2), (25 * SECOND, 40 * SECOND));
    }

    #[test]
    fn resize_end_snaps_to_next_start_and_is_idempotent() {
        let base = timeline(100, &[(1, 0, 10 * SECOND), (2, 20 * SECOND, 40 * SECOND)]);
        let limits = EditLimits::default();

        let once = resize_edge(&base, &limits, 1, Edge::End, 19_800_000).expect("resize");
        let twice = resize_edge(&once, &limits, 1, Edge::End, 19_800_000).expect("resize");

        assert_eq!(bounds(&once, 1), (0, 20 * SECOND));
        assert_eq!(once, twice);
    }

    #[test]
    fn resize_keeps_minimum_length() {
        let base = timeline(100, &[(1, 10 * SECOND, 20 * SECOND)]);

        let next = resize_edge(&base, &EditLimits::default(), 1, Edge::End, 0)
            .expect("resize succeeds");

        assert_eq!(bounds(&next, 1), (10 * SECOND, 10_500_000));
    }

    #[test]
    fn resize_end_without_neighbor_snaps_to_duration() {
        let base = timeline(60, &[(1, 10 * SECOND, 20 * SECOND)]);

        let next = resize_edge(&base, &EditLimits::default(), 1, Edge::End, 59_900_000)
            .expect("resize succeeds");

        assert_eq!(bounds(&next, 1), (10 * SECOND, 60 * SECOND));
    }

    #[test]
    fn resize_unknown_segment_is_reported() {
        let base = timeline(60, &[]);

        let result = resize_edge(&base, &EditLimits::default(), 9, Edge::End, SECOND);

        assert!(matches!(
            result,
            Err(EngineError::SegmentIdNotFound { segment_id: 9 })
        ));
    }

    #[test]
    fn split_inside_segment_keeps_left_identity() {
        let base = timeline(100, &[(1, 0, 10 * SECOND), (2, 20 * SECOND, 40 * SECOND)]);

        let next = split_at(&base, 2, 3, 30 * SECOND).expect("split succeeds");

        assert_eq!(bounds(&next, 2), (20 * SECOND, 30 * SECOND));
        assert_eq!(bounds(&next, 3), (30 * SECOND, 40 * SECOND));
        assert_eq!(next.segment(2).map(|s| s.label.as_str()), Some("Chapter 2"));
        assert_eq!(next.segment(3).map(|s| s.label.as_str()), Some("Chapter 3"));
    }

    #[test]
    fn split_at_segment_edge_is_out_of_range() {
        let base = timeline(100, &[(1, 0, 10 * SECOND)]);

        let result = split_at(&base, 1, 2, 10 * SECOND);

        assert!(matches!(
            result,
            Err(EngineError::OutOfRange {
                segment_id: 1,
                at_tl: 10_000_000
            })
        ));
    }

    #[test]
    fn split_leaving_short_half_is_rejected() {
        let base = timeline(100, &[(1, 0, 10 * SECOND)]);

        let result = split_at(&base, 1, 2, 9_800_000);

        assert!(matches!(
            result,
            Err(EngineError::InsufficientLength { segment_id: 2, .. })
        ));
    }

    #[test]
    fn click_in_trailing_gap_fills_to_end() {
        let base = timeline(100, &[(1, 0, 10 * SECOND)]);

        let next = click_at(&base, &EditLimits::default(), 2, 50 * SECOND, 10 * SECOND)
            .expect("click succeeds");

        assert_eq!(bounds(&next, 2), (10 * SECOND, 100 * SECOND));
    }

    #[test]
    fn click_in_short_trailing_gap_extends_last_segment() {
        let base = timeline(100, &[(1, 0, 99_700_000)]);

        let next = click_at(&base, &EditLimits::default(), 2, 99_900_000, 10 * SECOND)
            .expect("click succeeds");

        assert_eq!(bounds(&next, 1), (0, 100 * SECOND));
        assert!(next.segment(2).is_none());
    }

    #[test]
    fn click_in_leading_gap_fills_from_zero() {
        let base = timeline(100, &[(1, 30 * SECOND, 40 * SECOND)]);

        let next = click_at(&base, &EditLimits::default(), 2, 12 * SECOND, 10 * SECOND)
            .expect("click succeeds");

        assert_eq!(bounds(&next, 2), (0, 30 * SECOND));
        assert_eq!(next.segment(2).map(|s| s.label.as_str()), Some("Chapter 1"));
    }

    #[test]
    fn click_in_interior_gap_creates_default_length() {
        let base = timeline(100, &[(1, 0, 10 * SECOND), (2, 50 * SECOND, 60 * SECOND)]);

        let next = click_at(&base, &EditLimits::default(), 3, 20 * SECOND, 10 * SECOND)
            .expect("click succeeds");

        assert_eq!(bounds(&next, 3), (20 * SECOND, 30 * SECOND));
    }

    #[test]
    fn click_inside_segment_splits_it() {
        let base = timeline(100, &[(1, 0, 10 * SECOND)]);

        let next = click_at(&base, &EditLimits::default(), 2, 4 * SECOND, 10 * SECOND)
            .expect("click succeeds");

        assert_eq!(bounds(&next, 1), (0, 4 * SECOND));
        assert_eq!(bounds(&next, 2), (4 * SECOND, 10 * SECOND));
    }

    #[test]
    fn deleting_last_segment_leaves_empty_timeline() {
        let base = timeline(100, &[(1, 0, 10 * SECOND)]);

        let next = delete_segment(&base, 1).expect("delete succeeds");

        assert!(next.is_empty());
        assert!(matches!(
            delete_segment(&next, 1),
            Err(EngineError::SegmentIdNotFound { segment_id: 1 })
        ));
    }

    #[test]
    fn rename_changes_only_the_label() {
        let base = timeline(100, &[(1, 0, 10 * SECOND)]);

        let next = rename_segment(&base, 1, "Intro".to_string()).expect("rename succeeds");

        assert_eq!(next.segment(1).map(|s| s.label.as_str()), Some("Intro"));
        assert_eq!(bounds(&next, 1), (0, 10 * SECOND));
    }
}
