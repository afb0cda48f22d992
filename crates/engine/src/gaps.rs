//! Free space between and around chapters.
//!
//! Gaps are derived from a [`Timeline`] on demand and never stored.

use serde::{Deserialize, Serialize};

use crate::timeline::{Segment, Timeline};

/// A maximal uncovered interval `[start_tl, end_tl)` of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start_tl: i64,
    pub end_tl: i64,
}

impl Gap {
    pub fn duration_tl(&self) -> i64 {
        self.end_tl - self.start_tl
    }

    pub fn contains(&self, t_tl: i64) -> bool {
        self.start_tl <= t_tl && t_tl < self.end_tl
    }
}

/// Free space around a query point, as reported to the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapBounds {
    /// End of the nearest segment ending at or before the query point, or `0`.
    pub lower_bound_tl: i64,
    /// Start of the nearest segment starting at or after the query point, or the duration.
    pub upper_bound_tl: i64,
    /// Room to grow forward from the query point, never reported below the floor.
    pub available_tl: i64,
}

/// Computes the free-space bounds around `at_tl`.
///
/// `available_tl` is `upper_bound_tl - at_tl` but never less than `floor_tl`,
/// so the reported value can exceed the real room. Code that creates segments
/// must use [`true_available_tl`].
///
/// # Example
/// ```
/// use chapter_engine::gaps::gap_containing;
/// use chapter_engine::timeline::Segment;
///
/// let segments = [
///     Segment { id: 1, label: "A".into(), start_tl: 0, end_tl: 10_000_000 },
///     Segment { id: 2, label: "B".into(), start_tl: 20_000_000, end_tl: 30_000_000 },
/// ];
/// let bounds = gap_containing(15_000_000, &segments, 30_000_000, 100_000);
/// assert_eq!(bounds.lower_bound_tl, 10_000_000);
/// assert_eq!(bounds.upper_bound_tl, 20_000_000);
/// assert_eq!(bounds.available_tl, 5_000_000);
/// ```
pub fn gap_containing(
    at_tl: i64,
    segments: &[Segment],
    duration_tl: i64,
    floor_tl: i64,
) -> GapBounds {
    let lower_bound_tl = segments
        .iter()
        .filter(|segment| segment.end_tl <= at_tl)
        .map(|segment| segment.end_tl)
        .max()
        .unwrap_or(0);
    let upper_bound_tl = segments
        .iter()
        .filter(|segment| segment.start_tl >= at_tl)
        .map(|segment| segment.start_tl)
        .min()
        .unwrap_or(duration_tl);

    GapBounds {
        lower_bound_tl,
        upper_bound_tl,
        available_tl: (upper_bound_tl - at_tl).max(floor_tl),
    }
}

/// Unfloored room to grow a new segment forward from `at_tl`.
///
/// Zero when `at_tl` is covered by a segment or lies outside `[0, duration)`.
pub fn true_available_tl(at_tl: i64, segments: &[Segment], duration_tl: i64) -> i64 {
    if at_tl < 0 || at_tl >= duration_tl || segments.iter().any(|segment| segment.contains(at_tl)) {
        return 0;
    }
    let bounds = gap_containing(at_tl, segments, duration_tl, 0);
    (bounds.upper_bound_tl - at_tl).max(0)
}

/// Lists every gap in timeline order.
pub fn gaps(timeline: &Timeline) -> Vec<Gap> {
    let mut out = Vec::with_capacity(timeline.segments().len() + 1);
    let mut cursor = 0;
    for segment in timeline.segments() {
        if segment.start_tl > cursor {
            out.push(Gap {
                start_tl: cursor,
                end_tl: segment.start_tl,
            });
        }
        cursor = cursor.max(segment.end_tl);
    }
    if cursor < timeline.duration_tl() {
        out.push(Gap {
            start_tl: cursor,
            end_tl: timeline.duration_tl(),
        });
    }
    out
}

/// Returns the gap containing `t_tl`, if the point is uncovered.
pub fn gap_at(timeline: &Timeline, t_tl: i64) -> Option<Gap> {
    gaps(timeline).into_iter().find(|gap| gap.contains(t_tl))
}
