use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Opaque identifier for chapters. Stable across edits to other segments.
pub type SegmentId = u64;

/// One labeled chapter interval `[start_tl, end_tl)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub label: String,
    pub start_tl: i64,
    pub end_tl: i64,
}

impl Segment {
    pub fn duration_tl(&self) -> i64 {
        self.end_tl - self.start_tl
    }

    /// Returns true when `t_tl` lies in `[start_tl, end_tl)`.
    pub fn contains(&self, t_tl: i64) -> bool {
        self.start_tl <= t_tl && t_tl < self.end_tl
    }
}

/// Canonical chapter set of one media timeline.
///
/// Segments are ordered by start, never overlap, fit in `[0, duration_tl]` and
/// are at least `min_segment_tl` long. The only way to obtain a different
/// segment set is [`Timeline::apply`], which validates the whole replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    duration_tl: i64,
    min_segment_tl: i64,
    segments: Vec<Segment>,
}

impl Timeline {
    /// Creates an empty timeline once the media duration is known.
    pub fn new(duration_tl: i64, min_segment_tl: i64) -> Result<Self> {
        if duration_tl <= 0 {
            return Err(EngineError::InvalidDuration { duration_tl });
        }
        Ok(Self {
            duration_tl,
            min_segment_tl: min_segment_tl.max(1),
            segments: Vec::new(),
        })
    }

    pub fn duration_tl(&self) -> i64 {
        self.duration_tl
    }

    pub fn min_segment_tl(&self) -> i64 {
        self.min_segment_tl
    }

    /// Segments ordered by start.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, segment_id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id == segment_id)
    }

    pub fn segment_position(&self, segment_id: SegmentId) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| segment.id == segment_id)
    }

    /// Finds the segment index that contains `t_tl`.
    pub fn find_segment_index(&self, t_tl: i64) -> Option<usize> {
        self.segments.iter().position(|segment| segment.contains(t_tl))
    }

    /// Total length covered by segments.
    pub fn covered_tl(&self) -> i64 {
        self.segments.iter().map(Segment::duration_tl).sum()
    }

    /// Validates a whole replacement segment set and returns the new timeline.
    ///
    /// Edges are clamped to `[0, duration]` first, then every segment must be at
    /// least the minimum length, then no two segments may overlap. Touching
    /// segments are not an overlap. `self` is left untouched.
    ///
    /// # Example
    /// ```
    /// use chapter_engine::timeline::{Segment, Timeline};
    ///
    /// let timeline = Timeline::new(10_000_000, 500_000).expect("valid duration");
    /// let next = timeline
    ///     .apply(vec![
    ///         Segment { id: 2, label: "B".into(), start_tl: 4_000_000, end_tl: 12_000_000 },
    ///         Segment { id: 1, label: "A".into(), start_tl: 0, end_tl: 4_000_000 },
    ///     ])
    ///     .expect("adjacent segments are valid");
    ///
    /// assert_eq!(next.segments()[0].id, 1);
    /// assert_eq!(next.segments()[1].end_tl, 10_000_000);
    /// assert!(timeline.is_empty());
    /// ```
    pub fn apply(&self, mut candidate: Vec<Segment>) -> Result<Timeline> {
        for segment in &mut candidate {
            segment.start_tl = segment.start_tl.clamp(0, self.duration_tl);
            segment.end_tl = segment.end_tl.clamp(0, self.duration_tl);
        }
        candidate.sort_by_key(|segment| (segment.start_tl, segment.end_tl));

        if let Some(short) = candidate
            .iter()
            .find(|segment| segment.duration_tl() < self.min_segment_tl)
        {
            warn!(
                segment_id = short.id,
                length_tl = short.duration_tl(),
                min_tl = self.min_segment_tl,
                "segment set rejected: insufficient length"
            );
            return Err(EngineError::InsufficientLength {
                segment_id: short.id,
                length_tl: short.duration_tl(),
                min_tl: self.min_segment_tl,
            });
        }

        if let Some(pair) = candidate
            .windows(2)
            .find(|pair| pair[1].start_tl < pair[0].end_tl)
        {
            warn!(
                left_id = pair[0].id,
                right_id = pair[1].id,
                "segment set rejected: overlap"
            );
            return Err(EngineError::Overlap {
                left_id: pair[0].id,
                right_id: pair[1].id,
            });
        }

        debug!(segment_count = candidate.len(), "segment set accepted");
        Ok(Timeline {
            duration_tl: self.duration_tl,
            min_segment_tl: self.min_segment_tl,
            segments: candidate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Segment, Timeline};
    use crate::error::EngineError;

    fn segment(id: u64, start_tl: i64, end_tl: i64) -> Segment {
        Segment {
            id,
            label: format!("Chapter {id}"),
            start_tl,
            end_tl,
        }
    }

    #[test]
    fn new_rejects_empty_duration() {
        assert!(matches!(
            Timeline::new(0, 500_000),
            Err(EngineError::InvalidDuration { duration_tl: 0 })
        ));
    }

    #[test]
    fn apply_rejects_overlapping_segments() {
        let timeline = Timeline::new(100_000_000, 500_000).expect("timeline");

        let result = timeline.apply(vec![
            segment(1, 0, 10_000_000),
            segment(2, 9_000_000, 20_000_000),
        ]);

        assert!(matches!(
            result,
            Err(EngineError::Overlap {
                left_id: 1,
                right_id: 2
            })
        ));
    }

    #[test]
    fn apply_rejects_segment_shorter_than_minimum() {
        let timeline = Timeline::new(100_000_000, 500_000).expect("timeline");

        let result = timeline.apply(vec![segment(7, 1_000_000, 1_400_000)]);

        assert!(matches!(
            result,
            Err(EngineError::InsufficientLength {
                segment_id: 7,
                length_tl: 400_000,
                min_tl: 500_000
            })
        ));
    }

    #[test]
    fn apply_checks_length_after_clamping_to_duration() {
        let timeline = Timeline::new(10_000_000, 500_000).expect("timeline");

        let result = timeline.apply(vec![segment(1, 9_800_000, 12_000_000)]);

        assert!(matches!(
            result,
            Err(EngineError::InsufficientLength { segment_id: 1, .. })
        ));
    }

    #[test]
    fn rejected_apply_keeps_previous_segments() {
        let timeline = Timeline::new(100_000_000, 500_000)
            .expect("timeline")
            .apply(vec![segment(1, 0, 10_000_000)])
            .expect("valid set");

        let _ = timeline.apply(vec![segment(1, 0, 10_000_000), segment(2, 5_000_000, 6_000_000)]);

        assert_eq!(timeline.segments(), &[segment(1, 0, 10_000_000)]);
        assert_eq!(timeline.covered_tl(), 10_000_000);
    }

    #[test]
    fn find_segment_index_uses_half_open_intervals() {
        let timeline = Timeline::new(100_000_000, 500_000)
            .expect("timeline")
            .apply(vec![segment(1, 0, 10_000_000), segment(2, 10_000_000, 20_000_000)])
            .expect("valid set");

        assert_eq!(timeline.find_segment_index(10_000_000), Some(1));
        assert_eq!(timeline.find_segment_index(20_000_000), None);
    }
}
