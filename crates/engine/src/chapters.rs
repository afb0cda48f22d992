//! Chapter list wire format shared with the backing store.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::time::{format_timestamp, parse_timestamp};
use crate::timeline::{Segment, SegmentId, Timeline};

/// One chapter as stored remotely: `HH:MM:SS.mmm` bounds and a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterEntry {
    pub start_time: String,
    pub end_time: String,
    pub chapter_title: String,
}

/// Body of a save request: always the complete chapter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPayload {
    pub chapters: Vec<ChapterEntry>,
}

impl ChapterPayload {
    pub fn from_segments(segments: &[Segment]) -> Self {
        Self {
            chapters: segments.iter().map(ChapterEntry::from).collect(),
        }
    }
}

impl From<&Segment> for ChapterEntry {
    fn from(segment: &Segment) -> Self {
        Self {
            start_time: format_timestamp(segment.start_tl),
            end_time: format_timestamp(segment.end_tl),
            chapter_title: segment.label.clone(),
        }
    }
}

/// Response body of the save endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub status: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SaveResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Parses `updated_at` as RFC 3339, or as a naive ISO-8601 timestamp taken to be UTC.
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.updated_at.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}

/// A save the engine may treat as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReceipt {
    pub updated_at: DateTime<Utc>,
    /// False when the store does not offer chapter saving yet and the save was
    /// accepted locally only.
    pub remote: bool,
}

/// Builds a timeline from an externally supplied chapter list.
///
/// Entries are read in start order. An entry that would be too short or
/// overlap an already accepted entry is skipped with a warning, so the result
/// is always valid. Ids are assigned from `first_id` upwards; the next free id
/// is returned alongside the timeline.
///
/// # Example
/// ```
/// use chapter_engine::chapters::{ChapterEntry, hydrate_timeline};
///
/// let entries = vec![ChapterEntry {
///     start_time: "00:00:05.000".into(),
///     end_time: "00:00:12.500".into(),
///     chapter_title: "Intro".into(),
/// }];
/// let (timeline, next_id) =
///     hydrate_timeline(&entries, 60_000_000, 500_000, 1).expect("valid duration");
///
/// assert_eq!(timeline.segments()[0].end_tl, 12_500_000);
/// assert_eq!(next_id, 2);
/// ```
pub fn hydrate_timeline(
    entries: &[ChapterEntry],
    duration_tl: i64,
    min_segment_tl: i64,
    first_id: SegmentId,
) -> Result<(Timeline, SegmentId)> {
    let mut parsed: Vec<(i64, i64, &str)> = entries
        .iter()
        .map(|entry| {
            (
                parse_timestamp(&entry.start_time),
                parse_timestamp(&entry.end_time),
                entry.chapter_title.as_str(),
            )
        })
        .collect();
    parsed.sort_by_key(|&(start_tl, end_tl, _)| (start_tl, end_tl));

    let mut timeline = Timeline::new(duration_tl, min_segment_tl)?;
    let mut next_id = first_id;
    for (start_tl, end_tl, title) in parsed {
        let mut candidate = timeline.segments().to_vec();
        candidate.push(Segment {
            id: next_id,
            label: title.to_string(),
            start_tl,
            end_tl,
        });
        match timeline.apply(candidate) {
            Ok(accepted) => {
                timeline = accepted;
                next_id += 1;
            }
            Err(error) => {
                warn!(title, start_tl, end_tl, %error, "skipping invalid chapter");
            }
        }
    }

    Ok((timeline, next_id))
}
