use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::edit::Edge;
use crate::timeline::SegmentId;

/// What an active drag holds on to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DragTarget {
    Edge { segment_id: SegmentId, edge: Edge },
    Cursor,
}

/// Exclusive input capture for drags.
///
/// While a drag is captured, click gestures on the timeline are suppressed.
/// After release they stay suppressed for a short window, which absorbs the
/// trailing click some pointer implementations deliver at the end of a drag.
#[derive(Debug, Clone)]
pub struct InputLock {
    captured: Option<DragTarget>,
    suppressed_until: Option<Instant>,
    suppression: Duration,
}

impl InputLock {
    pub fn new(suppression: Duration) -> Self {
        Self {
            captured: None,
            suppressed_until: None,
            suppression,
        }
    }

    pub fn captured(&self) -> Option<DragTarget> {
        self.captured
    }

    /// Starts a drag. A new capture replaces any previous one.
    pub fn capture(&mut self, target: DragTarget) {
        self.captured = Some(target);
        self.suppressed_until = None;
    }

    /// Ends the current drag and opens the click suppression window.
    pub fn release(&mut self, now: Instant) -> Option<DragTarget> {
        let released = self.captured.take();
        if released.is_some() {
            self.suppressed_until = Some(now + self.suppression);
        }
        released
    }

    /// Returns true when a click gesture may be applied at `now`.
    pub fn allows_click(&self, now: Instant) -> bool {
        self.captured.is_none()
            && self
                .suppressed_until
                .is_none_or(|until| now >= until)
    }
}
