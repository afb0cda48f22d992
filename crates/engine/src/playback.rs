//! Boundary-aware playback state.
//!
//! The controller never touches the player directly. It consumes position
//! updates and user playback requests and answers with [`PlaybackAction`]s for
//! the host to forward to its player.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::gaps::{Gap, gap_at, gaps};
use crate::timeline::{Segment, SegmentId, Timeline};

/// Where the playback cursor sits relative to the chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackContext {
    Idle,
    InSegment(SegmentId),
    InGap(Gap),
    /// A gap being previewed as if it were a chapter.
    InVirtualCutaway(Gap),
}

/// What a bounded preview is playing.
///
/// A virtual cutaway has no id, so id-based edit and persistence code cannot
/// reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewTarget {
    Real(Segment),
    Virtual(Gap),
}

/// Instructions for the host player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackAction {
    Play,
    Pause,
    Seek { t_tl: i64 },
}

/// Re-assertions of one boundary seek. Owns copies of everything it needs.
#[derive(Debug, Clone)]
struct CorrectionChain {
    generation: u64,
    target_tl: i64,
    due: VecDeque<Instant>,
    expires_at: Instant,
}

/// Classifies `t_tl` against the timeline.
///
/// A segment strictly containing the point wins, then a segment whose edge is
/// within `epsilon_tl`, then the gap containing the point (its end included).
pub fn classify_position(timeline: &Timeline, t_tl: i64, epsilon_tl: i64) -> PlaybackContext {
    let segments = timeline.segments();
    if let Some(segment) = segments.iter().find(|segment| segment.contains(t_tl)) {
        return PlaybackContext::InSegment(segment.id);
    }
    if let Some(segment) = segments.iter().find(|segment| {
        (t_tl - segment.start_tl).abs() <= epsilon_tl || (t_tl - segment.end_tl).abs() <= epsilon_tl
    }) {
        return PlaybackContext::InSegment(segment.id);
    }
    gaps(timeline)
        .into_iter()
        .find(|gap| gap.start_tl <= t_tl && t_tl <= gap.end_tl)
        .map_or(PlaybackContext::Idle, PlaybackContext::InGap)
}

/// Tracks the playback cursor and clamps bounded previews at their edges.
#[derive(Debug, Clone)]
pub struct BoundaryController {
    context: PlaybackContext,
    playing: bool,
    continue_past_boundary: bool,
    preview: Option<PreviewTarget>,
    position_tl: i64,
    epsilon_tl: i64,
    reseek_delays: Vec<Duration>,
    reseek_window: Duration,
    correction: Option<CorrectionChain>,
    correction_generation: u64,
    /// Set once a position report lands inside the previewed gap. Reports
    /// from outside before that are the player's pre-seek position.
    cutaway_entered: bool,
}

impl BoundaryController {
    pub fn new(epsilon_tl: i64, reseek_delays: Vec<Duration>, reseek_window: Duration) -> Self {
        Self {
            context: PlaybackContext::Idle,
            playing: false,
            continue_past_boundary: false,
            preview: None,
            position_tl: 0,
            epsilon_tl,
            reseek_delays,
            reseek_window,
            correction: None,
            correction_generation: 0,
            cutaway_entered: false,
        }
    }

    pub fn context(&self) -> PlaybackContext {
        self.context
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn continue_past_boundary(&self) -> bool {
        self.continue_past_boundary
    }

    pub fn preview(&self) -> Option<&PreviewTarget> {
        self.preview.as_ref()
    }

    pub fn position_tl(&self) -> i64 {
        self.position_tl
    }

    /// Plays one chapter and pauses at its end.
    pub fn play_segment(
        &mut self,
        timeline: &Timeline,
        segment_id: SegmentId,
    ) -> Result<Vec<PlaybackAction>> {
        let segment = timeline
            .segment(segment_id)
            .cloned()
            .ok_or(EngineError::SegmentIdNotFound { segment_id })?;
        self.cancel_corrections();

        let start_tl = segment.start_tl;
        self.context = PlaybackContext::InSegment(segment.id);
        self.preview = Some(PreviewTarget::Real(segment));
        self.start_bounded_preview(start_tl);
        Ok(vec![PlaybackAction::Seek { t_tl: start_tl }, PlaybackAction::Play])
    }

    /// Previews the gap containing `at_tl` as a virtual cutaway.
    pub fn play_gap(&mut self, timeline: &Timeline, at_tl: i64) -> Result<Vec<PlaybackAction>> {
        let gap = gaps(timeline)
            .into_iter()
            .find(|gap| gap.contains(at_tl))
            .ok_or(EngineError::InsufficientSpace {
                at_tl,
                available_tl: 0,
            })?;
        self.cancel_corrections();

        self.context = PlaybackContext::InVirtualCutaway(gap);
        self.preview = Some(PreviewTarget::Virtual(gap));
        self.cutaway_entered = false;
        self.start_bounded_preview(gap.start_tl);
        debug!(gap_start_tl = gap.start_tl, gap_end_tl = gap.end_tl, "virtual cutaway started");
        Ok(vec![
            PlaybackAction::Seek {
                t_tl: gap.start_tl,
            },
            PlaybackAction::Play,
        ])
    }

    fn start_bounded_preview(&mut self, start_tl: i64) {
        self.position_tl = start_tl;
        self.playing = true;
        self.continue_past_boundary = false;
    }

    /// Plays freely from the current position.
    pub fn play(&mut self, timeline: &Timeline) -> Vec<PlaybackAction> {
        self.cancel_corrections();
        self.preview = None;
        self.continue_past_boundary = false;
        self.playing = true;
        self.context = classify_position(timeline, self.position_tl, self.epsilon_tl);
        vec![PlaybackAction::Play]
    }

    /// Plays on through any boundary the current preview would stop at.
    ///
    /// The flag holds until playback stops or a new preview starts.
    pub fn play_through(&mut self) -> Vec<PlaybackAction> {
        self.cancel_corrections();
        self.continue_past_boundary = true;
        self.playing = true;
        vec![PlaybackAction::Play]
    }

    /// Stops playback. A virtual cutaway ends here.
    pub fn pause(&mut self) -> Vec<PlaybackAction> {
        self.stop_state();
        vec![PlaybackAction::Pause]
    }

    fn stop_state(&mut self) {
        self.playing = false;
        self.continue_past_boundary = false;
        self.preview = None;
        if let PlaybackContext::InVirtualCutaway(gap) = self.context {
            self.context = PlaybackContext::InGap(gap);
        }
    }

    /// Explicit user seek. Supersedes any pending corrective reseeks.
    pub fn seek(&mut self, timeline: &Timeline, t_tl: i64) -> Vec<PlaybackAction> {
        self.cancel_corrections();
        self.position_tl = t_tl;

        let still_in_preview = match &self.preview {
            Some(PreviewTarget::Virtual(gap)) => gap.contains(t_tl),
            Some(PreviewTarget::Real(segment)) => segment.contains(t_tl),
            None => false,
        };
        if !still_in_preview {
            self.preview = None;
            self.context = classify_position(timeline, t_tl, self.epsilon_tl);
        }
        vec![PlaybackAction::Seek { t_tl }]
    }

    /// A drag started somewhere on the timeline. Pending reseeks are dropped.
    pub fn begin_drag(&mut self) {
        self.cancel_corrections();
    }

    /// Re-reads preview bounds and the context after the chapters changed.
    ///
    /// A previewed chapter that no longer exists ends the bounded preview, as
    /// does a cutaway whose gap has been filled.
    pub fn sync_timeline(&mut self, timeline: &Timeline) {
        self.preview = match self.preview.take() {
            Some(PreviewTarget::Real(segment)) => {
                timeline.segment(segment.id).cloned().map(PreviewTarget::Real)
            }
            Some(PreviewTarget::Virtual(_)) => {
                gap_at(timeline, self.position_tl).map(PreviewTarget::Virtual)
            }
            None => None,
        };
        self.context = match self.preview {
            Some(PreviewTarget::Virtual(gap)) => PlaybackContext::InVirtualCutaway(gap),
            _ => classify_position(timeline, self.position_tl, self.epsilon_tl),
        };
    }

    /// Applies a position report from the player.
    pub fn on_position(
        &mut self,
        timeline: &Timeline,
        t_tl: i64,
        now: Instant,
    ) -> Vec<PlaybackAction> {
        self.position_tl = t_tl;
        let classified = classify_position(timeline, t_tl, self.epsilon_tl);
        if !self.playing {
            self.context = classified;
            return Vec::new();
        }

        match self.preview.clone() {
            Some(PreviewTarget::Virtual(gap)) => {
                let inside = t_tl >= gap.start_tl - self.epsilon_tl
                    && t_tl < gap.end_tl - self.epsilon_tl;
                if inside {
                    self.cutaway_entered = true;
                    self.context = PlaybackContext::InVirtualCutaway(gap);
                    return Vec::new();
                }
                if !self.cutaway_entered {
                    debug!(t_tl, "position outside cutaway before its seek landed");
                    self.position_tl = gap.start_tl;
                    return Vec::new();
                }
                if t_tl < gap.start_tl {
                    debug!(t_tl, "cursor left cutaway backwards");
                    self.preview = None;
                    self.context = classified;
                    return Vec::new();
                }
                let PlaybackContext::InSegment(segment_id) = classified else {
                    self.context = PlaybackContext::InVirtualCutaway(gap);
                    return Vec::new();
                };
                if self.continue_past_boundary {
                    self.preview = None;
                    self.context = classified;
                    return Vec::new();
                }
                info!(
                    segment_id,
                    boundary_tl = gap.end_tl,
                    "virtual cutaway reached a chapter boundary"
                );
                self.stop_at_boundary(PlaybackContext::InSegment(segment_id), gap.end_tl, now)
            }
            Some(PreviewTarget::Real(segment)) => {
                if !self.continue_past_boundary && t_tl >= segment.end_tl - self.epsilon_tl {
                    info!(segment_id = segment.id, "segment preview reached its end");
                    return self.stop_at_boundary(
                        PlaybackContext::InSegment(segment.id),
                        segment.end_tl,
                        now,
                    );
                }
                self.context = classified;
                Vec::new()
            }
            None => {
                self.context = classified;
                Vec::new()
            }
        }
    }

    fn stop_at_boundary(
        &mut self,
        context: PlaybackContext,
        boundary_tl: i64,
        now: Instant,
    ) -> Vec<PlaybackAction> {
        self.stop_state();
        self.context = context;
        self.position_tl = boundary_tl;
        self.schedule_corrections(boundary_tl, now);
        vec![
            PlaybackAction::Pause,
            PlaybackAction::Seek { t_tl: boundary_tl },
        ]
    }

    fn schedule_corrections(&mut self, target_tl: i64, now: Instant) {
        self.correction_generation += 1;
        let due = self
            .reseek_delays
            .iter()
            .filter(|delay| **delay < self.reseek_window)
            .map(|delay| now + *delay)
            .collect();
        self.correction = Some(CorrectionChain {
            generation: self.correction_generation,
            target_tl,
            due,
            expires_at: now + self.reseek_window,
        });
    }

    fn cancel_corrections(&mut self) {
        if let Some(chain) = self.correction.take() {
            debug!(generation = chain.generation, "corrective reseeks cancelled");
        }
    }

    /// True while corrective reseeks are pending.
    pub fn has_pending_corrections(&self) -> bool {
        self.correction.is_some()
    }

    /// Next instant at which [`BoundaryController::poll`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.correction
            .as_ref()
            .and_then(|chain| chain.due.front().copied())
    }

    /// Re-asserts the boundary seek for every retry that came due.
    ///
    /// Several retries due at once collapse into a single seek.
    pub fn poll(&mut self, now: Instant) -> Vec<PlaybackAction> {
        let Some(chain) = self.correction.as_mut() else {
            return Vec::new();
        };
        if now >= chain.expires_at {
            self.correction = None;
            return Vec::new();
        }

        let mut fired = false;
        while chain.due.front().is_some_and(|due| *due <= now) {
            chain.due.pop_front();
            fired = true;
        }
        let target_tl = chain.target_tl;
        if chain.due.is_empty() {
            self.correction = None;
        }
        if fired {
            self.position_tl = target_tl;
            vec![PlaybackAction::Seek { t_tl: target_tl }]
        } else {
            Vec::new()
        }
    }
}
