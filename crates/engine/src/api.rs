use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chapters::{ChapterEntry, SaveReceipt, hydrate_timeline};
use crate::config::{EditLimits, EngineConfig};
use crate::edit::{
    Edge, click_at, create_in_gap, delete_segment, rename_segment, resize_edge, split_at,
};
use crate::error::{EngineError, Result};
use crate::gaps::{Gap, GapBounds, gap_containing, gaps};
use crate::input::{DragTarget, InputLock};
use crate::persist::{PersistenceScheduler, SaveRequest, SaveStatus};
use crate::playback::{BoundaryController, PlaybackAction, PlaybackContext};
use crate::timeline::{Segment, SegmentId, Timeline};

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Starts a session once the media duration is known, hydrating any
    /// existing chapters.
    Load {
        duration_tl: i64,
        chapters: Vec<ChapterEntry>,
    },
    /// Creates a chapter growing forward from `at_tl`.
    ///
    /// `label` defaults to `"Chapter N"` for the chapter's rank.
    CreateInGap {
        at_tl: i64,
        length_tl: i64,
        label: Option<String>,
    },
    /// The "split here" gesture: splits a chapter or fills a gap.
    ///
    /// Suppressed while a drag holds the input and shortly after it ends.
    Click {
        at_tl: i64,
    },
    Split {
        segment_id: SegmentId,
        at_tl: i64,
    },
    /// Moves one chapter edge as a single recorded edit.
    ResizeEdge {
        segment_id: SegmentId,
        edge: Edge,
        to_tl: i64,
    },
    /// Captures the input for a handle or cursor drag.
    BeginDrag {
        target: DragTarget,
    },
    /// Moves whatever the active drag holds. Edge moves are not recorded.
    DragTo {
        t_tl: i64,
    },
    /// Releases the drag and records its net edit, if any.
    EndDrag,
    Delete {
        segment_id: SegmentId,
    },
    Rename {
        segment_id: SegmentId,
        label: String,
    },
    PlaySegment {
        segment_id: SegmentId,
    },
    PlayGap {
        at_tl: i64,
    },
    Play,
    PlayThrough,
    Pause,
    Seek {
        t_tl: i64,
    },
    /// Position report from the player.
    PositionChanged {
        t_tl: i64,
    },
    SaveFinished {
        generation: u64,
        outcome: std::result::Result<SaveReceipt, String>,
    },
    /// Ends the session, flushing any pending save.
    Close,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The chapter set changed. `record` tells an undo history whether this
    /// state should become an entry.
    TimelineChanged {
        snapshot: TimelineSnapshot,
        record: bool,
    },
    PlaybackContextChanged(PlaybackContext),
    /// Instruction for the host player.
    Playback(PlaybackAction),
    SaveRequested(SaveRequest),
    SaveSucceeded {
        at: DateTime<Utc>,
        remote: bool,
    },
    SaveFailed(EngineErrorEvent),
    Closed,
    Error(EngineErrorEvent),
}

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineErrorKind {
    InsufficientLength,
    Overlap,
    InsufficientSpace,
    OutOfRange,
    SegmentNotFound,
    InputLocked,
    PersistenceFailure,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::InsufficientLength { .. } => Self::InsufficientLength,
            EngineError::Overlap { .. } => Self::Overlap,
            EngineError::InsufficientSpace { .. } => Self::InsufficientSpace,
            EngineError::OutOfRange { .. } => Self::OutOfRange,
            EngineError::SegmentIdNotFound { .. } => Self::SegmentNotFound,
            EngineError::InputLocked => Self::InputLocked,
            EngineError::PersistenceFailure { .. } => Self::PersistenceFailure,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Immutable timeline snapshot consumed by the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineSnapshot {
    pub duration_tl: i64,
    pub segments: Vec<Segment>,
    pub gaps: Vec<Gap>,
}

impl From<&Timeline> for TimelineSnapshot {
    fn from(timeline: &Timeline) -> Self {
        Self {
            duration_tl: timeline.duration_tl(),
            segments: timeline.segments().to_vec(),
            gaps: gaps(timeline),
        }
    }
}

/// Chapter editing session: timeline, playback boundaries and saving.
///
/// The engine is synchronous. Time only moves through the `now` arguments; a
/// host calls [`Engine::poll`] once [`Engine::next_deadline`] has passed.
///
/// # Example
/// ```
/// use std::time::Instant;
///
/// use chapter_engine::{Command, Engine, EngineConfig, Event};
///
/// let mut engine = Engine::new(EngineConfig::default());
/// let now = Instant::now();
/// engine
///     .handle_command(Command::Load { duration_tl: 100_000_000, chapters: Vec::new() }, now)
///     .expect("load succeeds");
/// let events = engine
///     .handle_command(
///         Command::CreateInGap { at_tl: 10_000_000, length_tl: 15_000_000, label: None },
///         now,
///     )
///     .expect("create succeeds");
///
/// let Event::TimelineChanged { snapshot, record } = &events[0] else {
///     panic!("first event must be TimelineChanged");
/// };
/// assert!(*record);
/// assert_eq!(snapshot.segments[0].end_tl, 25_000_000);
/// ```
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    limits: EditLimits,
    timeline: Option<Timeline>,
    next_segment_id: SegmentId,
    playback: BoundaryController,
    persistence: PersistenceScheduler,
    input: InputLock,
    drag_origin: Option<Timeline>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let limits = config.edit_limits();
        let playback = new_boundary_controller(&config);
        let persistence = PersistenceScheduler::new(config.save_debounce());
        let input = InputLock::new(config.click_suppression());
        Self {
            config,
            limits,
            timeline: None,
            next_segment_id: 1,
            playback,
            persistence,
            input,
            drag_origin: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn playback_context(&self) -> PlaybackContext {
        self.playback.context()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.persistence.last_saved()
    }

    /// Free-space bounds around `at_tl`, floored for display.
    pub fn gap_bounds(&self, at_tl: i64) -> Result<GapBounds> {
        let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
        Ok(gap_containing(
            at_tl,
            timeline.segments(),
            timeline.duration_tl(),
            self.limits.gap_report_floor_tl,
        ))
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command, now: Instant) -> Result<Vec<Event>> {
        match command {
            Command::Load {
                duration_tl,
                chapters,
            } => self.load(duration_tl, &chapters),
            Command::CreateInGap {
                at_tl,
                length_tl,
                label,
            } => {
                let next_id = self.next_segment_id;
                let limits = self.limits;
                self.edit(now, true, |timeline| {
                    create_in_gap(timeline, &limits, next_id, at_tl, length_tl, label)
                })
            }
            Command::Click { at_tl } => self.click(at_tl, now),
            Command::Split { segment_id, at_tl } => {
                let next_id = self.next_segment_id;
                self.edit(now, true, |timeline| {
                    split_at(timeline, segment_id, next_id, at_tl)
                })
            }
            Command::ResizeEdge {
                segment_id,
                edge,
                to_tl,
            } => {
                let limits = self.limits;
                self.edit(now, true, |timeline| {
                    resize_edge(timeline, &limits, segment_id, edge, to_tl)
                })
            }
            Command::BeginDrag { target } => self.begin_drag(target),
            Command::DragTo { t_tl } => self.drag_to(t_tl, now),
            Command::EndDrag => self.end_drag(now),
            Command::Delete { segment_id } => {
                self.edit(now, true, |timeline| delete_segment(timeline, segment_id))
            }
            Command::Rename { segment_id, label } => {
                self.edit(now, true, |timeline| {
                    rename_segment(timeline, segment_id, label)
                })
            }
            Command::PlaySegment { segment_id } => {
                let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
                let before = self.playback.context();
                let actions = self.playback.play_segment(timeline, segment_id)?;
                Ok(self.playback_events(before, actions))
            }
            Command::PlayGap { at_tl } => {
                let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
                let before = self.playback.context();
                let actions = self.playback.play_gap(timeline, at_tl)?;
                Ok(self.playback_events(before, actions))
            }
            Command::Play => {
                let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
                let before = self.playback.context();
                let actions = self.playback.play(timeline);
                Ok(self.playback_events(before, actions))
            }
            Command::PlayThrough => {
                let before = self.playback.context();
                let actions = self.playback.play_through();
                Ok(self.playback_events(before, actions))
            }
            Command::Pause => {
                let before = self.playback.context();
                let actions = self.playback.pause();
                Ok(self.playback_events(before, actions))
            }
            Command::Seek { t_tl } => {
                let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
                let before = self.playback.context();
                let actions = self.playback.seek(timeline, t_tl);
                Ok(self.playback_events(before, actions))
            }
            Command::PositionChanged { t_tl } => {
                let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
                let before = self.playback.context();
                let actions = self.playback.on_position(timeline, t_tl, now);
                Ok(self.playback_events(before, actions))
            }
            Command::SaveFinished {
                generation,
                outcome,
            } => Ok(self.save_finished(generation, outcome)),
            Command::Close => Ok(self.close()),
        }
    }

    /// Runs timers that came due: corrective reseeks and the debounced save.
    pub fn poll(&mut self, now: Instant) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .playback
            .poll(now)
            .into_iter()
            .map(Event::Playback)
            .collect();
        if let Some(request) = self.persistence.poll(now) {
            events.push(Event::SaveRequested(request));
        }
        events
    }

    /// Earliest instant at which [`Engine::poll`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.playback.next_deadline(), self.persistence.next_deadline()) {
            (Some(playback), Some(save)) => Some(playback.min(save)),
            (playback, save) => playback.or(save),
        }
    }

    fn load(&mut self, duration_tl: i64, chapters: &[ChapterEntry]) -> Result<Vec<Event>> {
        let (timeline, next_segment_id) =
            hydrate_timeline(chapters, duration_tl, self.limits.min_segment_tl, 1)?;
        info!(
            duration_tl,
            segment_count = timeline.segments().len(),
            "timeline loaded"
        );

        // A snapshot still pending belongs to the timeline being replaced.
        let mut events = Vec::new();
        if let Some(request) = self.persistence.flush() {
            debug!(generation = request.generation, "flushing save before reload");
            events.push(Event::SaveRequested(request));
        }
        self.playback = new_boundary_controller(&self.config);
        self.input = InputLock::new(self.config.click_suppression());
        self.drag_origin = None;
        self.next_segment_id = next_segment_id;
        self.playback.sync_timeline(&timeline);
        let snapshot = TimelineSnapshot::from(&timeline);
        self.timeline = Some(timeline);

        events.push(Event::TimelineChanged {
            snapshot,
            record: false,
        });
        events.push(Event::PlaybackContextChanged(self.playback.context()));
        Ok(events)
    }

    fn click(&mut self, at_tl: i64, now: Instant) -> Result<Vec<Event>> {
        if !self.input.allows_click(now) {
            debug!(at_tl, "click suppressed by input lock");
            return Err(EngineError::InputLocked);
        }
        let next_id = self.next_segment_id;
        let limits = self.limits;
        let default_length_tl = self.config.default_segment_length_tl();
        self.edit(now, true, |timeline| {
            click_at(timeline, &limits, next_id, at_tl, default_length_tl)
        })
    }

    fn begin_drag(&mut self, target: DragTarget) -> Result<Vec<Event>> {
        let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
        if let DragTarget::Edge { segment_id, .. } = target {
            if timeline.segment(segment_id).is_none() {
                return Err(EngineError::SegmentIdNotFound { segment_id });
            }
        }
        self.drag_origin = Some(timeline.clone());
        self.input.capture(target);
        self.playback.begin_drag();
        debug!(?target, "drag started");
        Ok(Vec::new())
    }

    fn drag_to(&mut self, t_tl: i64, now: Instant) -> Result<Vec<Event>> {
        match self.input.captured() {
            Some(DragTarget::Edge { segment_id, edge }) => {
                let limits = self.limits;
                self.edit(now, false, |timeline| {
                    resize_edge(timeline, &limits, segment_id, edge, t_tl)
                })
            }
            Some(DragTarget::Cursor) => {
                let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
                let before = self.playback.context();
                let actions = self.playback.seek(timeline, t_tl);
                Ok(self.playback_events(before, actions))
            }
            None => {
                debug!(t_tl, "drag move without captured input ignored");
                Ok(Vec::new())
            }
        }
    }

    fn end_drag(&mut self, now: Instant) -> Result<Vec<Event>> {
        let released = self.input.release(now);
        let origin = self.drag_origin.take();
        let Some(DragTarget::Edge { .. }) = released else {
            return Ok(Vec::new());
        };
        let timeline = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
        if origin.as_ref() == Some(timeline) {
            return Ok(Vec::new());
        }

        self.persistence.notify(timeline, true, now);
        Ok(vec![Event::TimelineChanged {
            snapshot: TimelineSnapshot::from(timeline),
            record: true,
        }])
    }

    fn edit<F>(&mut self, now: Instant, record: bool, operation: F) -> Result<Vec<Event>>
    where
        F: FnOnce(&Timeline) -> Result<Timeline>,
    {
        let current = self.timeline.as_ref().ok_or(EngineError::TimelineNotLoaded)?;
        let next = operation(current)?;
        if &next == current {
            return Ok(Vec::new());
        }

        if next.segment(self.next_segment_id).is_some() {
            self.next_segment_id += 1;
        }
        self.persistence.notify(&next, record, now);

        let before = self.playback.context();
        self.playback.sync_timeline(&next);
        let after = self.playback.context();

        let mut events = vec![Event::TimelineChanged {
            snapshot: TimelineSnapshot::from(&next),
            record,
        }];
        if before != after {
            events.push(Event::PlaybackContextChanged(after));
        }
        self.timeline = Some(next);
        Ok(events)
    }

    fn playback_events(
        &self,
        before: PlaybackContext,
        actions: Vec<PlaybackAction>,
    ) -> Vec<Event> {
        let mut events: Vec<Event> = actions.into_iter().map(Event::Playback).collect();
        let after = self.playback.context();
        if before != after {
            events.push(Event::PlaybackContextChanged(after));
        }
        events
    }

    fn save_finished(
        &mut self,
        generation: u64,
        outcome: std::result::Result<SaveReceipt, String>,
    ) -> Vec<Event> {
        match self.persistence.complete(generation, outcome) {
            Some(SaveStatus::Saved { at, remote }) => vec![Event::SaveSucceeded { at, remote }],
            Some(SaveStatus::Failed { message }) => {
                let error = EngineError::PersistenceFailure { message };
                vec![Event::SaveFailed(EngineErrorEvent::from_error(&error))]
            }
            None => Vec::new(),
        }
    }

    fn close(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(request) = self.persistence.flush() {
            events.push(Event::SaveRequested(request));
        }
        if self.timeline.take().is_none() {
            warn!("close requested without a loaded timeline");
        }
        self.playback = new_boundary_controller(&self.config);
        self.input = InputLock::new(self.config.click_suppression());
        self.drag_origin = None;
        events.push(Event::Closed);
        events
    }
}

fn new_boundary_controller(config: &EngineConfig) -> BoundaryController {
    BoundaryController::new(
        config.boundary_epsilon_tl(),
        config.reseek_delays(),
        config.reseek_window(),
    )
}
