use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::chapters::{ChapterPayload, SaveReceipt};
use crate::timeline::{Segment, Timeline};

/// One save the host should send. `generation` identifies it when the outcome
/// is reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub generation: u64,
    pub payload: ChapterPayload,
}

/// Result of a finished save, as applied by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved { at: DateTime<Utc>, remote: bool },
    Failed { message: String },
}

#[derive(Debug, Clone)]
struct PersistenceJob {
    snapshot: Vec<Segment>,
    due: Instant,
}

/// Debounces recordable edits into single whole-list saves.
///
/// At most one job is pending. A recordable edit replaces it and restarts the
/// quiet period, so a burst of edits produces one save after the last one.
/// Failed saves leave local state alone; the next recordable edit retries.
#[derive(Debug, Clone)]
pub struct PersistenceScheduler {
    debounce: Duration,
    pending: Option<PersistenceJob>,
    issued_generation: u64,
    in_flight: Option<u64>,
    last_saved: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl PersistenceScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: None,
            issued_generation: 0,
            in_flight: None,
            last_saved: None,
            last_error: None,
        }
    }

    /// Records a timeline mutation.
    ///
    /// Non-recordable mutations (intermediate drag states) never start the
    /// timer; they only refresh the snapshot of a job that is already pending.
    pub fn notify(&mut self, timeline: &Timeline, should_record: bool, now: Instant) {
        let snapshot = timeline.segments().to_vec();
        if should_record {
            let due = now + self.debounce;
            debug!(segment_count = snapshot.len(), "save scheduled");
            self.pending = Some(PersistenceJob { snapshot, due });
        } else if let Some(job) = self.pending.as_mut() {
            job.snapshot = snapshot;
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|job| job.due)
    }

    /// Issues the pending save once its quiet period has passed.
    pub fn poll(&mut self, now: Instant) -> Option<SaveRequest> {
        if self.pending.as_ref().is_some_and(|job| job.due <= now) {
            return self.flush();
        }
        None
    }

    /// Issues the pending save immediately, if any.
    pub fn flush(&mut self) -> Option<SaveRequest> {
        let job = self.pending.take()?;
        self.issued_generation += 1;
        if let Some(superseded) = self.in_flight.replace(self.issued_generation) {
            debug!(superseded, "newer save supersedes in-flight request");
        }
        info!(
            generation = self.issued_generation,
            segment_count = job.snapshot.len(),
            "save issued"
        );
        Some(SaveRequest {
            generation: self.issued_generation,
            payload: ChapterPayload::from_segments(&job.snapshot),
        })
    }

    /// Applies the outcome of a save. Outcomes of superseded saves are dropped.
    pub fn complete(
        &mut self,
        generation: u64,
        outcome: std::result::Result<SaveReceipt, String>,
    ) -> Option<SaveStatus> {
        if self.in_flight != Some(generation) {
            debug!(generation, current = ?self.in_flight, "stale save outcome ignored");
            return None;
        }
        self.in_flight = None;

        match outcome {
            Ok(receipt) => {
                info!(generation, remote = receipt.remote, "chapters saved");
                self.last_saved = Some(receipt.updated_at);
                self.last_error = None;
                Some(SaveStatus::Saved {
                    at: receipt.updated_at,
                    remote: receipt.remote,
                })
            }
            Err(message) => {
                warn!(generation, %message, "saving chapters failed");
                self.last_error = Some(message.clone());
                Some(SaveStatus::Failed { message })
            }
        }
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }
}
