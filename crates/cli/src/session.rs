use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chapter_engine::{
    ChapterEntry, ChapterPayload, Command, Engine, EngineErrorEvent, Event, SaveReceipt,
    SaveRequest,
};
use chapters_http::ChapterClient;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::script::{ScriptLine, parse_line};

type SaveOutcome = (u64, std::result::Result<SaveReceipt, String>);

/// Where save requests go.
#[derive(Debug, Clone)]
pub enum SaveSink {
    Remote {
        client: ChapterClient,
        media_id: String,
    },
    /// Overwrites a local file with the latest chapter list.
    File(PathBuf),
    Discard,
}

impl SaveSink {
    async fn save(&self, payload: &ChapterPayload) -> std::result::Result<SaveReceipt, String> {
        match self {
            Self::Remote { client, media_id } => client
                .save_chapters(media_id, payload)
                .await
                .map_err(|err| err.to_string()),
            Self::File(path) => {
                let json = serde_json::to_vec_pretty(payload).map_err(|err| err.to_string())?;
                tokio::fs::write(path, json)
                    .await
                    .map_err(|err| format!("failed to write {}: {err}", path.display()))?;
                Ok(SaveReceipt {
                    updated_at: Utc::now(),
                    remote: false,
                })
            }
            Self::Discard => {
                debug!(chapter_count = payload.chapters.len(), "save discarded");
                Ok(SaveReceipt {
                    updated_at: Utc::now(),
                    remote: false,
                })
            }
        }
    }
}

/// Runs saves one at a time. A request queued while another is being written
/// replaces any request still waiting, so only the newest one follows.
async fn run_save_worker<F, Fut>(
    save: F,
    mut requests: watch::Receiver<Option<SaveRequest>>,
    outcomes: mpsc::UnboundedSender<SaveOutcome>,
) where
    F: Fn(ChapterPayload) -> Fut,
    Fut: Future<Output = std::result::Result<SaveReceipt, String>>,
{
    while requests.changed().await.is_ok() {
        let Some(request) = requests.borrow_and_update().clone() else {
            continue;
        };
        debug!(generation = request.generation, "saving chapters");
        let outcome = save(request.payload).await;
        if outcomes.send((request.generation, outcome)).is_err() {
            return;
        }
    }
}

/// Drives one engine from a script, firing its timers and dispatching saves.
pub struct Session {
    engine: Engine,
    sink: Arc<SaveSink>,
    save_tx: Option<watch::Sender<Option<SaveRequest>>>,
    outcome_tx: mpsc::UnboundedSender<SaveOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<SaveOutcome>,
    awaiting_generation: Option<u64>,
}

impl Session {
    pub fn new(engine: Engine, sink: SaveSink) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            sink: Arc::new(sink),
            save_tx: None,
            outcome_tx,
            outcome_rx,
            awaiting_generation: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Starts the timeline from an existing chapter list.
    pub fn load(&mut self, duration_tl: i64, chapters: Vec<ChapterEntry>) -> Result<()> {
        let events = self
            .engine
            .handle_command(
                Command::Load {
                    duration_tl,
                    chapters,
                },
                Instant::now(),
            )
            .context("failed to load timeline")?;
        self.handle_events(events);
        Ok(())
    }

    /// Runs the script until it ends, then closes the session and waits for
    /// outstanding saves. Returns the final chapter list.
    pub async fn run<R>(&mut self, input: R) -> Result<ChapterPayload>
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(input).lines();
        let mut input_open = true;
        let mut resume_at: Option<Instant> = None;

        while input_open || resume_at.is_some() {
            let timer = self.engine.next_deadline();
            tokio::select! {
                line = lines.next_line(), if input_open && resume_at.is_none() => {
                    match line.context("failed to read script")? {
                        Some(text) => match parse_line(&text) {
                            Ok(Some(ScriptLine::Engine(command))) => self.dispatch(command),
                            Ok(Some(ScriptLine::Wait(pause))) => {
                                resume_at = Some(Instant::now() + pause);
                            }
                            Ok(Some(ScriptLine::Quit)) => input_open = false,
                            Ok(None) => {}
                            Err(err) => warn!(line = %text, "skipping script line: {err:#}"),
                        },
                        None => input_open = false,
                    }
                }
                () = sleep_until(resume_at), if resume_at.is_some() => resume_at = None,
                () = sleep_until(timer), if timer.is_some() => {
                    let events = self.engine.poll(Instant::now());
                    self.handle_events(events);
                }
                Some(outcome) = self.outcome_rx.recv() => self.finish_save(outcome),
            }
        }

        let payload = self
            .engine
            .timeline()
            .map(|timeline| ChapterPayload::from_segments(timeline.segments()))
            .unwrap_or(ChapterPayload {
                chapters: Vec::new(),
            });
        self.dispatch(Command::Close);
        self.drain_saves().await;
        Ok(payload)
    }

    fn dispatch(&mut self, command: Command) {
        match self.engine.handle_command(command, Instant::now()) {
            Ok(events) => self.handle_events(events),
            Err(error) => self.handle_events(vec![Event::Error(EngineErrorEvent::from_error(
                &error,
            ))]),
        }
    }

    fn handle_events(&mut self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::TimelineChanged { snapshot, record } => {
                    info!(
                        segment_count = snapshot.segments.len(),
                        gap_count = snapshot.gaps.len(),
                        record,
                        "timeline changed"
                    );
                    for segment in &snapshot.segments {
                        debug!(
                            id = segment.id,
                            label = %segment.label,
                            start_tl = segment.start_tl,
                            end_tl = segment.end_tl,
                            "segment"
                        );
                    }
                }
                Event::PlaybackContextChanged(context) => info!(?context, "playback context"),
                Event::Playback(action) => info!(?action, "player instruction"),
                Event::SaveRequested(request) => self.queue_save(request),
                Event::SaveSucceeded { at, remote } => info!(%at, remote, "save confirmed"),
                Event::SaveFailed(error) => warn!(message = %error.message, "save failed"),
                Event::Closed => debug!("session closed"),
                Event::Error(error) => {
                    warn!(kind = ?error.kind, message = %error.message, "command rejected");
                }
            }
        }
    }

    fn queue_save(&mut self, request: SaveRequest) {
        let generation = request.generation;
        let save_tx = self.save_tx.get_or_insert_with(|| {
            let (save_tx, save_rx) = watch::channel(None);
            let sink = Arc::clone(&self.sink);
            let save = move |payload: ChapterPayload| {
                let sink = Arc::clone(&sink);
                async move { sink.save(&payload).await }
            };
            tokio::spawn(run_save_worker(save, save_rx, self.outcome_tx.clone()));
            save_tx
        });
        if save_tx.send(Some(request)).is_err() {
            warn!(generation, "save worker stopped; request dropped");
            return;
        }
        if let Some(superseded) = self.awaiting_generation.replace(generation) {
            debug!(superseded, generation, "newer save supersedes a queued one");
        }
    }

    fn finish_save(&mut self, (generation, outcome): SaveOutcome) {
        if self.awaiting_generation == Some(generation) {
            self.awaiting_generation = None;
        }
        self.dispatch(Command::SaveFinished {
            generation,
            outcome,
        });
    }

    async fn drain_saves(&mut self) {
        while self.awaiting_generation.is_some() {
            let Some(outcome) = self.outcome_rx.recv().await else {
                break;
            };
            self.finish_save(outcome);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Reads a `{"chapters": [...]}` file.
pub fn read_chapters(path: &std::path::Path) -> Result<Vec<ChapterEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let payload: ChapterPayload = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(payload.chapters)
}

/// Builds the save sink from the command line.
pub fn save_sink(
    base_url: Option<&str>,
    media_id: &str,
    output: Option<PathBuf>,
    timeout: Duration,
) -> Result<SaveSink> {
    if let Some(base_url) = base_url {
        let client = ChapterClient::new(base_url, timeout)?;
        return Ok(SaveSink::Remote {
            client,
            media_id: media_id.to_string(),
        });
    }
    Ok(output.map_or(SaveSink::Discard, SaveSink::File))
}
