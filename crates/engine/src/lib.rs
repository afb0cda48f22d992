//! UI-agnostic chapter editing engine.
//!
//! Owns the chapter timeline of one media item, boundary-aware playback
//! previews and debounced persistence. Hosts drive it with [`Command`]s and
//! react to the [`Event`]s it returns.

pub mod api;
pub mod chapters;
pub mod config;
pub mod edit;
pub mod error;
pub mod gaps;
pub mod input;
pub mod persist;
pub mod playback;
pub mod time;
pub mod timeline;

pub use api::{Command, Engine, EngineErrorEvent, EngineErrorKind, Event, TimelineSnapshot};
pub use chapters::{ChapterEntry, ChapterPayload, SaveReceipt, SaveResponse};
pub use config::{EditLimits, EngineConfig};
pub use edit::Edge;
pub use error::{EngineError, Result};
pub use gaps::{Gap, GapBounds};
pub use input::DragTarget;
pub use persist::{SaveRequest, SaveStatus};
pub use playback::{PlaybackAction, PlaybackContext, PreviewTarget};
pub use time::{TIMELINE_TIME_BASE, format_timestamp, parse_timestamp};
pub use timeline::{Segment, SegmentId, Timeline};
