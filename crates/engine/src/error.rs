use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::timeline::SegmentId;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by engine commands and timeline operations.
///
/// Every variant is recoverable: the requested mutation is rejected and the
/// timeline keeps its previous value.
#[derive(Debug)]
pub enum EngineError {
    TimelineNotLoaded,
    InvalidDuration {
        duration_tl: i64,
    },
    SegmentIdNotFound {
        segment_id: SegmentId,
    },
    InsufficientLength {
        segment_id: SegmentId,
        length_tl: i64,
        min_tl: i64,
    },
    Overlap {
        left_id: SegmentId,
        right_id: SegmentId,
    },
    InsufficientSpace {
        at_tl: i64,
        available_tl: i64,
    },
    OutOfRange {
        segment_id: SegmentId,
        at_tl: i64,
    },
    InputLocked,
    PersistenceFailure {
        message: String,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimelineNotLoaded => write!(f, "timeline is not loaded"),
            Self::InvalidDuration { duration_tl } => {
                write!(f, "timeline duration must be positive: {duration_tl}")
            }
            Self::SegmentIdNotFound { segment_id } => {
                write!(f, "segment not found: {segment_id}")
            }
            Self::InsufficientLength {
                segment_id,
                length_tl,
                min_tl,
            } => write!(
                f,
                "segment {segment_id} is too short: {length_tl} < {min_tl} ticks"
            ),
            Self::Overlap { left_id, right_id } => {
                write!(f, "segments {left_id} and {right_id} overlap")
            }
            Self::InsufficientSpace {
                at_tl,
                available_tl,
            } => write!(
                f,
                "not enough free space at timeline timestamp {at_tl}: {available_tl} ticks"
            ),
            Self::OutOfRange { segment_id, at_tl } => write!(
                f,
                "timeline timestamp {at_tl} is outside segment {segment_id}"
            ),
            Self::InputLocked => write!(f, "timeline input is captured by an active drag"),
            Self::PersistenceFailure { message } => {
                write!(f, "saving chapters failed: {message}")
            }
            Self::ConfigIo { path, source } => {
                write!(f, "failed to read config {} ({source})", path.display())
            }
            Self::ConfigParse { path, source } => {
                write!(f, "failed to parse config {} ({source})", path.display())
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            _ => None,
        }
    }
}
