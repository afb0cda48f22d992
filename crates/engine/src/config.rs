use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::time::millis_to_tl;

/// Minimum chapter length: 0.5s.
pub const MIN_SEGMENT_DURATION_MS: u64 = 500;
/// Distance within which a dragged edge sticks to its neighbor: 0.3s.
pub const SNAP_THRESHOLD_MS: u64 = 300;
/// Smallest available length the gap calculator reports: 0.1s.
pub const GAP_REPORT_FLOOR_MS: u64 = 100;
/// Quiet period before a recordable edit is saved.
pub const SAVE_DEBOUNCE_MS: u64 = 1_000;

/// Engine tunables.
///
/// Every field has a default, so a config file only needs the keys it changes.
///
/// # Example
/// ```
/// use chapter_engine::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "snap_threshold_ms": 150 }"#)
///     .expect("valid config");
/// assert_eq!(config.snap_threshold_ms, 150);
/// assert_eq!(config.save_debounce_ms, 1_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_segment_duration_ms: u64,
    pub snap_threshold_ms: u64,
    pub gap_report_floor_ms: u64,
    pub boundary_epsilon_ms: u64,
    pub save_debounce_ms: u64,
    /// Delays after a boundary pause at which the boundary seek is re-asserted.
    pub reseek_delays_ms: Vec<u64>,
    /// Corrective reseeks stop after this window.
    pub reseek_window_ms: u64,
    pub click_suppression_ms: u64,
    pub default_segment_length_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_segment_duration_ms: MIN_SEGMENT_DURATION_MS,
            snap_threshold_ms: SNAP_THRESHOLD_MS,
            gap_report_floor_ms: GAP_REPORT_FLOOR_MS,
            boundary_epsilon_ms: 1,
            save_debounce_ms: SAVE_DEBOUNCE_MS,
            reseek_delays_ms: vec![10, 20, 50, 100, 200],
            reseek_window_ms: 300,
            click_suppression_ms: 200,
            default_segment_length_ms: 10_000,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn edit_limits(&self) -> EditLimits {
        EditLimits {
            min_segment_tl: millis_to_tl(self.min_segment_duration_ms).max(1),
            snap_threshold_tl: millis_to_tl(self.snap_threshold_ms),
            gap_report_floor_tl: millis_to_tl(self.gap_report_floor_ms),
        }
    }

    pub fn boundary_epsilon_tl(&self) -> i64 {
        millis_to_tl(self.boundary_epsilon_ms)
    }

    pub fn default_segment_length_tl(&self) -> i64 {
        millis_to_tl(self.default_segment_length_ms)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn reseek_delays(&self) -> Vec<Duration> {
        self.reseek_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    pub fn reseek_window(&self) -> Duration {
        Duration::from_millis(self.reseek_window_ms)
    }

    pub fn click_suppression(&self) -> Duration {
        Duration::from_millis(self.click_suppression_ms)
    }
}

/// Edit limits in timeline ticks, derived from [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditLimits {
    pub min_segment_tl: i64,
    pub snap_threshold_tl: i64,
    pub gap_report_floor_tl: i64,
}

impl Default for EditLimits {
    fn default() -> Self {
        EngineConfig::default().edit_limits()
    }
}
