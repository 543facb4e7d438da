//! Live anti-nuke state for the process.
//!
//! Holds the single `(config, counter)` snapshot, supports reload from disk,
//! and reports status. Reload builds a complete new snapshot before
//! publishing it, so readers see either the fully-old or fully-new state.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::antinuke::{load_antinuke_config, safe_load_antinuke_config, LoadError};

use super::window::{
    make_counter_from_config, AntiNukeConfig, SlidingWindowCounter, Thresholds, Trip, TripAction,
};

/// One fully-constructed generation of anti-nuke state.
struct Snapshot {
    file_path: PathBuf,
    loaded_at: DateTime<Utc>,
    config: AntiNukeConfig,
    /// None when the policy is disabled or invalid.
    counter: Option<SlidingWindowCounter>,
}

impl Snapshot {
    fn build(file_path: PathBuf, config: AntiNukeConfig) -> Self {
        // make_counter_from_config re-validates the window; a config that
        // fails here yields a snapshot without a counter rather than a
        // counter with undefined behavior.
        let counter = if config.enabled {
            match make_counter_from_config(&config) {
                Ok(counter) => Some(counter),
                Err(e) => {
                    warn!(err = %e, path = %file_path.display(), "antinuke counter not built");
                    None
                }
            }
        } else {
            None
        };
        Self {
            file_path,
            loaded_at: Utc::now(),
            config,
            counter,
        }
    }
}

/// Status report, as served by `GET /antinuke/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiNukeStatus {
    pub file_path: String,
    /// ISO-8601 timestamp of the last successful load.
    pub loaded_at: String,
    pub enabled: bool,
    pub window_ms: u64,
    pub thresholds: Thresholds,
    pub action_on_trip: TripAction,
    pub timeout_seconds: u64,
    pub counter_ready: bool,
}

/// Owns the live anti-nuke snapshot for the process.
pub struct AntiNukeService {
    state: RwLock<Arc<Snapshot>>,
}

impl AntiNukeService {
    /// Safe boot: if the policy file is invalid or missing, fall back to the
    /// disabled config so the process still runs.
    pub fn init(file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let config = safe_load_antinuke_config(&file_path);
        Self {
            state: RwLock::new(Arc::new(Snapshot::build(file_path, config))),
        }
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read())
    }

    pub fn status(&self) -> AntiNukeStatus {
        let snap = self.snapshot();
        AntiNukeStatus {
            file_path: snap.file_path.display().to_string(),
            loaded_at: snap.loaded_at.to_rfc3339(),
            enabled: snap.config.enabled,
            window_ms: snap.config.window_ms,
            thresholds: snap.config.thresholds.clone(),
            action_on_trip: snap.config.action_on_trip,
            timeout_seconds: snap.config.timeout_seconds,
            counter_ready: snap.counter.is_some(),
        }
    }

    /// Ingest one event and return trips together with the policy that was
    /// in force for them.
    ///
    /// Reads a single snapshot, so a concurrent reload can never pair trips
    /// from one policy generation with the action or window of another.
    pub fn ingest(&self, event_type: &str, actor_id: &str, now: u64) -> Evaluation {
        let snap = self.snapshot();
        let trips = match &snap.counter {
            Some(counter) => counter.record_and_evaluate(event_type, actor_id, now),
            None => Vec::new(),
        };
        Evaluation {
            trips,
            action: snap.config.action_on_trip,
            timeout_seconds: snap.config.timeout_seconds,
            window_ms: snap.config.window_ms,
        }
    }

    /// Reload from disk, optionally from a different path.
    ///
    /// Strict: reload is an explicit operator action, so failures propagate
    /// instead of silently disabling. On success the whole snapshot is
    /// replaced in one step and the new status returned.
    pub fn reload(&self, file_path: Option<PathBuf>) -> Result<AntiNukeStatus, LoadError> {
        let resolved = file_path.unwrap_or_else(|| self.snapshot().file_path.clone());
        let config = load_antinuke_config(&resolved)?;

        let next = Arc::new(Snapshot::build(resolved.clone(), config));
        *self.state.write() = next;

        info!(path = %resolved.display(), enabled = self.snapshot().config.enabled, "antinuke config reloaded");
        Ok(self.status())
    }

    /// Ingest one event and check policy.
    ///
    /// Returns no trips when enforcement is disabled or no counter is live.
    pub fn record_and_evaluate(&self, event_type: &str, actor_id: &str, now: u64) -> Vec<Trip> {
        self.ingest(event_type, actor_id, now).trips
    }
}

/// Result of [`AntiNukeService::ingest`]: trips plus the policy of the
/// snapshot that produced them.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub trips: Vec<Trip>,
    pub action: TripAction,
    pub timeout_seconds: u64,
    pub window_ms: u64,
}
