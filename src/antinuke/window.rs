//! Sliding-window event counter and its policy configuration.
//!
//! Tracks per-actor, per-event-type activity inside a trailing time window
//! and reports threshold breaches as [`Trip`]s. Event types are an open
//! vocabulary (plain strings), so new detectors can be wired in without
//! touching this module.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Per-event-type trip thresholds.
///
/// A threshold of 0 means "never trips" for that event type. Ordered map so
/// trip emission order is deterministic.
pub type Thresholds = std::collections::BTreeMap<String, u64>;

/// Enforcement action applied when any event type trips for an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripAction {
    Quarantine,
    Ban,
    Timeout,
    Mute,
    Warn,
    Delete,
    Log,
}

impl TripAction {
    /// Parse the lowercase wire name of an action.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quarantine" => Some(Self::Quarantine),
            "ban" => Some(Self::Ban),
            "timeout" => Some(Self::Timeout),
            "mute" => Some(Self::Mute),
            "warn" => Some(Self::Warn),
            "delete" => Some(Self::Delete),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quarantine => "quarantine",
            Self::Ban => "ban",
            Self::Timeout => "timeout",
            Self::Mute => "mute",
            Self::Warn => "warn",
            Self::Delete => "delete",
            Self::Log => "log",
        }
    }
}

/// Anti-nuke policy document, mirroring the JSON config file shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiNukeConfig {
    /// Master switch; when false no counter is constructed.
    pub enabled: bool,
    /// Sliding window length in milliseconds. Must be > 0.
    pub window_ms: u64,
    /// Event-type → trip threshold.
    pub thresholds: Thresholds,
    /// Action applied uniformly whenever any event type trips.
    pub action_on_trip: TripAction,
    /// Duration parameter, only meaningful when `action_on_trip` is timeout.
    pub timeout_seconds: u64,
}

/// A threshold breach for one (actor, event type) pair.
///
/// Transient: produced by [`SlidingWindowCounter::evaluate`], never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub actor_id: String,
    pub event_type: String,
    pub count: u64,
    pub threshold: u64,
}

/// Policy validation failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("config must be a JSON object")]
    NotAnObject,
    #[error("Required field `{0}` is missing")]
    Required(String),
    #[error("`{field}` {message}")]
    Invalid { field: String, message: String },
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}

fn require<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<&'a Value, ValidationError> {
    obj.get(field)
        .ok_or_else(|| ValidationError::Required(field.to_string()))
}

fn int_field(obj: &serde_json::Map<String, Value>, field: &str) -> Result<i64, ValidationError> {
    require(obj, field)?
        .as_i64()
        .ok_or_else(|| invalid(field, "must be an integer"))
}

/// Validate an untyped policy document into a typed [`AntiNukeConfig`].
///
/// No defaulting happens here: a partial document fails with a field-specific
/// error rather than being silently completed.
pub fn validate_config(value: &Value) -> Result<AntiNukeConfig, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let enabled = require(obj, "enabled")?
        .as_bool()
        .ok_or_else(|| invalid("enabled", "must be a boolean"))?;

    let window_ms = int_field(obj, "windowMs")?;
    if window_ms <= 0 {
        return Err(invalid("windowMs", "must be greater than 0"));
    }

    let raw_thresholds = require(obj, "thresholds")?
        .as_object()
        .ok_or_else(|| invalid("thresholds", "must be an object"))?;
    let mut thresholds = Thresholds::new();
    for (event_type, v) in raw_thresholds {
        let n = v
            .as_i64()
            .ok_or_else(|| invalid(format!("thresholds.{event_type}"), "must be an integer"))?;
        if n < 0 {
            return Err(invalid(
                format!("thresholds.{event_type}"),
                "must be nonnegative",
            ));
        }
        thresholds.insert(event_type.clone(), n as u64);
    }

    let raw_action = require(obj, "actionOnTrip")?
        .as_str()
        .ok_or_else(|| invalid("actionOnTrip", "must be a string"))?;
    let action_on_trip = TripAction::parse(raw_action).ok_or_else(|| {
        invalid(
            "actionOnTrip",
            "must be one of quarantine, ban, timeout, mute, warn, delete, log",
        )
    })?;

    let timeout_seconds = int_field(obj, "timeoutSeconds")?;
    if timeout_seconds < 0 {
        return Err(invalid("timeoutSeconds", "must be nonnegative"));
    }

    Ok(AntiNukeConfig {
        enabled,
        window_ms: window_ms as u64,
        thresholds,
        action_on_trip,
        timeout_seconds: timeout_seconds as u64,
    })
}

/// Build a counter from an already-validated config.
///
/// Re-checks the one constraint the type system cannot carry (`windowMs > 0`)
/// so a counter is never constructed with a degenerate window. The thresholds
/// map is copied; later mutation of the source config does not affect a live
/// counter.
pub fn make_counter_from_config(
    cfg: &AntiNukeConfig,
) -> Result<SlidingWindowCounter, ValidationError> {
    if cfg.window_ms == 0 {
        return Err(invalid("windowMs", "must be greater than 0"));
    }
    Ok(SlidingWindowCounter::new(
        cfg.window_ms,
        cfg.thresholds.clone(),
    ))
}

/// Per-event-type timestamp buckets for one actor.
type ActorBuckets = HashMap<String, Vec<u64>>;

/// In-memory sliding-window counter keyed by (actor, event type).
///
/// Buckets live in a concurrent map so recording can happen from any handler
/// without an outer lock; stale entries are pruned lazily on every access to
/// the touched bucket, never by a background timer.
pub struct SlidingWindowCounter {
    window_ms: u64,
    thresholds: Thresholds,
    buckets: DashMap<String, ActorBuckets>,
}

/// Drop the prefix of entries older than `cutoff`.
///
/// Walks from the front and stops at the first in-window entry, which is
/// amortized O(1) when timestamps arrive in non-decreasing order. Callers are
/// expected to supply monotonic `now` values per (actor, event type); a
/// bucket with out-of-order inserts may retain stale entries behind a fresh
/// head until they age past a later cutoff.
fn prune(bucket: &mut Vec<u64>, cutoff: u64) {
    let stale = bucket.iter().take_while(|&&ts| ts < cutoff).count();
    if stale > 0 {
        bucket.drain(..stale);
    }
}

impl SlidingWindowCounter {
    pub fn new(window_ms: u64, thresholds: Thresholds) -> Self {
        Self {
            window_ms,
            thresholds,
            buckets: DashMap::new(),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Record one event at `now` (epoch ms) for (actor, event type).
    ///
    /// Prunes entries older than `now - windowMs` from the touched bucket
    /// before appending. `now` values are expected to be non-decreasing per
    /// bucket (see [`prune`]); the cutoff is derived from the provided `now`,
    /// not a global clock.
    pub fn record(&self, event_type: &str, actor_id: &str, now: u64) {
        let cutoff = now.saturating_sub(self.window_ms);
        let mut by_event = self.buckets.entry(actor_id.to_string()).or_default();
        let bucket = by_event.entry(event_type.to_string()).or_default();
        prune(bucket, cutoff);
        bucket.push(now);
    }

    /// Current in-window counts per event type for an actor.
    ///
    /// Pruning mutates the stored buckets, so repeated calls with the same
    /// `now` are idempotent. An event at exactly `now - windowMs` survives;
    /// anything strictly older is dropped.
    pub fn counts(&self, actor_id: &str, now: u64) -> HashMap<String, u64> {
        let mut out = HashMap::new();
        let Some(mut by_event) = self.buckets.get_mut(actor_id) else {
            return out;
        };
        let cutoff = now.saturating_sub(self.window_ms);
        for (event_type, bucket) in by_event.iter_mut() {
            prune(bucket, cutoff);
            out.insert(event_type.clone(), bucket.len() as u64);
        }
        out
    }

    /// Check every configured threshold against the actor's current counts.
    ///
    /// Emits one [`Trip`] per event type whose count meets or exceeds a
    /// threshold > 0, in threshold-map iteration order. Event types without a
    /// configured threshold never trip regardless of count.
    pub fn evaluate(&self, actor_id: &str, now: u64) -> Vec<Trip> {
        let counts = self.counts(actor_id, now);
        let mut trips = Vec::new();
        for (event_type, &threshold) in &self.thresholds {
            let count = counts.get(event_type).copied().unwrap_or(0);
            if threshold > 0 && count >= threshold {
                trips.push(Trip {
                    actor_id: actor_id.to_string(),
                    event_type: event_type.clone(),
                    count,
                    threshold,
                });
            }
        }
        trips
    }

    /// Record one event, then evaluate the actor against policy.
    ///
    /// The canonical entry point for ingesting a live event.
    pub fn record_and_evaluate(&self, event_type: &str, actor_id: &str, now: u64) -> Vec<Trip> {
        self.record(event_type, actor_id, now);
        self.evaluate(actor_id, now)
    }
}
