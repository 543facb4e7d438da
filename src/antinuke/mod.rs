//! Anti-nuke subsystem.
//!
//! Sliding-window rate counting per (actor, event type) with configurable
//! trip thresholds, plus the service wrapper that owns the live policy.

pub mod service;
pub mod window;

pub use service::{AntiNukeService, AntiNukeStatus, Evaluation};
pub use window::{AntiNukeConfig, SlidingWindowCounter, Trip, TripAction};
