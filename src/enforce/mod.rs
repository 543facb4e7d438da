//! Enforcement action pipeline.
//!
//! Maps a tripped policy action to a discriminated [`ActionRequest`] and
//! dispatches it. Handlers are log-only in the current scaffold; real
//! platform calls slot in behind the same match arms later.

use serde::Serialize;
use tracing::info;

use crate::antinuke::TripAction;

/// Where and against whom an action applies. All fields optional; detectors
/// fill in what they know.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementContext {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
    pub user_id: Option<String>,
    pub reason: Option<String>,
}

/// A concrete enforcement request, one variant per action kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionRequest {
    Delete { ctx: EnforcementContext },
    Warn { ctx: EnforcementContext },
    Timeout { seconds: u64, ctx: EnforcementContext },
    Mute { ctx: EnforcementContext },
    Quarantine { ctx: EnforcementContext },
    Ban { ctx: EnforcementContext },
    Log { ctx: EnforcementContext },
}

/// Map the configured policy action to a request.
///
/// `timeout_seconds` is only consulted for [`TripAction::Timeout`].
pub fn to_action_request(
    action: TripAction,
    ctx: EnforcementContext,
    timeout_seconds: u64,
) -> ActionRequest {
    match action {
        TripAction::Delete => ActionRequest::Delete { ctx },
        TripAction::Warn => ActionRequest::Warn { ctx },
        TripAction::Timeout => ActionRequest::Timeout {
            seconds: timeout_seconds,
            ctx,
        },
        TripAction::Mute => ActionRequest::Mute { ctx },
        TripAction::Quarantine => ActionRequest::Quarantine { ctx },
        TripAction::Ban => ActionRequest::Ban { ctx },
        TripAction::Log => ActionRequest::Log { ctx },
    }
}

/// Dispatches enforcement requests to their handlers.
#[derive(Debug, Clone, Default)]
pub struct ActionPipeline;

impl ActionPipeline {
    pub fn new() -> Self {
        Self
    }

    pub fn dispatch(&self, req: &ActionRequest) {
        match req {
            ActionRequest::Delete { ctx } => log_only("delete", ctx),
            ActionRequest::Warn { ctx } => log_only("warn", ctx),
            ActionRequest::Timeout { seconds, ctx } => {
                info!(action = "timeout", seconds, ?ctx, "enforce (noop)");
            }
            ActionRequest::Mute { ctx } => log_only("mute", ctx),
            ActionRequest::Quarantine { ctx } => log_only("quarantine", ctx),
            ActionRequest::Ban { ctx } => log_only("ban", ctx),
            ActionRequest::Log { ctx } => log_only("log", ctx),
        }
    }
}

fn log_only(action: &str, ctx: &EnforcementContext) {
    info!(action, ?ctx, "enforce (noop)");
}
