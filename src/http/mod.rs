//! HTTP control plane.
//!
//! Small JSON API over axum: service identity, health, anti-nuke status,
//! policy reload, and the event-ingestion endpoint that feeds the
//! sliding-window counter and dispatches enforcement on trips.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::antinuke::AntiNukeService;
use crate::enforce::{to_action_request, ActionPipeline, EnforcementContext};
use crate::guardian::PanicLock;
use crate::utils::{audit, TokenBucket};

/// Ingestion throttle: per-actor burst of 20, refilling 10/s.
const INGEST_BURST: f64 = 20.0;
const INGEST_REFILL_PER_SEC: f64 = 10.0;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub app_env: String,
    pub antinuke: Arc<AntiNukeService>,
    pub panic: Arc<PanicLock>,
    pub pipeline: ActionPipeline,
    pub ingest_limiter: Arc<TokenBucket>,
}

impl AppState {
    pub fn new(app_env: String, antinuke: Arc<AntiNukeService>, panic: Arc<PanicLock>) -> Self {
        Self {
            app_env,
            antinuke,
            panic,
            pipeline: ActionPipeline::new(),
            ingest_limiter: Arc::new(TokenBucket::new(INGEST_BURST, INGEST_REFILL_PER_SEC)),
        }
    }
}

/// Build the control-plane router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/antinuke/status", get(antinuke_status))
        .route("/antinuke/reload", post(antinuke_reload))
        .route("/antinuke/event", post(antinuke_event))
        .route("/panic/status", get(panic_status))
        .route("/panic/on", post(panic_on))
        .route("/panic/off", post(panic_off))
        .fallback(not_found)
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "http control plane listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(err = %e, "failed to install ctrl-c handler");
        return;
    }
    info!("shutdown signal received");
}

async fn root(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "env": state.app_env,
        })),
    )
}

async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "ok": true, "ts": Utc::now().to_rfc3339() })),
    )
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "error": "not_found" })),
    )
}

async fn panic_status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "ok": true, "panic": state.panic.is_active() })),
    )
}

async fn panic_on(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.panic.engage() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "panic": true,
                "file": state.panic.path().display().to_string(),
            })),
        ),
        Err(e) => internal_error(e.into()),
    }
}

async fn panic_off(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.panic.release() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "panic": false,
                "file": state.panic.path().display().to_string(),
            })),
        ),
        Err(e) => internal_error(e.into()),
    }
}

async fn antinuke_status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match serde_json::to_value(state.antinuke.status()) {
        Ok(status) => (StatusCode::OK, Json(status)),
        Err(e) => internal_error(e.into()),
    }
}

#[derive(Debug, Deserialize)]
struct ReloadRequest {
    path: Option<String>,
}

async fn antinuke_reload(
    State(state): State<AppState>,
    Json(req): Json<ReloadRequest>,
) -> (StatusCode, Json<Value>) {
    match state.antinuke.reload(req.path.map(PathBuf::from)) {
        Ok(status) => match serde_json::to_value(status) {
            Ok(status) => (StatusCode::OK, Json(status)),
            Err(e) => internal_error(e.into()),
        },
        Err(e) => {
            warn!(err = %e, "antinuke reload failed");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest {
    event_type: String,
    actor_id: String,
    /// Epoch milliseconds; defaults to the wall clock.
    now: Option<u64>,
}

async fn antinuke_event(
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> (StatusCode, Json<Value>) {
    if req.event_type.is_empty() || req.actor_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "eventType and actorId are required" })),
        );
    }

    if !state.ingest_limiter.take(&req.actor_id, 1.0) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "ok": false, "error": "rate_limited" })),
        );
    }

    let now = req
        .now
        .unwrap_or_else(|| Utc::now().timestamp_millis().max(0) as u64);

    // One snapshot feeds the whole request, so trips are always paired with
    // the action and window of the policy generation that produced them.
    let eval = state.antinuke.ingest(&req.event_type, &req.actor_id, now);
    let (action, timeout_seconds, window_ms) = (eval.action, eval.timeout_seconds, eval.window_ms);

    for trip in &eval.trips {
        let ctx = EnforcementContext {
            user_id: Some(trip.actor_id.clone()),
            reason: Some(format!(
                "Anti-Nuke: {}={} in {}ms (limit={})",
                trip.event_type, trip.count, window_ms, trip.threshold
            )),
            ..Default::default()
        };
        state.pipeline.dispatch(&to_action_request(action, ctx, timeout_seconds));
        audit(
            "antinuke",
            "trip",
            json!({
                "actorId": trip.actor_id,
                "eventType": trip.event_type,
                "count": trip.count,
                "threshold": trip.threshold,
                "action": action.as_str(),
            }),
        );
        warn!(
            actor_id = %trip.actor_id,
            event_type = %trip.event_type,
            count = trip.count,
            threshold = trip.threshold,
            "anti-nuke tripped"
        );
    }

    match serde_json::to_value(&eval.trips) {
        Ok(trips_json) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "eventType": req.event_type,
                "actorId": req.actor_id,
                "tripped": !eval.trips.is_empty(),
                "trips": trips_json,
            })),
        ),
        Err(e) => internal_error(e.into()),
    }
}

fn internal_error(e: anyhow::Error) -> (StatusCode, Json<Value>) {
    warn!(err = %e, "http handler error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": "internal_error" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn state_with_policy(policy: &str) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(policy.as_bytes()).unwrap();
        let svc = Arc::new(AntiNukeService::init(path));
        let panic = Arc::new(PanicLock::new(dir.path().join("guardian").join("panic.lock")));
        (AppState::new("test".to_string(), svc, panic), dir)
    }

    const POLICY: &str = r#"{
        "enabled": true,
        "windowMs": 1000,
        "thresholds": { "channelCreates": 3 },
        "actionOnTrip": "timeout",
        "timeoutSeconds": 600
    }"#;

    #[tokio::test]
    async fn root_reports_identity() {
        let (state, _dir) = state_with_policy(POLICY);
        let (code, Json(body)) = root(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["name"], "vigil");
        assert_eq!(body["env"], "test");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (code, Json(body)) = health().await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert!(body["ts"].is_string());
    }

    #[tokio::test]
    async fn status_endpoint_reflects_policy() {
        let (state, _dir) = state_with_policy(POLICY);
        let (code, Json(body)) = antinuke_status(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["enabled"], true);
        assert_eq!(body["windowMs"], 1000);
        assert_eq!(body["counterReady"], true);
        assert_eq!(body["actionOnTrip"], "timeout");
        assert_eq!(body["thresholds"]["channelCreates"], 3);
    }

    #[tokio::test]
    async fn event_endpoint_trips_at_threshold() {
        let (state, _dir) = state_with_policy(POLICY);
        let t0: u64 = 1_000_000;

        for (i, expect_trip) in [(0u64, false), (100, false), (200, true)] {
            let (code, Json(body)) = antinuke_event(
                State(state.clone()),
                Json(EventRequest {
                    event_type: "channelCreates".to_string(),
                    actor_id: "user:42".to_string(),
                    now: Some(t0 + i),
                }),
            )
            .await;
            assert_eq!(code, StatusCode::OK);
            assert_eq!(body["tripped"], expect_trip, "at offset {i}");
        }
    }

    #[tokio::test]
    async fn event_endpoint_reports_trip_shape() {
        let (state, _dir) = state_with_policy(POLICY);
        let mut last = None;
        for i in 0..3u64 {
            let (_, Json(body)) = antinuke_event(
                State(state.clone()),
                Json(EventRequest {
                    event_type: "channelCreates".to_string(),
                    actor_id: "user:7".to_string(),
                    now: Some(2_000_000 + i),
                }),
            )
            .await;
            last = Some(body);
        }
        let body = last.unwrap();
        assert_eq!(body["trips"][0]["eventType"], "channelCreates");
        assert_eq!(body["trips"][0]["count"], 3);
        assert_eq!(body["trips"][0]["threshold"], 3);
        assert_eq!(body["trips"][0]["actorId"], "user:7");
    }

    #[tokio::test]
    async fn event_endpoint_requires_fields() {
        let (state, _dir) = state_with_policy(POLICY);
        let (code, Json(body)) = antinuke_event(
            State(state),
            Json(EventRequest {
                event_type: String::new(),
                actor_id: "user:1".to_string(),
                now: None,
            }),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn event_endpoint_rate_limits_per_actor() {
        let (state, _dir) = state_with_policy(POLICY);
        let mut saw_429 = false;
        // Burst far past the bucket capacity within one instant.
        for i in 0..50u64 {
            let (code, _) = antinuke_event(
                State(state.clone()),
                Json(EventRequest {
                    event_type: "kicks".to_string(),
                    actor_id: "noisy".to_string(),
                    now: Some(3_000_000 + i),
                }),
            )
            .await;
            if code == StatusCode::TOO_MANY_REQUESTS {
                saw_429 = true;
            }
        }
        assert!(saw_429);
    }

    #[tokio::test]
    async fn reload_with_bad_path_is_a_client_error() {
        let (state, dir) = state_with_policy(POLICY);
        let (code, Json(body)) = antinuke_reload(
            State(state),
            Json(ReloadRequest {
                path: Some(dir.path().join("absent.json").display().to_string()),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn reload_returns_fresh_status() {
        let (state, dir) = state_with_policy(POLICY);
        let other = dir.path().join("other.json");
        std::fs::write(
            &other,
            r#"{
                "enabled": true,
                "windowMs": 5000,
                "thresholds": { "bans": 1 },
                "actionOnTrip": "ban",
                "timeoutSeconds": 0
            }"#,
        )
        .unwrap();

        let (code, Json(body)) = antinuke_reload(
            State(state),
            Json(ReloadRequest {
                path: Some(other.display().to_string()),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["windowMs"], 5000);
        assert_eq!(body["actionOnTrip"], "ban");
        assert_eq!(body["counterReady"], true);
    }

    #[tokio::test]
    async fn panic_round_trip_through_endpoints() {
        let (state, _dir) = state_with_policy(POLICY);

        let (code, Json(body)) = panic_status(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["panic"], false);

        let (code, Json(body)) = panic_on(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["panic"], true);
        assert!(body["file"].as_str().unwrap().ends_with("panic.lock"));

        let (_, Json(body)) = panic_status(State(state.clone())).await;
        assert_eq!(body["panic"], true);

        let (code, Json(body)) = panic_off(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["panic"], false);

        let (_, Json(body)) = panic_status(State(state)).await;
        assert_eq!(body["panic"], false);
    }

    #[tokio::test]
    async fn panic_off_when_already_off_is_ok() {
        let (state, _dir) = state_with_policy(POLICY);
        let (code, Json(body)) = panic_off(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["panic"], false);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (code, Json(body)) = not_found().await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}
