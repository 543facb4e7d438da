//! Vigil - moderation/automation bot scaffold.
//!
//! Core is the anti-nuke subsystem: a sliding-window event counter that
//! trips configurable thresholds and dispatches enforcement actions. A small
//! HTTP control plane exposes status, reload, and event ingestion.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration and policy file loading
//! - `antinuke` - Sliding-window counter and the live policy service
//! - `enforce` - Action pipeline (log-only in this scaffold)
//! - `guardian` - File-based panic kill switch
//! - `http` - axum control plane
//! - `utils` - Audit events, token-bucket rate limiting

mod antinuke;
mod config;
mod enforce;
mod guardian;
mod http;
mod utils;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use antinuke::AntiNukeService;
use config::Config;
use guardian::PanicLock;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Vigil...");

    let config = Config::from_env();
    info!(env = %config.app_env, port = config.http_port, "Configuration loaded");

    // Safe boot: a bad or missing policy file degrades to disabled
    // enforcement instead of crashing.
    let antinuke = Arc::new(AntiNukeService::init(config.antinuke_config_path.clone()));
    let status = antinuke.status();
    info!(
        enabled = status.enabled,
        counter_ready = status.counter_ready,
        path = %status.file_path,
        "Anti-nuke service initialized"
    );

    let panic = Arc::new(PanicLock::new(config.panic_lock_path.clone()));
    if panic.is_active() {
        info!(path = %panic.path().display(), "panic lock is ACTIVE");
    }

    let state = http::AppState::new(config.app_env.clone(), antinuke, panic);
    http::serve(state, config.http_port).await
}
