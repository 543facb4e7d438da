//! Configuration module for the Vigil scaffold.
//!
//! Process-level settings come from environment variables; the anti-nuke
//! policy itself lives in a JSON file handled by [`antinuke`].

pub mod antinuke;

use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the HTTP control plane.
    pub http_port: u16,

    /// Path to the anti-nuke policy file.
    pub antinuke_config_path: PathBuf,

    /// Path to the guardian panic lock file.
    pub panic_lock_path: PathBuf,

    /// Deployment environment label, reported by `GET /`.
    pub app_env: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable has a default, so this never fails: `PORT` (3000),
    /// `ANTINUKE_CONFIG` (data/antinuke-config.json), `PANIC_LOCK_FILE`
    /// (data/guardian/panic.lock), `APP_ENV` (development).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let http_port = env::var("PORT")
            .ok()
            .and_then(|s| s.trim().parse::<u16>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(3000);

        let antinuke_config_path = env::var("ANTINUKE_CONFIG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| antinuke::DEFAULT_CONFIG_PATH.clone());

        let panic_lock_path = env::var("PANIC_LOCK_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data").join("guardian").join("panic.lock"));

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Self {
            http_port,
            antinuke_config_path,
            panic_lock_path,
            app_env,
        }
    }
}
