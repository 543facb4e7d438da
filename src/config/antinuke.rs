//! Anti-nuke policy file loading.
//!
//! Strict loading for operator-driven reloads (errors propagate) and a safe
//! variant for bootstrap that falls back to a fully-disabled policy so the
//! process still comes up on a bad or missing file.

use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::warn;

use crate::antinuke::window::{validate_config, AntiNukeConfig, Thresholds, TripAction, ValidationError};

/// Default policy file location, relative to the working directory.
pub static DEFAULT_CONFIG_PATH: Lazy<PathBuf> =
    Lazy::new(|| PathBuf::from("data").join("antinuke-config.json"));

/// Strict-load failure.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("antinuke config missing at {0}")]
    Missing(PathBuf),
    #[error("failed to read antinuke config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("antinuke config is not valid JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("antinuke config invalid at {path}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// The fully-disabled fallback policy.
///
/// Used whenever safe loading cannot produce a valid config: enforcement off,
/// no thresholds, log-only action.
pub fn disabled_config() -> AntiNukeConfig {
    AntiNukeConfig {
        enabled: false,
        window_ms: 60_000,
        thresholds: Thresholds::new(),
        action_on_trip: TripAction::Log,
        timeout_seconds: 0,
    }
}

/// Read, parse, and validate the policy file. All failures propagate.
pub fn load_antinuke_config(path: &Path) -> Result<AntiNukeConfig, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            LoadError::Missing(path.to_path_buf())
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let doc: serde_json::Value = serde_json::from_str(&raw).map_err(|e| LoadError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    validate_config(&doc).map_err(|e| LoadError::Schema {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Safe variant for bootstrap: returns the disabled config on any error.
///
/// Logs a clear warning so issues are visible without crashing the process.
pub fn safe_load_antinuke_config(path: &Path) -> AntiNukeConfig {
    match load_antinuke_config(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(err = %e, path = %path.display(), "falling back to disabled antinuke config");
            disabled_config()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    const VALID: &str = r#"{
        "enabled": true,
        "windowMs": 10000,
        "thresholds": { "bans": 3, "channelDeletes": 3 },
        "actionOnTrip": "quarantine",
        "timeoutSeconds": 600
    }"#;

    #[test]
    fn loads_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "antinuke.json", VALID);
        let cfg = load_antinuke_config(&path).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.window_ms, 10_000);
        assert_eq!(cfg.thresholds["bans"], 3);
        assert_eq!(cfg.action_on_trip, TripAction::Quarantine);
        assert_eq!(cfg.timeout_seconds, 600);
    }

    #[test]
    fn missing_file_is_its_own_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_antinuke_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, LoadError::Missing(_)), "got: {err}");
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.json", "{ not json");
        let err = load_antinuke_config(&path).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }), "got: {err}");
    }

    #[test]
    fn schema_violation_mentions_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "partial.json", r#"{ "enabled": true }"#);
        let err = load_antinuke_config(&path).unwrap_err();
        assert!(matches!(err, LoadError::Schema { .. }), "got: {err}");
        assert!(err.to_string().contains("Required"), "got: {err}");
    }

    #[test]
    fn safe_load_falls_back_to_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = safe_load_antinuke_config(&dir.path().join("absent.json"));
        assert_eq!(cfg, disabled_config());
        assert!(!cfg.enabled);
        assert!(cfg.thresholds.is_empty());
        assert_eq!(cfg.action_on_trip, TripAction::Log);
        assert_eq!(cfg.timeout_seconds, 0);
    }

    #[test]
    fn safe_load_passes_through_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "antinuke.json", VALID);
        let cfg = safe_load_antinuke_config(&path);
        assert!(cfg.enabled);
    }
}
