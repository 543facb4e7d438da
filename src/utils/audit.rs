//! Structured audit events.
//!
//! Audit records go through the normal `tracing` pipeline with a stable
//! shape (id, timestamp, category, action, details) so they can be filtered
//! or shipped off-process by the subscriber configuration.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::info;

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-unique event id, readable in logs.
fn next_event_id() -> String {
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("evt_{:x}_{seq:04x}", Utc::now().timestamp_millis())
}

/// Emit one audit event.
pub fn audit(category: &str, action: &str, details: serde_json::Value) {
    info!(
        audit = true,
        id = %next_event_id(),
        ts = %Utc::now().to_rfc3339(),
        category,
        action,
        details = %details,
        "[audit] {category}.{action}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        let a = next_event_id();
        let b = next_event_id();
        assert_ne!(a, b);
        assert!(a.starts_with("evt_"));
    }

    #[test]
    fn audit_accepts_arbitrary_details() {
        audit(
            "antinuke",
            "trip",
            serde_json::json!({ "actorId": "a", "eventType": "bans", "count": 3 }),
        );
    }
}
