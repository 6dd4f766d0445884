//! Best-effort analytics events.
//!
//! Recording is fire-and-forget: a sink failure is logged and never surfaced
//! to the request path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl AnalyticsEvent {
    pub fn new(name: &str, user_id: &str, payload: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            user_id: user_id.to_string(),
            at: Utc::now(),
            payload,
        }
    }
}

pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: AnalyticsEvent) -> anyhow::Result<()>;
}

/// Sink that writes events to the log stream. Default for the daemon and
/// the CLI.
pub struct LogAnalyticsSink;

impl AnalyticsSink for LogAnalyticsSink {
    fn record(&self, event: AnalyticsEvent) -> anyhow::Result<()> {
        log::info!(
            "analytics event={} user={} payload={}",
            event.name,
            event.user_id,
            event.payload
        );
        Ok(())
    }
}

/// Record an event, swallowing sink failures with a warning.
pub fn record_best_effort(sink: &dyn AnalyticsSink, event: AnalyticsEvent) {
    let name = event.name.clone();
    if let Err(err) = sink.record(event) {
        log::warn!("analytics sink failed for event {}: {:?}", name, err);
    }
}
