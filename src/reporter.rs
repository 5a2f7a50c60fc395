use async_trait::async_trait;
use tracing::info;

use crate::state::PollerStats;
use crate::types::CycleReport;

/// Outward channel for verification messages. Fire-and-forget: delivery
/// failures are logged by the implementation, never returned.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);

    /// Show that work is in progress (typing indicator). Optional.
    async fn indicate_activity(&self) {}
}

/// Prints every message to stdout.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, text: &str) {
        println!("{text}");
    }
}

/// Sends every message to the log at `info` level.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) {
        info!(target: "notify", "{text}");
    }
}

/// Emit a poll cycle report as a single JSON line to stdout.
pub fn report_cycle(report: &CycleReport) {
    if let Ok(json) = serde_json::to_string(report) {
        println!("{json}");
    }
}

/// Log the poller's running totals, typically on shutdown.
pub fn report_stats(stats: &PollerStats) {
    info!(
        "Poller totals: cycles={} failed={} events={} welcomes={} risk_warnings={} mismatches={} event_failures={}",
        stats.total_cycles,
        stats.failed_cycles,
        stats.total_events,
        stats.welcomes,
        stats.risk_warnings,
        stats.mismatches,
        stats.event_failures,
    );
}
