use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::VerifyResult;
use crate::messages::{render_applicant, render_failure};
use crate::reporter::{self, Notifier};
use crate::state::{Checkpoint, PollerStats};
use crate::types::{ApplicationEvent, CycleReport, NoticeKind};
use crate::verifier::Verifier;

/// Watches the registry for new applications and announces each one.
///
/// The checkpoint is advanced before a range's events are processed, so an
/// event is handled at most once per process lifetime; a crash mid-range
/// drops the remaining events rather than repeating them.
pub struct ApplicantPoller {
    verifier: Arc<Verifier>,
    notifier: Arc<dyn Notifier>,
    checkpoint: Checkpoint,
    stats: PollerStats,
    interval: Duration,
    max_block_range: u64,
}

/// Blocks requested per `eth_getLogs` call unless configured otherwise.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 2000;

impl ApplicantPoller {
    pub fn new(
        verifier: Arc<Verifier>,
        notifier: Arc<dyn Notifier>,
        start_block: u64,
        interval: Duration,
    ) -> Self {
        Self {
            verifier,
            notifier,
            checkpoint: Checkpoint::new(start_block),
            stats: PollerStats::default(),
            interval,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
        }
    }

    /// Cap the blocks requested per range query. Zero is treated as one.
    pub fn with_max_block_range(mut self, blocks: u64) -> Self {
        self.max_block_range = blocks.max(1);
        self
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn stats(&self) -> &PollerStats {
        &self.stats
    }

    /// Poll until `shutdown` turns true (or its sender is dropped).
    ///
    /// Shutdown is only observed between cycles; a cycle in progress runs
    /// to completion.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PollerStats {
        info!(
            "Entering polling loop from block {} (interval: {}s)",
            self.checkpoint.next_block(),
            self.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_cycle().await;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(
            "Poller stopped at block {}",
            self.checkpoint.last_checked_block()
        );
        self.stats
    }

    /// One cycle with errors logged and counted instead of returned.
    pub async fn run_cycle(&mut self) {
        match self.poll_cycle().await {
            Ok(Some(report)) => reporter::report_cycle(&report),
            Ok(None) => debug!("No new blocks"),
            Err(e) => {
                warn!("Poll cycle error: {e}");
                self.stats.record_failure();
            }
        }
    }

    /// Scan new blocks and notify once per application found.
    ///
    /// The pending range is queried in chunks of at most `max_block_range`
    /// blocks, and the checkpoint advances after each chunk is fetched.
    /// Returns `Ok(None)` when the head has not moved past the checkpoint.
    /// A head failure, or a failure on the first chunk, leaves the
    /// checkpoint untouched; a later chunk failure ends the cycle early with
    /// the chunks already handled.
    pub async fn poll_cycle(&mut self) -> VerifyResult<Option<CycleReport>> {
        let registry = self.verifier.registry().clone();
        let head = registry.head_height().await?;
        let Some((from_block, _)) = self.checkpoint.pending_range(head) else {
            return Ok(None);
        };

        let mut to_block = from_block;
        let mut event_count = 0;
        let mut notices = Vec::new();
        while let Some((chunk_from, chunk_to)) = self.next_chunk(head) {
            let events = match registry.query_range(chunk_from, chunk_to).await {
                Ok(events) => events,
                Err(e) if chunk_from == from_block => return Err(e),
                Err(e) => {
                    warn!("Stopping at block {to_block}, range query failed: {e}");
                    break;
                }
            };
            self.checkpoint.advance(chunk_to);
            to_block = chunk_to;

            if !events.is_empty() {
                info!(
                    "Detected {} new application(s) in blocks {chunk_from}..={chunk_to}",
                    events.len()
                );
            }
            event_count += events.len();
            for event in &events {
                notices.push(self.process_event(event).await);
            }
        }

        let report = CycleReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            from_block,
            to_block,
            events: event_count,
            notices,
        };
        self.stats.record_cycle(&report);
        Ok(Some(report))
    }

    fn next_chunk(&self, head: u64) -> Option<(u64, u64)> {
        self.checkpoint.pending_range(head).map(|(from, to)| {
            let capped = from.saturating_add(self.max_block_range - 1);
            (from, to.min(capped))
        })
    }

    /// Check one application and send exactly one notification for it.
    async fn process_event(&self, event: &ApplicationEvent) -> NoticeKind {
        self.notifier.indicate_activity().await;
        let (kind, text) = match self.verifier.check_applicant(event).await {
            Ok(check) => render_applicant(event, &check),
            Err(e) => {
                warn!(
                    "Failed to check application #{} by {}: {e}",
                    event.proposal_id, event.username
                );
                (NoticeKind::Failure, render_failure(event, &e.to_string()))
            }
        };
        self.notifier.send(&text).await;
        kind
    }
}
