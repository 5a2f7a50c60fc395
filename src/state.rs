use crate::types::{CycleReport, NoticeKind};

/// The poller's position in the registry's event log.
///
/// In-memory only: a restart begins again from the configured start block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    last_checked_block: u64,
    /// False until the first range has been scanned, so `start_block`
    /// itself is included once.
    scanned: bool,
}

impl Checkpoint {
    pub fn new(start_block: u64) -> Self {
        Self {
            last_checked_block: start_block,
            scanned: false,
        }
    }

    pub fn last_checked_block(&self) -> u64 {
        self.last_checked_block
    }

    /// First block not yet covered by a scanned range.
    pub fn next_block(&self) -> u64 {
        if self.scanned {
            self.last_checked_block.saturating_add(1)
        } else {
            self.last_checked_block
        }
    }

    /// Block range to scan when the chain head is at `head`, if any.
    pub fn pending_range(&self, head: u64) -> Option<(u64, u64)> {
        let from = self.next_block();
        (head >= from).then_some((from, head))
    }

    /// Mark everything up to `head` as scanned. A head that covers no
    /// unscanned block is ignored, so the checkpoint never moves backwards
    /// and the start block is never skipped.
    pub fn advance(&mut self, head: u64) {
        if head >= self.next_block() {
            self.last_checked_block = head;
            self.scanned = true;
        }
    }
}

/// Running totals across poll cycles.
#[derive(Debug, Clone, Default)]
pub struct PollerStats {
    pub total_cycles: u64,
    pub failed_cycles: u64,
    pub total_events: u64,
    pub welcomes: u64,
    pub risk_warnings: u64,
    pub mismatches: u64,
    pub event_failures: u64,
}

impl PollerStats {
    pub fn record_cycle(&mut self, report: &CycleReport) {
        self.total_cycles += 1;
        self.total_events += report.events as u64;
        for notice in &report.notices {
            match notice {
                NoticeKind::Welcome => self.welcomes += 1,
                NoticeKind::RiskWarning => self.risk_warnings += 1,
                NoticeKind::Mismatch => self.mismatches += 1,
                NoticeKind::Failure => self.event_failures += 1,
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.total_cycles += 1;
        self.failed_cycles += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_range_includes_start_block() {
        let cp = Checkpoint::new(100);
        assert_eq!(cp.pending_range(100), Some((100, 100)));
        assert_eq!(cp.pending_range(150), Some((100, 150)));
        assert_eq!(cp.pending_range(99), None);
    }

    #[test]
    fn later_ranges_start_after_checkpoint() {
        let mut cp = Checkpoint::new(100);
        cp.advance(150);
        assert_eq!(cp.last_checked_block(), 150);
        assert_eq!(cp.pending_range(150), None);
        assert_eq!(cp.pending_range(160), Some((151, 160)));
    }

    #[test]
    fn advance_is_monotonic() {
        let mut cp = Checkpoint::new(100);
        cp.advance(150);
        cp.advance(120);
        assert_eq!(cp.last_checked_block(), 150);
        for head in [160, 170, 200] {
            cp.advance(head);
        }
        assert_eq!(cp.last_checked_block(), 200);
    }

    #[test]
    fn advance_below_start_is_ignored() {
        let mut cp = Checkpoint::new(100);
        cp.advance(50);
        assert_eq!(cp, Checkpoint::new(100));
        assert_eq!(cp.pending_range(100), Some((100, 100)));

        cp.advance(100);
        assert_eq!(cp.next_block(), 101);
    }

    #[test]
    fn stats_count_notices() {
        let mut stats = PollerStats::default();
        stats.record_cycle(&CycleReport {
            timestamp: String::new(),
            from_block: 1,
            to_block: 2,
            events: 3,
            notices: vec![NoticeKind::Welcome, NoticeKind::Mismatch, NoticeKind::Welcome],
        });
        stats.record_failure();
        assert_eq!(stats.total_cycles, 2);
        assert_eq!(stats.failed_cycles, 1);
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.welcomes, 2);
        assert_eq!(stats.mismatches, 1);
    }
}
