//! Drain summaries.

use medsync_types::{QueueItemId, TranslationKind};

/// Outcome of one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items replayed successfully and removed from the queue.
    pub synced_count: usize,
    /// Items whose replay failed (retryable or terminal).
    pub failed_count: usize,
    /// Details for each failure, in replay order.
    pub failures: Vec<SyncFailure>,
    /// The drain stopped early (cancelled or connectivity lost).
    pub interrupted: bool,
}

/// One failed replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// The queued item.
    pub item_id: QueueItemId,
    /// Text or audio.
    pub kind: TranslationKind,
    /// Error message.
    pub error: String,
    /// Retry count after this failure.
    pub retry_count: u32,
    /// The item is now `failed` and will be skipped by later drains.
    pub terminal: bool,
}

impl SyncReport {
    /// Record a successful replay.
    pub fn record_synced(&mut self) {
        self.synced_count += 1;
    }

    /// Record a failed replay.
    pub fn record_failure(&mut self, failure: SyncFailure) {
        self.failed_count += 1;
        self.failures.push(failure);
    }

    /// Total items processed.
    pub fn processed(&self) -> usize {
        self.synced_count + self.failed_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_records() {
        let mut report = SyncReport::default();
        report.record_synced();
        report.record_synced();
        report.record_failure(SyncFailure {
            item_id: QueueItemId::new(),
            kind: TranslationKind::Audio,
            error: "timeout".into(),
            retry_count: 1,
            terminal: false,
        });

        assert_eq!(report.synced_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.processed(), 3);
        assert_eq!(report.failures[0].kind, TranslationKind::Audio);
    }
}
