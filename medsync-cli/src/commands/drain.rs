//! Replay the offline queue.

use anyhow::Result;
use medsync_client::{OfflineCore, Transport};
use medsync_core::SyncReport;

/// Run the drain command.
pub async fn run<T: Transport>(core: &OfflineCore<T>) -> Result<Option<SyncReport>> {
    if !core.connectivity().is_online() {
        anyhow::bail!("Cannot drain while offline");
    }

    let report = core.drain_queue().await;
    match &report {
        Some(report) => {
            print_report(report);
        }
        None => println!("A drain is already running."),
    }
    Ok(report)
}

/// Print a drain summary.
pub fn print_report(report: &SyncReport) {
    println!("Synced: {}", report.synced_count);
    println!("Failed: {}", report.failed_count);
    for failure in &report.failures {
        let state = if failure.terminal { "gave up" } else { "will retry" };
        println!(
            "  {} ({}, {} retries, {}): {}",
            failure.item_id, failure.kind, failure.retry_count, state, failure.error
        );
    }
    if report.interrupted {
        println!("Drain was interrupted before the queue was exhausted.");
    }
}
