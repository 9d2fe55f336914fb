//! Inspect and manage the offline queue.

use anyhow::{Context, Result};
use medsync_client::{OfflineCore, Transport};
use medsync_core::QueueStatus;
use medsync_types::QueueItemId;

/// List queued items in replay order.
pub async fn list<T: Transport>(core: &OfflineCore<T>) -> Result<()> {
    let items = core.queued_items().await;
    if items.is_empty() {
        println!("Offline queue is empty.");
        return Ok(());
    }

    println!("{:<36}  {:<5}  {:<7}  {:>7}  REQUEST", "ID", "KIND", "STATUS", "RETRIES");
    for item in items {
        let status = match item.status {
            QueueStatus::Pending => "pending",
            QueueStatus::Syncing => "syncing",
            QueueStatus::Failed => "failed",
        };
        println!(
            "{:<36}  {:<5}  {:<7}  {:>7}  {}->{} {}",
            item.id,
            item.kind,
            status,
            item.retry_count,
            item.request.source_language,
            item.request.target_language,
            preview(item.request.content()),
        );
    }
    Ok(())
}

/// Print the number of queued items.
pub async fn size<T: Transport>(core: &OfflineCore<T>) -> Result<usize> {
    let size = core.queue_size().await;
    println!("{}", size);
    Ok(size)
}

/// Reset a failed item so the next drain replays it.
pub async fn retry<T: Transport>(core: &OfflineCore<T>, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    if core.retry_item(&id).await? {
        println!("Item {} will be replayed on the next drain.", id);
        Ok(())
    } else {
        anyhow::bail!("Item {} is not queued or has not failed", id)
    }
}

/// Delete a queued item.
pub async fn remove<T: Transport>(core: &OfflineCore<T>, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    match core.remove_item(&id).await? {
        Some(_) => {
            println!("Removed {}.", id);
            Ok(())
        }
        None => anyhow::bail!("Item {} is not queued", id),
    }
}

fn parse_id(id: &str) -> Result<QueueItemId> {
    QueueItemId::parse(id).with_context(|| format!("Invalid queue item id: {}", id))
}

/// First 40 characters of the content, on one line.
fn preview(content: &str) -> String {
    let flat: String = content.chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
    if flat.chars().count() > 40 {
        format!("{}...", flat.chars().take(40).collect::<String>())
    } else {
        flat
    }
}
