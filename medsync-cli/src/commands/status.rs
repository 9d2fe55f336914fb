//! Show connectivity, endpoint, session and queue status.

use anyhow::Result;
use medsync_client::{OfflineCore, Transport};
use medsync_core::QueueStatus;
use std::path::Path;

/// Run the status command.
pub async fn run<T: Transport>(core: &OfflineCore<T>, data_dir: &Path) -> Result<()> {
    println!("=== medsync status ===");
    println!();
    println!("Data dir:     {}", data_dir.display());
    println!(
        "Connectivity: {}",
        if core.connectivity().is_online() { "online" } else { "offline" }
    );
    println!();

    println!("Endpoints:");
    let preferred = core.preferred_endpoint().await;
    for endpoint in core.endpoints().await {
        let marker = if endpoint.id == preferred.id { "*" } else { " " };
        let health = if endpoint.healthy { "healthy" } else { "unreachable" };
        println!("  {} {:<5} {:<11} {}", marker, endpoint.kind, health, endpoint.address);
    }
    println!();

    match core.session().await {
        Some(session) => {
            println!("Session:");
            println!("  ID:       {}", session.session_id);
            println!("  Language: {}", session.language);
        }
        None => {
            println!("Session: NONE");
            println!("  Run 'medsync join <code> --language <lang>' to join one.");
        }
    }
    println!();

    let items = core.queued_items().await;
    let failed = items.iter().filter(|i| i.status == QueueStatus::Failed).count();
    println!("Offline queue:");
    println!("  Pending: {}", items.len() - failed);
    println!("  Failed:  {}", failed);

    Ok(())
}
