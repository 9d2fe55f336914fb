//! Join and leave translation sessions.

use anyhow::{Context, Result};
use medsync_client::{ConnectOutcome, OfflineCore, Transport};
use std::time::Duration;

/// How long `join` waits for the background replay.
const REPLAY_WAIT: Duration = Duration::from_secs(60);

/// Join a session by code.
///
/// The session is persisted. Queued items are replayed once the channel
/// connects, and the channel is closed again before returning.
pub async fn join<T: Transport>(core: &OfflineCore<T>, code: &str, language: &str) -> Result<ConnectOutcome> {
    let mut reports = core.subscribe_reports();
    let queued = core.queue_size().await;

    let outcome = core
        .join_session(code, language)
        .await
        .context("Failed to join session")?;

    if let Some(session) = core.session().await {
        println!("Joined session {} ({})", session.session_id, session.language);
    }
    match outcome {
        ConnectOutcome::Connected => println!("Channel: connected"),
        ConnectOutcome::TimedOut => println!("Channel: handshake timed out"),
    }

    // A connected channel replays the queue in the background.
    if outcome == ConnectOutcome::Connected && queued > 0 {
        match tokio::time::timeout(REPLAY_WAIT, reports.recv()).await {
            Ok(Ok(report)) => super::drain::print_report(&report),
            _ => println!("Queued items are still being replayed; run 'medsync drain' later."),
        }
    }

    core.channel().disconnect().await;
    Ok(outcome)
}

/// End the stored session.
pub async fn leave<T: Transport>(core: &OfflineCore<T>) -> Result<()> {
    core.end_session().await.context("Failed to end session")?;
    println!("Session ended.");
    Ok(())
}
