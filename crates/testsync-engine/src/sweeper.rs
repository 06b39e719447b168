use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::registry::SessionRegistry;

/// Start a background task that periodically evicts expired sessions.
pub fn start_sweeper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let _ = ticker.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = registry.sweep(Utc::now());
                    if removed > 0 {
                        tracing::info!(
                            removed,
                            remaining = registry.len(),
                            "expired sessions evicted"
                        );
                    }
                }
            }
        }
    })
}
