use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;

use super::SessionId;

/// Terminates every session whose deadline has passed
#[cfg_attr(test, automock)]
pub trait SessionExpirer: Send + Sync + 'static {
    /// Returns the ids of the sessions expired by this call
    fn expire_sessions(&self) -> Vec<SessionId>;
}

/// Spawns the background expiry loop.
///
/// Wakes every `interval` and asks `target` to expire overdue sessions. Stops
/// when `shutdown_signal` fires or its sender is dropped.
pub fn spawn_session_sweeper<E: SessionExpirer + ?Sized>(
    target: Arc<E>,
    interval: Duration,
    mut shutdown_signal: watch::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = target.expire_sessions();
                    if !expired.is_empty() {
                        debug!("Session sweep: expired {} sessions", expired.len());
                    }
                }
                _ = shutdown_signal.changed() => {
                    info!("Session sweeper received shutdown signal");
                    break;
                }
            }
        }
    })
}
