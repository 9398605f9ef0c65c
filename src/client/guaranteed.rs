//! Deletes that converge despite ambiguous outcomes.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use super::KeeperApi;
use crate::config::BackoffPolicy;
use crate::metrics::CLIENT_RETRIES;
use crate::CoordinationError;
use crate::SessionId;

#[derive(Debug)]
pub enum DeleteOutcome {
    /// The node is gone
    Deleted,
    /// Foreground retries ran out; a background task keeps trying
    Deferred(JoinHandle<()>),
}

/// Delete that retries `ConnectionLoss` and treats `NoNode` on a retry as success
pub struct GuaranteedDelete {
    api: Arc<dyn KeeperApi>,
    policy: BackoffPolicy,
}

impl GuaranteedDelete {
    pub fn new(
        api: Arc<dyn KeeperApi>,
        policy: BackoffPolicy,
    ) -> Self {
        Self { api, policy }
    }

    pub async fn delete(
        &self,
        session_id: SessionId,
        path: &str,
        version: Option<u64>,
        recursive: bool,
    ) -> Result<DeleteOutcome, CoordinationError> {
        let mut attempt = 0;
        loop {
            match self.api.delete(session_id, path, version, recursive) {
                Ok(()) => return Ok(DeleteOutcome::Deleted),
                // An earlier attempt committed before its reply was lost
                Err(CoordinationError::NoNode { .. }) if attempt > 0 => {
                    return Ok(DeleteOutcome::Deleted)
                }
                Err(CoordinationError::ConnectionLoss) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    attempt += 1;
                    CLIENT_RETRIES.with_label_values(&["guaranteed_delete"]).inc();
                    warn!(
                        session_id,
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "delete outcome unknown, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(CoordinationError::ConnectionLoss) => {
                    warn!(session_id, path, "delete retries exhausted, continuing in background");
                    return Ok(DeleteOutcome::Deferred(self.spawn_background(
                        session_id,
                        path.to_string(),
                        version,
                        recursive,
                        attempt,
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn spawn_background(
        &self,
        session_id: SessionId,
        path: String,
        version: Option<u64>,
        recursive: bool,
        mut attempt: usize,
    ) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let policy = self.policy;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
                CLIENT_RETRIES.with_label_values(&["guaranteed_delete"]).inc();

                match api.delete(session_id, &path, version, recursive) {
                    Ok(()) | Err(CoordinationError::NoNode { .. }) => {
                        info!(session_id, path = %path, attempt, "background delete completed");
                        break;
                    }
                    Err(CoordinationError::ConnectionLoss) => continue,
                    Err(e) => {
                        warn!(session_id, path = %path, "background delete abandoned: {}", e);
                        break;
                    }
                }
            }
        })
    }
}
