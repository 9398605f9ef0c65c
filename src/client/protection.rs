//! Idempotent creation across ambiguous outcomes.
//!
//! A create whose reply is lost may or may not have committed. The protected
//! variant names the node `_c_{token}-{name}` with a fresh random token, so
//! before retrying the client can look among the parent's children for its
//! own token and adopt a node that did get created.

use std::sync::Arc;

use bytes::Bytes;
use nanoid::nanoid;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::KeeperApi;
use crate::config::BackoffPolicy;
use crate::constants::PROTECTION_TOKEN_ALPHABET;
use crate::constants::PROTECTION_TOKEN_LEN;
use crate::metrics::CLIENT_RETRIES;
use crate::storage::path;
use crate::storage::path::ProtectedName;
use crate::storage::CreateMode;
use crate::CoordinationError;
use crate::SessionId;

/// Random token identifying one logical protected create
pub fn generate_token() -> String {
    nanoid!(PROTECTION_TOKEN_LEN, &PROTECTION_TOKEN_ALPHABET)
}

pub struct ProtectedCreate {
    api: Arc<dyn KeeperApi>,
    policy: BackoffPolicy,
}

impl ProtectedCreate {
    pub fn new(
        api: Arc<dyn KeeperApi>,
        policy: BackoffPolicy,
    ) -> Self {
        Self { api, policy }
    }

    /// Creates the node under a fresh token and returns its actual path.
    ///
    /// Retries on `ConnectionLoss` up to `max_retries` times. Once they run
    /// out a final scan adopts the node if it exists; otherwise the caller
    /// gets `ConnectionLoss` and no protected node is left behind.
    pub async fn create(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> Result<String, CoordinationError> {
        let token = generate_token();
        self.create_with_token(session_id, path, &token, data, mode, create_parents)
            .await
    }

    pub(crate) async fn create_with_token(
        &self,
        session_id: SessionId,
        path: &str,
        token: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> Result<String, CoordinationError> {
        let protected = path::protect(path, token)?;
        let mut attempt = 0;

        loop {
            match self.api.create_protected(
                session_id,
                path,
                token,
                data.clone(),
                mode,
                create_parents,
            ) {
                Ok(created) => return Ok(created),
                Err(CoordinationError::ConnectionLoss) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    attempt += 1;
                    CLIENT_RETRIES.with_label_values(&["protected_create"]).inc();
                    warn!(
                        session_id,
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "protected create outcome unknown, retrying"
                    );
                    tokio::time::sleep(delay).await;

                    match find_created(self.api.as_ref(), &protected.parent, &protected.prefix) {
                        Ok(Some(found)) => {
                            debug!(
                                session_id,
                                path = %found,
                                "protected node found after connection loss"
                            );
                            return Ok(found);
                        }
                        // Scan lost as well: the next create attempt settles it
                        Ok(None) | Err(CoordinationError::ConnectionLoss) => {}
                        Err(e) => return Err(e),
                    }
                }
                Err(CoordinationError::ConnectionLoss) => {
                    return self.settle_exhausted(session_id, path, protected, attempt)
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Last look for our node once the retries are used up.
    ///
    /// If the scan cannot complete either, a background task keeps looking and
    /// deletes the node once it shows up.
    fn settle_exhausted(
        &self,
        session_id: SessionId,
        path: &str,
        protected: ProtectedName,
        attempt: usize,
    ) -> Result<String, CoordinationError> {
        match find_created(self.api.as_ref(), &protected.parent, &protected.prefix) {
            Ok(Some(found)) => {
                debug!(session_id, path = %found, "protected node found after retries ran out");
                Ok(found)
            }
            Ok(None) => Err(CoordinationError::ConnectionLoss),
            Err(CoordinationError::ConnectionLoss) => {
                warn!(
                    session_id,
                    path,
                    "protected create abandoned, removing any orphan in background"
                );
                self.spawn_orphan_cleanup(session_id, protected, attempt);
                Err(CoordinationError::ConnectionLoss)
            }
            Err(e) => Err(e),
        }
    }

    fn spawn_orphan_cleanup(
        &self,
        session_id: SessionId,
        protected: ProtectedName,
        mut attempt: usize,
    ) {
        let api = Arc::clone(&self.api);
        let policy = self.policy;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
                CLIENT_RETRIES.with_label_values(&["protected_cleanup"]).inc();

                let scan = find_created(api.as_ref(), &protected.parent, &protected.prefix);
                let orphan = match scan {
                    Ok(Some(orphan)) => orphan,
                    Ok(None) => {
                        debug!(
                            session_id,
                            parent = %protected.parent,
                            "no orphaned protected node"
                        );
                        break;
                    }
                    Err(CoordinationError::ConnectionLoss) => continue,
                    Err(e) => {
                        warn!(
                            session_id,
                            parent = %protected.parent,
                            "orphan scan abandoned: {}",
                            e
                        );
                        break;
                    }
                };

                match api.delete(session_id, &orphan, None, false) {
                    Ok(()) | Err(CoordinationError::NoNode { .. }) => {
                        info!(
                            session_id,
                            path = %orphan,
                            attempt,
                            "orphaned protected node removed"
                        );
                        break;
                    }
                    Err(CoordinationError::ConnectionLoss) => continue,
                    Err(e) => {
                        warn!(session_id, path = %orphan, "orphan removal abandoned: {}", e);
                        break;
                    }
                }
            }
        });
    }
}

/// Looks for a child of `parent` carrying our token.
///
/// A missing parent means nothing was created yet.
fn find_created(
    api: &dyn KeeperApi,
    parent: &str,
    prefix: &str,
) -> Result<Option<String>, CoordinationError> {
    match api.children(parent) {
        Ok(children) => Ok(children
            .iter()
            .find(|name| name.starts_with(prefix))
            .map(|name| path::join(parent, name))),
        Err(CoordinationError::NoNode { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
