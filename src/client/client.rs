//! Session-bound client facade.
//!
//! [`Client`] owns one session. Every path it accepts or returns is relative
//! to its [`Namespace`], and the create/delete options select the protected
//! and guaranteed retry paths.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use super::background;
use super::BackgroundEvent;
use super::BackgroundListeners;
use super::ClientBuilder;
use super::CreateOptions;
use super::DeleteOptions;
use super::DeleteOutcome;
use super::GuaranteedDelete;
use super::KeeperApi;
use super::Namespace;
use super::ProtectedCreate;
use crate::config::RetryPolicies;
use crate::storage::Stat;
use crate::txn::Op;
use crate::txn::OpResult;
use crate::watch::EventType;
use crate::watch::WatchId;
use crate::watch::WatchedEvent;
use crate::Result;
use crate::SessionId;

/// Main entry point for applications
///
/// Created through [`Client::builder`]. Dropping the client stops its
/// keepalive task but leaves the session to expire; call
/// [`close`](Client::close) to end it at once.
pub struct Client {
    pub(super) api: Arc<dyn KeeperApi>,
    pub(super) session_id: SessionId,
    pub(super) timeout: Duration,
    pub(super) namespace: Namespace,
    pub(super) retry: RetryPolicies,
    pub(super) events: mpsc::UnboundedReceiver<WatchedEvent>,
    pub(super) keepalive: Option<JoinHandle<()>>,
    pub(super) listeners: BackgroundListeners,
}

impl Client {
    /// Create a configured client builder
    ///
    /// # Examples
    /// ```rust,ignore
    /// let client = Client::builder(coordinator.clone())
    ///     .namespace("mydemo/v1")
    ///     .session_timeout(Duration::from_secs(10))
    ///     .build()?;
    /// ```
    pub fn builder(api: Arc<dyn KeeperApi>) -> ClientBuilder {
        ClientBuilder::new(api)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Timeout negotiated with the server
    pub fn session_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    //-----------------------------------------------------------
    // Writes

    /// Creates a node and returns its actual path (relative to the namespace).
    pub async fn create(
        &self,
        path: &str,
        data: impl Into<Bytes>,
        options: CreateOptions,
    ) -> Result<String> {
        let full = self.namespace.fix_create(path, options.mode)?;
        let data = data.into();
        let created = if options.protected {
            ProtectedCreate::new(Arc::clone(&self.api), self.retry.protected_create)
                .create(
                    self.session_id,
                    &full,
                    data,
                    options.mode,
                    options.create_parents,
                )
                .await?
        } else {
            self.api.create(
                self.session_id,
                &full,
                data,
                options.mode,
                options.create_parents,
            )?
        };
        Ok(self.namespace.unfix(&created))
    }

    pub async fn set_data(
        &self,
        path: &str,
        data: impl Into<Bytes>,
        version: Option<u64>,
    ) -> Result<Stat> {
        let full = self.namespace.fix(path)?;
        Ok(self.api.set_data(self.session_id, &full, data.into(), version)?)
    }

    /// Deletes a node. A guaranteed delete that could not confirm the outcome
    /// in the foreground keeps retrying in the background and returns `Ok`.
    pub async fn delete(
        &self,
        path: &str,
        options: DeleteOptions,
    ) -> Result<()> {
        let full = self.namespace.fix(path)?;
        if !options.guaranteed {
            self.api.delete(
                self.session_id,
                &full,
                options.version,
                options.deleting_children,
            )?;
            return Ok(());
        }

        let outcome = GuaranteedDelete::new(Arc::clone(&self.api), self.retry.guaranteed_delete)
            .delete(
                self.session_id,
                &full,
                options.version,
                options.deleting_children,
            )
            .await?;
        if let DeleteOutcome::Deferred(_) = outcome {
            info!(session_id = self.session_id, path = %full, "delete deferred to background");
        }
        Ok(())
    }

    /// Applies `ops` atomically; results come back in op order.
    pub async fn transaction(
        &self,
        mut ops: Vec<Op>,
    ) -> Result<Vec<OpResult>> {
        for op in ops.iter_mut() {
            self.fix_op(op)?;
        }
        let mut results = self.api.multi(self.session_id, &ops)?;
        for result in results.iter_mut() {
            let relative = self.namespace.unfix(result.for_path());
            *result.path_mut() = relative;
        }
        Ok(results)
    }

    fn fix_op(
        &self,
        op: &mut Op,
    ) -> Result<()> {
        let full = match op {
            Op::Create { path, mode, .. } => self.namespace.fix_create(path, *mode)?,
            ref other => self.namespace.fix(other.path())?,
        };
        *op.path_mut() = full;
        Ok(())
    }

    //-----------------------------------------------------------
    // Background operations

    /// Registers a listener for operations started with [`in_background`](Self::in_background)
    pub fn background_listener(&self) -> mpsc::UnboundedReceiver<BackgroundEvent> {
        self.listeners.subscribe()
    }

    /// Runs `op` on a background task; its outcome goes to every background listener.
    ///
    /// A path that cannot be namespaced fails here, before anything is spawned.
    pub fn in_background(
        &self,
        op: Op,
    ) -> Result<JoinHandle<()>> {
        let listeners = self.listeners.clone();
        self.spawn_op(op, move |event| {
            listeners.notify(event);
        })
    }

    /// Runs `op` on a background task and hands its outcome to `callback`
    /// instead of the listeners.
    pub fn in_background_with<F>(
        &self,
        op: Op,
        callback: F,
    ) -> Result<JoinHandle<()>>
    where
        F: FnOnce(BackgroundEvent) + Send + 'static,
    {
        self.spawn_op(op, callback)
    }

    fn spawn_op<F>(
        &self,
        mut op: Op,
        report: F,
    ) -> Result<JoinHandle<()>>
    where
        F: FnOnce(BackgroundEvent) + Send + 'static,
    {
        let requested = op.path().to_string();
        self.fix_op(&mut op)?;

        let api = Arc::clone(&self.api);
        let namespace = self.namespace.clone();
        let session_id = self.session_id;
        Ok(tokio::spawn(async move {
            let op_type = op.op_type();
            let result = background::run_op(api.as_ref(), session_id, op).map(|mut result| {
                let relative = namespace.unfix(result.for_path());
                *result.path_mut() = relative;
                result
            });
            if let Err(e) = &result {
                warn!(
                    session_id,
                    op = %op_type,
                    path = %requested,
                    "background operation failed: {}",
                    e
                );
            }
            report(BackgroundEvent {
                op_type,
                path: requested,
                result,
            });
        }))
    }

    //-----------------------------------------------------------
    // Reads

    pub async fn get(
        &self,
        path: &str,
    ) -> Result<(Bytes, Stat)> {
        Ok(self.api.get(&self.namespace.fix(path)?)?)
    }

    pub async fn exists(
        &self,
        path: &str,
    ) -> Result<Option<Stat>> {
        Ok(self.api.exists(&self.namespace.fix(path)?)?)
    }

    pub async fn children(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        Ok(self.api.children(&self.namespace.fix(path)?)?)
    }

    //-----------------------------------------------------------
    // Watches

    /// Registers a one-shot watch; the event arrives through [`next_event`](Self::next_event).
    pub async fn watch(
        &self,
        path: &str,
        event_type: EventType,
    ) -> Result<WatchId> {
        let full = self.namespace.fix(path)?;
        Ok(self.api.register_watch(self.session_id, &full, event_type)?)
    }

    pub async fn get_and_watch(
        &self,
        path: &str,
    ) -> Result<(Bytes, Stat)> {
        let full = self.namespace.fix(path)?;
        Ok(self.api.get_and_watch(self.session_id, &full)?)
    }

    pub async fn children_and_watch(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        let full = self.namespace.fix(path)?;
        Ok(self.api.children_and_watch(self.session_id, &full)?)
    }

    pub async fn exists_and_watch(
        &self,
        path: &str,
    ) -> Result<Option<Stat>> {
        let full = self.namespace.fix(path)?;
        Ok(self.api.exists_and_watch(self.session_id, &full)?)
    }

    /// Waits for the next watch notification; `None` once the session has ended
    pub async fn next_event(&mut self) -> Option<WatchedEvent> {
        let event = self.events.recv().await?;
        Some(self.relative_event(event))
    }

    /// Returns a pending notification without waiting
    pub fn try_next_event(&mut self) -> Option<WatchedEvent> {
        let event = self.events.try_recv().ok()?;
        Some(self.relative_event(event))
    }

    fn relative_event(
        &self,
        mut event: WatchedEvent,
    ) -> WatchedEvent {
        event.path = self.namespace.unfix(&event.path);
        event
    }

    //-----------------------------------------------------------
    // Session

    pub async fn heartbeat(&self) -> Result<()> {
        self.api.heartbeat(self.session_id)?;
        Ok(())
    }

    /// Ends the session; its ephemeral nodes and watches go with it
    pub async fn close(mut self) -> Result<()> {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
        self.api.close_session(self.session_id)?;
        info!(session_id = self.session_id, "Client closed");
        Ok(())
    }

    pub(super) fn spawn_keepalive(
        api: Arc<dyn KeeperApi>,
        session_id: SessionId,
        timeout: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(timeout / 3);
            // First tick completes immediately; the session was just refreshed
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = api.heartbeat(session_id) {
                    warn!(session_id, "keepalive stopped: {}", e);
                    break;
                }
            }
        })
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
    }
}
