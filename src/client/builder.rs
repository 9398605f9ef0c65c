use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;
use tracing::warn;

use super::BackgroundListeners;
use super::Client;
use super::KeeperApi;
use super::Namespace;
use crate::config::BackoffPolicy;
use crate::config::KeeperConfig;
use crate::config::RetryPolicies;
use crate::storage::CreateMode;
use crate::CoordinationError;
use crate::Result;

/// Requested session timeout when none is set; the server clamps it
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ClientBuilder {
    api: Arc<dyn KeeperApi>,
    session_timeout: Duration,
    namespace: Option<String>,
    retry: RetryPolicies,
    keepalive: bool,
}

impl ClientBuilder {
    /// Create a new builder with default settings talking to `api`
    pub fn new(api: Arc<dyn KeeperApi>) -> Self {
        Self {
            api,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            namespace: None,
            retry: RetryPolicies::default(),
            keepalive: false,
        }
    }

    /// Takes retry policies from a loaded configuration
    pub fn from_config(
        api: Arc<dyn KeeperApi>,
        config: &KeeperConfig,
    ) -> Self {
        Self::new(api).retry_policies(config.retry.clone())
    }

    /// Requested session timeout (default: 30s)
    pub fn session_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Scope every path under `/{namespace}`, e.g. `mydemo/v1`
    pub fn namespace(
        mut self,
        namespace: impl Into<String>,
    ) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Replaces all retry policies
    pub fn retry_policies(
        mut self,
        retry: RetryPolicies,
    ) -> Self {
        self.retry = retry;
        self
    }

    pub fn protected_create_retry(
        mut self,
        policy: BackoffPolicy,
    ) -> Self {
        self.retry.protected_create = policy;
        self
    }

    pub fn guaranteed_delete_retry(
        mut self,
        policy: BackoffPolicy,
    ) -> Self {
        self.retry.guaranteed_delete = policy;
        self
    }

    /// Send heartbeats from a background task every third of the session timeout.
    ///
    /// Requires a tokio runtime when [`build`](Self::build) is called.
    pub fn keepalive(
        mut self,
        enable: bool,
    ) -> Self {
        self.keepalive = enable;
        self
    }

    /// Opens the session and makes sure the namespace node exists
    pub fn build(self) -> Result<Client> {
        self.retry.validate()?;
        let namespace = Namespace::new(self.namespace.as_deref())?;
        let handle = self.api.connect(self.session_timeout);
        let session_id = handle.session_id;

        if let Some(root) = namespace.root() {
            match self.api.create(session_id, root, Bytes::new(), CreateMode::Persistent, true) {
                Ok(_) | Err(CoordinationError::NodeExists { .. }) => {}
                Err(e) => {
                    if let Err(close_err) = self.api.close_session(session_id) {
                        warn!(session_id, "closing session after failed build: {}", close_err);
                    }
                    return Err(e.into());
                }
            }
        }

        let keepalive = self
            .keepalive
            .then(|| Client::spawn_keepalive(Arc::clone(&self.api), session_id, handle.timeout));

        info!(
            session_id,
            namespace = namespace.root().unwrap_or("/"),
            timeout_ms = handle.timeout.as_millis() as u64,
            "Client connected"
        );
        Ok(Client {
            api: self.api,
            session_id,
            timeout: handle.timeout,
            namespace,
            retry: self.retry,
            events: handle.events,
            keepalive,
            listeners: BackgroundListeners::default(),
        })
    }
}
