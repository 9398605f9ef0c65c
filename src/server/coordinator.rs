use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::KeeperConfig;
use crate::session::spawn_session_sweeper;
use crate::session::SessionExpirer;
use crate::session::SessionManager;
use crate::session::TerminationCause;
use crate::storage::path;
use crate::storage::CreateMode;
use crate::storage::NodeStore;
use crate::storage::Stat;
use crate::txn::Op;
use crate::txn::OpResult;
use crate::txn::TransactionEngine;
use crate::utils::time::Clock;
use crate::watch::EventType;
use crate::watch::WatchId;
use crate::watch::WatchManager;
use crate::watch::WatchedEvent;
use crate::CoordinationError;
use crate::Result;
use crate::SessionId;

type OpResultOf<T> = std::result::Result<T, CoordinationError>;

/// What a client receives from `connect`
#[derive(Debug)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub timeout: Duration,
    /// Watch notifications for this session, in per-path commit order
    pub events: mpsc::UnboundedReceiver<WatchedEvent>,
}

/// Store, sessions and watches behind one write lock.
///
/// Lock order: store, then the session table, then the watch table. Every
/// mutation checks the caller's session, applies its ops and fires the
/// resulting watches before the store lock is released.
#[derive(Debug)]
pub struct Coordinator {
    store: RwLock<NodeStore>,
    sessions: SessionManager,
    watches: WatchManager,
    clock: Arc<dyn Clock>,
    config: KeeperConfig,
}

impl Coordinator {
    pub(crate) fn new(
        store: NodeStore,
        config: KeeperConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            sessions: SessionManager::new(config.session.clone(), clock.clone()),
            watches: WatchManager::new(config.watch.clone()),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    //-----------------------------------------------------------
    // Sessions

    /// Opens a session; the timeout hint is clamped to the configured bounds.
    pub fn connect(
        &self,
        timeout_hint: Duration,
    ) -> SessionHandle {
        let session = self.sessions.create(timeout_hint);
        let events = self.watches.open_session(session.id);
        SessionHandle {
            session_id: session.id,
            timeout: session.timeout,
            events,
        }
    }

    /// Resets the session deadline. Returns the new deadline (ms since epoch).
    pub fn heartbeat(
        &self,
        session_id: SessionId,
    ) -> OpResultOf<u64> {
        self.sessions.heartbeat(session_id)
    }

    /// Terminates the session: its ephemeral nodes and watches are removed.
    pub fn close_session(
        &self,
        session_id: SessionId,
    ) -> OpResultOf<()> {
        if self.terminate(session_id, TerminationCause::Closed) {
            Ok(())
        } else {
            Err(CoordinationError::SessionExpired { session_id })
        }
    }

    /// Expires every session past its deadline. Returns the expired ids.
    pub fn expire_sessions(&self) -> Vec<SessionId> {
        let now = self.clock.now_millis();
        self.sessions
            .expired(now)
            .into_iter()
            .filter(|id| self.terminate(*id, TerminationCause::Expired))
            .collect()
    }

    pub fn is_session_live(
        &self,
        session_id: SessionId,
    ) -> bool {
        self.sessions.is_live(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }

    /// Starts the background expiry sweep at the configured interval
    pub fn start_sweeper(
        self: &Arc<Self>,
        shutdown_signal: watch::Receiver<()>,
    ) -> JoinHandle<()> {
        spawn_session_sweeper(
            Arc::clone(self),
            self.config.session.sweep_interval(),
            shutdown_signal,
        )
    }

    /// Shared close/expiry transition, atomic with respect to every reader.
    fn terminate(
        &self,
        session_id: SessionId,
        cause: TerminationCause,
    ) -> bool {
        let mut store = self.store.write();
        if !self.sessions.mark_closing(session_id) {
            return false;
        }

        let owned = store.ephemerals_of(session_id);
        if !owned.is_empty() {
            let mut mutation = store.begin(self.clock.now_millis());
            for node_path in &owned {
                // Ephemeral nodes are leaves, so plain deletes cannot conflict
                if let Err(e) = store.delete(&mut mutation, node_path, None, false) {
                    warn!(session_id, path = %node_path, "ephemeral cleanup failed: {}", e);
                }
            }
            let zxid = mutation.zxid();
            let triggers = store.commit(mutation);
            self.watches.fire(&triggers, zxid);
        }

        let dropped_watches = self.watches.remove_session(session_id);
        self.sessions.remove(session_id, cause);
        info!(
            session_id,
            cause = cause.as_str(),
            ephemerals = owned.len(),
            dropped_watches,
            "Session terminated"
        );
        true
    }

    //-----------------------------------------------------------
    // Mutations

    /// Creates a node and returns its actual path.
    pub fn create(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> OpResultOf<String> {
        let op = Op::Create {
            path: path.to_string(),
            data,
            mode,
            create_parents,
        };
        let mut results = self.apply(session_id, &[op]).map_err(CoordinationError::into_op_error)?;
        Ok(created_path(results.pop()))
    }

    /// Creates `_c_{token}-{name}` under the parent of `path` unless a child
    /// carrying the same token already exists, in which case that path is returned.
    ///
    /// Scan and create happen under one write lock, so at most one node per
    /// token can ever exist.
    pub fn create_protected(
        &self,
        session_id: SessionId,
        path: &str,
        token: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> OpResultOf<String> {
        let protected = path::protect(path, token)?;

        let mut store = self.store.write();
        self.sessions.ensure_live(session_id)?;
        if let Some(existing) = store.find_child_with_prefix(&protected.parent, &protected.prefix) {
            debug!(session_id, path = %existing, "protected node already present");
            return Ok(existing);
        }

        let op = Op::Create {
            path: protected.path,
            data,
            mode,
            create_parents,
        };
        let mut results = self
            .apply_locked(&mut store, session_id, &[op])
            .map_err(CoordinationError::into_op_error)?;
        Ok(created_path(results.pop()))
    }

    /// Replaces the node's data; `version` guards the write when set.
    pub fn set_data(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        version: Option<u64>,
    ) -> OpResultOf<Stat> {
        let op = Op::set_data(path, data, version);
        let results = self.apply(session_id, &[op]).map_err(CoordinationError::into_op_error)?;
        match results.into_iter().next() {
            Some(OpResult::SetData { stat, .. }) => Ok(stat),
            _ => Err(CoordinationError::NoNode {
                path: path.to_string(),
            }),
        }
    }

    /// Deletes a node; `recursive` removes its subtree deepest-first.
    pub fn delete(
        &self,
        session_id: SessionId,
        path: &str,
        version: Option<u64>,
        recursive: bool,
    ) -> OpResultOf<()> {
        let op = Op::Delete {
            path: path.to_string(),
            version,
            recursive,
        };
        self.apply(session_id, &[op]).map_err(CoordinationError::into_op_error)?;
        Ok(())
    }

    /// Applies `ops` atomically under a single zxid
    pub fn multi(
        &self,
        session_id: SessionId,
        ops: &[Op],
    ) -> OpResultOf<Vec<OpResult>> {
        self.apply(session_id, ops)
    }

    fn apply(
        &self,
        session_id: SessionId,
        ops: &[Op],
    ) -> OpResultOf<Vec<OpResult>> {
        let mut store = self.store.write();
        self.sessions.ensure_live(session_id)?;
        self.apply_locked(&mut store, session_id, ops)
    }

    fn apply_locked(
        &self,
        store: &mut NodeStore,
        session_id: SessionId,
        ops: &[Op],
    ) -> OpResultOf<Vec<OpResult>> {
        let committed =
            TransactionEngine::apply(store, ops, session_id, self.clock.now_millis())?;
        self.watches.fire(&committed.triggers, committed.zxid);
        Ok(committed.results)
    }

    //-----------------------------------------------------------
    // Reads

    pub fn get(
        &self,
        path: &str,
    ) -> OpResultOf<(Bytes, Stat)> {
        path::validate_path(path)?;
        self.store.read().get(path).ok_or_else(|| no_node(path))
    }

    /// `None` when the node does not exist
    pub fn exists(
        &self,
        path: &str,
    ) -> OpResultOf<Option<Stat>> {
        path::validate_path(path)?;
        Ok(self.store.read().stat(path))
    }

    /// Child names in lexicographic order
    pub fn children(
        &self,
        path: &str,
    ) -> OpResultOf<Vec<String>> {
        path::validate_path(path)?;
        self.store.read().children(path).ok_or_else(|| no_node(path))
    }

    pub fn node_count(&self) -> usize {
        self.store.read().node_count()
    }

    pub fn last_zxid(&self) -> u64 {
        self.store.read().last_zxid()
    }

    /// Serialized copy of the committed namespace
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        self.store.read().snapshot()
    }

    //-----------------------------------------------------------
    // Watches

    /// Registers a one-shot watch; it fires on the next matching commit only.
    pub fn register_watch(
        &self,
        session_id: SessionId,
        path: &str,
        event_type: EventType,
    ) -> OpResultOf<WatchId> {
        path::validate_path(path)?;
        let _store = self.store.read();
        self.sessions.ensure_live(session_id)?;
        self.watches.register(session_id, path, event_type)
    }

    /// Reads the node and watches its data; deletion fires the watch too.
    pub fn get_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> OpResultOf<(Bytes, Stat)> {
        path::validate_path(path)?;
        let store = self.store.read();
        self.sessions.ensure_live(session_id)?;
        let node = store.get(path).ok_or_else(|| no_node(path))?;
        self.watches.register(session_id, path, EventType::NodeDataChanged)?;
        Ok(node)
    }

    /// Lists the children and watches the child list; deletion fires the watch too.
    pub fn children_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> OpResultOf<Vec<String>> {
        path::validate_path(path)?;
        let store = self.store.read();
        self.sessions.ensure_live(session_id)?;
        let children = store.children(path).ok_or_else(|| no_node(path))?;
        self.watches.register(session_id, path, EventType::NodeChildrenChanged)?;
        Ok(children)
    }

    /// Stats the node and watches it: for creation if absent, for data
    /// changes and deletion if present.
    pub fn exists_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> OpResultOf<Option<Stat>> {
        path::validate_path(path)?;
        let store = self.store.read();
        self.sessions.ensure_live(session_id)?;
        let stat = store.stat(path);
        let event_type = match stat {
            Some(_) => EventType::NodeDataChanged,
            None => EventType::NodeCreated,
        };
        self.watches.register(session_id, path, event_type)?;
        Ok(stat)
    }

    pub fn watch_count(
        &self,
        path: &str,
        event_type: EventType,
    ) -> usize {
        self.watches.watch_count(path, event_type)
    }
}

impl SessionExpirer for Coordinator {
    fn expire_sessions(&self) -> Vec<SessionId> {
        Coordinator::expire_sessions(self)
    }
}

fn no_node(path: &str) -> CoordinationError {
    CoordinationError::NoNode {
        path: path.to_string(),
    }
}

fn created_path(result: Option<OpResult>) -> String {
    match result {
        Some(OpResult::Create { path }) => path,
        Some(other) => other.for_path().to_string(),
        None => String::new(),
    }
}
