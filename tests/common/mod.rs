#![allow(dead_code)]

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use d_keeper::client::KeeperApi;
use d_keeper::config::SessionConfig;
use d_keeper::watch::WatchId;
use d_keeper::CoordinationError;
use d_keeper::Coordinator;
use d_keeper::CoordinatorBuilder;
use d_keeper::CreateMode;
use d_keeper::EventType;
use d_keeper::KeeperConfig;
use d_keeper::ManualClock;
use d_keeper::Op;
use d_keeper::OpResult;
use d_keeper::SessionHandle;
use d_keeper::SessionId;
use d_keeper::Stat;
use d_keeper::WatchedEvent;

pub const START_MS: u64 = 1_700_000_000_000;

pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_config() -> KeeperConfig {
    KeeperConfig {
        session: SessionConfig {
            min_session_timeout_ms: 1_000,
            max_session_timeout_ms: 60_000,
            sweep_interval_ms: 200,
        },
        ..Default::default()
    }
}

pub fn setup() -> (Arc<Coordinator>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let coordinator = CoordinatorBuilder::new(test_config())
        .clock(clock.clone())
        .build()
        .expect("valid test config");
    (coordinator, clock)
}

/// Everything queued on the session right now
pub fn drain(handle: &mut SessionHandle) -> Vec<WatchedEvent> {
    std::iter::from_fn(|| handle.events.try_recv().ok()).collect()
}

pub fn events_of(
    events: &[WatchedEvent],
    path: &str,
) -> Vec<EventType> {
    events.iter().filter(|e| e.path == path).map(|e| e.event_type).collect()
}

/// Applies every request but loses the first `lost_replies` replies of
/// protected creates and deletes, reporting `ConnectionLoss` instead.
/// Children listings can be lost the same way with [`LossyApi::with_lost_scans`].
#[derive(Debug)]
pub struct LossyApi {
    inner: Arc<Coordinator>,
    lost_replies: usize,
    calls: AtomicUsize,
    lost_scans: usize,
    scans: AtomicUsize,
}

impl LossyApi {
    pub fn new(
        inner: Arc<Coordinator>,
        lost_replies: usize,
    ) -> Self {
        Self {
            inner,
            lost_replies,
            calls: AtomicUsize::new(0),
            lost_scans: 0,
            scans: AtomicUsize::new(0),
        }
    }

    pub fn with_lost_scans(
        mut self,
        lost_scans: usize,
    ) -> Self {
        self.lost_scans = lost_scans;
        self
    }

    /// Number of lossy calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lose_reply<T>(
        &self,
        result: Result<T, CoordinationError>,
    ) -> Result<T, CoordinationError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.lost_replies {
            Err(CoordinationError::ConnectionLoss)
        } else {
            result
        }
    }
}

impl KeeperApi for LossyApi {
    fn connect(
        &self,
        timeout_hint: Duration,
    ) -> SessionHandle {
        self.inner.connect(timeout_hint)
    }

    fn heartbeat(
        &self,
        session_id: SessionId,
    ) -> Result<u64, CoordinationError> {
        self.inner.heartbeat(session_id)
    }

    fn close_session(
        &self,
        session_id: SessionId,
    ) -> Result<(), CoordinationError> {
        self.inner.close_session(session_id)
    }

    fn create(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> Result<String, CoordinationError> {
        self.inner.create(session_id, path, data, mode, create_parents)
    }

    fn create_protected(
        &self,
        session_id: SessionId,
        path: &str,
        token: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> Result<String, CoordinationError> {
        let result = self
            .inner
            .create_protected(session_id, path, token, data, mode, create_parents);
        self.lose_reply(result)
    }

    fn get(
        &self,
        path: &str,
    ) -> Result<(Bytes, Stat), CoordinationError> {
        self.inner.get(path)
    }

    fn get_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> Result<(Bytes, Stat), CoordinationError> {
        self.inner.get_and_watch(session_id, path)
    }

    fn exists(
        &self,
        path: &str,
    ) -> Result<Option<Stat>, CoordinationError> {
        self.inner.exists(path)
    }

    fn exists_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> Result<Option<Stat>, CoordinationError> {
        self.inner.exists_and_watch(session_id, path)
    }

    fn children(
        &self,
        path: &str,
    ) -> Result<Vec<String>, CoordinationError> {
        let result = self.inner.children(path);
        if self.scans.fetch_add(1, Ordering::SeqCst) < self.lost_scans {
            Err(CoordinationError::ConnectionLoss)
        } else {
            result
        }
    }

    fn children_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> Result<Vec<String>, CoordinationError> {
        self.inner.children_and_watch(session_id, path)
    }

    fn set_data(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        version: Option<u64>,
    ) -> Result<Stat, CoordinationError> {
        self.inner.set_data(session_id, path, data, version)
    }

    fn delete(
        &self,
        session_id: SessionId,
        path: &str,
        version: Option<u64>,
        recursive: bool,
    ) -> Result<(), CoordinationError> {
        let result = self.inner.delete(session_id, path, version, recursive);
        self.lose_reply(result)
    }

    fn multi(
        &self,
        session_id: SessionId,
        ops: &[Op],
    ) -> Result<Vec<OpResult>, CoordinationError> {
        self.inner.multi(session_id, ops)
    }

    fn register_watch(
        &self,
        session_id: SessionId,
        path: &str,
        event_type: EventType,
    ) -> Result<WatchId, CoordinationError> {
        self.inner.register_watch(session_id, path, event_type)
    }
}
