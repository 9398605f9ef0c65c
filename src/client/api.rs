use std::time::Duration;

use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::server::Coordinator;
use crate::server::SessionHandle;
use crate::storage::CreateMode;
use crate::storage::Stat;
use crate::txn::Op;
use crate::txn::OpResult;
use crate::watch::EventType;
use crate::watch::WatchId;
use crate::CoordinationError;
use crate::SessionId;

type ApiResult<T> = std::result::Result<T, CoordinationError>;

/// Request surface a [`Client`](super::Client) talks to.
///
/// Implemented by [`Coordinator`] for in-process use. A transport adapter
/// implements it too and reports an unknown outcome as
/// [`CoordinationError::ConnectionLoss`]; the retry layer relies on that.
#[cfg_attr(test, automock)]
pub trait KeeperApi: Send + Sync + 'static {
    fn connect(
        &self,
        timeout_hint: Duration,
    ) -> SessionHandle;

    fn heartbeat(
        &self,
        session_id: SessionId,
    ) -> ApiResult<u64>;

    fn close_session(
        &self,
        session_id: SessionId,
    ) -> ApiResult<()>;

    fn create(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> ApiResult<String>;

    /// Creates `_c_{token}-{name}`, or returns the node already carrying `token`
    fn create_protected(
        &self,
        session_id: SessionId,
        path: &str,
        token: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> ApiResult<String>;

    fn get(
        &self,
        path: &str,
    ) -> ApiResult<(Bytes, Stat)>;

    fn get_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> ApiResult<(Bytes, Stat)>;

    fn exists(
        &self,
        path: &str,
    ) -> ApiResult<Option<Stat>>;

    fn exists_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> ApiResult<Option<Stat>>;

    fn children(
        &self,
        path: &str,
    ) -> ApiResult<Vec<String>>;

    fn children_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> ApiResult<Vec<String>>;

    fn set_data(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        version: Option<u64>,
    ) -> ApiResult<Stat>;

    fn delete(
        &self,
        session_id: SessionId,
        path: &str,
        version: Option<u64>,
        recursive: bool,
    ) -> ApiResult<()>;

    fn multi(
        &self,
        session_id: SessionId,
        ops: &[Op],
    ) -> ApiResult<Vec<OpResult>>;

    fn register_watch(
        &self,
        session_id: SessionId,
        path: &str,
        event_type: EventType,
    ) -> ApiResult<WatchId>;
}

impl KeeperApi for Coordinator {
    fn connect(
        &self,
        timeout_hint: Duration,
    ) -> SessionHandle {
        Coordinator::connect(self, timeout_hint)
    }

    fn heartbeat(
        &self,
        session_id: SessionId,
    ) -> ApiResult<u64> {
        Coordinator::heartbeat(self, session_id)
    }

    fn close_session(
        &self,
        session_id: SessionId,
    ) -> ApiResult<()> {
        Coordinator::close_session(self, session_id)
    }

    fn create(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> ApiResult<String> {
        Coordinator::create(self, session_id, path, data, mode, create_parents)
    }

    fn create_protected(
        &self,
        session_id: SessionId,
        path: &str,
        token: &str,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    ) -> ApiResult<String> {
        Coordinator::create_protected(self, session_id, path, token, data, mode, create_parents)
    }

    fn get(
        &self,
        path: &str,
    ) -> ApiResult<(Bytes, Stat)> {
        Coordinator::get(self, path)
    }

    fn get_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> ApiResult<(Bytes, Stat)> {
        Coordinator::get_and_watch(self, session_id, path)
    }

    fn exists(
        &self,
        path: &str,
    ) -> ApiResult<Option<Stat>> {
        Coordinator::exists(self, path)
    }

    fn exists_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> ApiResult<Option<Stat>> {
        Coordinator::exists_and_watch(self, session_id, path)
    }

    fn children(
        &self,
        path: &str,
    ) -> ApiResult<Vec<String>> {
        Coordinator::children(self, path)
    }

    fn children_and_watch(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> ApiResult<Vec<String>> {
        Coordinator::children_and_watch(self, session_id, path)
    }

    fn set_data(
        &self,
        session_id: SessionId,
        path: &str,
        data: Bytes,
        version: Option<u64>,
    ) -> ApiResult<Stat> {
        Coordinator::set_data(self, session_id, path, data, version)
    }

    fn delete(
        &self,
        session_id: SessionId,
        path: &str,
        version: Option<u64>,
        recursive: bool,
    ) -> ApiResult<()> {
        Coordinator::delete(self, session_id, path, version, recursive)
    }

    fn multi(
        &self,
        session_id: SessionId,
        ops: &[Op],
    ) -> ApiResult<Vec<OpResult>> {
        Coordinator::multi(self, session_id, ops)
    }

    fn register_watch(
        &self,
        session_id: SessionId,
        path: &str,
        event_type: EventType,
    ) -> ApiResult<WatchId> {
        Coordinator::register_watch(self, session_id, path, event_type)
    }
}
