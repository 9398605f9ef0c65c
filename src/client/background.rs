//! Operations run off the caller's task with completion reporting.
//!
//! An operation started with [`Client::in_background`](super::Client::in_background)
//! reports its outcome as a [`BackgroundEvent`] to every listener registered
//! on the client. [`Client::in_background_with`](super::Client::in_background_with)
//! hands the outcome to a callback instead, and the listeners see nothing.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::KeeperApi;
use crate::txn::Op;
use crate::txn::OpResult;
use crate::txn::OpType;
use crate::CoordinationError;
use crate::SessionId;

/// Outcome of one background operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundEvent {
    pub op_type: OpType,
    /// Requested path, relative to the client's namespace
    pub path: String,
    /// On success the result path is relative to the namespace as well
    pub result: Result<OpResult, CoordinationError>,
}

/// Background completion listeners of one client
#[derive(Debug, Clone, Default)]
pub(crate) struct BackgroundListeners {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<BackgroundEvent>>>>,
}

impl BackgroundListeners {
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<BackgroundEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.lock().push(sender);
        receiver
    }

    /// Delivers `event` to every listener; listeners whose receiver is gone are dropped.
    /// Returns the number of listeners reached.
    pub(crate) fn notify(
        &self,
        event: BackgroundEvent,
    ) -> usize {
        let mut senders = self.senders.lock();
        senders.retain(|sender| sender.send(event.clone()).is_ok());
        trace!(
            op = %event.op_type,
            path = %event.path,
            listeners = senders.len(),
            "Background event delivered"
        );
        senders.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.lock().len()
    }
}

/// Runs one op through the single-op request surface
pub(crate) fn run_op(
    api: &dyn KeeperApi,
    session_id: SessionId,
    op: Op,
) -> Result<OpResult, CoordinationError> {
    match op {
        Op::Create {
            path,
            data,
            mode,
            create_parents,
        } => api
            .create(session_id, &path, data, mode, create_parents)
            .map(|path| OpResult::Create { path }),
        Op::SetData {
            path,
            data,
            version,
        } => api
            .set_data(session_id, &path, data, version)
            .map(|stat| OpResult::SetData { path, stat }),
        Op::Delete {
            path,
            version,
            recursive,
        } => api
            .delete(session_id, &path, version, recursive)
            .map(|()| OpResult::Delete { path }),
        check @ Op::Check { .. } => {
            api.multi(session_id, std::slice::from_ref(&check))
                .map_err(CoordinationError::into_op_error)?;
            Ok(OpResult::Check {
                path: check.path().to_string(),
            })
        }
    }
}
