use tracing::debug;

use super::Op;
use super::OpResult;
use crate::metrics::TRANSACTIONS;
use crate::storage::Mutation;
use crate::storage::NodeStore;
use crate::watch::WatchTrigger;
use crate::CoordinationError;
use crate::SessionId;

/// A successfully applied batch, ready for watch dispatch
#[derive(Debug)]
pub(crate) struct Committed {
    pub(crate) results: Vec<OpResult>,
    pub(crate) triggers: Vec<WatchTrigger>,
    pub(crate) zxid: u64,
}

/// Applies op batches against a [`NodeStore`] with all-or-nothing semantics.
///
/// The caller must hold the store write lock for the whole call and must fire
/// the returned triggers before releasing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionEngine;

impl TransactionEngine {
    /// Applies `ops` in order on behalf of `session_id`.
    ///
    /// On the first failing op every earlier effect is rolled back and the
    /// call fails with `TransactionAborted { index, source }`. An empty batch
    /// commits nothing and consumes no zxid.
    pub(crate) fn apply(
        store: &mut NodeStore,
        ops: &[Op],
        session_id: SessionId,
        now: u64,
    ) -> Result<Committed, CoordinationError> {
        if ops.is_empty() {
            return Ok(Committed {
                results: Vec::new(),
                triggers: Vec::new(),
                zxid: store.last_zxid(),
            });
        }

        let mut mutation = store.begin(now);
        let mut results = Vec::with_capacity(ops.len());

        for (index, op) in ops.iter().enumerate() {
            match Self::apply_op(store, &mut mutation, op, session_id) {
                Ok(result) => results.push(result),
                Err(source) => {
                    debug!(
                        session_id,
                        index,
                        op = %op.op_type(),
                        path = op.path(),
                        "transaction aborted: {}",
                        source
                    );
                    store.rollback(mutation);
                    TRANSACTIONS.with_label_values(&["aborted"]).inc();
                    return Err(CoordinationError::TransactionAborted {
                        index,
                        source: Box::new(source),
                    });
                }
            }
        }

        let zxid = mutation.zxid();
        let triggers = store.commit(mutation);
        TRANSACTIONS.with_label_values(&["committed"]).inc();
        debug!(session_id, zxid, ops = ops.len(), "transaction committed");

        Ok(Committed {
            results,
            triggers,
            zxid,
        })
    }

    fn apply_op(
        store: &mut NodeStore,
        mutation: &mut Mutation,
        op: &Op,
        session_id: SessionId,
    ) -> Result<OpResult, CoordinationError> {
        match op {
            Op::Create {
                path,
                data,
                mode,
                create_parents,
            } => {
                let actual = store.create(
                    mutation,
                    path,
                    data.clone(),
                    *mode,
                    session_id,
                    *create_parents,
                )?;
                Ok(OpResult::Create { path: actual })
            }
            Op::SetData {
                path,
                data,
                version,
            } => {
                let stat = store.set_data(mutation, path, data.clone(), *version)?;
                Ok(OpResult::SetData {
                    path: path.clone(),
                    stat,
                })
            }
            Op::Delete {
                path,
                version,
                recursive,
            } => {
                store.delete(mutation, path, *version, *recursive)?;
                Ok(OpResult::Delete { path: path.clone() })
            }
            Op::Check { path, version } => {
                store.check(path, Some(*version))?;
                Ok(OpResult::Check { path: path.clone() })
            }
        }
    }
}
