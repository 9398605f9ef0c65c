//! Atomic multi-operation transactions.
//!
//! A transaction is an ordered list of [`Op`]s applied against the store under
//! one write lock: either every op takes effect under a single zxid, or none
//! does and the caller learns which op failed.

mod engine;
mod op;

#[cfg(test)]
mod engine_test;

pub use engine::TransactionEngine;
pub use op::*;
