//! Client sessions.
//!
//! A session is created by `connect`, kept alive by heartbeats and terminated
//! either explicitly (`close`) or by the background sweeper once its deadline
//! passes. Termination deletes the session's ephemeral nodes and drops its
//! watches; that transition is driven by the coordinator under the store write
//! lock, this module only owns the session table and the sweep loop.

mod manager;
mod sweeper;


pub use manager::*;
pub use sweeper::*;

/// Session identifier; issued once, never reused.
pub type SessionId = u64;
