//! The coordination core.
//!
//! [`Coordinator`] owns the node store, the session table and the watch table
//! and routes every request through them:
//!
//! ```text
//! request -> session check -> store (write lock) -> commit zxid -> fire watches -> reply
//!                                  ^
//! sweeper -> expire_sessions ------┘ (delete ephemerals, drop watches, drop session)
//! ```

mod builder;
mod coordinator;


pub use builder::*;
pub use coordinator::*;
