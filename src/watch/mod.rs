//! One-shot watches on node paths.
//!
//! A watch is a `(path, EventType, session)` registration. The first committed
//! mutation that implies a matching trigger removes the watch and enqueues a
//! single [`WatchedEvent`] on the owning session's queue. Clients that want to
//! keep observing a path must register again.
//!
//! | Mutation            | Triggers                                             |
//! |---------------------|------------------------------------------------------|
//! | create `p`          | `(p, NodeCreated)`, `(parent, NodeChildrenChanged)`  |
//! | set_data `p`        | `(p, NodeDataChanged)`                               |
//! | delete `p`          | `(p, NodeDeleted)`, `(parent, NodeChildrenChanged)`  |
//!
//! A `NodeDeleted` trigger also releases data and child watches on `p`.

mod event;
mod manager;


pub use event::EventType;
pub use event::WatchedEvent;
pub(crate) use event::WatchTrigger;
pub use manager::WatchId;
pub use manager::WatchManager;
