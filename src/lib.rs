//! # d-keeper
//!
//! Hierarchical coordination core: a tree of named nodes with strongly
//! consistent reads and writes, session-scoped ephemeral nodes, atomic
//! multi-operation transactions and one-shot watches.
//!
//! ## Components
//!
//! - [`NodeStore`] - node records, paths, versions and the undo journal
//! - [`SessionManager`] - session ids, negotiated timeouts, heartbeats and expiry
//! - [`WatchManager`] - one-shot watch registration and per-session delivery
//! - [`TransactionEngine`] - all-or-nothing op batches under one zxid
//! - [`client`] - retry layer (protected create, guaranteed delete) and the
//!   namespaced [`Client`](client::Client) facade
//!
//! [`Coordinator`] ties them together behind a single store lock.
//!
//! ## Quick Start
//!
//! ```ignore
//! use d_keeper::client::{Client, CreateOptions};
//! use d_keeper::{CoordinatorBuilder, CreateMode, KeeperConfig};
//!
//! let coordinator = CoordinatorBuilder::new(KeeperConfig::new()?).build()?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
//! coordinator.start_sweeper(shutdown_rx);
//!
//! let client = Client::builder(coordinator.clone()).namespace("mydemo/v1").build()?;
//! client
//!     .create("/service/instance-", "10.0.0.1:80", CreateOptions::new()
//!         .mode(CreateMode::EphemeralSequential)
//!         .create_parents())
//!     .await?;
//! ```

pub mod client;
pub mod config;
mod constants;
mod errors;
pub mod metrics;
pub mod server;
pub mod session;
pub mod storage;
pub mod txn;
pub mod utils;
pub mod watch;

pub use config::KeeperConfig;
pub use constants::PROTECTED_PREFIX;
pub use errors::*;
pub use server::Coordinator;
pub use server::CoordinatorBuilder;
pub use server::SessionHandle;
pub use session::SessionId;
pub use session::SessionManager;
pub use storage::CreateMode;
pub use storage::NodeStore;
pub use storage::Stat;
pub use txn::Op;
pub use txn::OpResult;
pub use txn::OpType;
pub use txn::TransactionEngine;
pub use utils::time::Clock;
pub use utils::time::ManualClock;
pub use utils::time::SystemClock;
pub use watch::EventType;
pub use watch::WatchManager;
pub use watch::WatchedEvent;
