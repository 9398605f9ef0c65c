//! Client layer for the coordination core
//!
//! Provides the components applications talk to:
//! - [`Client`] - session-bound facade with namespacing and retry options
//! - [`ClientBuilder`] - configurable client construction
//! - [`KeeperApi`] - request surface the client drives (implemented by the coordinator)
//! - [`ProtectedCreate`] / [`GuaranteedDelete`] - retry layer for ambiguous outcomes
//! - [`BackgroundEvent`] - completion report of an operation run in the background
//!
//! # Basic Usage
//! ```ignore
//! use d_keeper::client::{Client, CreateOptions, DeleteOptions};
//! use d_keeper::CreateMode;
//!
//! let client = Client::builder(coordinator.clone())
//!     .namespace("mydemo/v1")
//!     .build()?;
//!
//! let path = client
//!     .create(
//!         "/curator/ephemeral_sequential",
//!         "data",
//!         CreateOptions::new().mode(CreateMode::EphemeralSequential).protected(),
//!     )
//!     .await?;
//!
//! client
//!     .delete("/curator", DeleteOptions::new().guaranteed().deleting_children())
//!     .await?;
//! ```

mod api;
mod background;
mod builder;
#[allow(clippy::module_inception)]
mod client;
mod guaranteed;
mod namespace;
mod options;
mod protection;

pub use api::*;
pub use background::*;
pub use builder::*;
pub use client::*;
pub use guaranteed::*;
pub use namespace::*;
pub use options::*;
pub use protection::*;

#[cfg(test)]
mod guaranteed_test;
