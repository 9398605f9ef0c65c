//! Hierarchical node storage: node records, path rules and the journaled
//! [`NodeStore`] every mutation is applied to.

mod node;
mod node_store;
pub(crate) mod path;

pub use node::CreateMode;
pub use node::Stat;
pub use node_store::NodeStore;
pub(crate) use node_store::Mutation;

#[cfg(test)]
mod node_store_test;
