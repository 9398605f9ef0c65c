//! In-memory hierarchical node store.
//!
//! `NodeStore` owns the namespace and every node record. It is not internally
//! synchronized: the coordinator wraps it in a single `RwLock`, so all
//! mutations are serialized through one writer and reads observe committed
//! state only.
//!
//! Every mutation runs inside a [`Mutation`], which
//! - carries the zxid and timestamp of the commit being built,
//! - journals the prior image of each node it touches so the whole batch can
//!   be rolled back,
//! - collects the watch triggers the batch implies.
//!
//! ```text
//! begin() -> create/set_data/delete/check ... -> commit()  (zxid published, triggers returned)
//!                                           \-> rollback() (prior images restored)
//! ```

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use super::node::Node;
use super::path;
use super::CreateMode;
use super::Stat;
use crate::constants::ROOT_PATH;
use crate::constants::SNAPSHOT_FORMAT_VERSION;
use crate::watch::EventType;
use crate::watch::WatchTrigger;
use crate::CoordinationError;
use crate::Result;
use crate::SerializationError;
use crate::SessionId;

type StoreResult<T> = std::result::Result<T, CoordinationError>;

/// One in-flight commit: zxid, timestamp, undo journal and implied triggers.
#[derive(Debug)]
pub(crate) struct Mutation {
    zxid: u64,
    now: u64,
    journal: Vec<(String, Option<Node>)>,
    touched: HashSet<String>,
    triggers: Vec<WatchTrigger>,
}

impl Mutation {
    pub(crate) fn zxid(&self) -> u64 {
        self.zxid
    }
}

#[derive(Debug)]
pub struct NodeStore {
    nodes: HashMap<String, Node>,
    /// session -> paths of the ephemeral nodes it owns
    ephemerals: HashMap<SessionId, BTreeSet<String>>,
    last_zxid: u64,
}

#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    format_version: u32,
    last_zxid: u64,
    nodes: Vec<(String, Node)>,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    /// Creates a store holding only the root node
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_PATH.to_string(), Node::new(Bytes::new(), 0, 0, None));
        Self {
            nodes,
            ephemerals: HashMap::new(),
            last_zxid: 0,
        }
    }

    //-----------------------------------------------------------
    // Reads

    pub fn get(
        &self,
        path: &str,
    ) -> Option<(Bytes, Stat)> {
        self.nodes.get(path).map(|node| (node.data.clone(), node.stat()))
    }

    pub fn stat(
        &self,
        path: &str,
    ) -> Option<Stat> {
        self.nodes.get(path).map(Node::stat)
    }

    pub fn exists(
        &self,
        path: &str,
    ) -> bool {
        self.nodes.contains_key(path)
    }

    /// Child names in lexicographic order
    pub fn children(
        &self,
        path: &str,
    ) -> Option<Vec<String>> {
        self.nodes.get(path).map(|node| node.children.iter().cloned().collect())
    }

    /// Paths of the ephemeral nodes owned by `session_id`
    pub fn ephemerals_of(
        &self,
        session_id: SessionId,
    ) -> Vec<String> {
        self.ephemerals
            .get(&session_id)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Full path of the first child of `parent` whose name starts with `prefix`
    pub fn find_child_with_prefix(
        &self,
        parent: &str,
        prefix: &str,
    ) -> Option<String> {
        self.nodes
            .get(parent)?
            .children
            .iter()
            .find(|name| name.starts_with(prefix))
            .map(|name| path::join(parent, name))
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn last_zxid(&self) -> u64 {
        self.last_zxid
    }

    //-----------------------------------------------------------
    // Commit lifecycle

    pub(crate) fn begin(
        &self,
        now: u64,
    ) -> Mutation {
        Mutation {
            zxid: self.last_zxid + 1,
            now,
            journal: Vec::new(),
            touched: HashSet::new(),
            triggers: Vec::new(),
        }
    }

    /// Publishes the mutation's zxid and hands back its triggers in commit order
    pub(crate) fn commit(
        &mut self,
        mutation: Mutation,
    ) -> Vec<WatchTrigger> {
        self.last_zxid = mutation.zxid;
        trace!(
            zxid = mutation.zxid,
            touched = mutation.touched.len(),
            "mutation committed"
        );
        mutation.triggers
    }

    /// Restores every node touched by `mutation` to its prior image
    pub(crate) fn rollback(
        &mut self,
        mutation: Mutation,
    ) {
        debug!(
            zxid = mutation.zxid,
            touched = mutation.touched.len(),
            "rolling back mutation"
        );
        for (node_path, prior) in mutation.journal.into_iter().rev() {
            if let Some(current) = self.nodes.remove(&node_path) {
                self.unindex_ephemeral(&node_path, &current);
            }
            if let Some(node) = prior {
                self.index_ephemeral(&node_path, &node);
                self.nodes.insert(node_path, node);
            }
        }
    }

    //-----------------------------------------------------------
    // Mutations

    /// Creates a node and returns its actual path (differs from `path` for sequential modes).
    ///
    /// `session_id` becomes the owner when `mode` is ephemeral.
    pub(crate) fn create(
        &mut self,
        mutation: &mut Mutation,
        path: &str,
        data: Bytes,
        mode: CreateMode,
        session_id: SessionId,
        create_parents: bool,
    ) -> StoreResult<String> {
        if mode.is_sequential() {
            path::validate_sequential_prefix(path)?;
        } else {
            path::validate_path(path)?;
        }
        let parent = match path::parent_of(path) {
            Some(parent) => parent,
            // `/` plus a counter names a child of the root
            None if mode.is_sequential() => ROOT_PATH,
            None => {
                return Err(CoordinationError::NodeExists {
                    path: path.to_string(),
                })
            }
        };

        if !self.nodes.contains_key(parent) {
            if !create_parents {
                return Err(CoordinationError::NoParent {
                    path: path.to_string(),
                });
            }
            for ancestor in path::ancestors(path) {
                if !self.nodes.contains_key(ancestor) {
                    self.insert_node(mutation, ancestor, Bytes::new(), None)?;
                }
            }
        }

        let actual = if mode.is_sequential() {
            self.remember(mutation, parent);
            let parent_node = self.node_mut(parent)?;
            let sequence = parent_node.next_sequence;
            parent_node.next_sequence += 1;
            path::with_sequence(path, sequence)
        } else {
            path.to_string()
        };

        let owner = mode.is_ephemeral().then_some(session_id);
        self.insert_node(mutation, &actual, data, owner)?;
        Ok(actual)
    }

    /// Writes data and returns the new stat
    pub(crate) fn set_data(
        &mut self,
        mutation: &mut Mutation,
        path: &str,
        data: Bytes,
        expected_version: Option<u64>,
    ) -> StoreResult<Stat> {
        self.check(path, expected_version)?;

        self.remember(mutation, path);
        let (zxid, now) = (mutation.zxid, mutation.now);
        let node = self.node_mut(path)?;
        node.data = data;
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = now;
        let stat = node.stat();

        mutation
            .triggers
            .push(WatchTrigger::new(path, EventType::NodeDataChanged));
        Ok(stat)
    }

    /// Deletes a node; with `recursive` its whole subtree goes, deepest first.
    pub(crate) fn delete(
        &mut self,
        mutation: &mut Mutation,
        path: &str,
        expected_version: Option<u64>,
        recursive: bool,
    ) -> StoreResult<()> {
        if path == ROOT_PATH {
            return Err(CoordinationError::invalid_path(
                path,
                "the root node cannot be deleted",
            ));
        }
        let stat = self.check(path, expected_version)?;
        if stat.num_children > 0 && !recursive {
            return Err(CoordinationError::NotEmpty {
                path: path.to_string(),
            });
        }

        for victim in self.subtree_post_order(path) {
            self.remove_node(mutation, &victim)?;
        }
        Ok(())
    }

    /// Pure precondition: node exists and, if given, its data version matches
    pub(crate) fn check(
        &self,
        path: &str,
        expected_version: Option<u64>,
    ) -> StoreResult<Stat> {
        path::validate_path(path)?;
        let stat = self.stat(path).ok_or_else(|| CoordinationError::NoNode {
            path: path.to_string(),
        })?;
        match expected_version {
            Some(expected) if expected != stat.version => {
                Err(CoordinationError::VersionConflict {
                    path: path.to_string(),
                    expected,
                    actual: stat.version,
                })
            }
            _ => Ok(stat),
        }
    }

    //-----------------------------------------------------------
    // Snapshots

    /// Serializes the namespace
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mut nodes: Vec<(String, Node)> =
            self.nodes.iter().map(|(p, n)| (p.clone(), n.clone())).collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0));

        let snapshot = StoreSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            last_zxid: self.last_zxid,
            nodes,
        };
        Ok(bincode::serialize(&snapshot).map_err(SerializationError::from)?)
    }

    /// Rebuilds a store from [`NodeStore::snapshot`] output.
    ///
    /// Ephemeral nodes are dropped: the sessions owning them did not survive.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let snapshot: StoreSnapshot =
            bincode::deserialize(bytes).map_err(SerializationError::from)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SerializationError::Corrupted(format!(
                "unsupported snapshot format {}",
                snapshot.format_version
            ))
            .into());
        }

        let mut nodes: HashMap<String, Node> = snapshot.nodes.into_iter().collect();
        if !nodes.contains_key(ROOT_PATH) {
            return Err(SerializationError::Corrupted("missing root node".into()).into());
        }

        let ephemeral: Vec<String> = nodes
            .iter()
            .filter(|(_, node)| node.is_ephemeral())
            .map(|(p, _)| p.clone())
            .collect();
        for node_path in &ephemeral {
            nodes.remove(node_path);
            if let Some(parent) = path::parent_of(node_path).and_then(|p| nodes.get_mut(p)) {
                parent.children.remove(path::node_name(node_path));
            }
        }

        for (node_path, node) in &nodes {
            for child in &node.children {
                if !nodes.contains_key(&path::join(node_path, child)) {
                    return Err(SerializationError::Corrupted(format!(
                        "{node_path} lists missing child {child}"
                    ))
                    .into());
                }
            }
            if let Some(parent) = path::parent_of(node_path) {
                let listed = nodes
                    .get(parent)
                    .map(|p| p.children.contains(path::node_name(node_path)))
                    .unwrap_or(false);
                if !listed {
                    return Err(SerializationError::Corrupted(format!(
                        "{node_path} is not linked to a parent"
                    ))
                    .into());
                }
            }
        }

        debug!(
            nodes = nodes.len(),
            dropped_ephemerals = ephemeral.len(),
            last_zxid = snapshot.last_zxid,
            "node store restored"
        );
        Ok(Self {
            nodes,
            ephemerals: HashMap::new(),
            last_zxid: snapshot.last_zxid,
        })
    }

    //-----------------------------------------------------------
    // Internals

    /// Journals the prior image of `node_path` the first time it is touched
    fn remember(
        &self,
        mutation: &mut Mutation,
        node_path: &str,
    ) {
        if mutation.touched.insert(node_path.to_string()) {
            mutation
                .journal
                .push((node_path.to_string(), self.nodes.get(node_path).cloned()));
        }
    }

    fn node_mut(
        &mut self,
        node_path: &str,
    ) -> StoreResult<&mut Node> {
        self.nodes.get_mut(node_path).ok_or_else(|| CoordinationError::NoNode {
            path: node_path.to_string(),
        })
    }

    /// Links a new node under its (existing) parent
    fn insert_node(
        &mut self,
        mutation: &mut Mutation,
        node_path: &str,
        data: Bytes,
        owner: Option<SessionId>,
    ) -> StoreResult<()> {
        let parent = path::parent_of(node_path)
            .ok_or_else(|| CoordinationError::invalid_path(node_path, "path has no parent"))?;
        match self.nodes.get(parent) {
            None => {
                return Err(CoordinationError::NoParent {
                    path: node_path.to_string(),
                })
            }
            Some(parent_node) if parent_node.is_ephemeral() => {
                return Err(CoordinationError::NoChildrenForEphemerals {
                    path: parent.to_string(),
                })
            }
            Some(_) => {}
        }
        if self.nodes.contains_key(node_path) {
            return Err(CoordinationError::NodeExists {
                path: node_path.to_string(),
            });
        }

        self.remember(mutation, parent);
        self.remember(mutation, node_path);

        let (zxid, now) = (mutation.zxid, mutation.now);
        let parent_node = self.node_mut(parent)?;
        parent_node.children.insert(path::node_name(node_path).to_string());
        parent_node.stat.cversion += 1;
        parent_node.stat.pzxid = zxid;

        let node = Node::new(data, zxid, now, owner);
        self.index_ephemeral(node_path, &node);
        self.nodes.insert(node_path.to_string(), node);

        mutation
            .triggers
            .push(WatchTrigger::new(node_path, EventType::NodeCreated));
        mutation
            .triggers
            .push(WatchTrigger::new(parent, EventType::NodeChildrenChanged));
        Ok(())
    }

    /// Unlinks a childless node from its parent
    fn remove_node(
        &mut self,
        mutation: &mut Mutation,
        node_path: &str,
    ) -> StoreResult<()> {
        let parent = path::parent_of(node_path)
            .ok_or_else(|| CoordinationError::invalid_path(node_path, "path has no parent"))?;

        self.remember(mutation, parent);
        self.remember(mutation, node_path);

        let node = self.nodes.remove(node_path).ok_or_else(|| CoordinationError::NoNode {
            path: node_path.to_string(),
        })?;
        self.unindex_ephemeral(node_path, &node);

        let zxid = mutation.zxid;
        let parent_node = self.node_mut(parent)?;
        parent_node.children.remove(path::node_name(node_path));
        parent_node.stat.cversion += 1;
        parent_node.stat.pzxid = zxid;

        mutation
            .triggers
            .push(WatchTrigger::new(node_path, EventType::NodeDeleted));
        mutation
            .triggers
            .push(WatchTrigger::new(parent, EventType::NodeChildrenChanged));
        Ok(())
    }

    /// `root` and all of its descendants, every child before its parent
    fn subtree_post_order(
        &self,
        root: &str,
    ) -> Vec<String> {
        let mut order = Vec::new();
        let mut stack = vec![(root.to_string(), false)];
        while let Some((node_path, expanded)) = stack.pop() {
            if expanded {
                order.push(node_path);
                continue;
            }
            let children: Vec<String> = self
                .nodes
                .get(&node_path)
                .map(|node| node.children.iter().rev().map(|c| path::join(&node_path, c)).collect())
                .unwrap_or_default();
            stack.push((node_path, true));
            stack.extend(children.into_iter().map(|c| (c, false)));
        }
        order
    }

    fn index_ephemeral(
        &mut self,
        node_path: &str,
        node: &Node,
    ) {
        if let Some(owner) = node.stat.ephemeral_owner {
            self.ephemerals.entry(owner).or_default().insert(node_path.to_string());
        }
    }

    fn unindex_ephemeral(
        &mut self,
        node_path: &str,
        node: &Node,
    ) {
        if let Some(owner) = node.stat.ephemeral_owner {
            if let Some(paths) = self.ephemerals.get_mut(&owner) {
                paths.remove(node_path);
                if paths.is_empty() {
                    self.ephemerals.remove(&owner);
                }
            }
        }
    }
}
