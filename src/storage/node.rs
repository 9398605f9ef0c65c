use std::collections::BTreeSet;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::SessionId;

/// Determines lifetime and naming of a created node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CreateMode {
    /// Survives the creating session
    #[default]
    Persistent,
    /// Removed when the owning session ends
    Ephemeral,
    /// Persistent, name suffixed with the parent's sequential counter
    PersistentSequential,
    /// Ephemeral, name suffixed with the parent's sequential counter
    EphemeralSequential,
}

impl CreateMode {
    pub fn new(
        ephemeral: bool,
        sequential: bool,
    ) -> Self {
        match (ephemeral, sequential) {
            (false, false) => CreateMode::Persistent,
            (true, false) => CreateMode::Ephemeral,
            (false, true) => CreateMode::PersistentSequential,
            (true, true) => CreateMode::EphemeralSequential,
        }
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Version and ownership metadata of a node, as seen by one consistent read.
///
/// - **zxid**: every committed mutation receives one. `czxid`/`mzxid` record the
///   commits that created and last wrote the node, `pzxid` the last commit that
///   changed its child list.
/// - **version**: data writes; starts at 0.
/// - **cversion**: child additions and removals; starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stat {
    pub czxid: u64,
    pub mzxid: u64,
    pub pzxid: u64,
    /// Milliseconds since epoch when the node was created
    pub ctime: u64,
    /// Milliseconds since epoch when the data was last written
    pub mtime: u64,
    pub version: u64,
    pub cversion: u64,
    /// Owning session of an ephemeral node
    pub ephemeral_owner: Option<SessionId>,
    pub data_length: usize,
    pub num_children: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Node {
    pub(crate) data: Bytes,
    /// `data_length`/`num_children` are derived on read
    pub(crate) stat: Stat,
    pub(crate) children: BTreeSet<String>,
    /// Next counter handed to a sequential child
    pub(crate) next_sequence: u64,
}

impl Node {
    pub(crate) fn new(
        data: Bytes,
        zxid: u64,
        now: u64,
        ephemeral_owner: Option<SessionId>,
    ) -> Self {
        Self {
            data,
            stat: Stat {
                czxid: zxid,
                mzxid: zxid,
                pzxid: zxid,
                ctime: now,
                mtime: now,
                ephemeral_owner,
                ..Default::default()
            },
            children: BTreeSet::new(),
            next_sequence: 0,
        }
    }

    pub(crate) fn stat(&self) -> Stat {
        Stat {
            data_length: self.data.len(),
            num_children: self.children.len(),
            ..self.stat
        }
    }

    pub(crate) fn is_ephemeral(&self) -> bool {
        self.stat.ephemeral_owner.is_some()
    }
}
