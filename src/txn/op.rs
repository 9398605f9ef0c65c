use std::fmt;

use bytes::Bytes;

use crate::storage::CreateMode;
use crate::storage::Stat;

/// One step of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create {
        path: String,
        data: Bytes,
        mode: CreateMode,
        create_parents: bool,
    },
    SetData {
        path: String,
        data: Bytes,
        /// `None` skips the version check
        version: Option<u64>,
    },
    Delete {
        path: String,
        version: Option<u64>,
        recursive: bool,
    },
    /// Asserts the node exists at exactly `version`; changes nothing
    Check { path: String, version: u64 },
}

impl Op {
    pub fn create(
        path: impl Into<String>,
        data: impl Into<Bytes>,
        mode: CreateMode,
    ) -> Self {
        Op::Create {
            path: path.into(),
            data: data.into(),
            mode,
            create_parents: false,
        }
    }

    pub fn set_data(
        path: impl Into<String>,
        data: impl Into<Bytes>,
        version: Option<u64>,
    ) -> Self {
        Op::SetData {
            path: path.into(),
            data: data.into(),
            version,
        }
    }

    pub fn delete(
        path: impl Into<String>,
        version: Option<u64>,
    ) -> Self {
        Op::Delete {
            path: path.into(),
            version,
            recursive: false,
        }
    }

    pub fn check(
        path: impl Into<String>,
        version: u64,
    ) -> Self {
        Op::Check {
            path: path.into(),
            version,
        }
    }

    /// Create missing ancestors (create) or remove descendants (delete). No-op for other ops.
    pub fn with_tree(mut self) -> Self {
        match &mut self {
            Op::Create { create_parents, .. } => *create_parents = true,
            Op::Delete { recursive, .. } => *recursive = true,
            Op::SetData { .. } | Op::Check { .. } => {}
        }
        self
    }

    pub fn path(&self) -> &str {
        match self {
            Op::Create { path, .. }
            | Op::SetData { path, .. }
            | Op::Delete { path, .. }
            | Op::Check { path, .. } => path,
        }
    }

    pub(crate) fn path_mut(&mut self) -> &mut String {
        match self {
            Op::Create { path, .. }
            | Op::SetData { path, .. }
            | Op::Delete { path, .. }
            | Op::Check { path, .. } => path,
        }
    }

    pub fn op_type(&self) -> OpType {
        match self {
            Op::Create { .. } => OpType::Create,
            Op::SetData { .. } => OpType::SetData,
            Op::Delete { .. } => OpType::Delete,
            Op::Check { .. } => OpType::Check,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Create,
    SetData,
    Delete,
    Check,
}

impl fmt::Display for OpType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(match self {
            OpType::Create => "CREATE",
            OpType::SetData => "SET_DATA",
            OpType::Delete => "DELETE",
            OpType::Check => "CHECK",
        })
    }
}

/// Outcome of one committed op, in op order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// Actual path of the new node (carries the counter for sequential modes)
    Create { path: String },
    SetData { path: String, stat: Stat },
    Delete { path: String },
    Check { path: String },
}

impl OpResult {
    pub fn op_type(&self) -> OpType {
        match self {
            OpResult::Create { .. } => OpType::Create,
            OpResult::SetData { .. } => OpType::SetData,
            OpResult::Delete { .. } => OpType::Delete,
            OpResult::Check { .. } => OpType::Check,
        }
    }

    /// Path the result refers to
    pub fn for_path(&self) -> &str {
        match self {
            OpResult::Create { path }
            | OpResult::SetData { path, .. }
            | OpResult::Delete { path }
            | OpResult::Check { path } => path,
        }
    }

    pub(crate) fn path_mut(&mut self) -> &mut String {
        match self {
            OpResult::Create { path }
            | OpResult::SetData { path, .. }
            | OpResult::Delete { path }
            | OpResult::Check { path } => path,
        }
    }
}
