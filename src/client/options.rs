use crate::storage::CreateMode;

/// How [`Client::create`](super::Client::create) builds the node
///
/// ```ignore
/// let opts = CreateOptions::new()
///     .mode(CreateMode::EphemeralSequential)
///     .protected()
///     .create_parents();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub mode: CreateMode,
    /// Survive ambiguous outcomes: retry with a protection token instead of failing
    pub protected: bool,
    /// Create missing ancestors as persistent nodes
    pub create_parents: bool,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(
        mut self,
        mode: CreateMode,
    ) -> Self {
        self.mode = mode;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn create_parents(mut self) -> Self {
        self.create_parents = true;
        self
    }
}

/// How [`Client::delete`](super::Client::delete) removes the node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Expected data version; `None` deletes unconditionally
    pub version: Option<u64>,
    /// Keep retrying (in the background if needed) until the node is gone
    pub guaranteed: bool,
    /// Remove descendants first
    pub deleting_children: bool,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(
        mut self,
        version: u64,
    ) -> Self {
        self.version = Some(version);
        self
    }

    pub fn guaranteed(mut self) -> Self {
        self.guaranteed = true;
        self
    }

    pub fn deleting_children(mut self) -> Self {
        self.deleting_children = true;
        self
    }
}
