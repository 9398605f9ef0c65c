use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Class of change a watch is interested in, and the type of a delivered event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// The watched path came into existence
    NodeCreated,
    /// The watched node was removed (explicitly or by session expiry)
    NodeDeleted,
    /// The watched node's data was written
    NodeDataChanged,
    /// A child was added to or removed from the watched node
    NodeChildrenChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NodeCreated => "NodeCreated",
            EventType::NodeDeleted => "NodeDeleted",
            EventType::NodeDataChanged => "NodeDataChanged",
            EventType::NodeChildrenChanged => "NodeChildrenChanged",
        }
    }

    /// Watch classes released by a trigger of this type.
    ///
    /// A deletion also releases data and child watches: the node they observe is gone.
    pub(crate) fn released_classes(self) -> &'static [EventType] {
        match self {
            EventType::NodeCreated => &[EventType::NodeCreated],
            EventType::NodeDataChanged => &[EventType::NodeDataChanged],
            EventType::NodeChildrenChanged => &[EventType::NodeChildrenChanged],
            EventType::NodeDeleted => &[
                EventType::NodeDeleted,
                EventType::NodeDataChanged,
                EventType::NodeChildrenChanged,
            ],
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered to the session that registered a watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub path: String,
    pub event_type: EventType,
    /// Commit that caused the notification
    pub zxid: u64,
}

/// A (path, event) pair implied by a committed mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WatchTrigger {
    pub(crate) path: String,
    pub(crate) event_type: EventType,
}

impl WatchTrigger {
    pub(crate) fn new(
        path: impl Into<String>,
        event_type: EventType,
    ) -> Self {
        Self {
            path: path.into(),
            event_type,
        }
    }
}
