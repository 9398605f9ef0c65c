//! Watch Manager for one-shot change notification
//!
//! # Architecture
//!
//! ```text
//! Mutation path (store write lock held):
//!   commit() -> triggers -> fire() -> remove matching watches -> send(per-session queue)
//!                                                                    ↓
//! Client:
//!   UnboundedReceiver<WatchedEvent> drained independently
//! ```
//!
//! - Watches live in a `DashMap<path, HashMap<EventType, Vec<Watcher>>>`.
//!   Firing removes the whole class under the shard lock, so a watch is
//!   delivered at most once and is never left behind after firing.
//! - Each session owns one unbounded queue. Fired events are never dropped,
//!   and because `fire()` runs under the store write lock, events for one path
//!   arrive in commit order.
//! - Closing a session drops its queue and every watch it still holds.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::trace;

use super::EventType;
use super::WatchTrigger;
use super::WatchedEvent;
use crate::config::WatchConfig;
use crate::metrics::WATCHES_FIRED;
use crate::CoordinationError;
use crate::SessionId;

pub type WatchId = u64;

/// Internal watcher state
#[derive(Debug)]
struct Watcher {
    id: WatchId,
    session_id: SessionId,
}

#[derive(Debug)]
pub struct WatchManager {
    /// path -> watch class -> outstanding watches
    watches: DashMap<String, HashMap<EventType, Vec<Watcher>>>,

    /// Delivery queue per live session
    channels: DashMap<SessionId, mpsc::UnboundedSender<WatchedEvent>>,

    /// Outstanding watches per live session; presence marks the session as registered
    outstanding: DashMap<SessionId, usize>,

    /// Next watch ID (monotonically increasing)
    next_id: AtomicU64,

    config: WatchConfig,
}

impl WatchManager {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            watches: DashMap::new(),
            channels: DashMap::new(),
            outstanding: DashMap::new(),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Opens the delivery queue of a new session
    pub fn open_session(
        &self,
        session_id: SessionId,
    ) -> mpsc::UnboundedReceiver<WatchedEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.channels.insert(session_id, sender);
        self.outstanding.insert(session_id, 0);
        receiver
    }

    /// Registers one-shot interest of `session_id` in `event_type` on `path`.
    ///
    /// Returns immediately; fails if the session is not registered or is at its watch limit.
    pub fn register(
        &self,
        session_id: SessionId,
        path: &str,
        event_type: EventType,
    ) -> Result<WatchId, CoordinationError> {
        {
            let mut count = self
                .outstanding
                .get_mut(&session_id)
                .ok_or(CoordinationError::SessionExpired { session_id })?;
            if let Some(limit) = self.config.limit() {
                if *count >= limit {
                    return Err(CoordinationError::TooManyWatches { session_id, limit });
                }
            }
            *count += 1;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.watches
            .entry(path.to_string())
            .or_default()
            .entry(event_type)
            .or_default()
            .push(Watcher { id, session_id });

        trace!(
            watch_id = id,
            session_id,
            path,
            %event_type,
            "Watch registered"
        );
        Ok(id)
    }

    /// Fires the triggers of one commit, in order. Returns the number of notifications sent.
    pub(crate) fn fire(
        &self,
        triggers: &[WatchTrigger],
        zxid: u64,
    ) -> usize {
        triggers.iter().map(|t| self.fire_one(t, zxid)).sum()
    }

    fn fire_one(
        &self,
        trigger: &WatchTrigger,
        zxid: u64,
    ) -> usize {
        let released: Vec<Watcher> = match self.watches.get_mut(&trigger.path) {
            Some(mut classes) => trigger
                .event_type
                .released_classes()
                .iter()
                .filter_map(|class| classes.remove(class))
                .flatten()
                .collect(),
            None => return 0,
        };
        // Guard dropped above; remove_if takes the shard lock itself
        self.watches.remove_if(&trigger.path, |_, classes| classes.is_empty());

        for watcher in &released {
            self.deliver(
                watcher,
                WatchedEvent {
                    path: trigger.path.clone(),
                    event_type: trigger.event_type,
                    zxid,
                },
            );
        }
        if !released.is_empty() {
            WATCHES_FIRED
                .with_label_values(&[trigger.event_type.as_str()])
                .inc_by(released.len() as u64);
        }
        released.len()
    }

    fn deliver(
        &self,
        watcher: &Watcher,
        event: WatchedEvent,
    ) {
        if let Some(mut count) = self.outstanding.get_mut(&watcher.session_id) {
            *count = count.saturating_sub(1);
        }
        match self.channels.get(&watcher.session_id) {
            Some(sender) => {
                trace!(
                    watch_id = watcher.id,
                    session_id = watcher.session_id,
                    path = %event.path,
                    event_type = %event.event_type,
                    "Watch fired"
                );
                if sender.send(event).is_err() {
                    trace!(
                        session_id = watcher.session_id,
                        "Event receiver dropped by client"
                    );
                }
            }
            None => trace!(
                watch_id = watcher.id,
                session_id = watcher.session_id,
                "Watch owner is gone, event discarded"
            ),
        }
    }

    /// Drops the session's queue and all of its outstanding watches
    pub fn remove_session(
        &self,
        session_id: SessionId,
    ) -> usize {
        self.channels.remove(&session_id);
        self.outstanding.remove(&session_id);

        let mut removed = 0;
        self.watches.retain(|_, classes| {
            for watchers in classes.values_mut() {
                let before = watchers.len();
                watchers.retain(|w| w.session_id != session_id);
                removed += before - watchers.len();
            }
            classes.retain(|_, watchers| !watchers.is_empty());
            !classes.is_empty()
        });

        debug!(session_id, removed, "Session watches removed");
        removed
    }

    /// Get the number of outstanding watches for one (path, class)
    pub fn watch_count(
        &self,
        path: &str,
        event_type: EventType,
    ) -> usize {
        self.watches
            .get(path)
            .and_then(|classes| classes.get(&event_type).map(Vec::len))
            .unwrap_or(0)
    }

    /// Get the number of outstanding watches held by a session
    pub fn session_watch_count(
        &self,
        session_id: SessionId,
    ) -> usize {
        self.outstanding.get(&session_id).map(|c| *c).unwrap_or(0)
    }

    /// Get the total number of watched paths
    pub fn watched_path_count(&self) -> usize {
        self.watches.len()
    }
}
