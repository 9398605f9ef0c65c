use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;
use tracing::info;

use super::SessionId;
use crate::config::SessionConfig;
use crate::metrics::LIVE_SESSIONS;
use crate::metrics::SESSIONS_OPENED;
use crate::metrics::SESSIONS_TERMINATED;
use crate::utils::time::Clock;
use crate::CoordinationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Live,
    /// Termination in progress; the session accepts no further requests
    Closing,
}

/// Snapshot of one session record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    /// Timeout after clamping to the configured bounds
    pub timeout: Duration,
    pub last_heartbeat_ms: u64,
    pub deadline_ms: u64,
    pub state: SessionState,
}

impl Session {
    pub fn is_expired_at(
        &self,
        now_ms: u64,
    ) -> bool {
        self.deadline_ms <= now_ms
    }

    fn refresh(
        &mut self,
        now_ms: u64,
    ) {
        self.last_heartbeat_ms = now_ms;
        self.deadline_ms = now_ms.saturating_add(self.timeout.as_millis() as u64);
    }
}

/// Why a session record was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    Closed,
    Expired,
}

impl TerminationCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationCause::Closed => "closed",
            TerminationCause::Expired => "expired",
        }
    }
}

/// Session table: ids, negotiated timeouts, heartbeats and deadlines.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<SessionId, Session>,
    next_id: AtomicU64,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            config,
            clock,
        }
    }

    /// Opens a session with the hinted timeout clamped to the configured bounds
    pub fn create(
        &self,
        timeout_hint: Duration,
    ) -> Session {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut session = Session {
            id,
            timeout: self.config.negotiate(timeout_hint),
            last_heartbeat_ms: 0,
            deadline_ms: 0,
            state: SessionState::Live,
        };
        session.refresh(self.clock.now_millis());
        self.sessions.insert(id, session.clone());

        SESSIONS_OPENED.inc();
        LIVE_SESSIONS.inc();
        info!(
            session_id = id,
            timeout_ms = session.timeout.as_millis() as u64,
            "Session opened"
        );
        session
    }

    /// Pushes the deadline to `now + timeout`. Returns the new deadline.
    pub fn heartbeat(
        &self,
        session_id: SessionId,
    ) -> Result<u64, CoordinationError> {
        let now = self.clock.now_millis();
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(CoordinationError::SessionExpired { session_id })?;
        if session.state != SessionState::Live || session.is_expired_at(now) {
            return Err(CoordinationError::SessionExpired { session_id });
        }
        session.refresh(now);
        Ok(session.deadline_ms)
    }

    /// Fails unless the session exists, is not closing and is within its deadline
    pub fn ensure_live(
        &self,
        session_id: SessionId,
    ) -> Result<(), CoordinationError> {
        if self.is_live(session_id) {
            Ok(())
        } else {
            Err(CoordinationError::SessionExpired { session_id })
        }
    }

    pub fn is_live(
        &self,
        session_id: SessionId,
    ) -> bool {
        let now = self.clock.now_millis();
        self.sessions
            .get(&session_id)
            .map(|s| s.state == SessionState::Live && !s.is_expired_at(now))
            .unwrap_or(false)
    }

    /// Live sessions whose deadline is at or before `now_ms`
    pub fn expired(
        &self,
        now_ms: u64,
    ) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|s| s.state == SessionState::Live && s.is_expired_at(now_ms))
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Moves a live session to `Closing`. Returns false if it was unknown or already closing.
    pub fn mark_closing(
        &self,
        session_id: SessionId,
    ) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(mut session) if session.state == SessionState::Live => {
                session.state = SessionState::Closing;
                true
            }
            _ => false,
        }
    }

    /// Drops the session record
    pub fn remove(
        &self,
        session_id: SessionId,
        cause: TerminationCause,
    ) -> Option<Session> {
        let (_, session) = self.sessions.remove(&session_id)?;
        SESSIONS_TERMINATED.with_label_values(&[cause.as_str()]).inc();
        LIVE_SESSIONS.dec();
        debug!(session_id, cause = cause.as_str(), "Session removed");
        Some(session)
    }

    pub fn get(
        &self,
        session_id: SessionId,
    ) -> Option<Session> {
        self.sessions.get(&session_id).map(|s| s.clone())
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
