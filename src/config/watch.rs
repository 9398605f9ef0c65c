use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Watch registration limits
///
/// Delivery queues are unbounded: a fired watch is never dropped, so the
/// only knob is how many outstanding watches one session may hold.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WatchConfig {
    /// Maximum outstanding watches per session (0 = unlimited)
    #[serde(default)]
    pub max_watches_per_session: usize,
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    pub(crate) fn limit(&self) -> Option<usize> {
        (self.max_watches_per_session > 0).then_some(self.max_watches_per_session)
    }
}
