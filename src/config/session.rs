use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Session negotiation and expiry parameters
///
/// A client's requested timeout is clamped into
/// `[min_session_timeout_ms, max_session_timeout_ms]`. The sweeper wakes every
/// `sweep_interval_ms` and expires sessions whose deadline has passed, so an
/// ephemeral node can outlive its session by at most one sweep interval.
///
/// ```toml
/// [session]
/// min_session_timeout_ms = 4000
/// max_session_timeout_ms = 40000
/// sweep_interval_ms = 1000
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    /// Lower bound for negotiated session timeouts
    #[serde(default = "default_min_session_timeout_ms")]
    pub min_session_timeout_ms: u64,

    /// Upper bound for negotiated session timeouts
    #[serde(default = "default_max_session_timeout_ms")]
    pub max_session_timeout_ms: u64,

    /// Period of the background expiry sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_session_timeout_ms: default_min_session_timeout_ms(),
            max_session_timeout_ms: default_max_session_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_session_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "min_session_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.min_session_timeout_ms > self.max_session_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "min_session_timeout_ms {} cannot exceed max_session_timeout_ms {}",
                self.min_session_timeout_ms, self.max_session_timeout_ms
            ))));
        }

        if self.sweep_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "sweep_interval_ms cannot be 0".into(),
            )));
        }

        // Staleness of ephemeral nodes is bounded by one sweep period
        if self.sweep_interval_ms > self.min_session_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "sweep_interval_ms {} must not exceed min_session_timeout_ms {}",
                self.sweep_interval_ms, self.min_session_timeout_ms
            ))));
        }

        Ok(())
    }

    /// Clamps a client's requested timeout into the configured bounds
    pub fn negotiate(
        &self,
        requested: Duration,
    ) -> Duration {
        let requested_ms = requested.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(
            requested_ms.clamp(self.min_session_timeout_ms, self.max_session_timeout_ms),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn default_min_session_timeout_ms() -> u64 {
    4_000
}
fn default_max_session_timeout_ms() -> u64 {
    40_000
}
fn default_sweep_interval_ms() -> u64 {
    1_000
}
