use std::time::Duration;

use config::ConfigError;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Basic retry policy template
///
/// Delays grow exponentially with a random multiplier, the same shape as an
/// `ExponentialBackoffRetry(base, max_retries)` client policy:
/// `base_delay_ms * rand(1..=2^(attempt+1))`, capped at `max_delay_ms`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "{name}: base_delay_ms {} cannot exceed max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }
        Ok(())
    }

    /// Sleep before retry number `attempt` (0-based)
    pub fn delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        // Cap the shift so the multiplier cannot overflow
        let ceiling = 1u64 << (attempt.min(29) + 1);
        let multiplier = rand::thread_rng().gen_range(1..=ceiling);
        let delay = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Divide strategies by client operation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    /// Protected (idempotent) creation after ambiguous outcomes
    #[serde(default)]
    pub protected_create: BackoffPolicy,

    /// Guaranteed deletion; keeps converging in the background once exhausted
    #[serde(default = "default_guaranteed_delete")]
    pub guaranteed_delete: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            protected_create: BackoffPolicy::default(),
            guaranteed_delete: default_guaranteed_delete(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.protected_create.validate("retry.protected_create")?;
        self.guaranteed_delete.validate("retry.guaranteed_delete")?;
        Ok(())
    }
}

fn default_guaranteed_delete() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 5,
        base_delay_ms: 100,
        max_delay_ms: 5_000,
    }
}
fn default_max_retries() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
