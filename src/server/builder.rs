use std::sync::Arc;

use tracing::info;

use super::Coordinator;
use crate::config::KeeperConfig;
use crate::storage::NodeStore;
use crate::utils::time::Clock;
use crate::utils::time::SystemClock;
use crate::Result;

/// Assembles a [`Coordinator`]
///
/// ```ignore
/// let coordinator = CoordinatorBuilder::new(KeeperConfig::new()?)
///     .clock(Arc::new(ManualClock::new(0)))
///     .build()?;
/// ```
pub struct CoordinatorBuilder {
    config: KeeperConfig,
    clock: Option<Arc<dyn Clock>>,
    snapshot: Option<Vec<u8>>,
}

impl CoordinatorBuilder {
    pub fn new(config: KeeperConfig) -> Self {
        Self {
            config,
            clock: None,
            snapshot: None,
        }
    }

    /// Time source for deadlines and node timestamps (default: system clock)
    pub fn clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Start from a namespace produced by [`Coordinator::snapshot`]
    ///
    /// Ephemeral nodes in the snapshot are discarded: their sessions did not survive.
    pub fn restore_from(
        mut self,
        snapshot: Vec<u8>,
    ) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Validates the configuration and builds the coordinator
    pub fn build(self) -> Result<Arc<Coordinator>> {
        let config = self.config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let store = match self.snapshot {
            Some(bytes) => {
                let store = NodeStore::restore(&bytes)?;
                info!(
                    nodes = store.node_count(),
                    last_zxid = store.last_zxid(),
                    "Namespace restored from snapshot"
                );
                store
            }
            None => NodeStore::new(),
        };

        info!("Coordinator started with {:?}", config);
        Ok(Arc::new(Coordinator::new(store, config, clock)))
    }
}
