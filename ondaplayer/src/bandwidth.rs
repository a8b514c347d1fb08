//! Persistence of the last adaptive bandwidth estimate.
//!
//! Read by every adaptive provisioning, written on every rendition change.
//! Last writer wins.

use std::sync::{Arc, Mutex};

use ondaconfig::Config;
use tracing::{debug, warn};

pub trait BandwidthStore {
    fn last_bandwidth(&self) -> Option<u64>;

    fn record(&self, bandwidth: u64);
}

/// Process-local store. Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryBandwidthStore {
    slot: Arc<Mutex<Option<u64>>>,
}

impl MemoryBandwidthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(bandwidth: u64) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(bandwidth))),
        }
    }
}

impl BandwidthStore for MemoryBandwidthStore {
    fn last_bandwidth(&self) -> Option<u64> {
        self.slot.lock().ok().and_then(|slot| *slot)
    }

    fn record(&self, bandwidth: u64) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(bandwidth);
        }
    }
}

/// Store backed by the `state.last_bandwidth` configuration key, so the
/// estimate survives a restart.
#[derive(Clone, Debug)]
pub struct ConfigBandwidthStore {
    config: Arc<Config>,
}

impl ConfigBandwidthStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl BandwidthStore for ConfigBandwidthStore {
    fn last_bandwidth(&self) -> Option<u64> {
        match self.config.get_last_bandwidth() {
            Ok(bandwidth) => bandwidth,
            Err(err) => {
                warn!(error = %err, "Cannot read last bandwidth estimate");
                None
            }
        }
    }

    fn record(&self, bandwidth: u64) {
        if let Err(err) = self.config.set_last_bandwidth(bandwidth) {
            warn!(error = %err, bandwidth, "Cannot persist bandwidth estimate");
        } else {
            debug!(bandwidth, "Bandwidth estimate persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_last_writer_wins() {
        let store = MemoryBandwidthStore::new();
        assert_eq!(store.last_bandwidth(), None);
        store.record(1_000_000);
        store.clone().record(2_000_000);
        assert_eq!(store.last_bandwidth(), Some(2_000_000));
    }

    #[test]
    fn test_config_store_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let store = ConfigBandwidthStore::new(Arc::new(Config::load_config(path).unwrap()));
        store.record(4_500_000);

        let reloaded = ConfigBandwidthStore::new(Arc::new(Config::load_config(path).unwrap()));
        assert_eq!(reloaded.last_bandwidth(), Some(4_500_000));
    }
}
