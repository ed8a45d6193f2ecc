//! Scanning configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs for a single scan pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Blocks fetched between cooperative yields and progress log lines
    pub batch_size: u64,
    /// Also classify mempool transactions during live sync; recovery
    /// rebuilds always scan the mempool
    pub include_mempool: bool,
    /// Emit an info-level progress line every N batches (0 disables)
    pub log_every_batches: u64,
    /// Delay inserted after each batch; lets tests observe a scan in flight
    #[serde(with = "duration_millis")]
    pub batch_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            include_mempool: true,
            log_every_batches: 10,
            batch_delay: Duration::ZERO,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_mempool(mut self, include_mempool: bool) -> Self {
        self.include_mempool = include_mempool;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
