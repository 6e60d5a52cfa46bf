//! Configuration for chains and sync.

use meshlog_core::DEFAULT_CHUNK_SIZE;
use meshlog_sync::SyncConfig;

/// Per-chain settings.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Blocks per chunk. Zero is treated as one.
    pub chunk_size: u64,
    /// Reject imported blocks whose signature does not verify with the
    /// chain key.
    pub verify_signatures: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_signatures: false,
        }
    }
}

/// Everything a Meshlog host configures.
#[derive(Debug, Clone, Default)]
pub struct MeshlogConfig {
    pub chain: ChainConfig,
    pub sync: SyncConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MeshlogConfig::default();
        assert_eq!(config.chain.chunk_size, 100);
        assert!(!config.chain.verify_signatures);
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.sync.message_timeout.as_secs(), 30);
    }
}
