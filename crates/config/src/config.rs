//! Mempool and state-sync configuration sections.
//!
//! Both sections live in the node's single TOML config file; defaults match
//! a production validator profile.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Mempool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of transactions in the pool.
    pub size: usize,

    /// Maximum total size of all transactions in the pool, in bytes.
    pub max_txs_bytes: i64,

    /// Maximum size of a single transaction, in bytes.
    pub max_tx_bytes: usize,

    /// Capacity of the seen-transaction LRU cache; 0 disables caching.
    pub cache_size: usize,

    /// Keep transactions in the cache after the application rejects them.
    pub keep_invalid_txs_in_cache: bool,

    /// Re-run CheckTx on remaining transactions after every commit.
    pub recheck: bool,

    /// Gossip admitted transactions to peers.
    pub broadcast: bool,

    /// Directory for the transaction write-ahead log; empty disables the WAL.
    pub wal_dir: PathBuf,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            size: 5000,
            max_txs_bytes: 1024 * 1024 * 1024, // 1 GiB
            max_tx_bytes: 1024 * 1024,         // 1 MiB
            cache_size: 10_000,
            keep_invalid_txs_in_cache: false,
            recheck: true,
            broadcast: true,
            wal_dir: PathBuf::new(),
        }
    }
}

impl MempoolConfig {
    /// Whether the write-ahead log is enabled.
    pub fn wal_enabled(&self) -> bool {
        !self.wal_dir.as_os_str().is_empty()
    }

    /// Validate option ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.size == 0 {
            return Err(ConfigError::NonPositive {
                field: "mempool.size",
                value: 0,
            });
        }
        if self.max_txs_bytes <= 0 {
            return Err(ConfigError::NonPositive {
                field: "mempool.max_txs_bytes",
                value: self.max_txs_bytes,
            });
        }
        if self.max_tx_bytes == 0 {
            return Err(ConfigError::NonPositive {
                field: "mempool.max_tx_bytes",
                value: 0,
            });
        }
        Ok(())
    }
}

/// State-sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSyncConfig {
    /// Whether to bootstrap from a snapshot instead of replaying blocks.
    pub enable: bool,

    /// RPC servers used by the light client; at least two distinct entries.
    pub rpc_servers: Vec<String>,

    /// Light-client trust period, in seconds.
    pub trust_period_secs: u64,

    /// Trusted header height.
    pub trust_height: i64,

    /// Trusted header hash, hex encoded.
    pub trust_hash: String,

    /// How long to wait for snapshot discovery, in seconds.
    pub discovery_time_secs: u64,

    /// Timeout for a single chunk request, in seconds.
    pub chunk_request_timeout_secs: u64,

    /// Number of concurrent chunk fetchers.
    pub chunk_fetchers: usize,

    /// Directory for buffering received chunks; empty uses the OS temp dir.
    pub temp_dir: PathBuf,
}

impl Default for StateSyncConfig {
    fn default() -> Self {
        Self {
            enable: false,
            rpc_servers: Vec::new(),
            trust_period_secs: 7 * 24 * 3600, // one week
            trust_height: 0,
            trust_hash: String::new(),
            discovery_time_secs: 15,
            chunk_request_timeout_secs: 10,
            chunk_fetchers: 4,
            temp_dir: PathBuf::new(),
        }
    }
}

impl StateSyncConfig {
    /// Trust period as a [`Duration`].
    pub fn trust_period(&self) -> Duration {
        Duration::from_secs(self.trust_period_secs)
    }

    /// Discovery window as a [`Duration`].
    pub fn discovery_time(&self) -> Duration {
        Duration::from_secs(self.discovery_time_secs)
    }

    /// Chunk request timeout as a [`Duration`].
    pub fn chunk_request_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_request_timeout_secs)
    }

    /// Trust hash decoded from hex.
    pub fn trust_hash_bytes(&self) -> ConfigResult<Vec<u8>> {
        let s = self.trust_hash.strip_prefix("0x").unwrap_or(&self.trust_hash);
        let bytes = hex::decode(s)
            .map_err(|_| ConfigError::InvalidTrustHash(self.trust_hash.clone()))?;
        if bytes.len() != 32 {
            return Err(ConfigError::InvalidTrustHash(self.trust_hash.clone()));
        }
        Ok(bytes)
    }

    /// Validate option ranges; only meaningful when `enable` is set.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.enable {
            return Ok(());
        }
        let distinct: HashSet<&String> = self.rpc_servers.iter().collect();
        if distinct.len() < 2 {
            return Err(ConfigError::InsufficientRpcServers(distinct.len()));
        }
        if self.trust_period_secs == 0 {
            return Err(ConfigError::InvalidTrustPeriod);
        }
        self.trust_hash_bytes()?;
        if self.discovery_time_secs == 0 {
            return Err(ConfigError::InvalidTimeout("statesync.discovery_time_secs"));
        }
        if self.chunk_request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(
                "statesync.chunk_request_timeout_secs",
            ));
        }
        if self.chunk_fetchers == 0 {
            return Err(ConfigError::NonPositive {
                field: "statesync.chunk_fetchers",
                value: 0,
            });
        }
        Ok(())
    }
}
