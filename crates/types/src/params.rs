//! Consensus parameters, as carried in chain state.

use serde::{Deserialize, Serialize};

/// Parameters governing block construction and validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Block-level limits.
    pub block: BlockParams,
    /// Evidence handling limits.
    pub evidence: EvidenceParams,
    /// Protocol version pins.
    pub version: VersionParams,
}

/// Block size and gas limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    /// Maximum serialized block size in bytes.
    pub max_bytes: i64,
    /// Maximum total gas per block; -1 is unbounded.
    pub max_gas: i64,
}

/// Evidence acceptance limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParams {
    /// Maximum age of evidence, in blocks.
    pub max_age_num_blocks: i64,
    /// Maximum age of evidence, in nanoseconds.
    pub max_age_duration: i64,
    /// Maximum total evidence size in bytes.
    pub max_bytes: i64,
}

/// Protocol version pins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VersionParams {
    /// ABCI application protocol version.
    pub app_version: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            block: BlockParams {
                max_bytes: 22_020_096, // 21 MiB
                max_gas: -1,
            },
            evidence: EvidenceParams {
                max_age_num_blocks: 100_000,
                max_age_duration: 48 * 3600 * 1_000_000_000,
                max_bytes: 1_048_576,
            },
            version: VersionParams::default(),
        }
    }
}
