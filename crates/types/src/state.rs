//! The consensus-engine state snapshot.
//!
//! [`ChainState`] is the handoff format between the light-client state
//! provider and the node: everything the engine needs to resume replication
//! at a height without replaying history.

use crate::{BlockId, ConsensusParams, Hash, ValidatorSet, VoterSet};
use serde::{Deserialize, Serialize};

/// Software and protocol versions baked into state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Version {
    /// Block protocol version.
    pub block: u64,
    /// ABCI application version.
    pub app: u64,
    /// Engine software version string.
    pub software: String,
}

/// A fully-populated state snapshot compatible with the consensus engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChainState {
    /// Chain identifier.
    pub chain_id: String,
    /// Protocol/software versions.
    pub version: Version,
    /// First height of this chain (1 unless restarted from an export).
    pub initial_height: i64,
    /// Height of the last committed block.
    pub last_block_height: i64,
    /// Id of the last committed block.
    pub last_block_id: BlockId,
    /// Time of the last committed block, unix nanoseconds.
    pub last_block_time: i64,
    /// Root of the DeliverTx results at the last height.
    pub last_results_hash: Hash,
    /// Application state commitment after executing the last height.
    pub app_hash: Hash,
    /// Validator set for the next height.
    pub next_validators: ValidatorSet,
    /// Validator set for the current height.
    pub validators: ValidatorSet,
    /// Validator set for the previous height.
    pub last_validators: ValidatorSet,
    /// Height at which `validators` last changed.
    pub last_height_validators_changed: i64,
    /// Voter set sampled for the current height.
    pub voters: VoterSet,
    /// Consensus parameters in force.
    pub consensus_params: ConsensusParams,
    /// Height at which `consensus_params` last changed.
    pub last_height_consensus_params_changed: i64,
}

impl ChainState {
    /// Whether this snapshot carries enough to bootstrap replication.
    pub fn is_bootstrapped(&self) -> bool {
        self.last_block_height > 0 && !self.validators.is_empty()
    }
}
