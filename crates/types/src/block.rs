//! Block structures: header, block id, commit.
//!
//! Only the fields the core subsystems read are modelled; evidence and the
//! full vote machinery live with the consensus engine.

use crate::{Hash, Tx};
use serde::{Deserialize, Serialize};

/// Identifies a block by its header hash and the hash of its part set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockId {
    /// Hash of the block header.
    pub hash: Hash,
    /// Part set header for block gossip.
    pub part_set_header: PartSetHeader,
}

/// Header of the part set a block was split into for gossip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartSetHeader {
    /// Number of parts.
    pub total: u32,
    /// Merkle root of the parts.
    pub hash: Hash,
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Header {
    /// Chain identifier.
    pub chain_id: String,
    /// Block height.
    pub height: i64,
    /// Block time, unix nanoseconds.
    pub time: i64,
    /// Id of the previous block.
    pub last_block_id: BlockId,
    /// Hash of the last commit.
    pub last_commit_hash: Hash,
    /// Merkle root of the transactions.
    pub data_hash: Hash,
    /// Hash of the validator set for this height.
    pub validators_hash: Hash,
    /// Hash of the validator set for the next height.
    pub next_validators_hash: Hash,
    /// Hash of the voter set sampled for this height.
    pub voters_hash: Hash,
    /// Hash of the consensus parameters.
    pub consensus_hash: Hash,
    /// Application state commitment after executing the previous height.
    pub app_hash: Hash,
    /// Root of the DeliverTx results of the previous height.
    pub last_results_hash: Hash,
    /// Address of the block proposer.
    pub proposer_address: Vec<u8>,
}

impl Header {
    /// Deterministic hash of this header.
    pub fn hash(&self) -> Hash {
        // Field-order concatenation; the canonical merkleized encoding lives
        // with the consensus engine, this only needs to be collision-stable.
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(self.chain_id.as_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.time.to_be_bytes());
        buf.extend_from_slice(self.last_block_id.hash.as_bytes());
        buf.extend_from_slice(self.last_commit_hash.as_bytes());
        buf.extend_from_slice(self.data_hash.as_bytes());
        buf.extend_from_slice(self.validators_hash.as_bytes());
        buf.extend_from_slice(self.next_validators_hash.as_bytes());
        buf.extend_from_slice(self.voters_hash.as_bytes());
        buf.extend_from_slice(self.consensus_hash.as_bytes());
        buf.extend_from_slice(self.app_hash.as_bytes());
        buf.extend_from_slice(self.last_results_hash.as_bytes());
        buf.extend_from_slice(&self.proposer_address);
        Hash::sha256(&buf)
    }
}

/// A single signature in a commit. Absent signatures keep their slot to
/// preserve voter-set indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSig {
    /// Address of the signing voter; empty when absent.
    pub validator_address: Vec<u8>,
    /// Signing time, unix nanoseconds.
    pub timestamp: i64,
    /// Raw signature bytes; empty when absent.
    pub signature: Vec<u8>,
}

impl CommitSig {
    /// Whether this slot holds a real signature.
    pub fn is_present(&self) -> bool {
        !self.signature.is_empty()
    }

    /// An absent-signature placeholder.
    pub fn absent() -> Self {
        Self {
            validator_address: Vec::new(),
            timestamp: 0,
            signature: Vec::new(),
        }
    }
}

/// The collection of voter signatures certifying a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Commit {
    /// Height this commit certifies.
    pub height: i64,
    /// Consensus round the block was committed in.
    pub round: i32,
    /// Id of the committed block.
    pub block_id: BlockId,
    /// One slot per voter, in voter-set order.
    pub signatures: Vec<CommitSig>,
}

/// A block as handed to the mempool's `update` after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Block header.
    pub header: Header,
    /// Committed transactions, in execution order.
    pub txs: Vec<Tx>,
    /// Commit for the previous block.
    pub last_commit: Commit,
}

impl Block {
    /// Height shortcut.
    pub fn height(&self) -> i64 {
        self.header.height
    }
}
