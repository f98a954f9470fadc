//! # Ostracon Types
//!
//! Core type definitions for the Ostracon replication engine.
//!
//! This crate provides the fundamental types shared by the ABCI transport,
//! the mempool and the state-sync subsystems:
//! - [`Tx`] and [`TxKey`] - raw transactions and their SHA-256 identity
//! - [`Block`], [`Header`], [`Commit`] - block structures
//! - [`ValidatorSet`] and [`VoterSet`] - weighted signer sets
//! - [`ChainState`] - the consensus-engine state snapshot produced by the
//!   light-client state provider
//!
//! ## Example
//!
//! ```rust
//! use ostracon_types::{Tx, TxKey};
//!
//! let tx = Tx::from(vec![0x01, 0x02]);
//! let key: TxKey = tx.key();
//! assert_eq!(key, tx.key()); // stable identity
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod block;
pub mod hash;
pub mod params;
pub mod state;
pub mod transaction;
pub mod validator;

// Re-export main types at crate root
pub use block::{Block, BlockId, Commit, CommitSig, Header, PartSetHeader};
pub use hash::Hash;
pub use params::{BlockParams, ConsensusParams, EvidenceParams, VersionParams};
pub use state::{ChainState, Version};
pub use transaction::{Tx, TxKey};
pub use validator::{Validator, ValidatorSet, VoterSet};

/// Result type alias for type-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with Ostracon types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid block structure
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// Invalid validator set
    #[error("invalid validator set: {0}")]
    InvalidValidatorSet(String),
}
