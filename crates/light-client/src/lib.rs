//! # Ostracon Light Client
//!
//! Header verification without block replay, and the state provider built
//! on it. Starting from one trusted (height, hash) anchor, headers are
//! verified sequentially by checking hash linkage and a weighted voter
//! commit threshold at every height. The [`StateProvider`] turns verified
//! headers into the [`ChainState`](ostracon_types::ChainState) snapshot
//! state sync hands to the consensus engine.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;
pub mod provider;
pub mod source;
pub mod verifier;

pub use client::LightClient;
pub use provider::StateProvider;
pub use source::{BlockSource, LightBlock, TrustOptions};

use thiserror::Error;

/// Errors surfaced by light-client verification and the state provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Fewer than two distinct block sources were supplied.
    #[error("at least 2 RPC servers are required, got {0}")]
    InsufficientProviders(usize),

    /// Trust period must be positive.
    #[error("invalid TrustOptions: negative or zero period")]
    InvalidTrustPeriod,

    /// Trust height must be positive.
    #[error("invalid TrustOptions: negative or zero height")]
    InvalidTrustHeight,

    /// The trusted anchor header has drifted outside the trust period.
    #[error("trusted header at height {height} is outside the trust period")]
    OutsideTrustPeriod {
        /// Height of the expired anchor.
        height: i64,
    },

    /// A header failed verification.
    #[error("verification failed at height {height}: {reason}")]
    Verification {
        /// Height the failure occurred at.
        height: i64,
        /// What did not hold.
        reason: String,
    },

    /// No source could serve the requested height.
    #[error("no block source could provide height {0}")]
    NoSource(i64),

    /// A block source failed.
    #[error("block source: {0}")]
    Source(String),
}

/// Result type for light-client operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
