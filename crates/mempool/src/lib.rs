//! # Ostracon Mempool
//!
//! Concurrent ordered transaction pool. Transactions pass an admission
//! pipeline (duplicate and capacity checks, pre-check filter, write-ahead
//! log, seen-cache), are validated by the application over the ABCI mempool
//! connection, and sit in admission order until a reap selects a prefix for
//! the next block proposal. After every commit the pool drops the committed
//! transactions and rechecks the remainder inside a
//! BeginRecheckTx/EndRecheckTx window.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod cache;
pub mod pool;
pub mod wal;

pub use cache::TxCache;
pub use pool::{Mempool, PostCheckFn, PreCheckFn, TxInfo};
pub use wal::Wal;

use thiserror::Error;

/// Errors surfaced by mempool admission and maintenance.
#[derive(Debug, Error)]
pub enum MempoolError {
    /// The transaction is already resident in the pool.
    #[error("tx already exists in mempool")]
    TxInMap,

    /// The transaction was seen recently; the sender was recorded on the
    /// resident entry if one exists.
    #[error("tx already exists in cache")]
    TxInCache,

    /// The transaction exceeds the single-transaction size limit.
    #[error("tx too large: got {actual} bytes, max {max} bytes")]
    TxTooLarge {
        /// Configured limit.
        max: usize,
        /// Size of the rejected transaction.
        actual: usize,
    },

    /// The pool is at capacity, counting reservations for checks in flight.
    #[error(
        "mempool is full: {num_txs} txs (max: {max_txs}), {txs_bytes} bytes total (max: {max_txs_bytes})"
    )]
    MempoolFull {
        /// Resident transactions.
        num_txs: usize,
        /// Configured count ceiling.
        max_txs: usize,
        /// Resident bytes.
        txs_bytes: i64,
        /// Configured byte ceiling.
        max_txs_bytes: i64,
    },

    /// The installed pre-check filter rejected the transaction.
    #[error("pre-check failed: {0}")]
    PreCheck(String),

    /// The ABCI mempool connection failed; the error is sticky on the
    /// client.
    #[error(transparent)]
    Client(#[from] ostracon_abci::ClientError),

    /// Appending to the write-ahead log failed; pool state is unchanged.
    #[error("wal: {0}")]
    Wal(String),
}

/// Result type for mempool operations.
pub type Result<T> = std::result::Result<T, MempoolError>;
