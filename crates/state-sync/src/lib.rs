//! # Ostracon State Sync
//!
//! Bootstraps a node at a recent height by restoring an application
//! snapshot instead of replaying history. The reactor discovers snapshots
//! from peers and serves the local application's snapshots back; the
//! [`Syncer`] offers a discovered snapshot to the application, fetches its
//! chunks in parallel, applies them in strict index order, and verifies the
//! resulting app hash against a light-client-verified header before handing
//! the trusted [`ChainState`](ostracon_types::ChainState) upward.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod chunks;
pub mod messages;
pub mod reactor;
pub mod snapshots;
pub mod syncer;

pub use chunks::{Chunk, ChunkQueue};
pub use reactor::Reactor;
pub use snapshots::{Snapshot, SnapshotKey, SnapshotPool};
pub use syncer::{StateSource, Syncer};

use thiserror::Error;

/// Errors surfaced by the state-sync subsystem.
#[derive(Debug, Error)]
pub enum StateSyncError {
    /// The application rejected the offered snapshot.
    #[error("snapshot was rejected by the application")]
    SnapshotRejected,

    /// The restored state's app hash did not match the verified header.
    #[error("app hash of the restored snapshot does not match the verified header")]
    SnapshotAppHashMismatch,

    /// The application aborted state sync outright.
    #[error("state sync was aborted by the application")]
    Aborted,

    /// No viable snapshot remained after discovery and blacklisting.
    #[error("no suitable snapshots found")]
    NoSnapshots,

    /// The application asked to restart from a different snapshot.
    #[error("snapshot restore failed, retrying with a different snapshot")]
    RetrySnapshot,

    /// A chunk index outside the snapshot's chunk count.
    #[error("chunk index {index} out of range for snapshot with {chunks} chunks")]
    ChunkOutOfRange {
        /// Offending index.
        index: u32,
        /// Chunk count of the snapshot being restored.
        chunks: u32,
    },

    /// The chunk queue was closed while an operation was in flight.
    #[error("chunk queue is closed")]
    ChunkQueueClosed,

    /// A state-sync wire message failed to decode.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Light-client verification or state retrieval failed.
    #[error(transparent)]
    Provider(#[from] ostracon_light_client::ProviderError),

    /// The ABCI connection to the application failed.
    #[error(transparent)]
    Abci(#[from] ostracon_abci::ClientError),

    /// Sending on a peer channel failed.
    #[error(transparent)]
    Transport(#[from] ostracon_core::TransportError),

    /// Chunk buffering I/O failed.
    #[error("chunk storage: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for state-sync operations.
pub type Result<T> = std::result::Result<T, StateSyncError>;
