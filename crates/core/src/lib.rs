//! # Ostracon Core
//!
//! Cross-crate traits and identifiers for the Ostracon replication engine.
//!
//! The reactors (state-sync and, externally, the gossip switch) talk to the
//! network through the narrow seams defined here, so the engine can be
//! tested without a P2P stack and different transports can be swapped in.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod traits;

pub use traits::{ChannelId, ChannelSender, PeerId, TransportError, TransportResult};
