//! Network seams for reactor code.
//!
//! A reactor never owns a socket; it is handed a [`ChannelSender`] for each
//! priority channel it speaks on, and receives inbound envelopes through
//! whatever queue its host wires up. This keeps the gossip switch and peer
//! lifecycle entirely outside the engine core.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Errors that can occur when sending on a peer channel.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(PeerId),

    /// The peer's send queue is full.
    #[error("send queue full for peer {0}")]
    QueueFull(PeerId),

    /// Message too large for the channel.
    #[error("message too large: {size} > {max}")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The transport has shut down.
    #[error("transport not running")]
    NotRunning,

    /// Generic transport error.
    #[error("transport error: {0}")]
    Internal(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A unique identifier for a network peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub Bytes);

impl PeerId {
    /// Create a peer ID from raw bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Raw bytes of the peer ID.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A priority channel identifier, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Outbound half of a reactor's view of the network.
///
/// Implementations route an encoded message to one peer on one channel.
/// Sends must not block the caller indefinitely; a full peer queue is
/// reported as [`TransportError::QueueFull`].
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Send `data` to `peer` on `channel`.
    async fn send(&self, peer: &PeerId, channel: ChannelId, data: Bytes) -> TransportResult<()>;

    /// Disconnect and ban a misbehaving peer.
    async fn ban_peer(&self, peer: &PeerId, reason: &str) -> TransportResult<()>;

    /// Peers currently connected on this transport.
    fn connected_peers(&self) -> Vec<PeerId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_display_is_hex() {
        let peer = PeerId::from_bytes(vec![0xab, 0xcd]);
        assert_eq!(peer.to_string(), "abcd");
    }

    #[test]
    fn channel_id_display() {
        assert_eq!(ChannelId(0x60).to_string(), "0x60");
    }
}
