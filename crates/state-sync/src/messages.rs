//! Wire messages exchanged on the state-sync channels.
//!
//! Each message travels inside the [`Message`] envelope, prost-encoded;
//! peer framing is the transport's business.

use crate::{Result, StateSyncError};
use bytes::{Bytes, BytesMut};
use ostracon_core::ChannelId;
use prost::Message as _;

/// Channel for snapshot discovery traffic.
pub const SNAPSHOT_CHANNEL: ChannelId = ChannelId(0x60);

/// Channel for chunk transfer traffic.
pub const CHUNK_CHANNEL: ChannelId = ChannelId(0x61);

/// Maximum encoded size of a snapshot-channel message.
pub const SNAPSHOT_MSG_SIZE: usize = 4_000_000;

/// Maximum encoded size of a chunk-channel message.
pub const CHUNK_MSG_SIZE: usize = 16_000_000;

/// Ask a peer to stream its available snapshots.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SnapshotsRequest {}

/// One advertised snapshot. Peers send at most ten, ordered by
/// (height desc, format desc).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SnapshotsResponse {
    /// Height the snapshot was taken at.
    #[prost(uint64, tag = "1")]
    pub height: u64,
    /// Application-defined snapshot format.
    #[prost(uint32, tag = "2")]
    pub format: u32,
    /// Number of chunks, may be zero.
    #[prost(uint32, tag = "3")]
    pub chunks: u32,
    /// Application-defined snapshot digest.
    #[prost(bytes = "bytes", tag = "4")]
    pub hash: Bytes,
    /// Opaque application metadata.
    #[prost(bytes = "bytes", tag = "5")]
    pub metadata: Bytes,
}

/// Ask a peer for one chunk of a snapshot it advertised.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ChunkRequest {
    /// Snapshot height.
    #[prost(uint64, tag = "1")]
    pub height: u64,
    /// Snapshot format.
    #[prost(uint32, tag = "2")]
    pub format: u32,
    /// Chunk index.
    #[prost(uint32, tag = "3")]
    pub index: u32,
}

/// One chunk of a snapshot, or a report that the peer no longer has it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChunkResponse {
    /// Snapshot height.
    #[prost(uint64, tag = "1")]
    pub height: u64,
    /// Snapshot format.
    #[prost(uint32, tag = "2")]
    pub format: u32,
    /// Chunk index.
    #[prost(uint32, tag = "3")]
    pub index: u32,
    /// Chunk body; empty when missing.
    #[prost(bytes = "bytes", tag = "4")]
    pub chunk: Bytes,
    /// Set when the peer cannot serve this chunk.
    #[prost(bool, tag = "5")]
    pub missing: bool,
}

/// Envelope for every state-sync wire message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    /// The message payload.
    #[prost(oneof = "message::Payload", tags = "1, 2, 3, 4")]
    pub payload: Option<message::Payload>,
}

/// Payload variants of [`Message`].
pub mod message {
    /// The state-sync message payload.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        /// Snapshot inventory request.
        #[prost(message, tag = "1")]
        SnapshotsRequest(super::SnapshotsRequest),
        /// One advertised snapshot.
        #[prost(message, tag = "2")]
        SnapshotsResponse(super::SnapshotsResponse),
        /// Chunk fetch request.
        #[prost(message, tag = "3")]
        ChunkRequest(super::ChunkRequest),
        /// Chunk fetch response.
        #[prost(message, tag = "4")]
        ChunkResponse(super::ChunkResponse),
    }
}

impl Message {
    /// Wrap a payload in the envelope.
    pub fn from_payload(payload: message::Payload) -> Self {
        Self {
            payload: Some(payload),
        }
    }
}

impl From<SnapshotsRequest> for Message {
    fn from(m: SnapshotsRequest) -> Self {
        Message::from_payload(message::Payload::SnapshotsRequest(m))
    }
}

impl From<SnapshotsResponse> for Message {
    fn from(m: SnapshotsResponse) -> Self {
        Message::from_payload(message::Payload::SnapshotsResponse(m))
    }
}

impl From<ChunkRequest> for Message {
    fn from(m: ChunkRequest) -> Self {
        Message::from_payload(message::Payload::ChunkRequest(m))
    }
}

impl From<ChunkResponse> for Message {
    fn from(m: ChunkResponse) -> Self {
        Message::from_payload(message::Payload::ChunkResponse(m))
    }
}

/// Encode a message for the wire.
pub fn encode_msg(msg: impl Into<Message>) -> Bytes {
    let msg = msg.into();
    let mut buf = BytesMut::with_capacity(msg.encoded_len());
    // encoding into a pre-sized BytesMut cannot fail
    if msg.encode(&mut buf).is_err() {
        return Bytes::new();
    }
    buf.freeze()
}

/// Decode a message off the wire, rejecting empty envelopes.
pub fn decode_msg(data: &[u8]) -> Result<message::Payload> {
    let msg = Message::decode(data).map_err(|e| StateSyncError::MalformedMessage(e.to_string()))?;
    msg.payload
        .ok_or_else(|| StateSyncError::MalformedMessage("empty message envelope".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let msg = ChunkResponse {
            height: 7,
            format: 1,
            index: 3,
            chunk: Bytes::from_static(&[1, 2, 3]),
            missing: false,
        };
        let encoded = encode_msg(msg.clone());
        match decode_msg(&encoded).unwrap() {
            message::Payload::ChunkResponse(got) => assert_eq!(got, msg),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_msg(&[0xff, 0xff, 0xff]).is_err());
        assert!(decode_msg(&[]).is_err());
    }
}
