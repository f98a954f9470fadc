//! Length-delimited protobuf framing for the socket transport.
//!
//! Every frame is a varint byte-length followed by that many bytes of
//! protobuf message. Frames above [`MAX_MESSAGE_SIZE`] are rejected on both
//! encode and decode.

use crate::error::ClientError;
use crate::proto::{Request, Response};
use bytes::{Buf, BytesMut};
use prost::Message;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum size of a single wire frame: 100 MiB.
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

// A varint length prefix never needs more than 10 bytes.
const MAX_VARINT_LEN: usize = 10;

fn encode_message<M: Message>(msg: &M, dst: &mut BytesMut) -> Result<(), ClientError> {
    let len = msg.encoded_len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ClientError::OversizeMessage {
            size: len as u64,
            max: MAX_MESSAGE_SIZE as u64,
        });
    }
    dst.reserve(prost::length_delimiter_len(len) + len);
    msg.encode_length_delimited(dst)
        .map_err(|e| ClientError::Decode(e.to_string()))
}

fn decode_message<M: Message + Default>(src: &mut BytesMut) -> Result<Option<M>, ClientError> {
    if src.is_empty() {
        return Ok(None);
    }
    let mut peek = &src[..];
    let len = match prost::decode_length_delimiter(&mut peek) {
        Ok(len) => len,
        // A partial varint is indistinguishable from a malformed one until
        // the maximum delimiter width has arrived.
        Err(_) if src.len() < MAX_VARINT_LEN => return Ok(None),
        Err(e) => return Err(ClientError::Decode(e.to_string())),
    };
    if len > MAX_MESSAGE_SIZE {
        return Err(ClientError::OversizeMessage {
            size: len as u64,
            max: MAX_MESSAGE_SIZE as u64,
        });
    }
    let header_len = src.len() - peek.len();
    if src.len() < header_len + len {
        src.reserve(header_len + len - src.len());
        return Ok(None);
    }
    src.advance(header_len);
    let body = src.split_to(len).freeze();
    M::decode(body).map(Some).map_err(Into::into)
}

/// Consensus-engine side of the connection: writes requests, reads responses.
#[derive(Debug, Default)]
pub struct ClientCodec;

impl Encoder<Request> for ClientCodec {
    type Error = ClientError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_message(&item, dst)
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_message(src)
    }
}

/// Application side of the connection: reads requests, writes responses.
#[derive(Debug, Default)]
pub struct ServerCodec;

impl Encoder<Response> for ServerCodec {
    type Error = ClientError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_message(&item, dst)
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_message(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{response, ResponseEcho};

    #[test]
    fn test_round_trip_single_frame() {
        let mut codec = ClientCodec;
        let mut buf = BytesMut::new();
        codec.encode(Request::echo("ping"), &mut buf).unwrap();

        let mut server = ServerCodec;
        let decoded = server.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.variant_name(), "echo");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_needs_more_data() {
        let mut codec = ClientCodec;
        let mut buf = BytesMut::new();
        codec.encode(Request::echo("a longer message"), &mut buf).unwrap();

        let mut partial = buf.split_to(buf.len() - 3);
        let mut server = ServerCodec;
        assert!(server.decode(&mut partial).unwrap().is_none());
        partial.unsplit(buf);
        assert!(server.decode(&mut partial).unwrap().is_some());
    }

    #[test]
    fn test_multiple_frames_in_one_buffer() {
        let mut codec = ServerCodec;
        let mut buf = BytesMut::new();
        for i in 0..3 {
            let res = Response {
                value: Some(response::Value::Echo(ResponseEcho {
                    message: format!("m{i}"),
                })),
            };
            codec.encode(res, &mut buf).unwrap();
        }

        let mut client = ClientCodec;
        for i in 0..3 {
            let res = client.decode(&mut buf).unwrap().unwrap();
            assert_eq!(res.into_echo().unwrap().message, format!("m{i}"));
        }
        assert!(client.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversize_length_prefix_rejected() {
        let mut buf = BytesMut::new();
        let mut delim = Vec::new();
        prost::encode_length_delimiter(MAX_MESSAGE_SIZE + 1, &mut delim).unwrap();
        buf.extend_from_slice(&delim);

        let mut client = ClientCodec;
        match client.decode(&mut buf) {
            Err(ClientError::OversizeMessage { size, .. }) => {
                assert_eq!(size, MAX_MESSAGE_SIZE as u64 + 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
