//! ABCI client and server error types

use thiserror::Error;

/// Errors surfaced by ABCI clients and the socket server.
///
/// The type is `Clone` because a pipelined transport failure is sticky: the
/// first error is stored and handed out to every subsequent caller.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport-level I/O failure, stored as a string to stay cloneable.
    #[error("connection error: {0}")]
    Io(String),

    /// A frame exceeded the wire limit.
    #[error("message of {size} bytes exceeds maximum of {max} bytes")]
    OversizeMessage {
        /// Offending frame size.
        size: u64,
        /// The wire limit.
        max: u64,
    },

    /// A frame could not be decoded as a protobuf message.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// A response arrived whose kind does not answer the oldest in-flight
    /// request.
    #[error("unexpected {actual} response when {expected} expected")]
    ProtocolMismatch {
        /// Kind the oldest in-flight request expects.
        expected: &'static str,
        /// Kind that actually arrived.
        actual: &'static str,
    },

    /// A response arrived with no request in flight.
    #[error("unexpected {0} response when nothing expected")]
    UnexpectedResponse(&'static str),

    /// The application returned an in-band Exception response.
    #[error("application exception: {0}")]
    Exception(String),

    /// The client has stopped and accepts no further requests.
    #[error("client has stopped")]
    Stopped,

    /// gRPC transport or status failure.
    #[error("grpc: {0}")]
    Grpc(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<prost::DecodeError> for ClientError {
    fn from(err: prost::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        Self::Grpc(status.to_string())
    }
}

impl From<tonic::transport::Error> for ClientError {
    fn from(err: tonic::transport::Error) -> Self {
        Self::Grpc(err.to_string())
    }
}

/// Result type for ABCI client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
