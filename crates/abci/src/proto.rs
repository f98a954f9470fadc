//! ABCI wire messages.
//!
//! The request/response tagged unions and their nested message types, kept
//! field-for-field and tag-for-tag compatible with the protobuf schema so
//! that length-delimited frames interoperate with applications written
//! against other implementations. The recheck-window messages occupy the
//! extension tag range (1000+).

use bytes::Bytes;

/// A request from the consensus engine to the application.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    /// The concrete request variant.
    #[prost(
        oneof = "request::Value",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 1000, 1001"
    )]
    pub value: Option<request::Value>,
}

/// Nested types for [`Request`].
pub mod request {
    /// The request variants.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// Connectivity probe.
        #[prost(message, tag = "1")]
        Echo(super::RequestEcho),
        /// Write barrier on pipelined transports.
        #[prost(message, tag = "2")]
        Flush(super::RequestFlush),
        /// Application metadata query.
        #[prost(message, tag = "3")]
        Info(super::RequestInfo),
        /// Non-consensus key/value option.
        #[prost(message, tag = "4")]
        SetOption(super::RequestSetOption),
        /// Genesis initialization.
        #[prost(message, tag = "5")]
        InitChain(super::RequestInitChain),
        /// Application state query.
        #[prost(message, tag = "6")]
        Query(super::RequestQuery),
        /// Block execution start.
        #[prost(message, tag = "7")]
        BeginBlock(super::RequestBeginBlock),
        /// Transaction admission check.
        #[prost(message, tag = "8")]
        CheckTx(super::RequestCheckTx),
        /// Transaction execution.
        #[prost(message, tag = "9")]
        DeliverTx(super::RequestDeliverTx),
        /// Block execution end.
        #[prost(message, tag = "10")]
        EndBlock(super::RequestEndBlock),
        /// State persistence point.
        #[prost(message, tag = "11")]
        Commit(super::RequestCommit),
        /// Snapshot inventory for state sync.
        #[prost(message, tag = "12")]
        ListSnapshots(super::RequestListSnapshots),
        /// Snapshot offer during state sync restore.
        #[prost(message, tag = "13")]
        OfferSnapshot(super::RequestOfferSnapshot),
        /// Snapshot chunk read for serving peers.
        #[prost(message, tag = "14")]
        LoadSnapshotChunk(super::RequestLoadSnapshotChunk),
        /// Snapshot chunk apply during restore.
        #[prost(message, tag = "15")]
        ApplySnapshotChunk(super::RequestApplySnapshotChunk),
        /// Mempool recheck window start.
        #[prost(message, tag = "1000")]
        BeginRecheckTx(super::RequestBeginRecheckTx),
        /// Mempool recheck window end.
        #[prost(message, tag = "1001")]
        EndRecheckTx(super::RequestEndRecheckTx),
    }
}

/// A response from the application to the consensus engine.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    /// The concrete response variant.
    #[prost(
        oneof = "response::Value",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 1000, 1001"
    )]
    pub value: Option<response::Value>,
}

/// Nested types for [`Response`].
pub mod response {
    /// The response variants.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// Application-level failure; fatal on pipelined transports.
        #[prost(message, tag = "1")]
        Exception(super::ResponseException),
        /// Echo reply.
        #[prost(message, tag = "2")]
        Echo(super::ResponseEcho),
        /// Flush acknowledgement.
        #[prost(message, tag = "3")]
        Flush(super::ResponseFlush),
        /// Application metadata.
        #[prost(message, tag = "4")]
        Info(super::ResponseInfo),
        /// SetOption outcome.
        #[prost(message, tag = "5")]
        SetOption(super::ResponseSetOption),
        /// Genesis initialization outcome.
        #[prost(message, tag = "6")]
        InitChain(super::ResponseInitChain),
        /// Query result.
        #[prost(message, tag = "7")]
        Query(super::ResponseQuery),
        /// BeginBlock events.
        #[prost(message, tag = "8")]
        BeginBlock(super::ResponseBeginBlock),
        /// Admission verdict.
        #[prost(message, tag = "9")]
        CheckTx(super::ResponseCheckTx),
        /// Execution result.
        #[prost(message, tag = "10")]
        DeliverTx(super::ResponseDeliverTx),
        /// Validator and parameter updates.
        #[prost(message, tag = "11")]
        EndBlock(super::ResponseEndBlock),
        /// Committed app hash.
        #[prost(message, tag = "12")]
        Commit(super::ResponseCommit),
        /// Available snapshots.
        #[prost(message, tag = "13")]
        ListSnapshots(super::ResponseListSnapshots),
        /// Snapshot offer verdict.
        #[prost(message, tag = "14")]
        OfferSnapshot(super::ResponseOfferSnapshot),
        /// Snapshot chunk body.
        #[prost(message, tag = "15")]
        LoadSnapshotChunk(super::ResponseLoadSnapshotChunk),
        /// Chunk apply verdict.
        #[prost(message, tag = "16")]
        ApplySnapshotChunk(super::ResponseApplySnapshotChunk),
        /// Recheck window start acknowledgement.
        #[prost(message, tag = "1000")]
        BeginRecheckTx(super::ResponseBeginRecheckTx),
        /// Recheck window end acknowledgement.
        #[prost(message, tag = "1001")]
        EndRecheckTx(super::ResponseEndRecheckTx),
    }
}

/// Connectivity probe carrying an arbitrary string.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestEcho {
    /// Echoed back verbatim.
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Write barrier; the response is emitted only once all prior responses
/// on the connection have been written.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestFlush {}

/// Application metadata query, sent on handshake.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestInfo {
    /// Node software version.
    #[prost(string, tag = "1")]
    pub version: String,
    /// Block protocol version.
    #[prost(uint64, tag = "2")]
    pub block_version: u64,
    /// P2P protocol version.
    #[prost(uint64, tag = "3")]
    pub p2p_version: u64,
}

/// Non-consensus key/value option.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestSetOption {
    /// Option key.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Option value.
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Genesis initialization.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestInitChain {
    /// Genesis time, unix nanoseconds.
    #[prost(int64, tag = "1")]
    pub time: i64,
    /// Chain identifier.
    #[prost(string, tag = "2")]
    pub chain_id: String,
    /// Initial validator set.
    #[prost(message, repeated, tag = "4")]
    pub validators: Vec<ValidatorUpdate>,
    /// Raw application genesis state.
    #[prost(bytes = "bytes", tag = "5")]
    pub app_state_bytes: Bytes,
    /// Height of the first block, usually 1.
    #[prost(int64, tag = "6")]
    pub initial_height: i64,
}

/// Application state query.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestQuery {
    /// Query payload, path-specific.
    #[prost(bytes = "bytes", tag = "1")]
    pub data: Bytes,
    /// Query route, e.g. `/store`.
    #[prost(string, tag = "2")]
    pub path: String,
    /// Height to query at; 0 means latest.
    #[prost(int64, tag = "3")]
    pub height: i64,
    /// Whether to return a Merkle proof.
    #[prost(bool, tag = "4")]
    pub prove: bool,
}

/// Block execution start.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestBeginBlock {
    /// Hash of the block being executed.
    #[prost(bytes = "bytes", tag = "1")]
    pub hash: Bytes,
    /// Header of the block being executed.
    #[prost(message, optional, tag = "2")]
    pub header: Option<Header>,
}

/// Transaction admission check.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestCheckTx {
    /// Raw transaction bytes.
    #[prost(bytes = "bytes", tag = "1")]
    pub tx: Bytes,
    /// Whether this is a first-time check or a post-commit recheck.
    #[prost(enumeration = "CheckTxType", tag = "2")]
    pub r#type: i32,
}

impl RequestCheckTx {
    /// The check type, defaulting to [`CheckTxType::New`] for unknown values.
    pub fn check_type(&self) -> CheckTxType {
        CheckTxType::try_from(self.r#type).unwrap_or(CheckTxType::New)
    }
}

/// Transaction execution within a block.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestDeliverTx {
    /// Raw transaction bytes.
    #[prost(bytes = "bytes", tag = "1")]
    pub tx: Bytes,
}

/// Block execution end.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestEndBlock {
    /// Height of the block just executed.
    #[prost(int64, tag = "1")]
    pub height: i64,
}

/// State persistence point.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestCommit {}

/// Snapshot inventory for state sync.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestListSnapshots {}

/// Snapshot offer during state sync restore.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestOfferSnapshot {
    /// The offered snapshot.
    #[prost(message, optional, tag = "1")]
    pub snapshot: Option<Snapshot>,
    /// Light-client-verified app hash at the snapshot height.
    #[prost(bytes = "bytes", tag = "2")]
    pub app_hash: Bytes,
}

/// Snapshot chunk read for serving peers.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestLoadSnapshotChunk {
    /// Snapshot height.
    #[prost(uint64, tag = "1")]
    pub height: u64,
    /// Snapshot format.
    #[prost(uint32, tag = "2")]
    pub format: u32,
    /// Chunk index.
    #[prost(uint32, tag = "3")]
    pub chunk: u32,
}

/// Snapshot chunk apply during restore.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestApplySnapshotChunk {
    /// Chunk index within the snapshot.
    #[prost(uint32, tag = "1")]
    pub index: u32,
    /// Chunk body.
    #[prost(bytes = "bytes", tag = "2")]
    pub chunk: Bytes,
    /// Peer the chunk was fetched from.
    #[prost(string, tag = "3")]
    pub sender: String,
}

/// Mempool recheck window start, sent before the post-commit rechecks.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestBeginRecheckTx {
    /// Header of the block that was just committed.
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
}

/// Mempool recheck window end.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestEndRecheckTx {
    /// Height of the block that was just committed.
    #[prost(int64, tag = "1")]
    pub height: i64,
}

/// Application-level failure carried in-band.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseException {
    /// Human-readable failure description.
    #[prost(string, tag = "1")]
    pub error: String,
}

/// Echo reply.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseEcho {
    /// The echoed message.
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Flush acknowledgement.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResponseFlush {}

/// Application metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseInfo {
    /// Arbitrary application data.
    #[prost(string, tag = "1")]
    pub data: String,
    /// Application software version.
    #[prost(string, tag = "2")]
    pub version: String,
    /// Application protocol version.
    #[prost(uint64, tag = "3")]
    pub app_version: u64,
    /// Height of the last committed block.
    #[prost(int64, tag = "4")]
    pub last_block_height: i64,
    /// App hash of the last committed block.
    #[prost(bytes = "bytes", tag = "5")]
    pub last_block_app_hash: Bytes,
}

/// SetOption outcome.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseSetOption {
    /// Response code; 0 is OK.
    #[prost(uint32, tag = "1")]
    pub code: u32,
    /// Non-deterministic log.
    #[prost(string, tag = "3")]
    pub log: String,
    /// Additional information.
    #[prost(string, tag = "4")]
    pub info: String,
}

/// Genesis initialization outcome.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseInitChain {
    /// Initial validator set, overriding genesis when non-empty.
    #[prost(message, repeated, tag = "2")]
    pub validators: Vec<ValidatorUpdate>,
    /// Initial app hash.
    #[prost(bytes = "bytes", tag = "3")]
    pub app_hash: Bytes,
}

/// Query result.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseQuery {
    /// Response code; 0 is OK.
    #[prost(uint32, tag = "1")]
    pub code: u32,
    /// Non-deterministic log.
    #[prost(string, tag = "3")]
    pub log: String,
    /// Additional information.
    #[prost(string, tag = "4")]
    pub info: String,
    /// Index of the key in the tree, if any.
    #[prost(int64, tag = "5")]
    pub index: i64,
    /// The queried key.
    #[prost(bytes = "bytes", tag = "6")]
    pub key: Bytes,
    /// The value at the key.
    #[prost(bytes = "bytes", tag = "7")]
    pub value: Bytes,
    /// Height the answer refers to.
    #[prost(int64, tag = "9")]
    pub height: i64,
    /// Namespace for the response code.
    #[prost(string, tag = "10")]
    pub codespace: String,
}

/// BeginBlock events.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseBeginBlock {
    /// Events emitted while beginning the block.
    #[prost(message, repeated, tag = "1")]
    pub events: Vec<Event>,
}

/// Admission verdict for a checked transaction.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseCheckTx {
    /// Response code; 0 is OK, anything else rejects.
    #[prost(uint32, tag = "1")]
    pub code: u32,
    /// Arbitrary result data.
    #[prost(bytes = "bytes", tag = "2")]
    pub data: Bytes,
    /// Non-deterministic log.
    #[prost(string, tag = "3")]
    pub log: String,
    /// Additional information.
    #[prost(string, tag = "4")]
    pub info: String,
    /// Gas requested by the transaction.
    #[prost(int64, tag = "5")]
    pub gas_wanted: i64,
    /// Gas consumed by the check.
    #[prost(int64, tag = "6")]
    pub gas_used: i64,
    /// Events emitted during the check.
    #[prost(message, repeated, tag = "7")]
    pub events: Vec<Event>,
    /// Namespace for the response code.
    #[prost(string, tag = "8")]
    pub codespace: String,
    /// Application-assigned sender identity, merged into the pool entry.
    #[prost(string, tag = "9")]
    pub sender: String,
}

/// Execution result for a delivered transaction.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseDeliverTx {
    /// Response code; 0 is OK.
    #[prost(uint32, tag = "1")]
    pub code: u32,
    /// Arbitrary result data.
    #[prost(bytes = "bytes", tag = "2")]
    pub data: Bytes,
    /// Non-deterministic log.
    #[prost(string, tag = "3")]
    pub log: String,
    /// Additional information.
    #[prost(string, tag = "4")]
    pub info: String,
    /// Gas requested by the transaction.
    #[prost(int64, tag = "5")]
    pub gas_wanted: i64,
    /// Gas consumed by execution.
    #[prost(int64, tag = "6")]
    pub gas_used: i64,
    /// Events emitted during execution.
    #[prost(message, repeated, tag = "7")]
    pub events: Vec<Event>,
    /// Namespace for the response code.
    #[prost(string, tag = "8")]
    pub codespace: String,
}

/// Validator and parameter updates at the end of a block.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseEndBlock {
    /// Validator power changes.
    #[prost(message, repeated, tag = "1")]
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Events emitted while ending the block.
    #[prost(message, repeated, tag = "3")]
    pub events: Vec<Event>,
}

/// Committed app hash.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseCommit {
    /// Deterministic state digest after the commit.
    #[prost(bytes = "bytes", tag = "2")]
    pub data: Bytes,
    /// Blocks below this height may be pruned.
    #[prost(int64, tag = "3")]
    pub retain_height: i64,
}

/// Available snapshots.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseListSnapshots {
    /// Snapshots the application can serve.
    #[prost(message, repeated, tag = "1")]
    pub snapshots: Vec<Snapshot>,
}

/// Snapshot offer verdict.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResponseOfferSnapshot {
    /// The verdict.
    #[prost(enumeration = "OfferSnapshotResult", tag = "1")]
    pub result: i32,
}

/// Snapshot chunk body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseLoadSnapshotChunk {
    /// The chunk bytes; empty when the chunk does not exist.
    #[prost(bytes = "bytes", tag = "1")]
    pub chunk: Bytes,
}

/// Chunk apply verdict.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseApplySnapshotChunk {
    /// The verdict.
    #[prost(enumeration = "ApplySnapshotChunkResult", tag = "1")]
    pub result: i32,
    /// Chunk indexes to re-fetch from different peers.
    #[prost(uint32, repeated, tag = "2")]
    pub refetch_chunks: Vec<u32>,
    /// Peers whose chunks should be discarded and who should be banned.
    #[prost(string, repeated, tag = "3")]
    pub reject_senders: Vec<String>,
}

/// Recheck window start acknowledgement.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResponseBeginRecheckTx {
    /// Response code; 0 is OK.
    #[prost(uint32, tag = "1")]
    pub code: u32,
}

/// Recheck window end acknowledgement.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResponseEndRecheckTx {
    /// Response code; 0 is OK.
    #[prost(uint32, tag = "1")]
    pub code: u32,
}

/// An application state snapshot advertised over state sync.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Snapshot {
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

/// A validator power change.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidatorUpdate {
    /// Validator public key bytes.
    #[prost(bytes = "bytes", tag = "1")]
    pub pub_key: Bytes,
    /// New voting power; 0 removes the validator.
    #[prost(int64, tag = "2")]
    pub power: i64,
}

/// A structured event emitted by the application.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Event {
    /// Event type.
    #[prost(string, tag = "1")]
    pub r#type: String,
    /// Event attributes.
    #[prost(message, repeated, tag = "2")]
    pub attributes: Vec<EventAttribute>,
}

/// A single key/value attribute of an [`Event`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EventAttribute {
    /// Attribute key.
    #[prost(bytes = "bytes", tag = "1")]
    pub key: Bytes,
    /// Attribute value.
    #[prost(bytes = "bytes", tag = "2")]
    pub value: Bytes,
    /// Whether the attribute should be indexed.
    #[prost(bool, tag = "3")]
    pub index: bool,
}

/// Block header carried in BeginBlock and BeginRecheckTx.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    /// Chain identifier.
    #[prost(string, tag = "1")]
    pub chain_id: String,
    /// Block height.
    #[prost(int64, tag = "2")]
    pub height: i64,
    /// Block time, unix nanoseconds.
    #[prost(int64, tag = "3")]
    pub time: i64,
    /// Hash of the previous block.
    #[prost(bytes = "bytes", tag = "4")]
    pub last_block_id_hash: Bytes,
    /// Commit hash of the previous block.
    #[prost(bytes = "bytes", tag = "5")]
    pub last_commit_hash: Bytes,
    /// Merkle root of the transactions.
    #[prost(bytes = "bytes", tag = "6")]
    pub data_hash: Bytes,
    /// Hash of the current validator set.
    #[prost(bytes = "bytes", tag = "7")]
    pub validators_hash: Bytes,
    /// Hash of the next validator set.
    #[prost(bytes = "bytes", tag = "8")]
    pub next_validators_hash: Bytes,
    /// Hash of the voter set sampled for this height.
    #[prost(bytes = "bytes", tag = "9")]
    pub voters_hash: Bytes,
    /// Hash of the consensus parameters.
    #[prost(bytes = "bytes", tag = "10")]
    pub consensus_hash: Bytes,
    /// App hash after the previous block.
    #[prost(bytes = "bytes", tag = "11")]
    pub app_hash: Bytes,
    /// Root of the previous block's DeliverTx results.
    #[prost(bytes = "bytes", tag = "12")]
    pub last_results_hash: Bytes,
    /// Address of the block proposer.
    #[prost(bytes = "bytes", tag = "13")]
    pub proposer_address: Bytes,
}

impl From<&ostracon_types::Header> for Header {
    fn from(h: &ostracon_types::Header) -> Self {
        Self {
            chain_id: h.chain_id.clone(),
            height: h.height,
            time: h.time,
            last_block_id_hash: Bytes::copy_from_slice(&h.last_block_id.hash.0),
            last_commit_hash: Bytes::copy_from_slice(&h.last_commit_hash.0),
            data_hash: Bytes::copy_from_slice(&h.data_hash.0),
            validators_hash: Bytes::copy_from_slice(&h.validators_hash.0),
            next_validators_hash: Bytes::copy_from_slice(&h.next_validators_hash.0),
            voters_hash: Bytes::copy_from_slice(&h.voters_hash.0),
            consensus_hash: Bytes::copy_from_slice(&h.consensus_hash.0),
            app_hash: Bytes::copy_from_slice(&h.app_hash.0),
            last_results_hash: Bytes::copy_from_slice(&h.last_results_hash.0),
            proposer_address: Bytes::copy_from_slice(&h.proposer_address),
        }
    }
}

/// Whether a first-time check or a post-commit recheck.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CheckTxType {
    /// First admission of a transaction.
    New = 0,
    /// Re-validation of a resident transaction after a commit.
    Recheck = 1,
}

/// Verdict for an offered snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OfferSnapshotResult {
    /// Unknown result, abort restore.
    Unknown = 0,
    /// Accept the snapshot and begin restoring it.
    Accept = 1,
    /// Abort the restore process entirely.
    Abort = 2,
    /// Reject this snapshot, try others.
    Reject = 3,
    /// Reject all snapshots with this format.
    RejectFormat = 4,
    /// Reject all snapshots from this peer.
    RejectSender = 5,
}

/// Verdict for an applied snapshot chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ApplySnapshotChunkResult {
    /// Unknown result, abort restore.
    Unknown = 0,
    /// Chunk applied successfully.
    Accept = 1,
    /// Abort the restore process entirely.
    Abort = 2,
    /// Re-apply this chunk, possibly after re-fetches.
    Retry = 3,
    /// Restart the current snapshot from the first chunk.
    RetrySnapshot = 4,
    /// Abandon the current snapshot, try others.
    RejectSnapshot = 5,
}

impl Request {
    /// An Echo request.
    pub fn echo(message: impl Into<String>) -> Self {
        Self {
            value: Some(request::Value::Echo(RequestEcho {
                message: message.into(),
            })),
        }
    }

    /// A Flush request.
    pub fn flush() -> Self {
        Self {
            value: Some(request::Value::Flush(RequestFlush {})),
        }
    }

    /// An Info request.
    pub fn info(req: RequestInfo) -> Self {
        Self {
            value: Some(request::Value::Info(req)),
        }
    }

    /// A SetOption request.
    pub fn set_option(req: RequestSetOption) -> Self {
        Self {
            value: Some(request::Value::SetOption(req)),
        }
    }

    /// An InitChain request.
    pub fn init_chain(req: RequestInitChain) -> Self {
        Self {
            value: Some(request::Value::InitChain(req)),
        }
    }

    /// A Query request.
    pub fn query(req: RequestQuery) -> Self {
        Self {
            value: Some(request::Value::Query(req)),
        }
    }

    /// A BeginBlock request.
    pub fn begin_block(req: RequestBeginBlock) -> Self {
        Self {
            value: Some(request::Value::BeginBlock(req)),
        }
    }

    /// A CheckTx request.
    pub fn check_tx(tx: Bytes, check_type: CheckTxType) -> Self {
        Self {
            value: Some(request::Value::CheckTx(RequestCheckTx {
                tx,
                r#type: check_type as i32,
            })),
        }
    }

    /// A DeliverTx request.
    pub fn deliver_tx(tx: Bytes) -> Self {
        Self {
            value: Some(request::Value::DeliverTx(RequestDeliverTx { tx })),
        }
    }

    /// An EndBlock request.
    pub fn end_block(height: i64) -> Self {
        Self {
            value: Some(request::Value::EndBlock(RequestEndBlock { height })),
        }
    }

    /// A Commit request.
    pub fn commit() -> Self {
        Self {
            value: Some(request::Value::Commit(RequestCommit {})),
        }
    }

    /// A ListSnapshots request.
    pub fn list_snapshots() -> Self {
        Self {
            value: Some(request::Value::ListSnapshots(RequestListSnapshots {})),
        }
    }

    /// An OfferSnapshot request.
    pub fn offer_snapshot(req: RequestOfferSnapshot) -> Self {
        Self {
            value: Some(request::Value::OfferSnapshot(req)),
        }
    }

    /// A LoadSnapshotChunk request.
    pub fn load_snapshot_chunk(height: u64, format: u32, chunk: u32) -> Self {
        Self {
            value: Some(request::Value::LoadSnapshotChunk(RequestLoadSnapshotChunk {
                height,
                format,
                chunk,
            })),
        }
    }

    /// An ApplySnapshotChunk request.
    pub fn apply_snapshot_chunk(req: RequestApplySnapshotChunk) -> Self {
        Self {
            value: Some(request::Value::ApplySnapshotChunk(req)),
        }
    }

    /// A BeginRecheckTx request.
    pub fn begin_recheck_tx(header: Header) -> Self {
        Self {
            value: Some(request::Value::BeginRecheckTx(RequestBeginRecheckTx {
                header: Some(header),
            })),
        }
    }

    /// An EndRecheckTx request.
    pub fn end_recheck_tx(height: i64) -> Self {
        Self {
            value: Some(request::Value::EndRecheckTx(RequestEndRecheckTx { height })),
        }
    }

    /// Short name of the contained variant, for logs and errors.
    pub fn variant_name(&self) -> &'static str {
        match &self.value {
            Some(request::Value::Echo(_)) => "echo",
            Some(request::Value::Flush(_)) => "flush",
            Some(request::Value::Info(_)) => "info",
            Some(request::Value::SetOption(_)) => "set_option",
            Some(request::Value::InitChain(_)) => "init_chain",
            Some(request::Value::Query(_)) => "query",
            Some(request::Value::BeginBlock(_)) => "begin_block",
            Some(request::Value::CheckTx(_)) => "check_tx",
            Some(request::Value::DeliverTx(_)) => "deliver_tx",
            Some(request::Value::EndBlock(_)) => "end_block",
            Some(request::Value::Commit(_)) => "commit",
            Some(request::Value::ListSnapshots(_)) => "list_snapshots",
            Some(request::Value::OfferSnapshot(_)) => "offer_snapshot",
            Some(request::Value::LoadSnapshotChunk(_)) => "load_snapshot_chunk",
            Some(request::Value::ApplySnapshotChunk(_)) => "apply_snapshot_chunk",
            Some(request::Value::BeginRecheckTx(_)) => "begin_recheck_tx",
            Some(request::Value::EndRecheckTx(_)) => "end_recheck_tx",
            None => "none",
        }
    }

    /// Whether this is a Flush request.
    pub fn is_flush(&self) -> bool {
        matches!(&self.value, Some(request::Value::Flush(_)))
    }

    /// Whether `res` is the response kind that answers this request.
    ///
    /// Exceptions never match; they are handled out of band.
    pub fn matches_response(&self, res: &Response) -> bool {
        use request::Value as Req;
        use response::Value as Res;
        matches!(
            (&self.value, &res.value),
            (Some(Req::Echo(_)), Some(Res::Echo(_)))
                | (Some(Req::Flush(_)), Some(Res::Flush(_)))
                | (Some(Req::Info(_)), Some(Res::Info(_)))
                | (Some(Req::SetOption(_)), Some(Res::SetOption(_)))
                | (Some(Req::InitChain(_)), Some(Res::InitChain(_)))
                | (Some(Req::Query(_)), Some(Res::Query(_)))
                | (Some(Req::BeginBlock(_)), Some(Res::BeginBlock(_)))
                | (Some(Req::CheckTx(_)), Some(Res::CheckTx(_)))
                | (Some(Req::DeliverTx(_)), Some(Res::DeliverTx(_)))
                | (Some(Req::EndBlock(_)), Some(Res::EndBlock(_)))
                | (Some(Req::Commit(_)), Some(Res::Commit(_)))
                | (Some(Req::ListSnapshots(_)), Some(Res::ListSnapshots(_)))
                | (Some(Req::OfferSnapshot(_)), Some(Res::OfferSnapshot(_)))
                | (
                    Some(Req::LoadSnapshotChunk(_)),
                    Some(Res::LoadSnapshotChunk(_))
                )
                | (
                    Some(Req::ApplySnapshotChunk(_)),
                    Some(Res::ApplySnapshotChunk(_))
                )
                | (Some(Req::BeginRecheckTx(_)), Some(Res::BeginRecheckTx(_)))
                | (Some(Req::EndRecheckTx(_)), Some(Res::EndRecheckTx(_)))
        )
    }
}

impl Response {
    /// An Exception response.
    pub fn exception(error: impl Into<String>) -> Self {
        Self {
            value: Some(response::Value::Exception(ResponseException {
                error: error.into(),
            })),
        }
    }

    /// Short name of the contained variant, for logs and errors.
    pub fn variant_name(&self) -> &'static str {
        match &self.value {
            Some(response::Value::Exception(_)) => "exception",
            Some(response::Value::Echo(_)) => "echo",
            Some(response::Value::Flush(_)) => "flush",
            Some(response::Value::Info(_)) => "info",
            Some(response::Value::SetOption(_)) => "set_option",
            Some(response::Value::InitChain(_)) => "init_chain",
            Some(response::Value::Query(_)) => "query",
            Some(response::Value::BeginBlock(_)) => "begin_block",
            Some(response::Value::CheckTx(_)) => "check_tx",
            Some(response::Value::DeliverTx(_)) => "deliver_tx",
            Some(response::Value::EndBlock(_)) => "end_block",
            Some(response::Value::Commit(_)) => "commit",
            Some(response::Value::ListSnapshots(_)) => "list_snapshots",
            Some(response::Value::OfferSnapshot(_)) => "offer_snapshot",
            Some(response::Value::LoadSnapshotChunk(_)) => "load_snapshot_chunk",
            Some(response::Value::ApplySnapshotChunk(_)) => "apply_snapshot_chunk",
            Some(response::Value::BeginRecheckTx(_)) => "begin_recheck_tx",
            Some(response::Value::EndRecheckTx(_)) => "end_recheck_tx",
            None => "none",
        }
    }

    /// The exception message, if this is an Exception response.
    pub fn as_exception(&self) -> Option<&ResponseException> {
        match &self.value {
            Some(response::Value::Exception(ex)) => Some(ex),
            _ => None,
        }
    }

    /// Unwrap an Echo response.
    pub fn into_echo(self) -> Option<ResponseEcho> {
        match self.value {
            Some(response::Value::Echo(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a Flush response.
    pub fn into_flush(self) -> Option<ResponseFlush> {
        match self.value {
            Some(response::Value::Flush(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap an Info response.
    pub fn into_info(self) -> Option<ResponseInfo> {
        match self.value {
            Some(response::Value::Info(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a SetOption response.
    pub fn into_set_option(self) -> Option<ResponseSetOption> {
        match self.value {
            Some(response::Value::SetOption(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap an InitChain response.
    pub fn into_init_chain(self) -> Option<ResponseInitChain> {
        match self.value {
            Some(response::Value::InitChain(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a Query response.
    pub fn into_query(self) -> Option<ResponseQuery> {
        match self.value {
            Some(response::Value::Query(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a BeginBlock response.
    pub fn into_begin_block(self) -> Option<ResponseBeginBlock> {
        match self.value {
            Some(response::Value::BeginBlock(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a CheckTx response.
    pub fn into_check_tx(self) -> Option<ResponseCheckTx> {
        match self.value {
            Some(response::Value::CheckTx(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a DeliverTx response.
    pub fn into_deliver_tx(self) -> Option<ResponseDeliverTx> {
        match self.value {
            Some(response::Value::DeliverTx(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap an EndBlock response.
    pub fn into_end_block(self) -> Option<ResponseEndBlock> {
        match self.value {
            Some(response::Value::EndBlock(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a Commit response.
    pub fn into_commit(self) -> Option<ResponseCommit> {
        match self.value {
            Some(response::Value::Commit(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a ListSnapshots response.
    pub fn into_list_snapshots(self) -> Option<ResponseListSnapshots> {
        match self.value {
            Some(response::Value::ListSnapshots(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap an OfferSnapshot response.
    pub fn into_offer_snapshot(self) -> Option<ResponseOfferSnapshot> {
        match self.value {
            Some(response::Value::OfferSnapshot(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a LoadSnapshotChunk response.
    pub fn into_load_snapshot_chunk(self) -> Option<ResponseLoadSnapshotChunk> {
        match self.value {
            Some(response::Value::LoadSnapshotChunk(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap an ApplySnapshotChunk response.
    pub fn into_apply_snapshot_chunk(self) -> Option<ResponseApplySnapshotChunk> {
        match self.value {
            Some(response::Value::ApplySnapshotChunk(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap a BeginRecheckTx response.
    pub fn into_begin_recheck_tx(self) -> Option<ResponseBeginRecheckTx> {
        match self.value {
            Some(response::Value::BeginRecheckTx(r)) => Some(r),
            _ => None,
        }
    }

    /// Unwrap an EndRecheckTx response.
    pub fn into_end_recheck_tx(self) -> Option<ResponseEndRecheckTx> {
        match self.value {
            Some(response::Value::EndRecheckTx(r)) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_request_round_trip() {
        let req = Request::check_tx(Bytes::from_static(b"tx-1"), CheckTxType::Recheck);
        let bytes = req.encode_to_vec();
        let decoded = Request::decode(bytes.as_slice()).unwrap();
        assert_eq!(req, decoded);
        match decoded.value {
            Some(request::Value::CheckTx(c)) => {
                assert_eq!(c.check_type(), CheckTxType::Recheck);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_matches_response() {
        let req = Request::echo("hi");
        let ok = Response {
            value: Some(response::Value::Echo(ResponseEcho {
                message: "hi".into(),
            })),
        };
        let wrong = Response {
            value: Some(response::Value::Flush(ResponseFlush {})),
        };
        assert!(req.matches_response(&ok));
        assert!(!req.matches_response(&wrong));
        assert!(!req.matches_response(&Response::exception("boom")));
    }

    #[test]
    fn test_extension_tags_round_trip() {
        let req = Request::end_recheck_tx(42);
        let decoded = Request::decode(req.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.variant_name(), "end_recheck_tx");
    }
}
