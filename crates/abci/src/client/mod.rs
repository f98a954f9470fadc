//! ABCI client transports.
//!
//! Three transports share one [`Client`] trait:
//! - [`LocalClient`] calls an in-process [`Application`] directly,
//! - [`SocketClient`] pipelines requests over a length-delimited protobuf
//!   socket,
//! - [`GrpcClient`] issues one RPC per request over gRPC.
//!
//! The trait's primitive is fire-and-forget [`request`] plus a [`flush`]
//! barrier; every synchronous call is the composition of the two, so the
//! transports only implement the primitives.
//!
//! [`Application`]: crate::application::Application
//! [`request`]: Client::request
//! [`flush`]: Client::flush

use crate::error::{ClientError, Result};
use crate::proto::{
    Request, RequestApplySnapshotChunk, RequestBeginBlock, RequestCheckTx, RequestDeliverTx,
    RequestEndBlock, RequestInfo, RequestInitChain, RequestLoadSnapshotChunk,
    RequestOfferSnapshot, RequestQuery, RequestSetOption, Response, ResponseApplySnapshotChunk,
    ResponseBeginBlock, ResponseBeginRecheckTx, ResponseCheckTx, ResponseCommit,
    ResponseDeliverTx, ResponseEcho, ResponseEndBlock, ResponseEndRecheckTx, ResponseInfo,
    ResponseInitChain, ResponseListSnapshots, ResponseLoadSnapshotChunk, ResponseOfferSnapshot,
    ResponseQuery, ResponseSetOption,
};
use async_trait::async_trait;
use std::sync::Arc;

mod grpc;
mod local;
mod reqres;
mod socket;

pub use grpc::GrpcClient;
pub use local::LocalClient;
pub use reqres::{GlobalCallback, ReqRes, ResponseCallback};
pub use socket::SocketClient;

/// Capacity of the outbound request queue on pipelined transports.
pub const REQUEST_QUEUE_CAPACITY: usize = 256;

async fn finish<C: Client + ?Sized>(client: &C, reqres: Arc<ReqRes>) -> Result<Response> {
    client.flush().await?;
    match reqres.response() {
        Some(res) => Ok(res),
        None => Err(client.error().unwrap_or(ClientError::Stopped)),
    }
}

/// A connection to an ABCI application.
#[async_trait]
pub trait Client: Send + Sync + 'static {
    /// Enqueue `req` without waiting for its response. The returned handle
    /// completes when the response arrives; `callback` fires exactly once on
    /// completion.
    async fn request(
        &self,
        req: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ReqRes>>;

    /// Barrier: resolves once every response for previously enqueued
    /// requests has been received.
    async fn flush(&self) -> Result<()>;

    /// The sticky error, if the client has failed.
    fn error(&self) -> Option<ClientError>;

    /// Install a callback fired for every completed request/response pair,
    /// before the pair's own callback.
    fn set_global_callback(&self, callback: GlobalCallback);

    /// Stop the client. In-flight and queued requests are aborted; waiters
    /// observe the sticky error.
    async fn stop(&self);

    /// Asynchronous CheckTx, the mempool's hot path.
    async fn check_tx_async(
        &self,
        req: RequestCheckTx,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ReqRes>> {
        self.request(
            Request {
                value: Some(crate::proto::request::Value::CheckTx(req)),
            },
            callback,
        )
        .await
    }

    /// Asynchronous Flush; the handle completes when the barrier clears.
    async fn flush_async(&self) -> Result<Arc<ReqRes>> {
        self.request(Request::flush(), None).await
    }

    /// Synchronous Echo.
    async fn echo_sync(&self, message: String) -> Result<ResponseEcho> {
        let reqres = self.request(Request::echo(message), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_echo().ok_or(ClientError::ProtocolMismatch {
            expected: "echo",
            actual,
        })
    }

    /// Synchronous Flush.
    async fn flush_sync(&self) -> Result<()> {
        self.flush().await
    }

    /// Synchronous Info.
    async fn info_sync(&self, req: RequestInfo) -> Result<ResponseInfo> {
        let reqres = self.request(Request::info(req), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_info().ok_or(ClientError::ProtocolMismatch {
            expected: "info",
            actual,
        })
    }

    /// Synchronous SetOption.
    async fn set_option_sync(&self, req: RequestSetOption) -> Result<ResponseSetOption> {
        let reqres = self.request(Request::set_option(req), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_set_option().ok_or(ClientError::ProtocolMismatch {
            expected: "set_option",
            actual,
        })
    }

    /// Synchronous InitChain.
    async fn init_chain_sync(&self, req: RequestInitChain) -> Result<ResponseInitChain> {
        let reqres = self.request(Request::init_chain(req), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_init_chain().ok_or(ClientError::ProtocolMismatch {
            expected: "init_chain",
            actual,
        })
    }

    /// Synchronous Query.
    async fn query_sync(&self, req: RequestQuery) -> Result<ResponseQuery> {
        let reqres = self.request(Request::query(req), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_query().ok_or(ClientError::ProtocolMismatch {
            expected: "query",
            actual,
        })
    }

    /// Synchronous BeginBlock.
    async fn begin_block_sync(&self, req: RequestBeginBlock) -> Result<ResponseBeginBlock> {
        let reqres = self.request(Request::begin_block(req), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_begin_block().ok_or(ClientError::ProtocolMismatch {
            expected: "begin_block",
            actual,
        })
    }

    /// Synchronous CheckTx.
    async fn check_tx_sync(&self, req: RequestCheckTx) -> Result<ResponseCheckTx> {
        let reqres = self
            .request(
                Request {
                    value: Some(crate::proto::request::Value::CheckTx(req)),
                },
                None,
            )
            .await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_check_tx().ok_or(ClientError::ProtocolMismatch {
            expected: "check_tx",
            actual,
        })
    }

    /// Synchronous DeliverTx.
    async fn deliver_tx_sync(&self, req: RequestDeliverTx) -> Result<ResponseDeliverTx> {
        let reqres = self.request(Request::deliver_tx(req.tx), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_deliver_tx().ok_or(ClientError::ProtocolMismatch {
            expected: "deliver_tx",
            actual,
        })
    }

    /// Synchronous EndBlock.
    async fn end_block_sync(&self, req: RequestEndBlock) -> Result<ResponseEndBlock> {
        let reqres = self.request(Request::end_block(req.height), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_end_block().ok_or(ClientError::ProtocolMismatch {
            expected: "end_block",
            actual,
        })
    }

    /// Synchronous Commit.
    async fn commit_sync(&self) -> Result<ResponseCommit> {
        let reqres = self.request(Request::commit(), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_commit().ok_or(ClientError::ProtocolMismatch {
            expected: "commit",
            actual,
        })
    }

    /// Synchronous ListSnapshots.
    async fn list_snapshots_sync(&self) -> Result<ResponseListSnapshots> {
        let reqres = self.request(Request::list_snapshots(), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_list_snapshots()
            .ok_or(ClientError::ProtocolMismatch {
                expected: "list_snapshots",
                actual,
            })
    }

    /// Synchronous OfferSnapshot.
    async fn offer_snapshot_sync(&self, req: RequestOfferSnapshot) -> Result<ResponseOfferSnapshot> {
        let reqres = self.request(Request::offer_snapshot(req), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_offer_snapshot()
            .ok_or(ClientError::ProtocolMismatch {
                expected: "offer_snapshot",
                actual,
            })
    }

    /// Synchronous LoadSnapshotChunk.
    async fn load_snapshot_chunk_sync(
        &self,
        req: RequestLoadSnapshotChunk,
    ) -> Result<ResponseLoadSnapshotChunk> {
        let reqres = self
            .request(
                Request::load_snapshot_chunk(req.height, req.format, req.chunk),
                None,
            )
            .await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_load_snapshot_chunk()
            .ok_or(ClientError::ProtocolMismatch {
                expected: "load_snapshot_chunk",
                actual,
            })
    }

    /// Synchronous ApplySnapshotChunk.
    async fn apply_snapshot_chunk_sync(
        &self,
        req: RequestApplySnapshotChunk,
    ) -> Result<ResponseApplySnapshotChunk> {
        let reqres = self.request(Request::apply_snapshot_chunk(req), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_apply_snapshot_chunk()
            .ok_or(ClientError::ProtocolMismatch {
                expected: "apply_snapshot_chunk",
                actual,
            })
    }

    /// Synchronous BeginRecheckTx.
    async fn begin_recheck_tx_sync(
        &self,
        header: crate::proto::Header,
    ) -> Result<ResponseBeginRecheckTx> {
        let reqres = self.request(Request::begin_recheck_tx(header), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_begin_recheck_tx()
            .ok_or(ClientError::ProtocolMismatch {
                expected: "begin_recheck_tx",
                actual,
            })
    }

    /// Synchronous EndRecheckTx.
    async fn end_recheck_tx_sync(&self, height: i64) -> Result<ResponseEndRecheckTx> {
        let reqres = self.request(Request::end_recheck_tx(height), None).await?;
        let res = finish(self, reqres).await?;
        let actual = res.variant_name();
        res.into_end_recheck_tx()
            .ok_or(ClientError::ProtocolMismatch {
                expected: "end_recheck_tx",
                actual,
            })
    }
}
