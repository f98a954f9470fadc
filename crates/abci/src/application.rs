//! The application-side trait and request dispatch.

use crate::proto::{
    request, response, Request, RequestApplySnapshotChunk, RequestBeginBlock,
    RequestBeginRecheckTx, RequestCheckTx, RequestDeliverTx, RequestEcho, RequestEndBlock,
    RequestEndRecheckTx, RequestInfo, RequestInitChain, RequestLoadSnapshotChunk,
    RequestOfferSnapshot, RequestQuery, RequestSetOption, Response, ResponseApplySnapshotChunk,
    ResponseBeginBlock, ResponseBeginRecheckTx, ResponseCheckTx, ResponseCommit,
    ResponseDeliverTx, ResponseEcho, ResponseEndBlock, ResponseEndRecheckTx, ResponseFlush,
    ResponseInfo, ResponseInitChain, ResponseListSnapshots, ResponseLoadSnapshotChunk,
    ResponseOfferSnapshot, ResponseQuery, ResponseSetOption,
};
use async_trait::async_trait;

/// The interface a state-machine application implements.
///
/// Every method has a no-op default so test applications override only what
/// they exercise. Implementations must be deterministic for the consensus
/// methods (`InitChain`, `BeginBlock`, `DeliverTx`, `EndBlock`, `Commit`).
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// Echo the message back.
    async fn echo(&self, req: RequestEcho) -> ResponseEcho {
        ResponseEcho {
            message: req.message,
        }
    }

    /// Return application metadata.
    async fn info(&self, _req: RequestInfo) -> ResponseInfo {
        ResponseInfo::default()
    }

    /// Set a non-consensus option.
    async fn set_option(&self, _req: RequestSetOption) -> ResponseSetOption {
        ResponseSetOption::default()
    }

    /// Initialize application state from genesis.
    async fn init_chain(&self, _req: RequestInitChain) -> ResponseInitChain {
        ResponseInitChain::default()
    }

    /// Answer a state query.
    async fn query(&self, _req: RequestQuery) -> ResponseQuery {
        ResponseQuery::default()
    }

    /// Begin executing a block.
    async fn begin_block(&self, _req: RequestBeginBlock) -> ResponseBeginBlock {
        ResponseBeginBlock::default()
    }

    /// Validate a transaction for mempool admission.
    async fn check_tx(&self, _req: RequestCheckTx) -> ResponseCheckTx {
        ResponseCheckTx::default()
    }

    /// Execute a transaction within the current block.
    async fn deliver_tx(&self, _req: RequestDeliverTx) -> ResponseDeliverTx {
        ResponseDeliverTx::default()
    }

    /// Finish executing a block.
    async fn end_block(&self, _req: RequestEndBlock) -> ResponseEndBlock {
        ResponseEndBlock::default()
    }

    /// Persist application state and return the app hash.
    async fn commit(&self) -> ResponseCommit {
        ResponseCommit::default()
    }

    /// List the snapshots the application can serve.
    async fn list_snapshots(&self) -> ResponseListSnapshots {
        ResponseListSnapshots::default()
    }

    /// Decide whether to restore from an offered snapshot.
    async fn offer_snapshot(&self, _req: RequestOfferSnapshot) -> ResponseOfferSnapshot {
        ResponseOfferSnapshot::default()
    }

    /// Read a chunk of a locally held snapshot.
    async fn load_snapshot_chunk(&self, _req: RequestLoadSnapshotChunk) -> ResponseLoadSnapshotChunk {
        ResponseLoadSnapshotChunk::default()
    }

    /// Apply a snapshot chunk during restore.
    async fn apply_snapshot_chunk(
        &self,
        _req: RequestApplySnapshotChunk,
    ) -> ResponseApplySnapshotChunk {
        ResponseApplySnapshotChunk::default()
    }

    /// Open the post-commit recheck window.
    async fn begin_recheck_tx(&self, _req: RequestBeginRecheckTx) -> ResponseBeginRecheckTx {
        ResponseBeginRecheckTx::default()
    }

    /// Close the post-commit recheck window.
    async fn end_recheck_tx(&self, _req: RequestEndRecheckTx) -> ResponseEndRecheckTx {
        ResponseEndRecheckTx::default()
    }
}

/// Dispatch a request to the matching [`Application`] method and wrap the
/// result in a [`Response`]. Empty requests produce an Exception response.
pub async fn dispatch<A: Application>(app: &A, req: Request) -> Response {
    let value = match req.value {
        Some(request::Value::Echo(r)) => response::Value::Echo(app.echo(r).await),
        Some(request::Value::Flush(_)) => response::Value::Flush(ResponseFlush {}),
        Some(request::Value::Info(r)) => response::Value::Info(app.info(r).await),
        Some(request::Value::SetOption(r)) => response::Value::SetOption(app.set_option(r).await),
        Some(request::Value::InitChain(r)) => response::Value::InitChain(app.init_chain(r).await),
        Some(request::Value::Query(r)) => response::Value::Query(app.query(r).await),
        Some(request::Value::BeginBlock(r)) => {
            response::Value::BeginBlock(app.begin_block(r).await)
        }
        Some(request::Value::CheckTx(r)) => response::Value::CheckTx(app.check_tx(r).await),
        Some(request::Value::DeliverTx(r)) => response::Value::DeliverTx(app.deliver_tx(r).await),
        Some(request::Value::EndBlock(r)) => response::Value::EndBlock(app.end_block(r).await),
        Some(request::Value::Commit(_)) => response::Value::Commit(app.commit().await),
        Some(request::Value::ListSnapshots(_)) => {
            response::Value::ListSnapshots(app.list_snapshots().await)
        }
        Some(request::Value::OfferSnapshot(r)) => {
            response::Value::OfferSnapshot(app.offer_snapshot(r).await)
        }
        Some(request::Value::LoadSnapshotChunk(r)) => {
            response::Value::LoadSnapshotChunk(app.load_snapshot_chunk(r).await)
        }
        Some(request::Value::ApplySnapshotChunk(r)) => {
            response::Value::ApplySnapshotChunk(app.apply_snapshot_chunk(r).await)
        }
        Some(request::Value::BeginRecheckTx(r)) => {
            response::Value::BeginRecheckTx(app.begin_recheck_tx(r).await)
        }
        Some(request::Value::EndRecheckTx(r)) => {
            response::Value::EndRecheckTx(app.end_recheck_tx(r).await)
        }
        None => return Response::exception("empty request"),
    };
    Response { value: Some(value) }
}
