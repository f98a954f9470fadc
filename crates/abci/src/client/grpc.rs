//! gRPC client.
//!
//! Unlike the socket transport there is no pipelining: every request is its
//! own unary RPC and completes before [`Client::request`] returns, so
//! [`Client::flush`] has nothing to wait for. The service stub in
//! [`abci_application_client`] is kept in the shape `tonic` codegen
//! produces.

use crate::client::reqres::{GlobalCallback, ReqRes, ResponseCallback};
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::proto::{request, response, Request, RequestEcho, Response};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Channel;
use tracing::{debug, error, warn};

use abci_application_client::AbciApplicationClient;

/// How long to wait between dial attempts when the server is not up yet.
pub const DIAL_RETRY_INTERVAL: Duration = Duration::from_secs(3);

// The server may accept connections before the service is able to answer;
// the post-dial Echo handshake retries at this interval.
const ECHO_RETRY_INTERVAL: Duration = Duration::from_secs(1);

struct GrpcShared {
    err: Mutex<Option<ClientError>>,
    global_cb: Mutex<Option<GlobalCallback>>,
}

/// ABCI client over gRPC.
#[derive(Clone)]
pub struct GrpcClient {
    client: AbciApplicationClient<Channel>,
    shared: Arc<GrpcShared>,
}

impl GrpcClient {
    /// Dial `addr` (a `host:port`), wait for the service to answer an Echo,
    /// and return the client. With `must_connect` the first failure is
    /// returned; otherwise both the dial and the handshake retry forever.
    pub async fn connect(addr: &str, must_connect: bool) -> Result<Self> {
        let endpoint = format!("http://{addr}");
        let channel = loop {
            match Channel::from_shared(endpoint.clone())
                .map_err(|e| ClientError::Grpc(e.to_string()))?
                .connect()
                .await
            {
                Ok(channel) => break channel,
                Err(e) if !must_connect => {
                    warn!(addr, error = %e, "abci.grpc_client: dial failed, retrying");
                    tokio::time::sleep(DIAL_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mut client = AbciApplicationClient::new(channel);
        loop {
            match client
                .echo(RequestEcho {
                    message: "ok".into(),
                })
                .await
            {
                Ok(_) => break,
                Err(status) if !must_connect => {
                    warn!(addr, error = %status, "abci.grpc_client: echo failed, retrying");
                    tokio::time::sleep(ECHO_RETRY_INTERVAL).await;
                }
                Err(status) => return Err(status.into()),
            }
        }
        debug!(addr, "abci.grpc_client: connected");

        Ok(Self {
            client,
            shared: Arc::new(GrpcShared {
                err: Mutex::new(None),
                global_cb: Mutex::new(None),
            }),
        })
    }

    fn stop_for_error(&self, err: &ClientError) {
        let mut slot = self.shared.err.lock();
        if slot.is_none() {
            error!(error = %err, "abci.grpc_client: stopping for error");
            *slot = Some(err.clone());
        }
    }

    async fn perform(&self, req: &Request) -> Result<Response> {
        use request::Value as Req;
        use response::Value as Res;

        let mut client = self.client.clone();
        let value = match req.value.clone() {
            Some(Req::Echo(r)) => Res::Echo(client.echo(r).await?.into_inner()),
            Some(Req::Flush(r)) => Res::Flush(client.flush(r).await?.into_inner()),
            Some(Req::Info(r)) => Res::Info(client.info(r).await?.into_inner()),
            Some(Req::SetOption(r)) => Res::SetOption(client.set_option(r).await?.into_inner()),
            Some(Req::InitChain(r)) => Res::InitChain(client.init_chain(r).await?.into_inner()),
            Some(Req::Query(r)) => Res::Query(client.query(r).await?.into_inner()),
            Some(Req::BeginBlock(r)) => Res::BeginBlock(client.begin_block(r).await?.into_inner()),
            Some(Req::CheckTx(r)) => Res::CheckTx(client.check_tx(r).await?.into_inner()),
            Some(Req::DeliverTx(r)) => Res::DeliverTx(client.deliver_tx(r).await?.into_inner()),
            Some(Req::EndBlock(r)) => Res::EndBlock(client.end_block(r).await?.into_inner()),
            Some(Req::Commit(r)) => Res::Commit(client.commit(r).await?.into_inner()),
            Some(Req::ListSnapshots(r)) => {
                Res::ListSnapshots(client.list_snapshots(r).await?.into_inner())
            }
            Some(Req::OfferSnapshot(r)) => {
                Res::OfferSnapshot(client.offer_snapshot(r).await?.into_inner())
            }
            Some(Req::LoadSnapshotChunk(r)) => {
                Res::LoadSnapshotChunk(client.load_snapshot_chunk(r).await?.into_inner())
            }
            Some(Req::ApplySnapshotChunk(r)) => {
                Res::ApplySnapshotChunk(client.apply_snapshot_chunk(r).await?.into_inner())
            }
            Some(Req::BeginRecheckTx(r)) => {
                Res::BeginRecheckTx(client.begin_recheck_tx(r).await?.into_inner())
            }
            Some(Req::EndRecheckTx(r)) => {
                Res::EndRecheckTx(client.end_recheck_tx(r).await?.into_inner())
            }
            None => return Err(ClientError::Decode("empty request".into())),
        };
        Ok(Response { value: Some(value) })
    }
}

#[async_trait]
impl Client for GrpcClient {
    async fn request(
        &self,
        req: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ReqRes>> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        let res = match self.perform(&req).await {
            Ok(res) => res,
            Err(err) => {
                self.stop_for_error(&err);
                return Err(err);
            }
        };
        let reqres = Arc::new(ReqRes::new(req, callback));
        reqres.set_done(res.clone());
        if let Some(cb) = self.shared.global_cb.lock().clone() {
            cb(reqres.request(), &res);
        }
        reqres.invoke_callback();
        Ok(reqres)
    }

    async fn flush(&self) -> Result<()> {
        // Unary RPCs complete eagerly, there is never anything buffered.
        Ok(())
    }

    fn error(&self) -> Option<ClientError> {
        self.shared.err.lock().clone()
    }

    fn set_global_callback(&self, callback: GlobalCallback) {
        *self.shared.global_cb.lock() = Some(callback);
    }

    async fn stop(&self) {
        self.stop_for_error(&ClientError::Stopped);
    }
}

/// Generated client implementations.
pub mod abci_application_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::wildcard_imports)]

    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::codegen::*;

    /// Client for the ABCIApplication service.
    #[derive(Debug, Clone)]
    pub struct AbciApplicationClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl AbciApplicationClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> AbciApplicationClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub async fn echo(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestEcho>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseEcho>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/Echo");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "Echo"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn flush(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestFlush>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseFlush>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/Flush");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "Flush"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn info(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestInfo>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseInfo>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/Info");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "Info"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn set_option(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestSetOption>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseSetOption>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/SetOption");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "SetOption"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn deliver_tx(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestDeliverTx>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseDeliverTx>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/DeliverTx");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "DeliverTx"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn check_tx(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestCheckTx>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseCheckTx>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/CheckTx");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "CheckTx"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn query(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestQuery>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseQuery>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/Query");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "Query"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn commit(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestCommit>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseCommit>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/Commit");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "Commit"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn init_chain(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestInitChain>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseInitChain>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/InitChain");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "InitChain"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn begin_block(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestBeginBlock>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseBeginBlock>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/BeginBlock");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "BeginBlock"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn end_block(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestEndBlock>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseEndBlock>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/EndBlock");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "EndBlock"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn list_snapshots(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestListSnapshots>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseListSnapshots>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/ListSnapshots");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "ListSnapshots"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn offer_snapshot(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestOfferSnapshot>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseOfferSnapshot>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/OfferSnapshot");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "OfferSnapshot"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn load_snapshot_chunk(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestLoadSnapshotChunk>,
        ) -> std::result::Result<
            tonic::Response<crate::proto::ResponseLoadSnapshotChunk>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                PathAndQuery::from_static("/ostracon.abci.ABCIApplication/LoadSnapshotChunk");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "LoadSnapshotChunk"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn apply_snapshot_chunk(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestApplySnapshotChunk>,
        ) -> std::result::Result<
            tonic::Response<crate::proto::ResponseApplySnapshotChunk>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                PathAndQuery::from_static("/ostracon.abci.ABCIApplication/ApplySnapshotChunk");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "ApplySnapshotChunk"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn begin_recheck_tx(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestBeginRecheckTx>,
        ) -> std::result::Result<
            tonic::Response<crate::proto::ResponseBeginRecheckTx>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/BeginRecheckTx");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "BeginRecheckTx"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn end_recheck_tx(
            &mut self,
            request: impl tonic::IntoRequest<crate::proto::RequestEndRecheckTx>,
        ) -> std::result::Result<tonic::Response<crate::proto::ResponseEndRecheckTx>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/ostracon.abci.ABCIApplication/EndRecheckTx");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("ostracon.abci.ABCIApplication", "EndRecheckTx"));
            self.inner.unary(req, path, codec).await
        }
    }
}
