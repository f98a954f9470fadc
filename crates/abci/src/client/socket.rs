//! Pipelined socket client.
//!
//! Requests are enqueued on a bounded channel and written by a dedicated
//! send task; a recv task matches responses against the FIFO of sent
//! requests. Writes are buffered and only forced out by a `Flush` request or
//! by a short throttle timer, so bursts of mempool checks coalesce into few
//! syscalls.

use crate::client::reqres::{GlobalCallback, ReqRes, ResponseCallback};
use crate::client::{Client, REQUEST_QUEUE_CAPACITY};
use crate::codec::ClientCodec;
use crate::error::{ClientError, Result};
use crate::proto::{Request, Response};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How long to wait between dial attempts when the server is not up yet.
pub const DIAL_RETRY_INTERVAL: Duration = Duration::from_secs(3);

// Unflushed writes are forced out this long after the first pending one.
const FLUSH_THROTTLE: Duration = Duration::from_millis(20);

struct Shared {
    req_sent: Mutex<VecDeque<Arc<ReqRes>>>,
    err: Mutex<Option<ClientError>>,
    global_cb: Mutex<Option<GlobalCallback>>,
    cancel: CancellationToken,
}

impl Shared {
    /// Record the first error and begin shutdown. Later errors are dropped;
    /// the one that killed the connection is the one every caller sees.
    fn stop_for_error(&self, err: ClientError) {
        {
            let mut slot = self.err.lock();
            if slot.is_none() {
                error!(error = %err, "abci.socket_client: stopping for error");
                *slot = Some(err);
            }
        }
        self.cancel.cancel();
    }

    /// Match `res` against the oldest in-flight request and complete it.
    fn deliver(&self, res: Response) -> Result<()> {
        let reqres = match self.req_sent.lock().pop_front() {
            Some(rr) => rr,
            None => return Err(ClientError::UnexpectedResponse(res.variant_name())),
        };
        if !reqres.request().matches_response(&res) {
            return Err(ClientError::ProtocolMismatch {
                expected: reqres.request().variant_name(),
                actual: res.variant_name(),
            });
        }
        reqres.set_done(res.clone());
        if let Some(cb) = self.global_cb.lock().clone() {
            cb(reqres.request(), &res);
        }
        reqres.invoke_callback();
        Ok(())
    }

    /// Abort everything still waiting on a response. Idempotent; called from
    /// both task exit paths so the last task out releases any straggler.
    fn drain_in_flight(&self) {
        let drained: Vec<_> = self.req_sent.lock().drain(..).collect();
        for reqres in drained {
            reqres.abort();
        }
    }
}

/// ABCI client over a length-delimited protobuf socket.
///
/// Cheap to clone; all clones share the connection and its sticky error.
#[derive(Clone)]
pub struct SocketClient {
    req_tx: mpsc::Sender<Arc<ReqRes>>,
    shared: Arc<Shared>,
}

impl SocketClient {
    /// Dial `addr` and start the client. With `must_connect` a failed dial
    /// is returned immediately; otherwise dialing retries every
    /// [`DIAL_RETRY_INTERVAL`] until the server comes up.
    pub async fn connect(addr: &str, must_connect: bool) -> Result<Self> {
        let stream = loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(e) if !must_connect => {
                    warn!(addr, error = %e, "abci.socket_client: dial failed, retrying");
                    tokio::time::sleep(DIAL_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        stream.set_nodelay(true)?;
        debug!(addr, "abci.socket_client: connected");
        Ok(Self::from_stream(stream))
    }

    /// Start the client on an established connection.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let shared = Arc::new(Shared {
            req_sent: Mutex::new(VecDeque::new()),
            err: Mutex::new(None),
            global_cb: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        let (req_tx, req_rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        tokio::spawn(send_loop(req_rx, write_half, shared.clone()));
        tokio::spawn(recv_loop(read_half, shared.clone()));
        Self { req_tx, shared }
    }
}

async fn send_loop(
    mut rx: mpsc::Receiver<Arc<ReqRes>>,
    writer: OwnedWriteHalf,
    shared: Arc<Shared>,
) {
    let mut framed = FramedWrite::new(writer, ClientCodec);
    let mut flush_deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            maybe = rx.recv() => {
                let Some(reqres) = maybe else { break };
                let is_flush = reqres.request().is_flush();
                shared.req_sent.lock().push_back(reqres.clone());
                if let Err(e) = framed.feed(reqres.request().clone()).await {
                    shared.stop_for_error(e);
                    break;
                }
                if is_flush {
                    if let Err(e) = framed.flush().await {
                        shared.stop_for_error(e);
                        break;
                    }
                    flush_deadline = None;
                } else if flush_deadline.is_none() {
                    flush_deadline = Some(Instant::now() + FLUSH_THROTTLE);
                }
            }
            _ = async {
                match flush_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                // Nothing explicit asked for a flush in a while; force the
                // buffered frames out behind a synthesized barrier.
                let reqres = Arc::new(ReqRes::new(Request::flush(), None));
                shared.req_sent.lock().push_back(reqres);
                if let Err(e) = framed.feed(Request::flush()).await {
                    shared.stop_for_error(e);
                    break;
                }
                if let Err(e) = framed.flush().await {
                    shared.stop_for_error(e);
                    break;
                }
                flush_deadline = None;
            }
        }
    }
    rx.close();
    while let Ok(reqres) = rx.try_recv() {
        reqres.abort();
    }
    shared.drain_in_flight();
}

async fn recv_loop(reader: OwnedReadHalf, shared: Arc<Shared>) {
    let mut framed = FramedRead::new(reader, ClientCodec);
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            frame = framed.next() => match frame {
                None => {
                    shared.stop_for_error(ClientError::Io("connection closed by server".into()));
                    break;
                }
                Some(Err(e)) => {
                    shared.stop_for_error(e);
                    break;
                }
                Some(Ok(res)) => {
                    if let Some(ex) = res.as_exception() {
                        shared.stop_for_error(ClientError::Exception(ex.error.clone()));
                        break;
                    }
                    if let Err(e) = shared.deliver(res) {
                        shared.stop_for_error(e);
                        break;
                    }
                }
            }
        }
    }
    shared.drain_in_flight();
}

#[async_trait]
impl Client for SocketClient {
    async fn request(
        &self,
        req: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ReqRes>> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        let reqres = Arc::new(ReqRes::new(req, callback));
        if self.req_tx.send(reqres.clone()).await.is_err() {
            return Err(self.error().unwrap_or(ClientError::Stopped));
        }
        // The tasks may have shut down between the error check and the send;
        // anything they no longer drain is released here.
        if self.shared.cancel.is_cancelled() {
            reqres.abort();
            return Err(self.error().unwrap_or(ClientError::Stopped));
        }
        Ok(reqres)
    }

    async fn flush(&self) -> Result<()> {
        let reqres = self.request(Request::flush(), None).await?;
        match reqres.wait().await {
            Some(_) => Ok(()),
            None => Err(self.error().unwrap_or(ClientError::Stopped)),
        }
    }

    fn error(&self) -> Option<ClientError> {
        self.shared.err.lock().clone()
    }

    fn set_global_callback(&self, callback: GlobalCallback) {
        *self.shared.global_cb.lock() = Some(callback);
    }

    async fn stop(&self) {
        debug!("abci.socket_client: stopping");
        self.shared.cancel.cancel();
    }
}
