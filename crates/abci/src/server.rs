//! Socket server hosting an [`Application`].
//!
//! Requests on a connection are processed strictly in arrival order and the
//! responses written back in that same order, which is what lets clients
//! pipeline. Responses sit in the write buffer until a `Flush` request
//! arrives.

use crate::application::{dispatch, Application};
use crate::codec::ServerCodec;
use crate::error::Result;
use crate::proto::Response;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A listening ABCI socket server.
pub struct SocketServer {
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl SocketServer {
    /// Bind `addr` and serve `app` until [`stop`](SocketServer::stop).
    /// Binding port 0 picks a free port, see
    /// [`local_addr`](SocketServer::local_addr).
    pub async fn bind<A: Application>(addr: &str, app: Arc<A>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();
        info!(%local_addr, "abci.server: listening");
        tokio::spawn(accept_loop(listener, app, cancel.clone()));
        Ok(Self { local_addr, cancel })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and tear down existing ones.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop<A: Application>(
    listener: TcpListener,
    app: Arc<A>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "abci.server: connection accepted");
                    tokio::spawn(handle_connection(stream, app.clone(), cancel.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "abci.server: accept failed");
                }
            }
        }
    }
}

async fn handle_connection<A: Application>(
    stream: TcpStream,
    app: Arc<A>,
    cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, ServerCodec);
    let mut writer = FramedWrite::new(write_half, ServerCodec);

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = reader.next() => frame,
        };
        let req = match frame {
            None => return,
            Some(Err(e)) => {
                // Tell the client what went wrong before the connection dies.
                let _ = writer.send(Response::exception(e.to_string())).await;
                return;
            }
            Some(Ok(req)) => req,
        };

        let is_flush = req.is_flush();
        let res = dispatch(app.as_ref(), req).await;
        let write = if is_flush {
            writer.send(res).await
        } else {
            writer.feed(res).await
        };
        if let Err(e) = write {
            debug!(error = %e, "abci.server: write failed, closing connection");
            return;
        }
    }
}
