//! Integration tests for the socket transport: a real server on a loopback
//! port, a real client, pipelining and failure modes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use ostracon_abci::codec::ServerCodec;
use ostracon_abci::proto::{
    response, CheckTxType, Request, RequestCheckTx, Response, ResponseCheckTx, ResponseCommit,
};
use ostracon_abci::{Application, Client, ClientError, SocketClient, SocketServer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::codec::{FramedRead, FramedWrite};

/// Application that tags every CheckTx response with the tx payload so the
/// tests can verify request/response pairing.
struct EchoTxApp {
    checks: AtomicUsize,
}

#[async_trait]
impl Application for EchoTxApp {
    async fn check_tx(&self, req: RequestCheckTx) -> ResponseCheckTx {
        self.checks.fetch_add(1, Ordering::SeqCst);
        ResponseCheckTx {
            data: req.tx,
            ..Default::default()
        }
    }
}

async fn start_pair() -> (SocketServer, SocketClient, Arc<EchoTxApp>) {
    let app = Arc::new(EchoTxApp {
        checks: AtomicUsize::new(0),
    });
    let server = SocketServer::bind("127.0.0.1:0", app.clone()).await.unwrap();
    let addr = server.local_addr().to_string();
    let client = SocketClient::connect(&addr, true).await.unwrap();
    (server, client, app)
}

#[tokio::test]
async fn test_echo_round_trip() {
    let (_server, client, _app) = start_pair().await;
    let res = client.echo_sync("over the wire".into()).await.unwrap();
    assert_eq!(res.message, "over the wire");
    assert!(client.error().is_none());
}

#[tokio::test]
async fn test_flush_on_empty_queue() {
    let (_server, client, _app) = start_pair().await;
    client.flush().await.unwrap();
}

#[tokio::test]
async fn test_pipelined_check_tx_completes_in_order() {
    let (_server, client, app) = start_pair().await;

    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for i in 0u8..10 {
        let cb: ostracon_abci::ResponseCallback = {
            let order = order.clone();
            Arc::new(move |res: &Response| {
                if let Some(response::Value::CheckTx(c)) = &res.value {
                    order.lock().push(c.data.clone());
                }
            })
        };
        let req = RequestCheckTx {
            tx: Bytes::from(vec![i]),
            r#type: CheckTxType::New as i32,
        };
        handles.push(client.check_tx_async(req, Some(cb)).await.unwrap());
    }
    client.flush().await.unwrap();

    for (i, handle) in handles.iter().enumerate() {
        let res = handle.wait().await.unwrap().into_check_tx().unwrap();
        assert_eq!(res.data, Bytes::from(vec![i as u8]));
    }
    assert_eq!(app.checks.load(Ordering::SeqCst), 10);
    let seen = order.lock().clone();
    assert_eq!(seen, (0u8..10).map(|i| Bytes::from(vec![i])).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_throttle_flushes_without_explicit_barrier() {
    let (_server, client, _app) = start_pair().await;
    let req = RequestCheckTx {
        tx: Bytes::from_static(b"solo"),
        r#type: CheckTxType::New as i32,
    };
    let handle = client.check_tx_async(req, None).await.unwrap();
    // No flush issued; the 20ms write throttle must push the frame out.
    let res = tokio::time::timeout(std::time::Duration::from_secs(2), handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(res.into_check_tx().unwrap().data, Bytes::from_static(b"solo"));
}

/// Accepts one connection and answers every request with a Commit response,
/// regardless of what was asked.
async fn misbehaving_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, ServerCodec);
        let mut writer = FramedWrite::new(write_half, ServerCodec);
        while let Some(Ok(_req)) = reader.next().await {
            let res = Response {
                value: Some(response::Value::Commit(ResponseCommit::default())),
            };
            if writer.send(res).await.is_err() {
                return;
            }
        }
    });
    addr
}

#[tokio::test]
async fn test_mismatched_response_is_fatal() {
    let addr = misbehaving_server().await;
    let client = SocketClient::connect(&addr, true).await.unwrap();

    let err = client.echo_sync("hi".into()).await.unwrap_err();
    assert!(matches!(err, ClientError::ProtocolMismatch { .. }));

    // The error is sticky: every later call fails without touching the wire.
    let err = client.echo_sync("again".into()).await.unwrap_err();
    assert!(matches!(err, ClientError::ProtocolMismatch { .. }));
    assert!(client.error().is_some());
}

#[tokio::test]
async fn test_exception_response_is_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, ServerCodec);
        let mut writer = FramedWrite::new(write_half, ServerCodec);
        if let Some(Ok(_req)) = reader.next().await {
            let _ = writer.send(Response::exception("db corrupted")).await;
        }
    });

    let client = SocketClient::connect(&addr, true).await.unwrap();
    let err = client.echo_sync("hi".into()).await.unwrap_err();
    match err {
        ClientError::Exception(msg) => assert_eq!(msg, "db corrupted"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_disconnect_releases_waiters() {
    let (server, client, _app) = start_pair().await;
    client.echo_sync("warm".into()).await.unwrap();

    server.stop();
    // Whichever call observes the teardown first, it must not hang.
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        client.echo_sync("after stop".into()),
    )
    .await
    .expect("call must not hang");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_stop_aborts_pending_requests() {
    let (_server, client, _app) = start_pair().await;
    client.stop().await;
    let err = client
        .echo_sync("too late".into())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Stopped));
}
