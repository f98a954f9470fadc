//! In-process client calling the application directly.

use crate::application::{dispatch, Application};
use crate::client::reqres::{GlobalCallback, ReqRes, ResponseCallback};
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::proto::{request, Request};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Client that invokes an [`Application`] in the same process.
///
/// Consensus-path requests are serialized through a mutex so the application
/// never sees interleaved block execution. Mempool-path requests (`Echo`,
/// `Flush`, `CheckTx` and the recheck window markers) bypass the mutex, which
/// lets admission checks proceed while a block is being executed.
pub struct LocalClient<A> {
    app: Arc<A>,
    mtx: Mutex<()>,
    global_cb: parking_lot::Mutex<Option<GlobalCallback>>,
}

impl<A: Application> LocalClient<A> {
    /// A new client around `app`.
    pub fn new(app: Arc<A>) -> Self {
        Self {
            app,
            mtx: Mutex::new(()),
            global_cb: parking_lot::Mutex::new(None),
        }
    }

    fn bypasses_lock(req: &Request) -> bool {
        matches!(
            &req.value,
            Some(request::Value::Echo(_))
                | Some(request::Value::Flush(_))
                | Some(request::Value::CheckTx(_))
                | Some(request::Value::BeginRecheckTx(_))
                | Some(request::Value::EndRecheckTx(_))
        )
    }
}

#[async_trait]
impl<A: Application> Client for LocalClient<A> {
    async fn request(
        &self,
        req: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ReqRes>> {
        let res = if Self::bypasses_lock(&req) {
            dispatch(self.app.as_ref(), req.clone()).await
        } else {
            let _guard = self.mtx.lock().await;
            dispatch(self.app.as_ref(), req.clone()).await
        };
        if let Some(ex) = res.as_exception() {
            return Err(ClientError::Exception(ex.error.clone()));
        }

        let reqres = Arc::new(ReqRes::new(req, callback));
        reqres.set_done(res.clone());
        if let Some(cb) = self.global_cb.lock().clone() {
            cb(reqres.request(), &res);
        }
        reqres.invoke_callback();
        Ok(reqres)
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn error(&self) -> Option<ClientError> {
        None
    }

    fn set_global_callback(&self, callback: GlobalCallback) {
        *self.global_cb.lock() = Some(callback);
    }

    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{RequestCheckTx, RequestEcho, ResponseCheckTx, ResponseEcho};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingApp {
        checks: AtomicUsize,
    }

    #[async_trait]
    impl Application for CountingApp {
        async fn echo(&self, req: RequestEcho) -> ResponseEcho {
            ResponseEcho {
                message: req.message,
            }
        }

        async fn check_tx(&self, _req: RequestCheckTx) -> ResponseCheckTx {
            self.checks.fetch_add(1, Ordering::SeqCst);
            ResponseCheckTx::default()
        }
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let client = LocalClient::new(Arc::new(CountingApp {
            checks: AtomicUsize::new(0),
        }));
        let res = client.echo_sync("hello".into()).await.unwrap();
        assert_eq!(res.message, "hello");
    }

    #[tokio::test]
    async fn test_check_tx_reaches_app() {
        let app = Arc::new(CountingApp {
            checks: AtomicUsize::new(0),
        });
        let client = LocalClient::new(app.clone());
        let req = RequestCheckTx {
            tx: Bytes::from_static(b"tx"),
            r#type: 0,
        };
        client.check_tx_sync(req).await.unwrap();
        assert_eq!(app.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_global_callback_sees_every_pair() {
        let client = LocalClient::new(Arc::new(CountingApp {
            checks: AtomicUsize::new(0),
        }));
        let seen = Arc::new(AtomicUsize::new(0));
        let cb: GlobalCallback = {
            let seen = seen.clone();
            Arc::new(move |_req, _res| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };
        client.set_global_callback(cb);
        client.echo_sync("a".into()).await.unwrap();
        client.echo_sync("b".into()).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
