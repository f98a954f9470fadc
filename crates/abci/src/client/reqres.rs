//! An in-flight request/response pair.

use crate::proto::{Request, Response};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

/// Per-request completion callback.
pub type ResponseCallback = Arc<dyn Fn(&Response) + Send + Sync>;

/// Client-wide callback fired for every completed request/response pair.
pub type GlobalCallback = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

struct ReqResState {
    response: Option<Response>,
    done: bool,
    callback: Option<ResponseCallback>,
    callback_invoked: bool,
}

/// Handle for a request in flight on an ABCI client.
///
/// Completion is a one-shot transition: the first [`set_done`] or [`abort`]
/// wins, later calls are no-ops. Waiters are released on completion, and the
/// per-request callback is invoked at most once, whether it was installed at
/// construction or after completion.
///
/// [`set_done`]: ReqRes::set_done
/// [`abort`]: ReqRes::abort
pub struct ReqRes {
    request: Request,
    state: Mutex<ReqResState>,
    notify: Notify,
}

impl ReqRes {
    /// A new in-flight pair for `request` with an optional callback.
    pub fn new(request: Request, callback: Option<ResponseCallback>) -> Self {
        Self {
            request,
            state: Mutex::new(ReqResState {
                response: None,
                done: false,
                callback,
                callback_invoked: false,
            }),
            notify: Notify::new(),
        }
    }

    /// The request this pair was created for.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The response, once completed. `None` while in flight or after an
    /// abort.
    pub fn response(&self) -> Option<Response> {
        self.state.lock().response.clone()
    }

    /// Whether the pair has completed or been aborted.
    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Complete with `response`, releasing all waiters. Returns `false` when
    /// the pair was already done. Does not run the callback; transports call
    /// [`invoke_callback`](ReqRes::invoke_callback) after their global
    /// callback.
    pub fn set_done(&self, response: Response) -> bool {
        {
            let mut st = self.state.lock();
            if st.done {
                return false;
            }
            st.response = Some(response);
            st.done = true;
        }
        self.notify.notify_waiters();
        true
    }

    /// Complete without a response, releasing all waiters. Used when the
    /// client shuts down with the request still queued or in flight; waiters
    /// must consult the client's sticky error.
    pub fn abort(&self) -> bool {
        {
            let mut st = self.state.lock();
            if st.done {
                return false;
            }
            st.done = true;
        }
        self.notify.notify_waiters();
        true
    }

    /// Run the per-request callback if one is installed, the pair completed
    /// with a response, and it has not run before.
    pub fn invoke_callback(&self) {
        let (cb, res) = {
            let mut st = self.state.lock();
            if st.callback_invoked || !st.done {
                return;
            }
            match (&st.callback, &st.response) {
                (Some(cb), Some(res)) => {
                    let pair = (cb.clone(), res.clone());
                    st.callback_invoked = true;
                    pair
                }
                _ => return,
            }
        };
        cb(&res);
    }

    /// Install a callback after construction. If the pair already completed
    /// with a response, the callback runs immediately on the calling task.
    pub fn set_callback(&self, callback: ResponseCallback) {
        let run_now = {
            let mut st = self.state.lock();
            st.callback = Some(callback);
            st.done && st.response.is_some() && !st.callback_invoked
        };
        if run_now {
            self.invoke_callback();
        }
    }

    /// Wait until the pair completes or is aborted, returning the response
    /// if one was set.
    pub async fn wait(&self) -> Option<Response> {
        loop {
            let notified = self.notify.notified();
            {
                let st = self.state.lock();
                if st.done {
                    return st.response.clone();
                }
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ReqRes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqRes")
            .field("request", &self.request.variant_name())
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_done_is_one_shot() {
        let rr = ReqRes::new(Request::echo("a"), None);
        assert!(rr.set_done(Response::exception("first")));
        assert!(!rr.set_done(Response::exception("second")));
        assert!(!rr.abort());
        let res = rr.wait().await.unwrap();
        assert_eq!(res.as_exception().unwrap().error, "first");
    }

    #[tokio::test]
    async fn test_wait_releases_on_set_done() {
        let rr = Arc::new(ReqRes::new(Request::flush(), None));
        let waiter = {
            let rr = rr.clone();
            tokio::spawn(async move { rr.wait().await })
        };
        tokio::task::yield_now().await;
        rr.set_done(Response {
            value: Some(crate::proto::response::Value::Flush(
                crate::proto::ResponseFlush {},
            )),
        });
        assert!(waiter.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_callback_runs_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let cb: ResponseCallback = {
            let count = count.clone();
            Arc::new(move |_res| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        let rr = ReqRes::new(Request::echo("a"), Some(cb));
        rr.set_done(Response::exception("x"));
        rr.invoke_callback();
        rr.invoke_callback();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_callback_fires_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let rr = ReqRes::new(Request::echo("a"), None);
        rr.set_done(Response::exception("x"));
        let cb: ResponseCallback = {
            let count = count.clone();
            Arc::new(move |_res| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        rr.set_callback(cb);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        rr.invoke_callback();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_releases_without_response() {
        let rr = ReqRes::new(Request::echo("a"), None);
        assert!(rr.abort());
        assert!(rr.wait().await.is_none());
    }
}
