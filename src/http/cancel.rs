use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use http::{Request, Response};
use tracing::debug;

use crate::http_client::{HttpClient, HttpClientError};

pub use tokio_util::sync::CancellationToken;

/// How often an in-flight request checks whether it has been cancelled.
const CANCELLATION_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cancels `token` once `deadline` has elapsed. The timer thread is detached.
pub fn cancel_after(token: &CancellationToken, deadline: Duration) {
    let token = token.clone();
    thread::spawn(move || {
        thread::sleep(deadline);
        debug!("deadline of {deadline:?} reached, cancelling");
        token.cancel();
    });
}

/// [`HttpClient`] decorator that aborts the in-flight request as soon as its token fires.
///
/// The blocking call runs on a worker thread; once cancelled the caller gets
/// [`HttpClientError::Cancelled`] right away and the worker's eventual result is dropped.
#[derive(Debug, Clone)]
pub struct CancellableClient<C> {
    inner: C,
    token: CancellationToken,
}

impl<C> CancellableClient<C> {
    pub fn new(inner: C, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

impl<C> HttpClient for CancellableClient<C>
where
    C: HttpClient + Clone + Send + 'static,
{
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        if self.token.is_cancelled() {
            return Err(HttpClientError::Cancelled);
        }

        let (tx, rx) = mpsc::channel();
        let inner = self.inner.clone();
        thread::spawn(move || {
            // The receiver is gone when the request was cancelled.
            let _ = tx.send(inner.send(req));
        });

        loop {
            match rx.recv_timeout(CANCELLATION_POLL_INTERVAL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) if self.token.is_cancelled() => {
                    debug!("in-flight request cancelled");
                    return Err(HttpClientError::Cancelled);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(HttpClientError::TransportError(
                        "request worker terminated unexpectedly".to_string(),
                    ));
                }
            }
        }
    }
}
