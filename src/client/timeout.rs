//! Applies an optional timeout to the wait for a response.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use pin_project::pin_project;

use super::Error;

/// Resolves with the inner future, or with [`Error::Timeout`] once the timeout
/// elapses. Without a timeout the inner future is awaited indefinitely.
///
/// When the timeout fires the inner future is not polled again; dropping this
/// future drops it, which aborts any work it owns.
#[derive(Debug)]
#[pin_project]
pub(crate) struct Timeout<F> {
    #[pin]
    inner: F,

    #[pin]
    sleep: Option<tokio::time::Sleep>,
}

impl<F> Timeout<F> {
    pub(crate) fn new(inner: F, timeout: Option<Duration>) -> Self {
        Self {
            inner,
            sleep: timeout.map(tokio::time::sleep),
        }
    }
}

impl<F, R> Future for Timeout<F>
where
    F: Future<Output = Result<R, Error>>,
{
    type Output = Result<R, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(response) = this.inner.poll(cx) {
            return Poll::Ready(response);
        }

        match this.sleep.as_pin_mut() {
            Some(sleep) => {
                ready!(sleep.poll(cx));
                tracing::debug!("request timed out");
                Poll::Ready(Err(Error::Timeout))
            }
            None => Poll::Pending,
        }
    }
}
