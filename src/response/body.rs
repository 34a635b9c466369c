//! The buffered response body.
//!
//! A response body is drained exactly once, by a task spawned as soon as the
//! response headers arrive. The outcome is stored in a shared future which every
//! accessor on [`Response`](super::Response) awaits.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt as _;
use http_body_util::BodyExt as _;
use thiserror::Error;
use tokio::sync::watch;
use tracing::Instrument as _;

use crate::BoxError;

/// The body stream failed before it ended.
///
/// Clones share the same underlying error, which is available unchanged
/// through [`get_ref`](BodyError::get_ref).
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct BodyError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl BodyError {
    fn new<E: Into<BoxError>>(error: E) -> Self {
        Self(Arc::from(error.into()))
    }

    /// The error reported by the body stream.
    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Attempt to downcast the underlying error to a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.get_ref().downcast_ref()
    }
}

/// Progress of the drain, as seen by [`SharedBody::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// Chunks are still arriving.
    Draining,

    /// The stream ended and the full body is buffered.
    Complete,

    /// The stream failed.
    Failed,
}

/// A single-assignment, shareable handle to a response body being drained.
///
/// Cloning the handle does not restart the drain.
#[derive(Clone)]
pub struct SharedBody {
    inner: Shared<BoxFuture<'static, Result<Bytes, BodyError>>>,
    state: watch::Receiver<DrainState>,
}

impl SharedBody {
    /// Start draining `body` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn drain<B>(body: B) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let span = tracing::trace_span!("drain");
        let (progress, state) = watch::channel(DrainState::Draining);
        let handle = tokio::spawn(
            async move {
                let outcome = drain(body).await;
                progress.send_replace(match outcome {
                    Ok(_) => DrainState::Complete,
                    Err(_) => DrainState::Failed,
                });
                outcome
            }
            .instrument(span),
        );

        let inner = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(error) => Err(BodyError::new(error)),
            }
        }
        .boxed()
        .shared();

        Self { inner, state }
    }

    /// Wait for the drain to finish and return its outcome.
    ///
    /// Every call, from any clone, returns the same outcome.
    pub async fn bytes(&self) -> Result<Bytes, BodyError> {
        self.inner.clone().await
    }

    /// Where the drain is, without waiting.
    pub fn state(&self) -> DrainState {
        match self.inner.peek() {
            Some(Ok(_)) => DrainState::Complete,
            Some(Err(_)) => DrainState::Failed,
            None => *self.state.borrow(),
        }
    }
}

impl fmt::Debug for SharedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBody")
            .field("state", &self.state())
            .finish()
    }
}

async fn drain<B>(body: B) -> Result<Bytes, BodyError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let mut body = std::pin::pin!(body);
    let mut buffer = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|error| {
            let error = BodyError::new(error);
            tracing::trace!(%error, "body stream failed");
            error
        })?;

        if let Ok(chunk) = frame.into_data() {
            tracing::trace!(len = chunk.len(), "body chunk");
            buffer.extend_from_slice(&chunk);
        }
    }

    tracing::trace!(len = buffer.len(), "body complete");
    Ok(buffer.freeze())
}
