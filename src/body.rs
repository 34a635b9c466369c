//! Request bodies.
//!
//! A request either carries a complete, in-memory payload or nothing at all;
//! there is no streaming upload. An empty payload is treated as no payload.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// An http request using [Body] as the body.
pub type Request = http::Request<Body>;

/// A request body which implements [http_body::Body](http_body::Body).
///
/// Bodies can be created from [`Bytes`](bytes::Bytes), [`String`](std::string::String),
/// [`Vec<u8>`], or static strings and byte slices using [`From`](std::convert::From)
/// implementations. `Option<T>` converts to an empty body when `None`.
///
/// An empty body can be created with [Body::empty](Body::empty).
#[derive(Debug, Default)]
#[pin_project::pin_project]
pub struct Body {
    #[pin]
    inner: InnerBody,
}

impl Body {
    /// Create a new empty body.
    pub fn empty() -> Self {
        Self {
            inner: InnerBody::Empty,
        }
    }

    /// Returns true if nothing will be written for this body.
    pub fn is_empty(&self) -> bool {
        matches!(self.inner, InnerBody::Empty)
    }
}

impl From<Bytes> for Body {
    fn from(body: Bytes) -> Self {
        Self { inner: body.into() }
    }
}

impl From<String> for Body {
    fn from(body: String) -> Self {
        Self {
            inner: Bytes::from(body).into(),
        }
    }
}

impl From<&'static str> for Body {
    fn from(body: &'static str) -> Self {
        Self {
            inner: Bytes::from_static(body.as_bytes()).into(),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(body: Vec<u8>) -> Self {
        Self {
            inner: Bytes::from(body).into(),
        }
    }
}

impl From<&'static [u8]> for Body {
    fn from(body: &'static [u8]) -> Self {
        Self {
            inner: Bytes::from_static(body).into(),
        }
    }
}

impl<T> From<Option<T>> for Body
where
    T: Into<Body>,
{
    fn from(body: Option<T>) -> Self {
        body.map(Into::into).unwrap_or_default()
    }
}

#[pin_project::pin_project(project = InnerBodyProj)]
enum InnerBody {
    Empty,
    Full(#[pin] Full<Bytes>),
}

impl Default for InnerBody {
    fn default() -> Self {
        Self::Empty
    }
}

impl From<Bytes> for InnerBody {
    fn from(body: Bytes) -> Self {
        if body.is_empty() {
            Self::Empty
        } else {
            Self::Full(Full::new(body))
        }
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        match this.inner.project() {
            InnerBodyProj::Empty => Poll::Ready(None),
            InnerBodyProj::Full(body) => body.poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self.inner {
            InnerBody::Empty => true,
            InnerBody::Full(ref body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self.inner {
            InnerBody::Empty => http_body::SizeHint::with_exact(0),
            InnerBody::Full(ref body) => body.size_hint(),
        }
    }
}

impl fmt::Debug for InnerBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InnerBody::Empty => f.debug_struct("Empty").finish(),
            InnerBody::Full(body) => f
                .debug_struct("Full")
                .field("len", &http_body::Body::size_hint(body).exact())
                .finish(),
        }
    }
}
