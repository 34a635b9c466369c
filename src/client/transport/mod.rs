//! Transports carry the bytes of a single request and its response.
//!
//! A transport is a [`tower::Service`] which, given a [`Uri`], opens a bidirectional
//! byte stream to the host it names. Two transports are provided: plain TCP
//! ([`TcpTransport`]) and TLS over TCP ([`TlsTransport`], with the `tls` feature).
//! Which one is used for a request is decided by [`select`] from the URI scheme alone.

use std::future::{poll_fn, Future};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::header::HOST;
use http::uri::Port;
use http::{HeaderMap, HeaderValue, Uri};
use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tower::Service;

pub mod tcp;
#[cfg(feature = "tls")]
pub mod tls;

pub use self::tcp::TcpTransport;
#[cfg(feature = "tls")]
pub use self::tls::TlsTransport;

use super::Error;

/// Which kind of transport a URI is sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain TCP.
    Plain,

    /// TLS over TCP.
    Secure,
}

/// Choose the transport for a URI.
///
/// Only `https` selects the [secure](Scheme::Secure) transport. Every other scheme,
/// including ones no transport understands, falls through to [plain](Scheme::Plain)
/// TCP and fails there if it cannot be connected.
pub fn select(uri: &Uri) -> Scheme {
    let secure = uri
        .scheme_str()
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https"));

    if secure {
        Scheme::Secure
    } else {
        Scheme::Plain
    }
}

/// A transport opens a byte stream to the host named by a URI.
pub trait Transport: Clone + Send {
    /// The type of IO stream used by this transport
    type IO: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Error returned when connection fails
    type Error: std::error::Error + Send + Sync + 'static;

    /// The future type returned by this service
    type Future: Future<Output = Result<Self::IO, <Self as Transport>::Error>> + Send + 'static;

    /// Connect to a remote server and return a stream.
    fn connect(&mut self, uri: Uri) -> <Self as Transport>::Future;

    /// Poll the transport to see if it is ready to accept a new connection.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), <Self as Transport>::Error>>;
}

impl<T, IO> Transport for T
where
    T: Service<Uri, Response = IO>,
    T: Clone + Send + Sync + 'static,
    T::Error: std::error::Error + Send + Sync + 'static,
    T::Future: Send + 'static,
    IO: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type IO = IO;
    type Error = T::Error;
    type Future = T::Future;

    fn connect(&mut self, uri: Uri) -> <Self as Service<Uri>>::Future {
        self.call(uri)
    }

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), <Self as Transport>::Error>> {
        Service::poll_ready(self, cx)
    }
}

/// Wait for a transport to be ready, then connect once.
async fn connect_with<T: Transport>(
    mut transport: T,
    uri: Uri,
) -> Result<T::IO, <T as Transport>::Error> {
    poll_fn(|cx| transport.poll_ready(cx)).await?;
    transport.connect(uri).await
}

/// A connected stream, either plain or wrapped in TLS.
#[derive(Debug)]
#[pin_project(project = StreamProjection)]
pub enum Stream {
    /// Plain TCP stream.
    Plain(#[pin] TcpStream),

    /// TLS stream over TCP.
    #[cfg(feature = "tls")]
    Secure(#[pin] tokio_rustls::client::TlsStream<TcpStream>),
}

macro_rules! dispatch {
    ($stream:ident.$method:ident($($args:expr),*)) => {
        match $stream.project() {
            StreamProjection::Plain(stream) => stream.$method($($args),*),
            #[cfg(feature = "tls")]
            StreamProjection::Secure(stream) => stream.$method($($args),*),
        }
    };
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        dispatch!(self.poll_read(cx, buf))
    }
}

impl AsyncWrite for Stream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        dispatch!(self.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        dispatch!(self.poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        dispatch!(self.poll_shutdown(cx))
    }
}

/// Holds one transport per [`Scheme`] and connects through the one a URI selects.
#[derive(Debug, Clone)]
pub(crate) struct Connector {
    tcp: TcpTransport,
    #[cfg(feature = "tls")]
    tls: TlsTransport<TcpTransport>,
}

impl Connector {
    #[cfg(feature = "tls")]
    pub(crate) fn new(tcp: TcpTransport, tls: std::sync::Arc<rustls::ClientConfig>) -> Self {
        Self {
            tls: TlsTransport::new(tcp.clone(), tls),
            tcp,
        }
    }

    #[cfg(not(feature = "tls"))]
    pub(crate) fn new(tcp: TcpTransport) -> Self {
        Self { tcp }
    }

    /// Connect to the host named by `uri` over the transport its scheme selects.
    ///
    /// Transport errors are passed through unchanged.
    pub(crate) async fn connect(&self, uri: &Uri) -> Result<Stream, Error> {
        match select(uri) {
            Scheme::Plain => {
                let stream = connect_with(self.tcp.clone(), uri.clone())
                    .await
                    .map_err(Error::transport)?;
                Ok(Stream::Plain(stream))
            }

            #[cfg(feature = "tls")]
            Scheme::Secure => {
                let stream = connect_with(self.tls.clone(), uri.clone())
                    .await
                    .map_err(Error::transport)?;
                Ok(Stream::Secure(stream))
            }

            #[cfg(not(feature = "tls"))]
            Scheme::Secure => Err(Error::UnsupportedProtocol),
        }
    }
}

/// Returns the port if it is not the default port for the scheme.
fn get_non_default_port(uri: &Uri) -> Option<Port<&str>> {
    match (uri.port().map(|p| p.as_u16()), select(uri)) {
        (Some(443), Scheme::Secure) => None,
        (Some(80), Scheme::Plain) => None,
        _ => uri.port(),
    }
}

/// Set the Host header if the caller has not already set it,
/// using the authority from the URI.
pub(crate) fn set_host_header(headers: &mut HeaderMap, uri: &Uri) -> Result<(), Error> {
    let Some(hostname) = uri.host() else {
        tracing::debug!(%uri, "request uri has no host");
        return Ok(());
    };

    if headers.contains_key(HOST) {
        return Ok(());
    }

    let value = match get_non_default_port(uri) {
        Some(port) => HeaderValue::from_str(&format!("{hostname}:{port}")),
        None => HeaderValue::from_str(hostname),
    }
    .map_err(|error| Error::InvalidHeader(error.into()))?;

    headers.insert(HOST, value);
    Ok(())
}
