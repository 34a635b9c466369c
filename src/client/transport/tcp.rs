//! Plain TCP transport.
//!
//! Host names are resolved by tokio's resolver and every resolved address is tried
//! in order until one connects. The error from the last attempt is returned as-is.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::Uri;
use tokio::net::{lookup_host, TcpStream};
use tracing::{trace, Instrument};

type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A TCP connector for client connections.
///
/// This type is a [`tower::Service`] that opens a [`TcpStream`] to the host and port
/// named by a [`Uri`]. When the URI has no explicit port, the default port for `http`
/// (80) or `https` (443) is used; any other scheme must carry a port.
///
/// # Example
/// ```no_run
/// # use hyperfetch::client::transport::TcpTransport;
/// # use tower::ServiceExt as _;
/// # async fn run() {
/// let transport = TcpTransport::default();
///
/// let uri = "http://example.com".parse().unwrap();
/// let stream = transport.oneshot(uri).await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransport {
    nodelay: bool,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self { nodelay: true }
    }
}

impl TcpTransport {
    /// Create a TCP transport with `TCP_NODELAY` enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `TCP_NODELAY` on connected sockets.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Whether `TCP_NODELAY` is set on connected sockets.
    pub fn nodelay(&self) -> bool {
        self.nodelay
    }

    async fn connect(self, host: Box<str>, port: u16) -> io::Result<TcpStream> {
        let mut last_error = None;

        for address in lookup_host((&*host, port)).await? {
            trace!(%address, "tcp connecting");
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    trace!(peer.addr = %address, "tcp connected");
                    return Ok(stream);
                }
                Err(error) => {
                    trace!(%address, %error, "tcp connection attempt failed");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {host}"),
            )
        }))
    }
}

impl tower::Service<Uri> for TcpTransport {
    type Response = TcpStream;
    type Error = io::Error;
    type Future = BoxFuture<'static, Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Uri) -> Self::Future {
        let (host, port) = match get_host_and_port(&req) {
            Ok((host, port)) => (host, port),
            Err(e) => return Box::pin(std::future::ready(Err(e))),
        };

        let span = tracing::trace_span!("tcp", host = %host, port = %port);
        Box::pin(self.clone().connect(host, port).instrument(span))
    }
}

pub(super) fn get_host_and_port(uri: &Uri) -> io::Result<(Box<str>, u16)> {
    let invalid = |message: &str| io::Error::new(io::ErrorKind::InvalidInput, message.to_owned());

    let host = uri.host().ok_or_else(|| invalid("missing host"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = match uri.port_u16() {
        Some(port) => port,
        None => match uri.scheme_str() {
            Some(scheme) if scheme.eq_ignore_ascii_case("http") => 80,
            Some(scheme) if scheme.eq_ignore_ascii_case("https") => 443,
            _ => return Err(invalid("missing port")),
        },
    };

    Ok((host.into(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tower::ServiceExt as _;

    #[test]
    fn default_ports() {
        let (host, port) = get_host_and_port(&"http://example.com/".parse().unwrap()).unwrap();
        assert_eq!((&*host, port), ("example.com", 80));

        let (host, port) = get_host_and_port(&"https://[::1]/".parse().unwrap()).unwrap();
        assert_eq!((&*host, port), ("::1", 443));
    }

    #[test]
    fn nodelay_is_configurable() {
        assert!(TcpTransport::new().nodelay());
        assert!(!TcpTransport::new().with_nodelay(false).nodelay());
    }

    #[test]
    fn unknown_scheme_needs_port() {
        let error = get_host_and_port(&"ftp://example.com/".parse().unwrap()).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);

        let (_, port) = get_host_and_port(&"ftp://example.com:21/".parse().unwrap()).unwrap();
        assert_eq!(port, 21);
    }

    #[tokio::test]
    async fn connects_to_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let uri: Uri = format!("http://{addr}/").parse().unwrap();
        let transport = TcpTransport::new().with_nodelay(false);
        let (stream, accepted) = tokio::join!(transport.oneshot(uri), listener.accept());

        let stream = stream.unwrap();
        assert!(!stream.nodelay().unwrap());
        assert_eq!(stream.peer_addr().unwrap(), addr);
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn refused_connection_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let uri: Uri = format!("http://{addr}/").parse().unwrap();
        let error = TcpTransport::new().oneshot(uri).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);
    }
}
