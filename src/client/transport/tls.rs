//! TLS transport, layered over another [`Transport`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Uri;
use rustls::pki_types::ServerName;
use rustls::ClientConfig as TlsClientConfig;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{trace, Instrument};

use super::Transport;

/// Transport via TLS
///
/// Connects with the inner transport, then performs a TLS handshake using the URI
/// host as the server name. The stream is returned once the handshake completes.
#[derive(Debug, Clone)]
pub struct TlsTransport<T> {
    transport: T,
    config: Arc<TlsClientConfig>,
}

impl<T> TlsTransport<T> {
    /// Create a new `TlsTransport`
    pub fn new(transport: T, config: Arc<TlsClientConfig>) -> Self {
        Self { transport, config }
    }
}

impl<T> tower::Service<Uri> for TlsTransport<T>
where
    T: Transport + 'static,
    <T as Transport>::Error: Into<io::Error>,
{
    type Response = TlsStream<T::IO>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.transport.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Uri) -> Self::Future {
        let domain = match server_name(&req) {
            Ok(domain) => domain,
            Err(error) => return Box::pin(std::future::ready(Err(error))),
        };

        let connector = TlsConnector::from(self.config.clone());
        let connecting = self.transport.connect(req);
        let span = tracing::trace_span!("tls", domain = ?domain);

        Box::pin(
            async move {
                let stream = connecting.await.map_err(Into::into)?;
                trace!("tls handshake");
                let stream = connector.connect(domain, stream).await?;
                trace!("tls handshake complete");
                Ok(stream)
            }
            .instrument(span),
        )
    }
}

fn server_name(uri: &Uri) -> io::Result<ServerName<'static>> {
    let host = uri
        .host()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing host"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    ServerName::try_from(host.to_owned())
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))
}
