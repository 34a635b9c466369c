//! Issue one HTTP request and wait for the response headers.
//!
//! Each request opens its own connection through the transport selected by the
//! URL scheme (see [`transport::select`]), writes the request, and resolves as
//! soon as the response headers arrive. There is no pooling, no redirect
//! handling and no retry: exactly one of a response, a transport error, or a
//! timeout is returned per request.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::uri::PathAndQuery;
use http::Uri;
use hyper_util::rt::TokioIo;
use tokio::task::JoinHandle;
use tracing::Instrument as _;

use crate::body::{Body, Request};
use crate::response::Response;
use crate::Method;

mod builder;
mod error;
mod timeout;
pub mod transport;

pub use self::builder::Builder;
pub use self::error::{Error, InvalidUrl};
use self::timeout::Timeout;
use self::transport::Connector;

/// Values which can be turned into an absolute request URL.
///
/// Strings are parsed; a [`Uri`] is used as-is. Either way the URL must carry a
/// scheme and a host.
pub trait IntoUri {
    /// Convert into an absolute [`Uri`].
    fn into_uri(self) -> Result<Uri, InvalidUrl>;
}

impl IntoUri for Uri {
    fn into_uri(self) -> Result<Uri, InvalidUrl> {
        absolute(self)
    }
}

impl IntoUri for &Uri {
    fn into_uri(self) -> Result<Uri, InvalidUrl> {
        absolute(self.clone())
    }
}

impl IntoUri for &str {
    fn into_uri(self) -> Result<Uri, InvalidUrl> {
        absolute(self.parse()?)
    }
}

impl IntoUri for String {
    fn into_uri(self) -> Result<Uri, InvalidUrl> {
        absolute(Uri::try_from(self)?)
    }
}

impl IntoUri for &String {
    fn into_uri(self) -> Result<Uri, InvalidUrl> {
        self.as_str().into_uri()
    }
}

fn absolute(uri: Uri) -> Result<Uri, InvalidUrl> {
    if uri.scheme().is_some() && uri.host().is_some() {
        Ok(uri)
    } else {
        Err(InvalidUrl::NotAbsolute(uri))
    }
}

/// The request target sent on the request line: path and query only.
fn origin_form(uri: &Uri) -> Result<Uri, InvalidUrl> {
    match uri.path_and_query() {
        Some(target) if target.as_str().starts_with('/') => Ok(Uri::from(target.clone())),
        _ => {
            let target = match uri.query() {
                Some(query) => format!("/?{query}"),
                None => String::from("/"),
            };
            Ok(Uri::from(PathAndQuery::try_from(target)?))
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long to wait for response headers before aborting the request.
    ///
    /// Covers connecting, writing the request, and waiting for the peer to
    /// respond. Reading the body is not covered. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

#[cfg(feature = "tls")]
/// Get a default TLS client configuration by loading the platform's native certificates.
///
/// Certificates which fail to load are skipped with a warning.
pub fn default_tls_config() -> rustls::ClientConfig {
    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::warn!(%error, "could not load platform certificate");
    }

    let mut roots = rustls::RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::trace!(added, ignored, "loaded platform root certificates");

    let mut cfg = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    cfg.alpn_protocols.push(b"http/1.1".to_vec());
    cfg
}

/// Keeps the spawned connection task alive only once the response has arrived.
///
/// Dropping the guard before [`detach`](Driver::detach) aborts the connection.
struct Driver(Option<JoinHandle<()>>);

impl Driver {
    fn spawn<F>(connection: F) -> Self
    where
        F: Future<Output = Result<(), hyper::Error>> + Send + 'static,
    {
        let task = async move {
            if let Err(err) = connection.await {
                tracing::debug!(%err, "connection driver error");
            }
        };

        Self(Some(tokio::spawn(task.in_current_span())))
    }

    fn detach(mut self) {
        self.0.take();
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            tracing::trace!("aborting connection");
            handle.abort();
        }
    }
}

/// Inner type for managing the client configuration and transports.
struct ClientRef {
    config: Arc<ClientConfig>,
    connector: Connector,
}

impl ClientRef {
    #[tracing::instrument(
        name = "request",
        skip_all,
        fields(method = %request.method(), uri = %uri)
    )]
    async fn execute(&self, uri: Uri, request: Request) -> Result<Response, Error> {
        let exchange = async {
            let stream = self.connector.connect(&uri).await?;

            let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
                .await
                .map_err(Error::transport)?;
            let driver = Driver::spawn(connection);

            tracing::trace!("sending request");
            let response = sender.send_request(request).await.map_err(Error::transport)?;
            driver.detach();
            Ok::<_, Error>(response)
        };

        let response = Timeout::new(exchange, self.config.timeout).await?;
        tracing::debug!(status = %response.status(), "response headers received");

        Ok(Response::new(response))
    }
}

/// A client for one-shot HTTP and HTTPS requests.
///
/// Cloning is cheap; clones share configuration but never connections.
///
/// # Example
/// ```no_run
/// # use hyperfetch::{Client, Method};
/// # async fn run() -> Result<(), hyperfetch::Error> {
/// let client = Client::builder()
///     .with_timeout(std::time::Duration::from_secs(10))
///     .build();
///
/// let response = client
///     .request(Method::Get, "http://example.com/", [("Accept", "text/html")], None::<String>)
///     .await?;
/// println!("{}", response.status_code());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Builder::default().build()
    }
}

impl Client {
    /// Create a new, default builder for clients.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_parts(config: Arc<ClientConfig>, connector: Connector) -> Self {
        Client {
            inner: Arc::new(ClientRef { config, connector }),
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Send a request, and return a future of the response.
    ///
    /// Headers are sent exactly as given; only `Host` is added, and only when it is
    /// missing. An empty body is the same as no body. The URL and headers are
    /// checked before any connection is made.
    ///
    /// The future resolves once the response headers arrive, with the body still
    /// being read in the background.
    pub fn request<U, H, K, V, B>(
        &self,
        method: Method,
        url: U,
        headers: H,
        body: B,
    ) -> impl Future<Output = Result<Response, Error>> + Send + 'static
    where
        U: IntoUri,
        H: IntoIterator<Item = (K, V)>,
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
        B: Into<Body>,
    {
        let prepared = prepare(method, url, headers, body.into());
        let inner = self.inner.clone();

        async move {
            let (uri, request) = prepared?;
            inner.execute(uri, request).await
        }
    }

    /// Make a GET request to the given URL, without extra headers.
    pub fn get<U: IntoUri>(
        &self,
        url: U,
    ) -> impl Future<Output = Result<Response, Error>> + Send + 'static {
        self.request(
            Method::Get,
            url,
            std::iter::empty::<(HeaderName, HeaderValue)>(),
            Body::empty(),
        )
    }
}

fn prepare<U, H, K, V>(
    method: Method,
    url: U,
    headers: H,
    body: Body,
) -> Result<(Uri, Request), Error>
where
    U: IntoUri,
    H: IntoIterator<Item = (K, V)>,
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    let uri = url.into_uri()?;

    let mut builder = http::Request::builder()
        .method(http::Method::from(method))
        .uri(origin_form(&uri)?);

    for (name, value) in headers {
        builder = builder.header(name, value);
    }

    let mut request = builder.body(body).map_err(Error::InvalidHeader)?;
    transport::set_host_header(request.headers_mut(), &uri)?;

    Ok((uri, request))
}

/// Send a request with a default client.
///
/// The default client has no timeout. See [`Client::request`].
pub fn request<U, H, K, V, B>(
    method: Method,
    url: U,
    headers: H,
    body: B,
) -> impl Future<Output = Result<Response, Error>> + Send + 'static
where
    U: IntoUri,
    H: IntoIterator<Item = (K, V)>,
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    B: Into<Body>,
{
    static DEFAULT: OnceLock<Client> = OnceLock::new();
    DEFAULT
        .get_or_init(Client::default)
        .request(method, url, headers, body)
}
