use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "tls")]
use rustls::ClientConfig as TlsClientConfig;

use super::transport::{Connector, TcpTransport};
use super::{Client, ClientConfig};
#[cfg(feature = "tls")]
use crate::client::default_tls_config;

/// A builder for a client.
///
/// No timeout is set by default. With the `tls` feature, `https` URLs use a TLS
/// configuration trusting the platform's native root certificates unless another
/// configuration is provided.
#[derive(Debug, Default)]
pub struct Builder {
    config: ClientConfig,
    tcp: TcpTransport,
    #[cfg(feature = "tls")]
    tls: Option<TlsClientConfig>,
}

impl Builder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort requests which have not received response headers within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Wait for response headers indefinitely.
    pub fn without_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Use the provided TCP transport.
    pub fn with_tcp(mut self, tcp: TcpTransport) -> Self {
        self.tcp = tcp;
        self
    }

    /// Client configuration.
    pub fn config(&mut self) -> &mut ClientConfig {
        &mut self.config
    }
}

#[cfg(feature = "tls")]
impl Builder {
    /// Use the provided TLS configuration.
    pub fn with_tls(mut self, config: TlsClientConfig) -> Self {
        self.tls = Some(config);
        self
    }

    /// Use the default TLS configuration with native root certificates.
    pub fn with_default_tls(mut self) -> Self {
        self.tls = Some(default_tls_config());
        self
    }

    /// TLS configuration.
    pub fn tls(&mut self) -> &mut Option<TlsClientConfig> {
        &mut self.tls
    }
}

impl Builder {
    /// Build a client.
    pub fn build(self) -> Client {
        #[cfg(feature = "tls")]
        let connector = Connector::new(
            self.tcp,
            Arc::new(self.tls.unwrap_or_else(default_tls_config)),
        );

        #[cfg(not(feature = "tls"))]
        let connector = Connector::new(self.tcp);

        Client::from_parts(Arc::new(self.config), connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_opt_in() {
        let mut builder = Builder::new();
        assert_eq!(builder.config().timeout, None);

        let mut builder = builder.with_timeout(Duration::from_millis(250));
        assert_eq!(builder.config().timeout, Some(Duration::from_millis(250)));

        let mut builder = builder.without_timeout();
        assert_eq!(builder.config().timeout, None);
    }

    #[test]
    fn build_keeps_config() {
        let client = Builder::new()
            .with_timeout(Duration::from_secs(3))
            .with_tcp(TcpTransport::new().with_nodelay(false))
            .build();
        assert_eq!(client.config().timeout, Some(Duration::from_secs(3)));
    }

    #[cfg(feature = "tls")]
    #[test]
    fn tls_config_is_opt_in() {
        let mut builder = Builder::new();
        assert!(builder.tls().is_none());

        let mut builder = builder.with_default_tls();
        let config = builder.tls().as_ref().expect("tls config is set");
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);

        let client = builder.build();
        assert_eq!(client.config().timeout, None);
    }
}
