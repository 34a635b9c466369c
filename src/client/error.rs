use thiserror::Error;

use crate::BoxError;

/// Client error type.
///
/// Errors from the transport are carried unchanged in [`Error::Transport`];
/// only a timeout gets its own variant.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request URL could not be parsed, or is not an absolute URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[source] InvalidUrl),

    /// A request header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(#[source] http::Error),

    /// The connection failed, or the peer went away before responding.
    #[error(transparent)]
    Transport(BoxError),

    /// The URL requires a transport this build does not include.
    #[error("unsupported protocol")]
    UnsupportedProtocol,

    /// No response arrived within the configured timeout. The request was aborted.
    #[error("TIMEOUT: Request timed out")]
    Timeout,
}

impl Error {
    pub(crate) fn transport<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Transport(error.into())
    }

    /// Returns true if the request was aborted after timing out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// The underlying transport error, if this is one.
    pub fn transport_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Transport(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

/// Why a URL was rejected before any connection was made.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvalidUrl {
    /// The URL is not syntactically valid.
    #[error(transparent)]
    Parse(#[from] http::uri::InvalidUri),

    /// The URL has no scheme or no host.
    #[error("{0:?} is not an absolute URL")]
    NotAbsolute(http::Uri),
}

impl From<InvalidUrl> for Error {
    fn from(error: InvalidUrl) -> Self {
        Error::InvalidUrl(error)
    }
}
