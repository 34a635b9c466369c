//! Materialized responses.
//!
//! A [`Response`] is created as soon as the response headers arrive. Status and
//! headers are plain fields. The body is drained in the background into a single
//! shared buffer, and [`raw`](Response::raw), [`text`](Response::text) and
//! [`json`](Response::json) are views over that one buffer: however many times and
//! in whatever order they are called, the body is read from the connection once.

use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::BoxError;

mod body;
mod headers;

pub use self::body::{BodyError, DrainState, SharedBody};
pub use self::headers::{HeaderValueShape, Headers};

/// Failure decoding the body as text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TextError {
    /// The body could not be read.
    #[error(transparent)]
    Body(#[from] BodyError),

    /// The requested encoding label is not known.
    #[error("unknown text encoding: {0:?}")]
    UnknownEncoding(String),
}

/// Failure reading the body as JSON.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JsonError {
    /// The body could not be read.
    #[error(transparent)]
    Body(#[from] BodyError),

    /// The body is not valid JSON.
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// A response whose status and headers are known and whose body is buffered
/// in the background.
///
/// A failed body does not affect the status or headers, which stay readable.
#[derive(Clone)]
pub struct Response {
    status: Option<StatusCode>,
    status_message: Option<String>,
    headers: Headers,
    body: SharedBody,
}

impl Response {
    /// Materialize a response, and start draining its body.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<B>(response: http::Response<B>) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        let status_message = reason_phrase(&parts);

        Self::from_parts(
            Some(parts.status),
            status_message,
            Headers::from_map(&parts.headers),
            SharedBody::drain(body),
        )
    }

    /// Assemble a response from already-materialized parts.
    pub fn from_parts(
        status: Option<StatusCode>,
        status_message: Option<String>,
        headers: Headers,
        body: SharedBody,
    ) -> Self {
        Self {
            status,
            status_message,
            headers,
            body,
        }
    }

    /// The numeric status code, or `0` if none is known.
    pub fn status_code(&self) -> u16 {
        self.status.map_or(0, |status| status.as_u16())
    }

    /// The status, if known.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The reason phrase sent with the status line.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Response headers, one string per header name.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Shorthand for `self.headers().get(name)`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The shared body handle.
    pub fn body(&self) -> &SharedBody {
        &self.body
    }

    /// The complete body as bytes.
    pub async fn raw(&self) -> Result<Bytes, BodyError> {
        self.body.bytes().await
    }

    /// The complete body decoded as UTF-8. Invalid sequences are replaced with
    /// `U+FFFD`.
    pub async fn text(&self) -> Result<String, BodyError> {
        let payload = self.raw().await?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    /// The complete body decoded with the encoding named by `label`.
    ///
    /// `label` is any WHATWG encoding label understood by [`encoding_rs`], such as
    /// `"utf-8"`, `"latin1"` or `"utf-16le"`. A byte order mark is not stripped.
    ///
    /// Labels follow the WHATWG Encoding Standard, so `"latin1"` and
    /// `"iso-8859-1"` both decode as windows-1252: bytes `0x80..=0x9F` become
    /// typographic characters rather than C1 controls. Binary-to-text schemes
    /// such as hex or base64 are not encodings and are rejected with
    /// [`TextError::UnknownEncoding`].
    pub async fn text_with_encoding(&self, label: &str) -> Result<String, TextError> {
        let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| TextError::UnknownEncoding(label.to_owned()))?;

        let payload = self.raw().await?;
        let (text, malformed) = encoding.decode_without_bom_handling(&payload);
        if malformed {
            tracing::trace!(encoding = encoding.name(), "replaced malformed sequences");
        }

        Ok(text.into_owned())
    }

    /// The complete body parsed as JSON.
    ///
    /// Any JSON value is accepted at the top level, not only objects. An empty
    /// body is not valid JSON.
    pub async fn json(&self) -> Result<serde_json::Value, JsonError> {
        self.json_as().await
    }

    /// The complete body deserialized from JSON into `T`.
    pub async fn json_as<T: DeserializeOwned>(&self) -> Result<T, JsonError> {
        let payload = self.text().await?;
        Ok(serde_json::from_str(&payload)?)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status_code())
            .field("status_message", &self.status_message)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

/// The reason phrase from the status line, falling back to the canonical phrase.
///
/// hyper only records the received phrase when it differs from the canonical one.
fn reason_phrase(parts: &http::response::Parts) -> Option<String> {
    parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| parts.status.canonical_reason().map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;

    use http_body_util::{Empty, Full};
    use static_assertions::assert_impl_all;

    assert_impl_all!(Response: Send, Sync, Clone);
    assert_impl_all!(TextError: std::error::Error, Send, Sync);
    assert_impl_all!(JsonError: std::error::Error, Send, Sync);

    fn created(body: &'static str) -> Response {
        Response::new(
            http::Response::builder()
                .status(StatusCode::CREATED)
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from_static(body.as_bytes())))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn accessors_share_one_buffer() {
        let response = created(r#"{"status":"created"}"#);

        assert_eq!(response.status_code(), 201);
        assert_eq!(response.status_message(), Some("Created"));
        assert_eq!(response.header("content-type"), Some("application/json"));

        let json = response.json().await.unwrap();
        let text = response.text().await.unwrap();
        let raw = response.raw().await.unwrap();

        assert_eq!(&raw[..], br#"{"status":"created"}"#);
        assert_eq!(text, r#"{"status":"created"}"#);
        assert_eq!(json, serde_json::json!({"status": "created"}));
    }

    #[tokio::test]
    async fn repeated_calls_agree() {
        let response = created("[1, 2, 3]");

        assert_eq!(response.raw().await.unwrap(), response.raw().await.unwrap());
        assert_eq!(response.json().await.unwrap(), serde_json::json!([1, 2, 3]));
        assert_eq!(response.json_as::<Vec<u8>>().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn non_object_json() {
        assert_eq!(created("true").json().await.unwrap(), serde_json::json!(true));
        assert_eq!(created("null").json().await.unwrap(), serde_json::Value::Null);
        assert_eq!(created("\"s\"").json().await.unwrap(), serde_json::json!("s"));
    }

    #[tokio::test]
    async fn empty_body() {
        let response = Response::new(
            http::Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Empty::<Bytes>::new())
                .unwrap(),
        );

        assert_eq!(response.status_code(), 204);
        assert!(response.raw().await.unwrap().is_empty());
        assert_eq!(response.text().await.unwrap(), "");

        let error = response.json().await.unwrap_err();
        assert!(matches!(error, JsonError::Parse(ref e) if e.is_eof()));
    }

    #[tokio::test]
    async fn parse_failure_leaves_other_accessors() {
        let response = created("not json");

        assert!(matches!(response.json().await, Err(JsonError::Parse(_))));
        assert_eq!(response.text().await.unwrap(), "not json");
    }

    #[tokio::test]
    async fn text_encodings() {
        let response = created("caf\u{e9}");
        let latin1 = response.text_with_encoding("latin1").await.unwrap();
        assert_eq!(latin1, "caf\u{c3}\u{a9}");

        let utf8 = response.text_with_encoding("utf-8").await.unwrap();
        assert_eq!(utf8, "caf\u{e9}");

        let windows = Response::new(http::Response::new(Full::new(Bytes::from_static(b"\x80"))));
        let euro = windows.text_with_encoding("iso-8859-1").await.unwrap();
        assert_eq!(euro, "\u{20ac}");

        let error = response.text_with_encoding("base64").await.unwrap_err();
        assert!(matches!(error, TextError::UnknownEncoding(_)));

        let error = response.text_with_encoding("klingon").await.unwrap_err();
        assert!(matches!(error, TextError::UnknownEncoding(ref label) if label == "klingon"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let response = Response::new(http::Response::new(Full::new(Bytes::from_static(
            b"ok\xff",
        ))));
        assert_eq!(response.text().await.unwrap(), "ok\u{fffd}");
    }

    #[tokio::test]
    async fn missing_status_is_zero() {
        let body = SharedBody::drain(Empty::<Bytes>::new());
        let response = Response::from_parts(None, None, Headers::default(), body);

        assert_eq!(response.status_code(), 0);
        assert_eq!(response.status_message(), None);
    }
}
