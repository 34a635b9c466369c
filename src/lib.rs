//! Hyperfetch
//!
//! One-shot HTTP and HTTPS requests on top of [hyper], returning a response whose
//! status and headers are available immediately and whose body is drained exactly
//! once into a buffer shared by every accessor.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! use hyperfetch::Method;
//!
//! let response = hyperfetch::request(
//!     Method::Post,
//!     "http://localhost:3333/form",
//!     [("Content-Type", "application/json")],
//!     r#"{"field":"value"}"#,
//! )
//! .await?;
//!
//! assert_eq!(response.status_code(), 201);
//! let payload = response.json().await?;
//! println!("{payload}");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod body;
pub use body::Body;
pub mod client;
pub use client::{request, Builder, Client, ClientConfig, Error};
mod method;
pub use method::{InvalidMethod, Method};
pub mod response;
pub use response::Response;

/// Boxed error type used where an underlying error is passed through without
/// being reinterpreted.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
