#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]
//! A requests-style HTTP session layer.
//!
//! `requests-kit` sits between application code and whatever actually moves
//! bytes over the network. It builds requests from simple option lists, runs
//! them through ordered interceptor chains, keeps cookies between calls and
//! decodes responses, while the wire exchange itself is delegated to a
//! [`Transport`] you supply.
//!
//! # Overview
//!
//! - [`Client`] - a session: transport, [`SessionOptions`], cookie jar and
//!   two [`InterceptorChain`]s
//! - [`Request`] / [`RequestOption`] - request construction
//! - [`Response`] - memoized body reading, JSON/XML decoding,
//!   content-type driven [`decode`](Response::decode)
//! - [`Value`] / [`find`] / [`find_as`] - path lookup into decoded trees
//! - [`Body`] - in-memory, reader or stream bodies
//! - [`multipart`] - `multipart/form-data` request bodies and response parsing
//! - [`Error`] - one error type carrying an HTTP status code
//!
//! # Optional Features
//!
//! - `cookie` - cookie jar and `RequestOption::Cookies` (enabled by default)
//! - `xml` - XML decoding via `quick-xml`
//! - `fs` - file bodies with MIME type detection
//!
//! # Example
//!
//! ```rust
//! use requests_kit::{path, Client, Request, Response, StatusCode, Transport};
//! use std::convert::Infallible;
//!
//! struct Fixture;
//!
//! impl Transport for Fixture {
//!     type Error = Infallible;
//!
//!     async fn send(&self, _request: &mut Request) -> Result<Response, Infallible> {
//!         Ok(Response::new(StatusCode::OK, r#"{"abc": [123, 456, 789]}"#))
//!     }
//! }
//!
//! # async fn example() -> requests_kit::Result<()> {
//! let client = Client::new(Fixture);
//! let mut response = client.get("https://api.example.com/numbers", []).await?;
//!
//! let tree = response.tree().await?;
//! assert_eq!(tree.find_as::<i64>(&path!["abc", 2]), Some(789));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, HttpError, Result, ResultExt};
#[doc(hidden)]
pub use error::__private as __error_private;

mod body;
pub use body::Body;
pub use body::BodyFrozen;
pub use body::Error as BodyError;

mod value;
pub use value::{Dict, List, Number, Value};

pub mod lookup;
pub use lookup::{find, find_as, FromValue, PathStep};

pub mod interceptor;
#[doc(inline)]
pub use interceptor::{Interceptor, InterceptorChain, InterceptorId, RequestChain, ResponseChain};

pub mod multipart;
pub use multipart::MultipartError;

mod request;
pub use request::{Request, RequestError, RequestOption};

mod response;
pub use response::{DecodeError, Response};

pub mod transport;
#[doc(inline)]
pub use transport::{AnyTransport, Transport};

mod config;
pub use config::SessionOptions;

mod client;
pub use client::Client;

#[cfg(feature = "cookie")]
pub use cookie;

pub use http::{header, Extensions, HeaderMap, HeaderValue, Method, StatusCode, Uri, Version};
