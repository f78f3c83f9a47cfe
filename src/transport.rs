//! The seam between the client and the network.
//!
//! This crate never opens a socket itself. A [`Transport`] receives a fully
//! prepared [`Request`] and produces the [`Response`] the server sent back;
//! the [`Client`](crate::Client) wraps it with interceptor chains and the
//! cookie jar.
//!
//! The active [`SessionOptions`](crate::SessionOptions) travel with each
//! request as an extension, so a transport can honor
//! [`verify_tls`](crate::SessionOptions::verify_tls) per client.
//!
//! ```rust
//! use requests_kit::{Request, Response, StatusCode, Transport};
//! use std::convert::Infallible;
//!
//! struct Echo;
//!
//! impl Transport for Echo {
//!     type Error = Infallible;
//!
//!     async fn send(&self, request: &mut Request) -> Result<Response, Self::Error> {
//!         Ok(Response::new(StatusCode::OK, request.uri().to_string()))
//!     }
//! }
//! ```

use core::{any::type_name, fmt::Debug, future::Future, pin::Pin};
use std::sync::Arc;

use crate::{Error, Request, Response};

/// Sends requests and returns responses.
pub trait Transport: Send + Sync {
    /// Error returned when the exchange fails.
    ///
    /// Any [`HttpError`](crate::HttpError) qualifies, as does [`Error`] itself.
    type Error: Into<Error>;

    /// Performs one request/response exchange.
    fn send(
        &self,
        request: &mut Request,
    ) -> impl Future<Output = Result<Response, Self::Error>> + Send;
}

impl<T: Transport> Transport for &T {
    type Error = T::Error;
    async fn send(&self, request: &mut Request) -> Result<Response, Self::Error> {
        Transport::send(*self, request).await
    }
}

impl<T: Transport> Transport for Box<T> {
    type Error = T::Error;
    async fn send(&self, request: &mut Request) -> Result<Response, Self::Error> {
        Transport::send(self.as_ref(), request).await
    }
}

impl<T: Transport> Transport for Arc<T> {
    type Error = T::Error;
    async fn send(&self, request: &mut Request) -> Result<Response, Self::Error> {
        Transport::send(self.as_ref(), request).await
    }
}

trait TransportImpl: Send + Sync {
    fn send_inner<'this, 'req, 'fut>(
        &'this self,
        request: &'req mut Request,
    ) -> Pin<Box<dyn 'fut + Send + Future<Output = Result<Response, Error>>>>
    where
        'this: 'fut,
        'req: 'fut;

    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl<T: Transport> TransportImpl for T {
    fn send_inner<'this, 'req, 'fut>(
        &'this self,
        request: &'req mut Request,
    ) -> Pin<Box<dyn 'fut + Send + Future<Output = Result<Response, Error>>>>
    where
        'this: 'fut,
        'req: 'fut,
    {
        Box::pin(async move { Transport::send(self, request).await.map_err(Into::into) })
    }
}

/// Type-erased [`Transport`].
///
/// The client stores its transport this way so that `Client` itself is not
/// generic.
pub struct AnyTransport(Box<dyn TransportImpl>);

impl Debug for AnyTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "AnyTransport[{}]", self.name())
    }
}

impl AnyTransport {
    /// Erases the type of `transport`.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self(Box::new(transport))
    }

    /// Type name of the wrapped transport.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

impl Transport for AnyTransport {
    type Error = Error;
    async fn send(&self, request: &mut Request) -> Result<Response, Self::Error> {
        self.0.send_inner(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpError, Method, StatusCode, Uri};

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    impl HttpError for Refused {
        fn status(&self) -> StatusCode {
            StatusCode::BAD_GATEWAY
        }
    }

    struct Fixed(StatusCode);

    impl Transport for Fixed {
        type Error = Refused;

        async fn send(&self, request: &mut Request) -> Result<Response, Self::Error> {
            if request.uri().host() == Some("down.example") {
                return Err(Refused);
            }
            Ok(Response::new(self.0, request.method().as_str()))
        }
    }

    #[tokio::test]
    async fn any_transport_forwards() {
        let transport = AnyTransport::new(Arc::new(Fixed(StatusCode::CREATED)));
        assert!(transport.name().contains("Fixed"));

        let mut request = Request::new(Method::PUT, Uri::from_static("http://up.example/"));
        let mut response = transport.send(&mut request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.text().await.unwrap().as_str(), "PUT");
    }

    #[tokio::test]
    async fn errors_keep_their_status() {
        let fixed = Fixed(StatusCode::OK);
        let transport = AnyTransport::new(Box::new(Fixed(StatusCode::OK)));

        let mut request = Request::get(Uri::from_static("http://down.example/"));
        assert!(Transport::send(&&fixed, &mut request).await.is_err());

        let err = transport.send(&mut request).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(err.downcast_ref::<Refused>().is_some());
    }
}
