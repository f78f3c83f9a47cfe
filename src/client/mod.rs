//! The session client.
//!
//! A [`Client`] ties together a [`Transport`], the [`SessionOptions`] it was
//! created with, an optional cookie jar and two interceptor chains. Every
//! request goes through the same pipeline in [`Client::send`]:
//!
//! 1. the request chain runs; its first failure aborts the call;
//! 2. the session options are attached to the request as an extension;
//! 3. matching cookies from the jar are added to the `Cookie` header;
//! 4. the transport performs the exchange;
//! 5. `Set-Cookie` headers of the response are stored in the jar;
//! 6. the response chain runs; its first failure is returned instead of the
//!    response.
//!
//! There is no global default client. Create one and share it by reference
//! or in an `Arc`; every method takes `&self`.
//!
//! ```rust
//! use requests_kit::{Client, Request, RequestOption, Response, SessionOptions, StatusCode, Transport};
//! use std::convert::Infallible;
//!
//! struct Canned;
//!
//! impl Transport for Canned {
//!     type Error = Infallible;
//!
//!     async fn send(&self, request: &mut Request) -> Result<Response, Infallible> {
//!         Ok(Response::new(StatusCode::OK, format!("{}", request.uri())))
//!     }
//! }
//!
//! # async fn example() -> requests_kit::Result<()> {
//! let client = Client::with_options(Canned, SessionOptions::default().with_cookie_jar());
//! client.request_interceptors().add(|request: &mut Request| {
//!     request.insert_extension("tagged");
//!     Ok(())
//! });
//!
//! let mut response = client
//!     .get("https://example.com/items", [RequestOption::params([("page", "1")])])
//!     .await?;
//! assert_eq!(response.text().await?.as_str(), "https://example.com/items?page=1");
//! # Ok(())
//! # }
//! ```
#[cfg(feature = "cookie")]
mod jar;

use http::{Method, Uri};

use crate::{
    interceptor::{RequestChain, ResponseChain},
    AnyTransport, Request, RequestOption, Response, Result, SessionOptions, Transport,
};

/// An HTTP session over a pluggable [`Transport`].
#[derive(Debug)]
pub struct Client {
    transport: AnyTransport,
    options: SessionOptions,
    #[cfg(feature = "cookie")]
    jar: Option<jar::CookieJar>,
    request_chain: RequestChain,
    response_chain: ResponseChain,
}

impl Client {
    /// Creates a client with default [`SessionOptions`].
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_options(transport, SessionOptions::default())
    }

    /// Creates a client with the given options.
    pub fn with_options(transport: impl Transport + 'static, options: SessionOptions) -> Self {
        Self {
            transport: AnyTransport::new(transport),
            options,
            #[cfg(feature = "cookie")]
            jar: options.cookie_jar.then(jar::CookieJar::new),
            request_chain: RequestChain::new(),
            response_chain: ResponseChain::new(),
        }
    }

    /// The options this client was created with.
    pub const fn options(&self) -> SessionOptions {
        self.options
    }

    /// Interceptors run on every request before it is dispatched.
    pub const fn request_interceptors(&self) -> &RequestChain {
        &self.request_chain
    }

    /// Interceptors run on every response before it is returned.
    pub const fn response_interceptors(&self) -> &ResponseChain {
        &self.response_chain
    }

    /// Returns a copy of the cookies currently held by the jar.
    ///
    /// Empty when the jar is disabled.
    #[cfg(feature = "cookie")]
    pub fn cookies(&self) -> Vec<cookie::Cookie<'static>> {
        self.jar
            .as_ref()
            .map(jar::CookieJar::snapshot)
            .unwrap_or_default()
    }

    /// Builds a request from `options` and sends it.
    ///
    /// # Errors
    ///
    /// Fails with a [`RequestError`](crate::RequestError) before anything is
    /// sent if the request cannot be built; otherwise as [`send`](Self::send).
    pub async fn request<U>(
        &self,
        method: Method,
        uri: U,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response>
    where
        U: TryInto<Uri>,
        U::Error: Into<http::Error>,
    {
        let request = Request::with_options(method, uri, options)?;
        self.send(request).await
    }

    /// Sends a `GET` request.
    pub async fn get<U>(&self, uri: U, options: impl IntoIterator<Item = RequestOption>) -> Result<Response>
    where
        U: TryInto<Uri>,
        U::Error: Into<http::Error>,
    {
        self.request(Method::GET, uri, options).await
    }

    /// Sends a `POST` request.
    pub async fn post<U>(&self, uri: U, options: impl IntoIterator<Item = RequestOption>) -> Result<Response>
    where
        U: TryInto<Uri>,
        U::Error: Into<http::Error>,
    {
        self.request(Method::POST, uri, options).await
    }

    /// Sends a `PUT` request.
    pub async fn put<U>(&self, uri: U, options: impl IntoIterator<Item = RequestOption>) -> Result<Response>
    where
        U: TryInto<Uri>,
        U::Error: Into<http::Error>,
    {
        self.request(Method::PUT, uri, options).await
    }

    /// Sends a `DELETE` request.
    pub async fn delete<U>(&self, uri: U, options: impl IntoIterator<Item = RequestOption>) -> Result<Response>
    where
        U: TryInto<Uri>,
        U::Error: Into<http::Error>,
    {
        self.request(Method::DELETE, uri, options).await
    }

    /// Runs `request` through the interceptor chains, the cookie jar and the
    /// transport.
    ///
    /// # Errors
    ///
    /// Interceptor failures are returned exactly as the interceptor produced
    /// them. A request-chain failure means the transport is never called.
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        self.request_chain.run(&mut request)?;
        request.insert_extension(self.options);

        #[cfg(feature = "cookie")]
        if let Some(jar) = &self.jar {
            jar.attach(&mut request)?;
        }

        let method = request.method().clone();
        let uri = request.uri().clone();
        tracing::debug!(%method, %uri, transport = self.transport.name(), "dispatching request");

        let mut response = match self.transport.send(&mut request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(%method, %uri, status = %error.status(), %error, "transport failed");
                return Err(error);
            }
        };
        tracing::debug!(%method, %uri, status = %response.status(), "received response");

        #[cfg(feature = "cookie")]
        if let Some(jar) = &self.jar {
            jar.store(&uri, &response);
        }

        self.response_chain.run(&mut response)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, header, HeaderValue, StatusCode};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Method, String, Option<String>)>>,
    }

    impl Transport for Recorder {
        type Error = core::convert::Infallible;

        async fn send(&self, request: &mut Request) -> core::result::Result<Response, Self::Error> {
            let cookie = request
                .get_header(header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            self.seen
                .lock()
                .push((request.method().clone(), request.uri().to_string(), cookie));

            let verify = request
                .get_extension::<SessionOptions>()
                .is_some_and(|options| options.verify_tls);
            Ok(Response::new(StatusCode::OK, if verify { "verified" } else { "unverified" })
                .header(header::SET_COOKIE, HeaderValue::from_static("sid=abc; Path=/")))
        }
    }

    #[tokio::test]
    async fn options_travel_with_the_request() {
        let recorder = Arc::new(Recorder::default());
        let client = Client::with_options(
            recorder.clone(),
            SessionOptions::default().without_tls_verification(),
        );

        let mut response = client.put("http://example.com/a", []).await.unwrap();
        assert_eq!(response.text().await.unwrap().as_str(), "unverified");
        assert_eq!(recorder.seen.lock()[0].0, Method::PUT);
    }

    #[tokio::test]
    async fn request_chain_failure_skips_transport() {
        let recorder = Arc::new(Recorder::default());
        let client = Client::new(recorder.clone());
        client.request_interceptors().add(|request: &mut Request| {
            if request.uri().path().starts_with("/admin") {
                bail!(403, "admin routes are blocked");
            }
            Ok(())
        });

        let err = client.get("http://example.com/admin/users", []).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "admin routes are blocked");
        assert!(recorder.seen.lock().is_empty());

        client.get("http://example.com/public", []).await.unwrap();
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn response_chain_can_reject() {
        let client = Client::new(Arc::new(Recorder::default()));
        client.response_interceptors().add(|response: &mut Response| {
            response.set_status(StatusCode::ACCEPTED);
            Ok(())
        });
        let rejecting = client.response_interceptors().add(|response: &mut Response| {
            if response.status() == StatusCode::ACCEPTED {
                bail!(StatusCode::BAD_GATEWAY, "upstream answered 202");
            }
            Ok(())
        });

        let err = client.delete("http://example.com/x", []).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        assert!(client.response_interceptors().remove(rejecting.unwrap()));
        let response = client.delete("http://example.com/x", []).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn invalid_request_is_not_sent() {
        let recorder = Arc::new(Recorder::default());
        let client = Client::new(recorder.clone());

        let err = client
            .post("http://example.com/", [RequestOption::headers([("bad name", "v")])])
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(recorder.seen.lock().is_empty());
    }

    #[cfg(feature = "cookie")]
    #[tokio::test]
    async fn cookie_jar_round_trip() {
        let recorder = Arc::new(Recorder::default());
        let client = Client::with_options(recorder.clone(), SessionOptions::default().with_cookie_jar());

        client.get("http://example.com/login", []).await.unwrap();
        client
            .get(
                "http://example.com/home",
                [RequestOption::cookies([("theme", "dark")])],
            )
            .await
            .unwrap();
        client.get("http://elsewhere.org/", []).await.unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen[0].2, None);
        assert_eq!(seen[1].2.as_deref(), Some("theme=dark; sid=abc"));
        assert_eq!(seen[2].2, None);
        drop(seen);

        let stored: Vec<_> = client
            .cookies()
            .iter()
            .map(|c| format!("{}@{}", c.name(), c.domain().unwrap_or_default()))
            .collect();
        assert_eq!(stored, ["sid@example.com", "sid@elsewhere.org"]);
    }

    #[cfg(feature = "cookie")]
    #[tokio::test]
    async fn jar_disabled_by_default() {
        let recorder = Arc::new(Recorder::default());
        let client = Client::new(recorder.clone());

        client.get("http://example.com/", []).await.unwrap();
        client.get("http://example.com/", []).await.unwrap();

        assert!(client.cookies().is_empty());
        assert_eq!(recorder.seen.lock()[1].2, None);
    }
}
