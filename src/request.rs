//! HTTP request type and the option list used to build one.
//!
//! A [`Request`] is plain HTTP metadata (method, URI, version, headers,
//! extensions) plus a [`Body`]. Requests are usually built from a list of
//! [`RequestOption`]s with [`Request::with_options`], which is what
//! [`Client::request`](crate::Client::request) does under the hood.
//!
//! ```rust
//! use requests_kit::{header, Method, Request, RequestOption};
//!
//! # async fn example() -> requests_kit::Result<()> {
//! let mut request = Request::with_options(
//!     Method::POST,
//!     "https://api.example.com/users?verbose=1",
//!     [
//!         RequestOption::headers([("x-trace", "abc")]),
//!         RequestOption::params([("page", "2")]),
//!         RequestOption::form([("name", "alice")]),
//!     ],
//! )?;
//!
//! assert_eq!(request.uri().query(), Some("verbose=1&page=2"));
//! assert_eq!(request.get_header(header::CONTENT_TYPE).unwrap(), "application/x-www-form-urlencoded");
//! assert_eq!(request.into_string().await?.as_str(), "name=alice");
//! # Ok(())
//! # }
//! ```
use crate::{body::BodyFrozen, multipart::Form, Body, BodyError, HttpError};
use bytes::Bytes;
use bytestr::ByteStr;
use http::{
    header::{self, GetAll, HeaderName, InvalidHeaderName, InvalidHeaderValue},
    uri::PathAndQuery,
    Extensions, HeaderMap, HeaderValue, Method, StatusCode, Uri, Version,
};

type RequestParts = http::request::Parts;

/// Errors raised while building a request from options.
///
/// All of them map to `400 Bad Request`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RequestError {
    /// A header name is not a valid HTTP token.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] InvalidHeaderName),
    /// A header value contains forbidden bytes.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    /// The URI could not be parsed, or the query could not be merged into it.
    #[error("invalid uri: {0}")]
    InvalidUri(http::Error),
    /// The JSON body could not be serialized.
    #[error("failed to encode json body: {0}")]
    Json(#[from] serde_json::Error),
    /// Query parameters or form fields could not be url-encoded.
    #[error("failed to url-encode: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
    /// A multipart file or reader part could not be read.
    #[error("failed to read multipart part: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError for RequestError {
    fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl RequestError {
    fn uri(error: impl Into<http::Error>) -> Self {
        Self::InvalidUri(error.into())
    }
}

/// One argument to [`Request::with_options`].
///
/// Options are applied in order. Header and query options accumulate; the
/// body options (`Form`, `Multipart`, `Json`, `Text`, `Bytes`, `Body`) each
/// replace the body, so the last one wins. `Form`, `Multipart` and `Json`
/// also set `Content-Type`; the raw body options leave headers alone.
#[derive(Debug)]
#[non_exhaustive]
pub enum RequestOption {
    /// Headers to set, replacing existing values with the same name.
    Headers(Vec<(String, String)>),
    /// Query parameters appended to the URI, after any existing query.
    Params(Vec<(String, String)>),
    /// Cookies appended to the `Cookie` header.
    #[cfg(feature = "cookie")]
    Cookies(Vec<cookie::Cookie<'static>>),
    /// Url-encoded form body.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` body. File and reader parts are read when the
    /// option is applied.
    Multipart(Form),
    /// JSON body.
    Json(serde_json::Value),
    /// UTF-8 text body.
    Text(String),
    /// Raw byte body.
    Bytes(Bytes),
    /// Any prepared body, including streaming ones.
    Body(Body),
}

fn pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<(String, String)>
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

impl RequestOption {
    /// Shorthand for [`RequestOption::Headers`].
    pub fn headers<K: Into<String>, V: Into<String>>(
        headers: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::Headers(pairs(headers))
    }

    /// Shorthand for [`RequestOption::Params`].
    pub fn params<K: Into<String>, V: Into<String>>(
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::Params(pairs(params))
    }

    /// Shorthand for [`RequestOption::Cookies`].
    #[cfg(feature = "cookie")]
    pub fn cookies<C: Into<cookie::Cookie<'static>>>(cookies: impl IntoIterator<Item = C>) -> Self {
        Self::Cookies(cookies.into_iter().map(Into::into).collect())
    }

    /// Shorthand for [`RequestOption::Form`].
    pub fn form<K: Into<String>, V: Into<String>>(fields: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Form(pairs(fields))
    }

    /// Shorthand for [`RequestOption::Multipart`].
    pub fn multipart(form: Form) -> Self {
        Self::Multipart(form)
    }

    /// Serializes `value` into a [`RequestOption::Json`].
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, RequestError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Shorthand for [`RequestOption::Text`].
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Shorthand for [`RequestOption::Bytes`].
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<Body> for RequestOption {
    fn from(body: Body) -> Self {
        Self::Body(body)
    }
}

/// An HTTP request: metadata plus a [`Body`].
///
/// ```rust
/// use requests_kit::{header, HeaderValue, Method, Request, Uri};
///
/// let mut request = Request::get(Uri::from_static("https://example.com/items"))
///     .header(header::ACCEPT, HeaderValue::from_static("application/json"));
///
/// request.set_method(Method::HEAD);
/// assert_eq!(request.method(), Method::HEAD);
/// assert_eq!(request.get_header(header::ACCEPT).unwrap(), "application/json");
/// ```
#[derive(Debug)]
pub struct Request {
    parts: RequestParts,
    body: Body,
}

impl From<http::Request<Body>> for Request {
    fn from(request: http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self { parts, body }
    }
}

impl From<Request> for http::Request<Body> {
    fn from(request: Request) -> Self {
        Self::from_parts(request.parts, request.body)
    }
}

impl Request {
    /// Creates a request with an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        let mut request = http::Request::new(Body::empty());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        request.into()
    }

    /// Creates a `GET` request.
    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Creates a `POST` request.
    pub fn post(uri: Uri) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Creates a `PUT` request.
    pub fn put(uri: Uri) -> Self {
        Self::new(Method::PUT, uri)
    }

    /// Creates a `DELETE` request.
    pub fn delete(uri: Uri) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Parses `uri` and builds a request by applying `options` in order.
    ///
    /// # Errors
    ///
    /// Fails with [`RequestError`] when the URI does not parse, a header name
    /// or value is invalid, or a body cannot be serialized. Nothing is sent in
    /// that case.
    pub fn with_options<U>(
        method: Method,
        uri: U,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Self, RequestError>
    where
        U: TryInto<Uri>,
        U::Error: Into<http::Error>,
    {
        let uri = uri.try_into().map_err(RequestError::uri)?;
        let mut request = Self::new(method, uri);
        for option in options {
            request.apply(option)?;
        }
        Ok(request)
    }

    /// Applies a single option to this request.
    pub fn apply(&mut self, option: RequestOption) -> Result<(), RequestError> {
        match option {
            RequestOption::Headers(headers) => {
                for (name, value) in headers {
                    let name = HeaderName::from_bytes(name.as_bytes())?;
                    let value = HeaderValue::from_str(&value)?;
                    self.insert_header(name, value);
                }
            }
            RequestOption::Params(params) => self.append_query(&params)?,
            #[cfg(feature = "cookie")]
            RequestOption::Cookies(cookies) => {
                for cookie in cookies {
                    self.add_cookie(&cookie)?;
                }
            }
            RequestOption::Form(fields) => self.set_body_with_type(Body::from_form(&fields)?),
            RequestOption::Multipart(form) => self.set_body_with_type(form.into_body()?),
            RequestOption::Json(value) => self.set_body_with_type(Body::from_json(&value)?),
            RequestOption::Text(text) => {
                self.replace_body(Body::from_text(text));
            }
            RequestOption::Bytes(bytes) => {
                self.replace_body(Body::from_bytes(bytes));
            }
            RequestOption::Body(body) => {
                self.replace_body(body);
            }
        }
        Ok(())
    }

    fn set_body_with_type(&mut self, body: Body) {
        if let Some(value) = body
            .mime()
            .and_then(|mime| HeaderValue::from_str(mime.as_ref()).ok())
        {
            self.insert_header(header::CONTENT_TYPE, value);
        }
        self.replace_body(body);
    }

    /// Appends url-encoded pairs to the query string, keeping the existing query.
    fn append_query<T: serde::Serialize + ?Sized>(&mut self, params: &T) -> Result<(), RequestError> {
        let encoded = serde_urlencoded::to_string(params)?;
        if encoded.is_empty() {
            return Ok(());
        }
        let path = self.uri().path();
        let path_and_query = match self.uri().query() {
            Some(query) if !query.is_empty() => format!("{path}?{query}&{encoded}"),
            _ => format!("{path}?{encoded}"),
        };
        let mut parts = core::mem::take(self.uri_mut()).into_parts();
        parts.path_and_query =
            Some(PathAndQuery::try_from(path_and_query).map_err(RequestError::uri)?);
        *self.uri_mut() = Uri::from_parts(parts).map_err(RequestError::uri)?;
        Ok(())
    }

    /// Adds a cookie (name and value only) to the `Cookie` header.
    #[cfg(feature = "cookie")]
    pub fn add_cookie(&mut self, cookie: &cookie::Cookie<'_>) -> Result<(), RequestError> {
        let pair = cookie.stripped().to_string();
        let value = match self.get_header(header::COOKIE).map(HeaderValue::to_str) {
            Some(Ok(existing)) if !existing.is_empty() => format!("{existing}; {pair}"),
            _ => pair,
        };
        self.insert_header(header::COOKIE, HeaderValue::from_str(&value)?);
        Ok(())
    }

    /// Returns the request metadata.
    pub const fn parts(&self) -> &RequestParts {
        &self.parts
    }

    /// Returns the request metadata mutably.
    pub fn parts_mut(&mut self) -> &mut RequestParts {
        &mut self.parts
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Returns the HTTP method mutably.
    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.parts.method
    }

    /// Sets the HTTP method.
    pub fn set_method(&mut self, method: Method) {
        *self.method_mut() = method;
    }

    /// Returns the request URI.
    pub const fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Returns the request URI mutably.
    pub fn uri_mut(&mut self) -> &mut Uri {
        &mut self.parts.uri
    }

    /// Sets the request URI.
    pub fn set_uri(&mut self, uri: Uri) {
        *self.uri_mut() = uri;
    }

    /// Appends query parameters from any serializable value.
    ///
    /// ```rust
    /// use requests_kit::{Request, Uri};
    ///
    /// let request = Request::get(Uri::from_static("https://example.com/search?q=rust"))
    ///     .query(&[("page", 3)])
    ///     .unwrap();
    /// assert_eq!(request.uri().query(), Some("q=rust&page=3"));
    /// ```
    pub fn query<T: serde::Serialize + ?Sized>(mut self, params: &T) -> Result<Self, RequestError> {
        self.append_query(params)?;
        Ok(self)
    }

    /// Returns the HTTP version.
    pub const fn version(&self) -> Version {
        self.parts.version
    }

    /// Sets the HTTP version.
    pub fn set_version(&mut self, version: Version) {
        self.parts.version = version;
    }

    /// Sets a header and returns the request, for chaining.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Returns the headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Returns the headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    /// Returns the first value of a header.
    pub fn get_header(&self, name: HeaderName) -> Option<&HeaderValue> {
        self.headers().get(name)
    }

    /// Returns every value of a header.
    pub fn get_headers(&self, name: HeaderName) -> GetAll<'_, HeaderValue> {
        self.headers().get_all(name)
    }

    /// Appends a header value, keeping existing values.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().append(name, value);
    }

    /// Sets a header value, returning the previous one.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Option<HeaderValue> {
        self.headers_mut().insert(name, value)
    }

    /// Returns the extensions map.
    ///
    /// The client stores the active [`SessionOptions`](crate::SessionOptions)
    /// here before handing the request to the transport.
    pub const fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Returns the extensions map mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Returns the extension of type `T`, if any.
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions().get()
    }

    /// Inserts an extension, returning the previous value of the same type.
    pub fn insert_extension<T: Send + Sync + Clone + 'static>(&mut self, extension: T) -> Option<T> {
        self.extensions_mut().insert(extension)
    }

    /// Removes and returns the extension of type `T`.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions_mut().remove()
    }

    /// Returns the body.
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the body mutably.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Takes the body out, leaving a frozen one.
    pub fn take_body(&mut self) -> Result<Body, BodyFrozen> {
        Body::take(&mut self.body)
    }

    /// Replaces the body and returns the previous one.
    pub fn replace_body(&mut self, body: impl Into<Body>) -> Body {
        self.body.replace(body.into())
    }

    /// Serializes `value` as the JSON body and sets `Content-Type`.
    pub fn json<T: serde::Serialize>(mut self, value: T) -> Result<Self, RequestError> {
        self.set_body_with_type(Body::from_json(value)?);
        Ok(self)
    }

    /// Serializes `value` as a url-encoded form body and sets `Content-Type`.
    pub fn form<T: serde::Serialize>(mut self, value: T) -> Result<Self, RequestError> {
        self.set_body_with_type(Body::from_form(value)?);
        Ok(self)
    }

    /// Streams a file as the body; `Content-Type` is guessed from the extension.
    #[cfg(feature = "fs")]
    pub async fn file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self, std::io::Error> {
        self.set_body_with_type(Body::from_file(path).await?);
        Ok(self)
    }

    /// Reads the whole body.
    pub async fn into_bytes(&mut self) -> Result<Bytes, BodyError> {
        self.body.buffer().await
    }

    /// Reads the whole body as UTF-8 text.
    pub async fn into_string(&mut self) -> Result<ByteStr, BodyError> {
        Ok(ByteStr::from_utf8(self.into_bytes().await?)?)
    }

    /// Reads the body as JSON.
    pub async fn into_json<'a, T>(&'a mut self) -> Result<T, BodyError>
    where
        T: serde::Deserialize<'a>,
    {
        self.body.into_json().await
    }

    /// Parses the `Content-Type` header.
    pub fn get_mime(&self) -> Option<mime::Mime> {
        self.get_header(header::CONTENT_TYPE)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}
