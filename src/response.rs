//! HTTP response type and body decoding.
//!
//! Every decoding helper on [`Response`] goes through [`Response::bytes`],
//! which drains the body stream once and keeps the data. Calling `text()`
//! after `json()` (or any other combination) never reads the network twice.
//!
//! ```rust
//! use requests_kit::{header, HeaderValue, Response, StatusCode};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Item { id: u32 }
//!
//! # async fn example() -> requests_kit::Result<()> {
//! let mut response = Response::new(StatusCode::OK, r#"{"id": 7}"#)
//!     .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
//!
//! let item: Item = response.decode().await?;
//! assert_eq!(item.id, 7);
//! assert_eq!(response.text().await?.as_str(), r#"{"id": 7}"#);
//! # Ok(())
//! # }
//! ```
use crate::{
    body::BodyFrozen,
    multipart::{self, Field},
    Body, BodyError, HttpError, MultipartError, Value,
};
use bytes::Bytes;
use bytestr::ByteStr;
use serde::de::value::SeqDeserializer;
use futures_lite::{AsyncWrite, AsyncWriteExt, StreamExt};
use http::{
    header::{self, GetAll, HeaderName},
    Extensions, HeaderMap, HeaderValue, StatusCode, Version,
};

type ResponseParts = http::response::Parts;

/// Errors from [`Response::decode`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The response has no usable `Content-Type` header.
    #[error("response has no content type")]
    MissingContentType,
    /// The content type is neither JSON nor XML.
    #[error("unsupported response content type `{0}`")]
    UnsupportedContentType(String),
    /// Reading or parsing the body failed.
    #[error(transparent)]
    Body(#[from] BodyError),
    /// The multipart body could not be split into parts.
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    /// The multipart parts do not fit the requested type.
    #[error("failed to decode multipart parts: {0}")]
    Parts(serde::de::value::Error),
}

impl HttpError for DecodeError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingContentType | Self::UnsupportedContentType(_) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Body(error) => error.status(),
            Self::Multipart(error) => error.status(),
            Self::Parts(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// An HTTP response: status, headers, extensions and a [`Body`].
#[derive(Debug)]
pub struct Response {
    parts: ResponseParts,
    body: Body,
}

impl From<http::Response<Body>> for Response {
    fn from(response: http::Response<Body>) -> Self {
        let (parts, body) = response.into_parts();
        Self { parts, body }
    }
}

impl From<Response> for http::Response<Body> {
    fn from(response: Response) -> Self {
        Self::from_parts(response.parts, response.body)
    }
}

impl Response {
    /// Creates a response with the given status and body.
    ///
    /// Transports use this (or `From<http::Response<Body>>`) to hand back
    /// what they received.
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        let mut response = http::Response::new(body.into());
        *response.status_mut() = status;
        response.into()
    }

    /// Creates a `200 OK` response with an empty body.
    pub fn empty() -> Self {
        Self::new(StatusCode::OK, Body::empty())
    }

    /// Returns the status code.
    pub const fn status(&self) -> StatusCode {
        self.parts.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.parts.status = status;
    }

    /// Returns the HTTP version.
    pub const fn version(&self) -> Version {
        self.parts.version
    }

    /// Sets the HTTP version.
    pub fn set_version(&mut self, version: Version) {
        self.parts.version = version;
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

    /// Returns every value of a header, e.g. all `Set-Cookie` lines.
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

    /// Sets a header and returns the response, for chaining.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Returns the extensions map.
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

    /// Parses the `Content-Type` header.
    pub fn get_mime(&self) -> Option<mime::Mime> {
        self.get_header(header::CONTENT_TYPE)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }

    /// Returns the full body.
    ///
    /// The first call reads the body to the end and keeps the data; later
    /// calls return the kept data without touching the stream. A read error
    /// leaves the body frozen, so retrying reports [`BodyError::BodyFrozen`].
    pub async fn bytes(&mut self) -> Result<Bytes, BodyError> {
        self.body.buffer().await
    }

    /// Returns the full body as UTF-8 text.
    pub async fn text(&mut self) -> Result<ByteStr, BodyError> {
        Ok(ByteStr::from_utf8(self.bytes().await?)?)
    }

    /// Parses the body as JSON, ignoring `Content-Type`.
    pub async fn json<'a, T>(&'a mut self) -> Result<T, BodyError>
    where
        T: serde::Deserialize<'a>,
    {
        self.body.into_json().await
    }

    /// Parses the body as JSON into a [`Value`] tree, ready for
    /// [`find`](crate::find).
    ///
    /// ```rust
    /// use requests_kit::{path, Response, StatusCode};
    ///
    /// # async fn example() -> requests_kit::Result<()> {
    /// let mut response = Response::new(StatusCode::OK, r#"{"data": {"ids": [4, 5]}}"#);
    /// let tree = response.tree().await?;
    /// assert_eq!(tree.find_as::<i64>(&path!["data", "ids", 1]), Some(5));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn tree(&mut self) -> Result<Value, BodyError> {
        let json: serde_json::Value = self.body.into_json().await?;
        Ok(json.into())
    }

    /// Parses the body as XML, ignoring `Content-Type`.
    #[cfg(feature = "xml")]
    pub async fn xml<'a, T>(&'a mut self) -> Result<T, BodyError>
    where
        T: serde::Deserialize<'a>,
    {
        Ok(quick_xml::de::from_str(self.body.as_str().await?)?)
    }

    /// Splits a `multipart/*` body into its parts.
    ///
    /// The boundary is taken from the `Content-Type` header.
    ///
    /// ```rust
    /// use requests_kit::{header, HeaderValue, Response, StatusCode};
    ///
    /// # async fn example() -> requests_kit::Result<()> {
    /// let mut response = Response::new(
    ///     StatusCode::OK,
    ///     "--sep\r\nContent-Disposition: form-data; name=\"id\"\r\n\r\n42\r\n--sep--\r\n",
    /// )
    /// .header(header::CONTENT_TYPE, HeaderValue::from_static("multipart/form-data; boundary=sep"));
    ///
    /// let fields = response.multipart().await?;
    /// assert_eq!(fields[0].name(), Some("id"));
    /// assert_eq!(fields[0].text(), "42");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn multipart(&mut self) -> Result<Vec<Field>, DecodeError> {
        let mime = self.content_type()?;
        if mime.type_() != mime::MULTIPART {
            return Err(DecodeError::UnsupportedContentType(mime.essence_str().to_owned()));
        }
        let boundary = mime
            .get_param(mime::BOUNDARY)
            .ok_or(MultipartError::MissingBoundary)?
            .as_str()
            .to_owned();
        let body = self.bytes().await?;
        Ok(multipart::parse(&body, &boundary)?)
    }

    /// Parses the body according to its `Content-Type`.
    ///
    /// `application/json` and any `+json` type are parsed as JSON.
    /// `application/xml`, `text/xml` and any `+xml` type are parsed as XML
    /// when the `xml` feature is enabled. `multipart/form-data` is split with
    /// [`multipart`](Self::multipart) and the text of each part, in order,
    /// is deserialized as a sequence (e.g. into `Vec<String>`). Every other
    /// type is rejected with [`DecodeError::UnsupportedContentType`] before
    /// the body is read.
    pub async fn decode<T>(&mut self) -> Result<T, DecodeError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mime = self.content_type()?;

        if is_format(&mime, mime::JSON) {
            return Ok(self.json().await?);
        }
        #[cfg(feature = "xml")]
        if is_format(&mime, mime::XML) {
            return Ok(self.xml().await?);
        }
        if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
            let texts: Vec<String> = self
                .multipart()
                .await?
                .iter()
                .map(|field| field.text().into_owned())
                .collect();
            let parts = SeqDeserializer::<_, serde::de::value::Error>::new(texts.into_iter());
            return T::deserialize(parts).map_err(DecodeError::Parts);
        }
        Err(DecodeError::UnsupportedContentType(mime.essence_str().to_owned()))
    }

    fn content_type(&self) -> Result<mime::Mime, DecodeError> {
        let raw = self
            .get_header(header::CONTENT_TYPE)
            .ok_or(DecodeError::MissingContentType)?;
        let raw = raw
            .to_str()
            .map_err(|_| DecodeError::UnsupportedContentType(String::from_utf8_lossy(raw.as_bytes()).into_owned()))?;
        raw.parse()
            .map_err(|_| DecodeError::UnsupportedContentType(raw.to_owned()))
    }

    /// Drops the body without reading the rest of it.
    ///
    /// Any data kept by an earlier read is released too.
    pub fn discard(&mut self) {
        self.body.freeze();
    }

    /// Writes the body into `writer` and returns the number of bytes written.
    ///
    /// Data kept by an earlier read is written from memory. Otherwise the
    /// body is streamed chunk by chunk without being kept, and is left frozen.
    pub async fn copy_to<W>(&mut self, mut writer: W) -> Result<u64, BodyError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        if self.body.is_buffered() {
            let data = self.body.buffer().await?;
            writer.write_all(&data).await?;
            written = data.len() as u64;
        } else {
            let mut body = Body::take(&mut self.body)?;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
        }
        writer.flush().await?;
        Ok(written)
    }
}

fn is_format(mime: &mime::Mime, format: mime::Name<'_>) -> bool {
    mime.subtype() == format || mime.suffix() == Some(format)
}
