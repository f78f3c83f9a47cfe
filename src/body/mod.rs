//! HTTP request/response body handling.
//!
//! [`Body`] holds payload data in one of several forms:
//!
//! - **Bytes**: in-memory data, also the form a body takes once it has been buffered
//! - **Reader**: an `AsyncBufRead` source such as a file
//! - **Stream**: any `http_body::Body` or `Stream` of chunks, typically handed
//!   over by a transport
//! - **Frozen**: a consumed body that can no longer provide data
//!
//! Buffering is memoized: [`Body::buffer`], [`Body::as_bytes`] and the decoding
//! helpers built on them drain a streaming source exactly once and keep the
//! result, so repeated reads never touch the stream again.
//!
//! ```rust
//! use requests_kit::Body;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct User { name: String }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let body = Body::from_json(&User { name: "Alice".to_string() })?;
//! assert_eq!(body.mime().map(|m| m.as_ref()), Some("application/json"));
//!
//! let mut body = Body::from_bytes(r#"{"name":"Bob"}"#);
//! let user: User = body.into_json().await?;
//! assert_eq!(user.name, "Bob");
//! # Ok(())
//! # }
//! ```
mod convert;
mod error_type;
pub use error_type::{BodyFrozen, Error};

use bytes::Bytes;
use bytestr::ByteStr;
use futures_lite::{ready, AsyncBufRead, AsyncBufReadExt, Stream, StreamExt};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};
use mime::Mime;

use core::fmt::Debug;
use core::mem::{replace, swap, take};
use core::pin::Pin;
use core::task::{Context, Poll};

type BoxBufReader = Pin<Box<dyn AsyncBufRead + Send + Sync + 'static>>;

type BoxHttpBody =
    Pin<Box<dyn http_body::Body<Data = Bytes, Error = Error> + Send + Sync + 'static>>;

/// Flexible HTTP body that can represent data in various forms.
///
/// ```rust
/// use requests_kit::Body;
///
/// let body = Body::from_bytes("Hello, world!");
/// assert_eq!(body.len(), Some(13));
///
/// let empty = Body::empty();
/// assert_eq!(empty.is_empty(), Some(true));
/// ```
pub struct Body {
    mime: Option<Mime>,
    inner: BodyInner,
}

impl Debug for Body {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = match &self.inner {
            BodyInner::Once(_) => "Once",
            BodyInner::Reader { .. } => "Reader",
            BodyInner::HttpBody(_) => "Stream",
            BodyInner::Freeze => "Frozen",
        };
        f.debug_struct("Body")
            .field("state", &state)
            .field("len", &self.len())
            .field("mime", &self.mime)
            .finish()
    }
}

enum BodyInner {
    Once(Bytes),
    Reader {
        reader: BoxBufReader,
        length: Option<usize>,
    },
    HttpBody(BoxHttpBody),
    Freeze,
}

impl Body {
    /// Creates a new empty body.
    pub const fn empty() -> Self {
        Self {
            mime: None,
            inner: BodyInner::Once(Bytes::new()),
        }
    }

    /// Wraps any `http_body::Body`, e.g. the body a transport received.
    ///
    /// Data frames are converted to `Bytes`; trailers are skipped.
    ///
    /// ```rust
    /// use requests_kit::Body;
    /// use http_body_util::Full;
    /// use bytes::Bytes;
    ///
    /// let body = Body::new(Full::new(Bytes::from("Hello, world!")));
    /// assert_eq!(body.len(), None);
    /// ```
    pub fn new<B>(body: B) -> Self
    where
        B: Send + Sync + http_body::Body + 'static,
        B::Data: Into<Bytes>,
        B::Error: Into<Box<dyn core::error::Error + Send + Sync + 'static>>,
    {
        Self {
            mime: None,
            inner: BodyInner::HttpBody(Box::pin(
                body.map_frame(|frame| frame.map_data(|data| data.into()))
                    .map_err(|e| Error::Other(e.into())),
            )),
        }
    }

    /// Creates a frozen body that cannot provide data.
    pub const fn frozen() -> Self {
        Self {
            mime: None,
            inner: BodyInner::Freeze,
        }
    }

    /// Creates a body from an async buffered reader.
    ///
    /// `length` is a hint used for `len()` and buffer pre-allocation. The
    /// caller is responsible for setting the MIME type.
    pub fn from_reader(
        reader: impl AsyncBufRead + Send + Sync + 'static,
        length: impl Into<Option<usize>>,
    ) -> Self {
        Self {
            mime: None,
            inner: BodyInner::Reader {
                reader: Box::pin(reader),
                length: length.into(),
            },
        }
    }

    /// Creates a body from a stream of data chunks.
    ///
    /// ```rust
    /// use requests_kit::Body;
    /// use futures_lite::stream;
    ///
    /// let chunks = stream::iter(vec![
    ///     Ok::<_, std::io::Error>("Hello, ".as_bytes()),
    ///     Ok("world!".as_bytes()),
    /// ]);
    /// let body = Body::from_stream(chunks);
    /// ```
    pub fn from_stream<T, E, S>(stream: S) -> Self
    where
        T: Into<Bytes> + Send + 'static,
        E: Into<Error>,
        S: Stream<Item = Result<T, E>> + Send + Sync + 'static,
    {
        Self {
            mime: None,
            inner: BodyInner::HttpBody(Box::pin(StreamBody::new(stream.map(|result| {
                result
                    .map(|data| Frame::data(data.into()))
                    .map_err(|error| error.into())
            })))),
        }
    }

    /// Creates a body from bytes or byte-like data.
    ///
    /// The MIME type is set to `application/octet-stream`.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            mime: Some(mime::APPLICATION_OCTET_STREAM),
            inner: BodyInner::Once(data.into()),
        }
    }

    /// Creates a body from text.
    ///
    /// The MIME type is set to `text/plain; charset=utf-8`.
    pub fn from_text(str: impl Into<ByteStr>) -> Self {
        Self {
            mime: Some(mime::TEXT_PLAIN_UTF_8),
            inner: BodyInner::Once(str.into().into()),
        }
    }

    /// Creates a body streaming the contents of a file.
    ///
    /// The MIME type is guessed from the file extension.
    #[cfg(feature = "fs")]
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref();
        let file = async_fs::File::open(path).await?;
        let len = file.metadata().await?.len() as usize;
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| mime_guess::from_ext(ext).first());
        Ok(Self {
            mime,
            ..Self::from_reader(futures_lite::io::BufReader::new(file), len)
        })
    }

    /// Creates a body by serializing a value to JSON.
    ///
    /// The MIME type is set to `application/json`.
    pub fn from_json<T: serde::Serialize>(value: T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            mime: Some(mime::APPLICATION_JSON),
            ..Self::from_bytes(serde_json::to_vec(&value)?)
        })
    }

    /// Creates a body by serializing a value to URL-encoded form data.
    ///
    /// The MIME type is set to `application/x-www-form-urlencoded`.
    pub fn from_form<T: serde::Serialize>(value: T) -> Result<Self, serde_urlencoded::ser::Error> {
        Ok(Self {
            mime: Some(mime::APPLICATION_WWW_FORM_URLENCODED),
            ..Self::from_bytes(serde_urlencoded::to_string(value)?)
        })
    }

    /// Returns the MIME type of the body, if known.
    pub fn mime(&self) -> Option<&Mime> {
        self.mime.as_ref()
    }

    /// Sets the MIME type of the body.
    pub fn with_mime(mut self, mime: Mime) -> Self {
        self.mime = Some(mime);
        self
    }

    /// Returns the length of the body in bytes, if known without reading it.
    pub const fn len(&self) -> Option<usize> {
        match &self.inner {
            BodyInner::Once(bytes) => Some(bytes.len()),
            BodyInner::Reader { length, .. } => *length,
            _ => None,
        }
    }

    /// Returns whether the body is empty, if the length is known.
    pub const fn is_empty(&self) -> Option<bool> {
        match self.len() {
            Some(len) => Some(len == 0),
            None => None,
        }
    }

    /// Returns `true` once the body has been fully read into memory.
    pub const fn is_buffered(&self) -> bool {
        matches!(self.inner, BodyInner::Once(_))
    }

    /// Consumes the body and returns all its data.
    ///
    /// # Errors
    ///
    /// Fails if the body is frozen or the underlying source reports an error.
    pub async fn into_bytes(self) -> Result<Bytes, Error> {
        match self.inner {
            BodyInner::Once(bytes) => Ok(bytes),
            BodyInner::Reader { mut reader, length } => {
                let mut vec = Vec::with_capacity(length.unwrap_or_default());
                loop {
                    let data = reader.fill_buf().await?;
                    if data.is_empty() {
                        break;
                    }
                    let len = data.len();
                    vec.extend_from_slice(data);
                    reader.as_mut().consume(len);
                }
                Ok(vec.into())
            }
            BodyInner::HttpBody(body) => {
                let mut body = body.into_data_stream();

                let first = body.try_next().await?.unwrap_or_default();
                let second = body.try_next().await?;
                if let Some(second) = second {
                    let remain_size_hint = body.size_hint();
                    let mut vec = Vec::with_capacity(
                        first.len()
                            + second.len()
                            + remain_size_hint.1.unwrap_or(remain_size_hint.0),
                    );
                    vec.extend_from_slice(&first);
                    vec.extend_from_slice(&second);
                    while let Some(data) = body.try_next().await? {
                        vec.extend_from_slice(&data);
                    }
                    Ok(vec.into())
                } else {
                    Ok(first)
                }
            }
            BodyInner::Freeze => Err(Error::BodyFrozen),
        }
    }

    /// Consumes the body and returns its data as UTF-8 text.
    pub async fn into_string(self) -> Result<ByteStr, Error> {
        Ok(ByteStr::from_utf8(self.into_bytes().await?)?)
    }

    /// Reads the whole body into memory (once) and returns a cheap handle to it.
    ///
    /// The first call drains the underlying source and stores the data in the
    /// body; later calls return the stored data. If draining fails the body
    /// is left frozen, so a broken stream is never polled twice.
    ///
    /// ```rust
    /// use requests_kit::Body;
    /// use futures_lite::stream;
    ///
    /// # async fn example() -> Result<(), requests_kit::BodyError> {
    /// let mut body = Body::from_stream(stream::iter(vec![
    ///     Ok::<_, std::io::Error>("a".as_bytes()),
    ///     Ok("b".as_bytes()),
    /// ]));
    /// assert_eq!(body.buffer().await?, "ab");
    /// assert!(body.is_buffered());
    /// assert_eq!(body.buffer().await?, "ab");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn buffer(&mut self) -> Result<Bytes, Error> {
        let source = match replace(&mut self.inner, BodyInner::Freeze) {
            BodyInner::Once(bytes) => {
                self.inner = BodyInner::Once(bytes.clone());
                return Ok(bytes);
            }
            BodyInner::Freeze => return Err(Error::BodyFrozen),
            source => source,
        };
        let bytes = Self {
            mime: None,
            inner: source,
        }
        .into_bytes()
        .await?;
        self.inner = BodyInner::Once(bytes.clone());
        Ok(bytes)
    }

    /// Returns a reference to the body data, buffering it first if needed.
    pub async fn as_bytes(&mut self) -> Result<&[u8], Error> {
        self.buffer().await?;
        match self.inner {
            BodyInner::Once(ref bytes) => Ok(bytes),
            _ => Err(Error::BodyFrozen),
        }
    }

    /// Returns the body data as a UTF-8 string slice, buffering it first if needed.
    pub async fn as_str(&mut self) -> Result<&str, Error> {
        let data = self.as_bytes().await?;
        Ok(core::str::from_utf8(data)?)
    }

    /// Deserializes the body as JSON.
    ///
    /// The `Content-Type` is not checked; see
    /// [`Response::decode`](crate::Response::decode) for content-type driven decoding.
    pub async fn into_json<'a, T>(&'a mut self) -> Result<T, Error>
    where
        T: serde::Deserialize<'a>,
    {
        Ok(serde_json::from_slice(self.as_bytes().await?)?)
    }

    /// Deserializes the body as URL-encoded form data.
    pub async fn into_form<'a, T>(&'a mut self) -> Result<T, Error>
    where
        T: serde::Deserialize<'a>,
    {
        Ok(serde_urlencoded::from_bytes(self.as_bytes().await?)?)
    }

    /// Replaces this body and returns the previous one.
    pub fn replace(&mut self, body: Body) -> Body {
        replace(self, body)
    }

    /// Swaps the contents of two bodies.
    ///
    /// # Errors
    ///
    /// Returns `BodyFrozen` if this body is frozen.
    pub fn swap(&mut self, body: &mut Body) -> Result<(), BodyFrozen> {
        if self.is_frozen() {
            Err(BodyFrozen::new())
        } else {
            swap(self, body);
            Ok(())
        }
    }

    /// Takes the body, leaving a frozen body in its place.
    ///
    /// # Errors
    ///
    /// Returns `BodyFrozen` if the body is already frozen.
    pub fn take(&mut self) -> Result<Self, BodyFrozen> {
        if self.is_frozen() {
            Err(BodyFrozen::new())
        } else {
            Ok(self.replace(Self::frozen()))
        }
    }

    /// Returns `true` if the body is frozen (consumed).
    pub const fn is_frozen(&self) -> bool {
        matches!(self.inner, BodyInner::Freeze)
    }

    /// Freezes the body, dropping its content and any underlying source.
    pub fn freeze(&mut self) {
        self.replace(Self::frozen());
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl Stream for Body {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.inner {
            BodyInner::Once(bytes) => {
                if bytes.is_empty() {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(take(bytes))))
                }
            }
            BodyInner::Reader { reader, length } => {
                let data = ready!(reader.as_mut().poll_fill_buf(cx))?;
                if data.is_empty() {
                    return Poll::Ready(None);
                }
                let data = Bytes::copy_from_slice(data);
                reader.as_mut().consume(data.len());
                if let Some(known_length) = length {
                    *known_length = known_length.saturating_sub(data.len());
                }
                Poll::Ready(Some(Ok(data)))
            }
            BodyInner::HttpBody(stream) => stream
                .as_mut()
                .poll_frame(cx)
                .map_ok(|frame| frame.into_data().unwrap_or_default()),
            BodyInner::Freeze => Poll::Ready(Some(Err(Error::BodyFrozen))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            BodyInner::Once(bytes) => (bytes.len(), Some(bytes.len())),
            BodyInner::Reader { length, .. } => (0, *length),
            BodyInner::HttpBody(body) => {
                let hint = body.size_hint();
                (hint.lower() as usize, hint.upper().map(|u| u as usize))
            }
            BodyInner::Freeze => (0, None),
        }
    }
}

impl http_body::Body for Body {
    type Data = Bytes;

    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        self.poll_next(cx)
            .map(|opt| opt.map(|result| result.map(http_body::Frame::data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted_stream(
        chunks: &'static [&'static str],
        polled: Arc<AtomicUsize>,
    ) -> impl Stream<Item = Result<&'static [u8], std::io::Error>> + Send + Sync {
        stream::iter(chunks.iter().map(move |chunk| {
            polled.fetch_add(1, Ordering::SeqCst);
            Ok(chunk.as_bytes())
        }))
    }

    #[tokio::test]
    async fn basic_body_operations() {
        let empty = Body::empty();
        assert_eq!(empty.len(), Some(0));
        assert_eq!(empty.is_empty(), Some(true));
        assert!(!empty.is_frozen());

        let text_body = Body::from_bytes("Hello, World!");
        assert_eq!(text_body.len(), Some(13));
        assert_eq!(text_body.is_empty(), Some(false));

        let result = text_body.into_bytes().await.unwrap();
        assert_eq!(result.as_ref(), b"Hello, World!");
    }

    #[tokio::test]
    async fn take_leaves_frozen_body() {
        let mut body = Body::from_bytes("test data");
        let taken = Body::take(&mut body).unwrap();
        assert!(body.is_frozen());
        assert_eq!(taken.into_bytes().await.unwrap().as_ref(), b"test data");

        assert!(matches!(body.into_bytes().await, Err(Error::BodyFrozen)));
    }

    #[tokio::test]
    async fn wraps_foreign_http_bodies() {
        let body = Body::new(http_body_util::Full::new(Bytes::from("from the wire")));
        assert_eq!(body.into_bytes().await.unwrap().as_ref(), b"from the wire");

        let frames = stream::iter(vec![
            Ok(Frame::data(Bytes::from("head"))),
            Err(core::fmt::Error),
        ]);
        let body = Body::new(StreamBody::new(frames));
        match body.into_bytes().await {
            Err(Error::Other(error)) => assert!(error.downcast_ref::<core::fmt::Error>().is_some()),
            other => panic!("expected a wrapped stream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_conversions_set_text_mime() {
        let body = Body::from("string conversion test");
        assert_eq!(body.mime(), Some(&mime::TEXT_PLAIN_UTF_8));
        assert_eq!(body.into_string().await.unwrap().as_str(), "string conversion test");

        let body = Body::from(vec![1u8, 2, 3]);
        assert_eq!(body.mime(), Some(&mime::APPLICATION_OCTET_STREAM));
        assert_eq!(body.into_bytes().await.unwrap().as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn buffer_drains_stream_once() {
        let polled = Arc::new(AtomicUsize::new(0));
        let mut body = Body::from_stream(counted_stream(&["ab", "cd", "ef"], polled.clone()));
        assert!(!body.is_buffered());

        assert_eq!(body.buffer().await.unwrap(), "abcdef");
        assert_eq!(polled.load(Ordering::SeqCst), 3);
        assert!(body.is_buffered());

        assert_eq!(body.as_bytes().await.unwrap(), b"abcdef");
        assert_eq!(body.as_str().await.unwrap(), "abcdef");
        assert_eq!(polled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_buffering_freezes_body() {
        let chunks = stream::iter(vec![
            Ok("partial".as_bytes()),
            Err(std::io::Error::other("connection reset")),
        ]);
        let mut body = Body::from_stream(chunks);

        assert!(matches!(body.buffer().await, Err(Error::Io(_))));
        assert!(body.is_frozen());
        assert!(matches!(body.buffer().await, Err(Error::BodyFrozen)));
    }

    #[tokio::test]
    async fn body_stream_yields_bytes() {
        let mut body = Body::from_bytes("streaming test data");
        let mut chunks = Vec::new();
        while let Some(chunk) = body.next().await {
            chunks.push(chunk.unwrap());
        }

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref(), b"streaming test data");
    }

    #[tokio::test]
    async fn json_and_form_bodies() {
        use serde::{Deserialize, Serialize};

        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Login {
            name: String,
            age: u32,
        }

        let data = Login {
            name: "Alice".to_string(),
            age: 30,
        };

        let mut body = Body::from_json(&data).unwrap();
        assert_eq!(body.mime(), Some(&mime::APPLICATION_JSON));
        let parsed: Login = body.into_json().await.unwrap();
        assert_eq!(parsed, data);

        let body = Body::from_form(&data).unwrap();
        assert_eq!(body.mime(), Some(&mime::APPLICATION_WWW_FORM_URLENCODED));
        assert_eq!(body.into_string().await.unwrap().as_str(), "name=Alice&age=30");
    }

    #[tokio::test]
    async fn reader_does_not_hang() {
        use futures_lite::io::{BufReader, Cursor};

        let data = "This test ensures the reader doesn't create infinite loops";
        let reader = BufReader::new(Cursor::new(data.as_bytes().to_vec()));

        let body = Body::from_reader(reader, data.len());
        assert_eq!(body.len(), Some(data.len()));
        assert_eq!(body.into_bytes().await.unwrap().as_ref(), data.as_bytes());
    }

    #[tokio::test]
    async fn invalid_utf8_is_reported() {
        let mut body = Body::from_bytes(vec![0xFF, 0xFE, 0xFD]);
        assert!(matches!(body.as_str().await, Err(Error::Utf8(_))));
    }

    #[tokio::test]
    async fn replace_and_swap() {
        let mut body = Body::from_bytes("original");
        let old_body = body.replace(Body::from_bytes("replacement"));
        assert_eq!(body.into_bytes().await.unwrap().as_ref(), b"replacement");
        assert_eq!(old_body.into_bytes().await.unwrap().as_ref(), b"original");

        let mut first = Body::from_bytes("first");
        let mut second = Body::from_bytes("second");
        first.swap(&mut second).unwrap();
        assert_eq!(first.into_bytes().await.unwrap().as_ref(), b"second");
        assert_eq!(second.into_bytes().await.unwrap().as_ref(), b"first");

        let mut frozen = Body::frozen();
        let mut normal = Body::from_bytes("test");
        assert!(frozen.swap(&mut normal).is_err());
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    async fn file_body_with_mime() {
        use std::io::Write;

        let file_path = std::env::temp_dir().join("requests_kit_body_mime.html");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"<html></html>").unwrap();

        let body = Body::from_file(&file_path).await.unwrap();
        assert_eq!(body.mime().unwrap().as_ref(), "text/html");
        assert_eq!(body.len(), Some(13));

        let _ = std::fs::remove_file(file_path);
    }
}
