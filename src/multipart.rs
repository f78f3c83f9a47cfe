//! `multipart/form-data` bodies.
//!
//! [`Form`] builds a request body out of text fields and file parts; it is
//! sent with [`RequestOption::Multipart`](crate::RequestOption::Multipart).
//! [`parse`] splits a received multipart body into [`Field`]s and backs
//! [`Response::multipart`](crate::Response::multipart).
//!
//! ```rust
//! use requests_kit::multipart::{Form, Part};
//! use requests_kit::{header, Method, Request, RequestOption};
//!
//! # fn example() -> Result<(), requests_kit::RequestError> {
//! let form = Form::new()
//!     .text("title", "holiday")
//!     .part("photo", Part::bytes(&b"\x89PNG"[..]).file_name("beach.png"));
//!
//! let request = Request::with_options(
//!     Method::POST,
//!     "https://example.com/upload",
//!     [RequestOption::multipart(form)],
//! )?;
//! let content_type = request.get_header(header::CONTENT_TYPE).unwrap().to_str().unwrap();
//! assert!(content_type.starts_with("multipart/form-data; boundary="));
//! # Ok(())
//! # }
//! ```
use std::{borrow::Cow, fmt, io::Read, path::PathBuf};

use bytes::Bytes;
use http::StatusCode;
use memchr::memmem;
use mime::Mime;

use crate::{Body, HttpError};

/// A `multipart/form-data` body under construction.
///
/// Parts are written in the order they were added.
#[derive(Debug, Default)]
pub struct Form {
    parts: Vec<(String, Part)>,
}

/// One part of a [`Form`].
pub struct Part {
    source: Source,
    file_name: Option<String>,
    mime: Option<Mime>,
}

enum Source {
    Bytes(Bytes),
    Path(PathBuf),
    Reader(Box<dyn Read + Send + Sync>),
}

impl Form {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.part(name, Part::text(value))
    }

    /// Adds a file part read from `path` when the body is encoded.
    pub fn file(self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.part(name, Part::file(path))
    }

    /// Adds a prepared part.
    pub fn part(mut self, name: impl Into<String>, part: Part) -> Self {
        self.parts.push((name.into(), part));
        self
    }

    /// Number of parts added so far.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether no part has been added.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encodes the form into an in-memory body.
    ///
    /// The body's MIME type is `multipart/form-data` with a fresh random
    /// boundary.
    ///
    /// # Errors
    ///
    /// Fails when a file part cannot be opened or a reader part fails.
    pub fn into_body(self) -> std::io::Result<Body> {
        let boundary = boundary();
        let mut buf = Vec::new();
        for (name, part) in self.parts {
            buf.extend_from_slice(b"--");
            buf.extend_from_slice(boundary.as_bytes());
            buf.extend_from_slice(b"\r\n");
            part.write_headers(&name, &mut buf);
            buf.extend_from_slice(b"\r\n");
            part.write_data(&mut buf)?;
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"--");
        buf.extend_from_slice(boundary.as_bytes());
        buf.extend_from_slice(b"--\r\n");

        let body = Body::from_bytes(buf);
        Ok(match format!("multipart/form-data; boundary={boundary}").parse() {
            Ok(mime) => body.with_mime(mime),
            Err(_) => body,
        })
    }
}

impl Part {
    fn new(source: Source) -> Self {
        Self {
            source,
            file_name: None,
            mime: None,
        }
    }

    /// A plain text field.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(Source::Bytes(Bytes::from(value.into())))
    }

    /// A field with raw bytes.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::new(Source::Bytes(data.into()))
    }

    /// A file read from `path` when the form is encoded.
    ///
    /// The file name is the last component of `path`; both `/` and `\` count
    /// as separators.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = file_name_of(&path.to_string_lossy()).to_owned();
        Self::new(Source::Path(path)).file_name(file_name)
    }

    /// A file part whose content is read from `reader` when the form is encoded.
    pub fn reader(reader: impl Read + Send + Sync + 'static) -> Self {
        Self::new(Source::Reader(Box::new(reader)))
    }

    /// Sets the file name sent in `Content-Disposition`.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Sets the part's `Content-Type`.
    pub fn mime(mut self, mime: Mime) -> Self {
        self.mime = Some(mime);
        self
    }

    fn is_file(&self) -> bool {
        self.file_name.is_some() || !matches!(self.source, Source::Bytes(_))
    }

    fn write_headers(&self, name: &str, buf: &mut Vec<u8>) {
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape(name));
        if self.is_file() {
            let file_name = self.file_name.as_deref().unwrap_or_default();
            disposition.push_str(&format!("; filename=\"{}\"", escape(file_name)));
        }
        buf.extend_from_slice(disposition.as_bytes());
        buf.extend_from_slice(b"\r\n");

        let mime = match &self.mime {
            Some(mime) => Some(mime.as_ref()),
            None if self.is_file() => Some("application/octet-stream"),
            None => None,
        };
        if let Some(mime) = mime {
            buf.extend_from_slice(format!("Content-Type: {mime}\r\n").as_bytes());
        }
    }

    fn write_data(self, buf: &mut Vec<u8>) -> std::io::Result<()> {
        match self.source {
            Source::Bytes(bytes) => buf.extend_from_slice(&bytes),
            Source::Path(path) => {
                std::fs::File::open(path)?.read_to_end(buf)?;
            }
            Source::Reader(mut reader) => {
                reader.read_to_end(buf)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Bytes(bytes) => format!("{} bytes", bytes.len()),
            Source::Path(path) => path.display().to_string(),
            Source::Reader(_) => "reader".to_owned(),
        };
        f.debug_struct("Part")
            .field("source", &source)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .finish()
    }
}

fn boundary() -> String {
    format!("{:016x}{:016x}", fastrand::u64(..), fastrand::u64(..))
}

fn escape(value: &str) -> Cow<'_, str> {
    if value.contains(['\\', '"']) {
        Cow::Owned(value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        Cow::Borrowed(value)
    }
}

fn file_name_of(path: &str) -> &str {
    path.rfind(['\\', '/'])
        .map_or(path, |index| &path[index + 1..])
}

/// Errors from [`parse`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MultipartError {
    /// The content type carries no `boundary` parameter.
    #[error("multipart content type has no boundary")]
    MissingBoundary,
    /// No opening boundary line was found.
    #[error("multipart body does not contain its opening boundary")]
    MissingDelimiter,
    /// The body ends before the closing boundary.
    #[error("multipart body ends before its closing boundary")]
    Unterminated,
    /// A part's header block is not `Name: value` lines.
    #[error("malformed multipart part headers")]
    MalformedHeaders,
}

impl HttpError for MultipartError {
    fn status(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

/// One part of a parsed multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Field {
    /// The `name` from `Content-Disposition`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The `filename` from `Content-Disposition`.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The part's own `Content-Type`.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The part's content.
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// The part's content as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Consumes the field and returns its content.
    pub fn into_data(self) -> Bytes {
        self.data
    }

    fn parse(raw: Bytes) -> Result<Self, MultipartError> {
        let (head, data) = if raw.starts_with(b"\r\n") {
            (&raw[..0], raw.slice(2..))
        } else {
            let split = memmem::find(&raw, b"\r\n\r\n").ok_or(MultipartError::MalformedHeaders)?;
            (&raw[..split], raw.slice(split + 4..))
        };
        let head = std::str::from_utf8(head).map_err(|_| MultipartError::MalformedHeaders)?;

        let mut field = Self {
            name: None,
            file_name: None,
            content_type: None,
            data,
        };
        for line in head.split("\r\n").filter(|line| !line.is_empty()) {
            let (name, value) = line.split_once(':').ok_or(MultipartError::MalformedHeaders)?;
            let value = value.trim();
            if name.trim().eq_ignore_ascii_case("content-disposition") {
                for (key, param) in disposition_params(value) {
                    match key.as_str() {
                        "name" => field.name = Some(param),
                        "filename" => field.file_name = Some(param),
                        _ => {}
                    }
                }
            } else if name.trim().eq_ignore_ascii_case("content-type") {
                field.content_type = Some(value.to_owned());
            }
        }
        Ok(field)
    }
}

/// Splits `body` into its parts.
///
/// Text before the opening boundary and after the closing one is ignored.
///
/// ```rust
/// use bytes::Bytes;
/// use requests_kit::multipart;
///
/// let body = Bytes::from_static(
///     b"--xyz\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\none\r\n--xyz--\r\n",
/// );
/// let fields = multipart::parse(&body, "xyz").unwrap();
/// assert_eq!(fields[0].name(), Some("a"));
/// assert_eq!(fields[0].text(), "one");
/// ```
///
/// # Errors
///
/// Fails with [`MultipartError`] when the boundary is empty or missing from
/// `body`, or a part is malformed.
pub fn parse(body: &Bytes, boundary: &str) -> Result<Vec<Field>, MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }
    let delimiter = format!("--{boundary}");
    let separator = format!("\r\n{delimiter}");

    let opening = if body.starts_with(delimiter.as_bytes()) {
        0
    } else {
        memmem::find(body, separator.as_bytes()).ok_or(MultipartError::MissingDelimiter)? + 2
    };
    let mut pos = opening + delimiter.len();
    let mut fields = Vec::new();
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(fields);
        }
        let line_end = memmem::find(rest, b"\r\n").ok_or(MultipartError::Unterminated)?;
        if rest[..line_end].iter().any(|byte| !matches!(byte, b' ' | b'\t')) {
            return Err(MultipartError::MissingDelimiter);
        }
        pos += line_end + 2;

        let end = pos
            + memmem::find(&body[pos..], separator.as_bytes()).ok_or(MultipartError::Unterminated)?;
        fields.push(Field::parse(body.slice(pos..end))?);
        pos = end + separator.len();
    }
}

/// Parameters of a `Content-Disposition` value, keys lowercased.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let Some((_, mut rest)) = value.split_once(';') else {
        return params;
    };
    loop {
        rest = rest.trim_start_matches([' ', '\t', ';']);
        if rest.is_empty() {
            return params;
        }
        let key_end = rest.find(['=', ';']).unwrap_or(rest.len());
        let key = rest[..key_end].trim().to_ascii_lowercase();
        rest = &rest[key_end..];
        let Some(after) = rest.strip_prefix('=') else {
            continue;
        };
        let (param, remaining) = match after.strip_prefix('"') {
            Some(quoted) => unquote(quoted),
            None => {
                let end = after.find(';').unwrap_or(after.len());
                (after[..end].trim().to_owned(), &after[end..])
            }
        };
        params.push((key, param));
        rest = remaining;
    }
}

fn unquote(quoted: &str) -> (String, &str) {
    let mut out = String::new();
    let mut chars = quoted.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return (out, &quoted[index + 1..]),
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            c => out.push(c),
        }
    }
    (out, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn encoded(form: Form) -> (String, Bytes) {
        let mut body = form.into_body().unwrap();
        let mime = body.mime().unwrap().clone();
        let boundary = mime.get_param(mime::BOUNDARY).unwrap().as_str().to_owned();
        (boundary, body.buffer().await.unwrap())
    }

    #[tokio::test]
    async fn form_encodes_fields_in_order() {
        let form = Form::new()
            .text("user", "ada")
            .part("avatar", Part::bytes(&b"\x00\x01"[..]).file_name("me.png").mime(mime::IMAGE_PNG))
            .part("notes", Part::reader(std::io::Cursor::new(b"from a reader".to_vec())));
        assert_eq!(form.len(), 3);

        let (boundary, data) = encoded(form).await;
        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"user\"\r\n\r\nada\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\
             Content-Type: image/png\r\n\r\n\x00\x01\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"notes\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nfrom a reader\r\n\
             --{b}--\r\n",
            b = boundary
        );
        assert_eq!(data, expected.as_bytes());
    }

    #[tokio::test]
    async fn file_parts_read_from_disk() {
        let path = std::env::temp_dir().join(format!("requests-kit-{}.txt", fastrand::u64(..)));
        std::fs::write(&path, "file content").unwrap();

        let (boundary, data) = encoded(Form::new().file("doc", &path)).await;
        std::fs::remove_file(&path).unwrap();

        let fields = parse(&data, &boundary).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name(), Some("doc"));
        assert_eq!(fields[0].file_name(), path.file_name().and_then(|name| name.to_str()));
        assert_eq!(fields[0].content_type(), Some("application/octet-stream"));
        assert_eq!(fields[0].text(), "file content");
    }

    #[test]
    fn missing_file_fails_encoding() {
        let form = Form::new().file("doc", "/definitely/not/here.txt");
        let err = form.into_body().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn file_names_from_paths() {
        assert_eq!(file_name_of("/tmp/report.pdf"), "report.pdf");
        assert_eq!(file_name_of(r"C:\Users\ada\report.pdf"), "report.pdf");
        assert_eq!(file_name_of("report.pdf"), "report.pdf");
        assert_eq!(Part::file("dir/a.txt").file_name.as_deref(), Some("a.txt"));
    }

    #[tokio::test]
    async fn quotes_are_escaped_and_parsed_back() {
        let form = Form::new().part("say \"hi\"", Part::text("x").file_name(r"a\b.txt"));
        let (boundary, data) = encoded(form).await;

        let fields = parse(&data, &boundary).unwrap();
        assert_eq!(fields[0].name(), Some("say \"hi\""));
        assert_eq!(fields[0].file_name(), Some(r"a\b.txt"));
    }

    #[test]
    fn parse_ignores_preamble_and_epilogue() {
        let body = Bytes::from_static(
            b"preamble\r\n--b1\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n\
              --b1 \r\n\r\nno headers\r\n--b1--\r\nepilogue",
        );
        let fields = parse(&body, "b1").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].text(), "1");
        assert_eq!(fields[1].name(), None);
        assert_eq!(fields[1].text(), "no headers");
    }

    #[test]
    fn parse_errors() {
        let body = Bytes::from_static(b"--b1\r\n\r\nunterminated");
        assert!(matches!(parse(&body, "b1"), Err(MultipartError::Unterminated)));
        assert!(matches!(parse(&body, "other"), Err(MultipartError::MissingDelimiter)));
        assert!(matches!(parse(&body, ""), Err(MultipartError::MissingBoundary)));

        let body = Bytes::from_static(b"--b1\r\nno colon here\r\n\r\nx\r\n--b1--");
        assert!(matches!(parse(&body, "b1"), Err(MultipartError::MalformedHeaders)));
    }

    #[test]
    fn empty_form_is_just_the_closing_boundary() {
        let body = Form::new().into_body().unwrap();
        assert!(body.len().is_some_and(|len| len > 4));
        let mime = body.mime().unwrap();
        assert_eq!(mime.type_(), mime::MULTIPART);
        assert_eq!(mime.subtype(), mime::FORM_DATA);
    }
}
