//! Error types and utilities.
//!
//! Every fallible operation in this crate returns [`Result`], whose error type
//! [`Error`] wraps any [`HttpError`]: a standard error paired with the HTTP
//! status code that best describes it. Interceptors and transports return the
//! same type, so a failure raised deep inside a chain reaches the caller of
//! [`Client::send`](crate::Client::send) unchanged.
//!
//! - [`Error`] - boxed error with an associated status code
//! - [`Result`] - `core::result::Result<T, Error>`
//! - [`ResultExt`] - attaches a status code to foreign errors and `None`s
//!
//! # Examples
//!
//! ```rust
//! use requests_kit::{Error, Result, ResultExt, StatusCode};
//!
//! let err = Error::msg("token expired").set_status(StatusCode::UNAUTHORIZED);
//! assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
//!
//! let parsed: Result<u16> = "8080".parse::<u16>().status(StatusCode::BAD_REQUEST);
//! assert_eq!(parsed.unwrap(), 8080);
//! ```
use core::{
    fmt,
    ops::{Deref, DerefMut},
};
use http::StatusCode;

/// The main error type of this crate.
///
/// Wraps any error together with an HTTP status code. The status is the one a
/// server would answer with for the same condition; on the client side it
/// classifies failures (e.g. `400` for a malformed request option, `415` for a
/// response that cannot be decoded).
pub struct Error {
    error: BoxError,
    status: StatusCode,
}

type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Errors that carry an HTTP status code.
///
/// Any type implementing this trait converts into [`Error`] with `?`. For
/// foreign errors use [`ResultExt::status`] to pick a status explicitly.
pub trait HttpError: core::error::Error + Send + Sync + 'static {
    /// Returns the associated HTTP status code.
    fn status(&self) -> StatusCode;
}

#[derive(Debug)]
struct MsgError<M: fmt::Display + fmt::Debug + Send + Sync + 'static> {
    msg: M,
}

#[derive(Debug)]
struct WithStatus {
    status: StatusCode,
    error: BoxError,
}

#[doc(hidden)]
pub mod __private {
    use http::StatusCode;

    /// Compile-time validator for status code literals.
    pub const fn assert_status_literal(status: u16) -> u16 {
        if status < 100 || status > 599 {
            panic!("Status code literal must be within 100..=599");
        }
        status
    }

    /// Compile-time validator for `StatusCode` constants.
    pub const fn assert_status_code(status: StatusCode) -> StatusCode {
        let value = status.as_u16();
        if value < 100 || value > 599 {
            panic!("Status code must be within 100..=599");
        }
        status
    }
}

impl<S: fmt::Display + fmt::Debug + Send + Sync + 'static> core::error::Error for MsgError<S> {}

impl<S: fmt::Display + fmt::Debug + Send + Sync + 'static> fmt::Display for MsgError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.msg, f)
    }
}

impl fmt::Display for WithStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl core::error::Error for WithStatus {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.error.source()
    }
}

impl HttpError for WithStatus {
    fn status(&self) -> StatusCode {
        self.status
    }
}

impl HttpError for core::convert::Infallible {
    fn status(&self) -> StatusCode {
        match *self {}
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Creates a new `Error` from any error type with the given status code.
    ///
    /// The error is stored as is; [`downcast`](Self::downcast) and friends
    /// return it unchanged.
    ///
    /// ```rust
    /// use requests_kit::{Error, StatusCode};
    ///
    /// let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
    /// let err = Error::new(io_err, StatusCode::GATEWAY_TIMEOUT);
    /// assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    /// assert_eq!(
    ///     err.downcast_ref::<std::io::Error>().map(std::io::Error::kind),
    ///     Some(std::io::ErrorKind::TimedOut)
    /// );
    /// ```
    pub fn new<E>(error: E, status: StatusCode) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self {
            error: Box::new(error),
            status,
        }
    }

    /// Creates an `Error` from a message.
    ///
    /// The default status code is `SERVICE_UNAVAILABLE` (503).
    pub fn msg<M>(msg: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(MsgError { msg }, StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Returns the status code associated with this error.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets or overrides the status code associated with this error.
    pub fn set_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Attempts to downcast the inner error to a concrete type.
    ///
    /// Returns `Err(self)` (with the status preserved) when the inner error is
    /// of another type.
    pub fn downcast<E>(self) -> core::result::Result<Box<E>, Self>
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        let status = self.status;
        self.error
            .downcast::<E>()
            .map_err(|error| Self { error, status })
    }

    /// Attempts to downcast the inner error to a reference of the concrete type.
    ///
    /// ```rust
    /// use requests_kit::{Error, StatusCode};
    ///
    /// let err = Error::new(std::fmt::Error, StatusCode::BAD_REQUEST);
    /// assert!(err.downcast_ref::<std::fmt::Error>().is_some());
    /// assert!(err.downcast_ref::<std::io::Error>().is_none());
    /// ```
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        self.error.downcast_ref()
    }

    /// Attempts to downcast the inner error to a mutable reference of the concrete type.
    pub fn downcast_mut<E>(&mut self) -> Option<&mut E>
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        self.error.downcast_mut()
    }

    /// Consumes this error and returns it as an [`HttpError`] trait object
    /// reporting the current status.
    pub fn into_inner(self) -> Box<dyn HttpError> {
        Box::new(WithStatus {
            status: self.status,
            error: self.error,
        })
    }
}

impl<E> From<E> for Error
where
    E: HttpError,
{
    fn from(error: E) -> Self {
        let status = error.status();
        Self::new(error, status)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.error, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl AsRef<dyn core::error::Error + Send + Sync + 'static> for Error {
    fn as_ref(&self) -> &(dyn core::error::Error + Send + Sync + 'static) {
        self.deref()
    }
}

impl Deref for Error {
    type Target = dyn core::error::Error + Send + Sync + 'static;

    fn deref(&self) -> &Self::Target {
        self.error.as_ref()
    }
}

impl DerefMut for Error {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.error.as_mut()
    }
}

/// Extension trait that attaches a status code to `Result` and `Option` values.
///
/// ```rust
/// use requests_kit::{Result, ResultExt, StatusCode};
///
/// fn port(raw: &str) -> Result<u16> {
///     raw.parse::<u16>().status(StatusCode::BAD_REQUEST)
/// }
///
/// fn first_segment(path: &str) -> Result<&str> {
///     path.split('/').nth(1).status(StatusCode::NOT_FOUND)
/// }
/// # assert!(port("x").is_err());
/// # assert_eq!(first_segment("/a/b").unwrap(), "a");
/// ```
pub trait ResultExt<T>
where
    Self: Sized,
{
    /// Wraps an error (or converts `None`) into an [`Error`] with `status`.
    fn status(self, status: StatusCode) -> Result<T>;
}

impl<T, E> ResultExt<T> for core::result::Result<T, E>
where
    E: core::error::Error + Send + Sync + 'static,
{
    fn status(self, status: StatusCode) -> Result<T> {
        self.map_err(|error| Error::new(error, status))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn status(self, status: StatusCode) -> Result<T> {
        self.ok_or_else(|| Error::msg("None Error").set_status(status))
    }
}

/// Constructs an [`Error`] with a formatted message and a compile-time checked status code.
///
/// The first argument is a status literal (`404`) or a status constant path
/// (`StatusCode::NOT_FOUND`).
///
/// ```rust
/// use requests_kit::{error, StatusCode};
///
/// let rejected = error!(403, "host {} is not allowed", "internal.example");
/// assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
///
/// let unavailable = error!(StatusCode::SERVICE_UNAVAILABLE, "try again later");
/// assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
/// ```
#[macro_export]
macro_rules! error {
    ($status:literal, $fmt:expr $(, $args:expr)* $(,)?) => {{
        const __REQUESTS_KIT_STATUS: u16 =
            $crate::__error_private::assert_status_literal($status);
        let status = $crate::StatusCode::from_u16(__REQUESTS_KIT_STATUS)
            .expect("status code literal already validated");
        $crate::Error::msg(::std::format!($fmt $(, $args)*)).set_status(status)
    }};
    ($status:path, $fmt:expr $(, $args:expr)* $(,)?) => {{
        const __REQUESTS_KIT_STATUS: $crate::StatusCode =
            $crate::__error_private::assert_status_code($status);
        $crate::Error::msg(::std::format!($fmt $(, $args)*)).set_status(__REQUESTS_KIT_STATUS)
    }};
}

/// Returns early with an [`Error`] constructed by [`error!`].
///
/// ```rust
/// use requests_kit::{bail, Result};
///
/// fn require_https(scheme: &str) -> Result<()> {
///     if scheme != "https" {
///         bail!(400, "refusing to send credentials over {}", scheme);
///     }
///     Ok(())
/// }
/// # assert!(require_https("http").is_err());
/// ```
#[macro_export]
macro_rules! bail {
    ($status:literal, $fmt:expr $(, $args:expr)* $(,)?) => {{
        return Err($crate::error!($status, $fmt $(, $args)*));
    }};
    ($status:path, $fmt:expr $(, $args:expr)* $(,)?) => {{
        return Err($crate::error!($status, $fmt $(, $args)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded for {0}")]
    struct Quota(&'static str);

    impl HttpError for Quota {
        fn status(&self) -> StatusCode {
            StatusCode::TOO_MANY_REQUESTS
        }
    }

    #[test]
    fn new_keeps_the_original_error() {
        let err = Error::new(std::fmt::Error, StatusCode::BAD_REQUEST);
        assert!(err.downcast_ref::<std::fmt::Error>().is_some());
        assert!(err.downcast_ref::<std::io::Error>().is_none());

        let err = err.downcast::<std::io::Error>().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.downcast::<std::fmt::Error>().is_ok());
    }

    #[test]
    fn set_status_keeps_the_original_error() {
        let mut err = Error::from(Quota("alice")).set_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.downcast_ref::<Quota>().map(|quota| quota.0), Some("alice"));

        err.downcast_mut::<Quota>().unwrap().0 = "bob";
        assert_eq!(err.to_string(), "quota exceeded for bob");
    }

    #[test]
    fn http_errors_report_their_own_status() {
        let err: Error = Quota("carol").into();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.into_inner().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn result_ext_wraps_without_hiding() {
        let err = "x".parse::<u8>().status(StatusCode::BAD_REQUEST).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.downcast_ref::<core::num::ParseIntError>().is_some());

        let err = None::<u8>.status(StatusCode::NOT_FOUND).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "None Error");
    }
}
