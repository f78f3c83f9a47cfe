use core::error::Error as CoreError;
use core::fmt::Display;
use core::str::Utf8Error;
use http::StatusCode;

use crate::HttpError;

pub(crate) type BoxError = Box<dyn CoreError + Send + Sync + 'static>;

/// The body has been taken or frozen and cannot provide data anymore.
#[derive(Debug, thiserror::Error)]
#[error("Body was frozen, it may have been consumed by `take()`")]
pub struct BodyFrozen {
    _priv: (),
}

impl BodyFrozen {
    pub(crate) const fn new() -> Self {
        Self { _priv: () }
    }
}

/// Error type for body operations.
///
/// ```rust
/// use requests_kit::{Body, BodyError};
///
/// # async fn example() {
/// let mut body = Body::from_bytes("payload");
/// body.freeze();
/// match body.into_bytes().await {
///     Err(BodyError::BodyFrozen) => println!("body was already consumed"),
///     Err(e) => println!("other error: {e}"),
///     Ok(bytes) => println!("{} bytes", bytes.len()),
/// }
/// # }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading or writing body data.
    Io(std::io::Error),
    /// The body is not valid UTF-8.
    Utf8(Utf8Error),
    /// The body has been consumed and cannot provide data anymore.
    ///
    /// Distinct from an empty body: the data was taken with `take()` or
    /// dropped with `freeze()`.
    BodyFrozen,
    /// JSON serialization or deserialization failed.
    JsonError(serde_json::Error),
    /// Form data serialization failed.
    SerializeForm(serde_urlencoded::ser::Error),
    /// Form data deserialization failed.
    DeserializeForm(serde_urlencoded::de::Error),
    /// XML deserialization failed.
    #[cfg(feature = "xml")]
    XmlError(quick_xml::DeError),
    /// Errors raised by an underlying stream or `http_body::Body`.
    Other(BoxError),
}

macro_rules! impl_body_error {
    ($(($field:tt,$ty:ty $(,$feature:tt)?)),*) => {
        $(
            $(#[cfg(feature = $feature)])*
            impl From<$ty> for Error {
                fn from(error: $ty) -> Self {
                    Self::$field(error)
                }
            }
        )*

        impl Display for Error {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $(
                        $(#[cfg(feature = $feature)])*
                        Self::$field(error) => error.fmt(f),
                    )*
                    Self::BodyFrozen => BodyFrozen::new().fmt(f),
                }
            }
        }
    };
}

impl_body_error![
    (Io, std::io::Error),
    (Utf8, Utf8Error),
    (Other, BoxError),
    (JsonError, serde_json::Error),
    (SerializeForm, serde_urlencoded::ser::Error),
    (DeserializeForm, serde_urlencoded::de::Error),
    (XmlError, quick_xml::DeError, "xml")
];

impl CoreError for Error {
    fn source(&self) -> Option<&(dyn CoreError + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Utf8(error) => Some(error),
            Self::JsonError(error) => Some(error),
            Self::SerializeForm(error) => Some(error),
            Self::DeserializeForm(error) => Some(error),
            #[cfg(feature = "xml")]
            Self::XmlError(error) => Some(error),
            Self::Other(error) => Some(&**error),
            Self::BodyFrozen => None,
        }
    }
}

impl From<BodyFrozen> for Error {
    fn from(_error: BodyFrozen) -> Self {
        Self::BodyFrozen
    }
}

impl HttpError for Error {
    fn status(&self) -> StatusCode {
        match self {
            Self::Utf8(_) | Self::JsonError(_) | Self::DeserializeForm(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            #[cfg(feature = "xml")]
            Self::XmlError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SerializeForm(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) | Self::BodyFrozen | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
