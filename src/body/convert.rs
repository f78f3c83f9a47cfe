use bytes::Bytes;
use bytestr::ByteStr;
use core::pin::Pin;
use futures_lite::AsyncBufRead;
use std::borrow::Cow;

use super::{Body, BodyInner};

macro_rules! from_bytes {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Body {
                fn from(data: $ty) -> Self {
                    Body::from_bytes(data)
                }
            }
        )*
    };
}
from_bytes!(Bytes, Vec<u8>, Box<[u8]>);

macro_rules! from_text {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Body {
                fn from(data: $ty) -> Self {
                    Body::from_text(data)
                }
            }
        )*
    };
}
from_text!(ByteStr, String, Box<str>);

impl From<Cow<'_, [u8]>> for Body {
    fn from(data: Cow<'_, [u8]>) -> Self {
        Body::from_bytes(data.into_owned())
    }
}

impl From<&[u8]> for Body {
    fn from(data: &[u8]) -> Self {
        Body::from_bytes(data.to_vec())
    }
}

impl From<Cow<'_, str>> for Body {
    fn from(data: Cow<'_, str>) -> Self {
        Body::from_text(data.into_owned())
    }
}

impl From<&str> for Body {
    fn from(data: &str) -> Self {
        Body::from_text(data.to_owned())
    }
}

impl From<Pin<Box<dyn AsyncBufRead + Send + Sync + 'static>>> for Body {
    fn from(reader: Pin<Box<dyn AsyncBufRead + Send + Sync + 'static>>) -> Self {
        Self {
            mime: None,
            inner: BodyInner::Reader {
                reader,
                length: None,
            },
        }
    }
}
