//! Dynamically-typed tree data.
//!
//! [`Value`] is what decoded payloads look like before they are given a
//! concrete type: mappings, sequences and scalars nested to any depth. Numbers
//! keep the exact width they were produced with, so
//! [`find_as`](crate::lookup::find_as) can insist on a precise type.
//!
//! ```rust
//! use requests_kit::{Number, Value};
//!
//! let tree: Value = [
//!     ("name", Value::from("gizmo")),
//!     ("sizes", Value::from(vec![1u8, 2, 3])),
//! ]
//! .into_iter()
//! .collect();
//!
//! assert!(tree.as_dict().is_some());
//! assert_eq!(tree.as_dict().unwrap()["sizes"].as_list().unwrap()[0], Value::Number(Number::U8(1)));
//! ```
use std::collections::BTreeMap;

use crate::lookup::{FromValue, PathStep};

/// A mapping node.
pub type Dict = BTreeMap<String, Value>;

/// A sequence node.
pub type List = Vec<Value>;

/// A node of a dynamically-typed tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absence of a value. Cannot be descended into.
    #[default]
    Null,
    /// A boolean scalar.
    Bool(bool),
    /// A numeric scalar of a specific width.
    Number(Number),
    /// A string scalar.
    String(String),
    /// An ordered sequence.
    List(List),
    /// A mapping from string keys to values.
    Dict(Dict),
}

/// A numeric scalar that remembers its concrete type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum Number {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the mapping if this node is one.
    pub const fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Returns the sequence if this node is one.
    pub const fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Returns the string if this node is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// A short name for the node's shape, used in diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
        }
    }

    /// Looks up the node at `path`. See [`find`](crate::lookup::find).
    pub fn find(&self, path: &[PathStep]) -> Option<&Value> {
        crate::lookup::find(self, path)
    }

    /// Looks up the node at `path` and requires it to be exactly a `T`.
    /// See [`find_as`](crate::lookup::find_as).
    pub fn find_as<'a, T: FromValue<'a>>(&'a self, path: &[PathStep]) -> Option<T> {
        crate::lookup::find_as(self, path)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Number {
                fn from(n: $ty) -> Self {
                    Number::$variant(n)
                }
            }

            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(Number::$variant(n))
                }
            }
        )*
    };
}

impl_from_number! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Dict> for Value {
    fn from(dict: Dict) -> Self {
        Self::Dict(dict)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Dict(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// JSON integers become `I64` when they fit and `U64` otherwise; every other
/// number becomes `F64`.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Number(Number::I64(i))
                } else if let Some(u) = n.as_u64() {
                    Self::Number(Number::U64(u))
                } else {
                    n.as_f64().map_or(Self::Null, |f| Self::Number(Number::F64(f)))
                }
            }
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Json::Object(map) => Self::Dict(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}
