//! Path lookup into [`Value`] trees.
//!
//! A path is a sequence of [`PathStep`]s evaluated left to right. A key step
//! descends into a mapping, an index step into a sequence. Each step either
//! commits to exactly one child or the whole lookup fails; a step never falls
//! back to the other interpretation.
//!
//! ```rust
//! use requests_kit::{find, find_as, path, Value};
//! use serde_json::json;
//!
//! let tree = Value::from(json!(["abc", [123, 456, 789, {"def": 111}]]));
//!
//! assert_eq!(find_as::<i64>(&tree, &path![1, 3, "def"]), Some(111));
//! assert!(find(&tree, &path![1, 3]).unwrap().as_dict().is_some());
//! assert_eq!(find(&tree, &path![1, 4]), None);
//! ```
use crate::value::{Dict, List, Number, Value};

/// One step of a lookup path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Select a field of a mapping.
    Key(String),
    /// Select an element of a sequence. Negative indices never resolve.
    Index(i64),
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathStep {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<&String> for PathStep {
    fn from(key: &String) -> Self {
        Self::Key(key.clone())
    }
}

impl From<i32> for PathStep {
    fn from(index: i32) -> Self {
        Self::Index(index.into())
    }
}

impl From<i64> for PathStep {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<u32> for PathStep {
    fn from(index: u32) -> Self {
        Self::Index(index.into())
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        Self::Index(i64::try_from(index).unwrap_or(i64::MAX))
    }
}

/// Builds a path array from keys and indices.
///
/// ```rust
/// use requests_kit::{path, PathStep};
///
/// let steps = path!["images", 0, "url"];
/// assert_eq!(steps[1], PathStep::Index(0));
/// ```
#[macro_export]
macro_rules! path {
    ($($step:expr),* $(,)?) => {
        [$($crate::PathStep::from($step)),*]
    };
}

/// Descends `value` along `path`.
///
/// Returns the located node, or `None` as soon as a step does not apply: a key
/// step on anything but a mapping, a missing key, an index step on anything
/// but a sequence, or an index out of bounds. An empty path yields `value`
/// itself, even when it is [`Value::Null`]; a non-empty path on `Null` fails.
pub fn find<'a>(value: &'a Value, path: &[PathStep]) -> Option<&'a Value> {
    let Some((step, rest)) = path.split_first() else {
        return Some(value);
    };
    let child = match (step, value) {
        (PathStep::Key(key), Value::Dict(dict)) => dict.get(key.as_str())?,
        (PathStep::Index(index), Value::List(list)) => list.get(usize::try_from(*index).ok()?)?,
        _ => return None,
    };
    find(child, rest)
}

/// Descends `value` along `path` and extracts the located node as a `T`.
///
/// Succeeds only if the node's concrete type is exactly `T`. Numbers are not
/// coerced: an `i64` leaf does not satisfy `find_as::<i32>`.
///
/// ```rust
/// use requests_kit::{find_as, path, Value};
///
/// let tree: Value = [("port", Value::from(8080u16))].into_iter().collect();
/// assert_eq!(find_as::<u16>(&tree, &path!["port"]), Some(8080));
/// assert_eq!(find_as::<u32>(&tree, &path!["port"]), None);
/// assert_eq!(find_as::<&str>(&tree, &path!["port"]), None);
/// ```
pub fn find_as<'a, T: FromValue<'a>>(value: &'a Value, path: &[PathStep]) -> Option<T> {
    find(value, path).and_then(T::from_value)
}

/// Types that can be extracted from a [`Value`] node without conversion.
pub trait FromValue<'a>: Sized {
    /// Returns the node as `Self` if its concrete type matches exactly.
    fn from_value(value: &'a Value) -> Option<Self>;
}

macro_rules! impl_from_value_number {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue<'_> for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Number(Number::$variant(n)) => Some(*n),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_value_number! {
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

impl FromValue<'_> for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue<'_> for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl<'a> FromValue<'a> for &'a str {
    fn from_value(value: &'a Value) -> Option<Self> {
        value.as_str()
    }
}

impl<'a> FromValue<'a> for &'a Dict {
    fn from_value(value: &'a Value) -> Option<Self> {
        value.as_dict()
    }
}

impl<'a> FromValue<'a> for &'a List {
    fn from_value(value: &'a Value) -> Option<Self> {
        value.as_list()
    }
}
