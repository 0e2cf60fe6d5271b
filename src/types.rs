//! Conversions between [`Value`] and Rust types.
//!
//! Provider code reads attributes through [`FromValue`]. Plain Rust types such
//! as `String` reject null and unknown values; wrap them in [`AttrValue`] to
//! observe those states, or in `Option` to accept null.

use std::collections::BTreeMap;

use crate::path::{Path, PathStep};
use crate::value::{Value, ValueError};

/// A value that may be null or unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue<T> {
    /// The attribute is not set.
    Null,
    /// The value will only be known after apply.
    Unknown,
    /// A known value.
    Known(T),
}

/// A string attribute.
pub type StringValue = AttrValue<String>;
/// A 64-bit integer attribute.
pub type Int64Value = AttrValue<i64>;
/// A 64-bit float attribute.
pub type Float64Value = AttrValue<f64>;
/// A boolean attribute.
pub type BoolValue = AttrValue<bool>;

impl<T> Default for AttrValue<T> {
    fn default() -> Self {
        AttrValue::Null
    }
}

impl<T> AttrValue<T> {
    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, AttrValue::Unknown)
    }

    /// The known value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            AttrValue::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Consume and return the known value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            AttrValue::Known(v) => Some(v),
            _ => None,
        }
    }
}

impl StringValue {
    /// The known string, or `""` when null or unknown.
    pub fn value_string(&self) -> &str {
        self.value().map(String::as_str).unwrap_or_default()
    }
}

impl Int64Value {
    /// The known integer, or `0` when null or unknown.
    pub fn value_int64(&self) -> i64 {
        self.value().copied().unwrap_or_default()
    }
}

impl Float64Value {
    /// The known float, or `0.0` when null or unknown.
    pub fn value_float64(&self) -> f64 {
        self.value().copied().unwrap_or_default()
    }
}

impl BoolValue {
    /// The known boolean, or `false` when null or unknown.
    pub fn value_bool(&self) -> bool {
        self.value().copied().unwrap_or_default()
    }
}

impl<T> From<T> for AttrValue<T> {
    fn from(value: T) -> Self {
        AttrValue::Known(value)
    }
}

impl<T: Into<Value>> From<AttrValue<T>> for Value {
    fn from(value: AttrValue<T>) -> Self {
        match value {
            AttrValue::Null => Value::Null,
            AttrValue::Unknown => Value::Unknown,
            AttrValue::Known(v) => v.into(),
        }
    }
}

/// Types that can be read out of a [`Value`].
pub trait FromValue: Sized {
    /// Convert `value`, found at `path`, into `Self`.
    fn from_value(value: Value, path: &Path) -> Result<Self, ValueError>;
}

impl FromValue for Value {
    fn from_value(value: Value, _path: &Path) -> Result<Self, ValueError> {
        Ok(value)
    }
}

macro_rules! impl_primitive {
    ($ty:ty, $name:literal, $extract:expr) => {
        impl FromValue for $ty {
            fn from_value(value: Value, path: &Path) -> Result<Self, ValueError> {
                let extract: fn(&Value) -> Option<$ty> = $extract;
                match value {
                    Value::Null => Err(ValueError::Null { path: path.clone() }),
                    Value::Unknown => Err(ValueError::Unknown { path: path.clone() }),
                    other => extract(&other).ok_or_else(|| ValueError::TypeMismatch {
                        path: path.clone(),
                        expected: $name,
                        got: other.type_name(),
                    }),
                }
            }
        }

        impl FromValue for AttrValue<$ty> {
            fn from_value(value: Value, path: &Path) -> Result<Self, ValueError> {
                match value {
                    Value::Null => Ok(AttrValue::Null),
                    Value::Unknown => Ok(AttrValue::Unknown),
                    other => <$ty>::from_value(other, path).map(AttrValue::Known),
                }
            }
        }
    };
}

impl_primitive!(String, "string", |v| match v {
    Value::String(s) => Some(s.clone()),
    _ => None,
});
impl_primitive!(i64, "int64", |v| match v {
    Value::Number(n) => n.as_i64(),
    _ => None,
});
impl_primitive!(f64, "float64", |v| match v {
    Value::Number(n) => n.as_f64(),
    _ => None,
});
impl_primitive!(bool, "bool", |v| match v {
    Value::Bool(b) => Some(*b),
    _ => None,
});

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value, path: &Path) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, path).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value, path: &Path) -> Result<Self, ValueError> {
        match value {
            Value::List(items) | Value::Set(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| T::from_value(item, &path.with_step(PathStep::ElementKeyInt(i as i64))))
                .collect(),
            Value::Null => Err(ValueError::Null { path: path.clone() }),
            Value::Unknown => Err(ValueError::Unknown { path: path.clone() }),
            other => Err(ValueError::TypeMismatch {
                path: path.clone(),
                expected: "list",
                got: other.type_name(),
            }),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value, path: &Path) -> Result<Self, ValueError> {
        match value {
            Value::Map(entries) | Value::Object(entries) => entries
                .into_iter()
                .map(|(key, item)| {
                    let item_path = path.with_step(PathStep::ElementKeyString(key.clone()));
                    T::from_value(item, &item_path).map(|v| (key, v))
                })
                .collect(),
            Value::Null => Err(ValueError::Null { path: path.clone() }),
            Value::Unknown => Err(ValueError::Unknown { path: path.clone() }),
            other => Err(ValueError::TypeMismatch {
                path: path.clone(),
                expected: "map",
                got: other.type_name(),
            }),
        }
    }
}
