//! Typed values exchanged with the host.
//!
//! Values arrive as JSON inside a [`proto::DynamicValue`] and are decoded against
//! the [`AttributeType`] derived from a schema. Decoding is type-directed: the same
//! JSON number is accepted for a `float64` attribute and rejected for an `int64`
//! attribute if it has a fractional part.
//!
//! Besides ordinary data a value may be null or unknown. Unknown values appear
//! during planning when the configuration references something that is not yet
//! known; on the wire they are encoded as [`UNKNOWN_VALUE`].

use std::collections::BTreeMap;

use serde_json::Value as Json;
use thiserror::Error;

use crate::path::{Path, PathStep};
use crate::proto;
use crate::schema::AttributeType;

/// Wire representation of an unknown value inside JSON.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A value that has been decoded against a type.
///
/// Sets compare equal when they hold the same elements in any order.
#[derive(Debug, Clone, Eq, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// A value that will only be known after apply.
    Unknown,
    /// A boolean.
    Bool(bool),
    /// A number, integral for `int64` attributes.
    Number(serde_json::Number),
    /// A string.
    String(String),
    /// An ordered list.
    List(Vec<Value>),
    /// A set of distinct elements.
    Set(Vec<Value>),
    /// A map with string keys.
    Map(BTreeMap<String, Value>),
    /// An object with a fixed set of attributes.
    Object(BTreeMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Unknown, Value::Unknown) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Set elements are distinct, so matching lengths plus containment
            // in one direction is enough.
            (Value::Set(a), Value::Set(b)) => a.len() == b.len() && a.iter().all(|v| b.contains(v)),
            (Value::Map(a), Value::Map(b)) | (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// Errors produced while decoding or navigating values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The JSON did not match the expected type.
    #[error("{}: expected {expected}, got {got}", describe(.path))]
    TypeMismatch {
        /// Where the mismatch happened.
        path: Path,
        /// The expected type name.
        expected: &'static str,
        /// The type name found instead.
        got: &'static str,
    },

    /// An object carried an attribute its type does not define.
    #[error("{}: unsupported attribute \"{name}\"", describe(.path))]
    UnsupportedAttribute {
        /// The object holding the attribute.
        path: Path,
        /// The unexpected attribute name.
        name: String,
    },

    /// A set held the same element twice.
    #[error("{}: duplicate set element", describe(.path))]
    DuplicateSetElement {
        /// The duplicated element.
        path: Path,
    },

    /// A null value was read where a value is required.
    #[error("{}: value is null", describe(.path))]
    Null {
        /// The null value.
        path: Path,
    },

    /// An unknown value was read where a known value is required.
    #[error("{}: value is unknown", describe(.path))]
    Unknown {
        /// The unknown value.
        path: Path,
    },

    /// A path step did not match the shape of the value.
    #[error("{}: no such attribute or element", describe(.path))]
    InvalidPath {
        /// The path that could not be followed.
        path: Path,
    },

    /// The payload used an encoding the framework does not read.
    #[error("msgpack-encoded values are not supported, the host must send JSON")]
    UnsupportedEncoding,

    /// The payload was not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(String),
}

impl ValueError {
    /// The path the error relates to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::TypeMismatch { path, .. }
            | Self::UnsupportedAttribute { path, .. }
            | Self::DuplicateSetElement { path }
            | Self::Null { path }
            | Self::Unknown { path }
            | Self::InvalidPath { path } => Some(path),
            Self::UnsupportedEncoding | Self::Json(_) => None,
        }
    }
}

fn describe(path: &Path) -> String {
    if path.is_empty() {
        "value".to_string()
    } else {
        format!("attribute \"{}\"", path)
    }
}

#[derive(Clone, Copy)]
struct DecodeOptions {
    ignore_undefined: bool,
}

impl Value {
    /// Decode JSON against a type.
    ///
    /// Missing object attributes decode to null; attributes the type does not
    /// define are rejected.
    pub fn from_json(ty: &AttributeType, json: &Json) -> Result<Value, ValueError> {
        decode(
            ty,
            json,
            &Path::empty(),
            DecodeOptions {
                ignore_undefined: false,
            },
        )
    }

    /// Decode JSON against a type, dropping object attributes the type does
    /// not define.
    ///
    /// Used for previously stored state, which may still carry attributes that
    /// were removed from the schema without a version bump.
    pub fn from_json_ignoring_undefined(ty: &AttributeType, json: &Json) -> Result<Value, ValueError> {
        decode(
            ty,
            json,
            &Path::empty(),
            DecodeOptions {
                ignore_undefined: true,
            },
        )
    }

    /// Encode as JSON, writing unknown values as [`UNKNOWN_VALUE`].
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Unknown => Json::String(UNKNOWN_VALUE.to_string()),
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) | Value::Set(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) | Value::Object(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value itself is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Whether neither the value nor anything nested in it is unknown.
    pub fn is_fully_known(&self) -> bool {
        match self {
            Value::Unknown => false,
            Value::List(items) | Value::Set(items) => items.iter().all(Value::is_fully_known),
            Value::Map(entries) | Value::Object(entries) => {
                entries.values().all(Value::is_fully_known)
            }
            _ => true,
        }
    }

    /// Paths of every unknown value nested in this one.
    pub fn unknown_paths(&self) -> Vec<Path> {
        let mut paths = Vec::new();
        collect_unknown(self, &Path::empty(), &mut paths);
        paths
    }

    /// Name of the value's kind, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unknown => "unknown",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    /// Look up an object attribute, treating anything else as null.
    pub fn attribute(&self, name: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        match self {
            Value::Object(attrs) => attrs.get(name).unwrap_or(NULL),
            _ => NULL,
        }
    }

    /// Read the value at `path`.
    ///
    /// Null and unknown parents yield null and unknown respectively. Missing
    /// map keys and out-of-range list indexes yield null.
    pub fn get_at_path(&self, path: &Path) -> Result<Value, ValueError> {
        let mut current = self;

        for step in path.steps() {
            current = match (current, step) {
                (Value::Null, _) => return Ok(Value::Null),
                (Value::Unknown, _) => return Ok(Value::Unknown),
                (Value::Object(attrs), PathStep::AttributeName(name)) => attrs
                    .get(name)
                    .ok_or_else(|| ValueError::InvalidPath { path: path.clone() })?,
                (Value::Map(entries), PathStep::ElementKeyString(key)) => match entries.get(key) {
                    Some(value) => value,
                    None => return Ok(Value::Null),
                },
                (Value::List(items), PathStep::ElementKeyInt(index))
                | (Value::Set(items), PathStep::ElementKeyInt(index)) => {
                    match usize::try_from(*index).ok().and_then(|i| items.get(i)) {
                        Some(value) => value,
                        None => return Ok(Value::Null),
                    }
                }
                _ => return Err(ValueError::InvalidPath { path: path.clone() }),
            };
        }

        Ok(current.clone())
    }

    /// Replace the value at `path`, creating null intermediate objects, maps
    /// and lists as needed.
    ///
    /// A list index may address an existing element or the position just past
    /// the end.
    pub fn set_at_path(&mut self, path: &Path, value: Value) -> Result<(), ValueError> {
        let mut current = self;
        for step in path.steps() {
            current = child_mut(current, step, path)?;
        }
        *current = value;
        Ok(())
    }
}

fn child_mut<'a>(
    value: &'a mut Value,
    step: &PathStep,
    path: &Path,
) -> Result<&'a mut Value, ValueError> {
    if value.is_null() {
        *value = match step {
            PathStep::AttributeName(_) => Value::Object(BTreeMap::new()),
            PathStep::ElementKeyString(_) => Value::Map(BTreeMap::new()),
            PathStep::ElementKeyInt(_) => Value::List(Vec::new()),
        };
    }

    match (value, step) {
        (Value::Object(attrs), PathStep::AttributeName(name)) => {
            Ok(attrs.entry(name.clone()).or_insert(Value::Null))
        }
        (Value::Map(entries), PathStep::ElementKeyString(key)) => {
            Ok(entries.entry(key.clone()).or_insert(Value::Null))
        }
        (Value::List(items), PathStep::ElementKeyInt(index))
        | (Value::Set(items), PathStep::ElementKeyInt(index)) => {
            let index = usize::try_from(*index)
                .ok()
                .filter(|i| *i <= items.len())
                .ok_or_else(|| ValueError::InvalidPath { path: path.clone() })?;
            if index == items.len() {
                items.push(Value::Null);
            }
            Ok(&mut items[index])
        }
        _ => Err(ValueError::InvalidPath { path: path.clone() }),
    }
}

fn collect_unknown(value: &Value, path: &Path, out: &mut Vec<Path>) {
    match value {
        Value::Unknown => out.push(path.clone()),
        Value::List(items) | Value::Set(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_unknown(item, &path.with_step(PathStep::ElementKeyInt(i as i64)), out);
            }
        }
        Value::Map(entries) => {
            for (key, item) in entries {
                collect_unknown(
                    item,
                    &path.with_step(PathStep::ElementKeyString(key.clone())),
                    out,
                );
            }
        }
        Value::Object(attrs) => {
            for (name, item) in attrs {
                collect_unknown(
                    item,
                    &path.with_step(PathStep::AttributeName(name.clone())),
                    out,
                );
            }
        }
        _ => {}
    }
}

fn json_type_name(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn as_int64(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    // i64::MAX as f64 rounds up to 2^63, which does not fit.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn decode(
    ty: &AttributeType,
    json: &Json,
    path: &Path,
    options: DecodeOptions,
) -> Result<Value, ValueError> {
    if let Json::String(s) = json {
        if s == UNKNOWN_VALUE {
            return Ok(Value::Unknown);
        }
    }
    if json.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = || ValueError::TypeMismatch {
        path: path.clone(),
        expected: ty.name(),
        got: json_type_name(json),
    };

    match ty {
        AttributeType::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        AttributeType::Int64 => match json {
            Json::Number(n) => as_int64(n)
                .map(|i| Value::Number(i.into()))
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        AttributeType::Float64 => match json {
            Json::Number(n) => Ok(Value::Number(n.clone())),
            _ => Err(mismatch()),
        },
        AttributeType::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
        AttributeType::List(elem) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            decode_elements(elem, items, path, options).map(Value::List)
        }
        AttributeType::Set(elem) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            let elements = decode_elements(elem, items, path, options)?;
            for (i, element) in elements.iter().enumerate() {
                if element.is_fully_known() && elements[..i].contains(element) {
                    return Err(ValueError::DuplicateSetElement {
                        path: path.with_step(PathStep::ElementKeyInt(i as i64)),
                    });
                }
            }
            Ok(Value::Set(elements))
        }
        AttributeType::Map(elem) => {
            let entries = json.as_object().ok_or_else(mismatch)?;
            entries
                .iter()
                .map(|(key, item)| {
                    let item_path = path.with_step(PathStep::ElementKeyString(key.clone()));
                    decode(elem, item, &item_path, options).map(|v| (key.clone(), v))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Map)
        }
        AttributeType::Object(attrs) => {
            let entries = json.as_object().ok_or_else(mismatch)?;
            if !options.ignore_undefined {
                if let Some(name) = entries.keys().find(|k| !attrs.contains_key(*k)) {
                    return Err(ValueError::UnsupportedAttribute {
                        path: path.clone(),
                        name: name.clone(),
                    });
                }
            }
            attrs
                .iter()
                .map(|(name, attr_type)| {
                    let attr_path = path.with_step(PathStep::AttributeName(name.clone()));
                    let item = entries.get(name).unwrap_or(&Json::Null);
                    decode(attr_type, item, &attr_path, options).map(|v| (name.clone(), v))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Object)
        }
        AttributeType::Dynamic => Ok(decode_untyped(json)),
    }
}

fn decode_elements(
    elem: &AttributeType,
    items: &[Json],
    path: &Path,
    options: DecodeOptions,
) -> Result<Vec<Value>, ValueError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let item_path = path.with_step(PathStep::ElementKeyInt(i as i64));
            decode(elem, item, &item_path, options)
        })
        .collect()
}

fn decode_untyped(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.clone()),
        Json::String(s) if s == UNKNOWN_VALUE => Value::Unknown,
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(decode_untyped).collect()),
        Json::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), decode_untyped(v)))
                .collect(),
        ),
    }
}

/// Decode a wire value against a type.
///
/// An empty payload decodes to null.
pub fn decode_dynamic_value(
    dynamic_value: &proto::DynamicValue,
    ty: &AttributeType,
) -> Result<Value, ValueError> {
    if !dynamic_value.json.is_empty() {
        let json: Json = serde_json::from_slice(&dynamic_value.json)
            .map_err(|e| ValueError::Json(e.to_string()))?;
        return Value::from_json(ty, &json);
    }
    if !dynamic_value.msgpack.is_empty() {
        return Err(ValueError::UnsupportedEncoding);
    }
    Ok(Value::Null)
}

/// Encode a value for the wire.
pub fn encode_dynamic_value(value: &Value) -> Result<proto::DynamicValue, ValueError> {
    let json = serde_json::to_vec(&value.to_json()).map_err(|e| ValueError::Json(e.to_string()))?;
    Ok(proto::DynamicValue {
        msgpack: Vec::new(),
        json,
    })
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(i.into())
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Number(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_type() -> AttributeType {
        AttributeType::object([
            ("name", AttributeType::String),
            ("count", AttributeType::Int64),
            ("tags", AttributeType::map(AttributeType::String)),
            ("zones", AttributeType::set(AttributeType::String)),
        ])
    }

    #[test]
    fn test_decode_object() {
        let value = Value::from_json(
            &config_type(),
            &json!({"name": "web", "count": 3, "tags": {"env": "prod"}}),
        )
        .unwrap();

        assert_eq!(value.attribute("name"), &Value::String("web".to_string()));
        assert_eq!(value.attribute("count"), &Value::from(3));
        assert!(value.attribute("zones").is_null());
    }

    #[test]
    fn test_decode_unsupported_attribute() {
        let err = Value::from_json(&config_type(), &json!({"nmae": "typo"})).unwrap_err();
        assert!(matches!(err, ValueError::UnsupportedAttribute { ref name, .. } if name == "nmae"));

        let value =
            Value::from_json_ignoring_undefined(&config_type(), &json!({"nmae": "typo"})).unwrap();
        assert!(value.attribute("name").is_null());
    }

    #[test]
    fn test_decode_int64() {
        let ty = AttributeType::Int64;
        assert_eq!(Value::from_json(&ty, &json!(42.0)).unwrap(), Value::from(42));
        assert!(Value::from_json(&ty, &json!(42.5)).is_err());

        let err = Value::from_json(&ty, &json!("42")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "value: expected int64, got string"
        );
    }

    #[test]
    fn test_decode_int64_range() {
        let ty = AttributeType::Int64;
        assert_eq!(
            Value::from_json(&ty, &json!(i64::MAX)).unwrap(),
            Value::from(i64::MAX)
        );
        assert_eq!(
            Value::from_json(&ty, &json!(i64::MIN)).unwrap(),
            Value::from(i64::MIN)
        );

        assert!(Value::from_json(&ty, &json!(9_223_372_036_854_775_808u64)).is_err());
        assert!(Value::from_json(&ty, &json!(u64::MAX)).is_err());
        assert!(Value::from_json(&ty, &json!(9.223_372_036_854_775_808e18)).is_err());
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let ty = AttributeType::set(AttributeType::String);
        let ab = Value::from_json(&ty, &json!(["a", "b"])).unwrap();
        let ba = Value::from_json(&ty, &json!(["b", "a"])).unwrap();
        let ac = Value::from_json(&ty, &json!(["a", "c"])).unwrap();
        let a = Value::from_json(&ty, &json!(["a"])).unwrap();

        assert_eq!(ab, ba);
        assert_ne!(ab, ac);
        assert_ne!(ab, a);

        let list = AttributeType::list(AttributeType::String);
        assert_ne!(
            Value::from_json(&list, &json!(["a", "b"])).unwrap(),
            Value::from_json(&list, &json!(["b", "a"])).unwrap()
        );
    }

    #[test]
    fn test_decode_error_carries_path() {
        let err = Value::from_json(&config_type(), &json!({"tags": {"env": 1}})).unwrap_err();
        assert_eq!(err.path(), Some(&Path::root("tags").at_map_key("env")));
        assert_eq!(
            err.to_string(),
            "attribute \"tags[\"env\"]\": expected string, got number"
        );
    }

    #[test]
    fn test_decode_set_rejects_duplicates() {
        let ty = AttributeType::set(AttributeType::String);
        assert!(Value::from_json(&ty, &json!(["a", "b"])).is_ok());

        let err = Value::from_json(&ty, &json!(["a", "b", "a"])).unwrap_err();
        assert_eq!(
            err,
            ValueError::DuplicateSetElement {
                path: Path::empty().at_list_index(2)
            }
        );
    }

    #[test]
    fn test_unknown_round_trip() {
        let value = Value::from_json(&config_type(), &json!({"name": UNKNOWN_VALUE})).unwrap();
        assert!(value.attribute("name").is_unknown());
        assert!(!value.is_fully_known());
        assert_eq!(value.unknown_paths(), vec![Path::root("name")]);
        assert_eq!(value.to_json()["name"], json!(UNKNOWN_VALUE));
    }

    #[test]
    fn test_get_at_path() {
        let value = Value::from_json(
            &AttributeType::object([(
                "rules",
                AttributeType::list(AttributeType::object([("port", AttributeType::Int64)])),
            )]),
            &json!({"rules": [{"port": 80}, {"port": 443}]}),
        )
        .unwrap();

        let port = value
            .get_at_path(&Path::root("rules").at_list_index(1).at_name("port"))
            .unwrap();
        assert_eq!(port, Value::from(443));

        let missing = value
            .get_at_path(&Path::root("rules").at_list_index(5).at_name("port"))
            .unwrap();
        assert!(missing.is_null());

        assert!(value.get_at_path(&Path::root("rulez")).is_err());
    }

    #[test]
    fn test_get_through_null_and_unknown() {
        let value = Value::Object(BTreeMap::from([
            ("a".to_string(), Value::Null),
            ("b".to_string(), Value::Unknown),
        ]));
        assert!(value.get_at_path(&Path::root("a").at_name("x")).unwrap().is_null());
        assert!(value.get_at_path(&Path::root("b").at_name("x")).unwrap().is_unknown());
    }

    #[test]
    fn test_set_at_path_creates_parents() {
        let mut value = Value::Null;
        value
            .set_at_path(&Path::root("endpoint").at_name("port"), Value::from(8080))
            .unwrap();
        value
            .set_at_path(&Path::root("tags").at_map_key("env"), Value::from("dev"))
            .unwrap();

        assert_eq!(
            value.to_json(),
            json!({"endpoint": {"port": 8080}, "tags": {"env": "dev"}})
        );
    }

    #[test]
    fn test_set_at_path_list_bounds() {
        let mut value = Value::List(vec![Value::from("a")]);
        value
            .set_at_path(&Path::empty().at_list_index(1), Value::from("b"))
            .unwrap();
        assert_eq!(value.to_json(), json!(["a", "b"]));

        assert!(value
            .set_at_path(&Path::empty().at_list_index(5), Value::from("z"))
            .is_err());
    }

    #[test]
    fn test_dynamic_value_codec() {
        let ty = config_type();
        let wire = proto::DynamicValue {
            msgpack: Vec::new(),
            json: br#"{"name":"web"}"#.to_vec(),
        };
        let value = decode_dynamic_value(&wire, &ty).unwrap();
        assert_eq!(value.attribute("name"), &Value::from("web"));

        let encoded = encode_dynamic_value(&value).unwrap();
        let json: Json = serde_json::from_slice(&encoded.json).unwrap();
        assert_eq!(json["name"], json!("web"));
        assert_eq!(json["count"], Json::Null);

        assert!(decode_dynamic_value(&proto::DynamicValue::default(), &ty)
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_msgpack_rejected() {
        let wire = proto::DynamicValue {
            msgpack: vec![0x80],
            json: Vec::new(),
        };
        assert_eq!(
            decode_dynamic_value(&wire, &config_type()),
            Err(ValueError::UnsupportedEncoding)
        );
    }
}
