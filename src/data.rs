//! Schema-bound data handed to provider callbacks.
//!
//! [`Config`], [`State`] and [`Plan`] pair a decoded [`Value`] with the
//! [`Schema`] it was decoded against. Reads go through [`FromValue`] and report
//! failures as diagnostics so callbacks can append them to their response.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::diag::{Diagnostic, Diagnostics};
use crate::path::{Path, PathStep};
use crate::schema::Schema;
use crate::types::FromValue;
use crate::value::{Value, ValueError};

fn conversion_error(path: &Path, err: &ValueError) -> Diagnostic {
    let detail = format!(
        "An unexpected error was encountered converting the value at \"{}\". \
         This is always a bug in the provider.\n\n{}",
        path, err
    );
    if path.is_empty() {
        Diagnostic::error("Value Conversion Error", detail)
    } else {
        Diagnostic::attribute_error(path.clone(), "Value Conversion Error", detail)
    }
}

fn read_attribute<T: FromValue>(raw: &Value, path: &Path) -> Result<T, Diagnostics> {
    raw.get_at_path(path)
        .and_then(|value| T::from_value(value, path))
        .map_err(|err| conversion_error(path, &err).into())
}

fn read_all<T: DeserializeOwned>(raw: &Value) -> Result<T, Diagnostics> {
    if let Some(path) = raw.unknown_paths().into_iter().next() {
        let err = ValueError::Unknown { path: path.clone() };
        return Err(conversion_error(&path, &err).into());
    }
    serde_json::from_value(raw.to_json()).map_err(|err| {
        Diagnostic::error(
            "Value Conversion Error",
            format!("Unable to deserialize the object: {}", err),
        )
        .into()
    })
}

fn write_attribute(schema: &Schema, raw: &mut Value, path: &Path, value: Value) -> Diagnostics {
    let targets_attribute = matches!(path.steps().last(), Some(PathStep::AttributeName(_)));

    let value = match schema.attribute_at_path(path) {
        Some(attr) if targets_attribute => {
            match Value::from_json(&attr.attr_type, &value.to_json()) {
                Ok(checked) => checked,
                Err(err) => return conversion_error(path, &err).into(),
            }
        }
        _ => value,
    };

    match raw.set_at_path(path, value) {
        Ok(()) => Diagnostics::new(),
        Err(err) => conversion_error(path, &err).into(),
    }
}

fn write_all<T: Serialize>(schema: &Schema, raw: &mut Value, value: &T) -> Diagnostics {
    let json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(err) => {
            return Diagnostic::error(
                "Value Conversion Error",
                format!("Unable to serialize the object: {}", err),
            )
            .into()
        }
    };
    match Value::from_json(&schema.value_type(), &json) {
        Ok(decoded) => {
            *raw = decoded;
            Diagnostics::new()
        }
        Err(err) => conversion_error(&Path::empty(), &err).into(),
    }
}

macro_rules! schema_data {
    ($name:ident) => {
        impl $name {
            /// Pair a value with its schema.
            pub fn new(schema: Schema, raw: Value) -> Self {
                Self { raw, schema }
            }

            /// A null value for the schema.
            pub fn null(schema: Schema) -> Self {
                Self::new(schema, Value::Null)
            }

            /// Whether the whole value is null.
            pub fn is_null(&self) -> bool {
                self.raw.is_null()
            }

            /// Read the attribute at `path`.
            pub fn get_attribute<T: FromValue>(&self, path: &Path) -> Result<T, Diagnostics> {
                read_attribute(&self.raw, path)
            }

            /// Deserialize the whole value. Fails if anything is unknown.
            pub fn get<T: DeserializeOwned>(&self) -> Result<T, Diagnostics> {
                read_all(&self.raw)
            }
        }
    };
}

macro_rules! writable_data {
    ($name:ident) => {
        impl $name {
            /// Replace the attribute at `path`.
            ///
            /// The value is checked against the attribute's type when the
            /// path names an attribute.
            pub fn set_attribute(&mut self, path: &Path, value: impl Into<Value>) -> Diagnostics {
                write_attribute(&self.schema, &mut self.raw, path, value.into())
            }

            /// Replace the whole value with a serialized struct.
            pub fn set<T: Serialize>(&mut self, value: &T) -> Diagnostics {
                write_all(&self.schema, &mut self.raw, value)
            }
        }
    };
}

/// Configuration written by the practitioner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// The decoded configuration.
    pub raw: Value,
    /// The schema it was decoded against.
    pub schema: Schema,
}

/// State recorded for a resource or data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    /// The decoded state.
    pub raw: Value,
    /// The schema it was decoded against.
    pub schema: Schema,
}

/// The planned new state of a resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// The decoded plan.
    pub raw: Value,
    /// The schema it was decoded against.
    pub schema: Schema,
}

schema_data!(Config);
schema_data!(State);
schema_data!(Plan);
writable_data!(State);
writable_data!(Plan);

impl State {
    /// Mark the resource as gone.
    pub fn remove_resource(&mut self) {
        self.raw = Value::Null;
    }
}
