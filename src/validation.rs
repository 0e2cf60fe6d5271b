//! Schema validation of configuration values.
//!
//! Decoding already enforces types. Validation checks what the type system
//! cannot: required attributes, read-only attributes, deprecated attributes
//! and nested block counts.
//!
//! # Example
//!
//! ```
//! use tfplug_framework::schema::{Attribute, Schema};
//! use tfplug_framework::validation::validate;
//! use tfplug_framework::value::Value;
//! use tfplug_framework::path::Path;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("id", Attribute::computed_string());
//!
//! let config = Value::from_json(&schema.value_type(), &json!({"id": "set-by-user"})).unwrap();
//! let diagnostics = validate(&schema, &config);
//!
//! assert_eq!(diagnostics.len(), 2);
//! assert_eq!(diagnostics.errors()[0].attribute, Some(Path::root("id")));
//! ```

use crate::diag::Diagnostics;
use crate::path::{Path, PathStep};
use crate::schema::{Attribute, Block, BlockNestingMode, NestedBlock, Schema};
use crate::value::Value;

/// Validate a configuration value against a schema.
///
/// # Validation Rules
///
/// - Required attributes must not be null
/// - Computed-only attributes must be null
/// - Setting a deprecated attribute produces a warning
/// - Nested blocks must respect their min/max item counts
///
/// An unknown value counts as set: it satisfies a required attribute and is
/// rejected for a computed-only one. Unknown nested block collections skip
/// the item count checks.
pub fn validate(schema: &Schema, value: &Value) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    validate_block(&schema.block, value, &Path::empty(), &mut diagnostics);
    diagnostics
}

/// Like [`validate`], returning `Err` if any diagnostic is an error.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<Diagnostics, Diagnostics> {
    let diagnostics = validate(schema, value);
    if diagnostics.has_error() {
        Err(diagnostics)
    } else {
        Ok(diagnostics)
    }
}

/// Check if a value passes validation without errors.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    !validate(schema, value).has_error()
}

fn validate_block(block: &Block, value: &Value, path: &Path, diagnostics: &mut Diagnostics) {
    if !matches!(value, Value::Object(_)) {
        return;
    }

    for (name, attr) in &block.attributes {
        let attr_path = path.with_step(PathStep::AttributeName(name.clone()));
        validate_attribute(attr, value.attribute(name), attr_path, diagnostics);
    }

    for (name, nested) in &block.blocks {
        let block_path = path.with_step(PathStep::AttributeName(name.clone()));
        validate_nested_block(nested, value.attribute(name), &block_path, diagnostics);
    }
}

fn validate_attribute(attr: &Attribute, value: &Value, path: Path, diagnostics: &mut Diagnostics) {
    if value.is_null() {
        if attr.flags.required {
            diagnostics.add_attribute_error(
                path.clone(),
                "Missing Configuration for Required Attribute",
                format!("Must set a configuration value for the {} attribute as the provider has marked it as required.", path),
            );
        }
        return;
    }

    if attr.flags.is_computed_only() {
        diagnostics.add_attribute_error(
            path.clone(),
            "Invalid Configuration for Read-Only Attribute",
            format!("Cannot set value for the {} attribute as the provider has marked it as read-only. Remove the configuration line setting the value.", path),
        );
        return;
    }

    if let Some(message) = &attr.deprecation_message {
        diagnostics.add_attribute_warning(path, "Attribute Deprecated", message.clone());
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: &Value,
    path: &Path,
    diagnostics: &mut Diagnostics,
) {
    match (nested.nesting_mode, value) {
        (_, Value::Unknown) => {}
        (BlockNestingMode::Single, Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.add_attribute_error(
                    path.clone(),
                    "Missing Configuration for Required Block",
                    format!("Must have a configuration value for the {} block.", path),
                );
            }
        }
        (BlockNestingMode::Single, v) => validate_block(&nested.block, v, path, diagnostics),
        (_, Value::Null) => check_item_count(nested, 0, path, diagnostics),
        (_, Value::List(items)) | (_, Value::Set(items)) => {
            check_item_count(nested, items.len(), path, diagnostics);
            for (i, item) in items.iter().enumerate() {
                let item_path = path.with_step(PathStep::ElementKeyInt(i as i64));
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        }
        (_, Value::Map(entries)) => {
            check_item_count(nested, entries.len(), path, diagnostics);
            for (key, item) in entries {
                let item_path = path.with_step(PathStep::ElementKeyString(key.clone()));
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        }
        _ => {}
    }
}

fn check_item_count(nested: &NestedBlock, len: usize, path: &Path, diagnostics: &mut Diagnostics) {
    let len = len as u64;

    if len < u64::from(nested.min_items) {
        diagnostics.add_attribute_error(
            path.clone(),
            "Invalid Block",
            format!(
                "Block {} must have a configuration value as the provider has marked it as required. \
                 At least {} item(s) are required, got {}.",
                path, nested.min_items, len
            ),
        );
    }

    // max_items of 0 means unlimited
    if nested.max_items > 0 && len > u64::from(nested.max_items) {
        diagnostics.add_attribute_error(
            path.clone(),
            "Invalid Block",
            format!(
                "Block {} allows at most {} item(s), got {}.",
                path, nested.max_items, len
            ),
        );
    }
}
