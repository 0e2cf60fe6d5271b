//! Schemas for providers, resources and data sources.
//!
//! A [`Schema`] drives value decoding, validation and plan handling, and is
//! reported to the host in the `GetProviderSchema` response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::path::{Path, PathStep};
use crate::proto;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Whole number. Reported to the host as `number`.
    Int64,
    /// Any number.
    Float64,
    /// `true` or `false`.
    Bool,
    /// Ordered elements.
    List(Box<AttributeType>),
    /// Unordered, duplicate-free elements.
    Set(Box<AttributeType>),
    /// String-keyed elements.
    Map(Box<AttributeType>),
    /// Named attributes, each with its own type.
    Object(BTreeMap<String, AttributeType>),
    /// Whatever the host sends. Decoded without a type.
    Dynamic,
}

impl AttributeType {
    /// `list(element_type)`.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// `set(element_type)`.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// `map(element_type)`.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// `object({...})` from name/type pairs.
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeType)>,
        K: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// Human-readable type name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Dynamic => "dynamic",
        }
    }

    /// The JSON type constraint the host expects in schema responses.
    ///
    /// Both numeric types are reported as `"number"`; the integer constraint is
    /// enforced by the framework when values are decoded.
    pub fn to_type_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            Self::String => json!("string"),
            Self::Int64 | Self::Float64 => json!("number"),
            Self::Bool => json!("bool"),
            Self::List(elem) => json!(["list", elem.to_type_json()]),
            Self::Set(elem) => json!(["set", elem.to_type_json()]),
            Self::Map(elem) => json!(["map", elem.to_type_json()]),
            Self::Object(attrs) => {
                let attrs: serde_json::Map<String, serde_json::Value> = attrs
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_type_json()))
                    .collect();
                json!(["object", attrs])
            }
            Self::Dynamic => json!("dynamic"),
        }
    }
}

/// Who may set an attribute.
///
/// `computed` alone means only the provider sets it; `optional` together with
/// `computed` means configuration may set it and the provider fills it in
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Configuration must set it.
    pub required: bool,
    /// Configuration may set it.
    pub optional: bool,
    /// The provider may set it.
    pub computed: bool,
    /// The host redacts it in output.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Only `required`.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Only `optional`.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Only `computed`.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// `optional` and `computed`.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Whether the attribute is set only by the provider.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// An attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Who may set the attribute.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A planned change to this attribute replaces the resource.
    #[serde(default)]
    pub requires_replace: bool,
    /// Value planned when the configuration leaves the attribute unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Warning shown to practitioners who still set the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
}

macro_rules! attribute_constructors {
    ($($name:ident => $ty:ident, $flags:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($ty), "` attribute with `AttributeFlags::", stringify!($flags), "()`.")]
            pub fn $name() -> Self {
                Self::new(AttributeType::$ty, AttributeFlags::$flags())
            }
        )*
    };
}

impl Attribute {
    /// An attribute with no description, default or replacement behaviour.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            requires_replace: false,
            default: None,
            deprecation_message: None,
        }
    }

    attribute_constructors! {
        required_string => String, required;
        optional_string => String, optional;
        computed_string => String, computed;
        required_int64 => Int64, required;
        optional_int64 => Int64, optional;
        computed_int64 => Int64, computed;
        required_bool => Bool, required;
        optional_bool => Bool, optional;
        computed_bool => Bool, computed;
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the resource when this attribute changes.
    pub fn with_requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    /// Planned value when configuration leaves the attribute null.
    ///
    /// Only meaningful for attributes that are optional and computed.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Warn when configuration sets this attribute.
    pub fn with_deprecation_message(mut self, message: impl Into<String>) -> Self {
        self.deprecation_message = Some(message.into());
        self
    }

    /// Redact the value in host output.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How a nested block repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// Zero or one block, decoded as an object.
    #[default]
    Single,
    /// Decoded as a list of objects.
    List,
    /// Decoded as a set of objects.
    Set,
    /// Decoded as a map of objects.
    Map,
}

/// Attributes and nested blocks at one level of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add or replace a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The object type values of this block decode into.
    pub fn value_type(&self) -> AttributeType {
        let mut attrs: BTreeMap<String, AttributeType> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.attr_type.clone()))
            .collect();

        for (name, nested) in &self.blocks {
            let object = nested.block.value_type();
            let ty = match nested.nesting_mode {
                BlockNestingMode::Single => object,
                BlockNestingMode::List => AttributeType::list(object),
                BlockNestingMode::Set => AttributeType::set(object),
                BlockNestingMode::Map => AttributeType::map(object),
            };
            attrs.insert(name.clone(), ty);
        }

        AttributeType::Object(attrs)
    }

    fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.blocks.is_empty()
    }
}

/// A block nested under a name, with its repetition rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Contents of each occurrence.
    #[serde(flatten)]
    pub block: Block,
    /// How occurrences are collected.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest occurrences configuration may have.
    #[serde(default)]
    pub min_items: u32,
    /// Most occurrences configuration may have. 0 is unlimited.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    /// At most one occurrence.
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    /// Occurrences collected in order.
    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    /// Occurrences collected without order.
    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    /// Occurrences collected by label.
    pub fn map(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Map, 0)
    }

    /// Require at least `min` occurrences.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Allow at most `max` occurrences.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// Schema for a provider, resource or data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Bumped when stored state needs upgrading.
    #[serde(default)]
    pub version: u64,
    /// Top-level attributes and blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// An empty schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add or replace a top-level attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add or replace a top-level nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Whether the schema defines no attributes and no blocks.
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    /// The object type values of this schema decode into.
    pub fn value_type(&self) -> AttributeType {
        self.block.value_type()
    }

    /// Find the attribute a path points at.
    ///
    /// Element steps into nested blocks are skipped, so `ingress[0].port`
    /// resolves to the `port` attribute of the `ingress` block. Paths that
    /// point inside an attribute's value (such as a list element) resolve to
    /// the attribute itself.
    pub fn attribute_at_path(&self, path: &Path) -> Option<&Attribute> {
        let mut block = &self.block;
        let mut steps = path.steps().iter();

        while let Some(step) = steps.next() {
            let PathStep::AttributeName(name) = step else {
                return None;
            };

            if let Some(attr) = block.attributes.get(name) {
                return Some(attr);
            }

            let nested = block.blocks.get(name)?;
            block = &nested.block;

            if nested.nesting_mode != BlockNestingMode::Single {
                match steps.next() {
                    Some(PathStep::ElementKeyInt(_)) | Some(PathStep::ElementKeyString(_)) => {}
                    _ => return None,
                }
            }
        }

        None
    }
}

impl From<&Schema> for proto::Schema {
    fn from(schema: &Schema) -> Self {
        proto::Schema {
            version: schema.version as i64,
            block: Some(block_to_proto(&schema.block, schema.version)),
        }
    }
}

fn block_to_proto(block: &Block, version: u64) -> proto::schema::Block {
    proto::schema::Block {
        version: version as i64,
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| proto::schema::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type.to_type_json()).unwrap_or_default(),
                description: attr.description.clone().unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                deprecated: attr.deprecation_message.is_some(),
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| proto::schema::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block, version)),
                nesting: match nested.nesting_mode {
                    BlockNestingMode::Single => proto::schema::nested_block::NestingMode::Single,
                    BlockNestingMode::List => proto::schema::nested_block::NestingMode::List,
                    BlockNestingMode::Set => proto::schema::nested_block::NestingMode::Set,
                    BlockNestingMode::Map => proto::schema::nested_block::NestingMode::Map,
                } as i32,
                min_items: nested.min_items as i64,
                max_items: nested.max_items as i64,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
        deprecated: false,
    }
}
