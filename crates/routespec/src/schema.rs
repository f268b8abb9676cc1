use crate::{
    descriptor::{ApiSchema, StructDescriptor, TypeDescriptor},
    error::{SchemaError, SchemaResult},
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Maximum struct nesting followed before synthesis gives up
pub const MAX_DEPTH: usize = 64;

/// JSON schema primitive type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
}

/// Structural description of a value's shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SchemaNode {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<serde_json::Number>,

    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty", default)]
    pub enum_values: Vec<Value>,

    /// Object properties keyed by external name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaNode>>,

    /// Element schema for arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,

    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
}

/// `additionalProperties` is either a flag or a value schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

impl SchemaNode {
    pub fn new(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Default::default()
        }
    }

    /// `{type: object, properties: {}}`
    pub fn empty_object() -> Self {
        Self {
            properties: Some(BTreeMap::new()),
            ..Self::new(SchemaType::Object)
        }
    }

    pub fn string() -> Self {
        Self::new(SchemaType::String)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaType::Boolean)
    }

    pub fn array(items: SchemaNode) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(SchemaType::Array)
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Names of the object's properties, sorted
    pub fn property_names(&self) -> Vec<&str> {
        self.properties
            .iter()
            .flat_map(|props| props.keys().map(String::as_str))
            .collect()
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.as_ref()?.get(name)
    }
}

/// Reference to a type whose schema can be synthesized on demand
#[derive(Clone, Copy)]
pub struct TypeHandle {
    name: &'static str,
    describe: fn() -> TypeDescriptor,
}

impl TypeHandle {
    pub fn of<T: ApiSchema + ?Sized>() -> Self {
        Self {
            name: type_name::<T>(),
            describe: T::describe,
        }
    }

    /// Fully qualified Rust type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn describe(&self) -> TypeDescriptor {
        (self.describe)()
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeHandle").field(&self.name).finish()
    }
}

/// Synthesize the body schema of an object-shaped type.
///
/// `()` and `Option<()>` yield the empty-object schema. Any other non-struct
/// root is rejected with [`SchemaError::InvalidType`].
pub fn synthesize<T: ApiSchema + ?Sized>() -> SchemaResult<SchemaNode> {
    synthesize_handle(Some(&TypeHandle::of::<T>()))
}

/// Synthesize from an optional handle; a missing handle is the empty object.
pub fn synthesize_handle(handle: Option<&TypeHandle>) -> SchemaResult<SchemaNode> {
    let Some(handle) = handle else {
        return Ok(SchemaNode::empty_object());
    };

    catch_panics(|| {
        let descriptor = handle.describe();
        root_schema(&descriptor, handle.name())
    })
}

/// Synthesize the schema of any type, object-shaped or not.
///
/// Used for parameter schemas, where scalars are the norm.
pub fn value_schema<T: ApiSchema + ?Sized>() -> SchemaResult<SchemaNode> {
    value_schema_handle(&TypeHandle::of::<T>())
}

pub fn value_schema_handle(handle: &TypeHandle) -> SchemaResult<SchemaNode> {
    catch_panics(|| node_schema(&handle.describe(), 0))
}

fn catch_panics<F>(synthesize: F) -> SchemaResult<SchemaNode>
where
    F: FnOnce() -> SchemaResult<SchemaNode>,
{
    panic::catch_unwind(AssertUnwindSafe(synthesize)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Err(SchemaError::Panic(message))
    })
}

fn root_schema(descriptor: &TypeDescriptor, name: &str) -> SchemaResult<SchemaNode> {
    match descriptor {
        TypeDescriptor::Absent => Ok(SchemaNode::empty_object()),
        TypeDescriptor::Optional(inner) => root_schema(inner, name),
        TypeDescriptor::Struct(fields) => struct_schema(fields, 0),
        _ => Err(SchemaError::InvalidType(name.to_string())),
    }
}

fn struct_schema(descriptor: &StructDescriptor, depth: usize) -> SchemaResult<SchemaNode> {
    if depth >= MAX_DEPTH {
        return Err(SchemaError::DepthExceeded(MAX_DEPTH));
    }

    let mut properties = BTreeMap::new();
    let mut required = Vec::new();

    for field in &descriptor.fields {
        let annotations = &field.annotations;
        let Some(name) = annotations.name else {
            continue;
        };

        let mut schema = node_schema(&(field.ty)(), depth + 1)
            .map_err(|source| SchemaError::in_field(field.ident, source))?;

        if let Some(doc) = annotations.doc {
            schema.description = Some(doc.to_string());
        }
        if let Some(example) = annotations.example {
            schema.example = Some(Value::String(example.to_string()));
        }
        if let Some(format) = annotations.format {
            schema.format = Some(format.to_string());
        }

        if annotations.is_required() {
            required.push(name.to_string());
        }
        properties.insert(name.to_string(), schema);
    }

    Ok(SchemaNode {
        properties: Some(properties),
        required,
        ..SchemaNode::new(SchemaType::Object)
    })
}

fn node_schema(descriptor: &TypeDescriptor, depth: usize) -> SchemaResult<SchemaNode> {
    let schema = match descriptor {
        TypeDescriptor::Absent => SchemaNode::empty_object(),
        TypeDescriptor::Optional(inner) => node_schema(inner, depth)?,
        TypeDescriptor::String | TypeDescriptor::Unsupported(_) => SchemaNode::string(),
        TypeDescriptor::Boolean => SchemaNode::boolean(),
        TypeDescriptor::Integer { bits, signed } => {
            let format = if *bits <= 32 { "int32" } else { "int64" };
            let mut schema = SchemaNode::new(SchemaType::Integer).with_format(format);
            if !signed {
                schema.minimum = Some(0.into());
            }
            schema
        }
        TypeDescriptor::Float { bits } => {
            let format = if *bits <= 32 { "float" } else { "double" };
            SchemaNode::new(SchemaType::Number).with_format(format)
        }
        TypeDescriptor::Bytes => SchemaNode::string().with_format("byte"),
        TypeDescriptor::DateTime { example } => SchemaNode::string()
            .with_format("date-time")
            .with_example(example.to_rfc3339_opts(SecondsFormat::Secs, true)),
        TypeDescriptor::Date => SchemaNode::string().with_format("date"),
        TypeDescriptor::Uuid => SchemaNode::string().with_format("uuid"),
        TypeDescriptor::Sequence(element) if element.is_byte() => {
            SchemaNode::string().with_format("byte")
        }
        TypeDescriptor::Sequence(element) => SchemaNode::array(node_schema(element, depth)?),
        TypeDescriptor::Map(value) => SchemaNode {
            additional_properties: Some(AdditionalProperties::Schema(Box::new(node_schema(
                value, depth,
            )?))),
            ..SchemaNode::new(SchemaType::Object)
        },
        TypeDescriptor::Any => SchemaNode {
            additional_properties: Some(AdditionalProperties::Allowed(true)),
            ..SchemaNode::new(SchemaType::Object)
        },
        TypeDescriptor::Enum(variants) => SchemaNode {
            enum_values: variants.iter().map(|v| Value::from(*v)).collect(),
            ..SchemaNode::string()
        },
        TypeDescriptor::Struct(fields) => struct_schema(fields, depth)?,
    };
    Ok(schema)
}
