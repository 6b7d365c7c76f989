//! Structural descriptors for structured model output.
//!
//! A [`SchemaDescriptor`] describes the shape a model answer must have: field
//! names, their types, whether they are required, and nesting. It is plain
//! data: the same descriptor biases the model at configuration time (through
//! a derived response schema) and drives validation at cleaning time.
//!
//! Descriptors can be written by hand, deserialized from JSON, or derived from
//! any Rust type implementing [`schemars::JsonSchema`].

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ConfigurationError;

/// Deepest nesting accepted when converting a JSON Schema document. Guards
/// against self-referencing `$ref` chains.
const MAX_SCHEMA_DEPTH: usize = 64;

/// A structural type descriptor for expected model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaDescriptor {
    String,
    /// Any JSON number, integral or not.
    Number,
    /// An integral JSON number.
    Integer,
    Boolean,
    /// Any JSON value, including `null`.
    Any,
    Array {
        items: Box<SchemaDescriptor>,
    },
    /// An object with declared fields. Undeclared fields are tolerated.
    Object {
        #[serde(default)]
        fields: Vec<FieldDescriptor>,
    },
}

/// One named field of an object descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub schema: SchemaDescriptor,
    /// Required fields must be present and non-null. Optional fields may be
    /// absent or `null`.
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_required() -> bool {
    true
}

impl FieldDescriptor {
    pub fn required(name: impl Into<String>, schema: SchemaDescriptor) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, schema: SchemaDescriptor) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
            description: None,
        }
    }

    /// Adds a description, forwarded to the model as part of the output hint.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl SchemaDescriptor {
    pub fn object(fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        SchemaDescriptor::Object {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn array(items: SchemaDescriptor) -> Self {
        SchemaDescriptor::Array {
            items: Box::new(items),
        }
    }

    /// The name used for this type in validation errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaDescriptor::String => "string",
            SchemaDescriptor::Number => "number",
            SchemaDescriptor::Integer => "integer",
            SchemaDescriptor::Boolean => "boolean",
            SchemaDescriptor::Any => "any",
            SchemaDescriptor::Array { .. } => "array",
            SchemaDescriptor::Object { .. } => "object",
        }
    }

    /// Derives a descriptor from a Rust type's JSON Schema.
    ///
    /// # Example
    /// ```
    /// use autoreview::core::SchemaDescriptor;
    /// use schemars::JsonSchema;
    ///
    /// #[derive(JsonSchema)]
    /// struct Review {
    ///     summary: String,
    ///     score: f64,
    /// }
    ///
    /// let schema = SchemaDescriptor::for_type::<Review>().unwrap();
    /// assert_eq!(schema.type_name(), "object");
    /// ```
    pub fn for_type<T: JsonSchema>() -> Result<Self, ConfigurationError> {
        let schema = schemars::schema_for!(T);
        Self::from_json_schema(schema.as_value())
    }

    /// Converts a JSON Schema document into a descriptor.
    ///
    /// Local `$ref`s (`#/$defs/..`, `#/definitions/..`) are resolved against
    /// `root`. A type that also admits `null`, either through a `type` array
    /// or an `anyOf`/`oneOf` with a `null` branch, becomes an optional field.
    /// Other unions are rejected.
    pub fn from_json_schema(root: &Value) -> Result<Self, ConfigurationError> {
        let converter = JsonSchemaConverter { root };
        let (descriptor, _) = converter.convert(root, "", 0)?;
        Ok(descriptor)
    }

    /// Rejects empty and duplicate field names at every object level.
    pub(crate) fn check_structure(&self, path: &str) -> Result<(), ConfigurationError> {
        match self {
            SchemaDescriptor::Array { items } => items.check_structure(&item_path(path)),
            SchemaDescriptor::Object { fields } => {
                let mut seen = HashSet::new();
                for field in fields {
                    if field.name.trim().is_empty() {
                        return Err(ConfigurationError::invalid_schema(
                            path,
                            "field name must not be empty",
                        ));
                    }
                    let field_path = field_path(path, &field.name);
                    if !seen.insert(field.name.as_str()) {
                        return Err(ConfigurationError::invalid_schema(
                            field_path,
                            "duplicate field name",
                        ));
                    }
                    field.schema.check_structure(&field_path)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Renders the descriptor in the Gemini `responseSchema` dialect.
    ///
    /// Returns `None` when the descriptor has no counterpart there: `Any`, and
    /// objects without declared fields. Such properties are left out of their
    /// parent object, which then no longer constrains them.
    pub(crate) fn to_response_schema(&self) -> Option<Value> {
        match self {
            SchemaDescriptor::String => Some(json!({ "type": "STRING" })),
            SchemaDescriptor::Number => Some(json!({ "type": "NUMBER" })),
            SchemaDescriptor::Integer => Some(json!({ "type": "INTEGER" })),
            SchemaDescriptor::Boolean => Some(json!({ "type": "BOOLEAN" })),
            SchemaDescriptor::Any => None,
            SchemaDescriptor::Array { items } => Some(json!({
                "type": "ARRAY",
                "items": items.to_response_schema()?,
            })),
            SchemaDescriptor::Object { fields } => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                let mut ordering = Vec::new();

                for field in fields {
                    let Some(mut property) = field.schema.to_response_schema() else {
                        continue;
                    };
                    if let Value::Object(ref mut map) = property {
                        if let Some(description) = &field.description {
                            map.insert("description".into(), json!(description));
                        }
                        if !field.required {
                            map.insert("nullable".into(), Value::Bool(true));
                        }
                    }
                    if field.required {
                        required.push(json!(field.name));
                    }
                    ordering.push(json!(field.name));
                    properties.insert(field.name.clone(), property);
                }

                if properties.is_empty() {
                    return None;
                }

                let mut schema = Map::new();
                schema.insert("type".into(), json!("OBJECT"));
                schema.insert("properties".into(), Value::Object(properties));
                schema.insert("propertyOrdering".into(), Value::Array(ordering));
                if !required.is_empty() {
                    schema.insert("required".into(), Value::Array(required));
                }
                Some(Value::Object(schema))
            }
        }
    }
}

pub(crate) fn field_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

fn item_path(parent: &str) -> String {
    format!("{parent}[]")
}

struct JsonSchemaConverter<'a> {
    root: &'a Value,
}

impl JsonSchemaConverter<'_> {
    /// Returns the descriptor for `node` and whether `null` is also accepted.
    fn convert(
        &self,
        node: &Value,
        path: &str,
        depth: usize,
    ) -> Result<(SchemaDescriptor, bool), ConfigurationError> {
        if depth > MAX_SCHEMA_DEPTH {
            return Err(ConfigurationError::invalid_schema(
                path,
                "schema nests too deeply (recursive `$ref`?)",
            ));
        }

        let obj = match node {
            Value::Bool(true) => return Ok((SchemaDescriptor::Any, true)),
            Value::Bool(false) => {
                return Err(ConfigurationError::invalid_schema(
                    path,
                    "`false` schema accepts no value",
                ));
            }
            Value::Object(obj) => obj,
            _ => {
                return Err(ConfigurationError::invalid_schema(
                    path,
                    "schema must be an object or a boolean",
                ));
            }
        };

        if let Some(reference) = obj.get("$ref") {
            let reference = reference.as_str().ok_or_else(|| {
                ConfigurationError::invalid_schema(path, "`$ref` must be a string")
            })?;
            let target = self.resolve(reference).ok_or_else(|| {
                ConfigurationError::invalid_schema(path, format!("cannot resolve `{reference}`"))
            })?;
            return self.convert(target, path, depth + 1);
        }

        for key in ["anyOf", "oneOf"] {
            if let Some(variants) = obj.get(key) {
                return self.convert_union(key, variants, path, depth);
            }
        }

        match obj.get("type") {
            Some(Value::String(ty)) => Ok((self.convert_typed(ty, obj, path, depth)?, false)),
            Some(Value::Array(types)) => {
                let mut nullable = false;
                let mut concrete = Vec::new();
                for ty in types {
                    match ty.as_str() {
                        Some("null") => nullable = true,
                        Some(ty) => concrete.push(ty),
                        None => {
                            return Err(ConfigurationError::invalid_schema(
                                path,
                                "`type` entries must be strings",
                            ));
                        }
                    }
                }
                match concrete.as_slice() {
                    [] => Ok((SchemaDescriptor::Any, true)),
                    [ty] => Ok((self.convert_typed(ty, obj, path, depth)?, nullable)),
                    _ => Err(ConfigurationError::invalid_schema(
                        path,
                        format!("unions of {concrete:?} are not supported"),
                    )),
                }
            }
            Some(_) => Err(ConfigurationError::invalid_schema(
                path,
                "`type` must be a string or an array of strings",
            )),
            None if obj.contains_key("properties") => {
                Ok((self.convert_typed("object", obj, path, depth)?, false))
            }
            None if obj.contains_key("items") => {
                Ok((self.convert_typed("array", obj, path, depth)?, false))
            }
            None => Ok((SchemaDescriptor::Any, true)),
        }
    }

    fn convert_union(
        &self,
        key: &str,
        variants: &Value,
        path: &str,
        depth: usize,
    ) -> Result<(SchemaDescriptor, bool), ConfigurationError> {
        let variants = variants.as_array().ok_or_else(|| {
            ConfigurationError::invalid_schema(path, format!("`{key}` must be an array"))
        })?;

        let mut nullable = false;
        let mut concrete = Vec::new();
        for variant in variants {
            if variant.get("type").and_then(Value::as_str) == Some("null") {
                nullable = true;
            } else {
                concrete.push(variant);
            }
        }

        match concrete.as_slice() {
            [] => Err(ConfigurationError::invalid_schema(
                path,
                format!("`{key}` has no non-null variant"),
            )),
            [only] => {
                let (descriptor, inner_nullable) = self.convert(only, path, depth + 1)?;
                Ok((descriptor, nullable || inner_nullable))
            }
            _ => Err(ConfigurationError::invalid_schema(
                path,
                format!("`{key}` with several non-null variants is not supported"),
            )),
        }
    }

    fn convert_typed(
        &self,
        ty: &str,
        obj: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<SchemaDescriptor, ConfigurationError> {
        match ty {
            "string" => Ok(SchemaDescriptor::String),
            "number" => Ok(SchemaDescriptor::Number),
            "integer" => Ok(SchemaDescriptor::Integer),
            "boolean" => Ok(SchemaDescriptor::Boolean),
            "array" => {
                let items = match obj.get("items") {
                    Some(items) => self.convert(items, &item_path(path), depth + 1)?.0,
                    None => SchemaDescriptor::Any,
                };
                Ok(SchemaDescriptor::array(items))
            }
            "object" => {
                let required: HashSet<&str> = obj
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|names| names.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();

                let mut fields = Vec::new();
                if let Some(properties) = obj.get("properties") {
                    let properties = properties.as_object().ok_or_else(|| {
                        ConfigurationError::invalid_schema(path, "`properties` must be an object")
                    })?;
                    for (name, property) in properties {
                        let path = field_path(path, name);
                        let (schema, nullable) = self.convert(property, &path, depth + 1)?;
                        fields.push(FieldDescriptor {
                            name: name.clone(),
                            schema,
                            required: required.contains(name.as_str()) && !nullable,
                            description: property
                                .get("description")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        });
                    }
                }
                Ok(SchemaDescriptor::Object { fields })
            }
            other => Err(ConfigurationError::invalid_schema(
                path,
                format!("unsupported type `{other}`"),
            )),
        }
    }

    fn resolve(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.root.pointer(pointer)
    }
}
