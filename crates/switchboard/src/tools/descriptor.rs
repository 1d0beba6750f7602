//! Canonical tool descriptors and parameter schemas.
//!
//! Every source, whatever its native schema dialect, is normalized into a
//! [`ToolDescriptor`] with a flat [`ParameterSchema`]: named parameters, each
//! with a primitive [`ParamType`] and a required flag. Automations that accept
//! arbitrary keys use [`ParameterSchema::open`].

use crate::ToolDef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Which kind of source owns a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Workflow,
    Protocol,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Local => write!(f, "local"),
            SourceKind::Workflow => write!(f, "workflow"),
            SourceKind::Protocol => write!(f, "protocol"),
        }
    }
}

/// Primitive parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Map a JSON Schema type name. Unknown names degrade to `String`.
    pub fn from_json_type(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "number" | "float" | "double" => ParamType::Number,
            "integer" | "int" => ParamType::Integer,
            "boolean" | "bool" => ParamType::Boolean,
            "object" | "dict" => ParamType::Object,
            "array" | "list" => ParamType::Array,
            _ => ParamType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

/// One named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type,
            required,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Flat structural schema for a tool's arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub params: Vec<ParamSpec>,
    /// Whether keys beyond `params` are accepted.
    #[serde(default)]
    pub open: bool,
}

impl ParameterSchema {
    /// A schema with no parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A permissive schema accepting any key/value pairs.
    pub fn open() -> Self {
        Self {
            params: Vec::new(),
            open: true,
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Names of required parameters, in declaration order.
    pub fn required(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Convert a remote input schema into the canonical form.
    ///
    /// Two dialects are accepted:
    /// - **typed object**: `{"type": "object", "properties": {...}, "required": [...]}`
    ///   (what JSON Schema and most protocol servers send);
    /// - **dict-like**: `{"param": "string", "other": {"type": "integer", "required": false}}`,
    ///   where a bare type name means a required parameter.
    ///
    /// Anything unrecognizable yields an empty schema rather than an error.
    pub fn from_json_schema(schema: &Value) -> Self {
        let Some(obj) = schema.as_object() else {
            return Self::empty();
        };

        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            let required: Vec<&str> = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let params = properties
                .iter()
                .map(|(name, prop)| ParamSpec {
                    name: name.clone(),
                    param_type: property_type(prop),
                    required: required.contains(&name.as_str()),
                    description: description_of(prop),
                })
                .collect();
            return Self {
                params,
                open: additional_allowed(obj),
            };
        }

        let object_typed = obj.get("type").and_then(Value::as_str) == Some("object");
        if object_typed || obj.contains_key("$schema") {
            // Typed object without properties: no named parameters.
            return Self {
                params: Vec::new(),
                open: additional_allowed(obj),
            };
        }

        let params = obj
            .iter()
            .map(|(name, spec)| match spec {
                Value::String(type_name) => {
                    ParamSpec::new(name.clone(), ParamType::from_json_type(type_name), true)
                }
                Value::Object(fields) => ParamSpec {
                    name: name.clone(),
                    param_type: property_type(spec),
                    required: fields
                        .get("required")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                    description: description_of(spec),
                },
                _ => ParamSpec::new(name.clone(), ParamType::String, true),
            })
            .collect();
        Self {
            params,
            open: false,
        }
    }

    /// Render as the wire-format JSON Schema object.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type.as_str()));
            if param.param_type == ParamType::Array {
                prop.insert("items".into(), json!({}));
            }
            if let Some(ref d) = param.description {
                prop.insert("description".into(), json!(d));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }
        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
        });
        if self.open {
            schema["additionalProperties"] = Value::Bool(true);
        }
        schema
    }
}

fn property_type(prop: &Value) -> ParamType {
    match prop.get("type") {
        Some(Value::String(t)) => ParamType::from_json_type(t),
        // ["string", "null"] style unions: first non-null member wins.
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(ParamType::from_json_type)
            .unwrap_or(ParamType::String),
        _ => ParamType::String,
    }
}

fn description_of(prop: &Value) -> Option<String> {
    prop.get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn additional_allowed(obj: &Map<String, Value>) -> bool {
    matches!(obj.get("additionalProperties"), Some(Value::Bool(true)))
}

/// Canonical description of one callable operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name offered to the model. Unique within a catalog.
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
    pub source_kind: SourceKind,
    /// Owning source instance. Empty for local tools.
    pub source_id: String,
    /// Name the owning source knows the operation by: the bare remote tool
    /// name for protocol tools, the automation name for workflows.
    pub remote_name: String,
}

impl ToolDescriptor {
    pub fn local(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Self {
        let name = name.into();
        Self {
            remote_name: name.clone(),
            name,
            description: description.into(),
            parameters,
            source_kind: SourceKind::Local,
            source_id: String::new(),
        }
    }

    /// The function-calling definition sent to the inference backend.
    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(&self.name, &self.description, self.parameters.to_json())
    }
}
