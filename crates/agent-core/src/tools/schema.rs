//! Parameter schemas and validation of incoming invocations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why an invocation was rejected before execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("parameters must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("unexpected parameter '{0}'")]
    UnexpectedParameter(String),

    #[error("parameter '{name}' must be of type {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: &'static str,
    },

    #[error("parameter '{name}' must be one of: {allowed}")]
    NotInEnum { name: String, allowed: String },
}

/// Schema for a tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterProperty {
    /// Parameter type (string, number, integer, boolean, array, object)
    #[serde(rename = "type")]
    pub param_type: String,
    /// Parameter description
    pub description: String,
    /// Enum values if applicable
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Default value if applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterProperty {
    fn typed(param_type: &str, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.to_string(),
            description: description.into(),
            enum_values: None,
            default: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::typed("number", description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::typed("integer", description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::typed("boolean", description)
    }

    pub fn array(description: impl Into<String>) -> Self {
        Self::typed("array", description)
    }

    pub fn object(description: impl Into<String>) -> Self {
        Self::typed("object", description)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        }
    }
}

/// Schema describing tool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Type is always "object"
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Parameter properties
    pub properties: BTreeMap<String, ParameterProperty>,
    /// Required parameter names
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), prop);
        self.required.push(name);
        self
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// JSON Schema representation sent to providers
    pub fn to_json_schema(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }

    /// Check `params` against this schema
    ///
    /// Required names are checked in declaration order, then supplied names in
    /// key order, so the reported violation is deterministic.
    pub fn validate(&self, params: &Value) -> Result<(), SchemaViolation> {
        let args = params
            .as_object()
            .ok_or_else(|| SchemaViolation::NotAnObject(json_type_name(params)))?;

        for name in &self.required {
            match args.get(name) {
                Some(v) if !v.is_null() => {}
                _ => return Err(SchemaViolation::MissingParameter(name.clone())),
            }
        }

        for (name, value) in args {
            let prop = self
                .properties
                .get(name)
                .ok_or_else(|| SchemaViolation::UnexpectedParameter(name.clone()))?;

            // Optional parameters may be passed as null to mean "absent"
            if value.is_null() {
                continue;
            }

            if !prop.accepts(value) {
                return Err(SchemaViolation::TypeMismatch {
                    name: name.clone(),
                    expected: prop.param_type.clone(),
                    actual: json_type_name(value),
                });
            }

            if let (Some(allowed), Some(s)) = (&prop.enum_values, value.as_str()) {
                if !allowed.iter().any(|a| a == s) {
                    return Err(SchemaViolation::NotInEnum {
                        name: name.clone(),
                        allowed: allowed.join(", "),
                    });
                }
            }
        }

        Ok(())
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
