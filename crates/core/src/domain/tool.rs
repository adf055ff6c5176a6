use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// A single validated tool argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl ArgValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Integer(value) => Value::from(*value),
            Self::Number(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "\"{value}\""),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Schema-validated argument map. Ordered so equality and rendering are stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(BTreeMap<String, ArgValue>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().map(|(name, value)| (name.clone(), value.to_json())).collect())
    }
}

impl fmt::Display for ToolArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered =
            self.0.iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>();
        f.write_str(&rendered.join(", "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub param_type: ParamType,
    pub required: bool,
    pub allowed_values: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("tool arguments must be a JSON object")]
    NotAnObject,
    #[error("missing required parameter `{0}`")]
    MissingRequired(String),
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("parameter `{name}` must be of type {}", .expected.as_str())]
    WrongType { name: String, expected: ParamType },
    #[error("parameter `{name}` has unsupported value `{value}` (expected one of: {})", .allowed.join(", "))]
    NotAllowed { name: String, value: String, allowed: Vec<String> },
}

/// Declared parameters of a tool. Completion-service arguments are checked against it
/// before a call is proposed or executed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    parameters: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.push(name, param_type, description, true, &[])
    }

    pub fn optional(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.push(name, param_type, description, false, &[])
    }

    pub fn required_one_of(self, name: &str, description: &str, allowed: &[&str]) -> Self {
        self.push(name, ParamType::String, description, true, allowed)
    }

    fn push(
        mut self,
        name: &str,
        param_type: ParamType,
        description: &str,
        required: bool,
        allowed: &[&str],
    ) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.to_string(),
            description: description.to_string(),
            param_type,
            required,
            allowed_values: allowed.iter().map(|value| value.to_string()).collect(),
        });
        self
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn validate(&self, raw: &Value) -> Result<ToolArguments, ArgumentError> {
        let empty = Map::new();
        let object = match raw {
            Value::Object(object) => object,
            Value::Null => &empty,
            _ => return Err(ArgumentError::NotAnObject),
        };

        if let Some(unknown) =
            object.keys().find(|key| !self.parameters.iter().any(|spec| &spec.name == *key))
        {
            return Err(ArgumentError::UnknownParameter(unknown.clone()));
        }

        let mut arguments = ToolArguments::new();
        for spec in &self.parameters {
            match object.get(&spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(ArgumentError::MissingRequired(spec.name.clone()));
                    }
                }
                Some(value) => {
                    let converted = convert(spec, value)?;
                    arguments = arguments.with(spec.name.clone(), converted);
                }
            }
        }

        Ok(arguments)
    }

    /// JSON-schema rendering used when advertising the tool to a completion backend.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.parameters {
            let mut property = json!({
                "type": spec.param_type.as_str(),
                "description": spec.description,
            });
            if !spec.allowed_values.is_empty() {
                property["enum"] = json!(spec.allowed_values);
            }
            properties.insert(spec.name.clone(), property);
        }

        let required = self
            .parameters
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name.clone())
            .collect::<Vec<_>>();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn convert(spec: &ParameterSpec, value: &Value) -> Result<ArgValue, ArgumentError> {
    let wrong_type =
        || ArgumentError::WrongType { name: spec.name.clone(), expected: spec.param_type };

    let converted = match spec.param_type {
        ParamType::String => ArgValue::Text(value.as_str().ok_or_else(wrong_type)?.to_string()),
        ParamType::Integer => ArgValue::Integer(value.as_i64().ok_or_else(wrong_type)?),
        ParamType::Number => ArgValue::Number(value.as_f64().ok_or_else(wrong_type)?),
        ParamType::Boolean => ArgValue::Bool(value.as_bool().ok_or_else(wrong_type)?),
    };

    if !spec.allowed_values.is_empty() {
        let text = converted.as_text().unwrap_or_default();
        if !spec.allowed_values.iter().any(|allowed| allowed == text) {
            return Err(ArgumentError::NotAllowed {
                name: spec.name.clone(),
                value: text.to_string(),
                allowed: spec.allowed_values.clone(),
            });
        }
    }

    Ok(converted)
}

/// Registration metadata for one tool in a domain tool set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
    pub side_effecting: bool,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, parameters: ParameterSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            side_effecting: false,
        }
    }

    pub fn side_effecting(mut self) -> Self {
        self.side_effecting = true;
        self
    }
}
