use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ValueKind {
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
}

impl ValueKind {
    pub fn as_double(&self) -> Option<f64> {
        match self {
            ValueKind::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Bool(_) => "bool",
            ValueKind::Integer(_) => "integer",
            ValueKind::Double(_) => "double",
            ValueKind::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetResult {
    pub successful: bool,
    #[serde(default)]
    pub reason: String,
}

impl SetResult {
    pub fn ok() -> Self {
        Self {
            successful: true,
            reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            successful: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceRequest {
    GetParameters { names: Vec<String> },
    SetParameters { parameters: Vec<ParameterValue> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceResponse {
    Values { values: Vec<ParameterValue> },
    SetResults { results: Vec<SetResult> },
    Error { message: String },
}
