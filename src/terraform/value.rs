use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decoded resource attribute.
///
/// Terraform state stores attributes as arbitrary JSON. Accessors are strict:
/// asking a number for its string form is a [`ValueError::TypeMismatch`], never a
/// silent coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("attribute not found: {0}")]
    NotFound(String),
}

impl AttributeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Number(_) => "number",
            AttributeValue::String(_) => "string",
            AttributeValue::List(_) => "list",
            AttributeValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match self {
            AttributeValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            AttributeValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, ValueError> {
        match self {
            AttributeValue::Number(n) => n.as_i64().ok_or(ValueError::TypeMismatch {
                expected: "integer",
                found: "number",
            }),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ValueError> {
        match self {
            AttributeValue::Number(n) => n.as_f64().ok_or(ValueError::TypeMismatch {
                expected: "float",
                found: "number",
            }),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_list(&self) -> Result<&[AttributeValue], ValueError> {
        match self {
            AttributeValue::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, AttributeValue>, ValueError> {
        match self {
            AttributeValue::Map(map) => Ok(map),
            other => Err(other.mismatch("map")),
        }
    }

    /// Looks up a key in a map value.
    pub fn get(&self, key: &str) -> Result<&AttributeValue, ValueError> {
        self.as_map()?
            .get(key)
            .ok_or_else(|| ValueError::NotFound(key.to_string()))
    }

    /// True when this is a string equal to `expected`. Non-strings never match.
    pub fn str_eq(&self, expected: &str) -> bool {
        matches!(self, AttributeValue::String(s) if s == expected)
    }

    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::Number(n) => AttributeValue::Number(n),
            serde_json::Value::String(s) => AttributeValue::String(s),
            serde_json::Value::Array(items) => {
                AttributeValue::List(items.into_iter().map(AttributeValue::from).collect())
            }
            serde_json::Value::Object(map) => AttributeValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Null => f.write_str("null"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Number(n) => write!(f, "{n}"),
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}
