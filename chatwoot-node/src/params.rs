//! Typed access to one input item's parameters.

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::error::NodeError;
use crate::locator;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: Map<String, Value>,
}

impl From<Map<String, Value>> for Params {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl Params {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(NodeError::configuration(format!(
                "Item parameters must be a JSON object, got {}",
                other
            ))
            .into()),
        }
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_null())
    }

    /// Required, non-empty string (numbers are accepted and rendered).
    pub fn str(&self, name: &str) -> Result<String> {
        self.opt_str(name)
            .ok_or_else(|| NodeError::configuration(format!("Parameter '{}' is required", name)).into())
    }

    pub fn opt_str(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => default,
        }
    }

    pub fn opt_u64(&self, name: &str) -> Result<Option<u64>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                NodeError::configuration(format!(
                    "Parameter '{}' must be a non-negative integer",
                    name
                ))
                .into()
            }),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| {
                NodeError::configuration(format!(
                    "Parameter '{}' must be a non-negative integer, got '{}'",
                    name, s
                ))
                .into()
            }),
            Some(other) => Err(NodeError::configuration(format!(
                "Parameter '{}' must be a number, got {}",
                name, other
            ))
            .into()),
        }
    }

    pub fn u64_or(&self, name: &str, default: u64) -> Result<u64> {
        Ok(self.opt_u64(name)?.unwrap_or(default))
    }

    /// Array of strings, or a comma-separated string. Blank entries are dropped.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        let items: Vec<String> = match self.values.get(name) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.trim().to_string()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(NodeError::configuration(format!(
                        "Parameter '{}' must contain strings, got {}",
                        name, other
                    ))),
                })
                .collect::<std::result::Result<_, _>>()?,
            Some(other) => {
                return Err(NodeError::configuration(format!(
                    "Parameter '{}' must be a list, got {}",
                    name, other
                ))
                .into())
            }
        };
        Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
    }

    /// JSON object given inline or as a JSON-encoded string.
    pub fn opt_object(&self, name: &str) -> Result<Option<Map<String, Value>>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => {
                let parsed: Value = serde_json::from_str(s)
                    .map_err(|e| {
                        NodeError::configuration(format!(
                            "Parameter '{}' is not valid JSON: {}",
                            name, e
                        ))
                    })
                    .with_context(|| format!("Failed to parse parameter '{}'", name))?;
                match parsed {
                    Value::Object(map) => Ok(Some(map)),
                    _ => Err(NodeError::configuration(format!(
                        "Parameter '{}' must be a JSON object",
                        name
                    ))
                    .into()),
                }
            }
            Some(other) => Err(NodeError::configuration(format!(
                "Parameter '{}' must be an object, got {}",
                name, other
            ))
            .into()),
        }
    }

    pub fn id(&self, name: &str) -> Result<String> {
        locator::resolve_id(&self.values, name)
    }

    pub fn opt_id(&self, name: &str) -> Result<Option<String>> {
        locator::resolve_optional_id(&self.values, name)
    }

    /// `accountId` parameter, falling back to the credentials' default account.
    pub fn account_id(&self, default: Option<u64>) -> Result<String> {
        match self.opt_id("accountId")? {
            Some(id) => Ok(id),
            None => default.map(|id| id.to_string()).ok_or_else(|| {
                NodeError::configuration(
                    "Parameter 'accountId' is required (no default account configured)",
                )
                .into()
            }),
        }
    }
}

/// Appends `key=value` when the value is present.
pub fn push_query(query: &mut Vec<(String, String)>, key: &str, value: Option<impl ToString>) {
    if let Some(value) = value {
        query.push((key.to_string(), value.to_string()));
    }
}
