//! Resource locator parameters: a typed-in ID or a selection from a list.

use anyhow::Result;
use serde_json::{Map, Value};

use crate::error::NodeError;

/// A parameter value that identifies a remote resource.
///
/// The UI sends either a bare ID (string or number) or a `{mode, value}`
/// object whose `mode` is `list`, `id` or `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    ById(String),
    BySelection { mode: String, value: String },
}

impl ResourceLocator {
    /// Parses any of the accepted shapes. Returns `None` for `null`, empty
    /// strings and selections without a value.
    pub fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(_) | Value::Number(_) => Ok(scalar_to_id(value).map(Self::ById)),
            Value::Object(map) => {
                let mode = map
                    .get("mode")
                    .and_then(Value::as_str)
                    .unwrap_or("id")
                    .to_string();
                let value = map.get("value").and_then(scalar_to_id);
                Ok(value.map(|value| Self::BySelection { mode, value }))
            }
            other => Err(NodeError::configuration(format!(
                "Unsupported resource locator value: {}",
                other
            ))
            .into()),
        }
    }

    /// The canonical ID string.
    pub fn id(&self) -> &str {
        match self {
            ResourceLocator::ById(id) => id,
            ResourceLocator::BySelection { value, .. } => value,
        }
    }
}

fn scalar_to_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_u64(), n.as_i64(), n.as_f64()) {
            (Some(u), _, _) => u.to_string(),
            (None, Some(i), _) => i.to_string(),
            (None, None, Some(f)) if f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        _ => return None,
    };
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Resolves parameter `name` to an ID string, failing with a configuration
/// error when it is absent or empty.
pub fn resolve_id(params: &Map<String, Value>, name: &str) -> Result<String> {
    let value = params.get(name).unwrap_or(&Value::Null);
    match ResourceLocator::from_value(value)? {
        Some(locator) => Ok(locator.id().to_string()),
        None => Err(NodeError::configuration(format!("Parameter '{}' is required", name)).into()),
    }
}

/// Like [`resolve_id`] but absence is not an error.
pub fn resolve_optional_id(params: &Map<String, Value>, name: &str) -> Result<Option<String>> {
    let value = params.get(name).unwrap_or(&Value::Null);
    Ok(ResourceLocator::from_value(value)?.map(|locator| locator.id().to_string()))
}
