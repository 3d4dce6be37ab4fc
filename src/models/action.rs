use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_OK: &str = "ok";

/// A structured outcome the assistant attached to its reply.
///
/// `action` comes from an open set; interpretation lives in
/// `services::interpreter`, this type only carries the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Bare action name reported without a payload.
    pub fn named(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            status: STATUS_OK.to_string(),
            data: Value::Null,
            error: None,
        }
    }

    /// Lenient conversion for `results` and `actions` entries, which are
    /// either result objects or plain action names. Anything carrying an
    /// action name is kept; odd `status` or `error` shapes degrade to text.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(name) if !name.trim().is_empty() => Some(Self::named(name)),
            Value::Object(mut map) => {
                let action = match map.remove("action") {
                    Some(Value::String(name)) if !name.trim().is_empty() => name,
                    _ => return None,
                };
                let status = match map.remove("status") {
                    Some(Value::String(status)) => status,
                    None | Some(Value::Null) => String::new(),
                    Some(other) => other.to_string(),
                };
                Some(Self {
                    action,
                    status,
                    data: map.remove("data").unwrap_or(Value::Null),
                    error: map.remove("error").and_then(error_text),
                })
            }
            _ => None,
        }
    }
}

fn error_text(error: Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Object(ref map) => Some(
            ["message", "error", "detail"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => Some(other.to_string()),
    }
}
