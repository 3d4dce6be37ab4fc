use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::ActionResult;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Credential lookup failed: {0}")]
    Credentials(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RenameRequest<'a> {
    pub title: &'a str,
}

/// Body of `POST /api/chat`.
///
/// The reply text has moved between three keys over the backend's lifetime,
/// and the result lists are kept as raw JSON so that one malformed entry
/// does not sink the whole reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub session_id: Option<Value>,
    #[serde(default)]
    pub assistant_response: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<Value>>,
    #[serde(default)]
    pub actions: Option<Vec<Value>>,
    #[serde(default)]
    pub errors: Option<Vec<Value>>,
}

impl ChatReply {
    pub fn session_id(&self) -> Option<String> {
        match self.session_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn text(&self) -> String {
        [&self.assistant_response, &self.response, &self.message]
            .into_iter()
            .find_map(|t| t.clone().filter(|s| !s.is_empty()))
            .unwrap_or_default()
    }

    /// `results` wins when present; otherwise `actions` stands in for it.
    pub fn action_results(&self) -> Vec<ActionResult> {
        let source = match (&self.results, &self.actions) {
            (Some(results), _) if !results.is_empty() => results,
            (_, Some(actions)) => actions,
            _ => return Vec::new(),
        };
        source
            .iter()
            .cloned()
            .filter_map(ActionResult::from_value)
            .collect()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flatten()
            .filter_map(|e| match e {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("error")
                    .or_else(|| map.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.trim().is_empty())
            .collect()
    }
}

/// One `{message, response}` pair from `GET /api/chat/history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(
        default,
        alias = "timestamp",
        deserialize_with = "crate::models::lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(alias = "error", alias = "message")]
    pub detail: Value,
}
