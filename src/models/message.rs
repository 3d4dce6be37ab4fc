use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::ActionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation as the client displays it.
///
/// `id` is a local handle only; the server never sees it and it is not used
/// to detect duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub results: Vec<ActionResult>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn assistant(
        content: impl Into<String>,
        results: Vec<ActionResult>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            results,
            errors,
            ..Self::new(Role::Assistant, content.into())
        }
    }

    /// A failure notice produced on this side of the wire.
    pub fn local_error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(Role::Assistant, content.into())
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            results: Vec::new(),
            errors: Vec::new(),
            is_error: false,
        }
    }
}
