use async_trait::async_trait;

use super::types::{ApiError, ChatReply, ChatRequest, HistoryEntry};
use crate::models::Session;

/// The coaching backend's chat endpoints.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatReply, ApiError>;

    /// Conversations in the order the server ranks them, most recent first.
    async fn list_conversations(&self) -> Result<Vec<Session>, ApiError>;

    async fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError>;

    async fn rename_conversation(&self, session_id: &str, title: &str) -> Result<(), ApiError>;
}
