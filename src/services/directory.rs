use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::{ApiError, ChatApi};
use crate::models::Session;

#[derive(Debug, Default)]
struct DirectoryState {
    entries: Vec<Session>,
    /// Conversation whose rename prompt is open, if any.
    renaming: Option<String>,
}

/// The user's conversations in server order, with rename support.
pub struct ConversationDirectory {
    api: Arc<dyn ChatApi>,
    state: Mutex<DirectoryState>,
}

impl ConversationDirectory {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            state: Mutex::new(DirectoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn entries(&self) -> Vec<Session> {
        self.state().entries.clone()
    }

    /// Refresh from the server. The listing is kept exactly as ordered by
    /// the server; on failure the previous listing stays.
    pub async fn list(&self) -> Result<Vec<Session>, ApiError> {
        let sessions = self.api.list_conversations().await.map_err(|e| {
            tracing::warn!("Failed to list conversations: {}", e);
            e
        })?;
        self.state().entries = sessions.clone();
        Ok(sessions)
    }

    /// Session id for a 1-based position in the current listing.
    pub fn session_at(&self, position: usize) -> Option<String> {
        position
            .checked_sub(1)
            .and_then(|i| self.state().entries.get(i).map(|s| s.id.clone()))
    }

    pub fn begin_rename(&self, session_id: &str) {
        self.state().renaming = Some(session_id.to_string());
    }

    pub fn cancel_rename(&self) {
        self.state().renaming = None;
    }

    pub fn renaming(&self) -> Option<String> {
        self.state().renaming.clone()
    }

    /// Rename one conversation. Only the matching entry changes locally, and
    /// only once the server accepted the new title. An empty title clears
    /// the label so the entry falls back to its preview.
    pub async fn rename(&self, session_id: &str, title: &str) -> Result<(), ApiError> {
        let title = title.trim();
        if let Err(e) = self.api.rename_conversation(session_id, title).await {
            tracing::error!("Failed to rename conversation {}: {}", session_id, e);
            return Err(e);
        }

        let mut state = self.state();
        if let Some(entry) = state.entries.iter_mut().find(|s| s.id == session_id) {
            entry.title = (!title.is_empty()).then(|| title.to_string());
        }
        state.renaming = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine::tests::FakeApi;

    const LISTING: &str = r#"[
        {"session_id":"a","title":"Bulk","preview":"gain weight"},
        {"session_id":"b","preview":"knee pain"},
        {"session_id":"c","title":"Cardio"}
    ]"#;

    #[tokio::test]
    async fn test_list_keeps_server_order() {
        let directory =
            ConversationDirectory::new(Arc::new(FakeApi::default().with_conversations(LISTING)));
        let ids: Vec<String> = directory
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(directory.session_at(3).as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_an_error() {
        let directory =
            ConversationDirectory::new(Arc::new(FakeApi::default().with_conversations("[]")));
        assert!(directory.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_touches_only_matching_entry() {
        let api = Arc::new(FakeApi::default().with_conversations(LISTING));
        let directory = ConversationDirectory::new(api.clone());
        directory.list().await.unwrap();
        let before = directory.entries();

        directory.begin_rename("b");
        directory.rename("b", "  New Title ").await.unwrap();

        let after = directory.entries();
        assert_eq!(after.len(), before.len());
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[1].title.as_deref(), Some("New Title"));
        assert_eq!(after[1].preview, before[1].preview);
        assert_eq!(directory.renaming(), None);
        assert_eq!(
            api.renames.lock().unwrap()[0],
            ("b".to_string(), "New Title".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_title_falls_back_to_preview() {
        let directory =
            ConversationDirectory::new(Arc::new(FakeApi::default().with_conversations(LISTING)));
        directory.list().await.unwrap();

        directory.rename("a", "   ").await.unwrap();

        let entry = &directory.entries()[0];
        assert_eq!(entry.title, None);
        assert_eq!(entry.display_title(), Some("gain weight"));
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_state_untouched() {
        let api = Arc::new(FakeApi::default().with_conversations(LISTING));
        *api.fail_rename.lock().unwrap() = true;
        let directory = ConversationDirectory::new(api);
        directory.list().await.unwrap();
        let before = directory.entries();

        directory.begin_rename("a");
        assert!(directory.rename("a", "Other").await.is_err());

        assert_eq!(directory.entries(), before);
        assert_eq!(directory.renaming().as_deref(), Some("a"));
    }
}
