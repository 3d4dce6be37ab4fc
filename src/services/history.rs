use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::{ChatApi, HistoryEntry};
use crate::models::{Message, Session};
use crate::services::engine::ChatEngine;

/// Expand `{message, response}` pairs into alternating user and assistant
/// messages. Missing halves are skipped.
pub fn entries_to_messages(entries: Vec<HistoryEntry>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        if let Some(text) = entry.message.filter(|t| !t.trim().is_empty()) {
            let mut msg = Message::user(text);
            if let Some(ts) = entry.created_at {
                msg = msg.with_timestamp(ts);
            }
            messages.push(msg);
        }
        if let Some(text) = entry.response.filter(|t| !t.trim().is_empty()) {
            let mut msg = Message::assistant(text, Vec::new(), Vec::new());
            if let Some(ts) = entry.created_at {
                msg = msg.with_timestamp(ts);
            }
            messages.push(msg);
        }
    }
    messages
}

/// Make `session_id` the engine's active conversation.
///
/// A failed history fetch still switches, with an empty thread.
pub async fn load_session(api: &dyn ChatApi, engine: &ChatEngine, session_id: &str) -> bool {
    let token = engine.begin_switch();
    let messages = match api.history(session_id).await {
        Ok(entries) => entries_to_messages(entries),
        Err(e) => {
            tracing::warn!("Failed to load history for {}: {}", session_id, e);
            Vec::new()
        }
    };
    let installed = engine.finish_switch(token, Some(session_id.to_string()), messages);
    if !installed {
        tracing::debug!("Selection of {} superseded by a later switch", session_id);
    }
    installed
}

#[derive(Debug, Default)]
struct BrowserState {
    open: bool,
    sessions: Vec<Session>,
}

/// The read-only "past conversations" panel.
pub struct HistoryBrowser {
    api: Arc<dyn ChatApi>,
    state: Mutex<BrowserState>,
}

impl HistoryBrowser {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            state: Mutex::new(BrowserState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    /// Open the panel and refresh its list. Failures show as an empty list.
    pub async fn open(&self) -> Vec<Session> {
        self.state().open = true;
        let sessions = match self.api.list_conversations().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!("Failed to list conversations: {}", e);
                Vec::new()
            }
        };
        self.state().sessions = sessions.clone();
        sessions
    }

    pub fn close(&self) {
        self.state().open = false;
    }

    /// Session id for a 1-based position in the last listing.
    pub fn session_at(&self, position: usize) -> Option<String> {
        position
            .checked_sub(1)
            .and_then(|i| self.state().sessions.get(i).map(|s| s.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::engine::tests::FakeApi;
    use crate::services::i18n::{Language, Locale};

    #[test]
    fn test_entries_expand_in_order() {
        let entries: Vec<HistoryEntry> = serde_json::from_str(
            r#"[{"message":"Hi","response":"Hello!"},{"response":"Orphan reply"},{"message":""}]"#,
        )
        .unwrap();
        let messages = entries_to_messages(entries);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
        assert_eq!(messages[2].content, "Orphan reply");
    }

    #[tokio::test]
    async fn test_select_replaces_engine_thread() {
        let api = Arc::new(
            FakeApi::default()
                .reply(r#"{"session_id":"s1","response":"first thread"}"#)
                .with_history("s2", r#"[{"message":"Hi","response":"Hello!"}]"#),
        );
        let engine = ChatEngine::new(api.clone(), Locale::new(Language::En));
        engine.send("something").await;

        assert!(load_session(api.as_ref(), &engine, "s2").await);

        let messages = engine.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello!");
        assert_eq!(engine.session_id().as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn test_select_with_failed_history_switches_to_empty_thread() {
        let api = Arc::new(FakeApi::default());
        let engine = ChatEngine::new(api.clone(), Locale::new(Language::En));

        load_session(api.as_ref(), &engine, "missing").await;

        assert_eq!(engine.session_id().as_deref(), Some("missing"));
        assert!(engine.messages().is_empty());
    }

    #[tokio::test]
    async fn test_browser_open_lists_and_failure_is_empty() {
        let api = Arc::new(
            FakeApi::default().with_conversations(r#"[{"session_id":"a"},{"session_id":"b"}]"#),
        );
        let browser = HistoryBrowser::new(api);
        let sessions = browser.open().await;
        assert!(browser.is_open());
        assert_eq!(sessions.len(), 2);
        assert_eq!(browser.session_at(2).as_deref(), Some("b"));
        assert_eq!(browser.session_at(0), None);
        browser.close();
        assert!(!browser.is_open());

        let offline = HistoryBrowser::new(Arc::new(FakeApi::default()));
        assert!(offline.open().await.is_empty());
    }
}
