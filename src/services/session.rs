use std::sync::Arc;

use super::database::ClientStore;
use super::directory::ConversationDirectory;
use super::engine::ChatEngine;
use super::history::{self, HistoryBrowser};
use super::i18n::Locale;
use super::purchase::{HandoffOutcome, Navigator, PurchaseHandoff};
use crate::api::ChatApi;

/// The chat surface: the active thread plus the panels that switch it.
pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    pub engine: ChatEngine,
    pub directory: ConversationDirectory,
    pub history: HistoryBrowser,
    pub purchase: PurchaseHandoff,
}

impl ChatSession {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: Arc<dyn ClientStore>,
        navigator: Arc<dyn Navigator>,
        locale: Locale,
    ) -> Self {
        Self {
            engine: ChatEngine::new(api.clone(), locale),
            directory: ConversationDirectory::new(api.clone()),
            history: HistoryBrowser::new(api.clone()),
            purchase: PurchaseHandoff::new(store, navigator),
            api,
        }
    }

    /// Empty thread, no active conversation, all panels closed.
    pub fn start_new(&self) {
        self.engine.start_new();
        self.directory.cancel_rename();
        self.history.close();
    }

    /// Switch to an existing conversation picked from either panel.
    pub async fn select(&self, session_id: &str) -> bool {
        let installed = history::load_session(self.api.as_ref(), &self.engine, session_id).await;
        self.history.close();
        self.directory.cancel_rename();
        installed
    }

    /// Buy affordance on the message with local id `message_id`.
    pub async fn buy_from(&self, message_id: &str) -> HandoffOutcome {
        match self.engine.message(message_id) {
            Some(message) => self.purchase.invoke(&message).await,
            None => HandoffOutcome::NoAffordance,
        }
    }

    /// Buy affordance on the newest message that offers one.
    pub async fn buy_latest(&self) -> HandoffOutcome {
        let offer = self
            .engine
            .messages()
            .into_iter()
            .rev()
            .find(PurchaseHandoff::offers_purchase);
        match offer {
            Some(message) => self.purchase.invoke(&message).await,
            None => HandoffOutcome::NoAffordance,
        }
    }
}
