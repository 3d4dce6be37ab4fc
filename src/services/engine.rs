use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::{ApiError, ChatApi, ChatReply, ChatRequest};
use crate::models::Message;
use crate::services::history;
use crate::services::i18n::Locale;

/// What became of one `send` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, or another send was still in flight.
    Ignored,
    /// The assistant reply was appended.
    Replied,
    /// The call failed and a local error message was appended.
    Failed,
    /// The active conversation changed while the call was in flight; the
    /// response was dropped.
    Discarded,
}

#[derive(Debug, Default)]
struct EngineState {
    session_id: Option<String>,
    messages: Vec<Message>,
    sending: bool,
    /// Bumped on every conversation switch. In-flight work compares the
    /// value it started with before touching the state.
    epoch: u64,
}

/// Owns the active conversation and runs the send/receive cycle.
///
/// The message list is append-only for a given conversation: the user's
/// message is appended before the network call and stays even if the call
/// fails, and the outcome is appended as a second message.
pub struct ChatEngine {
    api: Arc<dyn ChatApi>,
    locale: Locale,
    state: Mutex<EngineState>,
}

impl ChatEngine {
    pub fn new(api: Arc<dyn ChatApi>, locale: Locale) -> Self {
        Self {
            api,
            locale,
            state: Mutex::new(EngineState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> Option<String> {
        self.state().session_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.state().messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.state().messages.last().cloned()
    }

    pub fn is_sending(&self) -> bool {
        self.state().sending
    }

    /// Restore the most recently used conversation after sign-in.
    ///
    /// Any failure leaves the engine empty and sessionless; at first render
    /// "no history" and "history unavailable" look the same.
    pub async fn load_active(&self) {
        let token = self.begin_switch();

        let loaded = match self.fetch_latest().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("Failed to restore active conversation: {}", e);
                None
            }
        };

        let (session_id, messages) = match loaded {
            Some((id, messages)) => (Some(id), messages),
            None => (None, Vec::new()),
        };
        if !self.finish_switch(token, session_id, messages) {
            tracing::debug!("Conversation changed while restoring; dropping restored history");
        }
    }

    async fn fetch_latest(&self) -> Result<Option<(String, Vec<Message>)>, ApiError> {
        let conversations = self.api.list_conversations().await?;
        let Some(latest) = conversations.into_iter().next() else {
            return Ok(None);
        };
        let entries = self.api.history(&latest.id).await?;
        Ok(Some((latest.id, history::entries_to_messages(entries))))
    }

    /// Send `text` in the active conversation, starting a new one when none
    /// is active.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let (request, epoch) = {
            let mut state = self.state();
            if state.sending {
                tracing::debug!("Send ignored, previous message still in flight");
                return SendOutcome::Ignored;
            }
            state.messages.push(Message::user(text));
            state.sending = true;
            let request = ChatRequest {
                message: text.to_string(),
                session_id: state.session_id.clone(),
            };
            (request, state.epoch)
        };

        let result = self.api.send_message(request).await;

        let mut state = self.state();
        if state.epoch != epoch {
            tracing::debug!("Conversation changed during send; discarding response");
            return SendOutcome::Discarded;
        }

        let outcome = match result {
            Ok(reply) => {
                if let Some(session_id) = reply.session_id() {
                    state.session_id = Some(session_id);
                }
                state.messages.push(reply_to_message(reply));
                SendOutcome::Replied
            }
            Err(e) => {
                tracing::warn!("Chat request failed: {}", e);
                state
                    .messages
                    .push(Message::local_error(self.locale.strings().send_failed));
                SendOutcome::Failed
            }
        };
        state.sending = false;
        outcome
    }

    /// Forget the active conversation locally. The next send creates a new
    /// one on the server.
    pub fn start_new(&self) {
        let mut state = self.state();
        state.epoch += 1;
        state.session_id = None;
        state.messages.clear();
        state.sending = false;
    }

    /// Mark the start of a conversation switch. Responses to sends issued
    /// before this point are dropped from here on.
    pub(crate) fn begin_switch(&self) -> u64 {
        let mut state = self.state();
        state.epoch += 1;
        state.sending = false;
        state.epoch
    }

    /// Install a freshly loaded conversation unless another switch started
    /// after `token` was taken. Returns whether it was installed.
    pub(crate) fn finish_switch(
        &self,
        token: u64,
        session_id: Option<String>,
        messages: Vec<Message>,
    ) -> bool {
        let mut state = self.state();
        if state.epoch != token {
            return false;
        }
        state.epoch += 1;
        state.session_id = session_id;
        state.messages = messages;
        state.sending = false;
        true
    }
}

fn reply_to_message(reply: ChatReply) -> Message {
    Message::assistant(reply.text(), reply.action_results(), reply.error_messages())
}
