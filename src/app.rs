use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::HttpChatApi;
use crate::config::{ClientConfig, CredentialSource, APP_NAME};
use crate::models::{Message, PendingPurchase, Role, Session};
use crate::services::engine::SendOutcome;
use crate::services::interpreter;
use crate::services::markdown::to_terminal_text;
use crate::services::purchase::{HandoffOutcome, Navigator, PurchaseHandoff, Route};
use crate::services::{
    AppSettings, ChatSession, CredentialProvider, Database, KeyringCredential, Language, Locale,
    SettingsService, StaticCredential, StoredCredential,
};

const KEYRING_TOKEN_REF: &str = "bearer-token";
const SHORT_ID_LEN: usize = 8;

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum AppMsg {
    Send(String),
    NewChat,
    ShowHistory,
    ListConversations,
    Open(String),
    Rename(String, String),
    /// Optional prefix of a message's local id; the newest offer otherwise.
    Buy(Option<String>),
    ShowPending,
    SetLanguage(String),
    Help,
    Quit,
    Unknown(String),
}

/// Results of background work, delivered back to the input loop.
#[derive(Debug)]
pub enum AppCmd {
    SendFinished(SendOutcome),
}

impl AppMsg {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(AppMsg::Send(line.to_string()));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let msg = match name {
            "new" => AppMsg::NewChat,
            "history" => AppMsg::ShowHistory,
            "list" => AppMsg::ListConversations,
            "open" if !rest.is_empty() => AppMsg::Open(rest.to_string()),
            "rename" if !rest.is_empty() => {
                let (target, title) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                AppMsg::Rename(target.to_string(), title.trim().to_string())
            }
            "buy" => AppMsg::Buy((!rest.is_empty()).then(|| rest.to_string())),
            "pending" => AppMsg::ShowPending,
            "lang" if !rest.is_empty() => AppMsg::SetLanguage(rest.to_string()),
            "help" => AppMsg::Help,
            "quit" | "exit" => AppMsg::Quit,
            _ => AppMsg::Unknown(line.to_string()),
        };
        Some(msg)
    }
}

/// Prints hand-offs instead of switching screens.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route, state: Option<PendingPurchase>) {
        match (route, state) {
            (Route::Checkout, Some(purchase)) => {
                let name = purchase
                    .program
                    .name_en
                    .as_deref()
                    .or(purchase.program.name_ar.as_deref())
                    .unwrap_or("plan");
                println!(
                    "-> checkout: {} (#{}) at {:.2}",
                    name, purchase.program.id, purchase.program.price
                );
            }
            (Route::Checkout, None) => println!("-> checkout"),
            (Route::PlanSelection, _) => println!("-> choose a plan"),
        }
    }
}

pub struct App {
    session: Arc<ChatSession>,
    db: Arc<Database>,
    locale: Locale,
    settings: AppSettings,
}

impl App {
    pub async fn init(config: ClientConfig) -> Result<Self> {
        tracing::info!("Starting {} against {}", APP_NAME, config.api_url);
        let db = Arc::new(
            Database::open(&config.database_path()).context("Failed to open client storage")?,
        );

        let mut settings = SettingsService::load(db.as_ref()).await;
        if let Some(language) = config.language {
            settings.language = language;
        }
        let locale = Locale::new(settings.language);

        let credentials: Arc<dyn CredentialProvider> = match (&config.token, config.credential_source) {
            (Some(token), _) => Arc::new(StaticCredential::new(token.clone())),
            (None, CredentialSource::Store) => Arc::new(StoredCredential::new(db.clone())),
            (None, CredentialSource::Keyring) => {
                Arc::new(KeyringCredential::new(KEYRING_TOKEN_REF).await?)
            }
        };

        let api = HttpChatApi::new(&config.api_url, credentials)?;
        let session = ChatSession::new(
            Arc::new(api),
            db.clone(),
            Arc::new(TerminalNavigator),
            locale.clone(),
        );

        Ok(Self {
            session: Arc::new(session),
            db,
            locale,
            settings,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        println!("{}: type /help for commands", APP_NAME);

        self.session.engine.load_active().await;
        self.print_thread();

        let (tx, mut rx) = mpsc::channel::<AppCmd>(16);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let Some(msg) = AppMsg::parse(&line) else { continue };
                    if msg == AppMsg::Quit {
                        break;
                    }
                    self.update(msg, &tx).await;
                }
                Some(cmd) = rx.recv() => self.update_cmd(cmd),
            }
        }
        Ok(())
    }

    async fn update(&mut self, msg: AppMsg, tx: &mpsc::Sender<AppCmd>) {
        match msg {
            AppMsg::Send(text) => {
                if self.session.engine.is_sending() {
                    println!("(still waiting for the previous reply)");
                    return;
                }
                let session = self.session.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let outcome = session.engine.send(&text).await;
                    if tx.send(AppCmd::SendFinished(outcome)).await.is_err() {
                        tracing::debug!("Input loop gone before send finished");
                    }
                });
            }
            AppMsg::NewChat => {
                self.session.start_new();
                println!("{}", self.locale.strings().new_conversation);
            }
            AppMsg::ShowHistory => {
                let sessions = self.session.history.open().await;
                self.print_sessions(&sessions);
            }
            AppMsg::ListConversations => match self.session.directory.list().await {
                Ok(sessions) => self.print_sessions(&sessions),
                Err(e) => println!("Could not load conversations: {}", e),
            },
            AppMsg::Open(target) => {
                let session_id = self.resolve_session(&target);
                if self.session.select(&session_id).await {
                    self.print_thread();
                }
            }
            AppMsg::Rename(target, title) => {
                let session_id = self.resolve_session(&target);
                self.session.directory.begin_rename(&session_id);
                match self.session.directory.rename(&session_id, &title).await {
                    Ok(()) => self.print_sessions(&self.session.directory.entries()),
                    Err(e) => {
                        let pending = self.session.directory.renaming().unwrap_or(session_id);
                        println!("Rename of {} failed: {}", pending, e);
                    }
                }
            }
            AppMsg::Buy(target) => {
                let outcome = match target {
                    Some(prefix) => {
                        match find_message_id(&self.session.engine.messages(), &prefix) {
                            Some(id) => self.session.buy_from(&id).await,
                            None => HandoffOutcome::NoAffordance,
                        }
                    }
                    None => self.session.buy_latest().await,
                };
                if outcome == HandoffOutcome::NoAffordance {
                    println!("Nothing to buy there.");
                }
            }
            AppMsg::ShowPending => match self.session.purchase.load_pending().await {
                Some(purchase) => println!(
                    "Pending: plan #{} at {:.2} with {} add-ons",
                    purchase.program.id,
                    purchase.program.price,
                    purchase.packages.len()
                ),
                None => println!("No pending purchase."),
            },
            AppMsg::SetLanguage(code) => match Language::from_code(&code) {
                Some(language) => {
                    self.locale.set(language);
                    self.settings.language = language;
                    println!("Language: {}", language.code());
                    if let Err(e) = SettingsService::save(self.db.as_ref(), &self.settings).await {
                        tracing::error!("Failed to save settings: {:#}", e);
                    }
                    self.print_thread();
                }
                None => println!("Unknown language: {}", code),
            },
            AppMsg::Help => print_help(),
            AppMsg::Unknown(line) => println!("Unknown command: {}", line),
            AppMsg::Quit => {}
        }
    }

    fn update_cmd(&mut self, cmd: AppCmd) {
        match cmd {
            AppCmd::SendFinished(SendOutcome::Replied | SendOutcome::Failed) => {
                if let Some(message) = self.session.engine.last_message() {
                    println!("{}", render_message(&message, self.locale.language()));
                }
            }
            AppCmd::SendFinished(outcome) => {
                tracing::debug!("Send finished without a reply to show: {:?}", outcome);
            }
        }
    }

    /// A 1-based position in the open history panel, or else the rename
    /// listing. Anything else is taken as a raw id.
    fn resolve_session(&self, target: &str) -> String {
        let Ok(position) = target.parse::<usize>() else {
            return target.to_string();
        };
        let found = if self.session.history.is_open() {
            self.session.history.session_at(position)
        } else {
            self.session.directory.session_at(position)
        };
        found.unwrap_or_else(|| target.to_string())
    }

    fn print_sessions(&self, sessions: &[Session]) {
        if sessions.is_empty() {
            println!("{}", self.locale.strings().no_conversations);
            return;
        }
        for (i, session) in sessions.iter().enumerate() {
            let title = session
                .display_title()
                .unwrap_or(self.locale.strings().new_conversation);
            let when = session
                .last_activity_at
                .map(|t| t.format(" (%Y-%m-%d %H:%M)").to_string())
                .unwrap_or_default();
            println!("{:>3}. {}{}", i + 1, title, when);
        }
    }

    fn print_thread(&self) {
        let language = self.locale.language();
        for message in self.session.engine.messages() {
            println!("{}", render_message(&message, language));
        }
    }
}

fn render_message(message: &Message, language: Language) -> String {
    let mut out = match message.role {
        Role::User => format!("you> {}", message.content),
        Role::Assistant if message.is_error => format!("coach> ! {}", message.content),
        Role::Assistant => format!("coach> {}", to_terminal_text(&message.content)),
    };
    for error in &message.errors {
        out.push_str(&format!("\n  ! {}", error));
    }
    for result in &message.results {
        out.push('\n');
        out.push_str(interpreter::render(result, language).to_string().trim_end());
    }
    if PurchaseHandoff::offers_purchase(message) {
        out.push_str(&format!(
            "\n  (type /buy {} to purchase)",
            short_id(&message.id)
        ));
    }
    out
}

/// Leading part of a local message id, enough to address it in `/buy`.
fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Full id of the unique message whose id starts with `prefix`.
fn find_message_id(messages: &[Message], prefix: &str) -> Option<String> {
    let mut matches = messages.iter().filter(|m| m.id.starts_with(prefix));
    let found = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(found.id.clone())
}

fn print_help() {
    println!(
        "Type a message to chat.\n\
         /new                 start a new conversation\n\
         /history             browse past conversations\n\
         /list                list conversations for renaming\n\
         /open <n|id>         switch to a conversation\n\
         /rename <n|id> <t>   rename a conversation\n\
         /buy [id]            buy the plan a coach message suggested\n\
         /pending             show the pending purchase\n\
         /lang <en|ar>        change display language\n\
         /quit                exit"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionResult;

    #[test]
    fn test_parse_plain_text_is_send() {
        assert_eq!(
            AppMsg::parse("  Create a workout plan for me "),
            Some(AppMsg::Send("Create a workout plan for me".to_string()))
        );
        assert_eq!(AppMsg::parse("   "), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(AppMsg::parse("/new"), Some(AppMsg::NewChat));
        assert_eq!(AppMsg::parse("/open 2"), Some(AppMsg::Open("2".to_string())));
        assert_eq!(
            AppMsg::parse("/rename abc Leg day"),
            Some(AppMsg::Rename("abc".to_string(), "Leg day".to_string()))
        );
        assert_eq!(
            AppMsg::parse("/rename abc"),
            Some(AppMsg::Rename("abc".to_string(), String::new()))
        );
        assert_eq!(AppMsg::parse("/lang ar"), Some(AppMsg::SetLanguage("ar".to_string())));
        assert_eq!(AppMsg::parse("/open"), Some(AppMsg::Unknown("/open".to_string())));
        assert_eq!(AppMsg::parse("/exit"), Some(AppMsg::Quit));
        assert_eq!(AppMsg::parse("/buy"), Some(AppMsg::Buy(None)));
        assert_eq!(
            AppMsg::parse("/buy 1a2b3c4d"),
            Some(AppMsg::Buy(Some("1a2b3c4d".to_string())))
        );
    }

    #[test]
    fn test_render_message_includes_fragments_and_offer() {
        let message = Message::assistant(
            "**Basic** suits you. Buy now",
            vec![ActionResult {
                action: "suggest_programs".to_string(),
                status: "ok".to_string(),
                data: serde_json::json!({"plans": [{"id": 7, "name_en": "Basic"}]}),
                error: None,
            }],
            vec!["calendar unavailable".to_string()],
        );
        let text = render_message(&message, Language::En);
        assert!(text.starts_with("coach> Basic suits you."));
        assert!(text.contains("! calendar unavailable"));
        assert!(text.contains("Suggested plans"));
        assert!(text.contains("1. Basic"));
        assert!(text.contains(&format!("/buy {}", short_id(&message.id))));
        assert_eq!(
            find_message_id(std::slice::from_ref(&message), short_id(&message.id)),
            Some(message.id.clone())
        );
    }

    #[test]
    fn test_find_message_id_needs_unique_prefix() {
        let messages: Vec<Message> = ["abc-1", "abc-2"]
            .into_iter()
            .map(|id| Message {
                id: id.to_string(),
                ..Message::user("hi")
            })
            .collect();
        assert_eq!(find_message_id(&messages, "abc-2"), Some("abc-2".to_string()));
        assert_eq!(find_message_id(&messages, "abc"), None);
        assert_eq!(find_message_id(&messages, "zzz"), None);
    }

    #[test]
    fn test_render_local_error() {
        let message = Message::local_error("Sorry");
        assert_eq!(render_message(&message, Language::En), "coach> ! Sorry");
    }
}
