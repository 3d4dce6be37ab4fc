pub mod credentials;
pub mod database;
pub mod directory;
pub mod engine;
pub mod history;
pub mod i18n;
pub mod interpreter;
pub mod markdown;
pub mod purchase;
pub mod session;
pub mod settings;

pub use credentials::{CredentialProvider, KeyringCredential, StaticCredential, StoredCredential};
pub use database::{ClientStore, Database};
pub use i18n::{Language, Locale};
pub use session::ChatSession;
pub use settings::{AppSettings, SettingsService};
