use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::services::Language;

pub const APP_ID: &str = "com.coach.Chat";
pub const APP_NAME: &str = "Coach Chat";

const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Token written to client storage by the sign-in flow.
    Store,
    Keyring,
}

#[derive(Clone)]
pub struct ClientConfig {
    pub api_url: String,
    /// Overrides the stored language preference when set.
    pub language: Option<Language>,
    pub data_dir: PathBuf,
    pub token: Option<String>,
    pub credential_source: CredentialSource,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("language", &self.language)
            .field("data_dir", &self.data_dir)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("credential_source", &self.credential_source)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let language = match get("COACH_LANG") {
            Some(code) => match Language::from_code(&code) {
                Some(lang) => Some(lang),
                None => bail!("Unsupported COACH_LANG value: {}", code),
            },
            None => None,
        };

        let credential_source = match get("COACH_CREDENTIALS").as_deref() {
            None | Some("store") => CredentialSource::Store,
            Some("keyring") => CredentialSource::Keyring,
            Some(other) => bail!("Unsupported COACH_CREDENTIALS value: {}", other),
        };

        let data_dir = match get("COACH_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let base = match get("XDG_DATA_HOME") {
                    Some(dir) => PathBuf::from(dir),
                    None => PathBuf::from(get("HOME").context("HOME not set")?)
                        .join(".local/share"),
                };
                base.join("coach-chat")
            }
        };

        Ok(Self {
            api_url: get("COACH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            language,
            data_dir,
            token: get("COACH_TOKEN"),
            credential_source,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("coach-chat.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ClientConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("HOME", "/home/u")]).unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.language, None);
        assert_eq!(cfg.credential_source, CredentialSource::Store);
        assert_eq!(
            cfg.database_path(),
            PathBuf::from("/home/u/.local/share/coach-chat/coach-chat.db")
        );
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("COACH_API_URL", "https://api.coach.example"),
            ("COACH_LANG", "ar"),
            ("COACH_DATA_DIR", "/tmp/coach"),
            ("COACH_TOKEN", "secret"),
            ("COACH_CREDENTIALS", "keyring"),
        ])
        .unwrap();
        assert_eq!(cfg.api_url, "https://api.coach.example");
        assert_eq!(cfg.language, Some(Language::Ar));
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/coach"));
        assert_eq!(cfg.token.as_deref(), Some("secret"));
        assert_eq!(cfg.credential_source, CredentialSource::Keyring);
        assert!(!format!("{:?}", cfg).contains("secret"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config(&[("HOME", "/h"), ("COACH_LANG", "klingon")]).is_err());
        assert!(config(&[("HOME", "/h"), ("COACH_CREDENTIALS", "vault")]).is_err());
        assert!(config(&[]).is_err());
    }
}
