use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::database::ClientStore;
use super::i18n::Language;

const SETTINGS_KEY: &str = "app_settings";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub language: Language,
}

pub struct SettingsService;

impl SettingsService {
    pub async fn load(store: &dyn ClientStore) -> AppSettings {
        match store.get(SETTINGS_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Stored settings unreadable, using defaults: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to load settings: {:#}", e);
                AppSettings::default()
            }
        }
    }

    pub async fn save(store: &dyn ClientStore, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        store.set(SETTINGS_KEY, &json).await
    }
}
