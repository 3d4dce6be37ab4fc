use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use oo7::Keyring;

use super::database::ClientStore;
use crate::config::APP_ID;

/// Storage key holding the bearer token written by the sign-in flow.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

const KEYRING_ATTR_APP: &str = "application";
const KEYRING_ATTR_REF: &str = "key-ref";

/// Source of the bearer credential attached to every backend call.
///
/// `Ok(None)` means nobody is signed in.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<Option<String>>;
}

/// Reads the token the sign-in flow persisted to client storage.
pub struct StoredCredential {
    store: Arc<dyn ClientStore>,
}

impl StoredCredential {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialProvider for StoredCredential {
    async fn bearer_token(&self) -> Result<Option<String>> {
        let token = self
            .store
            .get(AUTH_TOKEN_KEY)
            .await
            .context("Failed to read stored credential")?;
        Ok(token.filter(|t| !t.trim().is_empty()))
    }
}

/// Token kept in the desktop Secret Service.
#[derive(Debug, Clone)]
pub struct KeyringCredential {
    keyring: Arc<Keyring>,
    key_ref: String,
}

impl KeyringCredential {
    pub async fn new(key_ref: impl Into<String>) -> Result<Self> {
        let keyring = Keyring::new()
            .await
            .context("Failed to initialize keyring")?;
        Ok(Self {
            keyring: Arc::new(keyring),
            key_ref: key_ref.into(),
        })
    }
}

#[async_trait]
impl CredentialProvider for KeyringCredential {
    async fn bearer_token(&self) -> Result<Option<String>> {
        let attributes = vec![
            (KEYRING_ATTR_APP, APP_ID),
            (KEYRING_ATTR_REF, self.key_ref.as_str()),
        ];

        let items = self
            .keyring
            .search_items(&attributes)
            .await
            .context("Failed to search keyring")?;

        match items.first() {
            Some(item) => {
                let secret = item.secret().await.context("Failed to read secret")?;
                let token =
                    String::from_utf8(secret.to_vec()).context("Secret is not valid UTF-8")?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }
}

/// Fixed token, typically supplied through the environment.
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn bearer_token(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::Database;

    #[tokio::test]
    async fn test_stored_credential_reads_token_key() {
        let db = Arc::new(Database::new_in_memory().unwrap());
        let provider = StoredCredential::new(db.clone());
        assert_eq!(provider.bearer_token().await.unwrap(), None);

        db.set(AUTH_TOKEN_KEY, "abc123").await.unwrap();
        assert_eq!(
            provider.bearer_token().await.unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn test_blank_stored_token_means_signed_out() {
        let db = Arc::new(Database::new_in_memory().unwrap());
        db.set(AUTH_TOKEN_KEY, "  ").await.unwrap();
        let provider = StoredCredential::new(db);
        assert_eq!(provider.bearer_token().await.unwrap(), None);
    }
}
