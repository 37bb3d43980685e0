//! Freedesktop Secret Service backend.
//!
//! Secrets are matched on the attributes `user`, `service` and `host`, the
//! layout produced by:
//!
//! ```text
//! secret-tool store --label="mqtts://example.com" user myuser service mqtt host example.com
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use secret_service::{EncryptionType, SecretService};

use super::CredentialStore;
use crate::error::CredentialError;

/// Looks up broker passwords in the session keyring
#[derive(Debug, Clone)]
pub struct SecretServiceStore {
    service: String,
}

impl SecretServiceStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn attributes<'a>(&'a self, user: &'a str, host: &'a str) -> HashMap<&'a str, &'a str> {
        HashMap::from([("user", user), ("service", self.service.as_str()), ("host", host)])
    }
}

#[async_trait]
impl CredentialStore for SecretServiceStore {
    async fn lookup(&self, user: &str, host: &str) -> Result<Option<String>, CredentialError> {
        let service = SecretService::connect(EncryptionType::Dh).await.map_err(backend)?;
        let found = service.search_items(self.attributes(user, host)).await.map_err(backend)?;

        let item = if let Some(item) = found.unlocked.first() {
            item
        } else if let Some(item) = found.locked.first() {
            debug!("Unlocking stored credential for {}@{}", user, host);
            item.unlock().await.map_err(backend)?;
            item
        } else {
            return Ok(None);
        };

        let secret = item.get_secret().await.map_err(backend)?;
        String::from_utf8(secret)
            .map(Some)
            .map_err(|_| CredentialError::Backend("stored secret is not UTF-8".to_string()))
    }
}

fn backend(e: secret_service::Error) -> CredentialError {
    CredentialError::Backend(e.to_string())
}
