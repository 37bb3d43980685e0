//! Credentials - the pre-start password gate
//!
//! The bridge cannot connect without the broker password, and the keyring that
//! holds it may still be locked at login. `CredentialGate` polls a
//! `CredentialStore` at a fixed interval until a password shows up, the
//! optional attempt budget runs out, or shutdown is requested.

pub mod keyring;

pub use keyring::SecretServiceStore;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};

use crate::config::CredentialConfig;
use crate::error::CredentialError;

/// Lookup of the broker password for a user on a host
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when no secret is stored (yet)
    async fn lookup(&self, user: &str, host: &str) -> Result<Option<String>, CredentialError>;
}

/// Retry-with-interval routine run before the transport starts
#[derive(Debug, Clone)]
pub struct CredentialGate {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl CredentialGate {
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self { interval, max_attempts }
    }

    pub fn from_config(config: &CredentialConfig) -> Self {
        Self::new(config.poll_interval(), config.max_attempts)
    }

    /// Poll `store` until it yields a password
    ///
    /// Backend failures are retried like a missing secret. Resolving
    /// `cancel` ends the wait with `CredentialError::Cancelled`.
    pub async fn wait<S, F>(&self, store: &S, user: &str, host: &str, cancel: F) -> Result<String, CredentialError>
    where
        S: CredentialStore + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let lookup = tokio::select! {
                biased;
                _ = &mut cancel => return Err(CredentialError::Cancelled),
                result = store.lookup(user, host) => result,
            };

            match lookup {
                Ok(Some(password)) => {
                    info!("Credential for {}@{} found after {} attempt(s)", user, host, attempts);
                    return Ok(password);
                }
                Ok(None) if attempts == 1 => {
                    info!(
                        "No credential stored for {}@{}, polling every {:?}",
                        user, host, self.interval
                    );
                }
                Ok(None) => {}
                Err(e) => warn!("Credential lookup failed (attempt {}): {}", attempts, e),
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(CredentialError::Exhausted { attempts });
            }

            tokio::select! {
                biased;
                _ = &mut cancel => return Err(CredentialError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
