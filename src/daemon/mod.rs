//! Daemon core - credential gate, transport and dispatcher wiring
//!
//! The bridge is a long-running process that:
//! - Waits for the broker password before touching the network
//! - Runs the MQTT driver as its own task
//! - Serializes every state change through the dispatcher loop
//! - Drains cleanly on SIGINT/SIGTERM

pub mod dispatcher;
pub mod shutdown;
pub mod stats;

pub use dispatcher::Dispatcher;
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use stats::DispatchStats;

use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::credentials::{CredentialGate, CredentialStore};
use crate::display::DesktopSurface;
use crate::error::{CredentialError, Result};
use crate::registry::NotificationRegistry;
use crate::transport::{ReconnectBackoff, SessionController, mqtt};

/// How long the MQTT driver gets to flush DISCONNECT after the loop exits
const DRIVER_GRACE: Duration = Duration::from_secs(3);

/// Run the bridge until shutdown
///
/// A shutdown while still waiting for the credential is a clean exit with
/// empty statistics.
pub async fn run_bridge<C>(config: &Config, store: &C, shutdown: Shutdown) -> Result<DispatchStats>
where
    C: CredentialStore + ?Sized,
{
    let gate = CredentialGate::from_config(&config.credential);
    let password = match gate
        .wait(store, &config.user, &config.broker, shutdown.clone().wait())
        .await
    {
        Ok(password) => password,
        Err(CredentialError::Cancelled) => {
            info!("Shutdown before a credential was available");
            return Ok(DispatchStats::default());
        }
        Err(e) => return Err(e.into()),
    };

    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let mut surface = DesktopSurface::new(config.app_name.clone());
    surface.watch_closures(inbox_tx.clone());

    let settings = mqtt::MqttSettings::from_config(config, password);
    let backoff = ReconnectBackoff::from_config(&config.reconnect);
    let (link, driver) = mqtt::connect(&settings, inbox_tx, backoff)?;
    let mut driver_task = driver.spawn();

    let session = SessionController::new(link, config.topic.clone());
    let registry = NotificationRegistry::new(config.icon.clone());
    let stats = Dispatcher::new(registry, surface, session)
        .run(inbox_rx, shutdown.wait())
        .await;

    if tokio::time::timeout(DRIVER_GRACE, &mut driver_task).await.is_err() {
        warn!("MQTT driver did not stop within {:?}, aborting", DRIVER_GRACE);
        driver_task.abort();
    }

    info!("Bridge stopped: {:?}", stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EmptyStore;

    #[async_trait]
    impl CredentialStore for EmptyStore {
        async fn lookup(&self, _user: &str, _host: &str) -> std::result::Result<Option<String>, CredentialError> {
            Ok(None)
        }
    }

    fn config() -> Config {
        Config {
            broker: "127.0.0.1".to_string(),
            topic: "home/notify".to_string(),
            user: "alice".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_credential_wait_is_clean() {
        let (trigger, shutdown) = Shutdown::manual();
        let cfg = config();

        let run = run_bridge(&cfg, &EmptyStore, shutdown);
        let stop = async {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.trigger();
        };
        let (result, ()) = tokio::join!(run, stop);

        assert_eq!(result.unwrap(), DispatchStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_credential_is_an_error() {
        let (_trigger, shutdown) = Shutdown::manual();
        let mut cfg = config();
        cfg.credential.max_attempts = Some(2);

        let result = run_bridge(&cfg, &EmptyStore, shutdown).await;
        assert!(matches!(
            result,
            Err(crate::error::BridgeError::Credential(CredentialError::Exhausted { attempts: 2 }))
        ));
    }
}
