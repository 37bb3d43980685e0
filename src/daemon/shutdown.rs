//! Shutdown requests from the operator.
//!
//! `Shutdown` is a cloneable latch: once tripped (SIGINT, SIGTERM, or a
//! manual trigger) every clone's `wait()` resolves, so the credential gate and
//! the dispatcher loop can both observe the same request.

use log::{error, info};
use tokio::sync::watch;

/// Observable shutdown latch
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Trips a `Shutdown` by hand
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// A latch tripped only by the returned trigger
    pub fn manual() -> (ShutdownTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Self { rx })
    }

    /// A latch tripped by SIGINT or SIGTERM; must be called inside a runtime
    pub fn listen() -> Self {
        let (trigger, shutdown) = Self::manual();
        tokio::spawn(async move {
            wait_for_signal().await;
            trigger.trigger();
        });
        shutdown
    }

    /// Resolve once shutdown is requested; never resolves if the trigger is dropped unused
    pub async fn wait(mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

async fn wait_for_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    futures::pin_mut!(interrupt, terminate);
    futures::future::select(interrupt, terminate).await;
    info!("Shutdown signal received");
}
