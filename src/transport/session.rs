//! Session controller - connection state machine
//!
//! Disconnected -> Connecting -> Connected -> Disconnected ... until an
//! explicit shutdown moves it to the terminal Shutdown state. Every successful
//! handshake re-issues the subscription, so a broker that forgot the session
//! keeps delivering after a reconnect.

use log::{error, info, warn};

use super::{Qos, TransportEvent, TransportLink};
use crate::error::TransportError;

/// Connection state of the pub/sub session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal; no further reconnects or message delivery
    Shutdown,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Shutdown)
    }
}

/// A message the session accepted for decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Tracks session state and drives subscriptions over a `TransportLink`
pub struct SessionController<L: TransportLink> {
    link: L,
    topic: String,
    qos: Qos,
    state: SessionState,
    /// Subscribe calls issued, one per successful handshake
    pub subscriptions: u64,
    /// Handshakes after the first one
    pub reconnects: u64,
}

impl<L: TransportLink> SessionController<L> {
    /// Subscribe to `topic` with the highest delivery assurance
    pub fn new(link: L, topic: impl Into<String>) -> Self {
        Self {
            link,
            topic: topic.into(),
            qos: Qos::ExactlyOnce,
            state: SessionState::Disconnected,
            subscriptions: 0,
            reconnects: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Apply one transport event; returns a message to forward, if any
    pub fn on_event(&mut self, event: TransportEvent) -> Option<InboundMessage> {
        if self.state.is_terminal() {
            return None;
        }

        match event {
            TransportEvent::Connecting => {
                self.state = SessionState::Connecting;
                None
            }
            TransportEvent::Connected => {
                if self.subscriptions > 0 {
                    self.reconnects += 1;
                    info!("Reconnected, renewing subscription to '{}'", self.topic);
                } else {
                    info!("Connected, subscribing to '{}'", self.topic);
                }
                self.state = SessionState::Connected;
                self.subscriptions += 1;
                if let Err(e) = self.link.subscribe(&self.topic, self.qos) {
                    error!("Failed to subscribe to '{}': {}", self.topic, e);
                }
                None
            }
            TransportEvent::Disconnected(reason) => {
                if self.state == SessionState::Connected {
                    warn!("Disconnected: {}", reason);
                } else {
                    warn!("Connection attempt failed: {}", reason);
                }
                self.state = SessionState::Disconnected;
                None
            }
            TransportEvent::Message { topic, payload } => {
                if self.state == SessionState::Connected {
                    Some(InboundMessage { topic, payload })
                } else {
                    warn!("Dropping message on '{}' received while {:?}", topic, self.state);
                    None
                }
            }
        }
    }

    /// Enter the terminal state and ask the transport to disconnect
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.state = SessionState::Shutdown;
        info!("Session shutting down");
        self.link.disconnect().await
    }
}
