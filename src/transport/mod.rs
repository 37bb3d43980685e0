//! Transport - pub/sub session management
//!
//! The MQTT driver owns the network connection and reports what happens as
//! `TransportEvent`s on the dispatcher inbox. The `SessionController` turns
//! those events into session state and decides when to (re)subscribe.

pub mod backoff;
pub mod mqtt;
pub mod session;
pub mod tls;

pub use backoff::ReconnectBackoff;
pub use mqtt::{MqttDriver, MqttLink, MqttSettings};
pub use session::{InboundMessage, SessionController, SessionState};

use async_trait::async_trait;

use crate::error::TransportError;

/// Delivery assurance level for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Something the transport observed, delivered in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection attempt is starting
    Connecting,
    /// The broker accepted the handshake
    Connected,
    /// The connection was lost or the attempt failed
    Disconnected(TransportError),
    /// A message arrived on a subscribed topic
    Message { topic: String, payload: Vec<u8> },
}

/// Commands the session controller issues to the transport
#[async_trait]
pub trait TransportLink: Send + Sync {
    /// Queue a subscription; must not wait on the network
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), TransportError>;

    /// Close the session and stop reconnecting
    async fn disconnect(&self) -> Result<(), TransportError>;
}
