//! Domain types shared by the decoder, registry and dispatcher.

pub mod inbound;
pub mod request;

pub use inbound::BridgeEvent;
pub use request::{Expiry, NotificationRequest, Urgency};
