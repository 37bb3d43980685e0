//! mqtt-notify - MQTT to desktop notification bridge
//!
//! Subscribes to a topic, decodes each message as a notification request and
//! shows it on the desktop. Requests carrying a `tag` update the notification
//! previously shown for that tag instead of stacking a new one.

pub mod config;
pub mod credentials;
pub mod daemon;
pub mod decoder;
pub mod display;
pub mod domain;
pub mod error;
pub mod registry;
pub mod transport;

pub use error::{BridgeError, Result};
