//! Error types for mqtt-notify
//!
//! Centralized error handling using thiserror. Per-message failures
//! (`DecodeError`, `DisplayError`) are logged and dropped by the dispatcher;
//! only configuration errors are fatal at startup.

use thiserror::Error;

/// Reasons a payload cannot become a notification request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload bytes are not UTF-8
    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,

    /// Payload is not a JSON document
    #[error("Payload is not valid JSON: {0}")]
    Malformed(String),

    /// Payload parsed but is not a key-value object
    #[error("Payload is not a JSON object")]
    NotAnObject,

    /// `message` absent, null or empty
    #[error("Payload has no message")]
    MissingMessage,

    /// A recognized field has the wrong type
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// `urgency` is outside the known levels
    #[error("Unknown urgency: {0}")]
    UnknownUrgency(String),
}

/// Failures of the notification display surface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    /// Notification server could not be reached
    #[error("Display surface unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the pub/sub transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection lost or handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A request (subscribe, disconnect) could not be queued
    #[error("Request error: {0}")]
    Request(String),

    /// TLS connector could not be built
    #[error("TLS error: {0}")]
    Tls(String),
}

/// Outcomes of the credential gate other than a password
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Shutdown was requested while waiting
    #[error("Credential lookup cancelled")]
    Cancelled,

    /// A bounded gate ran out of attempts
    #[error("No credential after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The secret store itself failed
    #[error("Credential backend error: {0}")]
    Backend(String),
}

/// All error types that can occur in mqtt-notify
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mqtt-notify operations
pub type Result<T> = std::result::Result<T, BridgeError>;
