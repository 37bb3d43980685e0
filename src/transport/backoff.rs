//! Reconnect backoff for the transport driver.
//!
//! Each consecutive failed connection attempt doubles the wait, capped at the
//! configured maximum. A successful handshake resets the sequence.

use std::time::{Duration, Instant};

use crate::config::ReconnectConfig;

/// Exponential backoff state between connection attempts
#[derive(Debug)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    /// Failures since the last successful handshake
    consecutive_failures: u32,
    /// When the last handshake succeeded
    last_connected: Option<Instant>,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            consecutive_failures: 0,
            last_connected: None,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_secs(config.initial_backoff_secs),
            Duration::from_secs(config.max_backoff_secs),
        )
    }

    /// Record a failed attempt and return how long to wait before the next one
    ///
    /// initial * 2^(failures - 1), capped at max.
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let exponent = (self.consecutive_failures - 1).min(16);
        self.initial.saturating_mul(1u32 << exponent).min(self.max)
    }

    /// Record a successful handshake
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_connected = Some(Instant::now());
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Time since the last successful handshake
    pub fn time_since_connected(&self) -> Option<Duration> {
        self.last_connected.map(|t| t.elapsed())
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}
