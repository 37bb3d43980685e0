//! Dispatch statistics - what the loop did between start and shutdown

use crate::registry::HandleOutcome;

/// Counters accumulated by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages forwarded by the session
    pub received: u64,
    /// Messages the decoder rejected
    pub rejected: u64,
    /// Untagged notifications shown
    pub shown: u64,
    /// Tagged notifications created
    pub created: u64,
    /// Tagged notifications updated in place
    pub updated: u64,
    /// Tagged notifications the server re-created under a new handle
    pub replaced: u64,
    /// Display surface calls that failed
    pub display_failures: u64,
    /// Closures that released a tag
    pub dismissed: u64,
    /// Handshakes after the first one
    pub reconnects: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful registry operation
    pub fn record(&mut self, outcome: &HandleOutcome) {
        match outcome {
            HandleOutcome::Shown(_) => self.shown += 1,
            HandleOutcome::Created(_) => self.created += 1,
            HandleOutcome::Updated(_) => self.updated += 1,
            HandleOutcome::Replaced { .. } => self.replaced += 1,
        }
    }

    /// Notifications the surface displayed or refreshed
    pub fn displayed(&self) -> u64 {
        self.shown + self.created + self.updated + self.replaced
    }
}
