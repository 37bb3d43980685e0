//! Display surface - where notifications become visible
//!
//! The surface owns every displayed notification. Callers only hold a
//! `NotificationId`, valid until the surface reports the notification closed.

pub mod desktop;

pub use desktop::DesktopSurface;

use std::fmt;

use crate::domain::{Expiry, NotificationRequest, Urgency};
use crate::error::DisplayError;

/// Non-owning reference to a displayed notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u32);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Server notice that a notification is gone
///
/// `seq` orders the closure against the surface's shows. A closure stamped
/// before the latest show of the same id belongs to content already replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseReport {
    pub id: NotificationId,
    pub seq: u64,
}

impl CloseReport {
    /// Closure with no ordering information; never treated as stale
    pub fn unordered(id: NotificationId) -> Self {
        Self { id, seq: u64::MAX }
    }
}

/// Everything the surface needs to draw one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRequest {
    pub summary: String,
    pub body: String,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub timeout: Option<Expiry>,
    pub urgency: Option<Urgency>,
}

impl DisplayRequest {
    /// Build from a decoded request plus the configured icon
    pub fn from_request(request: &NotificationRequest, icon: Option<&str>) -> Self {
        Self {
            summary: request.summary().to_string(),
            body: request.body().to_string(),
            icon: icon.map(str::to_string),
            category: request.category.clone(),
            timeout: request.timeout,
            urgency: request.urgency,
        }
    }
}

/// Create-or-update primitive of a notification server
pub trait DisplaySurface {
    /// Show a new notification, or replace `prior` in place when given
    ///
    /// Returns the handle now displaying the content. It may differ from
    /// `prior` if the server no longer knew the old notification.
    fn create_or_update(
        &mut self,
        prior: Option<NotificationId>,
        request: &DisplayRequest,
    ) -> Result<NotificationId, DisplayError>;

    /// Sequence number of the most recent successful `create_or_update`
    ///
    /// Surfaces that cannot order closures against shows report 0.
    fn last_shown_seq(&self) -> u64 {
        0
    }

    /// Stop reporting closures; called once during shutdown
    fn teardown(&mut self) {}
}
