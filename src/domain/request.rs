//! Notification requests decoded from inbound messages.

use std::fmt;
use std::str::FromStr;

/// Severity hint attached to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    /// Map the numeric level used on the wire (0, 1, 2)
    pub fn from_level(level: u64) -> Option<Self> {
        match level {
            0 => Some(Urgency::Low),
            1 => Some(Urgency::Normal),
            2 => Some(Urgency::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "0" => Ok(Urgency::Low),
            "normal" | "1" => Ok(Urgency::Normal),
            "critical" | "2" => Ok(Urgency::Critical),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long a notification stays on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Let the notification server decide
    Default,
    /// Stay until dismissed
    Never,
    /// Expire after the given milliseconds
    After(u32),
}

impl Expiry {
    /// Negative means server default, zero means never expire
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            m if m < 0 => Expiry::Default,
            0 => Expiry::Never,
            m => Expiry::After(u32::try_from(m).unwrap_or(u32::MAX)),
        }
    }
}

/// A validated request to show or update one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: Option<String>,
    /// Never empty
    pub message: String,
    /// Correlation key for update-in-place
    pub tag: Option<String>,
    pub category: Option<String>,
    pub timeout: Option<Expiry>,
    pub urgency: Option<Urgency>,
}

impl NotificationRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
            tag: None,
            category: None,
            timeout: None,
            urgency: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Expiry) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    /// Text shown as the notification summary
    ///
    /// The title when present, otherwise the message itself.
    pub fn summary(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.message)
    }

    /// Text shown as the notification body; empty when there is no title
    pub fn body(&self) -> &str {
        if self.title.is_some() { &self.message } else { "" }
    }
}
