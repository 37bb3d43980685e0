//! Notification registry - tag to handle bookkeeping
//!
//! The registry decides, per request, whether to create a new notification or
//! update an existing one in place, and forgets tags once the display surface
//! reports their notification closed. The two maps are kept as exact inverses:
//! every live tagged notification has one entry and nothing else does.
//!
//! Each entry remembers when its content was last shown. A closure stamped
//! earlier than that was for content an in-place update already replaced,
//! so it leaves the tag mapped.

use std::collections::HashMap;

use log::debug;

use crate::display::{CloseReport, DisplayRequest, DisplaySurface, NotificationId};
use crate::domain::NotificationRequest;
use crate::error::DisplayError;

/// What `handle` did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Untagged notification shown with no association kept
    Shown(NotificationId),
    /// First request for a tag created a notification
    Created(NotificationId),
    /// Existing tagged notification updated in place
    Updated(NotificationId),
    /// Surface no longer knew the old handle and displayed a new one
    Replaced { old: NotificationId, new: NotificationId },
}

impl HandleOutcome {
    /// Handle now displaying the request
    pub fn id(&self) -> NotificationId {
        match *self {
            HandleOutcome::Shown(id) | HandleOutcome::Created(id) | HandleOutcome::Updated(id) => id,
            HandleOutcome::Replaced { new, .. } => new,
        }
    }
}

#[derive(Debug)]
struct Shown {
    tag: String,
    seq: u64,
}

/// Bidirectional tag <-> handle map, owned by the dispatcher
#[derive(Debug, Default)]
pub struct NotificationRegistry {
    by_tag: HashMap<String, NotificationId>,
    by_handle: HashMap<NotificationId, Shown>,
    icon: Option<String>,
}

impl NotificationRegistry {
    pub fn new(icon: Option<String>) -> Self {
        Self {
            icon,
            ..Default::default()
        }
    }

    /// Apply the create/update policy for one request
    ///
    /// On a display failure the registry is left exactly as it was.
    pub fn handle<S: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        request: &NotificationRequest,
    ) -> Result<HandleOutcome, DisplayError> {
        let display = DisplayRequest::from_request(request, self.icon.as_deref());

        let Some(tag) = request.tag.as_deref() else {
            let id = surface.create_or_update(None, &display)?;
            // A reused id means the tag that held it was closed without us hearing about it
            self.release(id);
            return Ok(HandleOutcome::Shown(id));
        };

        let prior = self.by_tag.get(tag).copied();
        let id = surface.create_or_update(prior, &display)?;
        let seq = surface.last_shown_seq();

        let outcome = match prior {
            None => HandleOutcome::Created(id),
            Some(old) if old == id => HandleOutcome::Updated(id),
            Some(old) => HandleOutcome::Replaced { old, new: id },
        };

        match outcome {
            HandleOutcome::Updated(_) => {
                if let Some(shown) = self.by_handle.get_mut(&id) {
                    shown.seq = seq;
                }
            }
            _ => self.associate(tag, id, seq),
        }
        debug!("Tag '{}' -> {:?}", tag, outcome);
        Ok(outcome)
    }

    /// Apply a closure reported by the surface
    ///
    /// Returns the released tag, or `None` when the handle is unknown or the
    /// closure predates the latest show of that handle.
    pub fn release_closed(&mut self, report: CloseReport) -> Option<String> {
        let shown = self.by_handle.get(&report.id)?;
        if report.seq < shown.seq {
            debug!(
                "Ignoring closure of {} from before its update to tag '{}'",
                report.id, shown.tag
            );
            return None;
        }
        self.release(report.id)
    }

    /// Forget whatever tag points at `id`; unknown handles are ignored
    fn release(&mut self, id: NotificationId) -> Option<String> {
        let Shown { tag, .. } = self.by_handle.remove(&id)?;
        self.by_tag.remove(&tag);
        debug!("Released tag '{}' ({})", tag, id);
        Some(tag)
    }

    /// Drop every association, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.by_tag.len();
        self.by_tag.clear();
        self.by_handle.clear();
        count
    }

    pub fn handle_for(&self, tag: &str) -> Option<NotificationId> {
        self.by_tag.get(tag).copied()
    }

    pub fn tag_for(&self, id: NotificationId) -> Option<&str> {
        self.by_handle.get(&id).map(|shown| shown.tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// True when both maps are exact inverses of each other
    pub fn is_consistent(&self) -> bool {
        self.by_tag.len() == self.by_handle.len()
            && self
                .by_tag
                .iter()
                .all(|(tag, id)| self.by_handle.get(id).is_some_and(|shown| shown.tag == *tag))
    }

    fn associate(&mut self, tag: &str, id: NotificationId, seq: u64) {
        if let Some(old) = self.by_tag.insert(tag.to_string(), id) {
            self.by_handle.remove(&old);
        }
        let shown = Shown {
            tag: tag.to_string(),
            seq,
        };
        if let Some(stale) = self.by_handle.insert(id, shown)
            && stale.tag != tag
        {
            self.by_tag.remove(&stale.tag);
        }
    }
}
