//! Freedesktop notification surface backed by notify-rust.
//!
//! Updates reuse the server-assigned id as `replaces_id`. Closures are heard
//! by one listener task subscribed to the server's `NotificationClosed`
//! signal, which posts `BridgeEvent::Closed` back to the dispatcher inbox.
//! Shows and closures draw from one sequence so a closure that predates an
//! in-place update can be told apart from one that follows it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use log::{debug, warn};
use notify_rust::{Hint, Notification, Timeout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zbus::message::Type;
use zbus::{Connection, MatchRule, MessageStream};

use super::{CloseReport, DisplayRequest, DisplaySurface, NotificationId};
use crate::domain::{BridgeEvent, Expiry, Urgency};
use crate::error::DisplayError;

const NOTIFICATIONS_INTERFACE: &str = "org.freedesktop.Notifications";
const NOTIFICATIONS_PATH: &str = "/org/freedesktop/Notifications";

/// Desktop notification server over D-Bus
pub struct DesktopSurface {
    app_name: String,
    sequence: Arc<AtomicU64>,
    last_shown: u64,
    listener: Option<JoinHandle<()>>,
}

impl DesktopSurface {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            sequence: Arc::new(AtomicU64::new(0)),
            last_shown: 0,
            listener: None,
        }
    }

    /// Report every server-side closure into `inbox` until teardown
    ///
    /// Must be called from within a tokio runtime. Calling it again replaces
    /// the previous listener.
    pub fn watch_closures(&mut self, inbox: mpsc::UnboundedSender<BridgeEvent>) {
        if let Some(previous) = self.listener.take() {
            previous.abort();
        }
        let sequence = Arc::clone(&self.sequence);
        self.listener = Some(tokio::spawn(listen_for_closures(inbox, sequence)));
    }

    fn build(&self, prior: Option<NotificationId>, request: &DisplayRequest) -> Notification {
        let mut notification = Notification::new();
        notification
            .appname(&self.app_name)
            .summary(&request.summary)
            .body(&request.body);

        if let Some(icon) = &request.icon {
            notification.icon(icon);
        }
        if let Some(category) = &request.category {
            notification.hint(Hint::Category(category.clone()));
        }
        if let Some(timeout) = request.timeout {
            notification.timeout(to_timeout(timeout));
        }
        if let Some(urgency) = request.urgency {
            notification.urgency(to_urgency(urgency));
        }
        if let Some(NotificationId(id)) = prior {
            notification.id(id);
        }
        notification
    }
}

impl DisplaySurface for DesktopSurface {
    fn create_or_update(
        &mut self,
        prior: Option<NotificationId>,
        request: &DisplayRequest,
    ) -> Result<NotificationId, DisplayError> {
        let handle = self
            .build(prior, request)
            .show()
            .map_err(|e| DisplayError::Unavailable(e.to_string()))?;
        self.last_shown = advance(&self.sequence);

        let id = NotificationId(handle.id());
        if prior == Some(id) {
            debug!("Updated notification {} in place", id);
        } else {
            debug!("Showing notification {}", id);
        }
        Ok(id)
    }

    fn last_shown_seq(&self) -> u64 {
        self.last_shown
    }

    fn teardown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

fn advance(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::SeqCst) + 1
}

async fn closure_stream() -> zbus::Result<MessageStream> {
    let connection = Connection::session().await?;
    let rule = MatchRule::builder()
        .msg_type(Type::Signal)
        .interface(NOTIFICATIONS_INTERFACE)?
        .path(NOTIFICATIONS_PATH)?
        .member("NotificationClosed")?
        .build();
    MessageStream::for_match_rule(rule, &connection, None).await
}

async fn listen_for_closures(inbox: mpsc::UnboundedSender<BridgeEvent>, sequence: Arc<AtomicU64>) {
    let mut stream = match closure_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            // Tags then stay mapped until the server hands out their id again
            warn!("Cannot listen for notification closures: {}", e);
            return;
        }
    };

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("Bad message on notification closure stream: {}", e);
                continue;
            }
        };
        let (id, reason) = match message.body().deserialize::<(u32, u32)>() {
            Ok(args) => args,
            Err(e) => {
                warn!("Malformed NotificationClosed signal: {}", e);
                continue;
            }
        };

        let report = CloseReport {
            id: NotificationId(id),
            seq: advance(&sequence),
        };
        debug!("Notification {} closed (reason {})", report.id, reason);
        if inbox.send(BridgeEvent::Closed(report)).is_err() {
            return;
        }
    }
    debug!("Notification closure stream ended");
}

fn to_timeout(expiry: Expiry) -> Timeout {
    match expiry {
        Expiry::Default => Timeout::Default,
        Expiry::Never => Timeout::Never,
        Expiry::After(ms) => Timeout::Milliseconds(ms),
    }
}

fn to_urgency(urgency: Urgency) -> notify_rust::Urgency {
    match urgency {
        Urgency::Low => notify_rust::Urgency::Low,
        Urgency::Normal => notify_rust::Urgency::Normal,
        Urgency::Critical => notify_rust::Urgency::Critical,
    }
}
