//! Dispatcher - the single loop that owns all bridge state
//!
//! Transport events and display closures arrive on one inbox and are applied
//! strictly in arrival order. Registry and session state are touched only
//! from here, so a new message for a tag and that tag's dismissal can never
//! interleave.

use std::future::Future;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::DispatchStats;
use crate::decoder;
use crate::display::DisplaySurface;
use crate::domain::BridgeEvent;
use crate::registry::NotificationRegistry;
use crate::transport::{InboundMessage, SessionController, TransportLink};

pub struct Dispatcher<S: DisplaySurface, L: TransportLink> {
    registry: NotificationRegistry,
    surface: S,
    session: SessionController<L>,
    stats: DispatchStats,
}

impl<S: DisplaySurface, L: TransportLink> Dispatcher<S, L> {
    pub fn new(registry: NotificationRegistry, surface: S, session: SessionController<L>) -> Self {
        Self {
            registry,
            surface,
            session,
            stats: DispatchStats::new(),
        }
    }

    pub fn registry(&self) -> &NotificationRegistry {
        &self.registry
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn session(&self) -> &SessionController<L> {
        &self.session
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Apply one event to the session and registry
    pub fn dispatch(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Transport(event) => {
                if let Some(message) = self.session.on_event(event) {
                    self.on_message(message);
                }
                self.stats.reconnects = self.session.reconnects;
            }
            BridgeEvent::Closed(report) => {
                if self.registry.release_closed(report).is_some() {
                    self.stats.dismissed += 1;
                }
            }
        }
    }

    fn on_message(&mut self, message: InboundMessage) {
        self.stats.received += 1;

        let request = match decoder::decode(&message.payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping message on '{}': {}", message.topic, e);
                self.stats.rejected += 1;
                return;
            }
        };

        match self.registry.handle(&mut self.surface, &request) {
            Ok(outcome) => self.stats.record(&outcome),
            Err(e) => {
                warn!("Failed to display message on '{}': {}", message.topic, e);
                self.stats.display_failures += 1;
            }
        }
    }

    /// Run until `shutdown` resolves or every sender is gone, then drain
    pub async fn run<F>(mut self, mut inbox: mpsc::UnboundedReceiver<BridgeEvent>, shutdown: F) -> DispatchStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Dispatcher running");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, draining");
                    break;
                }
                event = inbox.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        warn!("Inbox closed, stopping dispatcher");
                        break;
                    }
                },
            }
        }

        inbox.close();
        self.drain().await
    }

    async fn drain(mut self) -> DispatchStats {
        if let Err(e) = self.session.shutdown().await {
            warn!("Transport disconnect failed: {}", e);
        }
        self.surface.teardown();
        let forgotten = self.registry.clear();
        debug!("Forgot {} tagged notification(s)", forgotten);
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{CloseReport, DisplayRequest, NotificationId};
    use crate::error::{DisplayError, TransportError};
    use crate::transport::{Qos, TransportEvent};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeSurface {
        next_id: u32,
        calls: Vec<(Option<NotificationId>, DisplayRequest)>,
        unavailable: bool,
        torn_down: Arc<AtomicBool>,
        seq: u64,
    }

    impl DisplaySurface for FakeSurface {
        fn create_or_update(
            &mut self,
            prior: Option<NotificationId>,
            request: &DisplayRequest,
        ) -> Result<NotificationId, DisplayError> {
            if self.unavailable {
                return Err(DisplayError::Unavailable("no server".to_string()));
            }
            self.calls.push((prior, request.clone()));
            self.seq += 1;
            Ok(prior.unwrap_or_else(|| {
                self.next_id += 1;
                NotificationId(self.next_id)
            }))
        }

        fn last_shown_seq(&self) -> u64 {
            self.seq
        }

        fn teardown(&mut self) {
            self.torn_down.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeLink {
        subscribes: Mutex<u32>,
        disconnected: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TransportLink for FakeLink {
        fn subscribe(&self, _topic: &str, _qos: Qos) -> Result<(), TransportError> {
            *self.subscribes.lock().unwrap() += 1;
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher<FakeSurface, FakeLink> {
        Dispatcher::new(
            NotificationRegistry::default(),
            FakeSurface::default(),
            SessionController::new(FakeLink::default(), "home/notify"),
        )
    }

    fn message(payload: &str) -> BridgeEvent {
        BridgeEvent::Transport(TransportEvent::Message {
            topic: "home/notify".to_string(),
            payload: payload.as_bytes().to_vec(),
        })
    }

    #[test]
    fn test_message_before_connect_is_dropped() {
        let mut d = dispatcher();
        d.dispatch(message(r#"{"message":"early"}"#));
        assert!(d.surface().calls.is_empty());
        assert_eq!(d.stats().received, 0);
    }

    #[test]
    fn test_untagged_message_shown() {
        let mut d = dispatcher();
        d.dispatch(TransportEvent::Connected.into());
        d.dispatch(message(r#"{"message":"disk full"}"#));

        assert_eq!(d.surface().calls.len(), 1);
        assert_eq!(d.surface().calls[0].1.summary, "disk full");
        assert_eq!(d.surface().calls[0].1.body, "");
        assert!(d.registry().is_empty());
        assert_eq!(d.stats().shown, 1);
    }

    #[test]
    fn test_rejected_message_never_reaches_surface() {
        let mut d = dispatcher();
        d.dispatch(TransportEvent::Connected.into());
        d.dispatch(message(r#"{"title":"no body"}"#));
        d.dispatch(message("garbage"));

        assert!(d.surface().calls.is_empty());
        assert_eq!(d.stats().received, 2);
        assert_eq!(d.stats().rejected, 2);
    }

    #[test]
    fn test_display_failure_is_not_fatal() {
        let mut d = dispatcher();
        d.dispatch(TransportEvent::Connected.into());
        d.surface.unavailable = true;
        d.dispatch(message(r#"{"message":"a","tag":"t"}"#));

        assert_eq!(d.stats().display_failures, 1);
        assert!(d.registry().is_empty());

        d.surface.unavailable = false;
        d.dispatch(message(r#"{"message":"b","tag":"t"}"#));
        assert_eq!(d.registry().len(), 1);
        assert_eq!(d.stats().created, 1);
    }

    #[test]
    fn test_dismissal_then_same_tag_creates_again() {
        let mut d = dispatcher();
        d.dispatch(TransportEvent::Connected.into());
        d.dispatch(message(r#"{"message":"a","tag":"t"}"#));
        let id = d.registry().handle_for("t").unwrap();

        d.dispatch(BridgeEvent::Closed(CloseReport::unordered(id)));
        assert!(d.registry().is_empty());
        assert_eq!(d.stats().dismissed, 1);

        d.dispatch(message(r#"{"message":"b","tag":"t"}"#));
        assert_eq!(d.stats().created, 2);
        assert_eq!(d.surface().calls[1].0, None);
    }

    #[test]
    fn test_closed_unknown_handle_is_noop() {
        let mut d = dispatcher();
        d.dispatch(BridgeEvent::Closed(CloseReport::unordered(NotificationId(7))));
        assert_eq!(d.stats().dismissed, 0);
    }

    #[test]
    fn test_closure_overtaken_by_update_keeps_tag() {
        let mut d = dispatcher();
        d.dispatch(TransportEvent::Connected.into());
        d.dispatch(message(r#"{"message":"hot","tag":"cpu"}"#));
        let id = d.registry().handle_for("cpu").unwrap();

        // Closure heard before the update was shown, delivered after it
        let closed_at = d.surface().seq + 1;
        d.surface.seq = closed_at;
        d.dispatch(message(r#"{"message":"cooling","tag":"cpu"}"#));
        d.dispatch(BridgeEvent::Closed(CloseReport { id, seq: closed_at }));

        assert_eq!(d.registry().handle_for("cpu"), Some(id));
        assert_eq!(d.stats().dismissed, 0);

        d.dispatch(message(r#"{"message":"cool","tag":"cpu"}"#));
        assert_eq!(d.stats().updated, 2);
        assert_eq!(d.surface().calls[2].0, Some(id));
    }

    #[test]
    fn test_reconnects_counted() {
        let mut d = dispatcher();
        d.dispatch(TransportEvent::Connected.into());
        d.dispatch(TransportEvent::Disconnected(TransportError::Connection("eof".to_string())).into());
        d.dispatch(TransportEvent::Connecting.into());
        d.dispatch(TransportEvent::Connected.into());

        assert_eq!(d.stats().reconnects, 1);
        assert_eq!(*d.session().link().subscribes.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_run_processes_in_arrival_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(TransportEvent::Connected.into()).unwrap();
        tx.send(message(r#"{"title":"CPU","message":"hot","tag":"cpu"}"#)).unwrap();
        tx.send(message(r#"{"title":"CPU","message":"cooling","tag":"cpu"}"#)).unwrap();
        tx.send(BridgeEvent::Closed(CloseReport::unordered(NotificationId(1)))).unwrap();
        tx.send(message(r#"{"title":"CPU","message":"hot again","tag":"cpu"}"#)).unwrap();
        drop(tx);

        let stats = dispatcher().run(rx, std::future::pending::<()>()).await;

        assert_eq!(stats.received, 3);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.dismissed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_wins_over_queued_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut d = dispatcher();
        d.dispatch(TransportEvent::Connected.into());
        tx.send(message(r#"{"message":"late"}"#)).unwrap();

        let stats = d.run(rx, std::future::ready(())).await;

        assert_eq!(stats.received, 0);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_drain_disconnects_and_tears_down() {
        let (_tx, rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let link = FakeLink::default();
        let disconnected = Arc::clone(&link.disconnected);
        let surface = FakeSurface::default();
        let torn_down = Arc::clone(&surface.torn_down);

        let mut d = Dispatcher::new(
            NotificationRegistry::default(),
            surface,
            SessionController::new(link, "home/notify"),
        );
        d.dispatch(TransportEvent::Connected.into());
        d.dispatch(message(r#"{"message":"a","tag":"t"}"#));
        assert_eq!(d.registry().len(), 1);

        let stats = d.run(rx, std::future::ready(())).await;

        assert_eq!(stats.created, 1);
        assert!(disconnected.load(Ordering::SeqCst));
        assert!(torn_down.load(Ordering::SeqCst));
    }
}
