//! Events delivered to the dispatcher loop.

use crate::display::CloseReport;
use crate::transport::TransportEvent;

/// Everything that can wake the dispatcher, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Connection state change or inbound message from the transport
    Transport(TransportEvent),
    /// The display surface reports a notification is gone
    Closed(CloseReport),
}

impl From<TransportEvent> for BridgeEvent {
    fn from(event: TransportEvent) -> Self {
        BridgeEvent::Transport(event)
    }
}
