//! MQTT transport over rumqttc.
//!
//! `connect` splits the client into an `MqttLink` (commands from the
//! dispatcher) and an `MqttDriver` (a task polling the event loop). The driver
//! never touches bridge state; it only posts `TransportEvent`s to the inbox.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, TlsConfiguration, Transport};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{Qos, ReconnectBackoff, TransportEvent, TransportLink, tls};
use crate::config::Config;
use crate::domain::BridgeEvent;
use crate::error::TransportError;

/// Capacity of the request queue between link and event loop
const REQUEST_CAPACITY: usize = 64;

/// Connection parameters for one broker session
#[derive(Clone)]
pub struct MqttSettings {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub user: String,
    pub password: String,
    pub tls: bool,
    /// Skip hostname verification
    pub insecure: bool,
    /// Largest packet accepted from the broker, in bytes
    pub max_packet_size: usize,
}

impl MqttSettings {
    pub fn from_config(config: &Config, password: String) -> Self {
        Self {
            broker: config.broker.clone(),
            port: config.port,
            client_id: config.client_id(),
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            user: config.user.clone(),
            password,
            tls: config.tls,
            insecure: config.insecure,
            max_packet_size: config.max_packet_size,
        }
    }

    fn options(&self) -> Result<MqttOptions, TransportError> {
        let mut options = MqttOptions::new(&self.client_id, &self.broker, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_credentials(&self.user, &self.password);
        // Only SUBSCRIBE and DISCONNECT go out, so the outgoing limit never matters
        options.set_max_packet_size(self.max_packet_size, self.max_packet_size);

        if self.tls {
            let config = tls::client_config(self.insecure)?;
            options.set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(Arc::new(config))));
        }
        Ok(options)
    }
}

impl fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSettings")
            .field("broker", &self.broker)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("keep_alive", &self.keep_alive)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("insecure", &self.insecure)
            .field("max_packet_size", &self.max_packet_size)
            .finish()
    }
}

/// Build the client and split it into link and driver
///
/// Nothing touches the network until the driver runs.
pub fn connect(
    settings: &MqttSettings,
    inbox: mpsc::UnboundedSender<BridgeEvent>,
    backoff: ReconnectBackoff,
) -> Result<(MqttLink, MqttDriver), TransportError> {
    let options = settings.options()?;
    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    let (stop_tx, stop_rx) = watch::channel(false);

    info!(
        "MQTT session for {}@{}:{} (tls: {}, insecure: {})",
        settings.user, settings.broker, settings.port, settings.tls, settings.insecure
    );

    let link = MqttLink { client, stop: stop_tx };
    let driver = MqttDriver {
        eventloop,
        inbox,
        backoff,
        stop: stop_rx,
    };
    Ok((link, driver))
}

/// Command side of the MQTT session
pub struct MqttLink {
    client: AsyncClient,
    stop: watch::Sender<bool>,
}

#[async_trait]
impl TransportLink for MqttLink {
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), TransportError> {
        self.client
            .try_subscribe(topic, to_qos(qos))
            .map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let _ = self.stop.send(true);
        self.client
            .try_disconnect()
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

/// Network side of the MQTT session, run as its own task
pub struct MqttDriver {
    eventloop: EventLoop,
    inbox: mpsc::UnboundedSender<BridgeEvent>,
    backoff: ReconnectBackoff,
    stop: watch::Receiver<bool>,
}

impl MqttDriver {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll until disconnected on request or the inbox closes
    ///
    /// rumqttc reconnects on the next poll after an error, so the backoff
    /// sleep between polls is the reconnect interval.
    pub async fn run(mut self) {
        if !self.emit(TransportEvent::Connecting) {
            return;
        }

        loop {
            let delivered = match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!("ConnAck: {:?}", ack.code);
                    self.backoff.record_success();
                    self.emit(TransportEvent::Connected)
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => self.emit(TransportEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                }),
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("MQTT disconnect sent");
                    return;
                }
                Ok(_) => true,
                Err(e) => {
                    if self.stopping() {
                        return;
                    }
                    if let Some(uptime) = self.backoff.time_since_connected()
                        && self.backoff.consecutive_failures() == 0
                    {
                        info!("Connection lost after {:?}", uptime);
                    }
                    if !self.emit(TransportEvent::Disconnected(TransportError::Connection(e.to_string()))) {
                        return;
                    }
                    let delay = self.backoff.record_failure();
                    info!("Reconnecting in {:?}", delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.stop.changed() => return,
                    }
                    self.emit(TransportEvent::Connecting)
                }
            };

            if !delivered {
                debug!("Inbox closed, stopping MQTT driver");
                return;
            }
        }
    }

    fn stopping(&self) -> bool {
        *self.stop.borrow()
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.inbox.send(BridgeEvent::Transport(event)).is_ok()
    }
}

fn to_qos(qos: Qos) -> rumqttc::QoS {
    match qos {
        Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
        Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn settings(port: u16) -> MqttSettings {
        MqttSettings {
            broker: "127.0.0.1".to_string(),
            port,
            client_id: "mqtt-notify-test".to_string(),
            keep_alive: Duration::from_secs(60),
            user: "alice".to_string(),
            password: "hunter2".to_string(),
            tls: false,
            insecure: false,
            max_packet_size: 1024 * 1024,
        }
    }

    /// QoS 0 PUBLISH with a variable-length remaining-length header
    fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
        let mut remaining = 2 + topic.len() + payload.len();
        let mut packet = vec![0x30];
        loop {
            let mut byte = (remaining % 128) as u8;
            remaining /= 128;
            if remaining > 0 {
                byte |= 0x80;
            }
            packet.push(byte);
            if remaining == 0 {
                break;
            }
        }
        packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        packet.extend_from_slice(topic.as_bytes());
        packet.extend_from_slice(payload);
        packet
    }

    #[test]
    fn test_to_qos() {
        assert_eq!(to_qos(Qos::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(to_qos(Qos::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(to_qos(Qos::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[test]
    fn test_settings_debug_redacts_password() {
        let rendered = format!("{:?}", settings(1883));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_tls_options_build() {
        let mut tls = settings(8883);
        tls.tls = true;
        assert!(matches!(tls.options().unwrap().transport(), Transport::Tls(_)));
    }

    #[test]
    fn test_insecure_tls_options_build() {
        let mut tls = settings(8883);
        tls.tls = true;
        tls.insecure = true;
        let options = tls.options().unwrap();
        assert!(matches!(
            options.transport(),
            Transport::Tls(TlsConfiguration::Rustls(_))
        ));
    }

    #[test]
    fn test_max_packet_size_applied() {
        let options = settings(1883).options().unwrap();
        assert_eq!(options.max_packet_size(), 1024 * 1024);
    }

    #[tokio::test]
    async fn test_large_publish_is_delivered() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let payload = vec![b'x'; 20 * 1024];
        let packet = publish_packet("home/notify", &payload);

        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            socket.write_all(&packet).await.unwrap();
            // Hold the connection until the client disconnects
            while socket.read(&mut buf).await.map(|n| n > 0).unwrap_or(false) {}
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (link, driver) = connect(&settings(port), tx, ReconnectBackoff::default()).unwrap();
        let task = driver.spawn();

        assert_eq!(rx.recv().await, Some(BridgeEvent::Transport(TransportEvent::Connecting)));
        assert_eq!(rx.recv().await, Some(BridgeEvent::Transport(TransportEvent::Connected)));
        assert_eq!(
            rx.recv().await,
            Some(BridgeEvent::Transport(TransportEvent::Message {
                topic: "home/notify".to_string(),
                payload,
            }))
        );

        link.disconnect().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        broker.abort();
    }

    #[tokio::test]
    async fn test_refused_connection_reports_and_stops() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let backoff = ReconnectBackoff::new(Duration::from_secs(60), Duration::from_secs(60));
        let (link, driver) = connect(&settings(port), tx, backoff).unwrap();
        let task = driver.spawn();

        assert_eq!(rx.recv().await, Some(BridgeEvent::Transport(TransportEvent::Connecting)));
        assert!(matches!(
            rx.recv().await,
            Some(BridgeEvent::Transport(TransportEvent::Disconnected(_)))
        ));

        // Disconnect interrupts the backoff sleep
        link.disconnect().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
