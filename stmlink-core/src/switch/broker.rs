//! MQTT broker link.
//!
//! [`MqttLink::connect`] performs the first network round trip itself so
//! that an unreachable broker is reported to the caller before any input is
//! read. After that a background *delivery task* owns the rumqttc
//! [`EventLoop`]: it flushes queued publishes, answers keep-alives and turns
//! CONNACKs and connection drops into [`ConnectionEvent`]s on a channel.
//! Reconnection is whatever rumqttc does on the next poll; the link adds
//! only a fixed pause between failed attempts.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions,
    Outgoing, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::LinkError;
use crate::switch::command::Payload;

/// Capacity of the client → event loop request channel.
const REQUEST_CAPACITY: usize = 16;
/// Pause after a failed poll before letting rumqttc reconnect.
const RETRY_DELAY: Duration = Duration::from_secs(2);
/// How long shutdown waits for the DISCONNECT to be flushed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

// ── BrokerConfig ─────────────────────────────────────────────────

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means "generate one per process".
    pub client_id: String,
    pub topic: String,
    pub keep_alive: Duration,
    /// MQTT QoS level, 0..=2.
    pub qos: u8,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "emqx.van.xrak.xyz".into(),
            port: 1883,
            client_id: String::new(),
            topic: "LED".into(),
            keep_alive: Duration::from_secs(60),
            qos: 0,
        }
    }
}

impl BrokerConfig {
    /// Client id sent in CONNECT.
    pub fn effective_client_id(&self) -> String {
        if self.client_id.is_empty() {
            format!("stmlink-switch-{}", std::process::id())
        } else {
            self.client_id.clone()
        }
    }

    pub fn qos_level(&self) -> Result<QoS, LinkError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(LinkError::Config(format!("qos must be 0, 1 or 2, got {other}"))),
        }
    }

    /// Check values rumqttc would otherwise panic on or silently misuse.
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.host.is_empty() {
            return Err(LinkError::Config("broker host is empty".into()));
        }
        if self.topic.is_empty() {
            return Err(LinkError::Config("topic is empty".into()));
        }
        if self.topic.contains(['+', '#']) {
            return Err(LinkError::Config(format!(
                "topic '{}' contains wildcards",
                self.topic
            )));
        }
        if self.keep_alive < Duration::from_secs(1) {
            return Err(LinkError::Config("keep_alive must be at least 1 second".into()));
        }
        self.qos_level()?;
        Ok(())
    }

    fn mqtt_options(&self) -> Result<MqttOptions, LinkError> {
        self.validate()?;
        let mut options = MqttOptions::new(self.effective_client_id(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        Ok(options)
    }
}

// ── ConnectionEvent ──────────────────────────────────────────────

/// Connection outcome reported by the delivery task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// CONNACK with return code 0.
    Accepted { session_present: bool },
    /// CONNACK with a non-zero return code.
    Refused { code: u8, reason: String },
    /// An established connection dropped.
    Lost(String),
}

impl ConnectionEvent {
    fn from_ack(ack: &ConnAck) -> Self {
        match ack.code {
            ConnectReturnCode::Success => ConnectionEvent::Accepted {
                session_present: ack.session_present,
            },
            code => Self::refused(code),
        }
    }

    fn refused(code: ConnectReturnCode) -> Self {
        let reason = format!("{code:?}");
        ConnectionEvent::Refused {
            code: code as u8,
            reason,
        }
    }
}

// ── SwitchPublisher ──────────────────────────────────────────────

/// Publishes switch payloads to the configured topic.
#[async_trait]
pub trait SwitchPublisher {
    async fn publish(&mut self, payload: Payload) -> Result<(), LinkError>;
}

// ── MqttLink ─────────────────────────────────────────────────────

/// A rumqttc client plus its background delivery task.
pub struct MqttLink {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    driver: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl MqttLink {
    /// Connect and start the delivery task.
    ///
    /// Network-level failures (DNS, TCP, TLS, timeout) on the first attempt
    /// are returned as [`LinkError::Broker`]. A broker that answers but
    /// refuses the session is *not* an error here: the refusal arrives as a
    /// [`ConnectionEvent::Refused`] on the returned channel.
    pub async fn connect(
        config: &BrokerConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), LinkError> {
        let qos = config.qos_level()?;
        let options = config.mqtt_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!("connecting to {}:{}", config.host, config.port);
        let connected = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                let event = ConnectionEvent::from_ack(&ack);
                let accepted = matches!(event, ConnectionEvent::Accepted { .. });
                events_tx.send(event)?;
                accepted
            }
            Ok(event) => {
                debug!("first broker event: {event:?}");
                false
            }
            Err(ConnectionError::ConnectionRefused(code)) => {
                events_tx.send(ConnectionEvent::refused(code))?;
                false
            }
            Err(e) => {
                return Err(LinkError::Broker(format!(
                    "cannot connect to {}:{}: {e}",
                    config.host, config.port
                )));
            }
        };

        let cancel = CancellationToken::new();
        let driver = tokio::spawn(deliver(eventloop, events_tx, cancel.clone(), connected));

        Ok((
            Self {
                client,
                topic: config.topic.clone(),
                qos,
                driver: Some(driver),
                cancel,
            },
            events_rx,
        ))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Send DISCONNECT, wait briefly for it to flush, then stop the
    /// delivery task.
    pub async fn shutdown(mut self) -> Result<(), LinkError> {
        let disconnect = self.client.try_disconnect();

        if let Some(mut driver) = self.driver.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut driver).await.is_err() {
                debug!("delivery task still busy after {SHUTDOWN_GRACE:?}; cancelling");
                self.cancel.cancel();
                let _ = driver.await;
            }
        }

        disconnect.map_err(LinkError::from)
    }
}

#[async_trait]
impl SwitchPublisher for MqttLink {
    /// Queue the payload without waiting for the network.
    async fn publish(&mut self, payload: Payload) -> Result<(), LinkError> {
        self.client
            .try_publish(self.topic.as_str(), self.qos, false, payload.as_str())?;
        Ok(())
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Background delivery loop.
async fn deliver(
    mut eventloop: EventLoop,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    cancel: CancellationToken,
    mut connected: bool,
) {
    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                let event = ConnectionEvent::from_ack(&ack);
                connected = matches!(event, ConnectionEvent::Accepted { .. });
                let _ = events.send(event);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT flushed");
                break;
            }
            Ok(event) => trace!("mqtt: {event:?}"),
            Err(e) => {
                match e {
                    ConnectionError::ConnectionRefused(code) => {
                        let _ = events.send(ConnectionEvent::refused(code));
                    }
                    e if connected => {
                        let _ = events.send(ConnectionEvent::Lost(e.to_string()));
                    }
                    e => debug!("reconnect attempt failed: {e}"),
                }
                connected = false;

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    if let Err(e) = events.send(ConnectionEvent::Lost("delivery loop stopped".into())) {
        trace!("no listener for shutdown event: {e}");
    }
    debug!("delivery task exited");
}
