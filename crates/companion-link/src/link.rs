//! MQTT Companion Link

use crate::error::CompanionError;
use crate::messages::{Channel, ConnectionUpdate, DriveCommand};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Companion link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// MQTT broker host
    pub broker_host: String,
    /// MQTT port
    pub broker_port: u16,
    /// MQTT client id of the car
    pub client_id: String,
    /// Topic prefix every channel id is appended to
    pub topic_prefix: String,
    /// Silence on the drive channel after which the companion counts as gone
    pub timeout_ms: u64,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts
    pub reconnect_delay_ms: u64,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "rc-vehicle".to_string(),
            topic_prefix: "vehicle".to_string(),
            timeout_ms: 50,
            keep_alive_secs: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

impl CompanionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Something the companion side did
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionEvent {
    Drive(DriveCommand),
    Connection(ConnectionUpdate),
    /// Broker session came up (`true`) or dropped (`false`)
    Broker(bool),
}

impl CompanionEvent {
    /// Companion connectivity implied by this event, if any
    pub fn connectivity(&self) -> Option<bool> {
        match self {
            CompanionEvent::Drive(_) => None,
            CompanionEvent::Connection(update) => Some(update.is_connected()),
            CompanionEvent::Broker(up) => Some(*up),
        }
    }
}

/// Outbound seam: the core publishes through this, never through MQTT
/// directly.
///
/// Implementations must not block; publishing happens on I/O callbacks.
pub trait Publisher: Send + Sync {
    fn publish(&self, channel: Channel, payload: Vec<u8>) -> Result<(), CompanionError>;
}

/// Serialize `message` as JSON and publish it on `channel`
pub fn publish_json<P, T>(publisher: &P, channel: Channel, message: &T) -> Result<(), CompanionError>
where
    P: Publisher + ?Sized,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    publisher.publish(channel, payload)
}

/// Decode an inbound publish; `Ok(None)` for topics the car ignores
pub(crate) fn parse_incoming(
    prefix: &str,
    topic: &str,
    payload: &[u8],
) -> Result<Option<CompanionEvent>, CompanionError> {
    let Some(channel) = Channel::from_topic(prefix, topic) else {
        return Ok(None);
    };
    let malformed = |e: serde_json::Error| CompanionError::Malformed {
        channel: channel.name(),
        reason: e.to_string(),
    };

    match channel {
        Channel::Drive => serde_json::from_slice(payload)
            .map(|cmd| Some(CompanionEvent::Drive(cmd)))
            .map_err(malformed),
        Channel::Internal => serde_json::from_slice(payload)
            .map(|update| Some(CompanionEvent::Connection(update)))
            .map_err(malformed),
        // Our own outbound channels
        Channel::Status | Channel::Receiver => Ok(None),
    }
}

/// Route one inbound publish; returns `false` once the consumer is gone
async fn route_publish(
    prefix: &str,
    topic: &str,
    payload: &[u8],
    tx: &mpsc::Sender<CompanionEvent>,
) -> bool {
    match parse_incoming(prefix, topic, payload) {
        Ok(Some(event)) => {
            trace!("Companion: {:?}", event);
            tx.send(event).await.is_ok()
        }
        Ok(None) => {
            trace!("Companion: ignoring topic {}", topic);
            true
        }
        Err(e) => {
            debug!("Companion: {}", e);
            true
        }
    }
}

/// MQTT client handle for the companion link
#[derive(Clone)]
pub struct CompanionLink {
    client: AsyncClient,
    prefix: String,
}

impl CompanionLink {
    /// Connect to the broker and start the event loop task.
    ///
    /// Inbound events arrive on the returned channel. Must be called from
    /// within a tokio runtime.
    pub fn start(config: &CompanionConfig) -> (Self, mpsc::Receiver<CompanionEvent>) {
        let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, eventloop) = AsyncClient::new(options, 10);
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            config.topic_prefix.clone(),
            Duration::from_millis(config.reconnect_delay_ms),
            tx,
        ));

        info!(
            "Companion link connecting to {}:{}",
            config.broker_host, config.broker_port
        );
        (
            Self {
                client,
                prefix: config.topic_prefix.clone(),
            },
            rx,
        )
    }

    /// Ask the broker to close the session
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Companion: disconnect failed: {}", e);
        }
    }
}

impl Publisher for CompanionLink {
    fn publish(&self, channel: Channel, payload: Vec<u8>) -> Result<(), CompanionError> {
        self.client
            .try_publish(channel.topic(&self.prefix), QoS::AtMostOnce, false, payload)
            .map_err(|e| CompanionError::Publish(e.to_string()))
    }
}

impl std::fmt::Debug for CompanionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionLink")
            .field("prefix", &self.prefix)
            .finish()
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    prefix: String,
    reconnect_delay: Duration,
    tx: mpsc::Sender<CompanionEvent>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Companion link connected");
                for channel in Channel::INBOUND {
                    if let Err(e) = client.try_subscribe(channel.topic(&prefix), QoS::AtMostOnce) {
                        warn!("Companion: subscribe to {} failed: {}", channel.name(), e);
                    }
                }
                if tx.send(CompanionEvent::Broker(true)).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if !route_publish(&prefix, &publish.topic, &publish.payload, &tx).await {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT error: {}", e);
                if tx.send(CompanionEvent::Broker(false)).await.is_err() {
                    break;
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
    debug!("Companion event loop finished");
}
