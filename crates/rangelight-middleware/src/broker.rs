//! The actuator broker seam.
//!
//! The bridge never talks to MQTT directly. It publishes short text commands
//! through an [`ActuatorBroker`]; the strip firmware subscribes to the topics
//! in [`crate::topics`].
//!
//! - [`MqttBroker`] – drives a real broker with `rumqttc`. The event loop is
//!   polled on its own task, which logs connection changes and reconnects.
//! - [`MemoryBroker`] – records every publish. Used when the broker is
//!   disabled in configuration and throughout the tests, where it can also be
//!   told to fail or stall.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rangelight_types::LightError;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the request queue between [`AsyncClient`] and its event loop.
const REQUEST_QUEUE: usize = 32;

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// ─────────────────────────────────────────────────────────────────────────────
// Trait and error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("broker rejected publish: {0}")]
    Rejected(String),
}

impl BrokerError {
    /// Client-facing error for a failed publish of `payload` to `topic`.
    pub fn into_light(self, topic: &str, payload: &str) -> LightError {
        LightError::PublishFailed {
            topic: topic.to_string(),
            payload: payload.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Fire-and-forget publisher of actuation commands.
///
/// # Contract
///
/// * `publish` hands `payload` to the broker at most once. Returning `Ok`
///   means the broker client accepted the message, not that any device
///   received it.
#[async_trait]
pub trait ActuatorBroker: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// MQTT
// ─────────────────────────────────────────────────────────────────────────────

/// Connection parameters for [`MqttBroker`].
#[derive(Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
}

impl fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        options
    }
}

/// [`ActuatorBroker`] backed by an MQTT connection. Publishes at QoS 0.
pub struct MqttBroker {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttBroker {
    /// Create the client and start polling its event loop.
    ///
    /// The connection is established lazily by the event loop; publishes
    /// made before it is up are queued by the client.
    pub fn connect(settings: &MqttSettings) -> Self {
        let (client, mut event_loop) = AsyncClient::new(settings.options(), REQUEST_QUEUE);
        let endpoint = format!("{}:{}", settings.host, settings.port);

        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(broker = %endpoint, "mqtt connected");
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!(broker = %endpoint, "mqtt disconnected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(broker = %endpoint, error = %e, "mqtt connection error");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self { client, event_loop }
    }

    /// Disconnect from the broker and stop the event loop task.
    pub async fn shutdown(self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "mqtt disconnect request not delivered");
        }
        self.event_loop.abort();
    }
}

#[async_trait]
impl ActuatorBroker for MqttBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await?;
        debug!(topic, payload, "published");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

/// One message accepted by a [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    published: Vec<Published>,
    failure: Option<String>,
    delay: Option<Duration>,
}

/// Recording broker. Every accepted publish is kept in order and logged.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    state: Mutex<MemoryState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<Published> {
        self.state().published.clone()
    }

    /// The most recent publish to `topic`.
    pub fn last_on(&self, topic: &str) -> Option<Published> {
        self.state()
            .published
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .cloned()
    }

    /// Make every following publish fail with `reason` until [`Self::recover`].
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.state().failure = Some(reason.into());
    }

    pub fn recover(&self) {
        self.state().failure = None;
    }

    /// Hold every following publish for `delay` before accepting it.
    pub fn stall_for(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ActuatorBroker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if let Some(reason) = &state.failure {
            return Err(BrokerError::Rejected(reason.clone()));
        }
        info!(topic, payload, "publish recorded (broker disabled)");
        state.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_broker_records_in_order() {
        let broker = MemoryBroker::new();
        broker.publish("audio/mute", "mute").await.unwrap();
        broker.publish("trigger/ledstrip1", "0-9&255,0,0&3").await.unwrap();
        broker.publish("audio/mute", "mute").await.unwrap();

        let all = broker.published();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].payload, "0-9&255,0,0&3");
        assert_eq!(
            broker.last_on("trigger/ledstrip1").unwrap().payload,
            "0-9&255,0,0&3"
        );
        assert!(broker.last_on("control/led_on").is_none());
    }

    #[tokio::test]
    async fn failure_injection_rejects_until_recovered() {
        let broker = MemoryBroker::new();
        broker.fail_with("broker offline");
        let err = broker.publish("audio/mute", "mute").await.unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(ref r) if r == "broker offline"));
        assert!(broker.published().is_empty());

        broker.recover();
        broker.publish("audio/mute", "mute").await.unwrap();
        assert_eq!(broker.published().len(), 1);
    }

    #[test]
    fn publish_failure_keeps_composed_message() {
        let err = BrokerError::Rejected("offline".into()).into_light("trigger/ledstrip1", "0-9&255,0,0&3");
        let text = err.to_string();
        assert!(text.contains("0-9&255,0,0&3"));
        assert!(text.contains("trigger/ledstrip1"));
    }

    #[tokio::test]
    async fn works_behind_trait_object() {
        let broker = Arc::new(MemoryBroker::new());
        let dyn_broker: Arc<dyn ActuatorBroker> = broker.clone();
        dyn_broker.publish("control/led_on", "0,0,0,0").await.unwrap();
        assert_eq!(broker.published()[0].topic, "control/led_on");
    }

    #[test]
    fn settings_debug_redacts_password() {
        let settings = MqttSettings {
            host: "localhost".into(),
            port: 1883,
            client_id: "rangelight".into(),
            username: Some("bridge".into()),
            password: Some("hunter2".into()),
            keep_alive: Duration::from_secs(30),
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn mqtt_publish_is_queued_before_connect() {
        let settings = MqttSettings {
            host: "127.0.0.1".into(),
            port: 1,
            client_id: "rangelight-test".into(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(5),
        };
        let broker = MqttBroker::connect(&settings);
        broker.publish("audio/mute", "mute").await.unwrap();
        broker.shutdown().await;
    }
}
