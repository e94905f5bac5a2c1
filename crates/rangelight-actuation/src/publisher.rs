//! Actuation publisher: turns resolved state into broker messages.
//!
//! | Operation | Topic | Payload |
//! |---|---|---|
//! | [`ActuationPublisher::trigger`] | `trigger/ledstrip<id>` | `<start>-<end>&<r>,<g>,<b>&<duration>` |
//! | [`ActuationPublisher::send_raw_trigger`] | `trigger/ledstrip<id>` | caller supplied |
//! | [`ActuationPublisher::toggle_all_leds`] | `control/led_on` | `<r>,<g>,<b>,1` or `0,0,0,0` |
//! | [`ActuationPublisher::send_sensor_control`] | `control/distance_sensor` | `sleep` / `wake` |
//! | [`ActuationPublisher::send_mute`] | `audio/mute` | `mute` |
//! | [`ActuationPublisher::publish_range_limits`] | `config/range_ledstrip` | `<closeUpper>,<midUpper>` |
//!
//! Every publish is bounded by [`ActuationSettings::publish_timeout`] and
//! attempted once.

use std::sync::Arc;
use std::time::Duration;

use rangelight_middleware::{ActuatorBroker, topics};
use rangelight_store::{Store, catalog, status};
use rangelight_types::{LightError, Rgb};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::color::{ColorResolution, ColorResolver, resolve_color};
use crate::command::{self, SensorControl, TriggerCommand};
use crate::range::range_limits;
use crate::segment::map_segment;

/// Tunables of the actuation path.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuationSettings {
    /// LEDs per strip.
    pub strip_length: u32,
    /// Seconds a triggered segment stays lit. The stored `light_duration`
    /// row is not consulted.
    pub duration: u32,
    /// Naming convention: strip of sensor `front` is `<prefix>front`.
    pub strip_prefix: String,
    /// Colour sent when all strips are switched on.
    pub all_on: Rgb,
    pub publish_timeout: Duration,
}

impl Default for ActuationSettings {
    fn default() -> Self {
        Self {
            strip_length: 30,
            duration: 3,
            strip_prefix: "ledstrip".to_string(),
            all_on: Rgb::WHITE,
            publish_timeout: Duration::from_secs(2),
        }
    }
}

/// What [`ActuationPublisher::trigger`] sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub topic: String,
    pub message: String,
    pub segment: String,
    pub colour: Rgb,
    #[serde(rename = "range_ID")]
    pub range_id: i64,
}

#[derive(Clone)]
pub struct ActuationPublisher {
    store: Store,
    broker: Arc<dyn ActuatorBroker>,
    resolver: ColorResolver,
    settings: Arc<ActuationSettings>,
}

impl ActuationPublisher {
    pub fn new(store: Store, broker: Arc<dyn ActuatorBroker>, settings: ActuationSettings) -> Self {
        let resolver = ColorResolver::new(store.clone(), settings.strip_prefix.clone());
        Self {
            store,
            broker,
            resolver,
            settings: Arc::new(settings),
        }
    }

    /// The colour pipeline alone, without publishing.
    pub async fn resolve_color(&self, sensor_name: &str, distance: f64) -> Result<Rgb, LightError> {
        Ok(self.resolver.resolve(sensor_name, distance).await?.rgb)
    }

    /// Light the segment of `sensor_id`'s strip that corresponds to
    /// `distance`.
    ///
    /// On broker failure the error carries the composed message.
    #[instrument(skip(self))]
    pub async fn trigger(&self, sensor_id: i64, distance: f64) -> Result<Trigger, LightError> {
        let prefix = self.settings.strip_prefix.clone();
        let resolution: ColorResolution = self
            .store
            .call("compute LED trigger", move |conn| {
                let sensor =
                    catalog::sensor(conn, sensor_id)?.ok_or(LightError::UnknownSensor(sensor_id))?;
                resolve_color(conn, &sensor.sensor_name, distance, &prefix)
            })
            .await?;

        let segment = map_segment(
            resolution.index,
            resolution.partitions,
            self.settings.strip_length,
        )?;
        let message = TriggerCommand {
            segment,
            rgb: resolution.rgb,
            duration: self.settings.duration,
        }
        .to_string();
        let topic = topics::trigger_topic(sensor_id);

        self.publish(&topic, &message).await?;
        Ok(Trigger {
            topic,
            message,
            segment: segment.to_string(),
            colour: resolution.rgb,
            range_id: resolution.range.id,
        })
    }

    /// Publish `message` verbatim to `sensor_id`'s trigger topic and return
    /// the topic.
    pub async fn send_raw_trigger(&self, sensor_id: i64, message: &str) -> Result<String, LightError> {
        if message.trim().is_empty() {
            return Err(LightError::validation("message must not be empty"));
        }
        let topic = topics::trigger_topic(sensor_id);
        self.publish(&topic, message).await?;
        Ok(topic)
    }

    /// Flip the global switch, persist it, and announce the new state.
    /// Returns `true` when the strips are now on.
    #[instrument(skip(self))]
    pub async fn toggle_all_leds(&self) -> Result<bool, LightError> {
        let on = self
            .store
            .call("update LED status", |conn| status::toggle_led_switch(conn))
            .await?;
        let payload = command::switch_payload(on, self.settings.all_on);
        self.publish(topics::CONTROL_LED_ON, &payload).await?;
        Ok(on)
    }

    pub async fn send_sensor_control(&self, control: SensorControl) -> Result<(), LightError> {
        self.publish(topics::CONTROL_DISTANCE_SENSOR, control.as_str()).await
    }

    pub async fn send_mute(&self) -> Result<(), LightError> {
        self.publish(topics::AUDIO_MUTE, command::MUTE).await
    }

    /// Announce the close and mid upper limits. Returns the payload sent.
    pub async fn publish_range_limits(&self) -> Result<String, LightError> {
        let ranges = self
            .store
            .call("fetch ranges", |conn| catalog::ranges(conn))
            .await?;
        let (close, mid) = range_limits(&ranges)?;
        let payload = command::range_limits_payload(close, mid);
        self.publish(topics::CONFIG_RANGE_LEDSTRIP, &payload).await?;
        Ok(payload)
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), LightError> {
        let limit = self.settings.publish_timeout;
        match tokio::time::timeout(limit, self.broker.publish(topic, payload)).await {
            Ok(Ok(())) => {
                info!(topic, payload, "published");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(topic, payload, error = %e, "publish failed");
                Err(e.into_light(topic, payload))
            }
            Err(_) => {
                warn!(topic, payload, timeout_ms = limit.as_millis() as u64, "publish timed out");
                Err(LightError::PublishFailed {
                    topic: topic.to_string(),
                    payload: payload.to_string(),
                    reason: format!("timed out after {} ms", limit.as_millis()),
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rangelight_middleware::MemoryBroker;
    use rangelight_store::schema;

    async fn fixture(settings: ActuationSettings) -> (ActuationPublisher, Arc<MemoryBroker>) {
        let store = Store::open_in_memory().unwrap();
        store.execute_batch(schema::DEMO_SEED).await.unwrap();
        let broker = Arc::new(MemoryBroker::new());
        let publisher = ActuationPublisher::new(store, broker.clone(), settings);
        (publisher, broker)
    }

    #[tokio::test]
    async fn close_reading_lights_first_third_in_red() {
        let (publisher, broker) = fixture(ActuationSettings::default()).await;
        let sent = publisher.trigger(1, 12.0).await.unwrap();

        assert_eq!(sent.topic, "trigger/ledstrip1");
        assert_eq!(sent.message, "0-9&255,0,0&3");
        assert_eq!(sent.segment, "0-9");
        assert_eq!(sent.range_id, 1);

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "trigger/ledstrip1");
        assert_eq!(published[0].payload, "0-9&255,0,0&3");
    }

    #[tokio::test]
    async fn far_reading_uses_last_segment() {
        let (publisher, _) = fixture(ActuationSettings::default()).await;
        let sent = publisher.trigger(1, 75.0).await.unwrap();
        assert_eq!(sent.message, "20-29&0,0,255&3");
    }

    #[tokio::test]
    async fn stored_light_duration_does_not_change_triggers() {
        let (publisher, _) = fixture(ActuationSettings::default()).await;
        publisher
            .store
            .call("create light duration", |c| catalog::replace_light_duration(c, 9))
            .await
            .unwrap();
        let sent = publisher.trigger(1, 12.0).await.unwrap();
        assert_eq!(sent.message, "0-9&255,0,0&3");
    }

    #[tokio::test]
    async fn segment_count_follows_live_ranges() {
        let (publisher, _) = fixture(ActuationSettings::default()).await;
        publisher
            .store
            .execute_batch(
                "INSERT INTO sensor_range (range_id, range_name, lower_limit, upper_limit)
                     VALUES (4, 'beyond', 200, 400);
                 INSERT INTO sensor_light (led_strip_id, range_id, colour_id) VALUES (1, 4, 2);",
            )
            .await
            .unwrap();
        let sent = publisher.trigger(1, 250.0).await.unwrap();
        assert_eq!(sent.segment, "22-29");
        let sent = publisher.trigger(1, 1.0).await.unwrap();
        assert_eq!(sent.segment, "0-6");
    }

    #[tokio::test]
    async fn unknown_sensor_publishes_nothing() {
        let (publisher, broker) = fixture(ActuationSettings::default()).await;
        assert_eq!(
            publisher.trigger(9, 12.0).await.unwrap_err(),
            LightError::UnknownSensor(9)
        );
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn broker_failure_reports_composed_message() {
        let (publisher, broker) = fixture(ActuationSettings::default()).await;
        broker.fail_with("connection refused");
        let err = publisher.trigger(1, 12.0).await.unwrap_err();
        assert!(matches!(
            &err,
            LightError::PublishFailed { topic, payload, .. }
                if topic == "trigger/ledstrip1" && payload == "0-9&255,0,0&3"
        ));
        assert!(err.to_string().contains("0-9&255,0,0&3"));
    }

    #[tokio::test]
    async fn stalled_broker_times_out() {
        let settings = ActuationSettings {
            publish_timeout: Duration::from_millis(20),
            ..ActuationSettings::default()
        };
        let (publisher, broker) = fixture(settings).await;
        broker.stall_for(Duration::from_millis(500));
        let err = publisher.send_mute().await.unwrap_err();
        assert!(err.to_string().contains("timed out after 20 ms"));
    }

    #[tokio::test]
    async fn toggle_alternates_on_and_off() {
        let (publisher, broker) = fixture(ActuationSettings::default()).await;
        assert!(publisher.toggle_all_leds().await.unwrap());
        assert_eq!(
            broker.last_on(topics::CONTROL_LED_ON).unwrap().payload,
            "255,255,255,1"
        );
        assert!(!publisher.toggle_all_leds().await.unwrap());
        assert_eq!(
            broker.last_on(topics::CONTROL_LED_ON).unwrap().payload,
            "0,0,0,0"
        );
    }

    #[tokio::test]
    async fn control_mute_and_limits_topics() {
        let (publisher, broker) = fixture(ActuationSettings::default()).await;
        publisher.send_sensor_control(SensorControl::Sleep).await.unwrap();
        publisher.send_mute().await.unwrap();
        assert_eq!(publisher.publish_range_limits().await.unwrap(), "20,60");
        let topic = publisher.send_raw_trigger(2, "0-4&1,2,3&1").await.unwrap();
        assert_eq!(topic, "trigger/ledstrip2");

        let sent: Vec<(String, String)> = broker
            .published()
            .into_iter()
            .map(|p| (p.topic, p.payload))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("control/distance_sensor".into(), "sleep".into()),
                ("audio/mute".into(), "mute".into()),
                ("config/range_ledstrip".into(), "20,60".into()),
                ("trigger/ledstrip2".into(), "0-4&1,2,3&1".into()),
            ]
        );
        assert!(publisher.send_raw_trigger(2, "  ").await.is_err());
    }

    #[tokio::test]
    async fn resolve_color_does_not_publish() {
        let (publisher, broker) = fixture(ActuationSettings::default()).await;
        assert_eq!(
            publisher.resolve_color("front", 30.0).await.unwrap(),
            Rgb::new(0, 255, 0)
        );
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn timed_out_toggle_leaves_switch_and_broker_alone() {
        let store = Store::open_in_memory()
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let broker = Arc::new(MemoryBroker::new());
        let publisher =
            ActuationPublisher::new(store.clone(), broker.clone(), ActuationSettings::default());

        let (held_tx, held_rx) = tokio::sync::oneshot::channel();
        let holder = store.clone().with_timeout(Duration::from_secs(5));
        let busy = tokio::spawn(async move {
            holder
                .call("hold connection", move |_| {
                    let _ = held_tx.send(());
                    std::thread::sleep(Duration::from_millis(200));
                    Ok(())
                })
                .await
        });
        held_rx.await.unwrap();

        let err = publisher.toggle_all_leds().await.unwrap_err();
        assert!(matches!(err, LightError::Timeout { ref operation, after_ms: 50 } if operation == "update LED status"));

        busy.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let on = store
            .with_timeout(Duration::from_secs(5))
            .call("fetch LED status", |c| status::led_switch(c))
            .await
            .unwrap();
        assert!(!on);
        assert!(broker.last_on(topics::CONTROL_LED_ON).is_none());
    }
}
