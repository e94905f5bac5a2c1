//! Readings, sensor liveness and the trigger path.

use chrono::Utc;
use rangelight_store::{catalog, readings, status};
use rangelight_types::wire::optional_flag;
use rangelight_types::{Body, LightError, Response, SensorStatusUpdate};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{data, finite, message, parse};
use crate::context::AppContext;
use crate::dispatcher::Action;

#[derive(Debug, Deserialize)]
struct LogReading {
    #[serde(rename = "sensor_ID")]
    sensor_id: i64,
    distance: f64,
}

/// Append a reading, then broadcast the latest readings to every client.
pub async fn log_sensor_data(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let LogReading { sensor_id, distance } = parse(payload)?;
    let distance = finite(distance)?;
    let history = ctx.settings.broadcast_history;

    let recent = ctx
        .store
        .call("log sensor data", move |conn| {
            readings::append_reading(conn, sensor_id, distance, Utc::now())?;
            readings::recent_readings(conn, history)
        })
        .await?;
    info!(sensor_id, distance, "reading logged");

    let event = Response {
        action: Action::LogSensorData.as_str().to_string(),
        body: data(&recent)?,
    };
    match ctx.hub.broadcast(&event) {
        Ok(reached) => debug!(reached, "readings broadcast"),
        Err(e) => warn!(error = %e, "readings broadcast skipped"),
    }
    message("Sensor data logged successfully")
}

pub async fn get_logs(ctx: &AppContext) -> Result<Body, LightError> {
    let limit = ctx.settings.log_history;
    let logs = ctx
        .store
        .call("fetch logs", move |conn| readings::recent_readings(conn, limit))
        .await?;
    data(&logs)
}

pub async fn get_sensors(ctx: &AppContext) -> Result<Body, LightError> {
    let sensors = ctx
        .store
        .call("fetch sensors", |conn| catalog::sensors(conn))
        .await?;
    data(&sensors)
}

#[derive(Debug, Deserialize)]
struct SensorStatusPayload {
    sensor_id: i64,
    #[serde(default, deserialize_with = "optional_flag")]
    active: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    awake: Option<bool>,
}

pub async fn update_sensor_status(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let SensorStatusPayload {
        sensor_id,
        active,
        awake,
    } = parse(payload)?;
    let update = SensorStatusUpdate { active, awake };
    let (outcome, record) = ctx
        .store
        .call("update sensor status", move |conn| {
            status::upsert_sensor_status(conn, sensor_id, update)
        })
        .await?;
    info!(
        sensor_id,
        active = record.active,
        awake = record.awake,
        outcome = outcome.as_str(),
        "sensor status"
    );
    message(format!("Sensor status {} successfully", outcome.as_str()))
}

pub async fn get_sensor_status(ctx: &AppContext) -> Result<Body, LightError> {
    let statuses = ctx
        .store
        .call("fetch sensor status", |conn| status::sensor_statuses(conn))
        .await?;
    data(&statuses)
}

/// The fleet power flag as a one-row table.
pub async fn get_all_sensor_awake_info(ctx: &AppContext) -> Result<Body, LightError> {
    let on = ctx
        .store
        .call("fetch all sensors status", |conn| status::sensors_on(conn))
        .await?;
    data(&json!([{ "sensors_on": on }]))
}

pub async fn get_sensors_on(ctx: &AppContext) -> Result<Body, LightError> {
    let on = ctx
        .store
        .call("fetch all sensors status", |conn| status::sensors_on(conn))
        .await?;
    data(&json!({ "sensors_on": on }))
}

#[derive(Debug, Deserialize)]
struct SensorsOnPayload {
    #[serde(deserialize_with = "optional_flag")]
    sensors_on: Option<bool>,
}

pub async fn update_all_sensors_status(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let SensorsOnPayload { sensors_on } = parse(payload)?;
    let on = sensors_on.ok_or_else(|| LightError::validation("sensors_on must not be null"))?;
    ctx.store
        .call("update all sensors status", move |conn| status::set_sensors_on(conn, on))
        .await?;
    info!(sensors_on = on, "sensor fleet status");
    message("All sensors status updated successfully")
}

#[derive(Debug, Deserialize)]
struct TriggerPayload {
    sensor_id: i64,
    distance: f64,
}

/// Resolve, compose and publish the trigger for a reading.
pub async fn get_led_trigger_payload(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let TriggerPayload {
        sensor_id,
        distance,
    } = parse(payload)?;
    let trigger = ctx.actuation.trigger(sensor_id, finite(distance)?).await?;
    data(&trigger)
}

#[derive(Debug, Deserialize)]
struct RawTriggerPayload {
    sensor_id: i64,
    message: String,
}

pub async fn send_led_trigger(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let RawTriggerPayload { sensor_id, message: text } = parse(payload)?;
    let topic = ctx.actuation.send_raw_trigger(sensor_id, &text).await?;
    message(format!("Sent {text} to {topic}"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColorPayload {
    sensor_name: String,
    distance: f64,
}

pub async fn determine_led_color(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let ColorPayload {
        sensor_name,
        distance,
    } = parse(payload)?;
    let rgb = ctx
        .actuation
        .resolve_color(&sensor_name, finite(distance)?)
        .await?;
    data(&rgb)
}
