//! Light duration, mute flag and sensor power commands.

use rangelight_actuation::SensorControl;
use rangelight_middleware::topics;
use rangelight_store::{catalog, status};
use rangelight_types::wire::optional_flag;
use rangelight_types::{Body, LightError};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{data, message, parse};
use crate::context::AppContext;

pub async fn fetch_light_duration(ctx: &AppContext) -> Result<Body, LightError> {
    let duration = ctx
        .store
        .call("fetch light duration", |conn| catalog::light_duration(conn))
        .await?
        .ok_or_else(|| LightError::not_found("Light duration"))?;
    data(&duration)
}

pub async fn get_light_durations(ctx: &AppContext) -> Result<Body, LightError> {
    let durations = ctx
        .store
        .call("fetch light durations", |conn| catalog::light_durations(conn))
        .await?;
    data(&durations)
}

#[derive(Debug, Deserialize)]
struct DurationPayload {
    duration: u32,
}

/// Replace the configured light duration.
pub async fn create_light_duration(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let DurationPayload { duration } = parse(payload)?;
    if duration == 0 {
        return Err(LightError::validation("duration must be positive"));
    }
    let stored = ctx
        .store
        .call("create light duration", move |conn| {
            catalog::replace_light_duration(conn, duration)
        })
        .await?;
    message(format!("Light duration set to {}", stored.duration))
}

pub async fn get_mute(ctx: &AppContext) -> Result<Body, LightError> {
    let muted = ctx
        .store
        .call("fetch mute status", |conn| status::mute(conn))
        .await?;
    data(&json!({ "muted": muted }))
}

#[derive(Debug, Deserialize)]
struct MutePayload {
    #[serde(deserialize_with = "optional_flag")]
    muted: Option<bool>,
}

pub async fn update_mute(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let MutePayload { muted } = parse(payload)?;
    let muted = muted.ok_or_else(|| LightError::validation("muted must not be null"))?;
    ctx.store
        .call("update mute status", move |conn| status::set_mute(conn, muted))
        .await?;
    message(if muted { "Muted" } else { "Unmuted" })
}

/// Same flag as `getMute`, keyed `mute` for the audio app.
pub async fn get_mute_status(ctx: &AppContext) -> Result<Body, LightError> {
    let mute = ctx
        .store
        .call("fetch mute status", |conn| status::mute(conn))
        .await?;
    data(&json!({ "mute": mute }))
}

#[derive(Debug, Deserialize)]
struct MuteStatusPayload {
    #[serde(deserialize_with = "optional_flag")]
    mute: Option<bool>,
}

pub async fn update_mute_status(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let MuteStatusPayload { mute } = parse(payload)?;
    let mute = mute.ok_or_else(|| LightError::validation("mute must not be null"))?;
    let mute = ctx
        .store
        .call("update mute status", move |conn| status::set_mute(conn, mute))
        .await?;
    data(&json!({ "mute": mute }))
}

#[derive(Debug, Deserialize)]
struct ControlPayload {
    action: String,
}

/// Ask the distance sensors to sleep or wake. Replies under `control`.
pub async fn send_control_message(ctx: &AppContext, payload: Option<Value>) -> Result<Body, LightError> {
    let ControlPayload { action } = parse(payload)?;
    let control: SensorControl = action.parse()?;
    ctx.actuation.send_sensor_control(control).await?;
    message(format!(
        "Sent {} to {}",
        control.as_str(),
        topics::CONTROL_DISTANCE_SENSOR
    ))
}

/// Replies under `mute`.
pub async fn send_mute_message(ctx: &AppContext) -> Result<Body, LightError> {
    ctx.actuation.send_mute().await?;
    message(format!("Sent 'mute' to {}", topics::AUDIO_MUTE))
}
