//! Request handlers and the boundary around them.
//!
//! Handlers return `Result<Body, LightError>`; [`handle`] bounds each call
//! by the request timeout, logs failures and turns the result into exactly
//! one [`Response`].
//!
//! | Module | Actions |
//! |---|---|
//! | [`sensors`] | readings, sensor liveness, fleet power flag, triggers, colour lookup |
//! | [`ledstrips`] | strips, colours, bindings, global switch |
//! | [`ranges`] | range listing, editing and limits |
//! | [`control`] | light duration, mute, sensor power commands |

pub mod control;
pub mod ledstrips;
pub mod ranges;
pub mod sensors;

use rangelight_types::{Body, ErrorKind, LightError, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, instrument, warn};

use crate::context::AppContext;
use crate::dispatcher::Action;

/// Run the handler bound to `action` and build its response.
#[instrument(skip(ctx, action, payload), fields(action = action.as_str()))]
pub async fn handle(ctx: &AppContext, action: Action, payload: Option<Value>) -> Response {
    let limit = ctx.settings.request_timeout;
    let outcome = match tokio::time::timeout(limit, route(ctx, action, payload)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(LightError::Timeout {
            operation: action.as_str().to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    };

    match outcome {
        Ok(body) => Response {
            action: action.reply_name().to_string(),
            body,
        },
        Err(e) => {
            match e.kind() {
                ErrorKind::Validation | ErrorKind::NotFound => {
                    warn!(kind = ?e.kind(), error = %e, "request rejected")
                }
                _ => error!(kind = ?e.kind(), error = %e, "request failed"),
            }
            Response::error(action.reply_name(), e.to_string())
        }
    }
}

async fn route(ctx: &AppContext, action: Action, payload: Option<Value>) -> Result<Body, LightError> {
    match action {
        Action::LogSensorData => sensors::log_sensor_data(ctx, payload).await,
        Action::GetLogs => sensors::get_logs(ctx).await,
        Action::GetSensors => sensors::get_sensors(ctx).await,
        Action::UpdateSensorStatus => sensors::update_sensor_status(ctx, payload).await,
        Action::GetSensorStatus => sensors::get_sensor_status(ctx).await,
        Action::GetAllSensorAwakeInfo => sensors::get_all_sensor_awake_info(ctx).await,
        Action::GetSensorsOn => sensors::get_sensors_on(ctx).await,
        Action::UpdateAllSensorsStatus => sensors::update_all_sensors_status(ctx, payload).await,
        Action::GetLedTriggerPayload => sensors::get_led_trigger_payload(ctx, payload).await,
        Action::SendLedTrigger => sensors::send_led_trigger(ctx, payload).await,
        Action::DetermineLedColor => sensors::determine_led_color(ctx, payload).await,

        Action::UpdateLedStripStatus => ledstrips::update_led_strip_status(ctx, payload).await,
        Action::UpdateSensorLightColour => ledstrips::update_sensor_light_colour(ctx, payload).await,
        Action::UpdateLedStatus => ledstrips::update_led_status(ctx).await,
        Action::GetColours => ledstrips::get_colours(ctx).await,
        Action::GetSensorLight => ledstrips::get_sensor_light(ctx).await,
        Action::CreateSensorLight => ledstrips::create_sensor_light(ctx, payload).await,
        Action::GetSensorLightById => ledstrips::get_sensor_light_by_id(ctx, payload).await,
        Action::FetchLedStripId => ledstrips::fetch_led_strip_id(ctx, payload).await,
        Action::FetchColourRgb => ledstrips::fetch_colour_rgb(ctx, payload).await,
        Action::UpdateLedStripColor => ledstrips::update_led_strip_color(ctx, payload).await,
        Action::FetchInitialLedData => ledstrips::fetch_initial_led_data(ctx).await,

        Action::FetchSensorRanges => ranges::fetch_sensor_ranges(ctx).await,
        Action::GetRanges => ranges::get_ranges(ctx).await,
        Action::UpdateRange => ranges::update_range(ctx, payload).await,
        Action::GetRangeLimits => ranges::get_range_limits(ctx).await,

        Action::FetchLightDuration => control::fetch_light_duration(ctx).await,
        Action::GetLightDurations => control::get_light_durations(ctx).await,
        Action::CreateLightDuration => control::create_light_duration(ctx, payload).await,
        Action::GetMute => control::get_mute(ctx).await,
        Action::UpdateMute => control::update_mute(ctx, payload).await,
        Action::GetMuteStatus => control::get_mute_status(ctx).await,
        Action::UpdateMuteStatus => control::update_mute_status(ctx, payload).await,
        Action::SendControlMessage => control::send_control_message(ctx, payload).await,
        Action::SendMuteMessage => control::send_mute_message(ctx).await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers shared by the handler modules
// ─────────────────────────────────────────────────────────────────────────────

/// Decode the request payload. A missing payload decodes like `{}`.
pub(crate) fn parse<T: DeserializeOwned>(payload: Option<Value>) -> Result<T, LightError> {
    let value = match payload {
        Some(Value::Null) | None => Value::Object(Default::default()),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(|e| LightError::validation(e.to_string()))
}

pub(crate) fn data<T: Serialize + ?Sized>(value: &T) -> Result<Body, LightError> {
    serde_json::to_value(value)
        .map(Body::Data)
        .map_err(|_| LightError::Store {
            operation: "encode response".to_string(),
        })
}

pub(crate) fn message(text: impl Into<String>) -> Result<Body, LightError> {
    Ok(Body::Message(text.into()))
}

/// Reject non-finite distances before they reach the store.
pub(crate) fn finite(distance: f64) -> Result<f64, LightError> {
    if distance.is_finite() {
        Ok(distance)
    } else {
        Err(LightError::validation("distance must be a finite number"))
    }
}
