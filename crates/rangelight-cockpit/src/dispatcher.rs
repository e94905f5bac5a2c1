//! Frame → action → handler.
//!
//! Every text frame must be an envelope `{"action": ..., "payload": {...}}`.
//! A frame that is not, or that names an action outside [`Action`], is
//! answered with `{"action":"error","message":...}` and the channel stays
//! open. Known actions go through [`crate::handlers::handle`], which always
//! yields exactly one response.

use rangelight_types::{Envelope, LightError, Response};
use serde_json::Value;
use tracing::warn;

use crate::context::AppContext;
use crate::handlers;

/// The closed set of actions a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    LogSensorData,
    GetLedTriggerPayload,
    SendLedTrigger,
    UpdateSensorStatus,
    UpdateLedStripStatus,
    UpdateSensorLightColour,
    UpdateLedStatus,
    GetSensors,
    FetchSensorRanges,
    DetermineLedColor,
    GetLogs,
    GetRanges,
    UpdateRange,
    GetRangeLimits,
    GetColours,
    GetSensorLight,
    FetchLedStripId,
    FetchColourRgb,
    UpdateLedStripColor,
    FetchInitialLedData,
    GetSensorStatus,
    FetchLightDuration,
    GetLightDurations,
    CreateLightDuration,
    GetMute,
    UpdateMute,
    SendControlMessage,
    SendMuteMessage,
    CreateSensorLight,
    GetSensorLightById,
    GetAllSensorAwakeInfo,
    GetSensorsOn,
    UpdateAllSensorsStatus,
    GetMuteStatus,
    UpdateMuteStatus,
}

impl Action {
    pub const ALL: [Action; 35] = [
        Action::LogSensorData,
        Action::GetLedTriggerPayload,
        Action::SendLedTrigger,
        Action::UpdateSensorStatus,
        Action::UpdateLedStripStatus,
        Action::UpdateSensorLightColour,
        Action::UpdateLedStatus,
        Action::GetSensors,
        Action::FetchSensorRanges,
        Action::DetermineLedColor,
        Action::GetLogs,
        Action::GetRanges,
        Action::UpdateRange,
        Action::GetRangeLimits,
        Action::GetColours,
        Action::GetSensorLight,
        Action::FetchLedStripId,
        Action::FetchColourRgb,
        Action::UpdateLedStripColor,
        Action::FetchInitialLedData,
        Action::GetSensorStatus,
        Action::FetchLightDuration,
        Action::GetLightDurations,
        Action::CreateLightDuration,
        Action::GetMute,
        Action::UpdateMute,
        Action::SendControlMessage,
        Action::SendMuteMessage,
        Action::CreateSensorLight,
        Action::GetSensorLightById,
        Action::GetAllSensorAwakeInfo,
        Action::GetSensorsOn,
        Action::UpdateAllSensorsStatus,
        Action::GetMuteStatus,
        Action::UpdateMuteStatus,
    ];

    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::LogSensorData => "logSensorData",
            Action::GetLedTriggerPayload => "getLEDTriggerPayload",
            Action::SendLedTrigger => "sendLEDTrigger",
            Action::UpdateSensorStatus => "updateSensorStatus",
            Action::UpdateLedStripStatus => "updateLedStripStatus",
            Action::UpdateSensorLightColour => "updateSensorLightColour",
            Action::UpdateLedStatus => "updateLEDStatus",
            Action::GetSensors => "getSensors",
            Action::FetchSensorRanges => "fetchSensorRanges",
            Action::DetermineLedColor => "determineLEDColor",
            Action::GetLogs => "getLogs",
            Action::GetRanges => "getRanges",
            Action::UpdateRange => "updateRange",
            Action::GetRangeLimits => "getRangeLimits",
            Action::GetColours => "getColours",
            Action::GetSensorLight => "getSensorLight",
            Action::FetchLedStripId => "fetchLedStripId",
            Action::FetchColourRgb => "fetchColourRgb",
            Action::UpdateLedStripColor => "updateLedStripColor",
            Action::FetchInitialLedData => "fetch_initial_led_data",
            Action::GetSensorStatus => "getSensorStatus",
            Action::FetchLightDuration => "fetchLightDuration",
            Action::GetLightDurations => "getLightDurations",
            Action::CreateLightDuration => "createLightDuration",
            Action::GetMute => "getMute",
            Action::UpdateMute => "updateMute",
            Action::SendControlMessage => "sendControlMessage",
            Action::SendMuteMessage => "sendMuteMessage",
            Action::CreateSensorLight => "createSensorLight",
            Action::GetSensorLightById => "getSensorLightById",
            Action::GetAllSensorAwakeInfo => "getAllSensorAwakeInfo",
            Action::GetSensorsOn => "get_sensor_status",
            Action::UpdateAllSensorsStatus => "updateAllSensorsStatus",
            Action::GetMuteStatus => "get_mute_status",
            Action::UpdateMuteStatus => "update_mute_status",
        }
    }

    /// Action name echoed in the response. The two broker commands answer
    /// under the name the sensor apps listen for.
    pub fn reply_name(&self) -> &'static str {
        match self {
            Action::SendControlMessage => "control",
            Action::SendMuteMessage => "mute",
            other => other.as_str(),
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse one text frame into a routable request.
pub fn parse_frame(text: &str) -> Result<(Action, Option<Value>), LightError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| LightError::InvalidMessage(e.to_string()))?;
    let action =
        Action::from_name(&envelope.action).ok_or(LightError::UnknownAction(envelope.action))?;
    Ok((action, envelope.payload))
}

/// Produce the single response to one text frame.
pub async fn dispatch(ctx: &AppContext, text: &str) -> Response {
    match parse_frame(text) {
        Ok((action, payload)) => handlers::handle(ctx, action, payload).await,
        Err(e) => {
            warn!(error = %e, "rejected frame");
            Response::rejected(e.to_string())
        }
    }
}
