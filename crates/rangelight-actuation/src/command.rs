//! Text payloads understood by the strip and sensor firmware.

use std::fmt;
use std::str::FromStr;

use rangelight_types::{LightError, Rgb};

use crate::segment::Segment;

/// Payload sent to `audio/mute`.
pub const MUTE: &str = "mute";

/// Payload sent to `control/led_on` to switch every strip off.
pub const ALL_OFF: &str = "0,0,0,0";

/// Light `segment` in `rgb` for `duration` seconds:
/// `<start>-<end>&<r>,<g>,<b>&<duration>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerCommand {
    pub segment: Segment,
    pub rgb: Rgb,
    pub duration: u32,
}

impl fmt::Display for TriggerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}&{}&{}", self.segment, self.rgb, self.duration)
    }
}

/// Global switch payload: `<r>,<g>,<b>,1` when on, [`ALL_OFF`] when off.
pub fn switch_payload(on: bool, colour: Rgb) -> String {
    if on {
        format!("{colour},1")
    } else {
        ALL_OFF.to_string()
    }
}

/// `<closeUpper>,<midUpper>` as announced on `config/range_ledstrip`.
pub fn range_limits_payload(close_upper: f64, mid_upper: f64) -> String {
    format!("{close_upper},{mid_upper}")
}

/// Power state requested from the distance sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorControl {
    Sleep,
    Wake,
}

impl SensorControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorControl::Sleep => "sleep",
            SensorControl::Wake => "wake",
        }
    }
}

impl FromStr for SensorControl {
    type Err = LightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sleep" => Ok(SensorControl::Sleep),
            "wake" => Ok(SensorControl::Wake),
            other => Err(LightError::validation(format!(
                "control action must be \"sleep\" or \"wake\", got {other:?}"
            ))),
        }
    }
}
