//! Broker topic names understood by the strip and sensor firmware.
//!
//! | Topic | Payload |
//! |---|---|
//! | [`CONTROL_DISTANCE_SENSOR`] | `sleep` or `wake` |
//! | [`AUDIO_MUTE`] | `mute` |
//! | [`CONTROL_LED_ON`] | `r,g,b,1` (all on) or `0,0,0,0` (all off) |
//! | [`CONFIG_RANGE_LEDSTRIP`] | `<closeUpper>,<midUpper>` |
//! | `trigger/ledstrip<sensor_id>` | `<start>-<end>&<r>,<g>,<b>&<duration>` |

pub const CONTROL_DISTANCE_SENSOR: &str = "control/distance_sensor";
pub const AUDIO_MUTE: &str = "audio/mute";
pub const CONTROL_LED_ON: &str = "control/led_on";
pub const CONFIG_RANGE_LEDSTRIP: &str = "config/range_ledstrip";

const TRIGGER_PREFIX: &str = "trigger/ledstrip";

/// Trigger topic of the strip driven by `sensor_id`.
pub fn trigger_topic(sensor_id: i64) -> String {
    format!("{TRIGGER_PREFIX}{sensor_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_topic_appends_sensor_id() {
        assert_eq!(trigger_topic(1), "trigger/ledstrip1");
        assert_eq!(trigger_topic(42), "trigger/ledstrip42");
    }
}
