//! Records owned by the relational store.
//!
//! Field names on the wire follow the column names the dashboards already
//! speak (`sensor_ID`, `LED_strip_name`, …), so every struct carries explicit
//! `serde` renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical distance sensor. Reference data, never mutated by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    #[serde(rename = "sensor_ID")]
    pub id: i64,
    pub sensor_name: String,
}

/// One distance bucket. Matching is half-open: `lower <= d < upper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(rename = "range_ID")]
    pub id: i64,
    #[serde(rename = "range_name")]
    pub name: String,
    #[serde(rename = "lower_limit")]
    pub lower: f64,
    #[serde(rename = "upper_limit")]
    pub upper: f64,
}

impl Range {
    /// Whether `distance` falls inside this bucket.
    pub fn contains(&self, distance: f64) -> bool {
        self.lower <= distance && distance < self.upper
    }
}

/// A reading joined with its sensor name, newest first in every listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingView {
    #[serde(rename = "input_ID")]
    pub id: i64,
    #[serde(rename = "sensor_ID")]
    pub sensor_id: i64,
    pub sensor_name: String,
    pub distance: f64,
    pub timestamp: DateTime<Utc>,
}

/// An RGB triple as sent to the strips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.red, self.green, self.blue)
    }
}

/// A named colour from the `colour` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colour {
    #[serde(rename = "colour_ID")]
    pub id: i64,
    pub colour_name: String,
    #[serde(flatten)]
    pub rgb: Rgb,
}

/// An LED strip with its liveness flags and fallback colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedStrip {
    #[serde(rename = "LED_strip_ID")]
    pub id: i64,
    #[serde(rename = "LED_strip_name")]
    pub name: String,
    #[serde(rename = "LED_alive")]
    pub alive: bool,
    #[serde(rename = "LED_active")]
    pub active: bool,
    #[serde(rename = "colour_ID")]
    pub colour_id: i64,
}

/// Which colour a strip shows for a given range. Unique per (strip, range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripColorBinding {
    #[serde(rename = "LED_strip_ID")]
    pub strip_id: i64,
    #[serde(rename = "range_ID")]
    pub range_id: i64,
    #[serde(rename = "colour_ID")]
    pub colour_id: i64,
}

/// Liveness record of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorLiveness {
    #[serde(rename = "sensor_ID")]
    pub sensor_id: i64,
    pub active: bool,
    pub awake: bool,
}

/// Partial update of a sensor liveness record. `None` leaves the stored
/// value untouched (or defaults to `false` on insert).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorStatusUpdate {
    pub active: Option<bool>,
    pub awake: Option<bool>,
}

/// Partial update of an LED strip record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripStatusUpdate {
    pub active: Option<bool>,
    pub alive: Option<bool>,
    pub colour_id: Option<i64>,
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Upserted {
    Inserted,
    Updated,
}

impl Upserted {
    pub fn as_str(&self) -> &'static str {
        match self {
            Upserted::Inserted => "inserted",
            Upserted::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightDuration {
    #[serde(rename = "light_duration_ID")]
    pub id: i64,
    pub duration: u32,
}
