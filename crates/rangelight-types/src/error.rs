use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error taxonomy reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Store,
    Publish,
    Timeout,
    UnknownAction,
}

/// Global error type spanning payload validation, lookup misses, store and
/// broker failures.
///
/// The `Display` text is what clients see in the `error` field, so store
/// failures carry only the operation that failed, never the driver message.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LightError {
    #[error("Invalid input data: {0}")]
    Validation(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown sensor: {0}")]
    UnknownSensor(i64),

    #[error("No range covers distance {distance}")]
    NoMatchingRange { distance: f64 },

    #[error("Invalid distance range: {distance}")]
    InvalidDistance { distance: f64 },

    #[error("Invalid sensor name: no LED strip named {name}")]
    UnknownStrip { name: String },

    #[error("No matching color found for strip {strip_id} and range {range_id}")]
    NoBinding { strip_id: i64, range_id: i64 },

    #[error("Invalid color ID: {colour_id}")]
    InvalidColour { colour_id: i64 },

    #[error("No default colour_ID found")]
    NoDefaultColour,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Cannot split a strip of {strip_length} LEDs into {partitions} segments")]
    SegmentLayout { strip_length: u32, partitions: usize },

    #[error("Failed to {operation}")]
    Store { operation: String },

    #[error("Failed to publish {payload:?} to {topic}: {reason}")]
    PublishFailed {
        topic: String,
        payload: String,
        reason: String,
    },

    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl LightError {
    pub fn validation(details: impl Into<String>) -> Self {
        LightError::Validation(details.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LightError::NotFound(what.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LightError::Validation(_) | LightError::InvalidMessage(_) => ErrorKind::Validation,
            LightError::UnknownAction(_) => ErrorKind::UnknownAction,
            LightError::UnknownSensor(_)
            | LightError::NoMatchingRange { .. }
            | LightError::InvalidDistance { .. }
            | LightError::UnknownStrip { .. }
            | LightError::NoBinding { .. }
            | LightError::InvalidColour { .. }
            | LightError::NoDefaultColour
            | LightError::NotFound(_)
            | LightError::SegmentLayout { .. } => ErrorKind::NotFound,
            LightError::Store { .. } => ErrorKind::Store,
            LightError::PublishFailed { .. } => ErrorKind::Publish,
            LightError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}
