//! `rangelight-types` – shared vocabulary of the bridge.
//!
//! - [`model`] – records owned by the relational store (sensors, ranges,
//!   readings, colours, strips, bindings, liveness).
//! - [`wire`] – the `{action, payload}` request envelope and the
//!   `{action, data|message|error}` response frame.
//! - [`LightError`] – the error taxonomy every handler reports through.

pub mod error;
pub mod model;
pub mod wire;

pub use error::{ErrorKind, LightError};
pub use model::{
    Colour, LedStrip, LightDuration, Range, ReadingView, Rgb, Sensor, SensorLiveness,
    SensorStatusUpdate, StripColorBinding, StripStatusUpdate, Upserted,
};
pub use wire::{Body, Envelope, Response, ERROR_ACTION};
