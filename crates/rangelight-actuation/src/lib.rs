//! `rangelight-actuation` – from a distance reading to a lit LED segment.
//!
//! # Modules
//!
//! - [`range`] – half-open range matching and lower-bound ordering.
//! - [`segment`] – splitting a strip into one span per range.
//! - [`color`] – the sensor → strip → binding → colour pipeline.
//! - [`command`] – firmware payload formats.
//! - [`publisher`] – [`ActuationPublisher`], which composes and publishes
//!   commands through an [`ActuatorBroker`][rangelight_middleware::ActuatorBroker].

pub mod color;
pub mod command;
pub mod publisher;
pub mod range;
pub mod segment;

pub use color::{ColorResolution, ColorResolver};
pub use command::{SensorControl, TriggerCommand};
pub use publisher::{ActuationPublisher, ActuationSettings, Trigger};
pub use range::resolve_range;
pub use segment::{Segment, map_segment};
