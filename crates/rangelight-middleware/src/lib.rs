//! `rangelight-middleware` – transport plumbing between the bridge and the
//! outside world.
//!
//! Routes frames to WebSocket clients and commands to the LED controllers
//! without caring what they mean.
//!
//! # Modules
//!
//! - [`hub`] – registry of open client channels and best-effort broadcast.
//! - [`broker`] – the [`ActuatorBroker`] seam with an MQTT implementation and
//!   a recording in-memory one.
//! - [`topics`] – broker topic names.

pub mod broker;
pub mod hub;
pub mod topics;

pub use broker::{ActuatorBroker, BrokerError, MemoryBroker, MqttBroker, MqttSettings, Published};
pub use hub::{ClientId, ConnectionRegistry};
