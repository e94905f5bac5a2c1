//! Request/response envelopes exchanged with WebSocket clients.
//!
//! Inbound: `{"action": "...", "payload": {...}}`.
//! Outbound: `{"action": "...", "data" | "message" | "error": ...}` with
//! exactly one of the three body keys.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Action name used for dispatcher-level failures.
pub const ERROR_ACTION: &str = "error";

/// One inbound request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Body of an outbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Data(Value),
    Message(String),
    Error(String),
}

/// One outbound frame, either a reply or a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub action: String,
    #[serde(flatten)]
    pub body: Body,
}

impl Response {
    pub fn message(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            body: Body::Message(message.into()),
        }
    }

    pub fn error(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            body: Body::Error(error.into()),
        }
    }

    /// `{"action":"error","message":...}`, the frame sent for requests that
    /// never reached a handler.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::message(ERROR_ACTION, message)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
}

/// Deserialize an optional boolean that clients send either as `true`/`false`
/// or as `0`/`1`.
///
/// Use together with `#[serde(default)]` so a missing key becomes `None`.
pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawFlag>::deserialize(deserializer)?;
    Ok(raw.map(|flag| match flag {
        RawFlag::Bool(b) => b,
        RawFlag::Int(i) => i != 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Flags {
        #[serde(default, deserialize_with = "optional_flag")]
        active: Option<bool>,
        #[serde(default, deserialize_with = "optional_flag")]
        awake: Option<bool>,
    }

    #[test]
    fn envelope_without_payload_parses() {
        let env: Envelope = serde_json::from_str(r#"{"action":"getSensors"}"#).unwrap();
        assert_eq!(env.action, "getSensors");
        assert!(env.payload.is_none());
    }

    #[test]
    fn envelope_without_action_is_rejected() {
        assert!(serde_json::from_str::<Envelope>(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn response_carries_exactly_one_body_key() {
        let reply = Response::message("logSensorData", "ok");
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value, json!({"action": "logSensorData", "message": "ok"}));

        let reply = Response::error("getSensors", "Failed to fetch sensors");
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value, json!({"action": "getSensors", "error": "Failed to fetch sensors"}));
    }

    #[test]
    fn rejected_uses_error_action_with_message() {
        let value = serde_json::to_value(Response::rejected("Unknown action: doThing")).unwrap();
        assert_eq!(value, json!({"action": "error", "message": "Unknown action: doThing"}));
    }

    #[test]
    fn data_response_parses_back() {
        let text = r#"{"action":"getSensors","data":[{"sensor_ID":1}]}"#;
        let reply: Response = serde_json::from_str(text).unwrap();
        assert_eq!(reply.action, "getSensors");
        assert!(matches!(reply.body, Body::Data(Value::Array(_))));
    }

    #[test]
    fn flags_accept_bools_and_integers() {
        let flags: Flags = serde_json::from_value(json!({"active": 1, "awake": false})).unwrap();
        assert_eq!(flags.active, Some(true));
        assert_eq!(flags.awake, Some(false));

        let flags: Flags = serde_json::from_value(json!({"awake": 0})).unwrap();
        assert_eq!(flags.active, None);
        assert_eq!(flags.awake, Some(false));
    }
}
