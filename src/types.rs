/// file: src/types.rs
/// description: wire contract for the duplex channel (commands and responses)
use crate::envelope::{Envelope, EventKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named subscription categories understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    All,
    Drifts,
    Events,
    State,
    Stats,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Drifts => "drifts",
            Self::Events => "events",
            Self::State => "state",
            Self::Stats => "stats",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Subscribe,
    Unsubscribe,
    Ping,
    Query,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscribe => write!(f, "subscribe"),
            Self::Unsubscribe => write!(f, "unsubscribe"),
            Self::Ping => write!(f, "ping"),
            Self::Query => write!(f, "query"),
        }
    }
}

/// Client → server command frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCommand {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ClientCommand {
    pub fn subscribe(topic: Topic) -> Self {
        Self {
            kind: CommandKind::Subscribe,
            topic: Some(topic),
            payload: None,
        }
    }

    pub fn unsubscribe(topic: Topic) -> Self {
        Self {
            kind: CommandKind::Unsubscribe,
            topic: Some(topic),
            payload: None,
        }
    }

    pub fn ping() -> Self {
        Self {
            kind: CommandKind::Ping,
            topic: None,
            payload: None,
        }
    }

    pub fn query(payload: Value) -> Self {
        Self {
            kind: CommandKind::Query,
            topic: None,
            payload: Some(payload),
        }
    }
}

/// Server → client response frame. The response type is an open string — the
/// transport layer does not interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ServerMessage {
    /// Normalize into the shared envelope shape; the capture timestamp is
    /// assigned here, not taken from the server.
    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(EventKind::Response(self.kind.clone()), self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_matches_wire_contract() {
        let json = serde_json::to_value(ClientCommand::subscribe(Topic::Drifts)).unwrap();
        assert_eq!(json, json!({"type": "subscribe", "topic": "drifts"}));
    }

    #[test]
    fn ping_omits_optional_fields() {
        let text = serde_json::to_string(&ClientCommand::ping()).unwrap();
        assert_eq!(text, r#"{"type":"ping"}"#);
    }

    #[test]
    fn query_carries_payload() {
        let json = serde_json::to_value(ClientCommand::query(json!({"window": "1h"}))).unwrap();
        assert_eq!(json, json!({"type": "query", "payload": {"window": "1h"}}));
    }

    #[test]
    fn topics_use_lowercase_names() {
        for (topic, name) in [
            (Topic::All, "all"),
            (Topic::Drifts, "drifts"),
            (Topic::Events, "events"),
            (Topic::State, "state"),
            (Topic::Stats, "stats"),
        ] {
            assert_eq!(serde_json::to_value(topic).unwrap(), json!(name));
            assert_eq!(topic.as_str(), name);
        }
    }

    #[test]
    fn server_message_tolerates_missing_optionals() {
        let message: ServerMessage =
            serde_json::from_str(r#"{"type": "pong", "payload": null}"#).unwrap();
        assert_eq!(message.kind, "pong");
        assert_eq!(message.topic, None);
        assert_eq!(message.payload, Value::Null);
        assert_eq!(message.timestamp, None);
    }

    #[test]
    fn server_message_normalizes_to_envelope() {
        let message: ServerMessage = serde_json::from_str(
            r#"{"type": "stats_result", "topic": "stats", "payload": {"drifts": 4}, "timestamp": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let envelope = message.to_envelope();
        assert_eq!(envelope.kind.as_str(), "stats_result");
        assert_eq!(envelope.data["drifts"], 4);
        // Capture time is local, not the server-supplied string.
        assert_ne!(envelope.timestamp.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }
}
