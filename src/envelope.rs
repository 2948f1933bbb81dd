// file: src/envelope.rs
// description: normalized wrapper around inbound frames from either channel

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Tag identifying what an inbound frame carries.
///
/// The push channel uses a closed set of named events; the duplex channel
/// answers with an open response-type string, carried as [`EventKind::Response`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Drift,
    Falco,
    StateChange,
    KeepAlive,
    Response(String),
}

impl EventKind {
    /// Map a push-channel event name to its kind. Unknown names are not
    /// events of this contract and are dropped by the caller.
    pub fn from_push_name(name: &str) -> Option<Self> {
        match name {
            "connected" => Some(Self::Connected),
            "drift" => Some(Self::Drift),
            "falco" => Some(Self::Falco),
            "state_change" => Some(Self::StateChange),
            "keep-alive" => Some(Self::KeepAlive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Drift => "drift",
            Self::Falco => "falco",
            Self::StateChange => "state_change",
            Self::KeepAlive => "keep-alive",
            Self::Response(kind) => kind,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One normalized inbound event.
///
/// `timestamp` is assigned at receipt; server-supplied timestamps live inside
/// `data` and are not trusted for ordering. Envelopes are immutable once
/// constructed — consumers clone, never mutate.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }
}
