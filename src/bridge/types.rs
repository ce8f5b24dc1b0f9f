//! Core value types shared across the bridge.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Normalized payload shape presented to the UI.
///
/// The tag always carries the canonical event name, so the UI observes a
/// stable vocabulary even when the wire name differs between vocabulary
/// versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub tag: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(tag: impl Into<String>, data: Value) -> Self {
        Self {
            tag: tag.into(),
            data,
        }
    }

    /// Render the envelope as the JSON value sent to the port.
    pub fn into_value(self) -> Value {
        json!({ "tag": self.tag, "data": self.data })
    }
}

/// Connection lifecycle as seen by the bridge.
///
/// Owned solely by the bridge and mutated only in response to transport
/// lifecycle events. Reconnection itself is the transport's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Joined,
    Errored,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Joined => write!(f, "joined"),
            ConnectionStatus::Errored => write!(f, "errored"),
        }
    }
}
