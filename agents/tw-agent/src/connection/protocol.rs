//! Message Protocol
//!
//! Messages exchanged with the server over the agent connection. Only the
//! keepalive signal is interpreted; everything else is passed over.

use serde::{Deserialize, Serialize};

/// Messages sent from the agent to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AgentMessage {
    /// Keepalive signal, no payload
    Heartbeat,
}

/// Messages sent from the server to the agent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Heartbeat echoed back by the server
    Heartbeat,

    /// Any message type this agent does not act on
    #[serde(other)]
    Other,
}

impl AgentMessage {
    /// Create a heartbeat message
    pub fn heartbeat() -> Self {
        AgentMessage::Heartbeat
    }

    /// Serialize the message to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    /// Deserialize a message from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
