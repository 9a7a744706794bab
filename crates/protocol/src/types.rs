use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data type of a signal exchanged between peers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Floating point value.
    Float,
    /// Integer value.
    Integer,
    /// Boolean value.
    Boolean,
    /// Complex value.
    Complex,
}

/// Named, typed signal declared by a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Name of the signal.
    pub name: String,
    /// Data type of the signal.
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Optional unit of the signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Optional initial value of the signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Value>,
}

/// Public view of a peer within a session.
///
/// The `remote` and `connected` fields are only present while a
/// stream is attached; `id` is zero until the peer first attaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Name of the peer, unique within its session.
    pub name: String,
    /// Identifier assigned when the peer first attached.
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub id: i32,
    /// Remote address of the attached stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// User agent reported on the upgrade request.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
    /// When the peer was created.
    pub created: DateTime<Utc>,
    /// When the current stream was attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<DateTime<Utc>>,
    /// Signals declared by the peer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<Signal>,
}

fn id_is_unset(id: &i32) -> bool {
    *id == 0
}

/// Public view of a session and its peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Name of the session.
    pub name: String,
    /// When the session was created.
    pub created: DateTime<Utc>,
    /// Peers that belong to the session.
    pub peers: Vec<PeerInfo>,
}
