use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PeerInfo, Relay, Signal};

/// Roster snapshot sent to every connected peer whenever the
/// membership of a session changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Identifier of the recipient peer.
    pub peer_id: i32,
    /// All peers of the session, including the recipient.
    pub peers: Vec<PeerInfo>,
}

/// SDP offer or answer exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionMessage {
    /// Session description blob.
    pub spd: String,
    /// Type of the description, e.g. `offer` or `answer`.
    #[serde(rename = "type")]
    pub description_type: String,
}

/// ICE candidate exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMessage {
    /// Candidate description blob.
    pub spd: String,
    /// Media stream identification tag.
    pub mid: String,
}

/// Envelope exchanged over a signaling stream.
///
/// Any subset of the fields may be present; absent fields are
/// omitted on the wire. The broker forwards envelopes verbatim and
/// never interprets the description or candidate payloads.
#[derive(
    Debug, Default, Clone, PartialEq, Serialize, Deserialize,
)]
pub struct SignalingMessage {
    /// Signals declared by the sending peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<Vec<Signal>>,
    /// Relay servers with derived credentials.
    #[serde(
        rename = "servers",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relays: Option<Vec<Relay>>,
    /// An ICE candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateMessage>,
    /// A membership roster update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlMessage>,
    /// An SDP session description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<DescriptionMessage>,
}

impl fmt::Display for SignalingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("<invalid signaling message>"),
        }
    }
}
