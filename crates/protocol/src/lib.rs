//! Wire types shared between the signaling broker and its clients.
//!
//! Everything that crosses the websocket or the admin API is defined
//! here: the signaling envelope, the peer and session views and the
//! TURN/STUN relay descriptors with their ephemeral credentials.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod message;
mod relay;
mod types;

pub use error::Error;
pub use message::{
    CandidateMessage, ControlMessage, DescriptionMessage,
    SignalingMessage,
};
pub use relay::{
    ephemeral_credentials, Relay, RelayInfo,
    DEFAULT_RELAY_USERNAME,
};
pub use types::{PeerInfo, SessionInfo, Signal, SignalType};

/// Result type for the protocol library.
pub type Result<T> = std::result::Result<T, Error>;
