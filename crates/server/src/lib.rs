//! Signaling and relay-credential broker for peer-to-peer
//! negotiation.
//!
//! Peers rendezvous in named sessions over long-lived websocket
//! streams; every envelope a peer sends is fanned out to all other
//! peers of its session. The broker also derives ephemeral TURN/STUN
//! credentials and exposes a small JSON admin API.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod config;
mod connection;
mod error;
mod metrics;
mod peer;
mod registry;
mod server;
mod session;
mod websocket;

pub use config::{ApiConfig, ServerConfig, SessionConfig, TlsConfig};
pub use error::Error;
pub use peer::Peer;
pub use registry::SessionRegistry;
pub use server::{ServerState, SignalingServer, State};
pub use session::Session;

pub use axum;

/// Result type for the signaling service.
pub type Result<T> = std::result::Result<T, Error>;
