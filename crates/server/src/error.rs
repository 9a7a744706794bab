use axum::http::StatusCode;
use thiserror::Error;

/// Errors generated by the signaling service.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated when a peer already has an attached stream.
    #[error(r#"peer "{0}" is already connected"#)]
    PeerConnected(String),

    /// Error generated when a session could not be found.
    #[error(r#"failed to find session with name "{0}""#)]
    SessionNotFound(String),

    /// Error generated when a peer could not be found.
    #[error(r#"failed to find peer with name "{0}""#)]
    PeerNotFound(String),

    /// Error generated when the session of a peer was already
    /// dropped from the registry.
    #[error("session is closed")]
    SessionClosed,

    /// Error generated when writing to a connection whose writer
    /// has already terminated.
    #[error("connection is closing")]
    ConnectionClosing,

    /// Error generated when a request body is missing required
    /// fields.
    #[error("malformed request body")]
    MalformedRequest,

    /// Error generated reading the initial envelope of a stream.
    #[error("failed to receive initial message: {0}")]
    InitialMessage(String),

    /// Error generated by the protocol library.
    #[error(transparent)]
    Protocol(#[from] signaling_protocol::Error),

    /// Error generated serializing or deserializing JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error generated parsing TOML configuration.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Error generated by input/output.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Status code used when this error is surfaced on the HTTP
    /// layer.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::SessionNotFound(_) | Error::PeerNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Error::MalformedRequest => StatusCode::BAD_REQUEST,
            Error::PeerConnected(_) => StatusCode::CONFLICT,
            Error::ConnectionClosing | Error::SessionClosed => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
