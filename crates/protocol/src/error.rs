use thiserror::Error;

/// Errors generated by the protocol library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated when a relay URI cannot be parsed.
    #[error(r#"invalid relay URI "{0}": {1}"#)]
    InvalidRelayUri(String, String),

    /// Error generated when the TTL query value of a relay URI
    /// is not a valid duration.
    #[error(r#"invalid relay TTL "{0}": {1}"#)]
    InvalidRelayTtl(String, String),

    /// Error generated when a relay URI carries a username but
    /// no way to derive a password for it.
    #[error(r#"relay URI "{0}" has incomplete credentials"#)]
    IncompleteCredentials(String),

    /// Error generated when serializing or deserializing JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
