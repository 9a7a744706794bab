//! Server configuration.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::Result;

/// Configuration for the web server.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Relay URIs announced to every connection.
    ///
    /// The query of a URI may carry `secret` and `ttl` values for
    /// ephemeral credential derivation.
    pub relays: Vec<String>,

    /// Settings for session management.
    pub session: SessionConfig,

    /// Settings for the admin API.
    pub api: ApiConfig,

    /// Configuration for TLS encryption.
    pub tls: Option<TlsConfig>,
}

/// Configuration for server sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Seconds an empty session survives after creation.
    ///
    /// Default is one hour.
    pub expiry: u64,

    /// Interval in seconds to sweep for expired sessions.
    ///
    /// Default is every ten seconds.
    pub reap_interval: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry: 3600,
            reap_interval: 10,
        }
    }
}

/// Configuration for the admin API.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Shared secret protecting the admin API.
    ///
    /// When set, requests must authenticate with HTTP Basic auth
    /// using this secret as the password.
    pub secret: Option<String>,
}

/// Certificate and key for TLS.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to the certificate.
    pub cert: PathBuf,
    /// Path to the certificate key file.
    pub key: PathBuf,
}

impl ServerConfig {
    /// Load a server config from a file path.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        let mut config: ServerConfig = toml::from_str(&contents)?;

        let dir = Self::directory(path.as_ref());
        if let Some(tls) = config.tls.as_mut() {
            if tls.cert.is_relative() {
                tls.cert = dir.join(&tls.cert).canonicalize()?;
            }
            if tls.key.is_relative() {
                tls.key = dir.join(&tls.key).canonicalize()?;
            }
        }

        Ok(config)
    }

    /// Parent directory of the configuration file.
    fn directory(file: impl AsRef<Path>) -> PathBuf {
        file.as_ref()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    }
}
