//! Command line front-end for the signaling broker.
//!
//! # Server
//!
//! Start the broker on the default address:
//!
//! ```no_run
//! signaling-server --addr :8080
//! ```
//!
//! # Relays
//!
//! Announce TURN/STUN relays to every connection; a shared secret
//! in the URI query enables ephemeral credentials:
//!
//! ```no_run
//! signaling-server --relay "turn:turn.example.org?secret=hunter2&ttl=1h"
//! ```

use clap::Parser;

mod cli {
    use anyhow::{anyhow, Result};
    use axum_server::Handle;
    use clap::Parser;
    use signaling_server::{ServerConfig, SignalingServer};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[clap(author, version, about, long_about = None)]
    pub struct SignalingBroker {
        /// Bind the HTTP service to host:port; an empty host
        /// binds all interfaces.
        #[clap(long, default_value = ":8080")]
        pub addr: String,

        /// A TURN/STUN relay which is signalled to each connection
        /// (can be specified multiple times).
        #[clap(long = "relay")]
        pub relays: Vec<String>,

        /// Log level filter.
        #[clap(long, default_value = "info")]
        pub level: String,

        /// Config file to load.
        #[clap(long)]
        pub config: Option<PathBuf>,

        /// Override the session expiry in seconds.
        #[clap(long)]
        pub expiry: Option<u64>,

        /// Override the sweep interval for expired sessions in
        /// seconds.
        #[clap(long)]
        pub reap_interval: Option<u64>,
    }

    pub async fn run(args: SignalingBroker) -> Result<()> {
        let mut config = match &args.config {
            Some(path) => ServerConfig::load(path).await?,
            None => ServerConfig::default(),
        };

        config.relays.extend(args.relays);
        if let Some(expiry) = args.expiry {
            config.session.expiry = expiry;
        }
        if let Some(reap_interval) = args.reap_interval {
            config.session.reap_interval = reap_interval;
        }

        let addr = parse_addr(&args.addr)?;
        let handle = Handle::new();
        let server = SignalingServer::new(config)?;

        let state = server.state();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("closing sessions and shutting down");
            state.close_sessions().await;
            shutdown.shutdown();
        });

        server.start(addr, handle).await?;
        Ok(())
    }

    /// Parse `host:port` where an empty host binds all interfaces.
    fn parse_addr(addr: &str) -> Result<SocketAddr> {
        if let Some(port) = addr.strip_prefix(':') {
            let port: u16 = port.parse().map_err(|_| {
                anyhow!("invalid port in address: {}", addr)
            })?;
            Ok(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port,
            ))
        } else {
            addr.parse().map_err(|_| {
                anyhow!("invalid listen address: {}", addr)
            })
        }
    }

    async fn wait_for_signal() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut terminate =
                match signal(SignalKind::terminate()) {
                    Ok(terminate) => terminate,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "failed to install signal handler"
                        );
                        return;
                    }
                };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
    }

}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::SignalingBroker::parse();

    use tracing_subscriber::{
        layer::SubscriberExt, util::SubscriberInitExt,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| args.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    cli::run(args).await
}
