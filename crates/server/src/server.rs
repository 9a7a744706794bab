//! HTTP front-end and shared state of the broker.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    middleware,
    routing::get,
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use chrono::Utc;
use futures::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use signaling_protocol::RelayInfo;

use crate::{
    api,
    config::{ServerConfig, TlsConfig},
    metrics,
    registry::SessionRegistry,
    websocket, Result,
};

/// Shared server state.
pub type State = Arc<ServerState>;

/// State shared by every request handler and background task.
pub struct ServerState {
    /// Server config.
    pub(crate) config: ServerConfig,

    /// Relay descriptors announced to every connection.
    pub(crate) relays: Vec<RelayInfo>,

    /// Registry of active sessions.
    pub registry: SessionRegistry,
}

impl ServerState {
    /// Close every session, e.g. ahead of process shutdown.
    pub async fn close_sessions(&self) {
        self.registry.close_all().await;
    }
}

/// Sweep for sessions that have been empty since longer than the
/// configured expiry and remove them.
async fn session_reaper(state: State, interval_secs: u64) {
    let interval =
        tokio::time::interval(Duration::from_secs(interval_secs));
    let mut stream = IntervalStream::new(interval);
    while (stream.next().await).is_some() {
        let expired = state.registry.expired(Utc::now()).await;
        if expired.is_empty() {
            continue;
        }

        tracing::debug!(
            expired_sessions = %expired.len(),
            "removing stale sessions"
        );
        for name in expired {
            if let Some(session) =
                state.registry.remove(&name).await
            {
                session.close().await;
            }
        }
    }
}

/// Signaling web server.
pub struct SignalingServer {
    state: State,
}

impl SignalingServer {
    /// Create a new signaling server.
    ///
    /// Fails when one of the configured relay URIs is invalid.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let relays = RelayInfo::parse_all(&config.relays)?;
        let registry =
            SessionRegistry::new(config.session.expiry);

        Ok(Self {
            state: Arc::new(ServerState {
                config,
                relays,
                registry,
            }),
        })
    }

    /// Shared state of this server.
    pub fn state(&self) -> State {
        Arc::clone(&self.state)
    }

    /// Start the server.
    pub async fn start(
        &self,
        addr: SocketAddr,
        handle: Handle,
    ) -> Result<()> {
        let reap_interval =
            self.state.config.session.reap_interval;
        let tls = self.state.config.tls.as_ref().cloned();

        // Spawn task to reap expired sessions
        tokio::task::spawn(session_reaper(
            Arc::clone(&self.state),
            reap_interval,
        ));

        if let Some(tls) = tls {
            self.run_tls(addr, handle, tls).await
        } else {
            self.run(addr, handle).await
        }
    }

    /// Start the server running on HTTPS.
    async fn run_tls(
        &self,
        addr: SocketAddr,
        handle: Handle,
        tls: TlsConfig,
    ) -> Result<()> {
        let tls =
            RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
        let app = self.router(Arc::clone(&self.state));
        tracing::info!("listening on {}", addr);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
        Ok(())
    }

    /// Start the server running on HTTP.
    async fn run(
        &self,
        addr: SocketAddr,
        handle: Handle,
    ) -> Result<()> {
        let app = self.router(Arc::clone(&self.state));
        tracing::info!("listening on {}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
        Ok(())
    }

    fn router(&self, state: State) -> Router {
        let cors = CorsLayer::new()
            .allow_methods(vec![
                Method::GET,
                Method::POST,
                Method::DELETE,
            ])
            .allow_headers(vec![CONTENT_TYPE])
            .allow_origin(Any);

        let api = Router::new()
            .route("/sessions", get(api::list_sessions))
            .route(
                "/session/:session",
                get(api::get_session).post(api::create_session),
            )
            .route(
                "/peer/:session/:peer",
                get(api::get_peer)
                    .post(api::update_peer)
                    .delete(api::delete_peer),
            )
            .route_layer(middleware::from_fn(api::require_auth));

        Router::new()
            .nest("/api/v1", api)
            .route("/metrics", get(metrics::scrape))
            .route("/healthz", get(healthz))
            .route("/favicon.ico", get(favicon))
            .route("/:session", get(websocket::upgrade_session))
            .route(
                "/:session/:peer",
                get(websocket::upgrade_peer),
            )
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics::track_http))
            .layer(Extension(state))
    }
}

async fn healthz() -> &'static str {
    "OK"
}

async fn favicon() -> StatusCode {
    StatusCode::NOT_FOUND
}
