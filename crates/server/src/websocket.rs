//! Entry dispatcher upgrading inbound requests to signaling
//! streams.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::WebSocketUpgrade, ConnectInfo, Extension, Path,
    },
    http::{header::USER_AGENT, HeaderMap},
    response::Response,
};
use uuid::Uuid;

use crate::{
    api::ApiError, connection::MAX_MESSAGE_SIZE, server::State,
    Error,
};

/// Upgrade a request for `/{session}` with a generated peer name.
pub(crate) async fn upgrade_session(
    Extension(state): Extension<State>,
    Path(session): Path<String>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let peer = Uuid::new_v4().to_string();
    connect(state, session, peer, remote, headers, ws).await
}

/// Upgrade a request for `/{session}/{peer}`.
pub(crate) async fn upgrade_peer(
    Extension(state): Extension<State>,
    Path((session, peer)): Path<(String, String)>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    connect(state, session, peer, remote, headers, ws).await
}

async fn connect(
    state: State,
    session_name: String,
    peer_name: String,
    remote: SocketAddr,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    tracing::debug!(
        session = %session_name,
        peer = %peer_name,
        "websocket upgrade request"
    );

    let session = state.registry.get_or_create(&session_name).await;
    let peer = session.get_or_create_peer(&peer_name).await;

    if peer.is_connected().await {
        return Err(Error::PeerConnected(peer_name).into());
    }

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let relays = state.relays.clone();

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            if let Err(e) = Arc::clone(&peer)
                .attach(
                    socket,
                    remote.to_string(),
                    user_agent,
                    &relays,
                )
                .await
            {
                tracing::error!(
                    session = %session_name,
                    peer = %peer.name(),
                    error = %e,
                    "failed to attach peer"
                );
            }
        }))
}
