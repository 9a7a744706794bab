//! JSON admin API for sessions and peers.
use axum::{
    extract::{
        rejection::JsonRejection, Extension, Path, Request,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use signaling_protocol::{PeerInfo, SessionInfo, Signal};

use crate::{server::State, Error};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: String,
}

/// Error rendered as the JSON error body of the admin API.
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            status: error.status(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.message, "request failed");

        let body = ErrorBody {
            error: self.message,
            status: self
                .status
                .canonical_reason()
                .unwrap_or_default()
                .to_owned(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
pub(crate) struct SessionsResponse {
    sessions: Vec<SessionInfo>,
}

#[derive(Serialize)]
pub(crate) struct SessionResponse {
    session: SessionInfo,
}

#[derive(Serialize)]
pub(crate) struct PeerResponse {
    peer: PeerInfo,
}

#[derive(Deserialize)]
pub(crate) struct PeerRequest {
    peer: Option<PeerUpdate>,
}

#[derive(Deserialize)]
pub(crate) struct PeerUpdate {
    signals: Option<Vec<Signal>>,
}

/// `GET /api/v1/sessions`
pub(crate) async fn list_sessions(
    Extension(state): Extension<State>,
) -> Json<SessionsResponse> {
    let mut sessions = Vec::new();
    for session in state.registry.snapshot().await {
        sessions.push(session.marshal().await);
    }
    Json(SessionsResponse { sessions })
}

/// `GET /api/v1/session/{session}`
pub(crate) async fn get_session(
    Extension(state): Extension<State>,
    Path(name): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .registry
        .get(&name)
        .await
        .ok_or(Error::SessionNotFound(name))?;

    Ok(Json(SessionResponse {
        session: session.marshal().await,
    }))
}

/// `POST /api/v1/session/{session}`
///
/// Unlike the GET path this creates the session when it is absent,
/// mirroring the signaling entry point.
pub(crate) async fn create_session(
    Extension(state): Extension<State>,
    Path(name): Path<String>,
) -> Json<SessionResponse> {
    let session = state.registry.get_or_create(&name).await;
    Json(SessionResponse {
        session: session.marshal().await,
    })
}

/// `GET /api/v1/peer/{session}/{peer}`
pub(crate) async fn get_peer(
    Extension(state): Extension<State>,
    Path((session_name, peer_name)): Path<(String, String)>,
) -> Result<Json<PeerResponse>, ApiError> {
    let session = state
        .registry
        .get(&session_name)
        .await
        .ok_or(Error::SessionNotFound(session_name))?;
    let peer = session
        .get_peer(&peer_name)
        .await
        .ok_or(Error::PeerNotFound(peer_name))?;

    Ok(Json(PeerResponse {
        peer: peer.marshal().await,
    }))
}

/// `POST /api/v1/peer/{session}/{peer}`
///
/// Creates the session and peer when absent and replaces the
/// peer's signals from the request body.
pub(crate) async fn update_peer(
    Extension(state): Extension<State>,
    Path((session_name, peer_name)): Path<(String, String)>,
    payload: Result<Json<PeerRequest>, JsonRejection>,
) -> Result<Json<PeerResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|_| Error::MalformedRequest)?;
    let update = request.peer.ok_or(Error::MalformedRequest)?;

    let session =
        state.registry.get_or_create(&session_name).await;
    let peer = session.get_or_create_peer(&peer_name).await;

    if let Some(signals) = update.signals {
        tracing::debug!(
            session = %session_name,
            peer = %peer_name,
            count = signals.len(),
            "updated signals"
        );
        peer.set_signals(signals).await;
    }

    Ok(Json(PeerResponse {
        peer: peer.marshal().await,
    }))
}

/// `DELETE /api/v1/peer/{session}/{peer}`
pub(crate) async fn delete_peer(
    Extension(state): Extension<State>,
    Path((session_name, peer_name)): Path<(String, String)>,
) -> Result<Json<PeerResponse>, ApiError> {
    let session = state
        .registry
        .get(&session_name)
        .await
        .ok_or(Error::SessionNotFound(session_name))?;

    let peer = session.remove_peer(&peer_name).await?;

    Ok(Json(PeerResponse {
        peer: peer.marshal().await,
    }))
}

/// Require HTTP Basic auth with the configured secret, when one is
/// set.
pub(crate) async fn require_auth(
    Extension(state): Extension<State>,
    request: Request,
    next: Next,
) -> Response {
    let Some(secret) = &state.config.api.secret else {
        return next.run(request).await;
    };

    if authorized(request.headers(), secret) {
        return next.run(request).await;
    }

    let body = ErrorBody {
        error: "unauthorized".to_owned(),
        status: "Unauthorized".to_owned(),
    };
    let mut response =
        (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Basic realm="signaling""#),
    );
    response
}

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    match decoded.split_once(':') {
        Some((_, password)) => password == secret,
        None => false,
    }
}
