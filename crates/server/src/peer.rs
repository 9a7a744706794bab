//! Identity and attributes of a session participant.
use std::sync::{Arc, Weak};

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures::{stream::SplitStream, StreamExt};
use tokio::sync::RwLock;
use tokio::time::{timeout_at, Instant};

use signaling_protocol::{
    PeerInfo, RelayInfo, Signal, SignalingMessage,
    DEFAULT_RELAY_USERNAME,
};

use crate::{
    connection::{Connection, PONG_WAIT},
    metrics,
    session::Session,
    Error, Result,
};

/// A named participant within a session.
///
/// A peer owns at most one attached connection. Its name, id,
/// creation time and signals survive a detach; the peer itself is
/// only removed by an explicit removal or when the session closes.
pub struct Peer {
    name: String,
    created: DateTime<Utc>,
    session: Weak<Session>,
    state: RwLock<PeerState>,
}

#[derive(Default)]
struct PeerState {
    id: i32,
    user_agent: String,
    remote: String,
    connected: Option<DateTime<Utc>>,
    signals: Vec<Signal>,
    conn: Option<Arc<Connection>>,
}

impl Peer {
    pub(crate) fn new(
        name: impl Into<String>,
        session: Weak<Session>,
    ) -> Arc<Self> {
        let name = name.into();
        tracing::info!(peer = %name, "new peer");

        metrics::CONNECTIONS_CREATED.inc();
        metrics::ACTIVE_PEERS.inc();

        Arc::new(Self {
            name,
            created: Utc::now(),
            session,
            state: RwLock::new(PeerState::default()),
        })
    }

    /// Name of the peer, unique within its session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a stream is currently attached.
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.conn.is_some()
    }

    /// Replace the signals declared by this peer.
    pub async fn set_signals(&self, signals: Vec<Signal>) {
        let mut state = self.state.write().await;
        state.signals = signals;
    }

    /// Public view of this peer.
    ///
    /// The remote address and connect time are only present while
    /// a stream is attached.
    pub async fn marshal(&self) -> PeerInfo {
        let state = self.state.read().await;
        PeerInfo {
            name: self.name.clone(),
            id: state.id,
            remote: state
                .conn
                .as_ref()
                .map(|_| state.remote.clone()),
            user_agent: state.user_agent.clone(),
            created: self.created,
            connected: state
                .conn
                .as_ref()
                .and_then(|_| state.connected),
            signals: state.signals.clone(),
        }
    }

    /// Attach an upgraded stream to this peer.
    ///
    /// Assigns the peer id, ingests the initial signals envelope,
    /// sends the relays message, broadcasts the new roster and
    /// starts the reader and writer tasks. Fails when the peer is
    /// already attached.
    pub(crate) async fn attach(
        self: Arc<Self>,
        socket: WebSocket,
        remote: String,
        user_agent: String,
        relays: &[RelayInfo],
    ) -> Result<()> {
        let session =
            self.session.upgrade().ok_or(Error::SessionClosed)?;

        let (sink, mut stream) = socket.split();

        let (conn, outgoing) = {
            let mut state = self.state.write().await;
            if state.conn.is_some() {
                return Err(Error::PeerConnected(self.name.clone()));
            }

            let (conn, outgoing) = Connection::new(
                remote.clone(),
                Arc::downgrade(&self),
            );
            state.id = session.next_peer_id();
            state.user_agent = user_agent;
            state.remote = remote;
            state.connected = Some(Utc::now());
            state.conn = Some(Arc::clone(&conn));
            (conn, outgoing)
        };

        tracing::info!(
            session = %session.name(),
            peer = %self.name,
            remote = %conn.remote(),
            "peer connected"
        );

        if let Err(e) = self.ingest_signals(&mut stream).await {
            self.detach(&conn).await;
            return Err(e);
        }

        if let Err(e) = self.send_relays(&conn, relays).await {
            self.detach(&conn).await;
            return Err(e);
        }

        if let Err(e) = session.send_control_to_all().await {
            self.detach(&conn).await;
            return Err(e);
        }

        conn.start(
            sink,
            stream,
            outgoing,
            Arc::clone(&self),
            session.sender(),
        );

        Ok(())
    }

    /// Read the initial envelope of a fresh stream, reserved for
    /// the peer's signals declaration.
    async fn ingest_signals(
        &self,
        stream: &mut SplitStream<WebSocket>,
    ) -> Result<()> {
        let deadline = Instant::now() + PONG_WAIT;

        let envelope: SignalingMessage = loop {
            let message =
                match timeout_at(deadline, stream.next()).await {
                    Err(_) => {
                        return Err(Error::InitialMessage(
                            "timed out".to_owned(),
                        ))
                    }
                    Ok(None) => {
                        return Err(Error::InitialMessage(
                            "stream closed".to_owned(),
                        ))
                    }
                    Ok(Some(Err(e))) => {
                        return Err(Error::InitialMessage(
                            e.to_string(),
                        ))
                    }
                    Ok(Some(Ok(message))) => message,
                };

            let decoded = match &message {
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    return Err(Error::InitialMessage(
                        "stream closed".to_owned(),
                    ))
                }
                Message::Text(text) => serde_json::from_str(text),
                Message::Binary(buffer) => {
                    serde_json::from_slice(buffer)
                }
            };

            break decoded.map_err(|e| {
                Error::InitialMessage(e.to_string())
            })?;
        };

        if let Some(signals) = envelope.signals {
            tracing::debug!(
                peer = %self.name,
                count = signals.len(),
                "received signals"
            );
            let mut state = self.state.write().await;
            state.signals = signals;
        }

        Ok(())
    }

    /// Send the relays envelope with credentials derived for every
    /// configured relay.
    async fn send_relays(
        &self,
        conn: &Arc<Connection>,
        relays: &[RelayInfo],
    ) -> Result<()> {
        let entries: Vec<_> = relays
            .iter()
            .map(|relay| relay.to_relay(DEFAULT_RELAY_USERNAME))
            .collect();

        let message = SignalingMessage {
            relays: (!entries.is_empty()).then_some(entries),
            ..Default::default()
        };
        conn.send(message).await
    }

    /// Id and connection of this peer while attached.
    pub(crate) async fn attached(
        &self,
    ) -> Option<(i32, Arc<Connection>)> {
        let state = self.state.read().await;
        state.conn.clone().map(|conn| (state.id, conn))
    }

    pub(crate) async fn connection(
        &self,
    ) -> Option<Arc<Connection>> {
        self.state.read().await.conn.clone()
    }

    /// Clear the connection pointer if it still refers to the
    /// given connection.
    pub(crate) async fn detach(&self, conn: &Arc<Connection>) {
        let mut state = self.state.write().await;
        if let Some(current) = &state.conn {
            if Arc::ptr_eq(current, conn) {
                state.conn = None;
                state.connected = None;
            }
        }
    }

    /// Close the attached connection, if any. Idempotent.
    pub async fn close(&self) {
        let conn = self.connection().await;
        if let Some(conn) = conn {
            conn.close().await;
        }
    }
}
