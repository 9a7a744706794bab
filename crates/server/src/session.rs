//! Named group of peers and its serial message router.
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

use signaling_protocol::{
    ControlMessage, SessionInfo, SignalingMessage,
};

use crate::{metrics, peer::Peer, Error, Result};

/// Capacity of the inbound routing channel.
const INBOUND_QUEUE: usize = 100;

/// Envelope tagged with its sending peer.
pub(crate) struct RoutedMessage {
    pub(crate) message: SignalingMessage,
    pub(crate) sender: Arc<Peer>,
}

impl RoutedMessage {
    fn collect_metrics(&self) {
        if self.message.description.is_some() {
            metrics::MESSAGES_RECEIVED
                .with_label_values(&["description"])
                .inc();
        }
        if self.message.candidate.is_some() {
            metrics::MESSAGES_RECEIVED
                .with_label_values(&["candidate"])
                .inc();
        }
        if self.message.control.is_some() {
            metrics::MESSAGES_RECEIVED
                .with_label_values(&["control"])
                .inc();
        }
        if self.message.signals.is_some() {
            metrics::MESSAGES_RECEIVED
                .with_label_values(&["signals"])
                .inc();
        }
    }
}

/// A named group of peers exchanging signaling messages.
///
/// Every inbound envelope passes through a single router task
/// which fans it out to all other attached peers, so messages from
/// one sender are delivered in send order.
pub struct Session {
    name: String,
    created: DateTime<Utc>,
    peers: RwLock<HashMap<String, Arc<Peer>>>,
    last_peer_id: AtomicI32,
    inbound: mpsc::Sender<RoutedMessage>,
    weak: Weak<Session>,
}

impl Session {
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        let (inbound, receiver) = mpsc::channel(INBOUND_QUEUE);

        let session = Arc::new_cyclic(|weak| Self {
            name: name.into(),
            created: Utc::now(),
            peers: RwLock::new(HashMap::new()),
            last_peer_id: AtomicI32::new(0),
            inbound,
            weak: weak.clone(),
        });

        tracing::info!(session = %session.name, "session opened");
        metrics::SESSIONS_CREATED.inc();

        tokio::spawn(route(Arc::downgrade(&session), receiver));

        session
    }

    /// Name of the session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the session was created.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Number of peers in the session, attached or not.
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<RoutedMessage> {
        self.inbound.clone()
    }

    /// Next peer id. Ids are strictly increasing within a session
    /// and never reused.
    pub(crate) fn next_peer_id(&self) -> i32 {
        self.last_peer_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Return the peer with the given name, creating it on first
    /// reference.
    pub async fn get_or_create_peer(
        &self,
        name: &str,
    ) -> Arc<Peer> {
        let mut peers = self.peers.write().await;
        if let Some(peer) = peers.get(name) {
            return Arc::clone(peer);
        }

        let peer = Peer::new(name, self.weak.clone());
        peers.insert(name.to_owned(), Arc::clone(&peer));
        peer
    }

    /// Look up a peer by name.
    pub async fn get_peer(&self, name: &str) -> Option<Arc<Peer>> {
        self.peers.read().await.get(name).cloned()
    }

    /// Close a peer, remove it from the session and broadcast the
    /// updated roster to the remaining peers.
    pub async fn remove_peer(
        &self,
        name: &str,
    ) -> Result<Arc<Peer>> {
        let peer = self
            .get_peer(name)
            .await
            .ok_or_else(|| Error::PeerNotFound(name.to_owned()))?;

        peer.close().await;

        if self.peers.write().await.remove(name).is_some() {
            metrics::ACTIVE_PEERS.dec();
        }

        self.send_control_to_all().await?;

        Ok(peer)
    }

    /// Send one control envelope to every connected peer, each
    /// carrying the recipient's own id in the `peer_id` field.
    ///
    /// The envelopes go through the per-peer outbound queues so
    /// the writer task remains the only writer on each stream. Any
    /// enqueue failure aborts the broadcast.
    pub(crate) async fn send_control_to_all(&self) -> Result<()> {
        let peers = self.peers.read().await;

        let mut roster = Vec::with_capacity(peers.len());
        for peer in peers.values() {
            roster.push(peer.marshal().await);
        }

        for peer in peers.values() {
            let Some((peer_id, conn)) = peer.attached().await
            else {
                continue;
            };

            let message = SignalingMessage {
                control: Some(ControlMessage {
                    peer_id,
                    peers: roster.clone(),
                }),
                ..Default::default()
            };

            tracing::debug!(
                session = %self.name,
                peer = %peer.name(),
                "send control message"
            );
            conn.send(message).await?;
        }

        Ok(())
    }

    /// Marshal the session and all of its peers.
    pub async fn marshal(&self) -> SessionInfo {
        let peers = self.peers.read().await;

        let mut infos = Vec::with_capacity(peers.len());
        for peer in peers.values() {
            infos.push(peer.marshal().await);
        }

        SessionInfo {
            name: self.name.clone(),
            created: self.created,
            peers: infos,
        }
    }

    /// Close every peer's connection.
    pub async fn close(&self) {
        tracing::info!(session = %self.name, "session closing");

        let peers = self.peers.write().await;
        for peer in peers.values() {
            peer.close().await;
        }
    }

    /// Fan one envelope out to every other attached peer.
    ///
    /// Never drops messages; a full outbound queue back-pressures
    /// the router and, transitively, the sending peers.
    async fn fan_out(&self, routed: RoutedMessage) {
        routed.collect_metrics();

        let peers = self.peers.read().await;
        for peer in peers.values() {
            if Arc::ptr_eq(peer, &routed.sender) {
                continue;
            }
            let Some(conn) = peer.connection().await else {
                continue;
            };

            if let Err(e) =
                conn.send(routed.message.clone()).await
            {
                tracing::warn!(
                    session = %self.name,
                    peer = %peer.name(),
                    error = %e,
                    "failed to forward message"
                );
            }
        }
    }
}

/// Router task, the sole consumer of a session's inbound channel.
async fn route(
    session: Weak<Session>,
    mut inbound: mpsc::Receiver<RoutedMessage>,
) {
    while let Some(message) = inbound.recv().await {
        let Some(session) = session.upgrade() else { break };
        session.fan_out(message).await;
    }
}
