//! Process-wide mapping from session names to sessions.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{metrics, session::Session};

/// Registry of every session in the process.
///
/// Sessions are created on demand and reaped by the sweeper once
/// they have been empty for longer than the configured expiry,
/// measured from their creation time.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    expiry: chrono::Duration,
}

impl SessionRegistry {
    /// Create a registry whose empty sessions expire after the
    /// given number of seconds.
    pub fn new(expiry_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            expiry: chrono::Duration::seconds(expiry_secs as i64),
        }
    }

    /// Look up a session by name.
    pub async fn get(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(name).cloned()
    }

    /// Return the session with the given name, creating it when
    /// absent.
    pub async fn get_or_create(&self, name: &str) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(name) {
            return Arc::clone(session);
        }

        let session = Session::new(name);
        sessions.insert(name.to_owned(), Arc::clone(&session));
        metrics::ACTIVE_SESSIONS.set(sessions.len() as i64);
        session
    }

    /// Remove a session from the registry.
    pub async fn remove(&self, name: &str) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.remove(name);
        metrics::ACTIVE_SESSIONS.set(sessions.len() as i64);
        session
    }

    /// Snapshot of every session in the registry.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Names of sessions that have no peers and were created
    /// longer than the expiry before `now`.
    pub async fn expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let sessions = self.sessions.read().await;

        let mut expired = Vec::new();
        for (name, session) in sessions.iter() {
            if session.peer_count().await == 0
                && now.signed_duration_since(session.created())
                    > self.expiry
            {
                expired.push(name.clone());
            }
        }
        expired
    }

    /// Close every session and clear the registry.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.write().await;
        for (_, session) in sessions.drain() {
            metrics::ACTIVE_PEERS
                .sub(session.peer_count().await as i64);
            session.close().await;
        }
        metrics::ACTIVE_SESSIONS.set(0);
    }
}
