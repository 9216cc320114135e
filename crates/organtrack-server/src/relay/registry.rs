use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use organtrack_protocol::{Role, ServerMessage};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::relay::outbox::Outbox;

/// One registered peer.
///
/// Entries are never mutated in place; every change swaps in a new `Arc`, so
/// readers always see a whole entry.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub id: String,
    pub role: Role,
    pub remote: SocketAddr,
    /// Connection that last registered this session
    pub connection_id: Uuid,
    pub sender: Outbox,
    /// Cancelling this closes the owning connection
    pub closer: CancellationToken,
    pub last_active_at: Instant,
    pub registered_at: DateTime<Utc>,
}

impl SessionEntry {
    /// Whole seconds since the session was first registered
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.registered_at).num_seconds()
    }
}

/// What a connection presents when it registers a session
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: String,
    /// `None` keeps the registered role (Guest for a new session)
    pub role: Option<Role>,
    pub remote: SocketAddr,
    pub connection_id: Uuid,
    pub sender: Outbox,
    pub closer: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    Created,
    Updated {
        role_changed: Option<(Role, Role)>,
        /// Previous and new remote port
        reconnected: Option<(u16, u16)>,
    },
    Refreshed,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create the session or bring it up to date; always refreshes its activity time
    pub async fn register(&self, registration: Registration) -> Registered {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let Some(existing) = sessions.get(&registration.id).cloned() else {
            let role = registration.role.unwrap_or_default();
            tracing::info!(
                session_id = %registration.id,
                %role,
                remote = %registration.remote,
                "Session created"
            );
            sessions.insert(
                registration.id.clone(),
                Arc::new(SessionEntry {
                    id: registration.id,
                    role,
                    remote: registration.remote,
                    connection_id: registration.connection_id,
                    sender: registration.sender,
                    closer: registration.closer,
                    last_active_at: now,
                    registered_at: Utc::now(),
                }),
            );
            return Registered::Created;
        };

        let role = registration.role.unwrap_or(existing.role);
        let role_changed = (role != existing.role).then_some((existing.role, role));
        let reconnected = (registration.remote.port() != existing.remote.port())
            .then_some((existing.remote.port(), registration.remote.port()));
        let rebound = registration.connection_id != existing.connection_id;

        if let Some((from, to)) = role_changed {
            tracing::info!(session_id = %existing.id, %from, %to, "Session role changed");
        }
        if let Some((from, to)) = reconnected {
            tracing::info!(
                session_id = %existing.id,
                from_port = from,
                to_port = to,
                "Session reconnected"
            );
        }

        let mut entry = SessionEntry::clone(&existing);
        entry.role = role;
        entry.last_active_at = now;
        if rebound || reconnected.is_some() {
            entry.remote = registration.remote;
            entry.connection_id = registration.connection_id;
            entry.sender = registration.sender;
            entry.closer = registration.closer;
        }
        sessions.insert(entry.id.clone(), Arc::new(entry));

        if role_changed.is_none() && reconnected.is_none() && !rebound {
            Registered::Refreshed
        } else {
            Registered::Updated {
                role_changed,
                reconnected,
            }
        }
    }

    /// Refresh a session's activity time
    pub async fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(existing) => {
                let mut entry = SessionEntry::clone(existing);
                entry.last_active_at = Instant::now();
                sessions.insert(id.to_string(), Arc::new(entry));
                true
            }
            None => false,
        }
    }

    /// Remove and close every session idle for longer than `ttl`
    pub async fn evict_stale(&self, ttl: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let stale: Vec<String> = sessions
            .values()
            .filter(|entry| now.duration_since(entry.last_active_at) > ttl)
            .map(|entry| entry.id.clone())
            .collect();

        for id in &stale {
            if let Some(entry) = sessions.remove(id) {
                entry.closer.cancel();
                tracing::info!(
                    session_id = %id,
                    role = %entry.role,
                    remote = %entry.remote,
                    age_secs = entry.age_secs(),
                    "Session evicted"
                );
            }
        }
        stale
    }

    pub async fn count_by_role(&self, role: Role) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.role == role)
            .count()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<SessionEntry>> {
        let removed = self.sessions.write().await.remove(id);
        if let Some(entry) = &removed {
            tracing::info!(
                session_id = %id,
                role = %entry.role,
                age_secs = entry.age_secs(),
                "Session removed"
            );
        }
        removed
    }

    /// Remove the session only while `connection_id` still owns it
    pub async fn release(&self, id: &str, connection_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let owned = sessions
            .get(id)
            .is_some_and(|entry| entry.connection_id == connection_id);
        if !owned {
            tracing::debug!(
                session_id = %id,
                "Session owned by a newer connection; keeping it"
            );
            return false;
        }
        if let Some(entry) = sessions.remove(id) {
            tracing::info!(
                session_id = %id,
                role = %entry.role,
                age_secs = entry.age_secs(),
                "Session removed"
            );
        }
        true
    }

    pub async fn send_to(&self, id: &str, message: &ServerMessage) -> bool {
        let sessions = self.sessions.read().await;

        let Some(entry) = sessions.get(id) else {
            return false;
        };
        if let Err(e) = entry.sender.send(message.clone()) {
            tracing::warn!(session_id = %id, error = %e, "Dropped outbound message");
            return false;
        }
        true
    }

    /// Send to every session holding `role`; returns how many were reached
    pub async fn broadcast_to_role(&self, role: Role, message: &ServerMessage) -> usize {
        let sessions = self.sessions.read().await;

        let mut delivered = 0;
        for entry in sessions.values().filter(|entry| entry.role == role) {
            match entry.sender.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(session_id = %entry.id, error = %e, "Dropped outbound message")
                }
            }
        }
        tracing::debug!(%role, delivered, "Broadcast to role");
        delivered
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
