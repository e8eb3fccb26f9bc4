//! Process-wide registry of live connections.
//!
//! One [`Hub`] is built at startup and cloned into every handler. Admission
//! and eviction are the only mutators; delivery (see `broadcast.rs`) works on
//! a point-in-time snapshot so the lock is never held across a push.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::HubConfig;
use crate::ws::connection::{ClientInfo, CloseReason, Connection, ConnectionId};

/// Shared handle to the connection registry. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    config: HubConfig,
    started_at: Instant,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    overflow_evictions: AtomicU64,
    last_activity: Mutex<DateTime<Utc>>,
}

/// Read-only snapshot returned by [`Hub::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub total_clients: usize,
    pub connected_users: Vec<ClientInfo>,
    /// Live connection count per non-anonymous user id.
    pub users: BTreeMap<String, usize>,
    pub anonymous: usize,
    pub roles: BTreeMap<String, usize>,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub overflow_evictions: u64,
    pub uptime_secs: u64,
    pub last_activity: DateTime<Utc>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: RwLock::new(HashMap::new()),
                config,
                started_at: Instant::now(),
                messages_sent: AtomicU64::new(0),
                messages_received: AtomicU64::new(0),
                overflow_evictions: AtomicU64::new(0),
                last_activity: Mutex::new(Utc::now()),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Register a live connection.
    pub fn admit(&self, conn: Arc<Connection>) {
        let (user_id, role, id) = (conn.user_id.clone(), conn.role.clone(), conn.id);
        let previous = self.inner.connections.write().insert(id, conn);

        // Ids are fresh UUIDs, so a collision means the registry is corrupted
        debug_assert!(previous.is_none(), "connection {id} admitted twice");
        if let Some(stale) = previous {
            tracing::warn!(connection_id = %id, "Replacing connection with duplicate id");
            stale.close(CloseReason::Normal);
        }

        self.touch();
        tracing::debug!(
            connection_id = %id,
            user_id = %user_id,
            role = %role,
            connections = self.connection_count(),
            "Connection admitted"
        );
    }

    /// Remove a connection and close it. Evicting an id that is already gone
    /// is a no-op, since both loops of a session race to get here.
    pub fn evict(&self, id: ConnectionId) -> bool {
        self.evict_with(id, CloseReason::Normal)
    }

    pub(crate) fn evict_with(&self, id: ConnectionId, reason: CloseReason) -> bool {
        let removed = self.inner.connections.write().remove(&id);
        match removed {
            Some(conn) => {
                conn.close(reason);
                tracing::debug!(
                    connection_id = %id,
                    user_id = %conn.user_id,
                    reason = reason.as_str(),
                    "Connection evicted"
                );
                true
            }
            None => false,
        }
    }

    /// Evict every connection owned by `user_id`. Returns how many were removed.
    pub fn close_user(&self, user_id: &str) -> usize {
        let ids: Vec<ConnectionId> = self
            .snapshot(|c| c.user_id == user_id)
            .iter()
            .map(|c| c.id)
            .collect();
        ids.into_iter().filter(|id| self.evict(*id)).count()
    }

    /// Evict everything, used on shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> =
            self.inner.connections.write().drain().map(|(_, c)| c).collect();
        for conn in &drained {
            conn.close(CloseReason::Normal);
        }
        drained.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.read().len()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner.connections.read().get(&id).cloned()
    }

    /// Connections matching `filter` at this instant. The read lock is
    /// released before the caller touches any of them.
    pub(crate) fn snapshot(&self, filter: impl Fn(&Connection) -> bool) -> Vec<Arc<Connection>> {
        self.inner
            .connections
            .read()
            .values()
            .filter(|c| filter(c))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> HubStats {
        let conns = self.snapshot(|_| true);

        let mut users = BTreeMap::new();
        let mut roles = BTreeMap::new();
        let mut anonymous = 0;
        for conn in &conns {
            if conn.is_anonymous() {
                anonymous += 1;
            } else {
                *users.entry(conn.user_id.clone()).or_insert(0) += 1;
            }
            *roles.entry(conn.role.clone()).or_insert(0) += 1;
        }

        let mut connected_users: Vec<ClientInfo> = conns.iter().map(|c| c.info()).collect();
        connected_users.sort_by_key(|c| c.joined_at);

        HubStats {
            total_clients: conns.len(),
            connected_users,
            users,
            anonymous,
            roles,
            messages_sent: self.inner.messages_sent.load(Ordering::Relaxed),
            messages_received: self.inner.messages_received.load(Ordering::Relaxed),
            overflow_evictions: self.inner.overflow_evictions.load(Ordering::Relaxed),
            uptime_secs: self.inner.started_at.elapsed().as_secs(),
            last_activity: *self.inner.last_activity.lock(),
        }
    }

    pub(crate) fn record_sent(&self) {
        self.inner.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.inner.messages_received.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub(crate) fn record_overflow(&self) {
        self.inner.overflow_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn touch(&self) {
        *self.inner.last_activity.lock() = Utc::now();
    }
}
