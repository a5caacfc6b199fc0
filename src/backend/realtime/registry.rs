/**
 * Connection Registry
 *
 * The authoritative in-process table of live realtime connections. Each
 * entry records which household the connection belongs to and holds the
 * sending half of that connection's bounded outbound queue.
 *
 * # Ownership
 *
 * The registry owns the metadata record only. The socket itself is owned by
 * the per-connection task that accepted it; the registry can queue frames
 * for it but never closes it directly. An entry exists exactly while that
 * task is running, and the task removes its own entry on close or error.
 *
 * # Concurrency
 *
 * One `std::sync::Mutex` serializes `admit`, `remove`, iteration in
 * `broadcast`, and `stats`. Nothing awaits while the lock is held: every
 * per-entry delivery is a `try_send` on a bounded queue, so a slow client
 * costs one failed attempt and never stalls other tenants or admissions.
 *
 * # Example
 *
 * ```rust
 * use homesync::backend::realtime::registry::{ConnectionHandle, ConnectionRegistry};
 * use homesync::shared::{Envelope, FamilyId};
 * use tokio::sync::mpsc;
 *
 * let registry = ConnectionRegistry::new();
 * let (tx, _rx) = mpsc::channel(8);
 * let handle = ConnectionHandle::new();
 * registry.admit(handle, FamilyId(42), None, tx);
 *
 * let delivered = registry.broadcast(FamilyId(42), &Envelope::pong(), None);
 * assert_eq!(delivered, 1);
 * ```
 */

use crate::shared::{Envelope, FamilyId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Opaque key of one live connection, unique for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(Uuid);

impl ConnectionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A frame queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized envelope
    Text(String),
    /// Close the socket with this code; nothing is written after it
    Close { code: u16, reason: String },
}

/// Sending half of a connection's outbound queue
pub type OutboundSender = mpsc::Sender<Outbound>;

/// Registry entry
#[derive(Debug)]
struct Connection {
    family_id: FamilyId,
    user_id: Option<UserId>,
    connected_at: DateTime<Utc>,
    sender: OutboundSender,
}

/// Read-only view of a registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub handle: ConnectionHandle,
    pub family_id: FamilyId,
    pub user_id: Option<UserId>,
    pub connected_at: DateTime<Utc>,
}

/// Per-household connection count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyGroup {
    pub family_id: FamilyId,
    pub client_count: usize,
}

/// Snapshot returned by [`ConnectionRegistry::stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_clients: usize,
    /// Sorted by family id
    pub family_groups: Vec<FamilyGroup>,
}

/// Shared table of live connections
///
/// Cloning is cheap and every clone refers to the same table. Build one in
/// the composition root and hand it to whatever needs to broadcast.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<ConnectionHandle, Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionHandle, Connection>> {
        // A panic elsewhere while holding the lock leaves the map intact.
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a connection. An existing entry under the same handle is replaced.
    pub fn admit(
        &self,
        handle: ConnectionHandle,
        family_id: FamilyId,
        user_id: Option<UserId>,
        sender: OutboundSender,
    ) {
        let connection = Connection {
            family_id,
            user_id,
            connected_at: Utc::now(),
            sender,
        };

        let total = {
            let mut connections = self.lock();
            if connections.insert(handle, connection).is_some() {
                tracing::warn!(%handle, "[Registry] Handle admitted twice, replacing entry");
            }
            connections.len()
        };

        tracing::info!(
            %handle,
            family_id = %family_id,
            user_id = ?user_id.map(|u| u.0),
            total_clients = total,
            "[Registry] Client connected"
        );
    }

    /// Delete a connection. Safe to call repeatedly or for unknown handles.
    ///
    /// Returns whether an entry was removed.
    pub fn remove(&self, handle: ConnectionHandle) -> bool {
        let (removed, total) = {
            let mut connections = self.lock();
            let removed = connections.remove(&handle);
            (removed, connections.len())
        };

        match removed {
            Some(connection) => {
                tracing::info!(
                    %handle,
                    family_id = %connection.family_id,
                    user_id = ?connection.user_id.map(|u| u.0),
                    total_clients = total,
                    "[Registry] Client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Send an envelope to every connection of a household
    ///
    /// `exclude` skips one connection, typically the one whose request
    /// triggered the change. Failures are logged per recipient and never
    /// stop delivery to the rest. Returns the number of successful sends.
    pub fn broadcast(
        &self,
        family_id: FamilyId,
        envelope: &Envelope,
        exclude: Option<ConnectionHandle>,
    ) -> usize {
        let frame = match encode(envelope) {
            Some(frame) => frame,
            None => return 0,
        };

        let connections = self.lock();
        connections
            .iter()
            .filter(|(handle, connection)| {
                connection.family_id == family_id && Some(**handle) != exclude
            })
            .filter(|(handle, connection)| deliver(**handle, connection, frame.clone()))
            .count()
    }

    /// Send an envelope to one connection. Returns whether it was queued.
    pub fn send_to(&self, handle: ConnectionHandle, envelope: &Envelope) -> bool {
        let frame = match encode(envelope) {
            Some(frame) => frame,
            None => return false,
        };

        let connections = self.lock();
        match connections.get(&handle) {
            Some(connection) => deliver(handle, connection, frame),
            None => {
                tracing::debug!(%handle, "[Registry] Unicast to unknown connection");
                false
            }
        }
    }

    /// Ask a connection to close itself with the given close code
    ///
    /// The entry stays until the connection's own close path removes it.
    pub fn evict(&self, handle: ConnectionHandle, code: u16, reason: &str) -> bool {
        let connections = self.lock();
        match connections.get(&handle) {
            Some(connection) => {
                tracing::info!(%handle, code, reason, "[Registry] Evicting connection");
                deliver(
                    handle,
                    connection,
                    Outbound::Close {
                        code,
                        reason: reason.to_string(),
                    },
                )
            }
            None => false,
        }
    }

    /// Total connection count and per-household breakdown
    pub fn stats(&self) -> RegistryStats {
        let connections = self.lock();
        let mut groups: BTreeMap<FamilyId, usize> = BTreeMap::new();
        for connection in connections.values() {
            *groups.entry(connection.family_id).or_default() += 1;
        }

        RegistryStats {
            total_clients: connections.len(),
            family_groups: groups
                .into_iter()
                .map(|(family_id, client_count)| FamilyGroup {
                    family_id,
                    client_count,
                })
                .collect(),
        }
    }

    /// Metadata of one connection, if it is registered
    pub fn get(&self, handle: ConnectionHandle) -> Option<ConnectionInfo> {
        self.lock().get(&handle).map(|connection| ConnectionInfo {
            handle,
            family_id: connection.family_id,
            user_id: connection.user_id,
            connected_at: connection.connected_at,
        })
    }

    /// Every connection of one household, oldest first
    pub fn connections_of(&self, family_id: FamilyId) -> Vec<ConnectionInfo> {
        let mut members: Vec<ConnectionInfo> = self
            .lock()
            .iter()
            .filter(|(_, connection)| connection.family_id == family_id)
            .map(|(handle, connection)| ConnectionInfo {
                handle: *handle,
                family_id: connection.family_id,
                user_id: connection.user_id,
                connected_at: connection.connected_at,
            })
            .collect();
        members.sort_by_key(|info| info.connected_at);
        members
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn encode(envelope: &Envelope) -> Option<Outbound> {
    match envelope.to_json() {
        Ok(text) => Some(Outbound::Text(text)),
        Err(e) => {
            tracing::error!("[Registry] Failed to serialize envelope: {}", e);
            None
        }
    }
}

/// The one place that decides whether a connection can take a frame
fn deliver(handle: ConnectionHandle, connection: &Connection, frame: Outbound) -> bool {
    if connection.sender.is_closed() {
        tracing::debug!(%handle, "[Registry] Skipping connection that is no longer open");
        return false;
    }

    match connection.sender.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(
                %handle,
                family_id = %connection.family_id,
                "[Registry] Outbound queue full, dropping frame"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(%handle, "[Registry] Connection closed during send");
            false
        }
    }
}
