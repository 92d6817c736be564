//! Real-time Hub
//!
//! Tracks live connections and the groups they belong to, and fans events
//! out to groups. Every connection owns an unbounded outbound queue of
//! encoded text frames; a writer task drains it into the socket.
//!
//! Group keys are `user_{id}` (all connections of one user) and
//! `room_{name}` (connections that joined a room).

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{dispatch_frame, GatewaySend};
use crate::application::services::Broadcaster;
use crate::domain::{HubEvent, HubGroup};
use crate::infrastructure::metrics;

pub type ConnectionId = Uuid;

const ANONYMOUS: i64 = 0;

/// A live socket as seen by the hub.
pub struct Connection {
    pub id: ConnectionId,
    user_id: AtomicI64,
    sequence: AtomicU64,
    groups: Mutex<HashSet<String>>,
    sender: mpsc::UnboundedSender<String>,
}

impl Connection {
    /// The identified user, if any.
    pub fn user_id(&self) -> Option<i64> {
        match self.user_id.load(Ordering::Acquire) {
            ANONYMOUS => None,
            id => Some(id),
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Queue a raw text frame. Fails once the writer has gone away.
    pub fn send_text(&self, text: String) -> bool {
        self.sender.send(text).is_ok()
    }

    /// Queue a control frame.
    pub fn send_control(&self, frame: &GatewaySend) -> bool {
        match frame.encode() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::error!(connection_id = %self.id, error = %e, "Failed to encode frame");
                false
            }
        }
    }

    /// Queue a dispatch of an event whose payload is already encoded.
    fn send_encoded(&self, event_name: &str, payload_json: &str) -> bool {
        self.send_text(dispatch_frame(event_name, self.next_sequence(), payload_json))
    }

    /// Queue a single event to this connection only.
    pub fn send_event(&self, event: &HubEvent) -> bool {
        match encode_payload(event) {
            Some(payload) => self.send_encoded(event.event_name(), &payload),
            None => false,
        }
    }
}

fn encode_payload(event: &HubEvent) -> Option<String> {
    match event.payload().map(|value| value.to_string()) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(event = event.event_name(), error = %e, "Failed to encode event");
            None
        }
    }
}

/// Connection registry and group fan-out.
pub struct Hub {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    groups: DashMap<String, HashSet<ConnectionId>>,
    heartbeat_interval_ms: u64,
}

impl Hub {
    pub fn new(heartbeat_interval_ms: u64) -> Self {
        Self {
            connections: DashMap::new(),
            groups: DashMap::new(),
            heartbeat_interval_ms,
        }
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    /// Register an anonymous connection.
    pub fn register(&self, sender: mpsc::UnboundedSender<String>) -> Arc<Connection> {
        let connection = Arc::new(Connection {
            id: Uuid::new_v4(),
            user_id: AtomicI64::new(ANONYMOUS),
            sequence: AtomicU64::new(0),
            groups: Mutex::new(HashSet::new()),
            sender,
        });
        self.connections.insert(connection.id, connection.clone());
        self.record_connections();

        tracing::debug!(connection_id = %connection.id, "Connection registered");
        connection
    }

    /// Bind a connection to a user and add it to the user's group.
    pub fn identify(&self, connection_id: ConnectionId, user_id: i64) -> bool {
        let Some(connection) = self.get(connection_id) else {
            return false;
        };
        connection.user_id.store(user_id, Ordering::Release);
        self.join(connection_id, &HubGroup::user(user_id));
        self.record_connections();

        tracing::info!(connection_id = %connection_id, user_id, "Connection identified");
        true
    }

    /// Add a connection to a group. Returns false if it was already a member.
    pub fn join(&self, connection_id: ConnectionId, group: &HubGroup) -> bool {
        let Some(connection) = self.get(connection_id) else {
            return false;
        };
        let key = group.key();
        if !connection.groups.lock().insert(key.clone()) {
            return false;
        }
        self.groups.entry(key).or_default().insert(connection_id);
        true
    }

    /// Remove a connection from a group. Returns false if it was not a member.
    pub fn leave(&self, connection_id: ConnectionId, group: &HubGroup) -> bool {
        let Some(connection) = self.get(connection_id) else {
            return false;
        };
        let key = group.key();
        if !connection.groups.lock().remove(&key) {
            return false;
        }
        self.remove_from_group(&key, connection_id);
        true
    }

    pub fn is_member(&self, connection_id: ConnectionId, group: &HubGroup) -> bool {
        self.groups
            .get(&group.key())
            .map(|members| members.contains(&connection_id))
            .unwrap_or(false)
    }

    /// Drop a connection and its memberships. Returns the identified user, if any.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<i64> {
        let (_, connection) = self.connections.remove(&connection_id)?;
        let keys: Vec<String> = connection.groups.lock().drain().collect();
        for key in keys {
            self.remove_from_group(&key, connection_id);
        }
        self.record_connections();

        tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        connection.user_id()
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&connection_id).map(|c| c.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn identified_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|c| c.user_id().is_some())
            .count()
    }

    /// Number of connections in a group.
    pub fn group_size(&self, group: &HubGroup) -> usize {
        self.groups.get(&group.key()).map(|m| m.len()).unwrap_or(0)
    }

    fn remove_from_group(&self, key: &str, connection_id: ConnectionId) {
        let emptied = match self.groups.get_mut(key) {
            Some(mut members) => {
                members.remove(&connection_id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.groups.remove_if(key, |_, members| members.is_empty());
        }
    }

    fn record_connections(&self) {
        metrics::set_hub_connections(self.connection_count(), self.identified_count());
    }

    fn members(&self, group: &HubGroup) -> Vec<Arc<Connection>> {
        let ids: Vec<ConnectionId> = match self.groups.get(&group.key()) {
            Some(members) => members.iter().copied().collect(),
            None => return Vec::new(),
        };
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }
}

impl Broadcaster for Hub {
    fn broadcast(&self, group: &HubGroup, event: &HubEvent) -> usize {
        let members = self.members(group);
        if members.is_empty() {
            return 0;
        }

        let Some(payload) = encode_payload(event) else {
            return 0;
        };
        let event_name = event.event_name();

        let mut delivered = 0;
        let mut failed = 0;
        for connection in members {
            if connection.send_encoded(event_name, &payload) {
                delivered += 1;
            } else {
                failed += 1;
                tracing::warn!(
                    connection_id = %connection.id,
                    group = %group,
                    event = event_name,
                    "Outbound queue closed, event dropped"
                );
            }
        }

        metrics::record_hub_delivery(event_name, delivered, failed);
        delivered
    }
}
