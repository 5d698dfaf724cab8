//! In-process publish/subscribe hub
//!
//! Each client connection owns a bounded receiver. Publishing never blocks:
//! a connection whose buffer is full misses the message (counted as dropped),
//! and connections whose receiver was dropped are pruned on the next publish
//! that targets them.

use crate::error::Result;
use crate::transport::Transport;
use crate::types::{ConnectionStats, MatchId, Message, SubscriberId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

/// Identifier of one client connection
pub type ConnectionId = u64;

/// Client side of a hub connection
pub struct ClientConnection {
    id: ConnectionId,
    subscriber_id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Message>>,
}

impl ClientConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    /// Wait for the next message; None once the hub dropped the connection
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }

    /// Next buffered message, if any
    pub fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.try_recv().ok()
    }

    /// Drain every buffered message
    pub fn drain(&mut self) -> Vec<Arc<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.try_recv() {
            messages.push(message);
        }
        messages
    }
}

struct Connection {
    subscriber_id: SubscriberId,
    sender: mpsc::Sender<Arc<Message>>,
}

#[derive(Default)]
struct HubState {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, Connection>,
    by_user: HashMap<SubscriberId, HashSet<ConnectionId>>,
    by_match: HashMap<MatchId, HashSet<ConnectionId>>,
}

impl HubState {
    fn remove_connection(&mut self, id: ConnectionId) -> bool {
        let Some(connection) = self.connections.remove(&id) else {
            return false;
        };

        if let Some(ids) = self.by_user.get_mut(&connection.subscriber_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_user.remove(&connection.subscriber_id);
            }
        }

        self.by_match.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });

        true
    }

    fn senders(&self, ids: Option<&HashSet<ConnectionId>>) -> Vec<(ConnectionId, mpsc::Sender<Arc<Message>>)> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| {
                    self.connections
                        .get(id)
                        .map(|connection| (*id, connection.sender.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
    }
}

/// In-process transport keeping user and match subscriptions
pub struct LocalHub {
    state: RwLock<HubState>,
    buffer: usize,
    total_connections: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl LocalHub {
    /// Create a hub whose connections buffer up to `buffer` messages each
    pub fn new(buffer: usize) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            buffer: buffer.max(1),
            total_connections: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new connection for a subscriber
    pub fn connect(&self, subscriber_id: &str) -> ClientConnection {
        let (sender, receiver) = mpsc::channel(self.buffer);

        let id = {
            let mut state = self.state.write();
            state.next_id += 1;
            let id = state.next_id;
            state.connections.insert(
                id,
                Connection {
                    subscriber_id: subscriber_id.to_string(),
                    sender,
                },
            );
            state
                .by_user
                .entry(subscriber_id.to_string())
                .or_default()
                .insert(id);
            id
        };

        self.total_connections.fetch_add(1, Ordering::Relaxed);
        info!("Client connected: subscriber '{}', connection {}", subscriber_id, id);

        ClientConnection {
            id,
            subscriber_id: subscriber_id.to_string(),
            receiver,
        }
    }

    /// Remove a connection and all of its subscriptions
    pub fn disconnect(&self, id: ConnectionId) {
        if self.state.write().remove_connection(id) {
            info!("Client disconnected: connection {}", id);
        }
    }

    /// Subscribe every current connection of a subscriber to a match.
    /// Returns the number of connections subscribed.
    pub fn watch_match(&self, subscriber_id: &str, match_id: &str) -> usize {
        let mut state = self.state.write();
        let ids: Vec<ConnectionId> = state
            .by_user
            .get(subscriber_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        if ids.is_empty() {
            return 0;
        }

        state
            .by_match
            .entry(match_id.to_string())
            .or_default()
            .extend(ids.iter().copied());
        ids.len()
    }

    /// Remove a subscriber's connections from a match
    pub fn unwatch_match(&self, subscriber_id: &str, match_id: &str) {
        let mut state = self.state.write();
        let ids: Vec<ConnectionId> = state
            .by_user
            .get(subscriber_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        if let Some(watchers) = state.by_match.get_mut(match_id) {
            for id in ids {
                watchers.remove(&id);
            }
            if watchers.is_empty() {
                state.by_match.remove(match_id);
            }
        }
    }

    /// Connections currently watching a match
    pub fn match_watcher_count(&self, match_id: &str) -> usize {
        self.state
            .read()
            .by_match
            .get(match_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    fn deliver(&self, targets: Vec<(ConnectionId, mpsc::Sender<Arc<Message>>)>, message: &Message) {
        if targets.is_empty() {
            return;
        }

        let message = Arc::new(message.clone());
        let mut closed = Vec::new();

        for (id, sender) in targets {
            match sender.try_send(message.clone()) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Connection {} buffer full, dropping {}", id, message.type_tag());
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut state = self.state.write();
            for id in closed {
                state.remove_connection(id);
                debug!("Pruned closed connection {}", id);
            }
        }
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Transport for LocalHub {
    async fn publish_to_user(&self, subscriber_id: &str, message: &Message) -> Result<()> {
        let targets = {
            let state = self.state.read();
            state.senders(state.by_user.get(subscriber_id))
        };
        self.deliver(targets, message);
        Ok(())
    }

    async fn publish_to_match_watchers(&self, match_id: &str, message: &Message) -> Result<()> {
        let targets = {
            let state = self.state.read();
            state.senders(state.by_match.get(match_id))
        };
        self.deliver(targets, message);
        Ok(())
    }

    async fn connection_stats(&self) -> ConnectionStats {
        ConnectionStats {
            active_connections: self.state.read().connections.len(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            messages_delivered: self.delivered.load(Ordering::Relaxed),
            messages_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
