//! Board Room Registry
//!
//! Tracks which authenticated connection is present in which room and fans
//! events out to room members. Rooms are keyed by an opaque UUID: board
//! rooms for task traffic, project rooms for collection traffic.
//!
//! A connection is a member of at most one room at a time; joining a second
//! room auto-leaves the first. The registry is the only purely in-memory
//! shared mutable state in the server.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::event::{ServerEvent, SocketUser};

/// One connected participant of a room.
///
/// The sender is the connection's outbound frame queue; events pushed into
/// it are delivered in emission order by the connection's writer task.
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub conn_id: Uuid,
    pub user: SocketUser,
    sender: mpsc::UnboundedSender<Arc<String>>,
}

impl RoomMember {
    pub fn new(conn_id: Uuid, user: SocketUser, sender: mpsc::UnboundedSender<Arc<String>>) -> Self {
        Self {
            conn_id,
            user,
            sender,
        }
    }

    fn send(&self, frame: Arc<String>) -> bool {
        self.sender.send(frame).is_ok()
    }
}

#[derive(Default)]
struct Inner {
    /// room id -> connection id -> member
    rooms: HashMap<Uuid, HashMap<Uuid, RoomMember>>,
    /// connection id -> the room it currently occupies
    memberships: HashMap<Uuid, Uuid>,
}

#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `member` in `room_id` and announce the arrival to the other
    /// members. Access must have been checked by the caller.
    ///
    /// If the connection was in another room it leaves that room first
    /// (announced there as `user:left`). Returns the room that was left.
    pub async fn join(&self, room_id: Uuid, member: RoomMember) -> Option<Uuid> {
        let conn_id = member.conn_id;
        let previous = {
            let inner = self.inner.read().await;
            inner.memberships.get(&conn_id).copied()
        };
        let left = match previous {
            Some(prev) if prev != room_id => {
                self.leave(prev, conn_id).await;
                Some(prev)
            }
            Some(prev) => {
                // Rejoining the current room is a no-op.
                return Some(prev);
            }
            None => None,
        };

        let joined = ServerEvent::user_joined(&member.user, room_id);
        {
            let mut inner = self.inner.write().await;
            inner.memberships.insert(conn_id, room_id);
            inner
                .rooms
                .entry(room_id)
                .or_default()
                .insert(conn_id, member);
        }
        self.emit(room_id, &joined, Some(conn_id)).await;
        left
    }

    /// Remove `conn_id` from `room_id` and announce the departure.
    ///
    /// Idempotent: leaving a room twice, or a room never joined, changes
    /// nothing and broadcasts nothing.
    pub async fn leave(&self, room_id: Uuid, conn_id: Uuid) -> bool {
        let removed = {
            let mut inner = self.inner.write().await;
            let removed = inner
                .rooms
                .get_mut(&room_id)
                .and_then(|members| members.remove(&conn_id));
            if removed.is_some() {
                inner.memberships.remove(&conn_id);
                if inner.rooms.get(&room_id).is_some_and(|m| m.is_empty()) {
                    inner.rooms.remove(&room_id);
                }
            }
            removed
        };
        match removed {
            Some(member) => {
                let left = ServerEvent::user_left(&member.user, room_id);
                self.emit(room_id, &left, None).await;
                true
            }
            None => false,
        }
    }

    /// Implicit leave on connection termination.
    pub async fn disconnect(&self, conn_id: Uuid) -> Option<Uuid> {
        let room_id = {
            let inner = self.inner.read().await;
            inner.memberships.get(&conn_id).copied()
        }?;
        self.leave(room_id, conn_id).await;
        Some(room_id)
    }

    /// The room this connection most recently joined, if any.
    pub async fn room_of(&self, conn_id: Uuid) -> Option<Uuid> {
        let inner = self.inner.read().await;
        inner.memberships.get(&conn_id).copied()
    }

    pub async fn member_count(&self, room_id: Uuid) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.get(&room_id).map_or(0, |members| members.len())
    }

    /// Serialize `event` once and push it to every member of the room,
    /// skipping `exclude` (the initiating connection) when given.
    ///
    /// Members whose connection has gone away are dropped from the room;
    /// their departure was or will be announced by `disconnect`.
    pub async fn emit(&self, room_id: Uuid, event: &ServerEvent, exclude: Option<Uuid>) -> usize {
        let frame = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "failed to serialize event");
                return 0;
            }
        };

        let mut dead = Vec::new();
        let recipients = {
            let inner = self.inner.read().await;
            let Some(members) = inner.rooms.get(&room_id) else {
                return 0;
            };
            let mut recipients = 0;
            for member in members.values() {
                if Some(member.conn_id) == exclude {
                    continue;
                }
                if member.send(Arc::clone(&frame)) {
                    recipients += 1;
                } else {
                    dead.push(member.conn_id);
                }
            }
            recipients
        };

        if !dead.is_empty() {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            if let Some(members) = inner.rooms.get_mut(&room_id) {
                for conn_id in &dead {
                    members.remove(conn_id);
                    inner.memberships.remove(conn_id);
                }
            }
        }

        tracing::debug!(event = event.name(), %room_id, recipients, "broadcast event");
        recipients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> (RoomMember, mpsc::UnboundedReceiver<Arc<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let user = SocketUser {
            user_id: Uuid::new_v4(),
            username: name.to_string(),
        };
        (RoomMember::new(Uuid::new_v4(), user, tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Arc<String>>) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_join_announces_to_existing_members_only() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let (alice, mut alice_rx) = member("alice");
        let (bob, mut bob_rx) = member("bob");

        let _ = registry.join(room, alice).await;
        let _ = registry.join(room, bob).await;

        let alice_events = drain(&mut alice_rx);
        assert_eq!(alice_events.len(), 1);
        assert_eq!(alice_events[0]["type"], "user:joined");
        assert_eq!(alice_events[0]["data"]["username"], "bob");
        // The joiner gets no echo of their own arrival.
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let (alice, _alice_rx) = member("alice");
        let (bob, mut bob_rx) = member("bob");
        let alice_conn = alice.conn_id;

        let _ = registry.join(room, alice).await;
        let _ = registry.join(room, bob).await;
        drain(&mut bob_rx);

        assert!(registry.leave(room, alice_conn).await);
        assert!(!registry.leave(room, alice_conn).await);

        let bob_events = drain(&mut bob_rx);
        let left: Vec<_> = bob_events
            .iter()
            .filter(|e| e["type"] == "user:left")
            .collect();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["data"]["username"], "alice");
        assert_eq!(registry.member_count(room).await, 1);
    }

    #[tokio::test]
    async fn test_leave_unjoined_room_is_noop() {
        let registry = RoomRegistry::new();
        assert!(!registry.leave(Uuid::new_v4(), Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_join_second_room_leaves_first() {
        let registry = RoomRegistry::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let (alice, _alice_rx) = member("alice");
        let (watcher, mut watcher_rx) = member("watcher");
        let alice_conn = alice.conn_id;

        let _ = registry.join(room_a, watcher).await;
        // watcher is in room_a; alice joins a, then b
        let (alice_b, _rx_b) = {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                RoomMember::new(alice_conn, alice.user.clone(), tx),
                rx,
            )
        };
        let _ = registry.join(room_a, alice).await;
        drain(&mut watcher_rx);

        let left = registry.join(room_b, alice_b).await;
        assert_eq!(left, Some(room_a));
        assert_eq!(registry.member_count(room_a).await, 1);
        assert_eq!(registry.member_count(room_b).await, 1);
        assert_eq!(registry.room_of(alice_conn).await, Some(room_b));

        let watcher_events = drain(&mut watcher_rx);
        assert!(watcher_events.iter().any(|e| e["type"] == "user:left"
            && e["data"]["username"] == "alice"));
    }

    #[tokio::test]
    async fn test_disconnect_is_implicit_leave() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let (alice, _alice_rx) = member("alice");
        let (bob, mut bob_rx) = member("bob");
        let alice_conn = alice.conn_id;

        let _ = registry.join(room, alice).await;
        let _ = registry.join(room, bob).await;
        drain(&mut bob_rx);

        assert_eq!(registry.disconnect(alice_conn).await, Some(room));
        assert_eq!(registry.disconnect(alice_conn).await, None);

        let events = drain(&mut bob_rx);
        assert!(events.iter().any(|e| e["type"] == "user:left"));
        assert_eq!(registry.member_count(room).await, 1);
    }

    #[tokio::test]
    async fn test_emit_excludes_initiator() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let (alice, mut alice_rx) = member("alice");
        let (bob, mut bob_rx) = member("bob");
        let bob_conn = bob.conn_id;

        let _ = registry.join(room, alice).await;
        let _ = registry.join(room, bob).await;
        drain(&mut alice_rx);

        let event = ServerEvent::error("test");
        let recipients = registry.emit(room, &event, Some(bob_conn)).await;
        assert_eq!(recipients, 1);
        assert_eq!(drain(&mut alice_rx).len(), 1);
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_emit_drops_dead_members() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let (alice, alice_rx) = member("alice");
        let _ = registry.join(room, alice).await;
        drop(alice_rx);

        let recipients = registry.emit(room, &ServerEvent::error("x"), None).await;
        assert_eq!(recipients, 0);
        assert_eq!(registry.member_count(room).await, 0);
    }
}
