//! Event fan-out to the connections in a room.
//!
//! The service never talks to sockets. After a room's lock is released it
//! hands each event to an [`EventBroadcaster`], which must not block:
//! whatever sits behind it (WebSocket writers, SSE streams) drains on its
//! own schedule.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use ricochet_protocol::{RoomEvent, RoomId};
use tokio::sync::broadcast;

/// Receives fire-and-forget room notifications.
pub trait EventBroadcaster: Send + Sync + 'static {
    /// Delivers `event` to every connection associated with `room_id`.
    /// Must return without waiting on any receiver.
    fn broadcast(&self, room_id: &RoomId, event: RoomEvent);

    /// Called once a room has been deleted. Default: nothing to release.
    fn close_room(&self, _room_id: &RoomId) {}
}

/// Default capacity of each room's channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// An [`EventBroadcaster`] with one `tokio::sync::broadcast` channel per
/// room.
///
/// A receiver that falls more than `capacity` events behind skips ahead
/// (it sees `RecvError::Lagged`) instead of holding up the room.
pub struct ChannelBroadcaster {
    channels: RwLock<HashMap<RoomId, broadcast::Sender<RoomEvent>>>,
    capacity: usize,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Opens a receiver for a room's events, creating the channel on
    /// first use.
    pub fn subscribe(&self, room_id: &RoomId) -> broadcast::Receiver<RoomEvent> {
        if let Some(sender) = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
        {
            return sender.subscribe();
        }

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(room_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live receivers for a room.
    pub fn receiver_count(&self, room_id: &RoomId) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, room_id: &RoomId, event: RoomEvent) {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(room_id) else {
            tracing::trace!(%room_id, event = event.name(), "no subscribers, event dropped");
            return;
        };
        let name = event.name();
        match sender.send(event) {
            Ok(receivers) => tracing::trace!(%room_id, event = name, receivers, "event sent"),
            Err(_) => tracing::trace!(%room_id, event = name, "all receivers gone, event dropped"),
        }
    }

    fn close_room(&self, room_id: &RoomId) {
        // Dropping the sender ends every receiver's stream.
        if self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(room_id)
            .is_some()
        {
            tracing::debug!(%room_id, "room channel closed");
        }
    }
}
