use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use crossbeam::atomic::AtomicCell;
use futures_util::Stream;
use hala_live::{Hala, HalaEvent};
use log::warn;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};
use utoipa::ToSchema;

use crate::{
    context::ServerContext,
    serialized::{ChatMessage, Room, ToSerialized, User},
    Router,
};

type ConnectionId = u64;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// The full room list, sent once when a connection opens
    RoomList { rooms: Vec<Room> },
    /// A new room went live
    RoomCreated { room: Room },
    /// A room's stage, audience, or identity state changed
    RoomUpdate { room: Room },
    /// A room was closed by its host
    RoomClosed { room_id: i32 },
    /// A chat or gift entry was appended to a room's timeline
    MessageSent {
        room_id: i32,
        message: ChatMessage,
    },
    /// A user's balance or lifetime spend changed
    WalletUpdate { user: User },
    /// A user changed their display name or avatar
    UserProfileUpdate { user: User },
}

impl From<HalaEvent> for ServerEvent {
    fn from(value: HalaEvent) -> Self {
        match value {
            HalaEvent::RoomCreated { room } => Self::RoomCreated {
                room: room.to_serialized(),
            },
            HalaEvent::RoomUpdate { room } => Self::RoomUpdate {
                room: room.to_serialized(),
            },
            HalaEvent::RoomClosed { room_id } => Self::RoomClosed { room_id },
            HalaEvent::MessageSent { room_id, message } => Self::MessageSent {
                room_id,
                message: message.to_serialized(),
            },
            HalaEvent::WalletUpdate { user } => Self::WalletUpdate {
                user: user.to_serialized(),
            },
            HalaEvent::UserProfileUpdate { user } => Self::UserProfileUpdate {
                user: user.to_serialized(),
            },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    next_id: AtomicCell<ConnectionId>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            next_id: AtomicCell::new(0),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            connection.send(event.clone())
        }
    }

    /// Registers a new connection, seeding it with the event `initial`
    /// produces. The closure runs under the same lock `broadcast` takes, so
    /// no event can slip between the initial snapshot and registration.
    fn connect(&self, initial: impl FnOnce() -> ServerEvent) -> ConnectionHandle {
        let connection = Connection::new(self.next_id.fetch_add(1));
        let handle = connection.handle(self.me.clone());

        let mut connections = self.connections.lock();

        connection.send(initial());
        connections.push(connection);

        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push_back(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        // Delivery order must match emit order
        let next_event = pending_messages
            .pop_front()
            .map(|m| serde_json::to_string(&m).expect("serializes properly"));

        if let Some(event) = next_event {
            return Poll::Ready(Some(Ok(Event::default().data(event))));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

/// Forwards every live system event to the connected sse clients
pub fn run_event_forwarding(hala: Arc<Hala>, sse: Arc<ServerSentEvents>) {
    let receiver = hala.subscribe();

    tokio::task::spawn_blocking(move || loop {
        match receiver.recv() {
            Ok(event) => sse.broadcast(event.into()),
            Err(_) => {
                warn!("Event forwarding stopped, the live system is gone");
                break;
            }
        }
    });
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from hala",
            body = ServerEvent
        )
    )
)]
async fn event_stream(State(context): State<ServerContext>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // New connections get the room list first so they never render empty.
    // The snapshot is taken while the connection registers, so a room created
    // in between is either in the list or arrives as its own event.
    let hala = context.hala.clone();

    let stream = context.sse.connect(|| ServerEvent::RoomList {
        rooms: hala.rooms.subscribe().rooms.to_serialized(),
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn the_initial_event_is_delivered_before_later_broadcasts() {
        let sse = ServerSentEvents::new();

        let handle = sse.connect(|| ServerEvent::RoomList { rooms: Vec::new() });
        sse.broadcast(ServerEvent::RoomClosed { room_id: 7 });

        let pending = handle.pending_messages.lock();

        assert!(matches!(pending[0], ServerEvent::RoomList { .. }));
        assert!(matches!(pending[1], ServerEvent::RoomClosed { room_id: 7 }));
    }

    #[test]
    fn events_around_connection_setup_are_never_lost() {
        const EVENTS: i32 = 200;

        let sse = ServerSentEvents::new();
        let emitted = Arc::new(Mutex::new(0i32));

        let emitter = {
            let sse = sse.clone();
            let emitted = emitted.clone();

            thread::spawn(move || {
                for room_id in 1..=EVENTS {
                    *emitted.lock() = room_id;
                    sse.broadcast(ServerEvent::RoomClosed { room_id });
                }
            })
        };

        let connections: Vec<_> = (0..32)
            .map(|_| {
                let seen = Arc::new(AtomicCell::new(0i32));

                let snapshot = seen.clone();
                let emitted = emitted.clone();

                let handle = sse.connect(move || {
                    snapshot.store(*emitted.lock());
                    ServerEvent::RoomList { rooms: Vec::new() }
                });

                (seen, handle)
            })
            .collect();

        emitter.join().expect("emitter finishes");

        for (seen, handle) in connections {
            let queued: Vec<i32> = handle
                .pending_messages
                .lock()
                .iter()
                .filter_map(|event| match event {
                    ServerEvent::RoomClosed { room_id } => Some(*room_id),
                    _ => None,
                })
                .collect();

            // Everything emitted after the snapshot must reach the connection
            for room_id in (seen.load() + 1)..=EVENTS {
                assert!(queued.contains(&room_id), "connection missed event {room_id}");
            }
        }
    }
}
