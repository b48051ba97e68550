mod room;

use std::sync::Arc;

use dashmap::DashMap;
use log::info;
use thiserror::Error;

pub use room::*;

use crate::{
    bounded, DatabaseError, EventReceiver, HalaContext, HalaEvent, NewRoom, RoomId, UserData,
};

/// The topic a room falls back to when none is given
pub const DEFAULT_TOPIC: &str = "General Chat";

/// In-memory registry of live rooms
pub type RoomStore = Arc<DashMap<RoomId, Arc<Room>>>;

pub struct RoomManager {
    context: HalaContext,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room title must not be empty")]
    EmptyTitle,
    #[error("room:{0} doesn't exist")]
    RoomNotFound(RoomId),
    #[error("All speaker seats are taken")]
    StageFull,
    #[error("Only the host may close a room")]
    NotHost,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The current room list plus a receiver for every change after it.
pub struct RoomsSubscription {
    /// Newest-created-first, same ordering as [RoomManager::list_all]
    pub rooms: Vec<RoomSnapshot>,
    pub events: EventReceiver,
}

impl RoomManager {
    pub fn new(context: &HalaContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Restores persisted rooms on startup. Stage and audience state is not
    /// durable, so restored rooms come back with the host seat only.
    pub async fn restore(&self) -> Result<(), DatabaseError> {
        let rooms = bounded(self.context.database.list_rooms()).await?;

        for data in rooms.into_iter().filter(|r| r.is_active) {
            let room = Arc::new(Room::new(&self.context, data, 0));
            self.context.rooms.insert(room.id(), room);
        }

        Ok(())
    }

    /// Creates a new room with the given user as its host. A blank topic
    /// falls back to [DEFAULT_TOPIC]; the host seat starts unmuted and the
    /// host counts as the first audience member.
    pub async fn create_room(
        &self,
        host: UserData,
        title: &str,
        topic: &str,
    ) -> Result<Arc<Room>, RoomError> {
        if title.trim().is_empty() {
            return Err(RoomError::EmptyTitle);
        }

        let topic = if topic.trim().is_empty() {
            DEFAULT_TOPIC
        } else {
            topic
        };

        let data = bounded(self.context.database.create_room(NewRoom {
            title: title.to_string(),
            topic: topic.to_string(),
            host_id: host.id.clone(),
        }))
        .await?;

        let room = Arc::new(Room::new(&self.context, data, 1));
        self.context.rooms.insert(room.id(), room.clone());

        info!("Room {} created by {}", room.title(), host.display_name);

        self.context.events.emit(HalaEvent::RoomCreated {
            room: room.snapshot(),
        });

        Ok(room)
    }

    /// Counts a listener into the room's audience. Joining a room that no
    /// longer exists is a silent no-op, the caller may be racing a close.
    pub fn join_room(&self, room_id: RoomId) {
        if let Some(room) = self.context.rooms.get(&room_id) {
            room.add_audience();
        }
    }

    /// Counts a listener out of the room's audience, floored at zero.
    /// A silent no-op when the room no longer exists.
    pub fn leave_room(&self, room_id: RoomId) {
        if let Some(room) = self.context.rooms.get(&room_id) {
            room.remove_audience();
        }
    }

    /// Closes a room for good. Only the host may do this; the room is
    /// deactivated in the store and dropped from the registry.
    pub async fn close_room(&self, room_id: RoomId, user_id: &str) -> Result<(), RoomError> {
        let room = self.room_by_id(room_id)?;

        if room.host_id() != user_id {
            return Err(RoomError::NotHost);
        }

        room.deactivate();
        bounded(self.context.database.set_room_active(room_id, false)).await?;

        self.context.rooms.remove(&room_id);

        info!("Room {} closed by its host", room.title());
        self.context.events.emit(HalaEvent::RoomClosed { room_id });

        Ok(())
    }

    pub fn room_by_id(&self, room_id: RoomId) -> Result<Arc<Room>, RoomError> {
        self.context
            .rooms
            .get(&room_id)
            .map(|r| r.clone())
            .ok_or(RoomError::RoomNotFound(room_id))
    }

    /// All live rooms, newest-created-first
    pub fn list_all(&self) -> Vec<Arc<Room>> {
        let mut rooms: Vec<_> = self.context.rooms.iter().map(|r| r.clone()).collect();

        rooms.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id().cmp(&a.id()))
        });

        rooms
    }

    /// Delivers the current room list immediately and an independent
    /// receiver for every change after it. Any number of subscriptions may
    /// coexist.
    pub fn subscribe(&self) -> RoomsSubscription {
        // Register for events before snapshotting so no change is lost
        let events = self.context.events.subscribe();
        let rooms = self.list_all().iter().map(|r| r.snapshot()).collect();

        RoomsSubscription { rooms, events }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Database, EventBus, MemoryDatabase, NewUser};

    async fn manager() -> (RoomManager, HalaContext) {
        let context = HalaContext {
            database: Arc::new(MemoryDatabase::default()),
            events: EventBus::default(),
            rooms: Default::default(),
        };

        (RoomManager::new(&context), context)
    }

    async fn user(context: &HalaContext, id: &str) -> UserData {
        context
            .database
            .create_user(NewUser {
                id: id.to_string(),
                display_name: id.to_string(),
                avatar: String::new(),
            })
            .await
            .expect("user is created")
    }

    #[tokio::test]
    async fn new_rooms_seed_an_unmuted_host_and_default_topic() {
        let (manager, context) = manager().await;
        let host = user(&context, "host").await;

        let room = manager.create_room(host, "Night Talk", "").await.unwrap();
        let snapshot = room.snapshot();

        assert_eq!(snapshot.topic, DEFAULT_TOPIC);
        assert_eq!(snapshot.host.role, SeatRole::Host);
        assert!(!snapshot.host.is_muted);
        assert!(snapshot.speakers.is_empty());
        assert_eq!(snapshot.audience_count, 1);
        assert!(snapshot.is_active);
    }

    #[tokio::test]
    async fn blank_titles_are_rejected() {
        let (manager, context) = manager().await;
        let host = user(&context, "host").await;

        let result = manager.create_room(host, "  ", "Music").await;
        assert!(matches!(result, Err(RoomError::EmptyTitle)));
    }

    #[tokio::test]
    async fn rooms_list_newest_first() {
        let (manager, context) = manager().await;
        let host = user(&context, "host").await;

        let first = manager
            .create_room(host.clone(), "First", "")
            .await
            .unwrap();
        let second = manager
            .create_room(host.clone(), "Second", "")
            .await
            .unwrap();
        let third = manager.create_room(host, "Third", "").await.unwrap();

        let ids: Vec<_> = manager.list_all().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![third.id(), second.id(), first.id()]);
    }

    #[tokio::test]
    async fn joining_and_leaving_missing_rooms_is_a_noop() {
        let (manager, _) = manager().await;

        // Neither may panic or error
        manager.join_room(42);
        manager.leave_room(42);
    }

    #[tokio::test]
    async fn duplicate_leaves_floor_the_audience_at_zero() {
        let (manager, context) = manager().await;
        let host = user(&context, "host").await;

        let room = manager.create_room(host, "Night Talk", "").await.unwrap();

        manager.leave_room(room.id());
        manager.leave_room(room.id());
        manager.leave_room(room.id());
        assert_eq!(room.audience_count(), 0);

        manager.join_room(room.id());
        assert_eq!(room.audience_count(), 1);
    }

    #[tokio::test]
    async fn subscriptions_see_the_snapshot_then_updates() {
        let (manager, context) = manager().await;
        let host = user(&context, "host").await;

        let room = manager.create_room(host, "Night Talk", "").await.unwrap();
        let subscription = manager.subscribe();

        assert_eq!(subscription.rooms.len(), 1);
        assert_eq!(subscription.rooms[0].id, room.id());

        manager.join_room(room.id());

        let event = subscription.events.try_recv().expect("update is delivered");
        assert!(matches!(
            event,
            HalaEvent::RoomUpdate { room: snapshot } if snapshot.audience_count == 2
        ));
    }

    #[tokio::test]
    async fn only_the_host_may_close_a_room() {
        let (manager, context) = manager().await;
        let host = user(&context, "host").await;
        let _ = user(&context, "other").await;

        let room = manager.create_room(host, "Night Talk", "").await.unwrap();

        let refused = manager.close_room(room.id(), "other").await;
        assert!(matches!(refused, Err(RoomError::NotHost)));

        manager.close_room(room.id(), "host").await.unwrap();
        assert!(manager.room_by_id(room.id()).is_err());

        // Joining a just-closed room must not throw
        manager.join_room(room.id());
    }

    #[tokio::test]
    async fn restore_brings_back_active_rooms_with_a_bare_stage() {
        let (manager, context) = manager().await;
        let host = user(&context, "host").await;

        let room = manager
            .create_room(host.clone(), "Night Talk", "")
            .await
            .unwrap();
        room.take_seat(&user(&context, "u1").await).unwrap();

        // A fresh registry over the same store
        let restored_context = HalaContext {
            database: context.database.clone(),
            events: EventBus::default(),
            rooms: Default::default(),
        };
        let restored = RoomManager::new(&restored_context);
        restored.restore().await.unwrap();

        let brought_back = restored.room_by_id(room.id()).unwrap();
        assert!(brought_back.speakers().is_empty());
        assert_eq!(brought_back.audience_count(), 0);
        assert!(!brought_back.host_seat().is_muted);
    }
}
