use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use log::info;
use parking_lot::Mutex;

use crate::{HalaContext, HalaEvent, RoomData, RoomError, RoomId, UserData};

/// Maximum number of speaker seats on a room's stage, the host not included.
pub const MAX_SPEAKERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatRole {
    Host,
    Speaker,
}

/// A user's projection into a room, either the host slot or one of the
/// speaker slots. Mute state is room-scoped and travels with the seat, not
/// the user record.
#[derive(Debug, Clone)]
pub struct Seat {
    pub user_id: String,
    pub name: String,
    pub avatar: String,
    pub role: SeatRole,
    pub is_muted: bool,
}

impl Seat {
    /// The host is forcibly unmuted when their room goes live
    fn host(user: &UserData) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.display_name.clone(),
            avatar: user.avatar.clone(),
            role: SeatRole::Host,
            is_muted: false,
        }
    }

    /// New speakers always start muted
    fn speaker(user: &UserData) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.display_name.clone(),
            avatar: user.avatar.clone(),
            role: SeatRole::Speaker,
            is_muted: true,
        }
    }
}

/// The host seat and up to [MAX_SPEAKERS] speaker seats of a room. Speaker
/// order is seat assignment order and is never reshuffled.
#[derive(Debug, Clone)]
struct Stage {
    host: Seat,
    speakers: Vec<Seat>,
}

impl Stage {
    fn seat_mut(&mut self, user_id: &str) -> Option<&mut Seat> {
        if self.host.user_id == user_id {
            return Some(&mut self.host);
        }

        self.speakers.iter_mut().find(|s| s.user_id == user_id)
    }
}

/// A consistent copy of a room's live state.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub title: String,
    pub topic: String,
    pub host: Seat,
    pub speakers: Vec<Seat>,
    pub audience_count: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A live room. All stage mutations go through one mutex, which is the
/// per-room serialization point: two concurrent seat requests can never both
/// observe a stage with a free slot and overflow it.
pub struct Room {
    context: HalaContext,
    data: RoomData,
    stage: Mutex<Stage>,
    audience: AtomicCell<u32>,
    active: AtomicCell<bool>,
}

impl Room {
    pub(crate) fn new(context: &HalaContext, data: RoomData, audience: u32) -> Self {
        let stage = Stage {
            host: Seat::host(&data.host),
            speakers: Vec::new(),
        };

        Self {
            context: context.clone(),
            stage: Mutex::new(stage),
            audience: AtomicCell::new(audience),
            active: AtomicCell::new(data.is_active),
            data,
        }
    }

    pub fn id(&self) -> RoomId {
        self.data.id
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    pub fn host_id(&self) -> &str {
        &self.data.host.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.data.created_at
    }

    pub fn is_active(&self) -> bool {
        self.active.load()
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false);
    }

    /// Seats a user on the stage. Seating the host or an already seated user
    /// is a silent no-op; a full stage is an error and leaves the requester
    /// in the audience.
    pub fn take_seat(&self, user: &UserData) -> Result<(), RoomError> {
        {
            let mut stage = self.stage.lock();

            if stage.host.user_id == user.id {
                return Ok(());
            }

            if stage.speakers.iter().any(|s| s.user_id == user.id) {
                return Ok(());
            }

            if stage.speakers.len() >= MAX_SPEAKERS {
                return Err(RoomError::StageFull);
            }

            stage.speakers.push(Seat::speaker(user));
        }

        info!("{} took a seat in room {}", user.display_name, self.id());
        self.emit_update();
        Ok(())
    }

    /// Removes a user's speaker seat, preserving the order of the remaining
    /// seats. Idempotent, leaving twice is the same as leaving once.
    pub fn leave_seat(&self, user_id: &str) {
        let removed = {
            let mut stage = self.stage.lock();
            let before = stage.speakers.len();

            stage.speakers.retain(|s| s.user_id != user_id);
            stage.speakers.len() != before
        };

        if removed {
            info!("{} left their seat in room {}", user_id, self.id());
            self.emit_update();
        }
    }

    /// Sets the mute state of a seated user, checking the host slot first.
    /// A silent no-op for users that are not seated, since a departed
    /// speaker may still have in-flight mute toggles.
    pub fn set_mute(&self, user_id: &str, muted: bool) {
        let changed = {
            let mut stage = self.stage.lock();

            match stage.seat_mut(user_id) {
                Some(seat) if seat.is_muted != muted => {
                    seat.is_muted = muted;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.emit_update();
        }
    }

    /// Propagates a profile change into the user's seat, if they hold one,
    /// so co-occupants see the updated identity right away.
    pub fn update_identity(&self, user_id: &str, name: &str, avatar: &str) {
        let changed = {
            let mut stage = self.stage.lock();

            match stage.seat_mut(user_id) {
                Some(seat) => {
                    seat.name = name.to_string();
                    seat.avatar = avatar.to_string();
                    true
                }
                None => false,
            }
        };

        if changed {
            self.emit_update();
        }
    }

    pub fn add_audience(&self) {
        self.audience.fetch_add(1);
        self.emit_update();
    }

    /// Floored at zero, duplicate leave calls are allowed
    pub fn remove_audience(&self) {
        let mut current = self.audience.load();

        while current > 0 {
            match self.audience.compare_exchange(current, current - 1) {
                Ok(_) => {
                    self.emit_update();
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn audience_count(&self) -> u32 {
        self.audience.load()
    }

    pub fn speakers(&self) -> Vec<Seat> {
        self.stage.lock().speakers.clone()
    }

    pub fn host_seat(&self) -> Seat {
        self.stage.lock().host.clone()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let stage = self.stage.lock();

        RoomSnapshot {
            id: self.data.id,
            title: self.data.title.clone(),
            topic: self.data.topic.clone(),
            host: stage.host.clone(),
            speakers: stage.speakers.clone(),
            audience_count: self.audience.load(),
            is_active: self.active.load(),
            created_at: self.data.created_at,
        }
    }

    fn emit_update(&self) {
        self.context.events.emit(HalaEvent::RoomUpdate {
            room: self.snapshot(),
        });
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::{EventBus, MemoryDatabase, UserData};

    fn test_room() -> Room {
        let context = HalaContext {
            database: Arc::new(MemoryDatabase::default()),
            events: EventBus::default(),
            rooms: Default::default(),
        };

        let host = UserData::mock("host");

        let data = RoomData {
            id: 1,
            title: "Night Talk".to_string(),
            topic: "General Chat".to_string(),
            host,
            is_active: true,
            created_at: Utc::now(),
        };

        Room::new(&context, data, 1)
    }

    #[test]
    fn stage_holds_at_most_eight_speakers() {
        let room = test_room();

        for n in 1..=8 {
            let user = UserData::mock(&format!("u{n}"));
            room.take_seat(&user).expect("seat is free");
        }

        let ninth = UserData::mock("u9");
        assert!(matches!(room.take_seat(&ninth), Err(RoomError::StageFull)));
        assert_eq!(room.speakers().len(), 8);
    }

    #[test]
    fn concurrent_seat_grabs_never_overflow_the_stage() {
        let room = Arc::new(test_room());

        let handles: Vec<_> = (1..=12)
            .map(|n| {
                let room = room.clone();
                std::thread::spawn(move || room.take_seat(&UserData::mock(&format!("u{n}"))))
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("thread joins"))
            .filter(|r| r.is_ok())
            .count();

        assert_eq!(successes, 8);
        assert_eq!(room.speakers().len(), 8);
    }

    #[test]
    fn host_and_repeat_requests_are_noops() {
        let room = test_room();
        let user = UserData::mock("u1");

        room.take_seat(&UserData::mock("host")).unwrap();
        assert!(room.speakers().is_empty());

        room.take_seat(&user).unwrap();
        room.take_seat(&user).unwrap();
        assert_eq!(room.speakers().len(), 1);
    }

    #[test]
    fn speakers_start_muted_and_the_host_does_not() {
        let room = test_room();

        room.take_seat(&UserData::mock("u1")).unwrap();

        assert!(!room.host_seat().is_muted);
        assert!(room.speakers()[0].is_muted);
        assert_eq!(room.speakers()[0].role, SeatRole::Speaker);
    }

    #[test]
    fn leave_seat_is_idempotent_and_preserves_order() {
        let room = test_room();

        for id in ["u1", "u2", "u3"] {
            room.take_seat(&UserData::mock(id)).unwrap();
        }

        room.leave_seat("u2");
        room.leave_seat("u2");

        let ids: Vec<_> = room.speakers().iter().map(|s| s.user_id.clone()).collect();
        assert_eq!(ids, vec!["u1", "u3"]);
    }

    #[test]
    fn take_then_leave_restores_the_prior_stage() {
        let room = test_room();

        room.take_seat(&UserData::mock("u1")).unwrap();
        room.take_seat(&UserData::mock("u2")).unwrap();

        let before: Vec<_> = room.speakers().iter().map(|s| s.user_id.clone()).collect();

        room.take_seat(&UserData::mock("u3")).unwrap();
        room.leave_seat("u3");

        let after: Vec<_> = room.speakers().iter().map(|s| s.user_id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn set_mute_reaches_the_host_slot_and_ignores_absent_users() {
        let room = test_room();

        room.take_seat(&UserData::mock("u1")).unwrap();

        room.set_mute("host", true);
        assert!(room.host_seat().is_muted);

        room.set_mute("u1", false);
        assert!(!room.speakers()[0].is_muted);

        // Departed user, must not panic or error
        room.set_mute("gone", true);
    }

    #[test]
    fn update_identity_only_touches_seated_users() {
        let room = test_room();

        room.take_seat(&UserData::mock("u1")).unwrap();
        room.update_identity("u1", "Layla", "avatar.png");
        room.update_identity("gone", "Nobody", "");

        let seat = &room.speakers()[0];
        assert_eq!(seat.name, "Layla");
        assert_eq!(seat.avatar, "avatar.png");
    }

    #[test]
    fn audience_count_never_goes_negative() {
        let room = test_room();
        assert_eq!(room.audience_count(), 1);

        room.remove_audience();
        room.remove_audience();
        room.remove_audience();
        assert_eq!(room.audience_count(), 0);

        room.add_audience();
        assert_eq!(room.audience_count(), 1);
    }
}
