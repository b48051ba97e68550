use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::{ChatMessageData, RoomId, RoomSnapshot, UserData};

pub type EventSender = Sender<HalaEvent>;
pub type EventReceiver = Receiver<HalaEvent>;

/// Events emitted by the live system.
#[derive(Debug, Clone)]
pub enum HalaEvent {
    /// A new room went live
    RoomCreated { room: RoomSnapshot },
    /// A room's stage, audience, or identity state changed
    RoomUpdate { room: RoomSnapshot },
    /// A room was closed by its host
    RoomClosed { room_id: RoomId },
    /// A chat or gift entry was appended to a room's log
    MessageSent {
        room_id: RoomId,
        message: ChatMessageData,
    },
    /// A user's balance or lifetime spend changed
    WalletUpdate { user: UserData },
    /// A user changed their display name or avatar
    UserProfileUpdate { user: UserData },
}

/// Fans events out to any number of independent subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<EventSender>>>,
}

impl EventBus {
    /// Registers a new subscriber. The receiver only sees events emitted
    /// after this call.
    pub fn subscribe(&self) -> EventReceiver {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    pub fn emit(&self, event: HalaEvent) {
        // Subscribers that dropped their receiver are pruned here
        self.subscribers
            .lock()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_event() {
        let bus = EventBus::default();

        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.emit(HalaEvent::RoomClosed { room_id: 1 });

        assert!(matches!(
            first.try_recv(),
            Ok(HalaEvent::RoomClosed { room_id: 1 })
        ));
        assert!(matches!(
            second.try_recv(),
            Ok(HalaEvent::RoomClosed { room_id: 1 })
        ));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::default();

        let receiver = bus.subscribe();
        drop(receiver);

        bus.emit(HalaEvent::RoomClosed { room_id: 1 });
        assert!(bus.subscribers.lock().is_empty());
    }
}
