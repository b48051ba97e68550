use log::info;
use thiserror::Error;

use crate::{
    bounded, ChatMessageData, DatabaseError, GiftEventData, HalaContext, HalaEvent, NewMessage,
    RoomId, UserData,
};

/// How many messages a room timeline returns by default
pub const RECENT_MESSAGE_LIMIT: usize = 100;

/// Appends to and reads from a room's chat timeline. Gift announcements share
/// the timeline with plain text messages.
pub struct Messenger {
    context: HalaContext,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message text cannot be empty")]
    EmptyMessage,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl Messenger {
    pub fn new(context: &HalaContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn send_message(
        &self,
        room_id: RoomId,
        user: &UserData,
        text: &str,
    ) -> Result<ChatMessageData, ChatError> {
        let text = text.trim();

        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let message = bounded(self.context.database.create_message(NewMessage {
            room_id,
            user_id: user.id.clone(),
            user_name: user.display_name.clone(),
            text: text.to_string(),
            gift: None,
        }))
        .await?;

        self.context.events.emit(HalaEvent::MessageSent {
            room_id,
            message: message.clone(),
        });

        Ok(message)
    }

    /// Records a gift announcement in the timeline. The text is empty, the
    /// attached gift payload is what clients render.
    pub(crate) async fn gift_message(
        &self,
        room_id: RoomId,
        user: &UserData,
        gift: GiftEventData,
    ) -> Result<ChatMessageData, ChatError> {
        let message = bounded(self.context.database.create_message(NewMessage {
            room_id,
            user_id: user.id.clone(),
            user_name: user.display_name.clone(),
            text: String::new(),
            gift: Some(gift),
        }))
        .await?;

        info!(
            "{} sent {}x {} in room {}",
            user.display_name,
            message
                .gift
                .as_ref()
                .map(|g| g.amount)
                .unwrap_or_default(),
            message
                .gift
                .as_ref()
                .map(|g| g.gift_name.as_str())
                .unwrap_or_default(),
            room_id,
        );

        self.context.events.emit(HalaEvent::MessageSent {
            room_id,
            message: message.clone(),
        });

        Ok(message)
    }

    /// The most recent messages of a room in chronological order
    pub async fn recent_messages(&self, room_id: RoomId) -> Result<Vec<ChatMessageData>, ChatError> {
        Ok(bounded(
            self.context
                .database
                .messages_by_room(room_id, RECENT_MESSAGE_LIMIT),
        )
        .await?)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{Database, EventBus, GiftTier, MemoryDatabase, NewRoom, NewUser};

    async fn messenger_with_rooms(count: usize) -> (Messenger, Vec<RoomId>) {
        let context = HalaContext {
            database: Arc::new(MemoryDatabase::default()),
            events: EventBus::default(),
            rooms: Default::default(),
        };

        context
            .database
            .create_user(NewUser {
                id: "u1".to_string(),
                display_name: "Sarah".to_string(),
                avatar: String::new(),
            })
            .await
            .expect("user is created");

        let mut room_ids = Vec::new();

        for n in 0..count {
            let room = context
                .database
                .create_room(NewRoom {
                    title: format!("Room {}", n),
                    topic: "General Chat".to_string(),
                    host_id: "u1".to_string(),
                })
                .await
                .expect("room is created");

            room_ids.push(room.id);
        }

        (Messenger::new(&context), room_ids)
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let (messenger, rooms) = messenger_with_rooms(1).await;
        let user = UserData::mock("u1");

        assert!(matches!(
            messenger.send_message(rooms[0], &user, "   ").await,
            Err(ChatError::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn messages_come_back_in_send_order() {
        let (messenger, rooms) = messenger_with_rooms(2).await;
        let user = UserData::mock("u1");

        messenger
            .send_message(rooms[0], &user, "first")
            .await
            .unwrap();
        messenger
            .send_message(rooms[0], &user, "second")
            .await
            .unwrap();
        messenger
            .send_message(rooms[1], &user, "elsewhere")
            .await
            .unwrap();

        let messages = messenger.recent_messages(rooms[0]).await.unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();

        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn gift_messages_carry_their_payload() {
        let (messenger, rooms) = messenger_with_rooms(1).await;
        let user = UserData::mock("u1");

        let gift = GiftEventData {
            gift_name: "Rose".to_string(),
            amount: 3,
            tier: GiftTier::Basic,
        };

        messenger.gift_message(rooms[0], &user, gift).await.unwrap();

        let messages = messenger.recent_messages(rooms[0]).await.unwrap();
        let message = messages.first().expect("one message");

        assert!(message.is_gift());
        assert!(message.text.is_empty());
        assert_eq!(message.gift.as_ref().unwrap().amount, 3);
        assert_eq!(message.gift.as_ref().unwrap().tier, GiftTier::Basic);
    }
}
