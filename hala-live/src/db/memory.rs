use async_trait::async_trait;
use chrono::Utc;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;

use crate::{
    ChatMessageData, Database, DatabaseError, DatabaseResult, GiftData, NewMessage, NewRoom,
    NewSession, NewUser, PrimaryKey, Result, RoomData, RoomId, SessionData, StoreItemData,
    UserData, UserStatus,
};

/// An in-memory store implementation, used by tests and when no database url
/// is configured.
///
/// Wallet mutations go through the user entry's exclusive lock, which is the
/// per-user serialization point: a concurrent debit can never observe a stale
/// balance.
pub struct MemoryDatabase {
    users: DashMap<String, UserData>,
    sessions: DashMap<String, StoredSession>,
    rooms: DashMap<RoomId, RoomData>,
    messages: DashMap<RoomId, Vec<ChatMessageData>>,
    gifts: DashMap<String, GiftData>,
    store_items: DashMap<String, StoreItemData>,
    next_key: AtomicCell<PrimaryKey>,
}

struct StoredSession {
    token: String,
    user_id: String,
    expires_at: chrono::DateTime<Utc>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self {
            users: Default::default(),
            sessions: Default::default(),
            rooms: Default::default(),
            messages: Default::default(),
            gifts: Default::default(),
            store_items: Default::default(),
            next_key: AtomicCell::new(1),
        }
    }
}

impl MemoryDatabase {
    fn next_key(&self) -> PrimaryKey {
        self.next_key.fetch_add(1)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        self.users
            .get(user_id)
            .map(|u| u.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_id(&new_user.id)
            .await
            .conflict_or_ok("user", "id", &new_user.id)?;

        let user = UserData {
            id: new_user.id.clone(),
            display_name: new_user.display_name,
            avatar: new_user.avatar,
            status: UserStatus::Active,
            wallet_balance: 0,
            total_spent: 0,
            created_at: Utc::now(),
        };

        self.users.insert(new_user.id, user.clone());
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar: &str,
    ) -> Result<UserData> {
        let mut user = self.users.get_mut(user_id).ok_or(DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        })?;

        user.display_name = name.to_string();
        user.avatar = avatar.to_string();
        Ok(user.clone())
    }

    async fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<UserData> {
        let mut user = self.users.get_mut(user_id).ok_or(DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        })?;

        user.status = status;
        Ok(user.clone())
    }

    async fn credit_wallet(&self, user_id: &str, amount: i64) -> Result<UserData> {
        let mut user = self.users.get_mut(user_id).ok_or(DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        })?;

        user.wallet_balance += amount;
        Ok(user.clone())
    }

    async fn debit_wallet(&self, user_id: &str, amount: i64) -> Result<UserData> {
        let mut user = self.users.get_mut(user_id).ok_or(DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        })?;

        if user.wallet_balance < amount {
            return Err(DatabaseError::InsufficientFunds {
                required: amount,
                available: user.wallet_balance,
            });
        }

        // Both fields move together under the entry lock
        user.wallet_balance -= amount;
        user.total_spent += amount;
        Ok(user.clone())
    }

    async fn top_spenders(&self, limit: usize) -> Result<Vec<UserData>> {
        let mut users: Vec<_> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by(|a, b| b.total_spent.cmp(&a.total_spent));
        users.truncate(limit);
        Ok(users)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let session = self.sessions.get(token).ok_or(DatabaseError::NotFound {
            resource: "session",
            identifier: "token",
        })?;

        let user = self.user_by_id(&session.user_id).await?;

        Ok(SessionData {
            token: session.token.clone(),
            expires_at: session.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        let user = self.user_by_id(&new_session.user_id).await?;

        self.sessions.insert(
            new_session.token.clone(),
            StoredSession {
                token: new_session.token.clone(),
                user_id: new_session.user_id,
                expires_at: new_session.expires_at,
            },
        );

        Ok(SessionData {
            token: new_session.token,
            expires_at: new_session.expires_at,
            user,
        })
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.sessions
            .remove(token)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.sessions.retain(|_, s| s.expires_at > now);
        Ok(())
    }

    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData> {
        self.rooms
            .get(&room_id)
            .map(|r| r.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        Ok(self.rooms.iter().map(|r| r.clone()).collect())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let host = self.user_by_id(&new_room.host_id).await?;

        let room = RoomData {
            id: self.next_key(),
            title: new_room.title,
            topic: new_room.topic,
            host,
            is_active: true,
            created_at: Utc::now(),
        };

        self.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn set_room_active(&self, room_id: RoomId, active: bool) -> Result<RoomData> {
        let mut room = self.rooms.get_mut(&room_id).ok_or(DatabaseError::NotFound {
            resource: "room",
            identifier: "id",
        })?;

        room.is_active = active;
        Ok(room.clone())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessageData> {
        // Ensure the room exists
        let _ = self.room_by_id(new_message.room_id).await?;

        let message = ChatMessageData {
            id: self.next_key(),
            room_id: new_message.room_id,
            user_id: new_message.user_id,
            user_name: new_message.user_name,
            text: new_message.text,
            gift: new_message.gift,
            sent_at: Utc::now(),
        };

        self.messages
            .entry(new_message.room_id)
            .or_default()
            .push(message.clone());

        Ok(message)
    }

    async fn messages_by_room(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessageData>> {
        let messages = self
            .messages
            .get(&room_id)
            .map(|m| m.clone())
            .unwrap_or_default();

        let skipped = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skipped).collect())
    }

    async fn gift_by_id(&self, gift_id: &str) -> Result<GiftData> {
        self.gifts
            .get(gift_id)
            .map(|g| g.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "gift",
                identifier: "id",
            })
    }

    async fn list_gifts(&self) -> Result<Vec<GiftData>> {
        Ok(self.gifts.iter().map(|g| g.clone()).collect())
    }

    async fn create_gift(&self, gift: GiftData) -> Result<GiftData> {
        self.gift_by_id(&gift.id)
            .await
            .conflict_or_ok("gift", "id", &gift.id)?;

        self.gifts.insert(gift.id.clone(), gift.clone());
        Ok(gift)
    }

    async fn store_item_by_id(&self, item_id: &str) -> Result<StoreItemData> {
        self.store_items
            .get(item_id)
            .map(|i| i.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "store item",
                identifier: "id",
            })
    }

    async fn list_store_items(&self) -> Result<Vec<StoreItemData>> {
        Ok(self.store_items.iter().map(|i| i.clone()).collect())
    }

    async fn create_store_item(&self, item: StoreItemData) -> Result<StoreItemData> {
        self.store_item_by_id(&item.id)
            .await
            .conflict_or_ok("store item", "id", &item.id)?;

        self.store_items.insert(item.id.clone(), item.clone());
        Ok(item)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn store_with_user(balance: i64) -> MemoryDatabase {
        let db = MemoryDatabase::default();

        db.create_user(NewUser {
            id: "u1".to_string(),
            display_name: "Sarah".to_string(),
            avatar: String::new(),
        })
        .await
        .expect("user is created");

        if balance > 0 {
            db.credit_wallet("u1", balance).await.expect("credited");
        }

        db
    }

    #[tokio::test]
    async fn duplicate_user_is_a_conflict() {
        let db = store_with_user(0).await;

        let result = db
            .create_user(NewUser {
                id: "u1".to_string(),
                display_name: "Other".to_string(),
                avatar: String::new(),
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn failed_debit_leaves_wallet_untouched() {
        let db = store_with_user(50).await;

        let result = db.debit_wallet("u1", 60).await;
        assert!(matches!(
            result,
            Err(DatabaseError::InsufficientFunds {
                required: 60,
                available: 50
            })
        ));

        let user = db.user_by_id("u1").await.unwrap();
        assert_eq!(user.wallet_balance, 50);
        assert_eq!(user.total_spent, 0);
    }

    #[tokio::test]
    async fn debit_moves_both_fields_together() {
        let db = store_with_user(100).await;

        let user = db.debit_wallet("u1", 30).await.unwrap();
        assert_eq!(user.wallet_balance, 70);
        assert_eq!(user.total_spent, 30);
    }

    #[tokio::test]
    async fn recent_window_returns_newest_entries_oldest_first() {
        let db = store_with_user(0).await;

        let room = db
            .create_room(NewRoom {
                title: "Night Talk".to_string(),
                topic: "General Chat".to_string(),
                host_id: "u1".to_string(),
            })
            .await
            .unwrap();

        for text in ["one", "two", "three"] {
            db.create_message(NewMessage {
                room_id: room.id,
                user_id: "u1".to_string(),
                user_name: "Sarah".to_string(),
                text: text.to_string(),
                gift: None,
            })
            .await
            .unwrap();
        }

        let window = db.messages_by_room(room.id, 2).await.unwrap();
        let texts: Vec<_> = window.iter().map(|m| m.text.as_str()).collect();

        assert_eq!(texts, vec!["two", "three"]);
    }
}
