mod auth;
mod catalog;
mod chat;
mod db;
mod events;
mod rooms;
mod util;
mod wallet;

use std::sync::Arc;

use log::error;
use thiserror::Error;

pub use auth::*;
pub use catalog::*;
pub use chat::*;
pub use db::*;
pub use events::*;
pub use rooms::*;
pub use wallet::*;

/// The hala live system, facilitating rooms, stages, wallets, and chat.
pub struct Hala {
    context: HalaContext,

    pub auth: Auth,
    pub rooms: RoomManager,
    pub wallet: WalletLedger,
    pub catalog: Catalog,
    pub messenger: Messenger,
}

/// A type passed to the components of the live system, to access storage,
/// emit events, and reach live rooms.
#[derive(Clone)]
pub struct HalaContext {
    pub database: Arc<dyn Database>,
    pub events: EventBus,
    pub rooms: RoomStore,
}

#[derive(Debug, Error)]
pub enum GiftError {
    #[error("gift:{0} doesn't exist")]
    UnknownGift(String),
    #[error("item:{0} doesn't exist")]
    UnknownItem(String),
    #[error("Gift amount must be at least 1")]
    InvalidAmount,
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl Hala {
    pub async fn new(database: impl Database) -> std::result::Result<Self, DatabaseError> {
        let context = HalaContext {
            database: Arc::new(database),
            events: EventBus::default(),
            rooms: Default::default(),
        };

        let hala = Self {
            auth: Auth::new(&context),
            rooms: RoomManager::new(&context),
            wallet: WalletLedger::new(&context),
            catalog: Catalog::new(&context),
            messenger: Messenger::new(&context),
            context,
        };

        hala.catalog.seed_defaults().await?;
        hala.rooms.restore().await?;

        Ok(hala)
    }

    /// Returns a receiver of every event the system emits from now on
    pub fn subscribe(&self) -> EventReceiver {
        self.context.events.subscribe()
    }

    /// Sends `amount` of a gift into a room: one debit of the total price,
    /// then one gift announcement in the room's timeline. A failed debit
    /// records nothing.
    pub async fn send_gift(
        &self,
        room_id: RoomId,
        user_id: &str,
        gift_id: &str,
        amount: u32,
    ) -> std::result::Result<ChatMessageData, GiftError> {
        // The room check comes first so a missing room cannot cost coins
        self.rooms.room_by_id(room_id)?;

        if amount < 1 {
            return Err(GiftError::InvalidAmount);
        }

        let gift = match self.catalog.gift_by_id(gift_id).await {
            Ok(gift) => gift,
            Err(DatabaseError::NotFound { .. }) => {
                return Err(GiftError::UnknownGift(gift_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let total = gift.price * amount as i64;
        let user = self.wallet.debit(user_id, total).await?;

        let event = GiftEventData {
            gift_name: gift.name,
            amount,
            tier: gift.tier,
        };

        let message = self.messenger.gift_message(room_id, &user, event).await;

        match message {
            Ok(message) => Ok(message),
            Err(e) => {
                // The coins were already taken, so hand them back rather
                // than leave a paid-for gift unrecorded
                error!("Gift announcement failed, refunding {} coins: {}", total, e);

                if let Err(refund) = self.wallet.credit(user_id, total).await {
                    error!("Refund of {} coins to {} failed: {}", total, user_id, refund);
                }

                Err(e.into())
            }
        }
    }

    /// Buys a store item, debiting its price
    pub async fn purchase_item(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> std::result::Result<StoreItemData, GiftError> {
        let item = match self.catalog.store_item_by_id(item_id).await {
            Ok(item) => item,
            Err(DatabaseError::NotFound { .. }) => {
                return Err(GiftError::UnknownItem(item_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        self.wallet.debit(user_id, item.price).await?;

        Ok(item)
    }

    /// Updates a user's display name and avatar, propagating the change to
    /// every seat they currently occupy
    pub async fn update_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar: &str,
    ) -> std::result::Result<UserData, DatabaseError> {
        let mut name = name.trim().to_string();

        // A blank name keeps the current one instead of erasing it
        if name.is_empty() {
            name = bounded(self.context.database.user_by_id(user_id))
                .await?
                .display_name;
        }

        let user = bounded(
            self.context
                .database
                .update_user_profile(user_id, &name, avatar),
        )
        .await?;

        for room in self.context.rooms.iter() {
            room.update_identity(user_id, &user.display_name, &user.avatar);
        }

        self.context
            .events
            .emit(HalaEvent::UserProfileUpdate { user: user.clone() });

        Ok(user)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn hala() -> Hala {
        Hala::new(MemoryDatabase::default())
            .await
            .expect("live system boots")
    }

    async fn user_with_coins(hala: &Hala, id: &str, coins: i64) -> UserData {
        let session = hala
            .auth
            .sign_in(SignIn {
                user_id: id.to_string(),
                display_name: format!("user {}", id),
                avatar: String::new(),
            })
            .await
            .expect("signed in");

        if coins > 0 {
            hala.wallet.credit(id, coins).await.expect("credited")
        } else {
            session.user
        }
    }

    #[tokio::test]
    async fn gifts_debit_and_land_in_the_timeline() {
        let hala = hala().await;

        let host = user_with_coins(&hala, "host", 0).await;
        user_with_coins(&hala, "sender", 100).await;

        let room = hala
            .rooms
            .create_room(host, "Late Night", "")
            .await
            .unwrap();

        let message = hala
            .send_gift(room.id(), "sender", "heart", 3)
            .await
            .unwrap();

        let gift = message.gift.expect("gift payload");
        assert_eq!(gift.amount, 3);
        assert_eq!(gift.tier, GiftTier::Epic);

        let sender = hala.wallet.user("sender").await.unwrap();
        assert_eq!(sender.wallet_balance, 70);
        assert_eq!(sender.total_spent, 30);

        let timeline = hala.messenger.recent_messages(room.id()).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert!(timeline[0].is_gift());
    }

    #[tokio::test]
    async fn unaffordable_gifts_leave_no_trace() {
        let hala = hala().await;

        let host = user_with_coins(&hala, "host", 0).await;
        user_with_coins(&hala, "sender", 5).await;

        let room = hala
            .rooms
            .create_room(host, "Late Night", "")
            .await
            .unwrap();

        let result = hala.send_gift(room.id(), "sender", "rocket", 1).await;
        assert!(matches!(
            result,
            Err(GiftError::Wallet(WalletError::InsufficientFunds { .. }))
        ));

        let sender = hala.wallet.user("sender").await.unwrap();
        assert_eq!(sender.wallet_balance, 5);
        assert_eq!(sender.total_spent, 0);

        let timeline = hala.messenger.recent_messages(room.id()).await.unwrap();
        assert!(timeline.is_empty());
    }

    #[tokio::test]
    async fn gifts_to_missing_rooms_cost_nothing() {
        let hala = hala().await;
        user_with_coins(&hala, "sender", 100).await;

        let result = hala.send_gift(999, "sender", "rose", 1).await;
        assert!(matches!(
            result,
            Err(GiftError::Room(RoomError::RoomNotFound(999)))
        ));

        let sender = hala.wallet.user("sender").await.unwrap();
        assert_eq!(sender.wallet_balance, 100);
    }

    #[tokio::test]
    async fn purchases_debit_the_item_price() {
        let hala = hala().await;
        user_with_coins(&hala, "buyer", 1000).await;

        let item = hala.purchase_item("buyer", "frame-gold").await.unwrap();
        assert_eq!(item.id, "frame-gold");

        let buyer = hala.wallet.user("buyer").await.unwrap();
        assert_eq!(buyer.wallet_balance, 1000 - item.price);
    }

    #[tokio::test]
    async fn profile_updates_reach_occupied_seats() {
        let hala = hala().await;

        let host = user_with_coins(&hala, "host", 0).await;
        let speaker = user_with_coins(&hala, "speaker", 0).await;

        let room = hala
            .rooms
            .create_room(host, "Late Night", "")
            .await
            .unwrap();
        room.take_seat(&speaker).unwrap();

        hala.update_profile("speaker", "Fresh Name", "new.png")
            .await
            .unwrap();

        let snapshot = room.snapshot();
        let seat = snapshot
            .speakers
            .iter()
            .find(|s| s.user_id == "speaker")
            .expect("speaker is seated");

        assert_eq!(seat.name, "Fresh Name");
        assert_eq!(seat.avatar, "new.png");
    }
}
