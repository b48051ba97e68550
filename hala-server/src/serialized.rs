//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use serde::Serialize;
use utoipa::ToSchema;

use hala_live::{
    ChatMessageData, GiftData, GiftEventData, GiftTier as LiveGiftTier, RoomSnapshot,
    Seat as LiveSeat, SeatRole as LiveSeatRole, SessionData, StoreCategory as LiveStoreCategory,
    StoreItemData, UserData, UserStatus,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: String,
    name: String,
    avatar: String,
    level: i64,
    level_progress: f32,
    wallet_balance: i64,
    total_spent: i64,
    banned: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatRole {
    Host,
    Speaker,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    user_id: String,
    name: String,
    avatar: String,
    role: SeatRole,
    is_muted: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: i32,
    title: String,
    topic: String,
    host: Seat,
    speakers: Vec<Seat>,
    audience_count: u32,
    is_active: bool,
    created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GiftTier {
    Basic,
    Epic,
    Legendary,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    id: String,
    name: String,
    price: i64,
    icon: String,
    tier: GiftTier,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreCategory {
    Frame,
    Entry,
    Audio,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreItem {
    id: String,
    name: String,
    category: StoreCategory,
    price: i64,
    icon: String,
    description: Option<String>,
    duration_days: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GiftEvent {
    gift_name: String,
    amount: u32,
    tier: GiftTier,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    id: i32,
    room_id: i32,
    user_id: String,
    user_name: String,
    text: String,
    is_gift: bool,
    gift: Option<GiftEvent>,
    timestamp: i64,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        let level = self.level();

        User {
            id: self.id.clone(),
            name: self.display_name.clone(),
            avatar: self.avatar.clone(),
            level: level.current,
            level_progress: level.progress,
            wallet_balance: self.wallet_balance,
            total_spent: self.total_spent,
            banned: matches!(self.status, UserStatus::Banned),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<SeatRole> for LiveSeatRole {
    fn to_serialized(&self) -> SeatRole {
        match self {
            Self::Host => SeatRole::Host,
            Self::Speaker => SeatRole::Speaker,
        }
    }
}

impl ToSerialized<Seat> for LiveSeat {
    fn to_serialized(&self) -> Seat {
        Seat {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            role: self.role.to_serialized(),
            is_muted: self.is_muted,
        }
    }
}

impl ToSerialized<Room> for RoomSnapshot {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            title: self.title.clone(),
            topic: self.topic.clone(),
            host: self.host.to_serialized(),
            speakers: self.speakers.to_serialized(),
            audience_count: self.audience_count,
            is_active: self.is_active,
            created_at: self.created_at.timestamp_millis(),
        }
    }
}

impl ToSerialized<GiftTier> for LiveGiftTier {
    fn to_serialized(&self) -> GiftTier {
        match self {
            Self::Basic => GiftTier::Basic,
            Self::Epic => GiftTier::Epic,
            Self::Legendary => GiftTier::Legendary,
        }
    }
}

impl ToSerialized<Gift> for GiftData {
    fn to_serialized(&self) -> Gift {
        Gift {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            icon: self.icon.clone(),
            tier: self.tier.to_serialized(),
        }
    }
}

impl ToSerialized<StoreCategory> for LiveStoreCategory {
    fn to_serialized(&self) -> StoreCategory {
        match self {
            Self::Frame => StoreCategory::Frame,
            Self::Entry => StoreCategory::Entry,
            Self::Audio => StoreCategory::Audio,
        }
    }
}

impl ToSerialized<StoreItem> for StoreItemData {
    fn to_serialized(&self) -> StoreItem {
        StoreItem {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.to_serialized(),
            price: self.price,
            icon: self.icon.clone(),
            description: self.description.clone(),
            duration_days: self.duration_days,
        }
    }
}

impl ToSerialized<GiftEvent> for GiftEventData {
    fn to_serialized(&self) -> GiftEvent {
        GiftEvent {
            gift_name: self.gift_name.clone(),
            amount: self.amount,
            tier: self.tier.to_serialized(),
        }
    }
}

impl ToSerialized<ChatMessage> for ChatMessageData {
    fn to_serialized(&self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            room_id: self.room_id,
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            text: self.text.clone(),
            is_gift: self.is_gift(),
            gift: self.gift.as_ref().map(|g| g.to_serialized()),
            timestamp: self.sent_at.timestamp_millis(),
        }
    }
}
