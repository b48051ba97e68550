use chrono::{DateTime, Utc};

/// The type used for room and message primary keys in the store.
pub type PrimaryKey = i32;

pub type RoomId = PrimaryKey;

/// A hala account.
///
/// Users are created on first sign-in and never deleted; misbehaving accounts
/// are flagged [UserStatus::Banned] instead. Mute state is room-scoped and
/// lives on seats, not here.
#[derive(Debug, Clone)]
pub struct UserData {
    /// Opaque identifier issued by the auth provider
    pub id: String,
    pub display_name: String,
    pub avatar: String,
    pub status: UserStatus,
    /// Coins currently available, never negative
    pub wallet_balance: i64,
    /// Lifetime coins spent, never decreases
    pub total_spent: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Banned,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is signed in
    pub user: UserData,
}

/// The durable part of a room. Stage and audience state is live-only and kept
/// by the room registry.
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: RoomId,
    pub title: String,
    pub topic: String,
    pub host: UserData,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Presentation intensity of a gift, not an economic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiftTier {
    Basic,
    Epic,
    Legendary,
}

impl GiftTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(Self::Basic),
            "epic" => Some(Self::Epic),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }
}

/// A gift catalog entry
#[derive(Debug, Clone)]
pub struct GiftData {
    pub id: String,
    pub name: String,
    /// Price in coins, always positive
    pub price: i64,
    /// Opaque media reference, an emoji or a blob storage url
    pub icon: String,
    pub tier: GiftTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCategory {
    Frame,
    Entry,
    Audio,
}

impl StoreCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Entry => "entry",
            Self::Audio => "audio",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "frame" => Some(Self::Frame),
            "entry" => Some(Self::Entry),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// A store catalog entry
#[derive(Debug, Clone)]
pub struct StoreItemData {
    pub id: String,
    pub name: String,
    pub category: StoreCategory,
    pub price: i64,
    pub icon: String,
    pub description: Option<String>,
    pub duration_days: Option<i32>,
}

/// The gift payload of a chat entry. Tier travels with the entry so the
/// presentation layer can pick its animation without a catalog lookup.
#[derive(Debug, Clone)]
pub struct GiftEventData {
    pub gift_name: String,
    pub amount: u32,
    pub tier: GiftTier,
}

/// An append-only per-room log entry. Entries are totally ordered by their
/// store-assigned send time and never mutated after creation.
#[derive(Debug, Clone)]
pub struct ChatMessageData {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub user_id: String,
    pub user_name: String,
    /// Empty when the entry represents a gift
    pub text: String,
    pub gift: Option<GiftEventData>,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessageData {
    pub fn is_gift(&self) -> bool {
        self.gift.is_some()
    }
}

#[cfg(test)]
impl UserData {
    pub fn mock(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            avatar: String::new(),
            status: UserStatus::Active,
            wallet_balance: 0,
            total_spent: 0,
            created_at: Utc::now(),
        }
    }
}
