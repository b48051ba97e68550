use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// The bound applied to every call against the external store.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    /// A debit would have taken the wallet below zero
    #[error("insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: i64, available: i64 },
    /// The store did not answer within [STORE_TIMEOUT]
    #[error("store call timed out")]
    Timeout,
}

/// Applies [STORE_TIMEOUT] to a store call, surfacing expiry as
/// [DatabaseError::Timeout].
pub async fn bounded<T>(call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(STORE_TIMEOUT, call)
        .await
        .map_err(|_| DatabaseError::Timeout)?
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound { .. } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can store and mutate hala data.
///
/// Implementations must make `debit_wallet` a single atomic unit: the balance
/// check, the decrement, and the `total_spent` increment happen together or
/// not at all, even under concurrent debits against the same user.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user_profile(&self, user_id: &str, name: &str, avatar: &str)
        -> Result<UserData>;
    async fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<UserData>;
    async fn credit_wallet(&self, user_id: &str, amount: i64) -> Result<UserData>;
    async fn debit_wallet(&self, user_id: &str, amount: i64) -> Result<UserData>;
    async fn top_spenders(&self, limit: usize) -> Result<Vec<UserData>>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn set_room_active(&self, room_id: RoomId, active: bool) -> Result<RoomData>;

    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessageData>;
    /// Returns at most `limit` of the newest entries, oldest first.
    async fn messages_by_room(&self, room_id: RoomId, limit: usize)
        -> Result<Vec<ChatMessageData>>;

    async fn gift_by_id(&self, gift_id: &str) -> Result<GiftData>;
    async fn list_gifts(&self) -> Result<Vec<GiftData>>;
    async fn create_gift(&self, gift: GiftData) -> Result<GiftData>;

    async fn store_item_by_id(&self, item_id: &str) -> Result<StoreItemData>;
    async fn list_store_items(&self) -> Result<Vec<StoreItemData>>;
    async fn create_store_item(&self, item: StoreItemData) -> Result<StoreItemData>;
}

#[derive(Debug)]
pub struct NewUser {
    /// Opaque identifier issued by the auth provider
    pub id: String,
    pub display_name: String,
    pub avatar: String,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewRoom {
    pub title: String,
    pub topic: String,
    /// The host of the new room
    pub host_id: String,
}

#[derive(Debug)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub user_id: String,
    pub user_name: String,
    /// Empty when the entry represents a gift
    pub text: String,
    pub gift: Option<GiftEventData>,
}
