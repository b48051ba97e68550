use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Error as SqlxError, PgPool, Row,
};

use crate::{
    ChatMessageData, Database, DatabaseError, DatabaseResult, GiftData, GiftEventData, GiftTier,
    IntoDatabaseError, NewMessage, NewRoom, NewSession, NewUser, Result, RoomData, RoomId,
    SessionData, StoreCategory, StoreItemData, UserData, UserStatus,
};

/// A postgres store implementation for hala.
///
/// Wallet debits use a conditional UPDATE so the balance check and the
/// decrement are one atomic statement on the database side.
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    /// Applies pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> sqlx::Result<UserData> {
    let banned: bool = row.try_get("banned")?;

    Ok(UserData {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        avatar: row.try_get("avatar")?,
        status: if banned {
            UserStatus::Banned
        } else {
            UserStatus::Active
        },
        wallet_balance: row.try_get("wallet_balance")?,
        total_spent: row.try_get("total_spent")?,
        created_at: row.try_get("created_at")?,
    })
}

fn gift_from_row(row: &PgRow) -> Result<GiftData> {
    let tier: String = row.try_get("tier").map_err(|e| e.any())?;

    Ok(GiftData {
        id: row.try_get("id").map_err(|e| e.any())?,
        name: row.try_get("name").map_err(|e| e.any())?,
        price: row.try_get("price").map_err(|e| e.any())?,
        icon: row.try_get("icon").map_err(|e| e.any())?,
        tier: GiftTier::from_str(&tier).ok_or_else(|| {
            DatabaseError::Internal(format!("unknown gift tier: {tier}").into())
        })?,
    })
}

fn store_item_from_row(row: &PgRow) -> Result<StoreItemData> {
    let category: String = row.try_get("category").map_err(|e| e.any())?;

    Ok(StoreItemData {
        id: row.try_get("id").map_err(|e| e.any())?,
        name: row.try_get("name").map_err(|e| e.any())?,
        category: StoreCategory::from_str(&category).ok_or_else(|| {
            DatabaseError::Internal(format!("unknown store category: {category}").into())
        })?,
        price: row.try_get("price").map_err(|e| e.any())?,
        icon: row.try_get("icon").map_err(|e| e.any())?,
        description: row.try_get("description").map_err(|e| e.any())?,
        duration_days: row.try_get("duration_days").map_err(|e| e.any())?,
    })
}

fn message_from_row(row: &PgRow) -> sqlx::Result<ChatMessageData> {
    let gift_name: Option<String> = row.try_get("gift_name")?;
    let gift_amount: Option<i32> = row.try_get("gift_amount")?;
    let gift_tier: Option<String> = row.try_get("gift_tier")?;

    let gift = gift_name.map(|gift_name| GiftEventData {
        gift_name,
        amount: gift_amount.unwrap_or(1) as u32,
        tier: gift_tier
            .as_deref()
            .and_then(GiftTier::from_str)
            .unwrap_or(GiftTier::Basic),
    });

    Ok(ChatMessageData {
        id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        text: row.try_get("text")?,
        gift,
        sent_at: row.try_get("sent_at")?,
    })
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))?;

        user_from_row(&row).map_err(|e| e.any())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_id(&new_user.id)
            .await
            .conflict_or_ok("user", "id", &new_user.id)?;

        let row = sqlx::query(
            "INSERT INTO users (id, display_name, avatar) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new_user.id)
        .bind(&new_user.display_name)
        .bind(&new_user.avatar)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        user_from_row(&row).map_err(|e| e.any())
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar: &str,
    ) -> Result<UserData> {
        let row = sqlx::query(
            "UPDATE users SET display_name = $2, avatar = $3 WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(name)
        .bind(avatar)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "id"))?;

        user_from_row(&row).map_err(|e| e.any())
    }

    async fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<UserData> {
        let row = sqlx::query("UPDATE users SET banned = $2 WHERE id = $1 RETURNING *")
            .bind(user_id)
            .bind(status == UserStatus::Banned)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))?;

        user_from_row(&row).map_err(|e| e.any())
    }

    async fn credit_wallet(&self, user_id: &str, amount: i64) -> Result<UserData> {
        let row = sqlx::query(
            "UPDATE users SET wallet_balance = wallet_balance + $2 WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "id"))?;

        user_from_row(&row).map_err(|e| e.any())
    }

    async fn debit_wallet(&self, user_id: &str, amount: i64) -> Result<UserData> {
        // The balance check and both field updates are a single statement, so
        // concurrent debits against the same user serialize on the row lock
        // and the balance can never go negative.
        let row = sqlx::query(
            "UPDATE users
             SET wallet_balance = wallet_balance - $2, total_spent = total_spent + $2
             WHERE id = $1 AND wallet_balance >= $2
             RETURNING *",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.any())?;

        match row {
            Some(row) => user_from_row(&row).map_err(|e| e.any()),
            None => {
                let user = self.user_by_id(user_id).await?;

                Err(DatabaseError::InsufficientFunds {
                    required: amount,
                    available: user.wallet_balance,
                })
            }
        }
    }

    async fn top_spenders(&self, limit: usize) -> Result<Vec<UserData>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY total_spent DESC LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter()
            .map(|row| user_from_row(row).map_err(|e| e.any()))
            .collect()
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = sqlx::query(
            "SELECT
                sessions.token,
                sessions.expires_at,
                users.*
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            token: row.try_get("token").map_err(|e| e.any())?,
            expires_at: row.try_get("expires_at").map_err(|e| e.any())?,
            user: user_from_row(&row).map_err(|e| e.any())?,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&new_session.token)
            .bind(&new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE timezone('UTC', now()) > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData> {
        let row = sqlx::query(
            "SELECT
                rooms.id AS room_id,
                rooms.title,
                rooms.topic,
                rooms.is_active,
                rooms.created_at AS room_created_at,
                users.*
            FROM rooms
                INNER JOIN users ON rooms.host_id = users.id
            WHERE rooms.id = $1",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("room", "id"))?;

        room_from_joined_row(&row)
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        let rows = sqlx::query(
            "SELECT
                rooms.id AS room_id,
                rooms.title,
                rooms.topic,
                rooms.is_active,
                rooms.created_at AS room_created_at,
                users.*
            FROM rooms
                INNER JOIN users ON rooms.host_id = users.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(room_from_joined_row).collect()
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let host = self.user_by_id(&new_room.host_id).await?;

        let row = sqlx::query(
            "INSERT INTO rooms (title, topic, host_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&new_room.title)
        .bind(&new_room.topic)
        .bind(&host.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.room_by_id(row.try_get("id").map_err(|e| e.any())?)
            .await
    }

    async fn set_room_active(&self, room_id: RoomId, active: bool) -> Result<RoomData> {
        sqlx::query("UPDATE rooms SET is_active = $2 WHERE id = $1")
            .bind(room_id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.room_by_id(room_id).await
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessageData> {
        let gift = new_message.gift.as_ref();

        let row = sqlx::query(
            "INSERT INTO messages
                (room_id, user_id, user_name, text, gift_name, gift_amount, gift_tier)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(new_message.room_id)
        .bind(&new_message.user_id)
        .bind(&new_message.user_name)
        .bind(&new_message.text)
        .bind(gift.map(|g| g.gift_name.clone()))
        .bind(gift.map(|g| g.amount as i32))
        .bind(gift.map(|g| g.tier.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        message_from_row(&row).map_err(|e| e.any())
    }

    async fn messages_by_room(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessageData>> {
        let rows = sqlx::query(
            "SELECT * FROM (
                SELECT * FROM messages
                WHERE room_id = $1
                ORDER BY sent_at DESC, id DESC
                LIMIT $2
            ) AS recent ORDER BY sent_at ASC, id ASC",
        )
        .bind(room_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter()
            .map(|row| message_from_row(row).map_err(|e| e.any()))
            .collect()
    }

    async fn gift_by_id(&self, gift_id: &str) -> Result<GiftData> {
        let row = sqlx::query("SELECT * FROM gifts WHERE id = $1")
            .bind(gift_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("gift", "id"))?;

        gift_from_row(&row)
    }

    async fn list_gifts(&self) -> Result<Vec<GiftData>> {
        let rows = sqlx::query("SELECT * FROM gifts")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter().map(gift_from_row).collect()
    }

    async fn create_gift(&self, gift: GiftData) -> Result<GiftData> {
        self.gift_by_id(&gift.id)
            .await
            .conflict_or_ok("gift", "id", &gift.id)?;

        sqlx::query("INSERT INTO gifts (id, name, price, icon, tier) VALUES ($1, $2, $3, $4, $5)")
            .bind(&gift.id)
            .bind(&gift.name)
            .bind(gift.price)
            .bind(&gift.icon)
            .bind(gift.tier.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(gift)
    }

    async fn store_item_by_id(&self, item_id: &str) -> Result<StoreItemData> {
        let row = sqlx::query("SELECT * FROM store_items WHERE id = $1")
            .bind(item_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("store item", "id"))?;

        store_item_from_row(&row)
    }

    async fn list_store_items(&self) -> Result<Vec<StoreItemData>> {
        let rows = sqlx::query("SELECT * FROM store_items")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter().map(store_item_from_row).collect()
    }

    async fn create_store_item(&self, item: StoreItemData) -> Result<StoreItemData> {
        self.store_item_by_id(&item.id)
            .await
            .conflict_or_ok("store item", "id", &item.id)?;

        sqlx::query(
            "INSERT INTO store_items (id, name, category, price, icon, description, duration_days)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.category.as_str())
        .bind(item.price)
        .bind(&item.icon)
        .bind(&item.description)
        .bind(item.duration_days)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(item)
    }
}

fn room_from_joined_row(row: &PgRow) -> Result<RoomData> {
    Ok(RoomData {
        id: row.try_get("room_id").map_err(|e| e.any())?,
        title: row.try_get("title").map_err(|e| e.any())?,
        topic: row.try_get("topic").map_err(|e| e.any())?,
        host: user_from_row(row).map_err(|e| e.any())?,
        is_active: row.try_get("is_active").map_err(|e| e.any())?,
        created_at: row.try_get("room_created_at").map_err(|e| e.any())?,
    })
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
