use log::info;
use thiserror::Error;

use crate::{bounded, DatabaseError, HalaContext, HalaEvent, UserData};

/// Coins required to advance one wealth level
pub const COINS_PER_LEVEL: i64 = 1000;

/// Maintains every user's coin balance and lifetime-spend counter.
///
/// The ledger itself only validates; the atomicity of a debit is guaranteed
/// by the storage port, which serializes the balance check and the paired
/// field updates per user.
pub struct WalletLedger {
    context: HalaContext,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Coin amount must be a positive integer, got {0}")]
    InvalidAmount(i64),
    #[error("Insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: i64, available: i64 },
    #[error(transparent)]
    Db(DatabaseError),
}

impl From<DatabaseError> for WalletError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
            e => Self::Db(e),
        }
    }
}

impl WalletLedger {
    pub fn new(context: &HalaContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn user(&self, user_id: &str) -> Result<UserData, WalletError> {
        Ok(bounded(self.context.database.user_by_id(user_id)).await?)
    }

    /// Adds coins to a wallet, used for recharges and grants. There is no
    /// upper bound on a balance.
    pub async fn credit(&self, user_id: &str, amount: i64) -> Result<UserData, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let user = bounded(self.context.database.credit_wallet(user_id, amount)).await?;

        info!("Credited {} coins to {}", amount, user.display_name);
        self.context
            .events
            .emit(HalaEvent::WalletUpdate { user: user.clone() });

        Ok(user)
    }

    /// Takes coins out of a wallet. On success the balance decreases and the
    /// lifetime spend increases by the same amount as one atomic unit; on
    /// insufficient funds nothing moves and the caller must not record the
    /// dependent purchase.
    pub async fn debit(&self, user_id: &str, amount: i64) -> Result<UserData, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let user = bounded(self.context.database.debit_wallet(user_id, amount)).await?;

        info!("Debited {} coins from {}", amount, user.display_name);
        self.context
            .events
            .emit(HalaEvent::WalletUpdate { user: user.clone() });

        Ok(user)
    }

    /// The top lifetime spenders, richest first
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<UserData>, WalletError> {
        Ok(bounded(self.context.database.top_spenders(limit)).await?)
    }
}

/// Wealth level, always derived from the lifetime spend and never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub current: i64,
    /// How far along the next level is, in 0..1
    pub progress: f32,
}

impl Level {
    pub fn from_total_spent(total_spent: i64) -> Self {
        let current = total_spent / COINS_PER_LEVEL;
        let into_level = total_spent - current * COINS_PER_LEVEL;

        Self {
            current,
            progress: into_level as f32 / COINS_PER_LEVEL as f32,
        }
    }
}

impl UserData {
    pub fn level(&self) -> Level {
        Level::from_total_spent(self.total_spent)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{Database, EventBus, MemoryDatabase, NewUser};

    async fn ledger_with_balance(balance: i64) -> WalletLedger {
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

        let ledger = WalletLedger::new(&context);

        if balance > 0 {
            ledger.credit("u1", balance).await.expect("credited");
        }

        ledger
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let ledger = ledger_with_balance(100).await;

        assert!(matches!(
            ledger.credit("u1", 0).await,
            Err(WalletError::InvalidAmount(0))
        ));
        assert!(matches!(
            ledger.debit("u1", -5).await,
            Err(WalletError::InvalidAmount(-5))
        ));

        let user = ledger.user("u1").await.unwrap();
        assert_eq!(user.wallet_balance, 100);
    }

    #[tokio::test]
    async fn sequential_debits_stop_at_the_balance() {
        let ledger = ledger_with_balance(100).await;

        let user = ledger.debit("u1", 50).await.unwrap();
        assert_eq!(user.wallet_balance, 50);

        let refused = ledger.debit("u1", 60).await;
        assert!(matches!(
            refused,
            Err(WalletError::InsufficientFunds {
                required: 60,
                available: 50
            })
        ));

        let user = ledger.user("u1").await.unwrap();
        assert_eq!(user.wallet_balance, 50);
        assert_eq!(user.total_spent, 50);
    }

    #[tokio::test]
    async fn balance_and_spend_move_together() {
        let ledger = ledger_with_balance(300).await;

        ledger.debit("u1", 120).await.unwrap();
        let user = ledger.user("u1").await.unwrap();

        assert_eq!(user.wallet_balance, 180);
        assert_eq!(user.total_spent, 120);
    }

    #[tokio::test]
    async fn concurrent_debits_never_overdraw() {
        let ledger = Arc::new(ledger_with_balance(100).await);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.debit("u1", 60).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.expect("task joins").is_ok() {
                successes += 1;
            }
        }

        let user = ledger.user("u1").await.unwrap();
        assert_eq!(successes, 1);
        assert_eq!(user.wallet_balance, 40);
        assert_eq!(user.total_spent, 60);
    }

    #[tokio::test]
    async fn many_concurrent_debits_consume_exactly_the_balance() {
        let ledger = Arc::new(ledger_with_balance(100).await);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.debit("u1", 25).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.expect("task joins").is_ok() {
                successes += 1;
            }
        }

        let user = ledger.user("u1").await.unwrap();
        assert_eq!(successes, 4);
        assert_eq!(user.wallet_balance, 0);
        assert_eq!(user.total_spent, 100);
    }

    #[test]
    fn levels_derive_from_lifetime_spend() {
        assert_eq!(Level::from_total_spent(0).current, 0);
        assert_eq!(Level::from_total_spent(999).current, 0);
        assert_eq!(Level::from_total_spent(1000).current, 1);
        assert_eq!(Level::from_total_spent(5000).current, 5);

        let level = Level::from_total_spent(1500);
        assert_eq!(level.current, 1);
        assert!((level.progress - 0.5).abs() < f32::EPSILON);
    }
}
