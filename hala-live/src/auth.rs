use chrono::{Duration, Utc};
use thiserror::Error;

use crate::{
    bounded, util::random_string, DatabaseError, HalaContext, NewSession, NewUser, SessionData,
    UserData, UserStatus,
};

/// Passwordless sign-in. Clients present a stable device or account id and get
/// a bearer session back, creating the account on first contact.
pub struct Auth {
    context: HalaContext,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("This account is banned")]
    Banned,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

#[derive(Debug)]
pub struct SignIn {
    pub user_id: String,
    pub display_name: String,
    pub avatar: String,
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: usize = 7;
    const SESSION_TOKEN_LENGTH: usize = 32;

    pub fn new(context: &HalaContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Signs a user in, returning a new session
    pub async fn sign_in(&self, sign_in: SignIn) -> Result<SessionData, AuthError> {
        self.clear_expired().await?;

        let existing = bounded(self.context.database.user_by_id(&sign_in.user_id)).await;

        let user = match existing {
            Ok(user) => user,
            Err(DatabaseError::NotFound { .. }) => {
                bounded(self.context.database.create_user(NewUser {
                    id: sign_in.user_id,
                    display_name: sign_in.display_name,
                    avatar: sign_in.avatar,
                }))
                .await?
            }
            Err(e) => return Err(e.into()),
        };

        if let UserStatus::Banned = user.status {
            return Err(AuthError::Banned);
        }

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewSession {
            token: random_string(Self::SESSION_TOKEN_LENGTH),
            user_id: user.id,
            expires_at,
        };

        Ok(bounded(self.context.database.create_session(new_session)).await?)
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        bounded(self.context.database.session_by_token(token)).await
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        bounded(self.context.database.delete_session_by_token(token)).await
    }

    /// Bans or unbans an account. Existing sessions stay valid, but the check
    /// on the next sign-in refuses banned accounts.
    pub async fn set_status(
        &self,
        user_id: &str,
        status: UserStatus,
    ) -> Result<UserData, DatabaseError> {
        bounded(self.context.database.set_user_status(user_id, status)).await
    }

    async fn clear_expired(&self) -> Result<(), DatabaseError> {
        bounded(self.context.database.clear_expired_sessions()).await
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{EventBus, MemoryDatabase};

    fn auth() -> Auth {
        Auth::new(&HalaContext {
            database: Arc::new(MemoryDatabase::default()),
            events: EventBus::default(),
            rooms: Default::default(),
        })
    }

    fn sign_in_of(id: &str) -> SignIn {
        SignIn {
            user_id: id.to_string(),
            display_name: "Sarah".to_string(),
            avatar: String::new(),
        }
    }

    #[tokio::test]
    async fn first_sign_in_creates_the_account() {
        let auth = auth();

        let session = auth.sign_in(sign_in_of("u1")).await.unwrap();

        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.wallet_balance, 0);
    }

    #[tokio::test]
    async fn later_sign_ins_reuse_the_account() {
        let auth = auth();

        auth.sign_in(sign_in_of("u1")).await.unwrap();
        let second = auth.sign_in(sign_in_of("u1")).await.unwrap();

        assert_eq!(second.user.id, "u1");

        let resolved = auth.session(&second.token).await.unwrap();
        assert_eq!(resolved.user.id, "u1");
    }

    #[tokio::test]
    async fn banned_accounts_cannot_sign_in() {
        let auth = auth();

        auth.sign_in(sign_in_of("u1")).await.unwrap();
        auth.set_status("u1", UserStatus::Banned).await.unwrap();

        assert!(matches!(
            auth.sign_in(sign_in_of("u1")).await,
            Err(AuthError::Banned)
        ));
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let auth = auth();

        let session = auth.sign_in(sign_in_of("u1")).await.unwrap();
        auth.logout(&session.token).await.unwrap();

        assert!(matches!(
            auth.session(&session.token).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
