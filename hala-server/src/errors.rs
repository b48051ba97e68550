use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use hala_live::{AuthError, ChatError, DatabaseError, GiftError, RoomError, WalletError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: i64, available: i64 },
    #[error("All speaker seats are taken")]
    StageFull,
    #[error("Only the host may do that")]
    NotHost,
    #[error("This account is banned")]
    Banned,
    #[error("{0}")]
    BadRequest(String),
    #[error("The data store did not respond in time")]
    StoreTimeout,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::StageFull => StatusCode::CONFLICT,
            Self::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::NotHost => StatusCode::FORBIDDEN,
            Self::Banned => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier: identifier.to_string(),
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            DatabaseError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
            DatabaseError::Timeout => Self::StoreTimeout,
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Banned => Self::Banned,
            AuthError::Db(e) => e.into(),
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::RoomNotFound(id) => Self::NotFound {
                resource: "room",
                identifier: id.to_string(),
            },
            RoomError::StageFull => Self::StageFull,
            RoomError::NotHost => Self::NotHost,
            RoomError::EmptyTitle => Self::BadRequest(value.to_string()),
            RoomError::Db(e) => e.into(),
        }
    }
}

impl From<WalletError> for ServerError {
    fn from(value: WalletError) -> Self {
        match value {
            WalletError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
            WalletError::InvalidAmount(_) => Self::BadRequest(value.to_string()),
            WalletError::Db(e) => e.into(),
        }
    }
}

impl From<ChatError> for ServerError {
    fn from(value: ChatError) -> Self {
        match value {
            ChatError::EmptyMessage => Self::BadRequest(value.to_string()),
            ChatError::Db(e) => e.into(),
        }
    }
}

impl From<GiftError> for ServerError {
    fn from(value: GiftError) -> Self {
        match value {
            GiftError::UnknownGift(id) => Self::NotFound {
                resource: "gift",
                identifier: id,
            },
            GiftError::UnknownItem(id) => Self::NotFound {
                resource: "store_item",
                identifier: id,
            },
            GiftError::InvalidAmount => Self::BadRequest(value.to_string()),
            GiftError::Room(e) => e.into(),
            GiftError::Wallet(e) => e.into(),
            GiftError::Chat(e) => e.into(),
            GiftError::Db(e) => e.into(),
        }
    }
}
