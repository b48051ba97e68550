use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post, put},
    Json,
};
use hala_live::{SessionData, SignIn, UserData};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{SignInSchema, UpdateProfileSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let session = state
            .hala
            .auth
            .session(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/sign-in",
    tag = "auth",
    request_body = SignInSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn sign_in(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<SignInSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .hala
        .auth
        .sign_in(SignIn {
            user_id: body.user_id,
            display_name: body.display_name,
            avatar: body.avatar,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

#[utoipa::path(
    put,
    path = "/v1/auth/user",
    tag = "auth",
    request_body = UpdateProfileSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn update_user(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<UpdateProfileSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .hala
        .update_profile(&session.user().id, &body.name, &body.avatar)
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The session was deleted")
    )
)]
async fn logout(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    context.hala.auth.logout(session.token()).await?;
    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/sign-in", post(sign_in))
        .route("/user", get(user))
        .route("/user", put(update_user))
        .route("/logout", post(logout))
}
