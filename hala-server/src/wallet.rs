use axum::{extract::State, routing::get, routing::post, Json};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{RechargeSchema, ValidatedJson},
    serialized::{ToSerialized, User},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/wallet",
    tag = "wallet",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn wallet(session: Session, State(context): State<ServerContext>) -> ServerResult<Json<User>> {
    let user = context.hala.wallet.user(&session.user().id).await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/recharge",
    tag = "wallet",
    request_body = RechargeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn recharge(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RechargeSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .hala
        .wallet
        .credit(&session.user().id, body.amount)
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/wallet/leaderboard",
    tag = "wallet",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn leaderboard(
    _session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<User>>> {
    let users = context.hala.wallet.leaderboard(10).await?;

    Ok(Json(users.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(wallet))
        .route("/recharge", post(recharge))
        .route("/leaderboard", get(leaderboard))
}
