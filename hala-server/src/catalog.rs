use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{Gift, StoreItem, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/gifts",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Gift>)
    )
)]
async fn list_gifts(
    _session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Gift>>> {
    let gifts = context.hala.catalog.gifts().await?;

    Ok(Json(gifts.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/store",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<StoreItem>)
    )
)]
async fn list_store_items(
    _session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<StoreItem>>> {
    let items = context.hala.catalog.store_items().await?;

    Ok(Json(items.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/store/{id}/purchase",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = StoreItem)
    )
)]
async fn purchase(
    session: Session,
    State(context): State<ServerContext>,
    Path(item_id): Path<String>,
) -> ServerResult<Json<StoreItem>> {
    let item = context
        .hala
        .purchase_item(&session.user().id, &item_id)
        .await?;

    Ok(Json(item.to_serialized()))
}

pub fn gifts_router() -> Router {
    Router::new().route("/", get(list_gifts))
}

pub fn store_router() -> Router {
    Router::new()
        .route("/", get(list_store_items))
        .route("/:id/purchase", post(purchase))
}
