use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{GiftSchema, MessageSchema, MuteSchema, NewRoomSchema, ValidatedJson},
    serialized::{ChatMessage, Room, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
async fn list_rooms(_session: Session, State(context): State<ServerContext>) -> Json<Vec<Room>> {
    let rooms: Vec<_> = context
        .hala
        .rooms
        .list_all()
        .into_iter()
        .map(|r| r.snapshot().to_serialized())
        .collect();

    Json(rooms)
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn room(
    _session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Room>> {
    let room = context.hala.rooms.room_by_id(room_id)?;

    Ok(Json(room.snapshot().to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn create_room(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    // A fresh read so the host seat reflects the latest profile
    let host = context.hala.wallet.user(&session.user().id).await?;

    let room = context
        .hala
        .rooms
        .create_room(host, &body.title, &body.topic)
        .await?;

    Ok(Json(room.snapshot().to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The room was closed")
    )
)]
async fn close_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<()> {
    context
        .hala
        .rooms
        .close_room(room_id, &session.user().id)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/join",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The user was counted into the audience")
    )
)]
async fn join_room(
    _session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) {
    context.hala.rooms.join_room(room_id);
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/leave",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The user was counted out of the audience")
    )
)]
async fn leave_room(
    _session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) {
    context.hala.rooms.leave_room(room_id);
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/seat",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn take_seat(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Room>> {
    let room = context.hala.rooms.room_by_id(room_id)?;
    let user = context.hala.wallet.user(&session.user().id).await?;

    room.take_seat(&user)?;

    Ok(Json(room.snapshot().to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/seat",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn leave_seat(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Room>> {
    let room = context.hala.rooms.room_by_id(room_id)?;

    room.leave_seat(&session.user().id);

    Ok(Json(room.snapshot().to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/mute",
    tag = "rooms",
    request_body = MuteSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn set_mute(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<MuteSchema>,
) -> ServerResult<Json<Room>> {
    let room = context.hala.rooms.room_by_id(room_id)?;

    room.set_mute(&session.user().id, body.is_muted);

    Ok(Json(room.snapshot().to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/messages",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<ChatMessage>)
    )
)]
async fn messages(
    _session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Vec<ChatMessage>>> {
    // The room must exist, but its timeline survives a close
    context.hala.rooms.room_by_id(room_id)?;

    let messages = context.hala.messenger.recent_messages(room_id).await?;

    Ok(Json(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/messages",
    tag = "rooms",
    request_body = MessageSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ChatMessage)
    )
)]
async fn send_message(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<MessageSchema>,
) -> ServerResult<Json<ChatMessage>> {
    context.hala.rooms.room_by_id(room_id)?;

    let user = context.hala.wallet.user(&session.user().id).await?;
    let message = context
        .hala
        .messenger
        .send_message(room_id, &user, &body.text)
        .await?;

    Ok(Json(message.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/gifts",
    tag = "rooms",
    request_body = GiftSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ChatMessage)
    )
)]
async fn send_gift(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<GiftSchema>,
) -> ServerResult<Json<ChatMessage>> {
    let message = context
        .hala
        .send_gift(room_id, &session.user().id, &body.gift_id, body.amount)
        .await?;

    Ok(Json(message.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/", post(create_room))
        .route("/:id", get(room))
        .route("/:id", delete(close_room))
        .route("/:id/join", post(join_room))
        .route("/:id/leave", post(leave_room))
        .route("/:id/seat", post(take_seat))
        .route("/:id/seat", delete(leave_seat))
        .route("/:id/mute", put(set_mute))
        .route("/:id/messages", get(messages))
        .route("/:id/messages", post(send_message))
        .route("/:id/gifts", post(send_gift))
}
