//! Handlers for chat rooms and their messages.
//!
//! Reading a room or its messages, and posting to it, pass through
//! [`RoomAccess`], which enforces the class gate.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use skillforge_core::error::CoreError;
use skillforge_core::roles::MANAGE_PERMISSION;
use skillforge_core::room;
use skillforge_core::types::DbId;
use skillforge_core::validation::validate_not_blank;
use skillforge_db::models::room::{CreateRoom, Room, UpdateRoom};
use skillforge_db::repositories::{ClassRepo, MessageRepo, RoomRepo};
use skillforge_events::{names, PlatformEvent};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireManager;
use crate::middleware::room_access::RoomAccess;
use crate::query::PageParams;
use crate::response::{DataResponse, PaginatedResponse};
use crate::state::AppState;
use crate::validation::validate_input;

#[derive(Debug, Deserialize)]
pub struct AssignClassRequest {
    pub class_id: DbId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "must be 1 to 2000 characters"))]
    pub content: String,
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// GET /api/v1/rooms
pub async fn list_rooms(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let (rooms, total) = RoomRepo::list(&state.pool, page.limit(), page.offset()).await?;
    Ok(Json(PaginatedResponse::new(rooms, &page, total)))
}

/// POST /api/v1/rooms
///
/// Linking a class at creation requires the management permission.
pub async fn create_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRoom>,
) -> AppResult<impl IntoResponse> {
    validate_not_blank("name", &input.name)?;

    if let Some(class_id) = input.class_id {
        let registry = state.roles.snapshot().await;
        if !auth.has_permission(&registry, MANAGE_PERMISSION) {
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "Permission '{MANAGE_PERMISSION}' required to link a class"
            ))));
        }
        ensure_class_exists(&state, class_id).await?;
    }

    let room = RoomRepo::create(&state.pool, &input, auth.user_id).await?;

    tracing::info!(room_id = room.id, class_id = room.class_id, user_id = auth.user_id, "Room created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: room })))
}

/// GET /api/v1/rooms/{id}
pub async fn get_room(access: RoomAccess) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse { data: access.room }))
}

/// PUT /api/v1/rooms/{id}
///
/// Only the room's creator may edit it.
pub async fn update_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<DbId>,
    Json(input): Json<UpdateRoom>,
) -> AppResult<impl IntoResponse> {
    let existing = load_room(&state, room_id).await?;
    let registry = state.roles.snapshot().await;
    room::ensure_can_update(existing.created_by, auth.room_actor(&registry))?;

    if let Some(name) = input.name.as_deref() {
        validate_not_blank("name", name)?;
    }

    let updated = RoomRepo::update(&state.pool, room_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Room",
            id: room_id,
        }))?;

    tracing::info!(room_id, user_id = auth.user_id, "Room updated");

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/rooms/{id}
///
/// The creator or a super-admin may delete a room.
pub async fn delete_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let existing = load_room(&state, room_id).await?;
    let registry = state.roles.snapshot().await;
    room::ensure_can_delete(existing.created_by, auth.room_actor(&registry))?;

    RoomRepo::delete(&state.pool, room_id).await?;

    tracing::info!(room_id, user_id = auth.user_id, "Room deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/rooms/{id}/class
///
/// Links the room to a class. A room's class can be set only once.
pub async fn assign_class(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(room_id): Path<DbId>,
    Json(input): Json<AssignClassRequest>,
) -> AppResult<impl IntoResponse> {
    let existing = load_room(&state, room_id).await?;
    room::ensure_class_assignable(existing.class_id)?;
    ensure_class_exists(&state, input.class_id).await?;

    // Another request may have linked a class since the read above.
    let updated = RoomRepo::assign_class(&state.pool, room_id, input.class_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(
                "Room is already assigned to a class".into(),
            ))
        })?;

    tracing::info!(room_id, class_id = input.class_id, user_id = user.user_id, "Room linked to class");
    state.event_bus.publish(
        PlatformEvent::new(names::ROOM_CLASS_ASSIGNED)
            .about("room", room_id)
            .by(user.user_id)
            .with_data(json!({ "class_id": input.class_id })),
    );

    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// GET /api/v1/rooms/{id}/messages
///
/// Newest first.
pub async fn list_messages(
    access: RoomAccess,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let (messages, total) =
        MessageRepo::list_by_room(&state.pool, access.room.id, page.limit(), page.offset())
            .await?;

    Ok(Json(PaginatedResponse::new(messages, &page, total)))
}

/// POST /api/v1/rooms/{id}/messages
pub async fn send_message(
    access: RoomAccess,
    State(state): State<AppState>,
    Json(input): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    validate_input(&input)?;
    validate_not_blank("content", &input.content)?;

    let message = MessageRepo::create(
        &state.pool,
        access.room.id,
        access.user.user_id,
        input.content.trim(),
    )
    .await?;

    tracing::debug!(
        room_id = access.room.id,
        message_id = message.id,
        user_id = access.user.user_id,
        "Message posted"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: message })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_room(state: &AppState, room_id: DbId) -> AppResult<Room> {
    RoomRepo::find_by_id(&state.pool, room_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Room",
            id: room_id,
        }))
}

async fn ensure_class_exists(state: &AppState, class_id: DbId) -> AppResult<()> {
    if !ClassRepo::exists(&state.pool, class_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Class",
            id: class_id,
        }));
    }
    Ok(())
}
