//! Class gate for rooms.
//!
//! A room linked to a class admits only super-admins and students enrolled
//! in that class. Unlinked rooms are open to every authenticated user.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use skillforge_core::error::CoreError;
use skillforge_core::room;
use skillforge_core::types::DbId;
use skillforge_db::models::room::Room;
use skillforge_db::repositories::{ClassRepo, RoomRepo};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// The room named by the `{id}` path segment, loaded after the caller
/// passed its class gate. Rejects with 404 for unknown rooms and 403 for
/// callers outside the linked class.
pub struct RoomAccess {
    pub room: Room,
    pub user: AuthUser,
}

impl FromRequestParts<AppState> for RoomAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let Path(room_id) = Path::<DbId>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        let room = RoomRepo::find_by_id(&state.pool, room_id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Room",
                id: room_id,
            }))?;

        let registry = state.roles.snapshot().await;
        let actor = user.room_actor(&registry);

        let roster_status = match room.class_id {
            Some(class_id) if !actor.is_super_admin => {
                ClassRepo::student_status(&state.pool, class_id, user.user_id).await?
            }
            _ => None,
        };

        if let Err(err) = room::check_room_access(room.class_id, actor, roster_status) {
            tracing::warn!(
                room_id,
                user_id = user.user_id,
                class_id = room.class_id,
                "Room access denied"
            );
            return Err(err.into());
        }

        Ok(RoomAccess { room, user })
    }
}
