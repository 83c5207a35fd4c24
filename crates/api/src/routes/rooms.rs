//! Route definitions for the `/rooms` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::rooms;
use crate::state::AppState;

/// Routes mounted at `/rooms`.
///
/// ```text
/// GET    /                 -> list_rooms
/// POST   /                 -> create_room
/// GET    /{id}             -> get_room (class gate)
/// PUT    /{id}             -> update_room (creator only)
/// DELETE /{id}             -> delete_room (creator or super-admin)
/// POST   /{id}/class       -> assign_class (manager, once)
/// GET    /{id}/messages    -> list_messages (class gate)
/// POST   /{id}/messages    -> send_message (class gate)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rooms::list_rooms).post(rooms::create_room))
        .route(
            "/{id}",
            get(rooms::get_room)
                .put(rooms::update_room)
                .delete(rooms::delete_room),
        )
        .route("/{id}/class", post(rooms::assign_class))
        .route(
            "/{id}/messages",
            get(rooms::list_messages).post(rooms::send_message),
        )
}
