//! Route definitions for the `/classes` resource.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::classes;
use crate::state::AppState;

/// Routes mounted at `/classes`.
///
/// ```text
/// GET    /                                   -> list_classes
/// POST   /                                   -> create_class (manager)
/// GET    /skill-tree/{skill_tree_id}         -> classes_by_tree (public)
/// GET    /teacher/{teacher_id}               -> classes_by_teacher
/// GET    /student/{student_id}               -> classes_by_student
/// GET    /{id}                               -> get_class
/// PUT    /{id}                               -> update_class (manager)
/// DELETE /{id}                               -> delete_class (manager)
/// POST   /{id}/enroll                        -> enroll_student (self or manager)
/// DELETE /{id}/students/{user_id}            -> remove_student (self or manager)
/// PUT    /{id}/students/{user_id}/progress   -> update_progress (manager)
/// POST   /{id}/teachers                      -> add_teacher (manager)
/// DELETE /{id}/teachers/{teacher_id}         -> remove_teacher (manager)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(classes::list_classes).post(classes::create_class),
        )
        .route("/skill-tree/{skill_tree_id}", get(classes::classes_by_tree))
        .route("/teacher/{teacher_id}", get(classes::classes_by_teacher))
        .route("/student/{student_id}", get(classes::classes_by_student))
        .route(
            "/{id}",
            get(classes::get_class)
                .put(classes::update_class)
                .delete(classes::delete_class),
        )
        .route("/{id}/enroll", post(classes::enroll_student))
        .route("/{id}/students/{user_id}", delete(classes::remove_student))
        .route(
            "/{id}/students/{user_id}/progress",
            put(classes::update_progress),
        )
        .route("/{id}/teachers", post(classes::add_teacher))
        .route(
            "/{id}/teachers/{teacher_id}",
            delete(classes::remove_teacher),
        )
}
