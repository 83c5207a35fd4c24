//! Route definitions for the `/skill-ratings` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::skill_ratings;
use crate::state::AppState;

/// Routes mounted at `/skill-ratings`.
///
/// Routes under `/user/{uid}/skill/{sid}` accept `?class_id=`.
///
/// ```text
/// POST /rate                                   -> rate_skill (manager)
/// GET  /completed/all                          -> list_completed (manager)
/// GET  /rating/{id}                            -> get_rating
/// POST /rating/{id}/assessment                 -> add_assessment (manager)
/// GET  /user/{uid}                             -> list_user_ratings
/// GET  /user/{uid}/archived                    -> list_user_archived
/// GET  /user/{uid}/stats                       -> user_stats
/// GET  /user/{uid}/skill/{sid}                 -> get_user_skill_rating
/// PUT  /user/{uid}/skill/{sid}/progress        -> update_progress
/// POST /user/{uid}/skill/{sid}/archive         -> archive_rating
/// POST /user/{uid}/skill/{sid}/unarchive       -> unarchive_rating
/// POST /user/{uid}/skill/{sid}/complete        -> complete_rating
/// POST /user/{uid}/skill/{sid}/note            -> add_note
/// GET  /skill/{sid}                            -> list_skill_ratings
/// GET  /skill/{sid}/stats                      -> skill_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rate", post(skill_ratings::rate_skill))
        .route("/completed/all", get(skill_ratings::list_completed))
        .route("/rating/{id}", get(skill_ratings::get_rating))
        .route(
            "/rating/{id}/assessment",
            post(skill_ratings::add_assessment),
        )
        .route("/user/{uid}", get(skill_ratings::list_user_ratings))
        .route("/user/{uid}/archived", get(skill_ratings::list_user_archived))
        .route("/user/{uid}/stats", get(skill_ratings::user_stats))
        .route(
            "/user/{uid}/skill/{sid}",
            get(skill_ratings::get_user_skill_rating),
        )
        .route(
            "/user/{uid}/skill/{sid}/progress",
            put(skill_ratings::update_progress),
        )
        .route(
            "/user/{uid}/skill/{sid}/archive",
            post(skill_ratings::archive_rating),
        )
        .route(
            "/user/{uid}/skill/{sid}/unarchive",
            post(skill_ratings::unarchive_rating),
        )
        .route(
            "/user/{uid}/skill/{sid}/complete",
            post(skill_ratings::complete_rating),
        )
        .route("/user/{uid}/skill/{sid}/note", post(skill_ratings::add_note))
        .route("/skill/{sid}", get(skill_ratings::list_skill_ratings))
        .route("/skill/{sid}/stats", get(skill_ratings::skill_stats))
}
