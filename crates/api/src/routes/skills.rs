//! Route definitions for the `/skills` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::skills;
use crate::state::AppState;

/// Routes mounted at `/skills`.
///
/// ```text
/// GET    /                                   -> list_skills
/// POST   /                                   -> create_skill (manager)
/// GET    /search?q=                          -> search_skills
/// GET    /categories                         -> list_categories
/// GET    /popular                            -> popular_skills
/// GET    /high-demand                        -> high_demand_skills
/// GET    /category/{category}                -> skills_by_category
/// GET    /level/{level}                      -> skills_by_level
/// GET    /{id}                               -> get_skill
/// PUT    /{id}                               -> update_skill (manager)
/// DELETE /{id}                               -> delete_skill (manager)
/// POST   /{id}/prerequisites                 -> add_prerequisite (manager)
/// DELETE /{id}/prerequisites/{prereq_id}     -> remove_prerequisite (manager)
/// POST   /{id}/related                       -> add_related (manager)
/// DELETE /{id}/related/{related_id}          -> remove_related (manager)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(skills::list_skills).post(skills::create_skill))
        .route("/search", get(skills::search_skills))
        .route("/categories", get(skills::list_categories))
        .route("/popular", get(skills::popular_skills))
        .route("/high-demand", get(skills::high_demand_skills))
        .route("/category/{category}", get(skills::skills_by_category))
        .route("/level/{level}", get(skills::skills_by_level))
        .route(
            "/{id}",
            get(skills::get_skill)
                .put(skills::update_skill)
                .delete(skills::delete_skill),
        )
        .route("/{id}/prerequisites", post(skills::add_prerequisite))
        .route(
            "/{id}/prerequisites/{prereq_id}",
            delete(skills::remove_prerequisite),
        )
        .route("/{id}/related", post(skills::add_related))
        .route("/{id}/related/{related_id}", delete(skills::remove_related))
}
