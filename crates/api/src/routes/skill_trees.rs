//! Route definitions for the `/skill-trees` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::skill_trees;
use crate::state::AppState;

/// Routes mounted at `/skill-trees`.
///
/// ```text
/// GET    /                          -> list_trees
/// POST   /                          -> create_tree (manager)
/// GET    /search?q=                 -> search_trees
/// GET    /type/{tree_type}          -> trees_by_type
/// GET    /creator/{user_id}         -> trees_by_creator
/// GET    /skill/{skill_id}          -> trees_with_skill
/// GET    /assignments/all           -> all_assignments
/// GET    /{id}                      -> get_tree
/// PUT    /{id}                      -> update_tree (manager)
/// DELETE /{id}                      -> delete_tree (manager)
/// GET    /{id}/stats                -> tree_stats
/// GET    /{id}/assignments          -> tree_assignments
/// POST   /{id}/skills               -> add_skill (manager)
/// DELETE /{id}/skills/{skill_id}    -> remove_skill (manager)
/// POST   /{id}/assign-skills        -> bulk_assign (manager)
/// DELETE /{id}/assign-skills        -> bulk_remove (manager)
/// GET    /{id}/paths                -> list_paths
/// POST   /{id}/paths                -> add_path (manager)
/// DELETE /{id}/paths/{name}         -> remove_path (manager)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(skill_trees::list_trees).post(skill_trees::create_tree),
        )
        .route("/search", get(skill_trees::search_trees))
        .route("/type/{tree_type}", get(skill_trees::trees_by_type))
        .route("/creator/{user_id}", get(skill_trees::trees_by_creator))
        .route("/skill/{skill_id}", get(skill_trees::trees_with_skill))
        .route("/assignments/all", get(skill_trees::all_assignments))
        .route(
            "/{id}",
            get(skill_trees::get_tree)
                .put(skill_trees::update_tree)
                .delete(skill_trees::delete_tree),
        )
        .route("/{id}/stats", get(skill_trees::tree_stats))
        .route("/{id}/assignments", get(skill_trees::tree_assignments))
        .route("/{id}/skills", post(skill_trees::add_skill))
        .route("/{id}/skills/{skill_id}", delete(skill_trees::remove_skill))
        .route(
            "/{id}/assign-skills",
            post(skill_trees::bulk_assign).delete(skill_trees::bulk_remove),
        )
        .route(
            "/{id}/paths",
            get(skill_trees::list_paths).post(skill_trees::add_path),
        )
        .route("/{id}/paths/{name}", delete(skill_trees::remove_path))
}
