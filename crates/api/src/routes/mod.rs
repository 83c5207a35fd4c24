pub mod auth;
pub mod classes;
pub mod health;
pub mod roles;
pub mod rooms;
pub mod skill_ratings;
pub mod skill_trees;
pub mod skills;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/me                                         current user
///
/// /permissions                                     list, create (manager)
/// /permissions/owned                               caller's permissions
/// /permissions/{id}                                delete (manager)
/// /roles                                           create (manager)
/// /roles/assign                                    assign or revoke (PUT)
/// /roles/refresh                                   rebuild registry (POST)
/// /roles/{id}                                      delete (manager)
/// /roles/{id}/permissions                          replace grants (PUT)
///
/// /skills                                          list, create
/// /skills/search                                   free-text search
/// /skills/categories                               distinct categories
/// /skills/popular                                  top by popularity
/// /skills/high-demand                              top by market demand
/// /skills/category/{category}                      by category
/// /skills/level/{level}                            by level
/// /skills/{id}                                     get, update, delete
/// /skills/{id}/prerequisites[/{prereq_id}]         add, remove
/// /skills/{id}/related[/{related_id}]              add, remove
///
/// /skill-trees                                     list, create
/// /skill-trees/search                              free-text search
/// /skill-trees/type/{tree_type}                    by type
/// /skill-trees/creator/{user_id}                   by creator
/// /skill-trees/skill/{skill_id}                    trees holding a skill
/// /skill-trees/assignments/all                     skill -> trees map
/// /skill-trees/{id}                                get, update, delete
/// /skill-trees/{id}/stats                          aggregate skill stats
/// /skill-trees/{id}/assignments                    flat skill list
/// /skill-trees/{id}/skills[/{skill_id}]            add, remove one
/// /skill-trees/{id}/assign-skills                  bulk add, bulk remove
/// /skill-trees/{id}/paths[/{name}]                 list, add, remove
///
/// /classes                                         list, create
/// /classes/skill-tree/{skill_tree_id}              by linked tree
/// /classes/teacher/{teacher_id}                    by teacher
/// /classes/student/{student_id}                    by student
/// /classes/{id}                                    get, update, delete
/// /classes/{id}/enroll                             enroll (POST)
/// /classes/{id}/students/{user_id}                 remove (DELETE)
/// /classes/{id}/students/{user_id}/progress        update progress (PUT)
/// /classes/{id}/teachers[/{teacher_id}]            add, remove
///
/// /skill-ratings/rate                              upsert rating (manager)
/// /skill-ratings/completed/all                     completed ratings
/// /skill-ratings/rating/{id}                       detail
/// /skill-ratings/rating/{id}/assessment            record assessment
/// /skill-ratings/user/{uid}[/archived|/stats]      per-user lists
/// /skill-ratings/user/{uid}/skill/{sid}[/...]      progress, archive, unarchive,
///                                                  complete, note
/// /skill-ratings/skill/{sid}[/stats]               per-skill list, stats
///
/// /rooms                                           list, create
/// /rooms/{id}                                      get, update, delete
/// /rooms/{id}/class                                link class once (POST)
/// /rooms/{id}/messages                             list, post (class gate)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication routes (register, login, me).
        .nest("/auth", auth::router())
        // Role registry administration.
        .nest("/permissions", roles::permissions_router())
        .nest("/roles", roles::roles_router())
        // Skill catalog.
        .nest("/skills", skills::router())
        // Skill trees and learning paths.
        .nest("/skill-trees", skill_trees::router())
        // Classes, rosters and teachers.
        .nest("/classes", classes::router())
        // Per-user skill ratings.
        .nest("/skill-ratings", skill_ratings::router())
        // Chat rooms and messages.
        .nest("/rooms", rooms::router())
}
