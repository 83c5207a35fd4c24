//! Handlers for skill trees, their node structure and learning paths.
//!
//! Structural edits (`add`, `remove`, bulk assign/remove) lock the tree row
//! in the repository, so concurrent edits to one tree serialize.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use skillforge_core::error::CoreError;
use skillforge_core::skill_tree;
use skillforge_core::types::DbId;
use skillforge_core::validation::validate_not_blank;
use skillforge_db::models::skill_tree::{
    CreateLearningPath, CreateSkillTree, SkillTreeDetail, SkillTreeFilter, TreeSkillAssignment,
    UpdateSkillTree,
};
use skillforge_db::repositories::{SkillRepo, SkillTreeRepo};
use skillforge_events::{names, PlatformEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireManager;
use crate::query::{PageParams, SearchParams};
use crate::response::{DataResponse, PaginatedResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Filters for `GET /skill-trees`.
#[derive(Debug, Default, Deserialize)]
pub struct SkillTreeListParams {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub tree_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignRequest {
    pub skills: Vec<TreeSkillAssignment>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRemoveRequest {
    pub skill_ids: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/skill-trees
pub async fn list_trees(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(params): Query<SkillTreeListParams>,
) -> AppResult<impl IntoResponse> {
    if let Some(tree_type) = params.tree_type.as_deref() {
        skill_tree::validate_tree_type(tree_type)?;
    }
    if let Some(status) = params.status.as_deref() {
        skill_tree::validate_tree_status(status)?;
    }

    let filter = SkillTreeFilter {
        search: params.search,
        tree_type: params.tree_type,
        status: params.status,
        ..page_filter(&page)
    };
    let (trees, total) = SkillTreeRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(trees, &page, total)))
}

/// GET /api/v1/skill-trees/search?q=
pub async fn search_trees(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(search): Query<SearchParams>,
) -> AppResult<impl IntoResponse> {
    validate_not_blank("q", &search.q)?;

    let filter = SkillTreeFilter {
        search: Some(search.q.trim().to_string()),
        ..page_filter(&page)
    };
    let (trees, total) = SkillTreeRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(trees, &page, total)))
}

/// GET /api/v1/skill-trees/type/{tree_type}
pub async fn trees_by_type(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(tree_type): Path<String>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    skill_tree::validate_tree_type(&tree_type)?;

    let filter = SkillTreeFilter {
        tree_type: Some(tree_type),
        ..page_filter(&page)
    };
    let (trees, total) = SkillTreeRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(trees, &page, total)))
}

/// GET /api/v1/skill-trees/creator/{user_id}
pub async fn trees_by_creator(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let filter = SkillTreeFilter {
        created_by: Some(user_id),
        ..page_filter(&page)
    };
    let (trees, total) = SkillTreeRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(trees, &page, total)))
}

/// GET /api/v1/skill-trees/skill/{skill_id}
///
/// Trees holding at least one node for the skill.
pub async fn trees_with_skill(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    if !SkillRepo::exists(&state.pool, skill_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Skill",
            id: skill_id,
        }));
    }

    let (trees, total) =
        SkillTreeRepo::list_containing_skill(&state.pool, skill_id, page.limit(), page.offset())
            .await?;

    Ok(Json(PaginatedResponse::new(trees, &page, total)))
}

/// GET /api/v1/skill-trees/assignments/all
///
/// For every skill placed in any tree, the trees it appears in.
pub async fn all_assignments(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let assignments = SkillTreeRepo::all_assignments(&state.pool).await?;
    Ok(Json(DataResponse { data: assignments }))
}

/// GET /api/v1/skill-trees/{id}
///
/// The tree with its nested structure and learning paths.
pub async fn get_tree(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = SkillTreeRepo::find_detail(&state.pool, tree_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SkillTree",
            id: tree_id,
        }))?;

    Ok(Json(DataResponse { data: detail }))
}

/// GET /api/v1/skill-trees/{id}/stats
pub async fn tree_stats(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_tree_exists(&state, tree_id).await?;
    let stats = SkillTreeRepo::stats(&state.pool, tree_id).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/skill-trees/{id}/assignments
///
/// Flat preorder list of the tree's skills.
pub async fn tree_assignments(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_tree_exists(&state, tree_id).await?;
    let assignments = SkillTreeRepo::assignments(&state.pool, tree_id).await?;
    Ok(Json(DataResponse { data: assignments }))
}

/// GET /api/v1/skill-trees/{id}/paths
pub async fn list_paths(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_tree_exists(&state, tree_id).await?;
    let paths = SkillTreeRepo::learning_paths(&state.pool, tree_id).await?;
    Ok(Json(DataResponse { data: paths }))
}

// ---------------------------------------------------------------------------
// Tree CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/skill-trees
///
/// An optional `structure` is applied like a bulk assignment; unknown
/// skills in it are skipped.
pub async fn create_tree(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<CreateSkillTree>,
) -> AppResult<impl IntoResponse> {
    validate_not_blank("name", &input.name)?;
    if let Some(tree_type) = input.tree_type.as_deref() {
        skill_tree::validate_tree_type(tree_type)?;
    }
    if let Some(status) = input.status.as_deref() {
        skill_tree::validate_tree_status(status)?;
    }
    if SkillTreeRepo::name_taken(&state.pool, input.name.trim(), None).await? {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Skill tree '{}' already exists",
            input.name.trim()
        ))));
    }

    let tree = SkillTreeRepo::create(&state.pool, &input, user.user_id).await?;

    tracing::info!(
        skill_tree_id = tree.id,
        name = %tree.name,
        total_skills = tree.total_skills,
        user_id = user.user_id,
        "Skill tree created"
    );
    state.event_bus.publish(
        PlatformEvent::new(names::SKILL_TREE_CREATED)
            .about("skill_tree", tree.id)
            .by(user.user_id)
            .with_data(json!({ "name": tree.name, "tree_type": tree.tree_type })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: tree })))
}

/// PUT /api/v1/skill-trees/{id}
pub async fn update_tree(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
    Json(input): Json<UpdateSkillTree>,
) -> AppResult<impl IntoResponse> {
    if let Some(name) = input.name.as_deref() {
        validate_not_blank("name", name)?;
        if SkillTreeRepo::name_taken(&state.pool, name.trim(), Some(tree_id)).await? {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Skill tree '{}' already exists",
                name.trim()
            ))));
        }
    }
    if let Some(tree_type) = input.tree_type.as_deref() {
        skill_tree::validate_tree_type(tree_type)?;
    }
    if let Some(status) = input.status.as_deref() {
        skill_tree::validate_tree_status(status)?;
    }

    let tree = SkillTreeRepo::update(&state.pool, tree_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SkillTree",
            id: tree_id,
        }))?;

    tracing::info!(skill_tree_id = tree_id, user_id = user.user_id, "Skill tree updated");
    publish_updated(&state, tree_id, user.user_id, json!({ "change": "details" }));

    Ok(Json(DataResponse { data: tree }))
}

/// DELETE /api/v1/skill-trees/{id}
pub async fn delete_tree(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !SkillTreeRepo::delete(&state.pool, tree_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "SkillTree",
            id: tree_id,
        }));
    }

    tracing::info!(skill_tree_id = tree_id, user_id = user.user_id, "Skill tree deleted");
    state.event_bus.publish(
        PlatformEvent::new(names::SKILL_TREE_DELETED)
            .about("skill_tree", tree_id)
            .by(user.user_id),
    );

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// POST /api/v1/skill-trees/{id}/skills
///
/// Place one skill at the root or under the first node holding `parent_id`.
pub async fn add_skill(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
    Json(input): Json<TreeSkillAssignment>,
) -> AppResult<impl IntoResponse> {
    let node_id = SkillTreeRepo::add_skill(&state.pool, tree_id, &input).await?;

    tracing::info!(
        skill_tree_id = tree_id,
        skill_id = input.skill_id,
        parent_id = input.parent_id,
        node_id,
        user_id = user.user_id,
        "Skill added to tree"
    );
    publish_updated(
        &state,
        tree_id,
        user.user_id,
        json!({ "change": "skill_added", "skill_id": input.skill_id }),
    );

    let detail = load_detail(&state, tree_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// DELETE /api/v1/skill-trees/{id}/skills/{skill_id}
///
/// Removes the first node holding the skill together with its descendants.
pub async fn remove_skill(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path((tree_id, skill_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let removed = SkillTreeRepo::remove_skill(&state.pool, tree_id, skill_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Skill {skill_id} is not part of this tree"
            )))
        })?;

    tracing::info!(
        skill_tree_id = tree_id,
        skill_id,
        removed_nodes = removed.nodes.len(),
        user_id = user.user_id,
        "Skill removed from tree"
    );
    publish_updated(
        &state,
        tree_id,
        user.user_id,
        json!({ "change": "skill_removed", "skill_id": skill_id, "removed_skills": removed.skills }),
    );

    let detail = load_detail(&state, tree_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/skill-trees/{id}/assign-skills
///
/// Applies all assignments in one transaction. Unknown skills are skipped
/// and reported; an unknown parent aborts the batch.
pub async fn bulk_assign(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
    Json(input): Json<BulkAssignRequest>,
) -> AppResult<impl IntoResponse> {
    if input.skills.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "skills must not be empty".into(),
        )));
    }

    let outcome = SkillTreeRepo::bulk_assign(&state.pool, tree_id, &input.skills).await?;

    tracing::info!(
        skill_tree_id = tree_id,
        added = outcome.added.len(),
        skipped = outcome.skipped.len(),
        user_id = user.user_id,
        "Skills assigned to tree"
    );
    publish_updated(
        &state,
        tree_id,
        user.user_id,
        json!({ "change": "bulk_assign", "added": outcome.added }),
    );

    Ok(Json(DataResponse { data: outcome }))
}

/// DELETE /api/v1/skill-trees/{id}/assign-skills
pub async fn bulk_remove(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
    Json(input): Json<BulkRemoveRequest>,
) -> AppResult<impl IntoResponse> {
    if input.skill_ids.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "skill_ids must not be empty".into(),
        )));
    }

    let outcome = SkillTreeRepo::bulk_remove(&state.pool, tree_id, &input.skill_ids).await?;

    tracing::info!(
        skill_tree_id = tree_id,
        removed = outcome.removed.len(),
        skipped = outcome.skipped.len(),
        user_id = user.user_id,
        "Skills removed from tree"
    );
    publish_updated(
        &state,
        tree_id,
        user.user_id,
        json!({ "change": "bulk_remove", "removed": outcome.removed }),
    );

    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// Learning paths
// ---------------------------------------------------------------------------

/// POST /api/v1/skill-trees/{id}/paths
pub async fn add_path(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(tree_id): Path<DbId>,
    Json(input): Json<CreateLearningPath>,
) -> AppResult<impl IntoResponse> {
    skill_tree::validate_learning_path(
        &input.name,
        input.difficulty.as_deref().unwrap_or("beginner"),
        input.status.as_deref().unwrap_or("active"),
        &input.sequence,
    )?;

    let path = SkillTreeRepo::add_learning_path(&state.pool, tree_id, &input).await?;

    tracing::info!(
        skill_tree_id = tree_id,
        path = %path.path.name,
        steps = path.sequence.len(),
        user_id = user.user_id,
        "Learning path added"
    );
    publish_updated(
        &state,
        tree_id,
        user.user_id,
        json!({ "change": "path_added", "path": path.path.name }),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: path })))
}

/// DELETE /api/v1/skill-trees/{id}/paths/{name}
pub async fn remove_path(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path((tree_id, name)): Path<(DbId, String)>,
) -> AppResult<impl IntoResponse> {
    ensure_tree_exists(&state, tree_id).await?;

    if !SkillTreeRepo::remove_learning_path(&state.pool, tree_id, &name).await? {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Learning path '{name}' not found in this tree"
        ))));
    }

    tracing::info!(skill_tree_id = tree_id, path = %name, user_id = user.user_id, "Learning path removed");
    publish_updated(
        &state,
        tree_id,
        user.user_id,
        json!({ "change": "path_removed", "path": name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn page_filter(page: &PageParams) -> SkillTreeFilter {
    SkillTreeFilter {
        limit: page.limit(),
        offset: page.offset(),
        ..SkillTreeFilter::default()
    }
}

fn publish_updated(state: &AppState, tree_id: DbId, user_id: DbId, data: serde_json::Value) {
    state.event_bus.publish(
        PlatformEvent::new(names::SKILL_TREE_UPDATED)
            .about("skill_tree", tree_id)
            .by(user_id)
            .with_data(data),
    );
}

async fn ensure_tree_exists(state: &AppState, tree_id: DbId) -> AppResult<()> {
    if !SkillTreeRepo::exists(&state.pool, tree_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "SkillTree",
            id: tree_id,
        }));
    }
    Ok(())
}

async fn load_detail(state: &AppState, tree_id: DbId) -> AppResult<SkillTreeDetail> {
    SkillTreeRepo::find_detail(&state.pool, tree_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SkillTree",
            id: tree_id,
        }))
}
