//! Handlers for the skill catalog.
//!
//! Reads are open to any authenticated user; writes require the management
//! permission.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use skillforge_core::error::CoreError;
use skillforge_core::skill;
use skillforge_core::types::DbId;
use skillforge_core::validation::validate_not_blank;
use skillforge_db::models::skill::{CreateSkill, SkillDetail, SkillFilter, UpdateSkill};
use skillforge_db::repositories::SkillRepo;
use skillforge_events::{names, PlatformEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireManager;
use crate::query::{PageParams, SearchParams};
use crate::response::{DataResponse, PaginatedResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Filters for `GET /skills`. Pagination comes from [`PageParams`].
#[derive(Debug, Default, Deserialize)]
pub struct SkillListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "type")]
    pub skill_type: Option<String>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HighlightParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PrerequisiteRequest {
    pub prerequisite_id: DbId,
}

#[derive(Debug, Deserialize)]
pub struct RelatedRequest {
    pub related_id: DbId,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/skills
pub async fn list_skills(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(params): Query<SkillListParams>,
) -> AppResult<impl IntoResponse> {
    if let Some(level) = params.level.as_deref() {
        skill::validate_level(level)?;
    }
    if let Some(skill_type) = params.skill_type.as_deref() {
        skill::validate_skill_type(skill_type)?;
    }
    if let Some(status) = params.status.as_deref() {
        skill::validate_status(status)?;
    }

    let filter = SkillFilter {
        search: params.search,
        category: params.category,
        subcategory: params.subcategory,
        level: params.level,
        skill_type: params.skill_type,
        status: params.status,
        sort_column: skill::sort_column(params.sort_by.as_deref()),
        sort_direction: skill::sort_direction(params.sort_order.as_deref()),
        limit: page.limit(),
        offset: page.offset(),
    };
    let (skills, total) = SkillRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(skills, &page, total)))
}

/// GET /api/v1/skills/search?q=
pub async fn search_skills(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(search): Query<SearchParams>,
) -> AppResult<impl IntoResponse> {
    validate_not_blank("q", &search.q)?;

    let filter = SkillFilter {
        search: Some(search.q.trim().to_string()),
        ..default_filter(&page)
    };
    let (skills, total) = SkillRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(skills, &page, total)))
}

/// GET /api/v1/skills/category/{category}
pub async fn skills_by_category(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let filter = SkillFilter {
        category: Some(category),
        ..default_filter(&page)
    };
    let (skills, total) = SkillRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(skills, &page, total)))
}

/// GET /api/v1/skills/level/{level}
pub async fn skills_by_level(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(level): Path<String>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    skill::validate_level(&level)?;

    let filter = SkillFilter {
        level: Some(level),
        ..default_filter(&page)
    };
    let (skills, total) = SkillRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(skills, &page, total)))
}

/// GET /api/v1/skills/categories
pub async fn list_categories(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let categories = SkillRepo::categories(&state.pool).await?;
    Ok(Json(DataResponse { data: categories }))
}

/// GET /api/v1/skills/popular
pub async fn popular_skills(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HighlightParams>,
) -> AppResult<impl IntoResponse> {
    let limit = highlight_limit(params.limit);
    let skills = SkillRepo::popular(&state.pool, limit).await?;
    Ok(Json(DataResponse { data: skills }))
}

/// GET /api/v1/skills/high-demand
pub async fn high_demand_skills(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HighlightParams>,
) -> AppResult<impl IntoResponse> {
    let limit = highlight_limit(params.limit);
    let skills = SkillRepo::high_demand(&state.pool, limit).await?;
    Ok(Json(DataResponse { data: skills }))
}

/// GET /api/v1/skills/{id}
pub async fn get_skill(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = load_detail(&state, skill_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// POST /api/v1/skills
pub async fn create_skill(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<CreateSkill>,
) -> AppResult<impl IntoResponse> {
    validate_not_blank("name", &input.name)?;
    validate_not_blank("category", &input.category)?;
    validate_fields(
        input.short_description.as_deref(),
        input.level.as_deref(),
        input.skill_type.as_deref(),
        input.status.as_deref(),
        input.difficulty,
        input.market_demand,
        input.salary_impact,
    )?;

    if SkillRepo::name_taken(&state.pool, input.name.trim(), None).await? {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Skill '{}' already exists",
            input.name.trim()
        ))));
    }

    let skill = SkillRepo::create(&state.pool, &input, user.user_id).await?;

    tracing::info!(skill_id = skill.id, name = %skill.name, user_id = user.user_id, "Skill created");
    state.event_bus.publish(
        PlatformEvent::new(names::SKILL_CREATED)
            .about("skill", skill.id)
            .by(user.user_id)
            .with_data(json!({ "name": skill.name, "category": skill.category })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: skill })))
}

/// PUT /api/v1/skills/{id}
pub async fn update_skill(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
    Json(input): Json<UpdateSkill>,
) -> AppResult<impl IntoResponse> {
    if let Some(name) = input.name.as_deref() {
        validate_not_blank("name", name)?;
        if SkillRepo::name_taken(&state.pool, name.trim(), Some(skill_id)).await? {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Skill '{}' already exists",
                name.trim()
            ))));
        }
    }
    if let Some(category) = input.category.as_deref() {
        validate_not_blank("category", category)?;
    }
    validate_fields(
        input.short_description.as_deref(),
        input.level.as_deref(),
        input.skill_type.as_deref(),
        input.status.as_deref(),
        input.difficulty,
        input.market_demand,
        input.salary_impact,
    )?;

    let skill = SkillRepo::update(&state.pool, skill_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Skill",
            id: skill_id,
        }))?;

    tracing::info!(skill_id, user_id = user.user_id, "Skill updated");

    Ok(Json(DataResponse { data: skill }))
}

/// DELETE /api/v1/skills/{id}
///
/// Removes the skill from every tree, learning path, edge list and rating.
pub async fn delete_skill(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !SkillRepo::delete(&state.pool, skill_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Skill",
            id: skill_id,
        }));
    }

    tracing::info!(skill_id, user_id = user.user_id, "Skill deleted");
    state.event_bus.publish(
        PlatformEvent::new(names::SKILL_DELETED)
            .about("skill", skill_id)
            .by(user.user_id),
    );

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Prerequisites and related skills
// ---------------------------------------------------------------------------

/// POST /api/v1/skills/{id}/prerequisites
pub async fn add_prerequisite(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
    Json(input): Json<PrerequisiteRequest>,
) -> AppResult<impl IntoResponse> {
    skill::validate_prerequisite(skill_id, input.prerequisite_id)?;
    ensure_skill_exists(&state, skill_id).await?;
    ensure_skill_exists(&state, input.prerequisite_id).await?;

    SkillRepo::add_prerequisite(&state.pool, skill_id, input.prerequisite_id).await?;

    tracing::info!(
        skill_id,
        prerequisite_id = input.prerequisite_id,
        user_id = user.user_id,
        "Prerequisite added"
    );

    let detail = load_detail(&state, skill_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// DELETE /api/v1/skills/{id}/prerequisites/{prerequisite_id}
pub async fn remove_prerequisite(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path((skill_id, prerequisite_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    ensure_skill_exists(&state, skill_id).await?;

    if !SkillRepo::remove_prerequisite(&state.pool, skill_id, prerequisite_id).await? {
        return Err(AppError::Core(CoreError::Validation(
            "Prerequisite not found on this skill".into(),
        )));
    }

    tracing::info!(skill_id, prerequisite_id, user_id = user.user_id, "Prerequisite removed");

    let detail = load_detail(&state, skill_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/skills/{id}/related
pub async fn add_related(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
    Json(input): Json<RelatedRequest>,
) -> AppResult<impl IntoResponse> {
    skill::validate_related(skill_id, input.related_id)?;
    ensure_skill_exists(&state, skill_id).await?;
    ensure_skill_exists(&state, input.related_id).await?;

    SkillRepo::add_related(&state.pool, skill_id, input.related_id).await?;

    tracing::info!(
        skill_id,
        related_id = input.related_id,
        user_id = user.user_id,
        "Related skill added"
    );

    let detail = load_detail(&state, skill_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// DELETE /api/v1/skills/{id}/related/{related_id}
pub async fn remove_related(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path((skill_id, related_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    ensure_skill_exists(&state, skill_id).await?;

    if !SkillRepo::remove_related(&state.pool, skill_id, related_id).await? {
        return Err(AppError::Core(CoreError::Validation(
            "Related skill not found on this skill".into(),
        )));
    }

    tracing::info!(skill_id, related_id, user_id = user.user_id, "Related skill removed");

    let detail = load_detail(&state, skill_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_filter(page: &PageParams) -> SkillFilter {
    SkillFilter {
        sort_column: "name",
        sort_direction: "ASC",
        limit: page.limit(),
        offset: page.offset(),
        ..SkillFilter::default()
    }
}

fn highlight_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(skill::DEFAULT_HIGHLIGHT_LIMIT)
        .clamp(1, skillforge_core::pagination::MAX_PAGE_SIZE)
}

fn validate_fields(
    short_description: Option<&str>,
    level: Option<&str>,
    skill_type: Option<&str>,
    status: Option<&str>,
    difficulty: Option<i32>,
    market_demand: Option<i32>,
    salary_impact: Option<f64>,
) -> Result<(), CoreError> {
    if short_description.is_some_and(|s| s.chars().count() > skill::MAX_SHORT_DESCRIPTION_LENGTH)
    {
        return Err(CoreError::Validation(format!(
            "short_description must be at most {} characters",
            skill::MAX_SHORT_DESCRIPTION_LENGTH
        )));
    }
    if let Some(level) = level {
        skill::validate_level(level)?;
    }
    if let Some(skill_type) = skill_type {
        skill::validate_skill_type(skill_type)?;
    }
    if let Some(status) = status {
        skill::validate_status(status)?;
    }
    if let Some(difficulty) = difficulty {
        skill::validate_difficulty(difficulty)?;
    }
    if let Some(market_demand) = market_demand {
        skill::validate_market_demand(market_demand)?;
    }
    if let Some(salary_impact) = salary_impact {
        skill::validate_salary_impact(salary_impact)?;
    }
    Ok(())
}

async fn ensure_skill_exists(state: &AppState, skill_id: DbId) -> AppResult<()> {
    if !SkillRepo::exists(&state.pool, skill_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Skill",
            id: skill_id,
        }));
    }
    Ok(())
}

async fn load_detail(state: &AppState, skill_id: DbId) -> AppResult<SkillDetail> {
    SkillRepo::find_detail(&state.pool, skill_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Skill",
            id: skill_id,
        }))
}
