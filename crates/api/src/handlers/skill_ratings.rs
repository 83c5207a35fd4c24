//! Handlers for per-user skill ratings.
//!
//! A rating is keyed by (user, skill, class). Endpoints addressed by
//! `user/{uid}/skill/{sid}` accept `?class_id=` and answer 400 when the pair
//! is ambiguous without it. Users act on their own ratings; acting on
//! someone else's requires the management permission.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use skillforge_core::error::CoreError;
use skillforge_core::roles::MANAGE_PERMISSION;
use skillforge_core::skill_rating::{self, ArchiveReason, RatingStatus};
use skillforge_core::types::DbId;
use skillforge_db::models::skill_rating::{
    CreateAssessment, CreateRatingNote, RatingFilter, SkillRating, SkillRatingDetail,
    UpsertSkillRating,
};
use skillforge_db::repositories::skill_rating_repo::RatingTransition;
use skillforge_db::repositories::{SkillRatingRepo, SkillRepo, UserRepo};
use skillforge_events::{names, PlatformEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireManager;
use crate::query::{ClassScope, PageParams};
use crate::response::{DataResponse, PaginatedResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Filters for rating lists. Archived ratings are hidden from the per-user
/// list unless `archived` is given.
#[derive(Debug, Default, Deserialize)]
pub struct RatingListParams {
    pub status: Option<RatingStatus>,
    pub archived: Option<bool>,
    pub skill_tree_id: Option<DbId>,
    pub class_id: Option<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: f64,
    /// Minutes practiced since the last update.
    #[serde(default)]
    pub time_spent: i32,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub reason: ArchiveReason,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

/// POST /api/v1/skill-ratings/rate
///
/// Create or update the rating for (user, skill, class).
pub async fn rate_skill(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<UpsertSkillRating>,
) -> AppResult<impl IntoResponse> {
    let rating = SkillRatingRepo::upsert(&state.pool, &input, user.user_id).await?;

    tracing::info!(
        rating_id = rating.id,
        target_user_id = rating.user_id,
        skill_id = rating.skill_id,
        class_id = rating.class_id,
        rating = rating.rating,
        user_id = user.user_id,
        "Skill rated"
    );
    publish_rating_change(&state, &rating, user.user_id, None);

    Ok(Json(DataResponse { data: rating }))
}

/// GET /api/v1/skill-ratings/rating/{id}
pub async fn get_rating(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(rating_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = load_detail(&state, rating_id).await?;
    ensure_self_or_manager(&state, &auth, detail.rating.user_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// GET /api/v1/skill-ratings/user/{uid}/skill/{sid}
pub async fn get_user_skill_rating(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, skill_id)): Path<(DbId, DbId)>,
    Query(scope): Query<ClassScope>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_manager(&state, &auth, user_id).await?;

    let rating_id =
        SkillRatingRepo::resolve_id(&state.pool, user_id, skill_id, scope.class_id).await?;
    let detail = load_detail(&state, rating_id).await?;

    Ok(Json(DataResponse { data: detail }))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// PUT /api/v1/skill-ratings/user/{uid}/skill/{sid}/progress
///
/// Reaching 100 completes the rating.
pub async fn update_progress(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, skill_id)): Path<(DbId, DbId)>,
    Query(scope): Query<ClassScope>,
    Json(input): Json<ProgressRequest>,
) -> AppResult<impl IntoResponse> {
    let transition = RatingTransition::Progress {
        progress: input.progress,
        time_spent: input.time_spent,
    };
    let rating = transition_for(&state, &auth, user_id, skill_id, scope, &transition).await?;

    tracing::info!(
        rating_id = rating.id,
        progress = rating.progress,
        status = %rating.status,
        user_id = auth.user_id,
        "Skill progress updated"
    );
    publish_rating_change(&state, &rating, auth.user_id, None);

    Ok(Json(DataResponse { data: rating }))
}

/// POST /api/v1/skill-ratings/user/{uid}/skill/{sid}/archive
pub async fn archive_rating(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, skill_id)): Path<(DbId, DbId)>,
    Query(scope): Query<ClassScope>,
    Json(input): Json<ArchiveRequest>,
) -> AppResult<impl IntoResponse> {
    let transition = RatingTransition::Archive {
        reason: input.reason,
        notes: input.notes,
    };
    let rating = transition_for(&state, &auth, user_id, skill_id, scope, &transition).await?;

    tracing::info!(
        rating_id = rating.id,
        reason = %input.reason,
        user_id = auth.user_id,
        "Skill rating archived"
    );
    publish_rating_change(&state, &rating, auth.user_id, Some(names::SKILL_RATING_ARCHIVED));

    Ok(Json(DataResponse { data: rating }))
}

/// POST /api/v1/skill-ratings/user/{uid}/skill/{sid}/unarchive
///
/// The rating returns to `active` and keeps its progress.
pub async fn unarchive_rating(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, skill_id)): Path<(DbId, DbId)>,
    Query(scope): Query<ClassScope>,
) -> AppResult<impl IntoResponse> {
    let rating = transition_for(
        &state,
        &auth,
        user_id,
        skill_id,
        scope,
        &RatingTransition::Unarchive,
    )
    .await?;

    tracing::info!(rating_id = rating.id, user_id = auth.user_id, "Skill rating unarchived");
    publish_rating_change(&state, &rating, auth.user_id, None);

    Ok(Json(DataResponse { data: rating }))
}

/// POST /api/v1/skill-ratings/user/{uid}/skill/{sid}/complete
pub async fn complete_rating(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, skill_id)): Path<(DbId, DbId)>,
    Query(scope): Query<ClassScope>,
) -> AppResult<impl IntoResponse> {
    let rating = transition_for(
        &state,
        &auth,
        user_id,
        skill_id,
        scope,
        &RatingTransition::Complete,
    )
    .await?;

    tracing::info!(rating_id = rating.id, user_id = auth.user_id, "Skill rating completed");
    publish_rating_change(&state, &rating, auth.user_id, None);

    Ok(Json(DataResponse { data: rating }))
}

/// POST /api/v1/skill-ratings/user/{uid}/skill/{sid}/note
pub async fn add_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, skill_id)): Path<(DbId, DbId)>,
    Query(scope): Query<ClassScope>,
    Json(input): Json<CreateRatingNote>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_manager(&state, &auth, user_id).await?;

    let rating_id =
        SkillRatingRepo::resolve_id(&state.pool, user_id, skill_id, scope.class_id).await?;
    let note = SkillRatingRepo::add_note(&state.pool, rating_id, &input, auth.user_id).await?;

    tracing::info!(rating_id, note_id = note.id, user_id = auth.user_id, "Rating note added");

    Ok((StatusCode::CREATED, Json(DataResponse { data: note })))
}

/// POST /api/v1/skill-ratings/rating/{id}/assessment
///
/// A score above the current progress raises the progress to match.
pub async fn add_assessment(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(rating_id): Path<DbId>,
    Json(input): Json<CreateAssessment>,
) -> AppResult<impl IntoResponse> {
    let assessment =
        SkillRatingRepo::add_assessment(&state.pool, rating_id, &input, user.user_id).await?;

    tracing::info!(
        rating_id,
        assessment_id = assessment.id,
        score = assessment.score,
        max_score = assessment.max_score,
        user_id = user.user_id,
        "Assessment recorded"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: assessment })))
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// GET /api/v1/skill-ratings/user/{uid}
pub async fn list_user_ratings(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(page): Query<PageParams>,
    Query(params): Query<RatingListParams>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_manager(&state, &auth, user_id).await?;
    ensure_user_exists(&state, user_id).await?;

    let filter = RatingFilter {
        is_archived: Some(params.archived.unwrap_or(false)),
        ..list_filter(&page, &params)
    };
    let (ratings, total) = SkillRatingRepo::list_by_user(&state.pool, user_id, &filter).await?;

    Ok(Json(PaginatedResponse::new(ratings, &page, total)))
}

/// GET /api/v1/skill-ratings/user/{uid}/archived
pub async fn list_user_archived(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_manager(&state, &auth, user_id).await?;
    ensure_user_exists(&state, user_id).await?;

    let (ratings, total) = SkillRatingRepo::list_archived_by_user(
        &state.pool,
        user_id,
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(Json(PaginatedResponse::new(ratings, &page, total)))
}

/// GET /api/v1/skill-ratings/user/{uid}/stats
pub async fn user_stats(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_manager(&state, &auth, user_id).await?;
    ensure_user_exists(&state, user_id).await?;

    let stats = SkillRatingRepo::user_stats(&state.pool, user_id).await?;
    let completion_rate = skill_rating::completion_rate(stats.completed_skills, stats.total_skills);

    Ok(Json(DataResponse {
        data: json!({ "stats": stats, "completion_rate": completion_rate }),
    }))
}

/// GET /api/v1/skill-ratings/skill/{sid}
pub async fn list_skill_ratings(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
    Query(page): Query<PageParams>,
    Query(params): Query<RatingListParams>,
) -> AppResult<impl IntoResponse> {
    ensure_skill_exists(&state, skill_id).await?;

    let filter = RatingFilter {
        is_archived: params.archived,
        ..list_filter(&page, &params)
    };
    let (ratings, total) = SkillRatingRepo::list_by_skill(&state.pool, skill_id, &filter).await?;

    Ok(Json(PaginatedResponse::new(ratings, &page, total)))
}

/// GET /api/v1/skill-ratings/skill/{sid}/stats
pub async fn skill_stats(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(skill_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_skill_exists(&state, skill_id).await?;

    let stats = SkillRatingRepo::skill_stats(&state.pool, skill_id).await?;
    let completion_rate = skill_rating::completion_rate(stats.completed_users, stats.total_users);

    Ok(Json(DataResponse {
        data: json!({ "stats": stats, "completion_rate": completion_rate }),
    }))
}

/// GET /api/v1/skill-ratings/completed/all
pub async fn list_completed(
    RequireManager(_user): RequireManager,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let (ratings, total) =
        SkillRatingRepo::list_completed(&state.pool, page.limit(), page.offset()).await?;

    Ok(Json(PaginatedResponse::new(ratings, &page, total)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn list_filter(page: &PageParams, params: &RatingListParams) -> RatingFilter {
    RatingFilter {
        status: params.status.map(|s| s.as_str().to_string()),
        is_archived: None,
        skill_tree_id: params.skill_tree_id,
        class_id: params.class_id,
        limit: page.limit(),
        offset: page.offset(),
    }
}

/// Resolve the addressed rating and apply one lifecycle transition.
async fn transition_for(
    state: &AppState,
    auth: &AuthUser,
    user_id: DbId,
    skill_id: DbId,
    scope: ClassScope,
    transition: &RatingTransition,
) -> AppResult<SkillRating> {
    ensure_self_or_manager(state, auth, user_id).await?;

    let rating_id =
        SkillRatingRepo::resolve_id(&state.pool, user_id, skill_id, scope.class_id).await?;
    let rating =
        SkillRatingRepo::apply_lifecycle(&state.pool, rating_id, transition, auth.user_id).await?;
    Ok(rating)
}

/// Publish `skill_rating.updated`, or `event` when given. A completed rating
/// also publishes `skill_rating.completed`.
fn publish_rating_change(
    state: &AppState,
    rating: &SkillRating,
    actor_id: DbId,
    event: Option<&'static str>,
) {
    let data = json!({
        "user_id": rating.user_id,
        "skill_id": rating.skill_id,
        "class_id": rating.class_id,
        "status": rating.status,
        "progress": rating.progress,
    });

    state.event_bus.publish(
        PlatformEvent::new(event.unwrap_or(names::SKILL_RATING_UPDATED))
            .about("skill_rating", rating.id)
            .by(actor_id)
            .with_data(data.clone()),
    );
    if rating.status == RatingStatus::Completed.as_str() {
        state.event_bus.publish(
            PlatformEvent::new(names::SKILL_RATING_COMPLETED)
                .about("skill_rating", rating.id)
                .by(actor_id)
                .with_data(data),
        );
    }
}

async fn ensure_self_or_manager(state: &AppState, auth: &AuthUser, user_id: DbId) -> AppResult<()> {
    if auth.user_id == user_id {
        return Ok(());
    }
    let registry = state.roles.snapshot().await;
    if auth.has_permission(&registry, MANAGE_PERMISSION) {
        return Ok(());
    }
    Err(AppError::Core(CoreError::Forbidden(
        "Cannot access another user's skill ratings".into(),
    )))
}

async fn ensure_user_exists(state: &AppState, user_id: DbId) -> AppResult<()> {
    if !UserRepo::exists(&state.pool, user_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }));
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

async fn load_detail(state: &AppState, rating_id: DbId) -> AppResult<SkillRatingDetail> {
    SkillRatingRepo::find_detail(&state.pool, rating_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SkillRating",
            id: rating_id,
        }))
}
