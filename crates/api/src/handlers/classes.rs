//! Handlers for classes, their rosters and teachers.
//!
//! Roster writes go through `ClassRepo`, which locks the class row and
//! recounts `enrolled_students` inside the same transaction.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use skillforge_core::class::{self, CompletedSkillTree, StudentStatus};
use skillforge_core::error::CoreError;
use skillforge_core::skill;
use skillforge_core::types::DbId;
use skillforge_core::validation::validate_not_blank;
use skillforge_db::models::class::{
    ClassDetail, ClassFilter, ClassTreeLinkInput, CompletedTreeInput, CreateClass, StudentEntry,
    UpdateClass,
};
use skillforge_db::repositories::{ClassRepo, SkillTreeRepo, UserRepo};
use skillforge_events::{names, PlatformEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireManager;
use crate::query::PageParams;
use crate::response::{DataResponse, PaginatedResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Filters for `GET /classes`.
#[derive(Debug, Default, Deserialize)]
pub struct ClassListParams {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub class_type: Option<String>,
    pub level: Option<String>,
    pub status: Option<String>,
    pub tag: Option<String>,
}

/// Body of `POST /classes/{id}/enroll`. Without `user_id` the caller
/// enrolls themselves.
#[derive(Debug, Default, Deserialize)]
pub struct EnrollRequest {
    pub user_id: Option<DbId>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: f64,
    #[serde(default)]
    pub completed_skill_trees: Vec<CompletedTreeInput>,
}

#[derive(Debug, Deserialize)]
pub struct TeacherRequest {
    pub teacher_id: DbId,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/classes
pub async fn list_classes(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(params): Query<ClassListParams>,
) -> AppResult<impl IntoResponse> {
    if let Some(class_type) = params.class_type.as_deref() {
        class::validate_class_type(class_type)?;
    }
    if let Some(level) = params.level.as_deref() {
        skill::validate_level(level)?;
    }
    if let Some(status) = params.status.as_deref() {
        class::validate_class_status(status)?;
    }

    let filter = ClassFilter {
        search: params.search,
        class_type: params.class_type,
        level: params.level,
        status: params.status,
        tag: params.tag,
        ..page_filter(&page)
    };
    let (classes, total) = ClassRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(classes, &page, total)))
}

/// GET /api/v1/classes/skill-tree/{skill_tree_id}
///
/// Public: no token required.
pub async fn classes_by_tree(
    State(state): State<AppState>,
    Path(skill_tree_id): Path<DbId>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let filter = ClassFilter {
        skill_tree_id: Some(skill_tree_id),
        ..page_filter(&page)
    };
    let (classes, total) = ClassRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(classes, &page, total)))
}

/// GET /api/v1/classes/teacher/{teacher_id}
pub async fn classes_by_teacher(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(teacher_id): Path<DbId>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let filter = ClassFilter {
        teacher_id: Some(teacher_id),
        ..page_filter(&page)
    };
    let (classes, total) = ClassRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(classes, &page, total)))
}

/// GET /api/v1/classes/student/{student_id}
pub async fn classes_by_student(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<DbId>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let filter = ClassFilter {
        student_id: Some(student_id),
        ..page_filter(&page)
    };
    let (classes, total) = ClassRepo::list(&state.pool, &filter).await?;

    Ok(Json(PaginatedResponse::new(classes, &page, total)))
}

/// GET /api/v1/classes/{id}
pub async fn get_class(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(class_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = load_detail(&state, class_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

// ---------------------------------------------------------------------------
// Class CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/classes
///
/// The creator becomes the only teacher when `teachers` is empty.
pub async fn create_class(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(mut input): Json<CreateClass>,
) -> AppResult<impl IntoResponse> {
    validate_not_blank("name", &input.name)?;
    let code = class::normalize_code(&input.code)?;
    if let Some(class_type) = input.class_type.as_deref() {
        class::validate_class_type(class_type)?;
    }
    if let Some(level) = input.level.as_deref() {
        skill::validate_level(level)?;
    }
    if let Some(status) = input.status.as_deref() {
        class::validate_class_status(status)?;
    }
    if let Some(max_students) = input.max_students {
        class::validate_max_students(max_students)?;
    }
    validate_tree_links(&state, &input.skill_trees).await?;

    if input.teachers.is_empty() {
        input.teachers.push(user.user_id);
    }
    for &teacher_id in &input.teachers {
        if !UserRepo::exists(&state.pool, teacher_id).await? {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "User",
                id: teacher_id,
            }));
        }
    }

    if ClassRepo::code_taken(&state.pool, &code, None).await? {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Class code '{code}' already exists"
        ))));
    }

    let class = ClassRepo::create(&state.pool, &input, user.user_id).await?;

    tracing::info!(
        class_id = class.id,
        code = %class.code,
        user_id = user.user_id,
        "Class created"
    );
    state.event_bus.publish(
        PlatformEvent::new(names::CLASS_CREATED)
            .about("class", class.id)
            .by(user.user_id)
            .with_data(json!({ "code": class.code, "name": class.name })),
    );

    let detail = load_detail(&state, class.id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// PUT /api/v1/classes/{id}
///
/// A supplied `skill_trees` list replaces the class's tree links.
pub async fn update_class(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(class_id): Path<DbId>,
    Json(input): Json<UpdateClass>,
) -> AppResult<impl IntoResponse> {
    if let Some(name) = input.name.as_deref() {
        validate_not_blank("name", name)?;
    }
    if let Some(class_type) = input.class_type.as_deref() {
        class::validate_class_type(class_type)?;
    }
    if let Some(level) = input.level.as_deref() {
        skill::validate_level(level)?;
    }
    if let Some(status) = input.status.as_deref() {
        class::validate_class_status(status)?;
    }
    if let Some(max_students) = input.max_students {
        class::validate_max_students(max_students)?;
    }
    if let Some(links) = input.skill_trees.as_deref() {
        validate_tree_links(&state, links).await?;
    }
    if let Some(code) = input.code.as_deref() {
        let code = class::normalize_code(code)?;
        if ClassRepo::code_taken(&state.pool, &code, Some(class_id)).await? {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Class code '{code}' already exists"
            ))));
        }
    }

    ClassRepo::update(&state.pool, class_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Class",
            id: class_id,
        }))?;

    tracing::info!(class_id, user_id = user.user_id, "Class updated");

    let detail = load_detail(&state, class_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// DELETE /api/v1/classes/{id}
///
/// Refused while a room is still linked to the class.
pub async fn delete_class(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(class_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !ClassRepo::delete(&state.pool, class_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Class",
            id: class_id,
        }));
    }

    tracing::info!(class_id, user_id = user.user_id, "Class deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// POST /api/v1/classes/{id}/enroll
///
/// Enrolling someone else, or choosing a status other than `enrolled`,
/// requires the management permission. Re-enrolling overwrites status and
/// enrollment date but keeps progress.
pub async fn enroll_student(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(class_id): Path<DbId>,
    Json(input): Json<EnrollRequest>,
) -> AppResult<impl IntoResponse> {
    let student_id = input.user_id.unwrap_or(auth.user_id);
    ensure_self_or_manager(&state, &auth, student_id).await?;

    let status = input.status.unwrap_or_default();
    if status != StudentStatus::Enrolled {
        let registry = state.roles.snapshot().await;
        if !auth.has_permission(&registry, skillforge_core::roles::MANAGE_PERMISSION) {
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "Only managers may enroll with status '{}'",
                status.as_str()
            ))));
        }
    }
    let entry = ClassRepo::enroll_student(&state.pool, class_id, student_id, status).await?;

    tracing::info!(
        class_id,
        student_id,
        status = entry.status.as_str(),
        user_id = auth.user_id,
        "Student enrolled"
    );
    state.event_bus.publish(
        PlatformEvent::new(names::CLASS_STUDENT_ENROLLED)
            .about("class", class_id)
            .by(auth.user_id)
            .with_data(json!({ "student_id": student_id, "status": entry.status })),
    );

    let user = UserRepo::summaries(&state.pool, &[student_id])
        .await?
        .into_iter()
        .next();
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: StudentEntry::from_entry(&entry, user),
        }),
    ))
}

/// DELETE /api/v1/classes/{id}/students/{user_id}
///
/// Students may drop themselves; removing others requires the management
/// permission.
pub async fn remove_student(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((class_id, student_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_manager(&state, &auth, student_id).await?;

    if !ClassRepo::remove_student(&state.pool, class_id, student_id).await? {
        return Err(AppError::Core(CoreError::Validation(
            "Student is not enrolled in this class".into(),
        )));
    }

    tracing::info!(class_id, student_id, user_id = auth.user_id, "Student removed");
    state.event_bus.publish(
        PlatformEvent::new(names::CLASS_STUDENT_REMOVED)
            .about("class", class_id)
            .by(auth.user_id)
            .with_data(json!({ "student_id": student_id })),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/classes/{id}/students/{user_id}/progress
///
/// Progress is clamped to `[0, 100]`. A non-empty `completed_skill_trees`
/// replaces the stored list; an empty one leaves it untouched.
pub async fn update_progress(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path((class_id, student_id)): Path<(DbId, DbId)>,
    Json(input): Json<ProgressRequest>,
) -> AppResult<impl IntoResponse> {
    if !input.progress.is_finite() {
        return Err(AppError::Core(CoreError::Validation(
            "progress must be a number".into(),
        )));
    }

    let now = Utc::now();
    let mut completed = Vec::with_capacity(input.completed_skill_trees.len());
    for tree in input.completed_skill_trees {
        if tree.score.is_some_and(|s| !(0.0..=100.0).contains(&s)) {
            return Err(AppError::Core(CoreError::Validation(
                "score must be between 0 and 100".into(),
            )));
        }
        if !SkillTreeRepo::exists(&state.pool, tree.skill_tree_id).await? {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "SkillTree",
                id: tree.skill_tree_id,
            }));
        }
        completed.push(CompletedSkillTree {
            skill_tree_id: tree.skill_tree_id,
            completed_at: tree.completed_at.unwrap_or(now),
            score: tree.score,
            feedback: tree.feedback,
        });
    }

    let entry = ClassRepo::update_student_progress(
        &state.pool,
        class_id,
        student_id,
        input.progress,
        completed,
    )
    .await?
    .ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "Student is not enrolled in this class".into(),
        ))
    })?;

    tracing::info!(
        class_id,
        student_id,
        progress = entry.progress,
        user_id = user.user_id,
        "Student progress updated"
    );

    Ok(Json(DataResponse {
        data: StudentEntry::from_entry(&entry, None),
    }))
}

// ---------------------------------------------------------------------------
// Teachers
// ---------------------------------------------------------------------------

/// POST /api/v1/classes/{id}/teachers
pub async fn add_teacher(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(class_id): Path<DbId>,
    Json(input): Json<TeacherRequest>,
) -> AppResult<impl IntoResponse> {
    ensure_class_exists(&state, class_id).await?;
    ClassRepo::assign_teacher(&state.pool, class_id, input.teacher_id).await?;

    tracing::info!(
        class_id,
        teacher_id = input.teacher_id,
        user_id = user.user_id,
        "Teacher assigned"
    );

    let detail = load_detail(&state, class_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// DELETE /api/v1/classes/{id}/teachers/{teacher_id}
pub async fn remove_teacher(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path((class_id, teacher_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    ensure_class_exists(&state, class_id).await?;
    ClassRepo::remove_teacher(&state.pool, class_id, teacher_id).await?;

    tracing::info!(class_id, teacher_id, user_id = user.user_id, "Teacher removed");

    let detail = load_detail(&state, class_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn page_filter(page: &PageParams) -> ClassFilter {
    ClassFilter {
        limit: page.limit(),
        offset: page.offset(),
        ..ClassFilter::default()
    }
}

async fn validate_tree_links(state: &AppState, links: &[ClassTreeLinkInput]) -> AppResult<()> {
    for link in links {
        if let Some(level) = link.level.as_deref() {
            class::validate_tree_link_level(level)?;
        }
        if !SkillTreeRepo::exists(&state.pool, link.skill_tree_id).await? {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "SkillTree",
                id: link.skill_tree_id,
            }));
        }
    }
    Ok(())
}

async fn ensure_self_or_manager(
    state: &AppState,
    auth: &AuthUser,
    target_user_id: DbId,
) -> AppResult<()> {
    if target_user_id == auth.user_id {
        return Ok(());
    }
    let registry = state.roles.snapshot().await;
    if auth.has_permission(&registry, skillforge_core::roles::MANAGE_PERMISSION) {
        return Ok(());
    }
    Err(AppError::Core(CoreError::Forbidden(
        "Cannot change another user's enrollment".into(),
    )))
}

async fn ensure_class_exists(state: &AppState, class_id: DbId) -> AppResult<()> {
    if !ClassRepo::exists(&state.pool, class_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Class",
            id: class_id,
        }));
    }
    Ok(())
}

async fn load_detail(state: &AppState, class_id: DbId) -> AppResult<ClassDetail> {
    ClassRepo::find_detail(&state.pool, class_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Class",
            id: class_id,
        }))
}
