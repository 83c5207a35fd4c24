//! User skill rating models: the rating row, assessments and notes.

use serde::{Deserialize, Serialize};
use skillforge_core::error::CoreError;
use skillforge_core::skill_rating::{
    ArchiveReason, MasteryLevel, RatingState, RatingStatus,
};
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `user_skill_ratings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SkillRating {
    pub id: DbId,
    pub user_id: DbId,
    pub skill_id: DbId,
    pub skill_tree_id: Option<DbId>,
    pub class_id: DbId,
    pub rated_by: DbId,
    pub rating: i32,
    pub progress: f64,
    pub mastery_level: String,
    pub status: String,
    pub is_archived: bool,
    pub archive_reason: Option<String>,
    pub archive_notes: Option<String>,
    pub archived_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub started_at: Timestamp,
    pub last_practiced_at: Option<Timestamp>,
    pub time_spent: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SkillRating {
    /// Lift the stored row into lifecycle state.
    pub fn to_state(&self) -> Result<RatingState, CoreError> {
        let corrupt = |e: CoreError| CoreError::Internal(format!("rating {}: {e}", self.id));
        Ok(RatingState {
            rating: self.rating,
            progress: self.progress,
            mastery_level: MasteryLevel::parse(&self.mastery_level).map_err(corrupt)?,
            status: RatingStatus::parse(&self.status).map_err(corrupt)?,
            is_archived: self.is_archived,
            archive_reason: self
                .archive_reason
                .as_deref()
                .map(ArchiveReason::parse)
                .transpose()
                .map_err(corrupt)?,
            archive_notes: self.archive_notes.clone(),
            archived_at: self.archived_at,
            completed_at: self.completed_at,
            last_practiced_at: self.last_practiced_at,
            time_spent: self.time_spent,
            rated_by: self.rated_by,
        })
    }
}

/// A row from the `rating_assessments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Assessment {
    pub id: DbId,
    pub rating_id: DbId,
    pub title: String,
    pub score: f64,
    pub max_score: f64,
    pub assessment_type: String,
    pub feedback: Option<String>,
    pub assessed_by: Option<DbId>,
    pub completed_at: Timestamp,
}

/// A row from the `rating_notes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RatingNote {
    pub id: DbId,
    pub rating_id: DbId,
    pub content: String,
    pub author_id: Option<DbId>,
    pub is_private: bool,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// A rating with its skill, class and tree names resolved.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SkillRatingView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub rating: SkillRating,
    pub skill_name: String,
    pub skill_category: String,
    pub class_name: String,
    pub class_code: String,
    pub skill_tree_name: Option<String>,
    pub username: String,
}

/// A rating with its assessments and notes.
#[derive(Debug, Clone, Serialize)]
pub struct SkillRatingDetail {
    #[serde(flatten)]
    pub rating: SkillRating,
    pub assessments: Vec<Assessment>,
    pub notes: Vec<RatingNote>,
}

/// Aggregates over one user's ratings.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct UserSkillStats {
    pub total_skills: i64,
    pub active_skills: i64,
    pub completed_skills: i64,
    pub archived_skills: i64,
    pub average_rating: f64,
    pub average_progress: f64,
    pub total_time_spent: i64,
}

/// Aggregates over one skill's ratings.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct SkillRatingStats {
    pub total_users: i64,
    pub average_rating: f64,
    pub average_progress: f64,
    pub completed_users: i64,
    pub archived_users: i64,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Create-or-update request keyed by `(user_id, skill_id, class_id)`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertSkillRating {
    pub user_id: DbId,
    pub skill_id: DbId,
    pub class_id: DbId,
    pub rating: i32,
    pub progress: Option<f64>,
    pub status: Option<RatingStatus>,
    pub skill_tree_id: Option<DbId>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssessment {
    pub title: String,
    pub score: f64,
    pub max_score: Option<f64>,
    pub assessment_type: String,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRatingNote {
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Filters for per-user and per-skill rating lists.
#[derive(Debug, Default)]
pub struct RatingFilter {
    pub status: Option<String>,
    pub is_archived: Option<bool>,
    pub skill_tree_id: Option<DbId>,
    pub class_id: Option<DbId>,
    pub limit: i64,
    pub offset: i64,
}
