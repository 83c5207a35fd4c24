//! Class, roster and teacher models.

use serde::{Deserialize, Serialize};
use skillforge_core::class::{CompletedSkillTree, RosterEntry, StudentStatus};
use skillforge_core::error::CoreError;
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::models::user::UserSummary;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `classes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Class {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub code: String,
    pub class_type: String,
    pub level: String,
    pub status: String,
    pub objectives: Vec<String>,
    pub duration: Option<f64>,
    pub max_students: i32,
    pub enrolled_students: i32,
    pub schedule: serde_json::Value,
    pub settings: serde_json::Value,
    pub tags: Vec<String>,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `class_students` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClassStudent {
    pub class_id: DbId,
    pub user_id: DbId,
    pub status: String,
    pub progress: f64,
    pub enrolled_at: Timestamp,
}

impl ClassStudent {
    pub fn student_status(&self) -> Result<StudentStatus, CoreError> {
        StudentStatus::parse(&self.status).map_err(|e| {
            CoreError::Internal(format!(
                "class {} student {}: {e}",
                self.class_id, self.user_id
            ))
        })
    }
}

/// A row from the `class_student_completed_trees` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CompletedTreeRow {
    pub class_id: DbId,
    pub user_id: DbId,
    pub skill_tree_id: DbId,
    pub completed_at: Timestamp,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

impl From<CompletedTreeRow> for CompletedSkillTree {
    fn from(row: CompletedTreeRow) -> Self {
        CompletedSkillTree {
            skill_tree_id: row.skill_tree_id,
            completed_at: row.completed_at,
            score: row.score,
            feedback: row.feedback,
        }
    }
}

/// A skill tree linked to a class, with the tree's name resolved.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClassSkillTreeLink {
    pub skill_tree_id: DbId,
    pub name: String,
    pub tree_type: String,
    pub level: String,
    pub sort_order: i32,
    pub is_required: bool,
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// One roster entry as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct StudentEntry {
    pub user: Option<UserSummary>,
    pub user_id: DbId,
    pub status: StudentStatus,
    pub progress: f64,
    pub enrolled_at: Timestamp,
    pub completed_skill_trees: Vec<CompletedSkillTree>,
}

impl StudentEntry {
    pub fn from_entry(entry: &RosterEntry, user: Option<UserSummary>) -> Self {
        Self {
            user,
            user_id: entry.user_id,
            status: entry.status,
            progress: entry.progress,
            enrolled_at: entry.enrolled_at,
            completed_skill_trees: entry.completed_skill_trees.clone(),
        }
    }
}

/// A class with its trees, teachers and roster.
#[derive(Debug, Clone, Serialize)]
pub struct ClassDetail {
    #[serde(flatten)]
    pub class: Class,
    pub skill_trees: Vec<ClassSkillTreeLink>,
    pub teachers: Vec<UserSummary>,
    pub students: Vec<StudentEntry>,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Link between a class and a skill tree, as submitted by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassTreeLinkInput {
    pub skill_tree_id: DbId,
    pub level: Option<String>,
    pub sort_order: Option<i32>,
    pub is_required: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClass {
    pub name: String,
    pub description: Option<String>,
    pub code: String,
    pub class_type: Option<String>,
    pub level: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub duration: Option<f64>,
    pub max_students: Option<i32>,
    pub schedule: Option<serde_json::Value>,
    pub settings: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub skill_trees: Vec<ClassTreeLinkInput>,
    #[serde(default)]
    pub teachers: Vec<DbId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateClass {
    pub name: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub class_type: Option<String>,
    pub level: Option<String>,
    pub status: Option<String>,
    pub objectives: Option<Vec<String>>,
    pub duration: Option<f64>,
    pub max_students: Option<i32>,
    pub schedule: Option<serde_json::Value>,
    pub settings: Option<serde_json::Value>,
    pub tags: Option<Vec<String>>,
    /// Replaces every tree link when present.
    pub skill_trees: Option<Vec<ClassTreeLinkInput>>,
}

/// Completed-tree record submitted with a progress update.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedTreeInput {
    pub skill_tree_id: DbId,
    pub completed_at: Option<Timestamp>,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

/// Filters for the paginated class list.
#[derive(Debug, Default)]
pub struct ClassFilter {
    pub search: Option<String>,
    pub class_type: Option<String>,
    pub level: Option<String>,
    pub status: Option<String>,
    pub teacher_id: Option<DbId>,
    pub skill_tree_id: Option<DbId>,
    pub student_id: Option<DbId>,
    pub tag: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
