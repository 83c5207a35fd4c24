//! Skill catalog models and DTOs.

use serde::{Deserialize, Serialize};
use skillforge_core::skill_tree::SkillFacts;
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `skills` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Skill {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub level: String,
    pub skill_type: String,
    pub status: String,
    pub icon: Option<String>,
    pub color: String,
    pub learning_objectives: Vec<String>,
    pub key_concepts: Vec<String>,
    /// Hours.
    pub estimated_time: Option<f64>,
    pub difficulty: i32,
    pub popularity: i32,
    pub market_demand: i32,
    pub salary_impact: f64,
    pub tags: Vec<String>,
    pub total_users: i64,
    pub average_progress: f64,
    pub completion_rate: f64,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Skill {
    /// The subset of fields tree statistics are computed from.
    pub fn facts(&self) -> SkillFacts {
        SkillFacts {
            level: self.level.clone(),
            skill_type: self.skill_type.clone(),
            difficulty: self.difficulty,
            market_demand: self.market_demand,
            total_users: self.total_users,
            average_progress: self.average_progress,
            completion_rate: self.completion_rate,
        }
    }
}

/// Compact skill reference embedded in trees, ratings and edge lists.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SkillSummary {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub level: String,
    pub skill_type: String,
    pub icon: Option<String>,
    pub color: String,
}

/// A skill with its prerequisite and related skills resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SkillDetail {
    #[serde(flatten)]
    pub skill: Skill,
    pub prerequisites: Vec<SkillSummary>,
    pub related_skills: Vec<SkillSummary>,
}

/// Distinct categories and non-null subcategories across the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SkillCategories {
    pub categories: Vec<String>,
    pub subcategories: Vec<String>,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSkill {
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub level: Option<String>,
    pub skill_type: Option<String>,
    pub status: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    pub estimated_time: Option<f64>,
    pub difficulty: Option<i32>,
    pub market_demand: Option<i32>,
    pub salary_impact: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSkill {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub level: Option<String>,
    pub skill_type: Option<String>,
    pub status: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub learning_objectives: Option<Vec<String>>,
    pub key_concepts: Option<Vec<String>>,
    pub estimated_time: Option<f64>,
    pub difficulty: Option<i32>,
    pub popularity: Option<i32>,
    pub market_demand: Option<i32>,
    pub salary_impact: Option<f64>,
    pub tags: Option<Vec<String>>,
}

/// Filters for the paginated skill list. `sort_column` must already be a
/// whitelisted column name.
#[derive(Debug, Default)]
pub struct SkillFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub level: Option<String>,
    pub skill_type: Option<String>,
    pub status: Option<String>,
    pub sort_column: &'static str,
    pub sort_direction: &'static str,
    pub limit: i64,
    pub offset: i64,
}
