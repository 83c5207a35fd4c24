//! Skill tree, node and learning-path models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skillforge_core::error::CoreError;
use skillforge_core::skill_tree::{NestedNode, NodeProperties, NodeRow, PathStep, Position, Priority};
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::models::skill::SkillSummary;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `skill_trees` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SkillTree {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub tree_type: String,
    pub status: String,
    pub icon: Option<String>,
    pub color: String,
    pub tags: Vec<String>,
    pub settings: serde_json::Value,
    pub total_skills: i32,
    pub total_paths: i32,
    pub version: String,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `skill_tree_nodes` table.
#[derive(Debug, Clone, FromRow)]
pub struct SkillTreeNode {
    pub id: DbId,
    pub skill_tree_id: DbId,
    pub parent_node_id: Option<DbId>,
    pub skill_id: DbId,
    pub depth: i16,
    pub sort_order: i32,
    pub position_x: f64,
    pub position_y: f64,
    pub required: bool,
    pub estimated_time: f64,
    pub priority: String,
    pub notes: String,
}

impl SkillTreeNode {
    /// Convert into the arena's input row. Fails on an unknown priority.
    pub fn into_node_row(self) -> Result<NodeRow, CoreError> {
        let priority = Priority::parse(&self.priority)
            .map_err(|e| CoreError::Internal(format!("node {}: {e}", self.id)))?;
        Ok(NodeRow {
            id: self.id,
            parent_id: self.parent_node_id,
            skill_id: self.skill_id,
            sort_order: self.sort_order,
            position: Position {
                x: self.position_x,
                y: self.position_y,
            },
            properties: NodeProperties {
                required: self.required,
                estimated_time: self.estimated_time,
                priority,
                notes: self.notes,
            },
        })
    }
}

/// A row from the `learning_paths` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LearningPath {
    pub id: DbId,
    pub skill_tree_id: DbId,
    pub name: String,
    pub description: String,
    pub difficulty: String,
    pub estimated_duration: f64,
    pub prerequisites: Vec<DbId>,
    pub outcomes: Vec<String>,
    pub status: String,
    pub created_at: Timestamp,
}

/// A row from the `learning_path_steps` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LearningPathStep {
    pub id: DbId,
    pub learning_path_id: DbId,
    pub skill_id: DbId,
    pub step_order: i32,
    pub is_optional: bool,
    pub estimated_time: Option<f64>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LearningPathWithSteps {
    #[serde(flatten)]
    pub path: LearningPath,
    pub sequence: Vec<LearningPathStep>,
}

/// A tree with its nested structure and learning paths.
#[derive(Debug, Clone, Serialize)]
pub struct SkillTreeDetail {
    #[serde(flatten)]
    pub tree: SkillTree,
    pub roots: Vec<NestedNode<SkillSummary>>,
    pub learning_paths: Vec<LearningPathWithSteps>,
}

/// One skill occurrence in a tree, in preorder.
#[derive(Debug, Clone, Serialize)]
pub struct SkillAssignment {
    pub skill_id: DbId,
    pub skill: Option<SkillSummary>,
}

/// A tree that contains a given skill.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TreeRef {
    pub tree_id: DbId,
    pub tree_name: String,
    pub tree_type: String,
}

/// Skill id to the trees containing it, one entry per occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct AllSkillAssignments {
    pub assignments: BTreeMap<DbId, Vec<TreeRef>>,
    pub total_assignments: usize,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// One skill to place into a tree.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSkillAssignment {
    pub skill_id: DbId,
    /// Skill id of the parent node. `None` adds a root.
    pub parent_id: Option<DbId>,
    #[serde(default)]
    pub properties: NodeProperties,
}

#[derive(Debug, Deserialize)]
pub struct CreateSkillTree {
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub tree_type: Option<String>,
    pub status: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub settings: Option<serde_json::Value>,
    /// Initial structure, applied in order like a bulk assignment.
    #[serde(default)]
    pub structure: Vec<TreeSkillAssignment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSkillTree {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub tree_type: Option<String>,
    pub status: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub tags: Option<Vec<String>>,
    pub settings: Option<serde_json::Value>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLearningPath {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub estimated_duration: f64,
    #[serde(default)]
    pub sequence: Vec<PathStep>,
    #[serde(default)]
    pub prerequisites: Vec<DbId>,
    #[serde(default)]
    pub outcomes: Vec<String>,
    pub status: Option<String>,
}

/// Filters for the paginated tree list.
#[derive(Debug, Default)]
pub struct SkillTreeFilter {
    pub search: Option<String>,
    pub tree_type: Option<String>,
    pub status: Option<String>,
    pub created_by: Option<DbId>,
    pub limit: i64,
    pub offset: i64,
}
