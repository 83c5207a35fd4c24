//! Repository for skill trees, their nodes and learning paths.
//!
//! Structural changes follow one pattern: lock the tree row, load every node
//! into a [`SkillTreeArena`], apply the operation in memory, then write the
//! arena's recorded changes and the recomputed `total_skills` in the same
//! transaction. Concurrent mutations of one tree therefore serialize.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use skillforge_core::error::CoreError;
use skillforge_core::skill_tree::{
    self, NodeId, RemovedSubtree, SkillTreeArena, TreeChange, TreeSkillStats,
};
use skillforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::skill::SkillSummary;
use crate::models::skill_tree::{
    AllSkillAssignments, CreateLearningPath, CreateSkillTree, LearningPath, LearningPathStep,
    LearningPathWithSteps, SkillAssignment, SkillTree, SkillTreeDetail, SkillTreeFilter,
    SkillTreeNode, TreeRef, TreeSkillAssignment, UpdateSkillTree,
};
use crate::repositories::SkillRepo;
use crate::DbError;

/// Column list for the `skill_trees` table.
const COLUMNS: &str = "id, name, description, short_description, tree_type, status, icon, \
    color, tags, settings, total_skills, total_paths, version, created_by, created_at, updated_at";

/// Column list for the `skill_tree_nodes` table.
const NODE_COLUMNS: &str = "id, skill_tree_id, parent_node_id, skill_id, depth, sort_order, \
    position_x, position_y, required, estimated_time, priority, notes";

const PATH_COLUMNS: &str = "id, skill_tree_id, name, description, difficulty, \
    estimated_duration, prerequisites, outcomes, status, created_at";

const STEP_COLUMNS: &str =
    "id, learning_path_id, skill_id, step_order, is_optional, estimated_time, notes";

/// Outcome of a bulk assignment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkAssignOutcome {
    /// Skill ids that received a node, in request order.
    pub added: Vec<DbId>,
    /// Skill ids skipped because the skill does not exist.
    pub skipped: Vec<DbId>,
}

/// Outcome of a bulk removal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkRemoveOutcome {
    /// Skill ids whose node was removed, each with its descendants.
    pub removed: Vec<DbId>,
    /// Skill ids skipped because the tree does not contain them.
    pub skipped: Vec<DbId>,
}

/// Provides skill tree operations.
pub struct SkillTreeRepo;

impl SkillTreeRepo {
    // -----------------------------------------------------------------------
    // Arena plumbing
    // -----------------------------------------------------------------------

    /// Lock the tree row and load its nodes into an arena.
    pub(crate) async fn lock_and_load(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tree_id: DbId,
    ) -> Result<SkillTreeArena, DbError> {
        let locked: Option<DbId> =
            sqlx::query_scalar("SELECT id FROM skill_trees WHERE id = $1 FOR UPDATE")
                .bind(tree_id)
                .fetch_optional(&mut **tx)
                .await?;
        if locked.is_none() {
            return Err(CoreError::NotFound {
                entity: "SkillTree",
                id: tree_id,
            }
            .into());
        }

        let query = format!("SELECT {NODE_COLUMNS} FROM skill_tree_nodes WHERE skill_tree_id = $1");
        let nodes = sqlx::query_as::<_, SkillTreeNode>(&query)
            .bind(tree_id)
            .fetch_all(&mut **tx)
            .await?;
        Ok(Self::build_arena(nodes)?)
    }

    fn build_arena(nodes: Vec<SkillTreeNode>) -> Result<SkillTreeArena, CoreError> {
        let rows = nodes
            .into_iter()
            .map(SkillTreeNode::into_node_row)
            .collect::<Result<Vec<_>, _>>()?;
        SkillTreeArena::from_rows(rows)
    }

    /// Write the arena's pending changes and refresh `total_skills`.
    ///
    /// Provisional node ids are replaced by the ids the database assigns, so
    /// a node inserted earlier in the same batch can parent a later one.
    /// Returns the provisional-to-stored id mapping.
    pub(crate) async fn persist_changes(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tree_id: DbId,
        arena: &mut SkillTreeArena,
    ) -> Result<HashMap<NodeId, DbId>, DbError> {
        let mut assigned: HashMap<NodeId, DbId> = HashMap::new();
        let resolve = |assigned: &HashMap<NodeId, DbId>, id: NodeId| -> Option<DbId> {
            if id < 0 {
                assigned.get(&id).copied()
            } else {
                Some(id)
            }
        };

        for change in arena.take_changes() {
            match change {
                TreeChange::Inserted(node) => {
                    let parent = match node.parent {
                        None => None,
                        Some(p) => Some(resolve(&assigned, p).ok_or_else(|| {
                            CoreError::Internal(format!("unresolved provisional parent {p}"))
                        })?),
                    };
                    let id: DbId = sqlx::query_scalar(
                        "INSERT INTO skill_tree_nodes
                            (skill_tree_id, parent_node_id, skill_id, depth, sort_order,
                             position_x, position_y, required, estimated_time, priority, notes)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                         RETURNING id",
                    )
                    .bind(tree_id)
                    .bind(parent)
                    .bind(node.skill_id)
                    .bind(node.depth as i16)
                    .bind(node.sort_order)
                    .bind(node.position.x)
                    .bind(node.position.y)
                    .bind(node.properties.required)
                    .bind(node.properties.estimated_time)
                    .bind(node.properties.priority.as_str())
                    .bind(&node.properties.notes)
                    .fetch_one(&mut **tx)
                    .await?;
                    assigned.insert(node.id, id);
                }
                TreeChange::Removed(ids) => {
                    let persisted: Vec<DbId> = ids
                        .into_iter()
                        .filter_map(|id| resolve(&assigned, id))
                        .collect();
                    sqlx::query(
                        "DELETE FROM skill_tree_nodes WHERE skill_tree_id = $1 AND id = ANY($2)",
                    )
                    .bind(tree_id)
                    .bind(&persisted)
                    .execute(&mut **tx)
                    .await?;
                }
            }
        }

        sqlx::query("UPDATE skill_trees SET total_skills = $2 WHERE id = $1")
            .bind(tree_id)
            .bind(arena.node_count() as i32)
            .execute(&mut **tx)
            .await?;
        Ok(assigned)
    }

    /// Add each assignment whose skill exists. Missing skills are skipped.
    async fn apply_assignments(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tree_id: DbId,
        arena: &mut SkillTreeArena,
        assignments: &[TreeSkillAssignment],
    ) -> Result<BulkAssignOutcome, DbError> {
        let requested: Vec<DbId> = assignments.iter().map(|a| a.skill_id).collect();
        let existing: HashSet<DbId> =
            sqlx::query_scalar::<_, DbId>("SELECT id FROM skills WHERE id = ANY($1)")
                .bind(&requested)
                .fetch_all(&mut **tx)
                .await?
                .into_iter()
                .collect();

        let mut outcome = BulkAssignOutcome::default();
        for assignment in assignments {
            if !existing.contains(&assignment.skill_id) {
                tracing::warn!(
                    skill_tree_id = tree_id,
                    skill_id = assignment.skill_id,
                    "Skill not found, skipping assignment"
                );
                outcome.skipped.push(assignment.skill_id);
                continue;
            }
            arena.add_skill(
                assignment.skill_id,
                assignment.parent_id,
                assignment.properties.clone(),
            )?;
            outcome.added.push(assignment.skill_id);
        }
        Ok(outcome)
    }

    /// Load a tree's nodes without locking, for reads.
    pub async fn load_arena(pool: &PgPool, tree_id: DbId) -> Result<SkillTreeArena, DbError> {
        let query = format!("SELECT {NODE_COLUMNS} FROM skill_tree_nodes WHERE skill_tree_id = $1");
        let nodes = sqlx::query_as::<_, SkillTreeNode>(&query)
            .bind(tree_id)
            .fetch_all(pool)
            .await?;
        Ok(Self::build_arena(nodes)?)
    }

    // -----------------------------------------------------------------------
    // Tree CRUD
    // -----------------------------------------------------------------------

    /// Insert a tree and apply its initial structure in one transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreateSkillTree,
        created_by: DbId,
    ) -> Result<SkillTree, DbError> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO skill_trees
                (name, description, short_description, tree_type, status, icon, color,
                 tags, settings, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        let tree = sqlx::query_as::<_, SkillTree>(&query)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(&input.short_description)
            .bind(input.tree_type.as_deref().unwrap_or(skill_tree::DEFAULT_TREE_TYPE))
            .bind(input.status.as_deref().unwrap_or(skill_tree::DEFAULT_TREE_STATUS))
            .bind(&input.icon)
            .bind(input.color.as_deref().unwrap_or(skill_tree::DEFAULT_TREE_COLOR))
            .bind(&input.tags)
            .bind(
                input
                    .settings
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({})),
            )
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        if input.structure.is_empty() {
            tx.commit().await?;
            return Ok(tree);
        }

        let mut arena = SkillTreeArena::new();
        Self::apply_assignments(&mut tx, tree.id, &mut arena, &input.structure).await?;
        Self::persist_changes(&mut tx, tree.id, &mut arena).await?;

        let query = format!("SELECT {COLUMNS} FROM skill_trees WHERE id = $1");
        let tree = sqlx::query_as::<_, SkillTree>(&query)
            .bind(tree.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(tree)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SkillTree>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM skill_trees WHERE id = $1");
        sqlx::query_as::<_, SkillTree>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM skill_trees WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Whether another tree already uses `name`, compared case-insensitively.
    pub async fn name_taken(
        pool: &PgPool,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM skill_trees
                 WHERE LOWER(name) = LOWER($1) AND ($2::BIGINT IS NULL OR id <> $2)
             )",
        )
        .bind(name.trim())
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    /// Filtered page of trees, newest first, plus the total match count.
    pub async fn list(
        pool: &PgPool,
        filter: &SkillTreeFilter,
    ) -> Result<(Vec<SkillTree>, i64), sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.search.is_some() {
            conditions.push(format!(
                "(name ILIKE ${bind_idx} OR description ILIKE ${bind_idx} \
                  OR array_to_string(tags, ' ') ILIKE ${bind_idx})"
            ));
            bind_idx += 1;
        }
        if filter.tree_type.is_some() {
            conditions.push(format!("tree_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.created_by.is_some() {
            conditions.push(format!("created_by = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM skill_trees {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${next_idx}",
            next_idx = bind_idx + 1,
        );
        let count_query = format!("SELECT COUNT(*) FROM skill_trees {where_clause}");

        let mut q = sqlx::query_as::<_, SkillTree>(&query);
        let mut count = sqlx::query_scalar::<_, i64>(&count_query);

        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            q = q.bind(pattern.clone());
            count = count.bind(pattern);
        }
        for value in [&filter.tree_type, &filter.status].into_iter().flatten() {
            q = q.bind(value);
            count = count.bind(value);
        }
        if let Some(created_by) = filter.created_by {
            q = q.bind(created_by);
            count = count.bind(created_by);
        }

        let trees = q.bind(filter.limit).bind(filter.offset).fetch_all(pool).await?;
        let total = count.fetch_one(pool).await?;
        Ok((trees, total))
    }

    /// Trees with at least one node for `skill_id`.
    pub async fn list_containing_skill(
        pool: &PgPool,
        skill_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SkillTree>, i64), sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM skill_trees
             WHERE id IN (SELECT skill_tree_id FROM skill_tree_nodes WHERE skill_id = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        let trees = sqlx::query_as::<_, SkillTree>(&query)
            .bind(skill_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
        let total = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT skill_tree_id) FROM skill_tree_nodes WHERE skill_id = $1",
        )
        .bind(skill_id)
        .fetch_one(pool)
        .await?;
        Ok((trees, total))
    }

    /// Update tree metadata. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSkillTree,
    ) -> Result<Option<SkillTree>, sqlx::Error> {
        let query = format!(
            "UPDATE skill_trees SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                short_description = COALESCE($4, short_description),
                tree_type = COALESCE($5, tree_type),
                status = COALESCE($6, status),
                icon = COALESCE($7, icon),
                color = COALESCE($8, color),
                tags = COALESCE($9, tags),
                settings = COALESCE($10, settings),
                version = COALESCE($11, version)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SkillTree>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&input.short_description)
            .bind(&input.tree_type)
            .bind(&input.status)
            .bind(&input.icon)
            .bind(&input.color)
            .bind(&input.tags)
            .bind(&input.settings)
            .bind(&input.version)
            .fetch_optional(pool)
            .await
    }

    /// Delete a tree. Nodes, paths, class links and completed-tree records
    /// cascade; ratings keep their row and lose the tree reference.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM skill_trees WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Add one node for `assignment.skill_id`. Returns the stored node id.
    pub async fn add_skill(
        pool: &PgPool,
        tree_id: DbId,
        assignment: &TreeSkillAssignment,
    ) -> Result<DbId, DbError> {
        if !SkillRepo::exists(pool, assignment.skill_id).await? {
            return Err(CoreError::NotFound {
                entity: "Skill",
                id: assignment.skill_id,
            }
            .into());
        }

        let mut tx = pool.begin().await?;
        let mut arena = Self::lock_and_load(&mut tx, tree_id).await?;

        let provisional = arena.add_skill(
            assignment.skill_id,
            assignment.parent_id,
            assignment.properties.clone(),
        )?;
        let assigned = Self::persist_changes(&mut tx, tree_id, &mut arena).await?;
        let node_id = assigned.get(&provisional).copied().ok_or_else(|| {
            CoreError::Internal(format!("node for skill {} was not stored", assignment.skill_id))
        })?;

        tx.commit().await?;
        Ok(node_id)
    }

    /// Remove one occurrence of `skill_id` with its descendants.
    ///
    /// Returns `None` when the tree does not contain the skill.
    pub async fn remove_skill(
        pool: &PgPool,
        tree_id: DbId,
        skill_id: DbId,
    ) -> Result<Option<RemovedSubtree>, DbError> {
        let mut tx = pool.begin().await?;
        let mut arena = Self::lock_and_load(&mut tx, tree_id).await?;

        let removed = arena.remove_skill(skill_id);
        if removed.is_some() {
            Self::persist_changes(&mut tx, tree_id, &mut arena).await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    /// Apply many assignments under one lock and one write-back.
    ///
    /// Missing skills are skipped. A structural error (unknown parent,
    /// depth limit) aborts the whole batch.
    pub async fn bulk_assign(
        pool: &PgPool,
        tree_id: DbId,
        assignments: &[TreeSkillAssignment],
    ) -> Result<BulkAssignOutcome, DbError> {
        let mut tx = pool.begin().await?;
        let mut arena = Self::lock_and_load(&mut tx, tree_id).await?;

        let outcome = Self::apply_assignments(&mut tx, tree_id, &mut arena, assignments).await?;
        Self::persist_changes(&mut tx, tree_id, &mut arena).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Remove one occurrence of each skill under one lock and one write-back.
    /// Skills the tree does not contain are skipped.
    pub async fn bulk_remove(
        pool: &PgPool,
        tree_id: DbId,
        skill_ids: &[DbId],
    ) -> Result<BulkRemoveOutcome, DbError> {
        let mut tx = pool.begin().await?;
        let mut arena = Self::lock_and_load(&mut tx, tree_id).await?;

        let mut outcome = BulkRemoveOutcome::default();
        for &skill_id in skill_ids {
            match arena.remove_skill(skill_id) {
                Some(_) => outcome.removed.push(skill_id),
                None => {
                    tracing::warn!(
                        skill_tree_id = tree_id,
                        skill_id,
                        "Skill not found in tree, skipping removal"
                    );
                    outcome.skipped.push(skill_id);
                }
            }
        }
        Self::persist_changes(&mut tx, tree_id, &mut arena).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Read models
    // -----------------------------------------------------------------------

    async fn summary_map(
        pool: &PgPool,
        skill_ids: &[DbId],
    ) -> Result<HashMap<DbId, SkillSummary>, sqlx::Error> {
        Ok(SkillRepo::summaries(pool, skill_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect())
    }

    /// A tree with its nested structure and learning paths.
    pub async fn find_detail(pool: &PgPool, id: DbId) -> Result<Option<SkillTreeDetail>, DbError> {
        let Some(tree) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let arena = Self::load_arena(pool, id).await?;
        let skills = Self::summary_map(pool, &arena.distinct_skills()).await?;
        let learning_paths = Self::learning_paths(pool, id).await?;

        Ok(Some(SkillTreeDetail {
            tree,
            roots: arena.to_nested(&skills),
            learning_paths,
        }))
    }

    /// Every skill occurrence in preorder with its summary.
    pub async fn assignments(
        pool: &PgPool,
        tree_id: DbId,
    ) -> Result<Vec<SkillAssignment>, DbError> {
        let arena = Self::load_arena(pool, tree_id).await?;
        let skills = Self::summary_map(pool, &arena.distinct_skills()).await?;
        Ok(arena
            .all_skills()
            .into_iter()
            .map(|skill_id| SkillAssignment {
                skill_id,
                skill: skills.get(&skill_id).cloned(),
            })
            .collect())
    }

    /// Map every skill to the trees containing it, one entry per node.
    pub async fn all_assignments(pool: &PgPool) -> Result<AllSkillAssignments, sqlx::Error> {
        #[derive(sqlx::FromRow)]
        struct Occurrence {
            skill_id: DbId,
            tree_id: DbId,
            tree_name: String,
            tree_type: String,
        }

        let rows = sqlx::query_as::<_, Occurrence>(
            "SELECT n.skill_id, t.id AS tree_id, t.name AS tree_name, t.tree_type
             FROM skill_tree_nodes n
             JOIN skill_trees t ON t.id = n.skill_tree_id
             ORDER BY t.id, n.depth, n.sort_order, n.id",
        )
        .fetch_all(pool)
        .await?;

        let total_assignments = rows.len();
        let mut assignments: BTreeMap<DbId, Vec<TreeRef>> = BTreeMap::new();
        for row in rows {
            assignments.entry(row.skill_id).or_default().push(TreeRef {
                tree_id: row.tree_id,
                tree_name: row.tree_name,
                tree_type: row.tree_type,
            });
        }
        Ok(AllSkillAssignments {
            assignments,
            total_assignments,
        })
    }

    /// Statistics over the distinct skills of a tree.
    pub async fn stats(pool: &PgPool, tree_id: DbId) -> Result<TreeSkillStats, DbError> {
        let arena = Self::load_arena(pool, tree_id).await?;
        let facts: Vec<_> = SkillRepo::find_many(pool, &arena.distinct_skills())
            .await?
            .iter()
            .map(|s| s.facts())
            .collect();
        Ok(TreeSkillStats::compute(&facts))
    }

    // -----------------------------------------------------------------------
    // Learning paths
    // -----------------------------------------------------------------------

    pub async fn learning_paths(
        pool: &PgPool,
        tree_id: DbId,
    ) -> Result<Vec<LearningPathWithSteps>, sqlx::Error> {
        let query =
            format!("SELECT {PATH_COLUMNS} FROM learning_paths WHERE skill_tree_id = $1 ORDER BY id");
        let paths = sqlx::query_as::<_, LearningPath>(&query)
            .bind(tree_id)
            .fetch_all(pool)
            .await?;

        let path_ids: Vec<DbId> = paths.iter().map(|p| p.id).collect();
        let query = format!(
            "SELECT {STEP_COLUMNS} FROM learning_path_steps
             WHERE learning_path_id = ANY($1)
             ORDER BY learning_path_id, step_order"
        );
        let mut steps: HashMap<DbId, Vec<LearningPathStep>> = HashMap::new();
        for step in sqlx::query_as::<_, LearningPathStep>(&query)
            .bind(&path_ids)
            .fetch_all(pool)
            .await?
        {
            steps.entry(step.learning_path_id).or_default().push(step);
        }

        Ok(paths
            .into_iter()
            .map(|path| LearningPathWithSteps {
                sequence: steps.remove(&path.id).unwrap_or_default(),
                path,
            })
            .collect())
    }

    /// Add a learning path. Names are unique within a tree and every step
    /// and prerequisite must reference an existing skill.
    pub async fn add_learning_path(
        pool: &PgPool,
        tree_id: DbId,
        input: &CreateLearningPath,
    ) -> Result<LearningPathWithSteps, DbError> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> =
            sqlx::query_scalar("SELECT id FROM skill_trees WHERE id = $1 FOR UPDATE")
                .bind(tree_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(CoreError::NotFound {
                entity: "SkillTree",
                id: tree_id,
            }
            .into());
        }

        let name = input.name.trim();
        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM learning_paths WHERE skill_tree_id = $1 AND name = $2)",
        )
        .bind(tree_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Err(CoreError::Validation(format!(
                "Learning path '{name}' already exists in this tree"
            ))
            .into());
        }

        let mut referenced: Vec<DbId> = input.sequence.iter().map(|s| s.skill_id).collect();
        referenced.extend(&input.prerequisites);
        referenced.sort_unstable();
        referenced.dedup();
        let found: HashSet<DbId> =
            sqlx::query_scalar::<_, DbId>("SELECT id FROM skills WHERE id = ANY($1)")
                .bind(&referenced)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();
        if let Some(missing) = referenced.iter().find(|id| !found.contains(id)) {
            return Err(CoreError::Validation(format!(
                "Skill {missing} referenced by learning path does not exist"
            ))
            .into());
        }

        let query = format!(
            "INSERT INTO learning_paths
                (skill_tree_id, name, description, difficulty, estimated_duration,
                 prerequisites, outcomes, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PATH_COLUMNS}"
        );
        let path = sqlx::query_as::<_, LearningPath>(&query)
            .bind(tree_id)
            .bind(name)
            .bind(&input.description)
            .bind(input.difficulty.as_deref().unwrap_or("beginner"))
            .bind(input.estimated_duration)
            .bind(&input.prerequisites)
            .bind(&input.outcomes)
            .bind(input.status.as_deref().unwrap_or("active"))
            .fetch_one(&mut *tx)
            .await?;

        let step_query = format!(
            "INSERT INTO learning_path_steps
                (learning_path_id, skill_id, step_order, is_optional, estimated_time, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {STEP_COLUMNS}"
        );
        let mut sequence = Vec::with_capacity(input.sequence.len());
        for step in &input.sequence {
            let row = sqlx::query_as::<_, LearningPathStep>(&step_query)
                .bind(path.id)
                .bind(step.skill_id)
                .bind(step.order)
                .bind(step.is_optional)
                .bind(step.estimated_time)
                .bind(&step.notes)
                .fetch_one(&mut *tx)
                .await?;
            sequence.push(row);
        }
        sequence.sort_by_key(|s| s.step_order);

        Self::refresh_total_paths(&mut tx, tree_id).await?;
        tx.commit().await?;
        Ok(LearningPathWithSteps { path, sequence })
    }

    /// Remove the learning path called `name`. Returns `true` if it existed.
    pub async fn remove_learning_path(
        pool: &PgPool,
        tree_id: DbId,
        name: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let result =
            sqlx::query("DELETE FROM learning_paths WHERE skill_tree_id = $1 AND name = $2")
                .bind(tree_id)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        Self::refresh_total_paths(&mut tx, tree_id).await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn refresh_total_paths(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tree_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE skill_trees SET total_paths =
                (SELECT COUNT(*) FROM learning_paths WHERE skill_tree_id = $1)
             WHERE id = $1",
        )
        .bind(tree_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
