//! Repository for the `skills` table and its prerequisite / related edges.

use skillforge_core::skill;
use skillforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::skill::{
    CreateSkill, Skill, SkillCategories, SkillDetail, SkillFilter, SkillSummary, UpdateSkill,
};
use crate::repositories::SkillTreeRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, short_description, category, subcategory, \
    level, skill_type, status, icon, color, learning_objectives, key_concepts, \
    estimated_time, difficulty, popularity, market_demand, salary_impact, tags, \
    total_users, average_progress, completion_rate, average_rating, total_ratings, \
    created_by, created_at, updated_at";

/// Column list for [`SkillSummary`], prefixed for joins.
pub(crate) const SUMMARY_COLUMNS: &str =
    "s.id, s.name, s.description, s.category, s.level, s.skill_type, s.icon, s.color";

/// Provides catalog operations for skills.
pub struct SkillRepo;

impl SkillRepo {
    /// Insert a new skill. Missing vocabulary fields take their defaults.
    pub async fn create(
        pool: &PgPool,
        input: &CreateSkill,
        created_by: DbId,
    ) -> Result<Skill, sqlx::Error> {
        let query = format!(
            "INSERT INTO skills
                (name, description, short_description, category, subcategory, level,
                 skill_type, status, icon, color, learning_objectives, key_concepts,
                 estimated_time, difficulty, market_demand, salary_impact, tags, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Skill>(&query)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(&input.short_description)
            .bind(input.category.trim())
            .bind(&input.subcategory)
            .bind(input.level.as_deref().unwrap_or(skill::DEFAULT_LEVEL))
            .bind(input.skill_type.as_deref().unwrap_or(skill::DEFAULT_TYPE))
            .bind(input.status.as_deref().unwrap_or(skill::DEFAULT_STATUS))
            .bind(&input.icon)
            .bind(input.color.as_deref().unwrap_or(skill::DEFAULT_COLOR))
            .bind(&input.learning_objectives)
            .bind(&input.key_concepts)
            .bind(input.estimated_time)
            .bind(input.difficulty.unwrap_or(skill::DEFAULT_SCORE))
            .bind(input.market_demand.unwrap_or(skill::DEFAULT_SCORE))
            .bind(input.salary_impact.unwrap_or(0.0))
            .bind(&input.tags)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Skill>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM skills WHERE id = $1");
        sqlx::query_as::<_, Skill>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM skills WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Whether another skill already uses `name`, compared case-insensitively.
    pub async fn name_taken(
        pool: &PgPool,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM skills
                 WHERE LOWER(name) = LOWER($1) AND ($2::BIGINT IS NULL OR id <> $2)
             )",
        )
        .bind(name.trim())
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    /// A skill with its prerequisite and related skills resolved.
    pub async fn find_detail(pool: &PgPool, id: DbId) -> Result<Option<SkillDetail>, sqlx::Error> {
        let Some(skill) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let prerequisites_query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM skill_prerequisites sp
             JOIN skills s ON s.id = sp.prerequisite_id
             WHERE sp.skill_id = $1
             ORDER BY sp.created_at, s.id"
        );
        let prerequisites = sqlx::query_as::<_, SkillSummary>(&prerequisites_query)
            .bind(id)
            .fetch_all(pool)
            .await?;

        let related_query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM skill_relations sr
             JOIN skills s ON s.id = sr.related_skill_id
             WHERE sr.skill_id = $1
             ORDER BY sr.created_at, s.id"
        );
        let related_skills = sqlx::query_as::<_, SkillSummary>(&related_query)
            .bind(id)
            .fetch_all(pool)
            .await?;

        Ok(Some(SkillDetail {
            skill,
            prerequisites,
            related_skills,
        }))
    }

    /// Full rows for a set of skill ids, in no particular order.
    pub async fn find_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Skill>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM skills WHERE id = ANY($1)");
        sqlx::query_as::<_, Skill>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Summaries for a set of skill ids, in no particular order.
    pub async fn summaries(pool: &PgPool, ids: &[DbId]) -> Result<Vec<SkillSummary>, sqlx::Error> {
        let query = format!("SELECT {SUMMARY_COLUMNS} FROM skills s WHERE s.id = ANY($1)");
        sqlx::query_as::<_, SkillSummary>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Filtered, sorted page of skills plus the total match count.
    pub async fn list(
        pool: &PgPool,
        filter: &SkillFilter,
    ) -> Result<(Vec<Skill>, i64), sqlx::Error> {
        // Build dynamic WHERE clauses.
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.search.is_some() {
            conditions.push(format!(
                "(name ILIKE ${bind_idx} OR description ILIKE ${bind_idx} \
                  OR array_to_string(tags, ' ') ILIKE ${bind_idx})"
            ));
            bind_idx += 1;
        }
        if filter.category.is_some() {
            conditions.push(format!("category = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.subcategory.is_some() {
            conditions.push(format!("subcategory = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.level.is_some() {
            conditions.push(format!("level = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.skill_type.is_some() {
            conditions.push(format!("skill_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM skills {where_clause} \
             ORDER BY {sort} {dir}, id {dir} \
             LIMIT ${bind_idx} OFFSET ${next_idx}",
            sort = filter.sort_column,
            dir = filter.sort_direction,
            next_idx = bind_idx + 1,
        );
        let count_query = format!("SELECT COUNT(*) FROM skills {where_clause}");

        let mut q = sqlx::query_as::<_, Skill>(&query);
        let mut count = sqlx::query_scalar::<_, i64>(&count_query);

        // Bind dynamic parameters in order.
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            q = q.bind(pattern.clone());
            count = count.bind(pattern);
        }
        for value in [
            &filter.category,
            &filter.subcategory,
            &filter.level,
            &filter.skill_type,
            &filter.status,
        ]
        .into_iter()
        .flatten()
        {
            q = q.bind(value);
            count = count.bind(value);
        }

        let skills = q.bind(filter.limit).bind(filter.offset).fetch_all(pool).await?;
        let total = count.fetch_one(pool).await?;
        Ok((skills, total))
    }

    /// Active skills ordered by popularity.
    pub async fn popular(pool: &PgPool, limit: i64) -> Result<Vec<Skill>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM skills WHERE status = 'active'
             ORDER BY popularity DESC, id LIMIT $1"
        );
        sqlx::query_as::<_, Skill>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Active skills ordered by market demand.
    pub async fn high_demand(pool: &PgPool, limit: i64) -> Result<Vec<Skill>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM skills WHERE status = 'active'
             ORDER BY market_demand DESC, id LIMIT $1"
        );
        sqlx::query_as::<_, Skill>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn categories(pool: &PgPool) -> Result<SkillCategories, sqlx::Error> {
        let categories =
            sqlx::query_scalar("SELECT DISTINCT category FROM skills ORDER BY category")
                .fetch_all(pool)
                .await?;
        let subcategories = sqlx::query_scalar(
            "SELECT DISTINCT subcategory FROM skills
             WHERE subcategory IS NOT NULL AND subcategory <> ''
             ORDER BY subcategory",
        )
        .fetch_all(pool)
        .await?;
        Ok(SkillCategories {
            categories,
            subcategories,
        })
    }

    /// Update a skill. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSkill,
    ) -> Result<Option<Skill>, sqlx::Error> {
        let query = format!(
            "UPDATE skills SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                short_description = COALESCE($4, short_description),
                category = COALESCE($5, category),
                subcategory = COALESCE($6, subcategory),
                level = COALESCE($7, level),
                skill_type = COALESCE($8, skill_type),
                status = COALESCE($9, status),
                icon = COALESCE($10, icon),
                color = COALESCE($11, color),
                learning_objectives = COALESCE($12, learning_objectives),
                key_concepts = COALESCE($13, key_concepts),
                estimated_time = COALESCE($14, estimated_time),
                difficulty = COALESCE($15, difficulty),
                popularity = COALESCE($16, popularity),
                market_demand = COALESCE($17, market_demand),
                salary_impact = COALESCE($18, salary_impact),
                tags = COALESCE($19, tags)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Skill>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&input.short_description)
            .bind(input.category.as_deref().map(str::trim))
            .bind(&input.subcategory)
            .bind(&input.level)
            .bind(&input.skill_type)
            .bind(&input.status)
            .bind(&input.icon)
            .bind(&input.color)
            .bind(&input.learning_objectives)
            .bind(&input.key_concepts)
            .bind(input.estimated_time)
            .bind(input.difficulty)
            .bind(input.popularity)
            .bind(input.market_demand)
            .bind(input.salary_impact)
            .bind(&input.tags)
            .fetch_optional(pool)
            .await
    }

    /// Delete a skill and everything that points at it.
    ///
    /// Every tree node holding the skill is removed with its descendants and
    /// the affected trees get their totals recomputed. Learning-path steps,
    /// path prerequisites and ratings referencing the skill go too. Returns
    /// `false` if the skill does not exist.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, crate::DbError> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> =
            sqlx::query_scalar("SELECT id FROM skills WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let tree_ids: Vec<DbId> = sqlx::query_scalar(
            "SELECT DISTINCT skill_tree_id FROM skill_tree_nodes WHERE skill_id = $1 ORDER BY 1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for tree_id in tree_ids {
            let mut arena = SkillTreeRepo::lock_and_load(&mut tx, tree_id).await?;
            let removed = arena.remove_all_of_skill(id);
            SkillTreeRepo::persist_changes(&mut tx, tree_id, &mut arena).await?;
            tracing::info!(
                skill_id = id,
                skill_tree_id = tree_id,
                subtrees = removed.len(),
                "Removed deleted skill from tree"
            );
        }

        sqlx::query("DELETE FROM learning_path_steps WHERE skill_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE learning_paths SET prerequisites = array_remove(prerequisites, $1)
             WHERE $1 = ANY(prerequisites)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM user_skill_ratings WHERE skill_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM skills WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Record `prerequisite_id` as a prerequisite of `skill_id`. Adding the
    /// same edge twice is a no-op.
    pub async fn add_prerequisite(
        pool: &PgPool,
        skill_id: DbId,
        prerequisite_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO skill_prerequisites (skill_id, prerequisite_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(skill_id)
        .bind(prerequisite_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Returns `true` if the edge existed.
    pub async fn remove_prerequisite(
        pool: &PgPool,
        skill_id: DbId,
        prerequisite_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM skill_prerequisites WHERE skill_id = $1 AND prerequisite_id = $2",
        )
        .bind(skill_id)
        .bind(prerequisite_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_related(
        pool: &PgPool,
        skill_id: DbId,
        related_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO skill_relations (skill_id, related_skill_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(skill_id)
        .bind(related_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Returns `true` if the edge existed.
    pub async fn remove_related(
        pool: &PgPool,
        skill_id: DbId,
        related_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM skill_relations WHERE skill_id = $1 AND related_skill_id = $2",
        )
        .bind(skill_id)
        .bind(related_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
