//! Repository for user skill ratings, assessments and rating notes.
//!
//! Lifecycle transitions lock the rating row, lift it into a
//! [`RatingLifecycle`], apply the transition and `prepare_save`, then write
//! the state back together with a note and refreshed skill statistics.

use chrono::Utc;
use skillforge_core::error::CoreError;
use skillforge_core::skill_rating::{
    self, ArchiveReason, AssessmentType, RatingLifecycle, RatingState,
};
use skillforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::skill_rating::{
    Assessment, CreateAssessment, CreateRatingNote, RatingFilter, RatingNote, SkillRating,
    SkillRatingDetail, SkillRatingStats, SkillRatingView, UpsertSkillRating, UserSkillStats,
};
use crate::repositories::{ClassRepo, SkillRepo, SkillTreeRepo, UserRepo};
use crate::DbError;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, skill_id, skill_tree_id, class_id, rated_by, rating, \
    progress, mastery_level, status, is_archived, archive_reason, archive_notes, archived_at, \
    completed_at, started_at, last_practiced_at, time_spent, created_at, updated_at";

/// Rating columns plus resolved names, for the list views.
const VIEW_SELECT: &str = "SELECT r.id, r.user_id, r.skill_id, r.skill_tree_id, r.class_id, \
    r.rated_by, r.rating, r.progress, r.mastery_level, r.status, r.is_archived, \
    r.archive_reason, r.archive_notes, r.archived_at, r.completed_at, r.started_at, \
    r.last_practiced_at, r.time_spent, r.created_at, r.updated_at, \
    s.name AS skill_name, s.category AS skill_category, \
    c.name AS class_name, c.code AS class_code, \
    t.name AS skill_tree_name, u.username \
    FROM user_skill_ratings r \
    JOIN skills s ON s.id = r.skill_id \
    JOIN classes c ON c.id = r.class_id \
    JOIN users u ON u.id = r.user_id \
    LEFT JOIN skill_trees t ON t.id = r.skill_tree_id";

const ASSESSMENT_COLUMNS: &str = "id, rating_id, title, score, max_score, assessment_type, \
    feedback, assessed_by, completed_at";

const NOTE_COLUMNS: &str = "id, rating_id, content, author_id, is_private, created_at";

/// A lifecycle transition applied by [`SkillRatingRepo::apply_lifecycle`].
#[derive(Debug, Clone)]
pub enum RatingTransition {
    /// Record practice. Reaching 100 completes the rating.
    Progress { progress: f64, time_spent: i32 },
    Archive {
        reason: ArchiveReason,
        notes: Option<String>,
    },
    Unarchive,
    Complete,
}

impl RatingTransition {
    fn apply(&self, lifecycle: &mut RatingLifecycle) -> Result<String, CoreError> {
        let now = Utc::now();
        let note = match self {
            RatingTransition::Progress {
                progress,
                time_spent,
            } => {
                skill_rating::validate_progress(*progress)?;
                lifecycle.update_progress(*progress, *time_spent, now)?;
                skill_rating::progress_note(lifecycle.state().progress)
            }
            RatingTransition::Archive { reason, notes } => {
                lifecycle.archive(*reason, notes.clone(), now);
                skill_rating::archive_note(*reason, notes.as_deref())
            }
            RatingTransition::Unarchive => {
                lifecycle.unarchive()?;
                skill_rating::UNARCHIVE_NOTE.to_string()
            }
            RatingTransition::Complete => {
                lifecycle.complete(now);
                "Skill completed".to_string()
            }
        };
        Ok(note)
    }
}

/// Provides rating operations.
pub struct SkillRatingRepo;

impl SkillRatingRepo {
    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SkillRating>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_skill_ratings WHERE id = $1");
        sqlx::query_as::<_, SkillRating>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Resolve the rating of `user_id` for `skill_id`.
    ///
    /// Without `class_id` the pair must identify exactly one rating; a user
    /// rated for the same skill in several classes must name the class.
    pub async fn resolve_id(
        pool: &PgPool,
        user_id: DbId,
        skill_id: DbId,
        class_id: Option<DbId>,
    ) -> Result<DbId, DbError> {
        let ids: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM user_skill_ratings
             WHERE user_id = $1 AND skill_id = $2 AND ($3::BIGINT IS NULL OR class_id = $3)
             ORDER BY id
             LIMIT 2",
        )
        .bind(user_id)
        .bind(skill_id)
        .bind(class_id)
        .fetch_all(pool)
        .await?;

        match ids.as_slice() {
            [] => Err(CoreError::NotFound {
                entity: "SkillRating",
                id: skill_id,
            }
            .into()),
            [id] => Ok(*id),
            _ => Err(CoreError::Validation(
                "User has ratings for this skill in several classes; specify class_id".into(),
            )
            .into()),
        }
    }

    /// A rating with its assessments and notes.
    pub async fn find_detail(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<SkillRatingDetail>, sqlx::Error> {
        let Some(rating) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let query = format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM rating_assessments
             WHERE rating_id = $1 ORDER BY completed_at, id"
        );
        let assessments = sqlx::query_as::<_, Assessment>(&query)
            .bind(id)
            .fetch_all(pool)
            .await?;

        let query =
            format!("SELECT {NOTE_COLUMNS} FROM rating_notes WHERE rating_id = $1 ORDER BY id");
        let notes = sqlx::query_as::<_, RatingNote>(&query)
            .bind(id)
            .fetch_all(pool)
            .await?;

        Ok(Some(SkillRatingDetail {
            rating,
            assessments,
            notes,
        }))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    async fn lock(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
    ) -> Result<SkillRating, DbError> {
        let query = format!("SELECT {COLUMNS} FROM user_skill_ratings WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, SkillRating>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "SkillRating",
                    id,
                }
                .into()
            })
    }

    async fn write_state(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
        state: &RatingState,
    ) -> Result<SkillRating, sqlx::Error> {
        let query = format!(
            "UPDATE user_skill_ratings SET
                rating = $2,
                rated_by = $3,
                progress = $4,
                mastery_level = $5,
                status = $6,
                is_archived = $7,
                archive_reason = $8,
                archive_notes = $9,
                archived_at = $10,
                completed_at = $11,
                last_practiced_at = $12,
                time_spent = $13
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SkillRating>(&query)
            .bind(id)
            .bind(state.rating)
            .bind(state.rated_by)
            .bind(state.progress)
            .bind(state.mastery_level.as_str())
            .bind(state.status.as_str())
            .bind(state.is_archived)
            .bind(state.archive_reason.map(|r| r.as_str()))
            .bind(&state.archive_notes)
            .bind(state.archived_at)
            .bind(state.completed_at)
            .bind(state.last_practiced_at)
            .bind(state.time_spent)
            .fetch_one(&mut **tx)
            .await
    }

    async fn append_note(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        rating_id: DbId,
        content: &str,
        author_id: DbId,
        is_private: bool,
    ) -> Result<RatingNote, sqlx::Error> {
        let query = format!(
            "INSERT INTO rating_notes (rating_id, content, author_id, is_private)
             VALUES ($1, $2, $3, $4)
             RETURNING {NOTE_COLUMNS}"
        );
        sqlx::query_as::<_, RatingNote>(&query)
            .bind(rating_id)
            .bind(content)
            .bind(author_id)
            .bind(is_private)
            .fetch_one(&mut **tx)
            .await
    }

    /// Recompute the usage statistics stored on the skill row.
    async fn refresh_skill_stats(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        skill_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE skills SET
                total_users = agg.total_users,
                average_progress = agg.average_progress,
                completion_rate = CASE WHEN agg.total_users = 0 THEN 0
                    ELSE agg.completed_users::FLOAT8 / agg.total_users * 100 END,
                average_rating = agg.average_rating,
                total_ratings = agg.total_ratings
             FROM (
                SELECT COUNT(DISTINCT user_id) AS total_users,
                       COUNT(DISTINCT user_id) FILTER (WHERE status = 'completed') AS completed_users,
                       COALESCE(AVG(progress), 0)::FLOAT8 AS average_progress,
                       COALESCE(AVG(rating), 0)::FLOAT8 AS average_rating,
                       COUNT(*) AS total_ratings
                FROM user_skill_ratings WHERE skill_id = $1
             ) AS agg
             WHERE skills.id = $1",
        )
        .bind(skill_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Create or update the rating for `(user_id, skill_id, class_id)`.
    ///
    /// On update the rating, rater, progress, status and tree are replaced;
    /// a new rating starts `active` at progress 0 unless given otherwise.
    /// Mastery is recomputed either way. `notes`, when given, is appended as
    /// a rating note.
    pub async fn upsert(
        pool: &PgPool,
        input: &UpsertSkillRating,
        rated_by: DbId,
    ) -> Result<SkillRating, DbError> {
        skill_rating::validate_rating(input.rating)?;
        if let Some(progress) = input.progress {
            skill_rating::validate_progress(progress)?;
        }
        if !UserRepo::exists(pool, input.user_id).await? {
            return Err(not_found("User", input.user_id));
        }
        if !SkillRepo::exists(pool, input.skill_id).await? {
            return Err(not_found("Skill", input.skill_id));
        }
        if !ClassRepo::exists(pool, input.class_id).await? {
            return Err(not_found("Class", input.class_id));
        }
        if let Some(tree_id) = input.skill_tree_id {
            if !SkillTreeRepo::exists(pool, tree_id).await? {
                return Err(not_found("SkillTree", tree_id));
            }
        }

        let mut tx = pool.begin().await?;
        let now = Utc::now();

        let query = format!(
            "SELECT {COLUMNS} FROM user_skill_ratings
             WHERE user_id = $1 AND skill_id = $2 AND class_id = $3
             FOR UPDATE"
        );
        let existing = sqlx::query_as::<_, SkillRating>(&query)
            .bind(input.user_id)
            .bind(input.skill_id)
            .bind(input.class_id)
            .fetch_optional(&mut *tx)
            .await?;

        let rating = match existing {
            Some(row) => {
                let mut lifecycle = RatingLifecycle::load(row.to_state()?);
                lifecycle.set_rating(input.rating, rated_by);
                if let Some(progress) = input.progress {
                    lifecycle.set_progress(progress);
                }
                if let Some(status) = input.status {
                    lifecycle.set_status(status);
                }
                lifecycle.prepare_save(now);

                let mut rating = Self::write_state(&mut tx, row.id, lifecycle.state()).await?;
                if input.skill_tree_id.is_some() {
                    let query = format!(
                        "UPDATE user_skill_ratings SET skill_tree_id = $2 WHERE id = $1
                         RETURNING {COLUMNS}"
                    );
                    rating = sqlx::query_as::<_, SkillRating>(&query)
                        .bind(row.id)
                        .bind(input.skill_tree_id)
                        .fetch_one(&mut *tx)
                        .await?;
                }
                rating
            }
            None => {
                let mut lifecycle =
                    RatingLifecycle::create(RatingState::new(input.rating, rated_by, now));
                if let Some(progress) = input.progress {
                    lifecycle.set_progress(progress);
                }
                if let Some(status) = input.status {
                    lifecycle.set_status(status);
                }
                lifecycle.prepare_save(now);
                let state = lifecycle.into_state();

                let query = format!(
                    "INSERT INTO user_skill_ratings
                        (user_id, skill_id, skill_tree_id, class_id, rated_by, rating, progress,
                         mastery_level, status, completed_at, last_practiced_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, SkillRating>(&query)
                    .bind(input.user_id)
                    .bind(input.skill_id)
                    .bind(input.skill_tree_id)
                    .bind(input.class_id)
                    .bind(state.rated_by)
                    .bind(state.rating)
                    .bind(state.progress)
                    .bind(state.mastery_level.as_str())
                    .bind(state.status.as_str())
                    .bind(state.completed_at)
                    .bind(state.last_practiced_at)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        if let Some(notes) = input.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            Self::append_note(&mut tx, rating.id, notes, rated_by, false).await?;
        }
        Self::refresh_skill_stats(&mut tx, rating.skill_id).await?;

        tx.commit().await?;
        Ok(rating)
    }

    /// Apply one lifecycle transition under the rating's row lock.
    pub async fn apply_lifecycle(
        pool: &PgPool,
        id: DbId,
        transition: &RatingTransition,
        author_id: DbId,
    ) -> Result<SkillRating, DbError> {
        let mut tx = pool.begin().await?;
        let row = Self::lock(&mut tx, id).await?;

        let mut lifecycle = RatingLifecycle::load(row.to_state()?);
        let note = transition.apply(&mut lifecycle)?;
        lifecycle.prepare_save(Utc::now());

        let rating = Self::write_state(&mut tx, id, lifecycle.state()).await?;
        Self::append_note(&mut tx, id, &note, author_id, false).await?;
        Self::refresh_skill_stats(&mut tx, rating.skill_id).await?;

        tx.commit().await?;
        Ok(rating)
    }

    /// Record an assessment. A result above the current progress raises the
    /// progress to the assessment percentage.
    pub async fn add_assessment(
        pool: &PgPool,
        rating_id: DbId,
        input: &CreateAssessment,
        assessed_by: DbId,
    ) -> Result<Assessment, DbError> {
        if input.title.trim().is_empty() {
            return Err(CoreError::Validation("Assessment title is required".into()).into());
        }
        let assessment_type = AssessmentType::parse(&input.assessment_type)?;
        let max_score = input.max_score.unwrap_or(skill_rating::DEFAULT_MAX_SCORE);
        skill_rating::validate_assessment_score(input.score, max_score)?;

        let mut tx = pool.begin().await?;
        let row = Self::lock(&mut tx, rating_id).await?;

        let query = format!(
            "INSERT INTO rating_assessments
                (rating_id, title, score, max_score, assessment_type, feedback, assessed_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ASSESSMENT_COLUMNS}"
        );
        let assessment = sqlx::query_as::<_, Assessment>(&query)
            .bind(rating_id)
            .bind(input.title.trim())
            .bind(input.score)
            .bind(max_score)
            .bind(assessment_type.as_str())
            .bind(&input.feedback)
            .bind(assessed_by)
            .fetch_one(&mut *tx)
            .await?;

        let percentage = skill_rating::assessment_progress(input.score, max_score);
        if percentage > row.progress {
            let now = Utc::now();
            let mut lifecycle = RatingLifecycle::load(row.to_state()?);
            lifecycle.update_progress(percentage, 0, now)?;
            lifecycle.prepare_save(now);
            Self::write_state(&mut tx, rating_id, lifecycle.state()).await?;
            Self::refresh_skill_stats(&mut tx, row.skill_id).await?;
        }

        tx.commit().await?;
        Ok(assessment)
    }

    pub async fn add_note(
        pool: &PgPool,
        rating_id: DbId,
        input: &CreateRatingNote,
        author_id: DbId,
    ) -> Result<RatingNote, DbError> {
        if input.content.trim().is_empty() {
            return Err(CoreError::Validation("Note content is required".into()).into());
        }
        let mut tx = pool.begin().await?;
        Self::lock(&mut tx, rating_id).await?;
        let note =
            Self::append_note(&mut tx, rating_id, input.content.trim(), author_id, input.is_private)
                .await?;
        tx.commit().await?;
        Ok(note)
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    /// Shared filtered list over the joined view. `anchor` is the leading
    /// condition, bound as `$1`.
    async fn list_view(
        pool: &PgPool,
        anchor: &str,
        anchor_id: Option<DbId>,
        filter: &RatingFilter,
        order_by: &str,
    ) -> Result<(Vec<SkillRatingView>, i64), sqlx::Error> {
        let mut conditions = vec![anchor.to_string()];
        let mut bind_idx: u32 = if anchor_id.is_some() { 2 } else { 1 };

        if filter.status.is_some() {
            conditions.push(format!("r.status = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.is_archived.is_some() {
            conditions.push(format!("r.is_archived = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.skill_tree_id.is_some() {
            conditions.push(format!("r.skill_tree_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.class_id.is_some() {
            conditions.push(format!("r.class_id = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));
        let query = format!(
            "{VIEW_SELECT} {where_clause} ORDER BY {order_by} \
             LIMIT ${bind_idx} OFFSET ${next_idx}",
            next_idx = bind_idx + 1,
        );
        let count_query = format!("SELECT COUNT(*) FROM user_skill_ratings r {where_clause}");

        let mut q = sqlx::query_as::<_, SkillRatingView>(&query);
        let mut count = sqlx::query_scalar::<_, i64>(&count_query);

        if let Some(id) = anchor_id {
            q = q.bind(id);
            count = count.bind(id);
        }
        if let Some(ref status) = filter.status {
            q = q.bind(status);
            count = count.bind(status);
        }
        if let Some(is_archived) = filter.is_archived {
            q = q.bind(is_archived);
            count = count.bind(is_archived);
        }
        for id in [filter.skill_tree_id, filter.class_id].into_iter().flatten() {
            q = q.bind(id);
            count = count.bind(id);
        }

        let ratings = q.bind(filter.limit).bind(filter.offset).fetch_all(pool).await?;
        let total = count.fetch_one(pool).await?;
        Ok((ratings, total))
    }

    /// A user's ratings, most recently updated first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        filter: &RatingFilter,
    ) -> Result<(Vec<SkillRatingView>, i64), sqlx::Error> {
        Self::list_view(
            pool,
            "r.user_id = $1",
            Some(user_id),
            filter,
            "r.updated_at DESC, r.id DESC",
        )
        .await
    }

    /// A user's archived ratings, most recently archived first.
    pub async fn list_archived_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SkillRatingView>, i64), sqlx::Error> {
        let filter = RatingFilter {
            is_archived: Some(true),
            limit,
            offset,
            ..Default::default()
        };
        Self::list_view(
            pool,
            "r.user_id = $1",
            Some(user_id),
            &filter,
            "r.archived_at DESC NULLS LAST, r.id DESC",
        )
        .await
    }

    /// Ratings of one skill, highest rating first.
    pub async fn list_by_skill(
        pool: &PgPool,
        skill_id: DbId,
        filter: &RatingFilter,
    ) -> Result<(Vec<SkillRatingView>, i64), sqlx::Error> {
        Self::list_view(
            pool,
            "r.skill_id = $1",
            Some(skill_id),
            filter,
            "r.rating DESC, r.progress DESC, r.id",
        )
        .await
    }

    /// Completed ratings across all users, most recently completed first.
    pub async fn list_completed(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SkillRatingView>, i64), sqlx::Error> {
        let filter = RatingFilter {
            limit,
            offset,
            ..Default::default()
        };
        Self::list_view(
            pool,
            "r.status = 'completed'",
            None,
            &filter,
            "r.completed_at DESC NULLS LAST, r.id DESC",
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    pub async fn user_stats(pool: &PgPool, user_id: DbId) -> Result<UserSkillStats, sqlx::Error> {
        sqlx::query_as::<_, UserSkillStats>(
            "SELECT COUNT(*) AS total_skills,
                    COUNT(*) FILTER (WHERE status IN ('active', 'in_progress')) AS active_skills,
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed_skills,
                    COUNT(*) FILTER (WHERE is_archived) AS archived_skills,
                    COALESCE(AVG(rating), 0)::FLOAT8 AS average_rating,
                    COALESCE(AVG(progress), 0)::FLOAT8 AS average_progress,
                    COALESCE(SUM(time_spent), 0)::BIGINT AS total_time_spent
             FROM user_skill_ratings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn skill_stats(
        pool: &PgPool,
        skill_id: DbId,
    ) -> Result<SkillRatingStats, sqlx::Error> {
        sqlx::query_as::<_, SkillRatingStats>(
            "SELECT COUNT(DISTINCT user_id) AS total_users,
                    COALESCE(AVG(rating), 0)::FLOAT8 AS average_rating,
                    COALESCE(AVG(progress), 0)::FLOAT8 AS average_progress,
                    COUNT(DISTINCT user_id) FILTER (WHERE status = 'completed') AS completed_users,
                    COUNT(DISTINCT user_id) FILTER (WHERE is_archived) AS archived_users
             FROM user_skill_ratings WHERE skill_id = $1",
        )
        .bind(skill_id)
        .fetch_one(pool)
        .await
    }
}

fn not_found(entity: &'static str, id: DbId) -> DbError {
    CoreError::NotFound { entity, id }.into()
}
