//! Repository for classes, their tree links, teachers and roster.
//!
//! Roster changes lock the class row, load every student into a
//! [`ClassRoster`], apply one operation and write back the touched entry plus
//! the recomputed `enrolled_students`.

use std::collections::HashMap;

use chrono::Utc;
use skillforge_core::class::{
    self, ClassRoster, CompletedSkillTree, RosterEntry, StudentStatus,
};
use skillforge_core::error::CoreError;
use skillforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::class::{
    Class, ClassDetail, ClassFilter, ClassSkillTreeLink, ClassStudent, ClassTreeLinkInput,
    CompletedTreeRow, CreateClass, StudentEntry, UpdateClass,
};
use crate::repositories::UserRepo;
use crate::DbError;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, code, class_type, level, status, objectives, \
    duration, max_students, enrolled_students, schedule, settings, tags, created_by, \
    created_at, updated_at";

/// Provides class and enrollment operations.
pub struct ClassRepo;

impl ClassRepo {
    /// Insert a class with its tree links and teachers.
    ///
    /// The code is stored uppercased. Callers check [`Self::code_taken`]
    /// first; the unique constraint remains the backstop.
    pub async fn create(
        pool: &PgPool,
        input: &CreateClass,
        created_by: DbId,
    ) -> Result<Class, DbError> {
        let code = class::normalize_code(&input.code)?;
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO classes
                (name, description, code, class_type, level, status, objectives, duration,
                 max_students, schedule, settings, tags, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {COLUMNS}"
        );
        let class = sqlx::query_as::<_, Class>(&query)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(&code)
            .bind(input.class_type.as_deref().unwrap_or(class::DEFAULT_CLASS_TYPE))
            .bind(input.level.as_deref().unwrap_or("beginner"))
            .bind(input.status.as_deref().unwrap_or(class::DEFAULT_CLASS_STATUS))
            .bind(&input.objectives)
            .bind(input.duration)
            .bind(input.max_students.unwrap_or(class::DEFAULT_MAX_STUDENTS))
            .bind(
                input
                    .schedule
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({})),
            )
            .bind(
                input
                    .settings
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({})),
            )
            .bind(&input.tags)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        Self::insert_tree_links(&mut tx, class.id, &input.skill_trees).await?;
        for &teacher_id in &input.teachers {
            sqlx::query(
                "INSERT INTO class_teachers (class_id, user_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(class.id)
            .bind(teacher_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(class)
    }

    async fn insert_tree_links(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        class_id: DbId,
        links: &[ClassTreeLinkInput],
    ) -> Result<(), sqlx::Error> {
        for (index, link) in links.iter().enumerate() {
            sqlx::query(
                "INSERT INTO class_skill_trees (class_id, skill_tree_id, level, sort_order, is_required)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (class_id, skill_tree_id) DO UPDATE SET
                    level = EXCLUDED.level,
                    sort_order = EXCLUDED.sort_order,
                    is_required = EXCLUDED.is_required",
            )
            .bind(class_id)
            .bind(link.skill_tree_id)
            .bind(link.level.as_deref().unwrap_or(class::DEFAULT_TREE_LINK_LEVEL))
            .bind(link.sort_order.unwrap_or(index as i32))
            .bind(link.is_required.unwrap_or(true))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Class>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM classes WHERE id = $1");
        sqlx::query_as::<_, Class>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM classes WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Whether another class already uses the normalized `code`.
    pub async fn code_taken(
        pool: &PgPool,
        code: &str,
        exclude_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM classes WHERE code = $1 AND ($2::BIGINT IS NULL OR id <> $2)
             )",
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    /// Filtered page of classes, newest first, plus the total match count.
    pub async fn list(
        pool: &PgPool,
        filter: &ClassFilter,
    ) -> Result<(Vec<Class>, i64), sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.search.is_some() {
            conditions.push(format!(
                "(name ILIKE ${bind_idx} OR description ILIKE ${bind_idx} OR code ILIKE ${bind_idx})"
            ));
            bind_idx += 1;
        }
        if filter.class_type.is_some() {
            conditions.push(format!("class_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.level.is_some() {
            conditions.push(format!("level = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.teacher_id.is_some() {
            conditions.push(format!(
                "id IN (SELECT class_id FROM class_teachers WHERE user_id = ${bind_idx})"
            ));
            bind_idx += 1;
        }
        if filter.skill_tree_id.is_some() {
            conditions.push(format!(
                "id IN (SELECT class_id FROM class_skill_trees WHERE skill_tree_id = ${bind_idx})"
            ));
            bind_idx += 1;
        }
        if filter.student_id.is_some() {
            conditions.push(format!(
                "id IN (SELECT class_id FROM class_students WHERE user_id = ${bind_idx})"
            ));
            bind_idx += 1;
        }
        if filter.tag.is_some() {
            conditions.push(format!("${bind_idx} = ANY(tags)"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM classes {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${next_idx}",
            next_idx = bind_idx + 1,
        );
        let count_query = format!("SELECT COUNT(*) FROM classes {where_clause}");

        let mut q = sqlx::query_as::<_, Class>(&query);
        let mut count = sqlx::query_scalar::<_, i64>(&count_query);

        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            q = q.bind(pattern.clone());
            count = count.bind(pattern);
        }
        for value in [&filter.class_type, &filter.level, &filter.status]
            .into_iter()
            .flatten()
        {
            q = q.bind(value);
            count = count.bind(value);
        }
        for id in [filter.teacher_id, filter.skill_tree_id, filter.student_id]
            .into_iter()
            .flatten()
        {
            q = q.bind(id);
            count = count.bind(id);
        }
        if let Some(ref tag) = filter.tag {
            q = q.bind(tag);
            count = count.bind(tag);
        }

        let classes = q.bind(filter.limit).bind(filter.offset).fetch_all(pool).await?;
        let total = count.fetch_one(pool).await?;
        Ok((classes, total))
    }

    /// A class with its tree links, teachers and roster.
    pub async fn find_detail(pool: &PgPool, id: DbId) -> Result<Option<ClassDetail>, DbError> {
        let Some(class) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let skill_trees = sqlx::query_as::<_, ClassSkillTreeLink>(
            "SELECT cst.skill_tree_id, t.name, t.tree_type, cst.level, cst.sort_order, cst.is_required
             FROM class_skill_trees cst
             JOIN skill_trees t ON t.id = cst.skill_tree_id
             WHERE cst.class_id = $1
             ORDER BY cst.sort_order, cst.skill_tree_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let teacher_ids: Vec<DbId> = sqlx::query_scalar(
            "SELECT user_id FROM class_teachers WHERE class_id = $1 ORDER BY created_at, user_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        let teachers = UserRepo::summaries(pool, &teacher_ids).await?;

        let mut conn = pool.acquire().await?;
        let roster = Self::load_roster(&mut conn, id).await?;
        drop(conn);
        let user_ids: Vec<DbId> = roster.entries().iter().map(|e| e.user_id).collect();
        let mut users: HashMap<_, _> = UserRepo::summaries(pool, &user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        let students = roster
            .entries()
            .iter()
            .map(|entry| StudentEntry::from_entry(entry, users.remove(&entry.user_id)))
            .collect();

        Ok(Some(ClassDetail {
            class,
            skill_trees,
            teachers,
            students,
        }))
    }

    /// Update class fields. Only non-`None` fields in `input` are applied.
    /// A present `skill_trees` list replaces every existing link.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateClass,
    ) -> Result<Option<Class>, DbError> {
        let code = input
            .code
            .as_deref()
            .map(class::normalize_code)
            .transpose()?;
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE classes SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                code = COALESCE($4, code),
                class_type = COALESCE($5, class_type),
                level = COALESCE($6, level),
                status = COALESCE($7, status),
                objectives = COALESCE($8, objectives),
                duration = COALESCE($9, duration),
                max_students = COALESCE($10, max_students),
                schedule = COALESCE($11, schedule),
                settings = COALESCE($12, settings),
                tags = COALESCE($13, tags)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let Some(class) = sqlx::query_as::<_, Class>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&code)
            .bind(&input.class_type)
            .bind(&input.level)
            .bind(&input.status)
            .bind(&input.objectives)
            .bind(input.duration)
            .bind(input.max_students)
            .bind(&input.schedule)
            .bind(&input.settings)
            .bind(&input.tags)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if let Some(ref links) = input.skill_trees {
            sqlx::query("DELETE FROM class_skill_trees WHERE class_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::insert_tree_links(&mut tx, id, links).await?;
        }

        tx.commit().await?;
        Ok(Some(class))
    }

    /// Delete a class. Refused while a room is linked to it; roster,
    /// teachers, tree links and ratings cascade.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, DbError> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> =
            sqlx::query_scalar("SELECT id FROM classes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let linked_rooms: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE class_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if linked_rooms > 0 {
            return Err(CoreError::Validation(format!(
                "Class is linked to {linked_rooms} room(s) and cannot be deleted"
            ))
            .into());
        }

        sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    async fn load_roster(
        conn: &mut sqlx::PgConnection,
        class_id: DbId,
    ) -> Result<ClassRoster, DbError> {
        let students = sqlx::query_as::<_, ClassStudent>(
            "SELECT class_id, user_id, status, progress, enrolled_at
             FROM class_students WHERE class_id = $1
             ORDER BY enrolled_at, user_id",
        )
        .bind(class_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut completed: HashMap<DbId, Vec<CompletedSkillTree>> = HashMap::new();
        for row in sqlx::query_as::<_, CompletedTreeRow>(
            "SELECT class_id, user_id, skill_tree_id, completed_at, score, feedback
             FROM class_student_completed_trees WHERE class_id = $1
             ORDER BY completed_at, skill_tree_id",
        )
        .bind(class_id)
        .fetch_all(&mut *conn)
        .await?
        {
            completed.entry(row.user_id).or_default().push(row.into());
        }

        let entries = students
            .into_iter()
            .map(|s| {
                Ok(RosterEntry {
                    user_id: s.user_id,
                    status: s.student_status()?,
                    progress: s.progress,
                    enrolled_at: s.enrolled_at,
                    completed_skill_trees: completed.remove(&s.user_id).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        Ok(ClassRoster::new(entries))
    }

    /// Lock the class row and return `(max_students, enrolled_students)`.
    async fn lock_class(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        class_id: DbId,
    ) -> Result<(i32, i32), DbError> {
        sqlx::query_as::<_, (i32, i32)>(
            "SELECT max_students, enrolled_students FROM classes WHERE id = $1 FOR UPDATE",
        )
        .bind(class_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "Class",
                id: class_id,
            }
            .into()
        })
    }

    async fn write_enrolled_count(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        class_id: DbId,
        roster: &ClassRoster,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE classes SET enrolled_students = $2 WHERE id = $1")
            .bind(class_id)
            .bind(roster.enrolled_count())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Enroll `user_id`, or refresh the status and enrollment time of a
    /// student already on the roster.
    ///
    /// Capacity is checked against the stored count under the class row
    /// lock, so concurrent enrollments serialize and cannot overshoot
    /// `max_students`.
    pub async fn enroll_student(
        pool: &PgPool,
        class_id: DbId,
        user_id: DbId,
        status: StudentStatus,
    ) -> Result<RosterEntry, DbError> {
        if !UserRepo::exists(pool, user_id).await? {
            return Err(CoreError::NotFound {
                entity: "User",
                id: user_id,
            }
            .into());
        }

        let mut tx = pool.begin().await?;
        let (max_students, enrolled_students) = Self::lock_class(&mut tx, class_id).await?;
        class::ensure_capacity(enrolled_students, max_students)?;

        let mut roster = Self::load_roster(&mut *tx, class_id).await?;
        let entry = roster.add_student(user_id, status, Utc::now()).clone();

        sqlx::query(
            "INSERT INTO class_students (class_id, user_id, status, progress, enrolled_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (class_id, user_id) DO UPDATE SET
                status = EXCLUDED.status,
                enrolled_at = EXCLUDED.enrolled_at",
        )
        .bind(class_id)
        .bind(user_id)
        .bind(entry.status.as_str())
        .bind(entry.progress)
        .bind(entry.enrolled_at)
        .execute(&mut *tx)
        .await?;
        Self::write_enrolled_count(&mut tx, class_id, &roster).await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Drop a student from the roster. Returns `false` when the user was not
    /// enrolled.
    pub async fn remove_student(
        pool: &PgPool,
        class_id: DbId,
        user_id: DbId,
    ) -> Result<bool, DbError> {
        let mut tx = pool.begin().await?;
        Self::lock_class(&mut tx, class_id).await?;

        let mut roster = Self::load_roster(&mut *tx, class_id).await?;
        if !roster.remove_student(user_id) {
            tracing::warn!(class_id, user_id, "Student not on roster, nothing to remove");
            return Ok(false);
        }

        sqlx::query("DELETE FROM class_students WHERE class_id = $1 AND user_id = $2")
            .bind(class_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        Self::write_enrolled_count(&mut tx, class_id, &roster).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Set a student's progress (clamped to `[0, 100]`). The completed-tree
    /// records are replaced only when `completed` is non-empty.
    ///
    /// Returns `None` when the user is not on the roster.
    pub async fn update_student_progress(
        pool: &PgPool,
        class_id: DbId,
        user_id: DbId,
        progress: f64,
        completed: Vec<CompletedSkillTree>,
    ) -> Result<Option<RosterEntry>, DbError> {
        let replace_completed = !completed.is_empty();
        let mut tx = pool.begin().await?;
        Self::lock_class(&mut tx, class_id).await?;

        let mut roster = Self::load_roster(&mut *tx, class_id).await?;
        let Some(entry) = roster
            .update_student_progress(user_id, progress, completed)
            .cloned()
        else {
            tracing::warn!(class_id, user_id, "Student not on roster, progress not updated");
            return Ok(None);
        };

        sqlx::query("UPDATE class_students SET progress = $3 WHERE class_id = $1 AND user_id = $2")
            .bind(class_id)
            .bind(user_id)
            .bind(entry.progress)
            .execute(&mut *tx)
            .await?;

        if replace_completed {
            sqlx::query(
                "DELETE FROM class_student_completed_trees WHERE class_id = $1 AND user_id = $2",
            )
            .bind(class_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            for tree in &entry.completed_skill_trees {
                sqlx::query(
                    "INSERT INTO class_student_completed_trees
                        (class_id, user_id, skill_tree_id, completed_at, score, feedback)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     ON CONFLICT (class_id, user_id, skill_tree_id) DO UPDATE SET
                        completed_at = EXCLUDED.completed_at,
                        score = EXCLUDED.score,
                        feedback = EXCLUDED.feedback",
                )
                .bind(class_id)
                .bind(user_id)
                .bind(tree.skill_tree_id)
                .bind(tree.completed_at)
                .bind(tree.score)
                .bind(&tree.feedback)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(Some(entry))
    }

    /// Roster status of `user_id` in `class_id`, if enrolled at all.
    pub async fn student_status(
        pool: &PgPool,
        class_id: DbId,
        user_id: DbId,
    ) -> Result<Option<StudentStatus>, DbError> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM class_students WHERE class_id = $1 AND user_id = $2",
        )
        .bind(class_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(status.as_deref().map(StudentStatus::parse).transpose()?)
    }

    // -----------------------------------------------------------------------
    // Teachers
    // -----------------------------------------------------------------------

    pub async fn assign_teacher(
        pool: &PgPool,
        class_id: DbId,
        teacher_id: DbId,
    ) -> Result<(), DbError> {
        if !UserRepo::exists(pool, teacher_id).await? {
            return Err(CoreError::NotFound {
                entity: "User",
                id: teacher_id,
            }
            .into());
        }

        let result = sqlx::query(
            "INSERT INTO class_teachers (class_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(class_id)
        .bind(teacher_id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(
                CoreError::Validation("Teacher is already assigned to this class".into()).into(),
            );
        }
        Ok(())
    }

    pub async fn remove_teacher(
        pool: &PgPool,
        class_id: DbId,
        teacher_id: DbId,
    ) -> Result<(), DbError> {
        let result =
            sqlx::query("DELETE FROM class_teachers WHERE class_id = $1 AND user_id = $2")
                .bind(class_id)
                .bind(teacher_id)
                .execute(pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(
                CoreError::Validation("Teacher is not assigned to this class".into()).into(),
            );
        }
        Ok(())
    }
}
