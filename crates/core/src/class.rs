//! Class enrollment rules.
//!
//! [`ClassRoster`] is the in-memory student list of one class. The repository
//! loads it under a row lock, applies one operation, and writes back the
//! touched entry together with [`ClassRoster::enrolled_count`]. The stored
//! `enrolled_students` column is always that recomputed count.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::validation::validate_one_of;

pub const CLASS_TYPES: &[&str] = &["course", "workshop", "seminar", "tutorial", "project", "other"];

/// Class lifecycle. New classes start `inactive`.
pub const CLASS_STATUSES: &[&str] = &["active", "inactive", "archived", "draft"];

/// Level at which a skill tree is taught in a class.
pub const TREE_LINK_LEVELS: &[&str] = &["basic", "intermediate", "advanced"];

pub const DEFAULT_CLASS_TYPE: &str = "course";
pub const DEFAULT_CLASS_STATUS: &str = "inactive";
pub const DEFAULT_TREE_LINK_LEVEL: &str = "basic";
pub const DEFAULT_MAX_STUDENTS: i32 = 50;

pub fn validate_class_type(class_type: &str) -> Result<(), CoreError> {
    validate_one_of("type", class_type, CLASS_TYPES)
}

pub fn validate_class_status(status: &str) -> Result<(), CoreError> {
    validate_one_of("status", status, CLASS_STATUSES)
}

pub fn validate_tree_link_level(level: &str) -> Result<(), CoreError> {
    validate_one_of("skill tree level", level, TREE_LINK_LEVELS)
}

pub fn validate_max_students(max_students: i32) -> Result<(), CoreError> {
    if max_students < 1 {
        return Err(CoreError::Validation(
            "max_students must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Trim and uppercase a class code. Codes are unique in this form.
pub fn normalize_code(code: &str) -> Result<String, CoreError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(CoreError::Validation("Class code is required".into()));
    }
    Ok(code.to_uppercase())
}

/// Reject enrollment when the stored count has reached capacity.
///
/// The check runs for every enrollment request, including a student who is
/// already on the roster.
pub fn ensure_capacity(enrolled_students: i32, max_students: i32) -> Result<(), CoreError> {
    if enrolled_students >= max_students {
        return Err(CoreError::Validation("Class is full".into()));
    }
    Ok(())
}

/// Progress is a percentage.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        return 0.0;
    }
    progress.clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Student status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Enrolled,
    Completed,
    Dropped,
    Pending,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Enrolled => "enrolled",
            StudentStatus::Completed => "completed",
            StudentStatus::Dropped => "dropped",
            StudentStatus::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "enrolled" => Ok(StudentStatus::Enrolled),
            "completed" => Ok(StudentStatus::Completed),
            "dropped" => Ok(StudentStatus::Dropped),
            "pending" => Ok(StudentStatus::Pending),
            other => Err(CoreError::Validation(format!(
                "Invalid student status '{other}'. Must be one of: enrolled, completed, dropped, pending"
            ))),
        }
    }

    /// Enrolled and completed students occupy a seat.
    pub fn counts_toward_enrollment(self) -> bool {
        matches!(self, StudentStatus::Enrolled | StudentStatus::Completed)
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSkillTree {
    pub skill_tree_id: DbId,
    pub completed_at: Timestamp,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub user_id: DbId,
    pub status: StudentStatus,
    pub progress: f64,
    pub enrolled_at: Timestamp,
    pub completed_skill_trees: Vec<CompletedSkillTree>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassRoster {
    entries: Vec<RosterEntry>,
}

impl ClassRoster {
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn get(&self, user_id: DbId) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.user_id == user_id)
    }

    /// Add a student, or update the status and enrollment time of one already
    /// on the roster. Progress and completed trees of an existing entry are
    /// kept. A user never appears twice.
    pub fn add_student(
        &mut self,
        user_id: DbId,
        status: StudentStatus,
        now: Timestamp,
    ) -> &RosterEntry {
        let index = match self.entries.iter().position(|e| e.user_id == user_id) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.status = status;
                entry.enrolled_at = now;
                i
            }
            None => {
                self.entries.push(RosterEntry {
                    user_id,
                    status,
                    progress: 0.0,
                    enrolled_at: now,
                    completed_skill_trees: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        &self.entries[index]
    }

    /// Drop every entry for `user_id`. Returns whether anything was removed.
    pub fn remove_student(&mut self, user_id: DbId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.user_id != user_id);
        self.entries.len() != before
    }

    /// Set a student's progress, clamped to `[0, 100]`. The completed-tree
    /// list is replaced only when `completed` is non-empty. Returns `None`
    /// when the user is not on the roster.
    pub fn update_student_progress(
        &mut self,
        user_id: DbId,
        progress: f64,
        completed: Vec<CompletedSkillTree>,
    ) -> Option<&RosterEntry> {
        let entry = self.entries.iter_mut().find(|e| e.user_id == user_id)?;
        entry.progress = clamp_progress(progress);
        if !completed.is_empty() {
            entry.completed_skill_trees = completed;
        }
        Some(&*entry)
    }

    /// Number of students occupying a seat.
    pub fn enrolled_count(&self) -> i32 {
        self.entries
            .iter()
            .filter(|e| e.status.counts_toward_enrollment())
            .count() as i32
    }
}
