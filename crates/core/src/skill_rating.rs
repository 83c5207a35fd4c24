//! Skill-rating lifecycle: rating, progress, archive, completion, mastery.
//!
//! A [`RatingLifecycle`] wraps the mutable state of one rating row and keeps
//! track of which fields a mutation touched. [`RatingLifecycle::prepare_save`]
//! applies the derived-field rules right before the row is written:
//!
//! - `completed_at` is stamped when the status moved to `completed` and no
//!   completion time was recorded yet.
//! - `archived_at` is stamped when the archive flag was set and no archive
//!   time was recorded yet.
//! - `mastery_level` is recomputed when rating or progress changed.

use serde::{Deserialize, Serialize};

use crate::class::clamp_progress;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 10;

/// Default `max_score` of an assessment.
pub const DEFAULT_MAX_SCORE: f64 = 100.0;

// ---------------------------------------------------------------------------
// Vocabularies
// ---------------------------------------------------------------------------

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Result<Self, CoreError> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::Validation(format!(
                        "Invalid {} '{}'. Must be one of: {}",
                        $label,
                        other,
                        Self::ALL.join(", ")
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    RatingStatus("status") {
        Active => "active",
        InProgress => "in_progress",
        Completed => "completed",
        Archived => "archived",
        Paused => "paused",
    }
}

string_enum! {
    ArchiveReason("archive reason") {
        NotInterested => "not_interested",
        TooDifficult => "too_difficult",
        NotRelevant => "not_relevant",
        CompletedElsewhere => "completed_elsewhere",
        Other => "other",
    }
}

string_enum! {
    AssessmentType("assessment type") {
        Quiz => "quiz",
        Project => "project",
        Assignment => "assignment",
        Certification => "certification",
        Practice => "practice",
    }
}

string_enum! {
    MasteryLevel("mastery level") {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
}

impl MasteryLevel {
    /// Thresholds are checked from the top: 9/90 expert, 7/70 advanced,
    /// 5/50 intermediate, anything else beginner.
    pub fn from_scores(rating: i32, progress: f64) -> Self {
        if rating >= 9 && progress >= 90.0 {
            MasteryLevel::Expert
        } else if rating >= 7 && progress >= 70.0 {
            MasteryLevel::Advanced
        } else if rating >= 5 && progress >= 50.0 {
            MasteryLevel::Intermediate
        } else {
            MasteryLevel::Beginner
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_rating(rating: i32) -> Result<(), CoreError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::Validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

/// Explicit progress updates must already be a valid percentage.
pub fn validate_progress(progress: f64) -> Result<(), CoreError> {
    if !(0.0..=100.0).contains(&progress) {
        return Err(CoreError::Validation(
            "Progress must be between 0 and 100".into(),
        ));
    }
    Ok(())
}

pub fn validate_assessment_score(score: f64, max_score: f64) -> Result<(), CoreError> {
    if max_score <= 0.0 {
        return Err(CoreError::Validation(
            "Max score must be greater than 0".into(),
        ));
    }
    if score < 0.0 || score > max_score {
        return Err(CoreError::Validation(
            "Score must be between 0 and max score".into(),
        ));
    }
    Ok(())
}

/// Percentage an assessment result represents.
pub fn assessment_progress(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    score / max_score * 100.0
}

/// Rounded mean percentage across `(score, max_score)` pairs, 0 when empty.
pub fn average_assessment_score(results: &[(f64, f64)]) -> i64 {
    if results.is_empty() {
        return 0;
    }
    let total: f64 = results
        .iter()
        .map(|(score, max)| assessment_progress(*score, *max))
        .sum();
    (total / results.len() as f64).round() as i64
}

/// Share of completed users as a percentage, 0 when there are no users.
pub fn completion_rate(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Mutable state of one rating row.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingState {
    pub rating: i32,
    pub progress: f64,
    pub mastery_level: MasteryLevel,
    pub status: RatingStatus,
    pub is_archived: bool,
    pub archive_reason: Option<ArchiveReason>,
    pub archive_notes: Option<String>,
    pub archived_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub last_practiced_at: Option<Timestamp>,
    /// Minutes.
    pub time_spent: i32,
    pub rated_by: DbId,
}

impl RatingState {
    /// State of a brand-new rating before any lifecycle rules ran.
    pub fn new(rating: i32, rated_by: DbId, now: Timestamp) -> Self {
        Self {
            rating,
            progress: 0.0,
            mastery_level: MasteryLevel::Beginner,
            status: RatingStatus::Active,
            is_archived: false,
            archive_reason: None,
            archive_notes: None,
            archived_at: None,
            completed_at: None,
            last_practiced_at: Some(now),
            time_spent: 0,
            rated_by,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Touched {
    rating: bool,
    progress: bool,
    status: bool,
    archived: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingLifecycle {
    state: RatingState,
    touched: Touched,
}

impl RatingLifecycle {
    /// Wrap a state loaded from storage. Nothing counts as modified yet.
    pub fn load(state: RatingState) -> Self {
        Self {
            state,
            touched: Touched::default(),
        }
    }

    /// Wrap a state that has never been stored. Every field counts as modified.
    pub fn create(state: RatingState) -> Self {
        Self {
            state,
            touched: Touched {
                rating: true,
                progress: true,
                status: true,
                archived: true,
            },
        }
    }

    pub fn state(&self) -> &RatingState {
        &self.state
    }

    pub fn into_state(self) -> RatingState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state.status == RatingStatus::Completed || self.state.progress >= 100.0
    }

    /// Overwrite the rating. The value must already be validated.
    pub fn set_rating(&mut self, rating: i32, rated_by: DbId) {
        self.state.rating = rating;
        self.state.rated_by = rated_by;
        self.touched.rating = true;
    }

    /// Set the rating, clamped to `1..=10`.
    pub fn update_rating(&mut self, rating: i32, rated_by: DbId) {
        self.set_rating(rating.clamp(MIN_RATING, MAX_RATING), rated_by);
    }

    /// Set progress, clamped to `[0, 100]`, without touching status.
    pub fn set_progress(&mut self, progress: f64) {
        self.state.progress = clamp_progress(progress);
        self.touched.progress = true;
    }

    pub fn set_status(&mut self, status: RatingStatus) {
        self.state.status = status;
        self.touched.status = true;
    }

    /// Record practice: clamp progress, add time, stamp `last_practiced_at`.
    /// Reaching 100 completes the rating. Negative `time_spent` is rejected
    /// and leaves the rating untouched.
    pub fn update_progress(
        &mut self,
        progress: f64,
        time_spent: i32,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        if time_spent < 0 {
            return Err(CoreError::Validation(
                "time_spent must not be negative".into(),
            ));
        }
        self.set_progress(progress);
        self.state.time_spent = self.state.time_spent.saturating_add(time_spent);
        self.state.last_practiced_at = Some(now);
        if self.state.progress >= 100.0 {
            self.set_status(RatingStatus::Completed);
            self.state.completed_at = Some(now);
        }
        Ok(())
    }

    pub fn archive(&mut self, reason: ArchiveReason, notes: Option<String>, now: Timestamp) {
        self.state.is_archived = true;
        self.touched.archived = true;
        self.set_status(RatingStatus::Archived);
        self.state.archive_reason = Some(reason);
        self.state.archive_notes = notes;
        self.state.archived_at = Some(now);
    }

    /// Clear the archive fields and return to `active`, whatever the status
    /// was before archiving.
    pub fn unarchive(&mut self) -> Result<(), CoreError> {
        if !self.state.is_archived {
            return Err(CoreError::Validation("Skill is not archived".into()));
        }
        self.state.is_archived = false;
        self.touched.archived = true;
        self.set_status(RatingStatus::Active);
        self.state.archive_reason = None;
        self.state.archive_notes = None;
        self.state.archived_at = None;
        Ok(())
    }

    pub fn complete(&mut self, now: Timestamp) {
        self.set_status(RatingStatus::Completed);
        self.set_progress(100.0);
        self.state.completed_at = Some(now);
    }

    /// Apply derived-field rules and clear the modification flags.
    pub fn prepare_save(&mut self, now: Timestamp) {
        if self.touched.status
            && self.state.status == RatingStatus::Completed
            && self.state.completed_at.is_none()
        {
            self.state.completed_at = Some(now);
        }
        if self.touched.archived && self.state.is_archived && self.state.archived_at.is_none() {
            self.state.archived_at = Some(now);
        }
        if self.touched.rating || self.touched.progress {
            self.state.mastery_level =
                MasteryLevel::from_scores(self.state.rating, self.state.progress);
        }
        self.touched = Touched::default();
    }
}

/// Text of the note appended when a rating is archived.
pub fn archive_note(reason: ArchiveReason, notes: Option<&str>) -> String {
    format!("Skill archived: {reason}. {}", notes.unwrap_or_default())
        .trim_end()
        .to_string()
}

pub const UNARCHIVE_NOTE: &str = "Skill unarchived";

/// Text of the note appended after an explicit progress update.
pub fn progress_note(progress: f64) -> String {
    format!("Progress updated to {progress}%")
}
