//! Skill catalog vocabularies and validation rules.

use crate::error::CoreError;
use crate::types::DbId;
use crate::validation::{validate_one_of, validate_range};

// ---------------------------------------------------------------------------
// Vocabularies
// ---------------------------------------------------------------------------

/// Skill levels, also used for class levels and learning-path difficulty.
pub const SKILL_LEVELS: &[&str] = &["beginner", "intermediate", "advanced", "expert"];

pub const SKILL_TYPES: &[&str] = &[
    "technical",
    "soft",
    "domain",
    "tool",
    "framework",
    "language",
    "methodology",
];

pub const SKILL_STATUSES: &[&str] = &["active", "inactive", "deprecated", "emerging"];

pub const DEFAULT_LEVEL: &str = "beginner";
pub const DEFAULT_TYPE: &str = "technical";
pub const DEFAULT_STATUS: &str = "active";
pub const DEFAULT_COLOR: &str = "#3B82F6";

/// Default for both difficulty and market demand.
pub const DEFAULT_SCORE: i32 = 5;

/// Maximum length of `short_description`.
pub const MAX_SHORT_DESCRIPTION_LENGTH: usize = 200;

/// Default page size of the popular / high-demand listings.
pub const DEFAULT_HIGHLIGHT_LIMIT: i64 = 10;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_level(level: &str) -> Result<(), CoreError> {
    validate_one_of("level", level, SKILL_LEVELS)
}

pub fn validate_skill_type(skill_type: &str) -> Result<(), CoreError> {
    validate_one_of("type", skill_type, SKILL_TYPES)
}

pub fn validate_status(status: &str) -> Result<(), CoreError> {
    validate_one_of("status", status, SKILL_STATUSES)
}

pub fn validate_difficulty(difficulty: i32) -> Result<(), CoreError> {
    validate_range("difficulty", difficulty, 1, 10)
}

pub fn validate_market_demand(market_demand: i32) -> Result<(), CoreError> {
    validate_range("market_demand", market_demand, 1, 10)
}

/// Salary impact is a percentage.
pub fn validate_salary_impact(salary_impact: f64) -> Result<(), CoreError> {
    if (0.0..=100.0).contains(&salary_impact) {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "salary_impact must be between 0 and 100".into(),
        ))
    }
}

/// A skill cannot be its own prerequisite.
pub fn validate_prerequisite(skill_id: DbId, prerequisite_id: DbId) -> Result<(), CoreError> {
    if skill_id == prerequisite_id {
        return Err(CoreError::Validation(
            "Skill cannot be its own prerequisite".into(),
        ));
    }
    Ok(())
}

/// A skill cannot be related to itself.
pub fn validate_related(skill_id: DbId, related_id: DbId) -> Result<(), CoreError> {
    if skill_id == related_id {
        return Err(CoreError::Validation(
            "Skill cannot be related to itself".into(),
        ));
    }
    Ok(())
}

/// Map a `sort_by` query value to a column of the `skills` table.
///
/// The result is interpolated into SQL, so only whitelisted columns come
/// back. Missing or unknown keys sort by `name`.
pub fn sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by.unwrap_or("name") {
        "category" => "category",
        "level" => "level",
        "difficulty" => "difficulty",
        "popularity" => "popularity",
        "market_demand" | "marketDemand" => "market_demand",
        "created_at" | "createdAt" => "created_at",
        "updated_at" | "updatedAt" => "updated_at",
        _ => "name",
    }
}

/// `"asc"` unless the caller explicitly asked for `"desc"`.
pub fn sort_direction(sort_order: Option<&str>) -> &'static str {
    match sort_order {
        Some(o) if o.eq_ignore_ascii_case("desc") => "DESC",
        _ => "ASC",
    }
}

/// `"Category > Subcategory"`, or just the category.
pub fn category_path(category: &str, subcategory: Option<&str>) -> String {
    match subcategory.filter(|s| !s.is_empty()) {
        Some(sub) => format!("{category} > {sub}"),
        None => category.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn self_prerequisite_rejected() {
        assert_matches!(
            validate_prerequisite(4, 4),
            Err(CoreError::Validation(msg)) if msg == "Skill cannot be its own prerequisite"
        );
        assert!(validate_prerequisite(4, 5).is_ok());
    }

    #[test]
    fn self_relation_rejected() {
        assert!(validate_related(1, 1).is_err());
        assert!(validate_related(1, 2).is_ok());
    }

    #[test]
    fn vocabularies() {
        assert!(validate_level("expert").is_ok());
        assert!(validate_level("master").is_err());
        assert!(validate_skill_type("methodology").is_ok());
        assert!(validate_status("emerging").is_ok());
        assert!(validate_status("retired").is_err());
    }

    #[test]
    fn scores_bounded() {
        assert!(validate_difficulty(0).is_err());
        assert!(validate_market_demand(10).is_ok());
        assert!(validate_salary_impact(100.5).is_err());
    }

    #[test]
    fn sort_whitelist() {
        assert_eq!(sort_column(None), "name");
        assert_eq!(sort_column(Some("marketDemand")), "market_demand");
        assert_eq!(sort_column(Some("name; DROP TABLE skills")), "name");
        assert_eq!(sort_direction(Some("DESC")), "DESC");
        assert_eq!(sort_direction(Some("sideways")), "ASC");
    }

    #[test]
    fn category_path_formats() {
        assert_eq!(category_path("Programming", Some("Rust")), "Programming > Rust");
        assert_eq!(category_path("Programming", Some("")), "Programming");
        assert_eq!(category_path("Design", None), "Design");
    }
}
