//! Event names published by the API.

pub const SKILL_CREATED: &str = "skill.created";
pub const SKILL_DELETED: &str = "skill.deleted";

pub const SKILL_TREE_CREATED: &str = "skill_tree.created";
/// Structure changed: skills added or removed.
pub const SKILL_TREE_UPDATED: &str = "skill_tree.updated";
pub const SKILL_TREE_DELETED: &str = "skill_tree.deleted";

pub const CLASS_CREATED: &str = "class.created";
pub const CLASS_STUDENT_ENROLLED: &str = "class.student_enrolled";
pub const CLASS_STUDENT_REMOVED: &str = "class.student_removed";

pub const SKILL_RATING_UPDATED: &str = "skill_rating.updated";
pub const SKILL_RATING_COMPLETED: &str = "skill_rating.completed";
pub const SKILL_RATING_ARCHIVED: &str = "skill_rating.archived";

pub const ROOM_CLASS_ASSIGNED: &str = "room.class_assigned";
pub const ROLES_REFRESHED: &str = "roles.refreshed";
