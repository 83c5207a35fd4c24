//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async operations that
//! accept `&PgPool` as the first argument.

pub mod class_repo;
pub mod message_repo;
pub mod role_repo;
pub mod room_repo;
pub mod skill_rating_repo;
pub mod skill_repo;
pub mod skill_tree_repo;
pub mod user_repo;

pub use class_repo::ClassRepo;
pub use message_repo::MessageRepo;
pub use role_repo::RoleRepo;
pub use room_repo::RoomRepo;
pub use skill_rating_repo::SkillRatingRepo;
pub use skill_repo::SkillRepo;
pub use skill_tree_repo::SkillTreeRepo;
pub use user_repo::UserRepo;
