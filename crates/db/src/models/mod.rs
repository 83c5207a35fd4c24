//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod class;
pub mod message;
pub mod role;
pub mod room;
pub mod skill;
pub mod skill_rating;
pub mod skill_tree;
pub mod user;
