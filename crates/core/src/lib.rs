//! Domain logic for the skill-tree learning platform.
//!
//! Everything in this crate is pure: no database, no HTTP. The `db` crate
//! loads rows into these types, mutates them, and writes them back.

pub mod class;
pub mod error;
pub mod pagination;
pub mod roles;
pub mod room;
pub mod skill;
pub mod skill_rating;
pub mod skill_tree;
pub mod types;
pub mod validation;
