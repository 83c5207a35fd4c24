//! Request handlers.
//!
//! Each submodule provides the async handler functions for one resource.
//! Handlers validate input, delegate to the corresponding repository in
//! `skillforge_db`, publish domain events and map errors via [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod auth;
pub mod classes;
pub mod roles;
pub mod rooms;
pub mod skill_ratings;
pub mod skill_trees;
pub mod skills;
