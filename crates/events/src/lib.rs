//! In-process domain events.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope, with names listed in [`names`].
//! - [`EventLogger`]: background subscriber that writes every event to the
//!   tracing log.
//!
//! Publishing never blocks and never fails the request that triggered it.

pub mod bus;
pub mod logger;
pub mod names;

pub use bus::{EntityRef, EventBus, PlatformEvent};
pub use logger::EventLogger;
