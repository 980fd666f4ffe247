//! Policy layer (authorization).
//!
//! Explicit allow/deny policies evaluated in order, falling back to role
//! permissions resolved through the inheritance graph. The engine publishes
//! copy-on-write snapshots so evaluation never blocks on administration.

pub mod bootstrap;
pub mod engine;
pub mod matcher;
pub mod model;
pub mod store;

pub use engine::PolicyEngine;
pub use model::{AccessDecision, AccessRequest, Effect, Permission, Policy, Role};
pub use store::PolicyStore;
