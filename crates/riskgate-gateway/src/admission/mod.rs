//! Admission control: per-client rate limiting with escalating blocks.
//!
//! `controller` holds the decision procedure. Counters live behind the
//! `CounterStore` capability with two backends:
//! - `local`: in-process fixed window
//! - `distributed`: Redis-backed sliding window shared across instances

pub mod controller;
pub mod local;
pub mod distributed;
pub mod store;

pub use controller::{
    AdmissionController, AdmissionDecision, AdmissionOutcome, ESCALATION_THRESHOLD,
    REASON_BLOCKED, REASON_ESCALATED, REASON_RATE_LIMITED,
};
pub use local::LocalStore;
pub use distributed::RedisStore;
pub use store::{now_ms, ClientContext, ClientStats, CounterStore, WindowCount};
