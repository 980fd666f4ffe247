//! Per-request caller context shared across layers.
//!
//! Resolves who is calling (client identity for admission, bearer token for
//! authentication) from the HTTP request without coupling the triad to axum.

pub mod caller;

pub use caller::{bearer_token, client_context, client_id, Caller};
