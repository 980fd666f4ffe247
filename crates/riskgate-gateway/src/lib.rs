//! riskgate gateway library entry.
//!
//! This crate wires the request-boundary triad (admission, token, policy)
//! into an HTTP gateway: the gate pipeline, the administrative surface, ops
//! endpoints, metrics and background maintenance. It is intended to be
//! consumed by the binary (`main.rs`) and by integration tests.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod admission;
pub mod app_state;
pub mod config;
pub mod context;
pub mod gate;
pub mod maintenance;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod token;
pub mod transport;
