//! Top-level facade crate for riskgate.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use riskgate_core::*;
}

pub mod gateway {
    pub use riskgate_gateway::*;
}

pub use riskgate_core::{Identity, Result, RiskGateError, TokenClaims, TokenError};
pub use riskgate_gateway::admission::{AdmissionController, AdmissionDecision};
pub use riskgate_gateway::policy::{AccessDecision, AccessRequest, PolicyEngine};
pub use riskgate_gateway::token::{TokenPair, TokenService};
