//! riskgate core: transport-agnostic error types and the token claim contract.
//!
//! This crate defines the error surface and the wire-level claim shape shared
//! by the gateway and by any downstream service that verifies riskgate tokens
//! with the published public key. It carries no runtime or crypto
//! dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! All fallible paths must surface as `RiskGateError`/`Result` so production
//! processes do not crash on malformed input or hostile traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod claims;
pub mod error;

/// Shared result type.
pub use error::{Result, RiskGateError};
pub use claims::{Identity, TokenClaims, TokenType};
pub use error::{ClientCode, TokenError};
