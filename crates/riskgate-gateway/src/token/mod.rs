//! Token service (authentication).
//!
//! Issues RSA-signed access/refresh pairs, validates them with a cached fast
//! path, and keeps the password strength policy next to the credentials it
//! protects.

pub mod cache;
pub mod keys;
pub mod password;
pub mod service;

pub use keys::KeyPair;
pub use password::{PasswordError, PasswordPolicy};
pub use service::{SweepReport, TokenPair, TokenService};
