//! HTTP boundary.
//!
//! - `error`: `RiskGateError` -> status, JSON body, `Retry-After`
//! - `public`: key distribution, token refresh, `/v1/authorize`
//! - `admin`: policy, rate-limit and auth administration behind the gate

pub mod admin;
pub mod error;
pub mod public;

pub use error::{ApiError, ApiResult};
