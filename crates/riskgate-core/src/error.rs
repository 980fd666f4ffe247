//! Shared error type across riskgate crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// Authentication failed (bad, expired or revoked token).
    AuthFailed,
    /// Authenticated but not permitted.
    Forbidden,
    /// Soft admission denial.
    RateLimited,
    /// Hard admission denial after repeated violations.
    Blocked,
    /// Administrative lookup miss.
    NotFound,
    /// Administrative duplicate.
    Conflict,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Dependency (counter store) unavailable.
    Unavailable,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::AuthFailed => "AUTH_FAILED",
            ClientCode::Forbidden => "FORBIDDEN",
            ClientCode::RateLimited => "RATE_LIMITED",
            ClientCode::Blocked => "BLOCKED",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Conflict => "CONFLICT",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// Transport status the boundary layer answers with.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::BadRequest | ClientCode::UnsupportedVersion => 400,
            ClientCode::AuthFailed => 401,
            ClientCode::Forbidden => 403,
            ClientCode::NotFound => 404,
            ClientCode::Conflict => 409,
            ClientCode::RateLimited | ClientCode::Blocked => 429,
            ClientCode::Unavailable => 503,
            ClientCode::Internal => 500,
        }
    }
}

/// Authentication failures produced by token validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed token, signature mismatch or algorithm mismatch.
    #[error("token invalid: {0}")]
    TokenInvalid(String),
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    TokenNotYetValid,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("token revoked")]
    TokenRevoked,
}

impl TokenError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::TokenInvalid(_) => "invalid",
            TokenError::TokenExpired => "expired",
            TokenError::TokenNotYetValid => "not_yet_valid",
            TokenError::IssuerMismatch => "issuer_mismatch",
            TokenError::AudienceMismatch => "audience_mismatch",
            TokenError::TokenRevoked => "revoked",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RiskGateError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RiskGateError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("blocked")]
    Blocked { retry_after_secs: u64 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("counter store: {0}")]
    Store(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RiskGateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RiskGateError::BadRequest(_)
            | RiskGateError::InvalidInput(_)
            | RiskGateError::Validation(_) => ClientCode::BadRequest,
            RiskGateError::Token(_) => ClientCode::AuthFailed,
            RiskGateError::Forbidden(_) => ClientCode::Forbidden,
            RiskGateError::RateLimited { .. } => ClientCode::RateLimited,
            RiskGateError::Blocked { .. } => ClientCode::Blocked,
            RiskGateError::NotFound(_) => ClientCode::NotFound,
            RiskGateError::AlreadyExists(_) => ClientCode::Conflict,
            RiskGateError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            RiskGateError::Store(_) => ClientCode::Unavailable,
            RiskGateError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Seconds the caller should wait before retrying, for admission denials.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RiskGateError::RateLimited { retry_after_secs }
            | RiskGateError::Blocked { retry_after_secs } => Some((*retry_after_secs).max(1)),
            _ => None,
        }
    }
}
