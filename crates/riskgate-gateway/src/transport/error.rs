//! HTTP mapping of `RiskGateError`.
//!
//! Body is always `{"code": "...", "message": "..."}`; admission denials
//! also carry `Retry-After` in whole seconds (min 1).

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use riskgate_core::error::{RiskGateError, TokenError};

#[derive(Debug)]
pub struct ApiError(pub RiskGateError);

impl From<RiskGateError> for ApiError {
    fn from(e: RiskGateError) -> Self {
        Self(e)
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Internal details stay in the log.
        let message = match &self.0 {
            RiskGateError::Internal(detail) | RiskGateError::Store(detail) => {
                tracing::error!(error = %detail, "request failed");
                code.as_str().to_lowercase()
            }
            other => other.to_string(),
        };

        let mut resp = (status, Json(json!({ "code": code.as_str(), "message": message }))).into_response();
        if let Some(secs) = self.0.retry_after_secs() {
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        resp
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
