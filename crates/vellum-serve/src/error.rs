//! API error taxonomy and response formatting.
//!
//! Handlers signal failure by returning an [`ApiError`]; this module is the
//! single point that maps errors to HTTP statuses, machine codes, and the
//! uniform response envelope. Internal causes are logged server-side and
//! never leak to clients beyond a generic message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// API error type that converts to enveloped HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or unacceptable request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid API key.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller lacks permission (whitelist or admin token failure).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Method not supported on this route.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Request conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request was well-formed but semantically invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Rate limit exceeded for the route class.
    #[error("rate limit exceeded")]
    RateLimited {
        limit: usize,
        reset_at_ms: i64,
        retry_after_secs: u64,
    },

    /// Internal server error (storage, rendering, etc.).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Recognized route with unimplemented semantics.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Dependency unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    /// Machine-readable code carried in the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<crate::storage::StoreError> for ApiError {
    fn from(err: crate::storage::StoreError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

/// JSON error envelope body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    success: bool,
    error: String,
    code: &'static str,
    timestamp: DateTime<Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            Self::Internal(err) => {
                tracing::error!(error = %err, source = ?err.source(), "internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorEnvelope {
            success: false,
            error: message,
            code,
            timestamp: Utc::now(),
        };

        let mut response = (status, Json(body)).into_response();

        if let Self::RateLimited {
            limit,
            reset_at_ms,
            retry_after_secs,
        } = self
        {
            let headers = response.headers_mut();
            insert_num(headers, "x-ratelimit-limit", limit as i64);
            insert_num(headers, "x-ratelimit-remaining", 0);
            insert_num(headers, "x-ratelimit-reset", reset_at_ms);
            insert_num(headers, "retry-after", retry_after_secs as i64);
        }

        response
    }
}

fn insert_num(headers: &mut axum::http::HeaderMap, name: &'static str, value: i64) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(header::HeaderName::from_static(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::NotImplemented("x".into()).status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(ApiError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(
            ApiError::RateLimited {
                limit: 10,
                reset_at_ms: 0,
                retry_after_secs: 1
            }
            .code(),
            "RATE_LIMITED"
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn rate_limited_response_carries_backoff_headers() {
        let err = ApiError::RateLimited {
            limit: 30,
            reset_at_ms: 1_700_000_000_000,
            retry_after_secs: 42,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "30");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["retry-after"], "42");
    }

    #[test]
    fn internal_error_hides_cause() {
        let response = ApiError::Internal(anyhow::anyhow!("disk exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // Body carries the generic message only; the cause stays server-side.
    }
}
