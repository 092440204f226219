//! Newsletter signup endpoint.
//!
//! Validates the payload and acknowledges; actual list management belongs
//! to the mailing provider integration, which is out of scope here.

use std::sync::LazyLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::Json;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::envelope::ApiOk;
use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::state::AppState;

/// RFC-shape email check; deliverability is the provider's problem.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
});

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub email: Option<String>,
}

/// `POST /api/newsletter`
pub async fn subscribe(
    State(_state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("email is required".to_string()))?;

    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::Validation("invalid email format".to_string()));
    }

    tracing::info!(email_domain = email.split('@').next_back().unwrap_or("-"), "newsletter signup");

    Ok(ApiOk::new(json!({
        "email": email,
        "subscribed": true,
        "timestamp": Utc::now(),
    }))
    .with_message("Subscription confirmed")
    .with_request_id(ctx.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern_accepts_common_shapes() {
        for email in ["a@b.co", "first.last+tag@sub.domain.example", "x_y%z@d.io"] {
            assert!(EMAIL_RE.is_match(email), "rejected {email}");
        }
    }

    #[test]
    fn email_pattern_rejects_malformed() {
        for email in ["", "plain", "@nouser.example", "user@", "user@tld", "a b@c.d"] {
            assert!(!EMAIL_RE.is_match(email), "accepted {email}");
        }
    }
}
