//! Operational security endpoint.
//!
//! The base response is a public health view of the security subsystem.
//! `config=true` and `logs=true` expose the effective (non-secret) policy
//! and recent security events respectively; both are admin-gated.

use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::envelope::ApiOk;
use crate::error::ApiError;
use crate::middleware::{require_admin, RequestContext};
use crate::routes::{parse_query, QueryResult};
use crate::state::AppState;

const DEFAULT_LOG_LIMIT: usize = 20;
const MAX_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityQuery {
    pub config: Option<bool>,
    pub logs: Option<bool>,
    pub limit: Option<usize>,
}

/// `GET /api/security`
pub async fn status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    query: QueryResult<SecurityQuery>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    let params = parse_query(query)?;

    let mut data = json!({
        "status": "ok",
        "uptimeSeconds": (Utc::now() - state.started_at).num_seconds(),
        "monitoring": state.config.monitoring_enabled,
        "shouldAlert": state.seclog.should_alert(),
        "failedAttempts": state.seclog.failed_attempts(Duration::minutes(15)),
        "bufferedEvents": state.seclog.len(),
    });

    if params.config.unwrap_or(false) {
        require_admin(&state, &ctx, &headers)?;
        data["config"] = json!({
            "production": state.policy.production,
            "whitelistEnabled": state.policy.ip_whitelist.is_some(),
            "apiKeysConfigured": !state.policy.api_keys.is_empty(),
            "adminTokenConfigured": state.policy.admin_token.is_some(),
            "allowedOrigins": state.policy.allowed_origins,
            "maxRequestBytes": state.policy.max_request_bytes,
            "alertThreshold": state.config.alert_threshold,
        });
    }

    if params.logs.unwrap_or(false) {
        require_admin(&state, &ctx, &headers)?;
        let limit = params
            .limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT);
        data["logs"] = json!(state.seclog.recent(limit));
    }

    Ok(ApiOk::new(data).with_request_id(ctx.id))
}
