//! View counter endpoints.
//!
//! `GET /api/views/{slug}` treats `stats`, `popular`, and `all` as special
//! slugs that short-circuit before post-existence validation; `all` is
//! admin-gated. `POST` applies the per-IP cooldown: a repeat view inside
//! the window is acknowledged with the current numbers and a note, not an
//! error.

use axum::extract::{Extension, Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::envelope::ApiOk;
use crate::error::ApiError;
use crate::middleware::{require_admin, RequestContext};
use crate::routes::{clamp_limit, parse_query, QueryResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<usize>,
}

/// Public per-post view summary; zero-valued when nothing is recorded yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewSummary {
    slug: String,
    views: u64,
    unique_views: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_viewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_viewed_at: Option<DateTime<Utc>>,
}

/// `GET /api/views/{slug}`
pub async fn get_views(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    query: QueryResult<PopularQuery>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    let data = match slug.as_str() {
        "stats" => json!(state.views.stats().await),
        "popular" => {
            let limit = clamp_limit(parse_query(query)?.limit, 10);
            json!(state.views.popular(limit).await)
        }
        "all" => {
            require_admin(&state, &ctx, &headers)?;
            json!(state.views.all().await)
        }
        slug => {
            if !state.content.exists(slug) {
                return Err(ApiError::NotFound(format!("post '{slug}' not found")));
            }
            match state.views.post_views(slug).await {
                Some(record) => json!(ViewSummary {
                    slug: record.slug,
                    views: record.views,
                    unique_views: record.unique_views,
                    first_viewed_at: Some(record.first_viewed_at),
                    last_viewed_at: Some(record.last_viewed_at),
                }),
                None => json!(ViewSummary {
                    slug: slug.to_string(),
                    views: 0,
                    unique_views: 0,
                    first_viewed_at: None,
                    last_viewed_at: None,
                }),
            }
        }
    };

    Ok(ApiOk::new(data).with_request_id(ctx.id))
}

/// `POST /api/views/{slug}`
pub async fn record_view(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    if !state.content.exists(&slug) {
        return Err(ApiError::NotFound(format!("post '{slug}' not found")));
    }

    if !state.views.is_valid_view(&ctx.ip, &slug).await {
        // Cooldown active: acknowledge with the current numbers.
        let (views, unique_views, last_viewed_at) = match state.views.post_views(&slug).await {
            Some(record) => (
                record.views,
                record.unique_views,
                Some(record.last_viewed_at),
            ),
            None => (0, 0, None),
        };
        return Ok(ApiOk::new(json!({
            "slug": slug,
            "views": views,
            "uniqueViews": unique_views,
            "lastViewedAt": last_viewed_at,
        }))
        .with_message("View recorded too frequently; counted at most once per window")
        .with_request_id(ctx.id));
    }

    let referrer = headers
        .get(axum::http::header::REFERER)
        .and_then(|v| v.to_str().ok());
    let record = state
        .views
        .increment(&slug, &ctx.ip, ctx.user_agent.as_deref(), referrer)
        .await?;

    Ok(ApiOk::new(json!({
        "slug": record.slug,
        "views": record.views,
        "uniqueViews": record.unique_views,
        "lastViewedAt": record.last_viewed_at,
    }))
    .with_request_id(ctx.id))
}

/// `PUT /api/views/{slug}` - reserved for admin corrections.
pub async fn admin_put(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(_slug): Path<String>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    require_admin(&state, &ctx, &headers)?;
    Err(ApiError::NotImplemented(
        "view count adjustment".to_string(),
    ))
}

/// `DELETE /api/views/{slug}` - reserved for admin resets.
pub async fn admin_delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(_slug): Path<String>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    require_admin(&state, &ctx, &headers)?;
    Err(ApiError::NotImplemented("view count reset".to_string()))
}
