//! Like counter endpoints.
//!
//! `GET /api/likes/{slug}` treats `stats`, `popular`, `all`, and
//! `user-history` as special slugs; `all` is admin-gated, `user-history`
//! returns the calling IP's own like map. `POST` toggles: repeated calls
//! alternate like/unlike, and the response always carries the resulting
//! state so clients never have to guess.

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

/// Public per-post like summary; zero-valued when nothing is recorded yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeSummary {
    slug: String,
    likes: u64,
    user_liked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_liked_at: Option<DateTime<Utc>>,
}

/// `GET /api/likes/{slug}`
pub async fn get_likes(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    query: QueryResult<PopularQuery>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    let data = match slug.as_str() {
        "stats" => json!(state.likes.stats().await),
        "popular" => {
            let limit = clamp_limit(parse_query(query)?.limit, 10);
            json!(state.likes.most_liked(limit).await)
        }
        "all" => {
            require_admin(&state, &ctx, &headers)?;
            json!(state.likes.all().await)
        }
        "user-history" => json!(state.likes.user_history(&ctx.ip).await),
        slug => {
            if !state.content.exists(slug) {
                return Err(ApiError::NotFound(format!("post '{slug}' not found")));
            }
            let user_liked = state.likes.has_user_liked(&ctx.ip, slug).await;
            match state.likes.post_likes(slug).await {
                Some(record) => json!(LikeSummary {
                    slug: record.slug,
                    likes: record.likes,
                    user_liked,
                    last_liked_at: Some(record.last_liked_at),
                }),
                None => json!(LikeSummary {
                    slug: slug.to_string(),
                    likes: 0,
                    user_liked,
                    last_liked_at: None,
                }),
            }
        }
    };

    Ok(ApiOk::new(data).with_request_id(ctx.id))
}

/// `POST /api/likes/{slug}` - toggle the caller's like.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(slug): Path<String>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    if !state.content.exists(&slug) {
        return Err(ApiError::NotFound(format!("post '{slug}' not found")));
    }

    let outcome = state
        .likes
        .toggle(&slug, &ctx.ip, ctx.user_agent.as_deref())
        .await?;

    Ok(ApiOk::new(json!({
        "slug": slug,
        "liked": outcome.liked,
        "likesCount": outcome.likes,
        "timestamp": Utc::now(),
    }))
    .with_message(outcome.message)
    .with_request_id(ctx.id)
    .no_store())
}

/// `PUT /api/likes/{slug}` - reserved for admin corrections.
pub async fn admin_put(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(_slug): Path<String>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    require_admin(&state, &ctx, &headers)?;
    Err(ApiError::NotImplemented(
        "like count adjustment".to_string(),
    ))
}

/// `DELETE /api/likes/{slug}` - reserved for admin resets.
pub async fn admin_delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Path(_slug): Path<String>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    require_admin(&state, &ctx, &headers)?;
    Err(ApiError::NotImplemented("like count reset".to_string()))
}
