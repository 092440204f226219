//! API route definitions.
//!
//! # Route Structure
//!
//! ## Public (outside the pipeline)
//! - `GET /health` - Health check
//!
//! ## API (full middleware pipeline)
//!
//! ### Views (`views` rate class)
//! - `GET /api/views/{slug}` - Per-post views; `stats`, `popular`, `all` special slugs
//! - `POST /api/views/{slug}` - Record a view (per-IP cooldown)
//! - `PUT|DELETE /api/views/{slug}` - Admin-gated, not implemented
//!
//! ### Likes (`likes` rate class)
//! - `GET /api/likes/{slug}` - Per-post likes; `stats`, `popular`, `all`, `user-history`
//! - `POST /api/likes/{slug}` - Toggle the caller's like
//! - `PUT|DELETE /api/likes/{slug}` - Admin-gated, not implemented
//!
//! ### Other families
//! - `POST /api/newsletter` - Signup validation (`default` class)
//! - `GET /api/search` - Scored, paginated search (`search` class)
//! - `GET|HEAD /api/rss` - RSS 2.0 / JSON Feed (`rss` class)
//! - `GET /api/og` - Share-card PNG (`og` class)
//! - `GET /api/security` - Ops status, API-key gated (`default` class)
//!
//! `OPTIONS` preflight on every family is answered by the CORS layer,
//! which shares the security policy's origin predicate.

mod health;
mod likes;
mod newsletter;
mod og;
mod rss;
mod search;
mod security;
mod views;

use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Query};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, on, post, MethodFilter};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use vellum_core::ratelimit::RouteClass;

use crate::error::ApiError;
use crate::middleware::{guard, observe, rate_limit, RouteSecurity};
use crate::state::AppState;

/// Query extraction that keeps rejections inside the error envelope.
pub(crate) type QueryResult<T> = Result<Query<T>, QueryRejection>;

pub(crate) fn parse_query<T>(query: QueryResult<T>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ApiError::BadRequest(format!("invalid query parameters: {e}")))
}

/// Clamp a caller-supplied limit into [1, 50].
pub(crate) fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, 50)
}

/// Build the complete API router.
pub fn router(state: AppState) -> Router {
    let views = Router::new().route(
        "/{slug}",
        get(views::get_views)
            .post(views::record_view)
            .put(views::admin_put)
            .delete(views::admin_delete),
    );

    let likes = Router::new().route(
        "/{slug}",
        get(likes::get_likes)
            .post(likes::toggle_like)
            .put(likes::admin_put)
            .delete(likes::admin_delete),
    );

    let api = Router::new()
        .nest(
            "/views",
            protect(views, &state, RouteSecurity::new(RouteClass::Views)),
        )
        .nest(
            "/likes",
            protect(likes, &state, RouteSecurity::new(RouteClass::Likes)),
        )
        .merge(protect(
            Router::new().route("/newsletter", post(newsletter::subscribe)),
            &state,
            RouteSecurity::new(RouteClass::Default),
        ))
        .merge(protect(
            Router::new().route("/search", get(search::search)),
            &state,
            RouteSecurity::new(RouteClass::Search),
        ))
        .merge(protect(
            Router::new().route(
                "/rss",
                on(MethodFilter::GET, rss::feed).head(rss::head_feed),
            ),
            &state,
            RouteSecurity::new(RouteClass::Rss),
        ))
        .merge(protect(
            Router::new().route("/og", get(og::card)),
            &state,
            RouteSecurity::new(RouteClass::Og),
        ))
        .merge(protect(
            Router::new().route("/security", get(security::status)),
            &state,
            RouteSecurity::new(RouteClass::Default).with_api_key(),
        ))
        // Outermost pipeline stage: context in, decoration out.
        .layer(from_fn_with_state(state.clone(), observe))
        // Streaming enforcement of the size limit, complementing the
        // guard's declared-length check.
        .layer(DefaultBodyLimit::max(state.policy.max_request_bytes));

    let policy = state.policy.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            policy.origin_allowed(origin.to_str().unwrap_or(""))
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .layer(cors)
        .with_state(state)
}

/// Wrap a route family with its guard and rate-limit stages. The guard
/// layer sits outside the limiter so security rejections never consume
/// quota.
fn protect(router: Router<AppState>, state: &AppState, opts: RouteSecurity) -> Router<AppState> {
    router
        .layer(from_fn_with_state((state.clone(), opts.class), rate_limit))
        .layer(from_fn_with_state((state.clone(), opts), guard))
}
