//! The request-handling pipeline.
//!
//! Three middleware layers wrap every `/api` route, executing strictly in
//! this order:
//!
//! 1. [`observe`] - assigns the request id and client context, and on the
//!    way out attaches security/tracing headers and logs the outcome.
//! 2. [`guard`] - API key check, declared-size check, suspicious-content
//!    body scan. Short-circuits with a typed [`ApiError`] on the first
//!    failure.
//! 3. [`rate_limit`] - per-route-class sliding window.
//!
//! Admin-gated operations additionally call [`require_admin`] from their
//! handlers (IP whitelist, then admin token), since the admin requirement
//! varies per method and per special slug within a route family.

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use vellum_core::metrics;
use vellum_core::ratelimit::RouteClass;
use vellum_core::seclog::Severity;

use crate::error::ApiError;
use crate::state::AppState;

/// Per-request context assigned by [`observe`] and read by handlers via
/// `Extension<RequestContext>`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: String,
    pub ip: String,
    pub user_agent: Option<String>,
    pub origin: Option<String>,
    pub start: Instant,
}

/// Security requirements for a route family.
#[derive(Debug, Clone, Copy)]
pub struct RouteSecurity {
    pub class: RouteClass,
    pub require_api_key: bool,
    pub scan_body: bool,
}

impl RouteSecurity {
    pub fn new(class: RouteClass) -> Self {
        Self {
            class,
            require_api_key: false,
            scan_body: true,
        }
    }

    pub fn with_api_key(mut self) -> Self {
        self.require_api_key = true;
        self
    }

    pub fn without_scan(mut self) -> Self {
        self.scan_body = false;
        self
    }
}

/// Outermost pipeline layer: request identity in, response decoration out.
///
/// Every response that passes through here, whether handler success, guard
/// rejection, rate-limit rejection, or handler error, leaves with the
/// hardening header set, `X-Request-Id`, and `X-Response-Time`.
pub async fn observe(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let ctx = RequestContext {
        id: Uuid::new_v4().to_string(),
        ip: client_ip(&request),
        user_agent: header_str(request.headers(), header::USER_AGENT),
        origin: header_str(request.headers(), header::ORIGIN),
        start: Instant::now(),
    };

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = ctx.start.elapsed().as_millis();

    let headers = response.headers_mut();
    for (name, value) in state.policy.security_headers(ctx.origin.as_deref()) {
        headers.insert(name, value);
    }
    if let Ok(id) = HeaderValue::from_str(&ctx.id) {
        headers.insert(HeaderName::from_static("x-request-id"), id);
    }
    if let Ok(timing) = HeaderValue::from_str(&format!("{elapsed_ms}ms")) {
        headers.insert(HeaderName::from_static("x-response-time"), timing);
    }

    metrics::record_request(method.as_str(), status.as_u16());

    if status.is_server_error() {
        state.seclog.record(
            Severity::Error,
            format!("{method} {path} -> {status}"),
            Some(&ctx.ip),
            ctx.user_agent.as_deref(),
            Some(format!("request_id={}", ctx.id)),
        );
    } else if status.is_client_error() {
        state.seclog.record(
            Severity::Warning,
            format!("{method} {path} -> {status}"),
            Some(&ctx.ip),
            ctx.user_agent.as_deref(),
            Some(format!("request_id={}", ctx.id)),
        );
    } else {
        tracing::info!(
            request_id = %ctx.id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms = elapsed_ms as u64,
            "request completed"
        );
    }

    response
}

/// Security guard: API key, declared size, suspicious-content scan.
pub async fn guard(
    State((state, opts)): State<(AppState, RouteSecurity)>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = request_context(&request);

    if opts.require_api_key {
        let key = header_str(request.headers(), HeaderName::from_static("x-api-key"));
        if !state.policy.validate_api_key(key.as_deref()) {
            state.seclog.record(
                Severity::Warning,
                "missing or invalid API key",
                Some(&ctx.ip),
                ctx.user_agent.as_deref(),
                None,
            );
            return Err(ApiError::Unauthorized);
        }
    }

    // Declared size first; the body limit layer enforces the real size
    // during streaming for clients that lie about Content-Length.
    if let Some(declared) = content_length(request.headers()) {
        if declared > state.policy.max_request_bytes {
            state.seclog.record(
                Severity::Warning,
                "request exceeds size limit",
                Some(&ctx.ip),
                ctx.user_agent.as_deref(),
                Some(format!("declared={declared}")),
            );
            return Err(ApiError::BadRequest("request body too large".to_string()));
        }
    }

    let request = if opts.scan_body && matches!(*request.method(), Method::POST | Method::PUT) {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, state.policy.max_request_bytes)
            .await
            .map_err(|_| ApiError::BadRequest("request body unreadable or too large".to_string()))?;

        if let Ok(text) = std::str::from_utf8(&bytes) {
            if state.policy.has_suspicious_content(text) {
                state.seclog.record(
                    Severity::Warning,
                    "suspicious content in request body",
                    Some(&ctx.ip),
                    ctx.user_agent.as_deref(),
                    None,
                );
                return Err(ApiError::BadRequest(
                    "request contains disallowed content".to_string(),
                ));
            }
        }

        Request::from_parts(parts, Body::from(bytes))
    } else {
        request
    };

    Ok(next.run(request).await)
}

/// Per-route-class rate limiting. Rejections carry the standard backoff
/// headers via [`ApiError::RateLimited`].
pub async fn rate_limit(
    State((state, class)): State<(AppState, RouteClass)>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = request_context(&request);
    let decision = state.limiters.check(class, &ctx.ip);

    if !decision.allowed {
        metrics::record_rate_limited(class.as_str());
        state.seclog.record(
            Severity::Info,
            format!("rate limit exceeded for {} routes", class.as_str()),
            Some(&ctx.ip),
            ctx.user_agent.as_deref(),
            None,
        );
        return Err(ApiError::RateLimited {
            limit: decision.limit,
            reset_at_ms: decision.reset_at_ms,
            retry_after_secs: decision.retry_after_secs,
        });
    }

    Ok(next.run(request).await)
}

/// Admin gate for handlers: IP whitelist first, then the admin token from
/// the `X-Admin-Token` header. Both checks fail open when unconfigured,
/// per the policy's documented posture.
pub fn require_admin(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    if !state.policy.is_whitelisted(&ctx.ip) {
        state.seclog.record(
            Severity::Warning,
            "admin operation from non-whitelisted IP",
            Some(&ctx.ip),
            ctx.user_agent.as_deref(),
            None,
        );
        return Err(ApiError::Forbidden("access denied".to_string()));
    }

    let token = header_str(headers, HeaderName::from_static("x-admin-token"));
    if !state.policy.validate_admin_token(token.as_deref()) {
        state.seclog.record(
            Severity::Warning,
            "missing or invalid admin token",
            Some(&ctx.ip),
            ctx.user_agent.as_deref(),
            None,
        );
        return Err(ApiError::Forbidden("admin token required".to_string()));
    }

    Ok(())
}

/// The context inserted by [`observe`]; a default stands in if a route is
/// somehow wired without it.
fn request_context(request: &Request) -> RequestContext {
    request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext {
            id: String::new(),
            ip: client_ip(request),
            user_agent: None,
            origin: None,
            start: Instant::now(),
        })
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-Ip`, then the
/// socket peer address.
fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = header_str(request.headers(), HeaderName::from_static("x-forwarded-for"))
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(request.headers(), HeaderName::from_static("x-real-ip")) {
        return real_ip;
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_str(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
