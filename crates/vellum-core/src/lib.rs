//! Vellum Core - shared primitives for the Vellum blog API.
//!
//! This crate holds everything the HTTP service needs that is not itself
//! HTTP plumbing:
//!
//! - **Security policy**: pure predicates over request attributes (origin
//!   matching, suspicious-content detection, input sanitization, key and
//!   token validation) plus the hardening header set.
//! - **Security event log**: a bounded in-process buffer of security
//!   outcomes, queryable for recent failures and alerting.
//! - **Rate limiting**: per-identifier sliding windows, one long-lived
//!   limiter per route class.
//! - **Post model**: the content metadata shape shared by search, feeds,
//!   and share-card generation.
//! - **Metrics**: Prometheus recorder setup and common counters.

pub mod metrics;
pub mod post;
pub mod ratelimit;
pub mod seclog;
pub mod security;

pub use post::Post;
pub use ratelimit::{RateLimiters, RouteClass};
pub use seclog::SecurityLog;
pub use security::SecurityPolicy;
