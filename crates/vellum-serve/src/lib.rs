//! Vellum Serve - HTTP API for a personal blog.
//!
//! This crate provides the API layer the blog frontend talks to: view and
//! like counters backed by JSON files on disk, search over the post corpus,
//! RSS/JSON feeds, Open Graph share-card images, newsletter signup, and an
//! operational security endpoint.
//!
//! # Request pipeline
//!
//! Every `/api` request passes through the same middleware stack, in order:
//! request tracing (id, client ip, timing) → security guard (API key,
//! declared size, suspicious-content body scan) → per-route-class rate
//! limiting → handler → response decoration (hardening headers, tracing
//! headers). Success and failure alike are serialized into one envelope
//! shape.
//!
//! # Architecture
//!
//! - **AppState**: composition root owning the policy, security log,
//!   limiter registry, caches, counter stores, and content index
//! - **Middleware**: the pipeline described above
//! - **Storage**: file-backed view/like counter stores
//! - **Routes**: endpoint handlers grouped by family

pub mod cache;
pub mod config;
pub mod content;
pub mod envelope;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;

pub use self::config::Config;
pub use self::content::ContentIndex;
pub use self::envelope::ApiOk;
pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::AppState;
