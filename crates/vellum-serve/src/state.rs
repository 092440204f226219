//! Application state: the composition root.
//!
//! Every service object the pipeline or a handler needs (policy, security
//! log, limiter registry, caches, counter stores, content index) is
//! constructed here exactly once and shared through cloneable handles.
//! Nothing in the crate reaches for module-level globals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache;

use vellum_core::{RateLimiters, SecurityLog, SecurityPolicy};

use crate::cache::{new_cache, ResponseCache};
use crate::config::Config;
use crate::content::{ContentIndex, SearchIndex};
use crate::storage::{LikeStore, ViewStore};

/// Type alias for the OG image cache (card key -> PNG bytes).
pub type OgImageCache = Cache<String, Arc<Vec<u8>>>;

/// OG image cache sizing: images change only when post metadata changes.
const OG_CACHE_CAPACITY: u64 = 1000;
const OG_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

/// The search corpus snapshot is rebuilt at most once per window.
const SEARCH_INDEX_TTL: std::time::Duration = std::time::Duration::from_secs(300);

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// Security policy predicates.
    pub policy: Arc<SecurityPolicy>,

    /// Bounded security event buffer.
    pub seclog: Arc<SecurityLog>,

    /// One sliding-window limiter per route class, process-lifetime.
    pub limiters: Arc<RateLimiters>,

    /// Generic response cache for expensive reads.
    pub cache: ResponseCache,

    /// Rendered share-card cache.
    pub og_cache: OgImageCache,

    /// Read-only post corpus.
    pub content: Arc<ContentIndex>,

    /// View counter store.
    pub views: Arc<ViewStore>,

    /// Like counter store.
    pub likes: Arc<LikeStore>,

    /// Service start time, reported by the security status endpoint.
    pub started_at: DateTime<Utc>,

    search_index: Cache<&'static str, Arc<SearchIndex>>,
}

impl AppState {
    /// Create application state, loading the content index from disk.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let content = ContentIndex::load(&config.content_dir)?;
        Self::with_content(config, content)
    }

    /// Create application state around an already-built content index.
    /// Tests use this to avoid touching a content directory.
    pub fn with_content(config: Config, content: ContentIndex) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let views = ViewStore::open(config.data_dir.join("views.json"));
        let likes = LikeStore::open(config.data_dir.join("likes.json"));

        let og_cache = Cache::builder()
            .max_capacity(OG_CACHE_CAPACITY)
            .time_to_live(OG_CACHE_TTL)
            .build();
        let search_index = Cache::builder()
            .max_capacity(1)
            .time_to_live(SEARCH_INDEX_TTL)
            .build();

        tracing::info!(
            posts = content.len(),
            production = config.production,
            "application state initialized"
        );

        Ok(Self {
            policy: Arc::new(config.security_policy()),
            seclog: Arc::new(SecurityLog::new(
                config.monitoring_enabled,
                config.alert_threshold,
            )),
            limiters: Arc::new(RateLimiters::with_defaults()),
            cache: new_cache(),
            og_cache,
            content: Arc::new(content),
            views: Arc::new(views),
            likes: Arc::new(likes),
            started_at: Utc::now(),
            search_index,
            config: Arc::new(config),
        })
    }

    /// The search corpus snapshot, rebuilt lazily at most once per TTL
    /// window.
    pub async fn search_index(&self) -> Arc<SearchIndex> {
        let content = self.content.clone();
        self.search_index
            .get_with("corpus", async move { Arc::new(SearchIndex::build(&content)) })
            .await
    }
}
