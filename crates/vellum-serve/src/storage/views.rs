//! View counter store.
//!
//! Tracks per-post view totals plus a bounded history of recent view
//! events, and an independent visit log used to enforce the per-IP
//! cooldown (one counted view per post per window). The visit log is
//! pruned to the last 24 hours on every write.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{load_or_default, persist, StoreError};

/// Most view events retained per post. Unique-viewer detection scans this
/// history, so accuracy degrades once a post has seen more distinct IPs
/// than the cap; the full totals are unaffected.
const VIEW_HISTORY_CAP: usize = 100;

/// Default cooldown: one counted view per (ip, post) per window.
const COOLDOWN_MINUTES: i64 = 15;

/// Default visit-log retention.
const VISIT_RETENTION_HOURS: i64 = 24;

/// One recorded view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEvent {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// Aggregate view state for one post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecord {
    pub slug: String,
    pub views: u64,
    pub unique_views: u64,
    pub first_viewed_at: DateTime<Utc>,
    pub last_viewed_at: DateTime<Utc>,
    pub view_history: Vec<ViewEvent>,
}

/// Anti-abuse visit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub ip: String,
    pub slug: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ViewsData {
    posts: HashMap<String, ViewRecord>,
    visits: Vec<VisitRecord>,
}

/// Aggregate statistics across every tracked post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewsStats {
    pub total_views: u64,
    pub total_unique_views: u64,
    pub tracked_posts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_viewed: Option<MostViewed>,
    pub views_last_hour: u64,
    pub views_last_day: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostViewed {
    pub slug: String,
    pub views: u64,
}

/// File-backed view store. All mutation happens under one async mutex.
pub struct ViewStore {
    path: PathBuf,
    cooldown: Duration,
    retention: Duration,
    data: Mutex<ViewsData>,
}

impl ViewStore {
    /// Open the store at `path` with the default cooldown and retention.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with(
            path,
            Duration::minutes(COOLDOWN_MINUTES),
            Duration::hours(VISIT_RETENTION_HOURS),
        )
    }

    /// Open with explicit windows. Tests use short windows instead of a
    /// mock clock.
    pub fn open_with(path: impl Into<PathBuf>, cooldown: Duration, retention: Duration) -> Self {
        let path = path.into();
        let data: ViewsData = load_or_default(&path, "views");
        tracing::info!(
            path = %path.display(),
            posts = data.posts.len(),
            visits = data.visits.len(),
            "view store opened"
        );
        Self {
            path,
            cooldown,
            retention,
            data: Mutex::new(data),
        }
    }

    /// True when no visit from this IP for this slug falls inside the
    /// cooldown window. Callers check this before [`Self::increment`];
    /// incrementing without the check silently defeats the cooldown.
    pub async fn is_valid_view(&self, ip: &str, slug: &str) -> bool {
        let cutoff = Utc::now() - self.cooldown;
        let data = self.data.lock().await;
        !data
            .visits
            .iter()
            .any(|v| v.ip == ip && v.slug == slug && v.timestamp >= cutoff)
    }

    /// Record a view, creating the post record on first sight.
    pub async fn increment(
        &self,
        slug: &str,
        ip: &str,
        user_agent: Option<&str>,
        referrer: Option<&str>,
    ) -> Result<ViewRecord, StoreError> {
        let now = Utc::now();
        let mut data = self.data.lock().await;

        let record = data
            .posts
            .entry(slug.to_string())
            .or_insert_with(|| ViewRecord {
                slug: slug.to_string(),
                views: 0,
                unique_views: 0,
                first_viewed_at: now,
                last_viewed_at: now,
                view_history: Vec::new(),
            });

        // Approximate uniqueness: scan the bounded history for this IP.
        if !record.view_history.iter().any(|e| e.ip == ip) {
            record.unique_views += 1;
        }

        record.views += 1;
        record.last_viewed_at = now;
        record.view_history.push(ViewEvent {
            timestamp: now,
            ip: ip.to_string(),
            user_agent: user_agent.map(str::to_string),
            referrer: referrer.map(str::to_string),
        });
        if record.view_history.len() > VIEW_HISTORY_CAP {
            let drop = record.view_history.len() - VIEW_HISTORY_CAP;
            record.view_history.drain(..drop);
        }

        let result = record.clone();

        let retention_cutoff = now - self.retention;
        data.visits.retain(|v| v.timestamp >= retention_cutoff);
        data.visits.push(VisitRecord {
            ip: ip.to_string(),
            slug: slug.to_string(),
            timestamp: now,
        });

        persist(&self.path, &*data, "views").await?;
        Ok(result)
    }

    pub async fn post_views(&self, slug: &str) -> Option<ViewRecord> {
        self.data.lock().await.posts.get(slug).cloned()
    }

    pub async fn all(&self) -> Vec<ViewRecord> {
        self.data.lock().await.posts.values().cloned().collect()
    }

    /// Most-viewed posts, descending.
    pub async fn popular(&self, limit: usize) -> Vec<ViewRecord> {
        let mut records = self.all().await;
        records.sort_by(|a, b| b.views.cmp(&a.views));
        records.truncate(limit);
        records
    }

    pub async fn stats(&self) -> ViewsStats {
        let now = Utc::now();
        let data = self.data.lock().await;

        let total_views = data.posts.values().map(|r| r.views).sum();
        let total_unique_views = data.posts.values().map(|r| r.unique_views).sum();
        let most_viewed = data
            .posts
            .values()
            .max_by_key(|r| r.views)
            .map(|r| MostViewed {
                slug: r.slug.clone(),
                views: r.views,
            });

        let mut views_last_hour = 0;
        let mut views_last_day = 0;
        for record in data.posts.values() {
            for event in &record.view_history {
                let age = now - event.timestamp;
                if age <= Duration::hours(1) {
                    views_last_hour += 1;
                }
                if age <= Duration::days(1) {
                    views_last_day += 1;
                }
            }
        }

        ViewsStats {
            total_views,
            total_unique_views,
            tracked_posts: data.posts.len(),
            most_viewed,
            views_last_hour,
            views_last_day,
        }
    }
}
