//! Like counter store.
//!
//! Tracks a per-post aggregate plus per-user toggle state, where a "user"
//! is an opaque identifier derived from the client IP. The critical
//! invariant: flipping one user's state changes the aggregate by exactly
//! one, so the aggregate always equals the net of recorded toggles,
//! clamped at zero.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{load_or_default, persist, StoreError};

/// Most like/unlike events retained per post.
const LIKE_HISTORY_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Unlike,
}

/// One recorded toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeEvent {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub action: LikeAction,
    pub user: String,
}

/// Aggregate like state for one post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    pub slug: String,
    pub likes: u64,
    pub first_liked_at: DateTime<Utc>,
    pub last_liked_at: DateTime<Utc>,
    pub like_history: Vec<LikeEvent>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LikesData {
    posts: HashMap<String, LikeRecord>,
    /// user identifier → slug → currently liked.
    users: HashMap<String, HashMap<String, bool>>,
}

/// Result of a toggle.
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub liked: bool,
    pub likes: u64,
    pub message: &'static str,
}

/// Aggregate statistics across every tracked post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikesStats {
    pub total_likes: u64,
    pub tracked_posts: usize,
    pub total_users: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_liked: Option<MostLiked>,
    pub likes_last_day: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostLiked {
    pub slug: String,
    pub likes: u64,
}

/// Derive the opaque per-user identifier from a client IP (FNV-1a).
///
/// Deliberately not reversible in casual inspection of the store file,
/// but not cryptographic either; it only needs to be stable.
pub fn user_identifier(ip: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in ip.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("user_{hash:016x}")
}

/// File-backed like store. All mutation happens under one async mutex.
pub struct LikeStore {
    path: PathBuf,
    data: Mutex<LikesData>,
}

impl LikeStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data: LikesData = load_or_default(&path, "likes");
        tracing::info!(
            path = %path.display(),
            posts = data.posts.len(),
            users = data.users.len(),
            "like store opened"
        );
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Flip the caller's like state for a post.
    ///
    /// Repeated calls alternate deterministically (like, unlike, like, …);
    /// callers track the returned `liked` flag for current status.
    pub async fn toggle(
        &self,
        slug: &str,
        ip: &str,
        user_agent: Option<&str>,
    ) -> Result<ToggleOutcome, StoreError> {
        let now = Utc::now();
        let user = user_identifier(ip);
        let mut data = self.data.lock().await;

        let currently_liked = data
            .users
            .get(&user)
            .and_then(|slugs| slugs.get(slug))
            .copied()
            .unwrap_or(false);
        let now_liked = !currently_liked;

        let record = data
            .posts
            .entry(slug.to_string())
            .or_insert_with(|| LikeRecord {
                slug: slug.to_string(),
                likes: 0,
                first_liked_at: now,
                last_liked_at: now,
                like_history: Vec::new(),
            });

        if now_liked {
            record.likes += 1;
        } else {
            record.likes = record.likes.saturating_sub(1);
        }
        record.last_liked_at = now;
        record.like_history.push(LikeEvent {
            timestamp: now,
            ip: ip.to_string(),
            user_agent: user_agent.map(str::to_string),
            action: if now_liked {
                LikeAction::Like
            } else {
                LikeAction::Unlike
            },
            user: user.clone(),
        });
        if record.like_history.len() > LIKE_HISTORY_CAP {
            let drop = record.like_history.len() - LIKE_HISTORY_CAP;
            record.like_history.drain(..drop);
        }

        let likes = record.likes;
        data.users
            .entry(user)
            .or_default()
            .insert(slug.to_string(), now_liked);

        persist(&self.path, &*data, "likes").await?;
        Ok(ToggleOutcome {
            liked: now_liked,
            likes,
            message: if now_liked {
                "Post liked"
            } else {
                "Like removed"
            },
        })
    }

    pub async fn has_user_liked(&self, ip: &str, slug: &str) -> bool {
        let user = user_identifier(ip);
        self.data
            .lock()
            .await
            .users
            .get(&user)
            .and_then(|slugs| slugs.get(slug))
            .copied()
            .unwrap_or(false)
    }

    pub async fn post_likes(&self, slug: &str) -> Option<LikeRecord> {
        self.data.lock().await.posts.get(slug).cloned()
    }

    pub async fn all(&self) -> Vec<LikeRecord> {
        self.data.lock().await.posts.values().cloned().collect()
    }

    /// Most-liked posts, descending.
    pub async fn most_liked(&self, limit: usize) -> Vec<LikeRecord> {
        let mut records = self.all().await;
        records.sort_by(|a, b| b.likes.cmp(&a.likes));
        records.truncate(limit);
        records
    }

    /// The caller's slug → liked map.
    pub async fn user_history(&self, ip: &str) -> HashMap<String, bool> {
        let user = user_identifier(ip);
        self.data
            .lock()
            .await
            .users
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn stats(&self) -> LikesStats {
        let now = Utc::now();
        let data = self.data.lock().await;

        let total_likes = data.posts.values().map(|r| r.likes).sum();
        let most_liked = data
            .posts
            .values()
            .max_by_key(|r| r.likes)
            .map(|r| MostLiked {
                slug: r.slug.clone(),
                likes: r.likes,
            });
        let likes_last_day = data
            .posts
            .values()
            .flat_map(|r| &r.like_history)
            .filter(|e| e.action == LikeAction::Like && now - e.timestamp <= Duration::days(1))
            .count() as u64;

        LikesStats {
            total_likes,
            tracked_posts: data.posts.len(),
            total_users: data.users.len(),
            most_liked,
            likes_last_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LikeStore {
        LikeStore::open(dir.path().join("likes.json"))
    }

    #[test]
    fn user_identifier_is_stable_and_distinct() {
        assert_eq!(user_identifier("1.2.3.4"), user_identifier("1.2.3.4"));
        assert_ne!(user_identifier("1.2.3.4"), user_identifier("1.2.3.5"));
        assert!(user_identifier("1.2.3.4").starts_with("user_"));
    }

    #[tokio::test]
    async fn toggle_alternates_like_and_unlike() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = store.toggle("p", "1.1.1.1", None).await.unwrap();
        assert!(first.liked);
        assert_eq!(first.likes, 1);

        let second = store.toggle("p", "1.1.1.1", None).await.unwrap();
        assert!(!second.liked);
        assert_eq!(second.likes, 0);
    }

    #[tokio::test]
    async fn even_toggle_count_restores_the_aggregate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.toggle("p", "9.9.9.9", None).await.unwrap();
        let baseline = store.post_likes("p").await.unwrap().likes;

        for _ in 0..4 {
            store.toggle("p", "1.1.1.1", None).await.unwrap();
        }
        assert_eq!(store.post_likes("p").await.unwrap().likes, baseline);
        assert!(!store.has_user_liked("1.1.1.1", "p").await);

        for _ in 0..3 {
            store.toggle("p", "1.1.1.1", None).await.unwrap();
        }
        assert_eq!(store.post_likes("p").await.unwrap().likes, baseline + 1);
        assert!(store.has_user_liked("1.1.1.1", "p").await);
    }

    #[tokio::test]
    async fn distinct_users_accumulate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.toggle("p", "1.1.1.1", None).await.unwrap();
        let outcome = store.toggle("p", "2.2.2.2", None).await.unwrap();
        assert_eq!(outcome.likes, 2);
    }

    #[tokio::test]
    async fn aggregate_never_goes_below_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("likes.json");

        // Craft a store whose user state says "liked" while the aggregate
        // is already zero (e.g. a hand-edited or partially lost file). The
        // unlike path must clamp instead of underflowing.
        let user = user_identifier("1.1.1.1");
        let crafted = serde_json::json!({
            "posts": {
                "p": {
                    "slug": "p",
                    "likes": 0,
                    "firstLikedAt": "2024-01-01T00:00:00Z",
                    "lastLikedAt": "2024-01-01T00:00:00Z",
                    "likeHistory": []
                }
            },
            "users": { user: { "p": true } }
        });
        std::fs::write(&path, serde_json::to_vec(&crafted).unwrap()).unwrap();

        let store = LikeStore::open(&path);
        let outcome = store.toggle("p", "1.1.1.1", None).await.unwrap();
        assert!(!outcome.liked);
        assert_eq!(outcome.likes, 0);
    }

    #[tokio::test]
    async fn history_is_capped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for i in 0..(LIKE_HISTORY_CAP + 10) {
            store
                .toggle("p", &format!("10.0.{}.{}", i / 256, i % 256), None)
                .await
                .unwrap();
        }
        let record = store.post_likes("p").await.unwrap();
        assert_eq!(record.like_history.len(), LIKE_HISTORY_CAP);
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = store(&dir);
            store.toggle("p", "1.1.1.1", None).await.unwrap();
        }
        let reopened = store(&dir);
        assert_eq!(reopened.post_likes("p").await.unwrap().likes, 1);
        assert!(reopened.has_user_liked("1.1.1.1", "p").await);
    }

    #[tokio::test]
    async fn user_history_maps_slugs() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.toggle("a", "1.1.1.1", None).await.unwrap();
        store.toggle("b", "1.1.1.1", None).await.unwrap();
        store.toggle("b", "1.1.1.1", None).await.unwrap();

        let history = store.user_history("1.1.1.1").await;
        assert_eq!(history.get("a"), Some(&true));
        assert_eq!(history.get("b"), Some(&false));
    }

    #[tokio::test]
    async fn stats_aggregate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.toggle("a", "1.1.1.1", None).await.unwrap();
        store.toggle("a", "2.2.2.2", None).await.unwrap();
        store.toggle("b", "1.1.1.1", None).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total_likes, 3);
        assert_eq!(stats.tracked_posts, 2);
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.most_liked.unwrap().slug, "a");
        assert_eq!(stats.likes_last_day, 3);
    }
}
