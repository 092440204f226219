//! Post metadata model.
//!
//! The blog content itself (MDX parsing, page rendering) lives outside this
//! system; the API only ever sees posts through this read-only metadata
//! shape, produced by the content index at startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a single published post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// URL-safe unique identifier.
    pub slug: String,

    /// Post title.
    pub title: String,

    /// Short description used in feeds, search results, and share cards.
    #[serde(default)]
    pub description: String,

    /// Publication date.
    pub date: DateTime<Utc>,

    /// Author display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Primary category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Plain-text body, used for search scoring and feed content.
    #[serde(default, skip_serializing)]
    pub body: String,
}

impl Post {
    /// Case-insensitive category match.
    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category))
    }

    /// Case-insensitive tag match.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post() -> Post {
        Post {
            slug: "hello-world".to_string(),
            title: "Hello World".to_string(),
            description: "First post".to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            author: Some("Ada".to_string()),
            category: Some("Meta".to_string()),
            tags: vec!["intro".to_string(), "Rust".to_string()],
            body: "Welcome to the blog.".to_string(),
        }
    }

    #[test]
    fn category_match_is_case_insensitive() {
        let p = post();
        assert!(p.in_category("meta"));
        assert!(p.in_category("META"));
        assert!(!p.in_category("rust"));
    }

    #[test]
    fn tag_match_is_case_insensitive() {
        let p = post();
        assert!(p.has_tag("rust"));
        assert!(!p.has_tag("go"));
    }

    #[test]
    fn body_is_not_serialized() {
        let json = serde_json::to_value(post()).unwrap();
        assert!(json.get("body").is_none());
        assert_eq!(json["slug"], "hello-world");
    }
}
