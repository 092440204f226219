//! Post search endpoint.
//!
//! Scores posts 0-100 against the query (title matches dominate, body
//! matches trail), filters by optional category/tag, paginates, and
//! returns a highlighted excerpt per hit. Results are cached server-side;
//! the lowercased corpus snapshot itself is rebuilt at most once per
//! cache window.

use std::time::Duration;

use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::get_or_compute;
use crate::content::SearchDoc;
use crate::envelope::ApiOk;
use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::routes::{clamp_limit, parse_query, QueryResult};
use crate::state::AppState;

/// Minimum query length; anything shorter is rejected outright.
const MIN_QUERY_LEN: usize = 2;

/// Server-side TTL for search responses.
const SEARCH_TTL: Duration = Duration::from_secs(300);

/// Excerpt context on either side of the first match, in characters.
const EXCERPT_CONTEXT: usize = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    slug: String,
    title: String,
    description: String,
    score: u32,
    excerpt: String,
    date: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
    pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: usize,
    limit: usize,
    total: usize,
    total_pages: usize,
}

/// `GET /api/search`
pub async fn search(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: QueryResult<SearchParams>,
) -> Result<ApiOk<serde_json::Value>, ApiError> {
    let params = parse_query(query)?;

    let q = params.q.as_deref().unwrap_or("").trim().to_string();
    if q.chars().count() < MIN_QUERY_LEN {
        return Err(ApiError::BadRequest(format!(
            "search query must be at least {MIN_QUERY_LEN} characters"
        )));
    }

    let page = params.page.unwrap_or(1).max(1);
    let limit = clamp_limit(params.limit, 10);
    let category = params.category.clone();
    let tag = params.tag.clone();

    let key = format!(
        "search:{q}:{page}:{limit}:{}:{}",
        category.as_deref().unwrap_or("-"),
        tag.as_deref().unwrap_or("-"),
    );

    let response = get_or_compute(&state.cache, &key, SEARCH_TTL, || async {
        Ok(execute(&state, &q, page, limit, category.as_deref(), tag.as_deref()).await)
    })
    .await?;

    Ok(ApiOk::new(json!(response)).with_request_id(ctx.id))
}

async fn execute(
    state: &AppState,
    q: &str,
    page: usize,
    limit: usize,
    category: Option<&str>,
    tag: Option<&str>,
) -> SearchResponse {
    let index = state.search_index().await;
    let needle = q.to_lowercase();

    let mut scored: Vec<(u32, &SearchDoc)> = index
        .docs
        .iter()
        .filter(|doc| category.is_none_or(|c| doc.post.in_category(c)))
        .filter(|doc| tag.is_none_or(|t| doc.post.has_tag(t)))
        .filter_map(|doc| {
            let score = score_doc(doc, &needle);
            (score > 0).then_some((score, doc))
        })
        .collect();

    // Highest score first; ties break toward newer posts.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.post.date.cmp(&a.1.post.date)));

    let total = scored.len();
    let total_pages = total.div_ceil(limit);

    let results = scored
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .map(|(score, doc)| SearchHit {
            slug: doc.post.slug.clone(),
            title: doc.post.title.clone(),
            description: doc.post.description.clone(),
            score,
            excerpt: excerpt(&doc.post.body, &doc.body, &needle),
            date: doc.post.date,
            category: doc.post.category.clone(),
            tags: doc.post.tags.clone(),
        })
        .collect();

    SearchResponse {
        query: q.to_string(),
        results,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
        },
    }
}

/// Relevance score in [0, 100]. Field weights mirror how readers search:
/// titles first, then descriptions and tags, body text last.
fn score_doc(doc: &SearchDoc, needle: &str) -> u32 {
    let mut score = 0;

    if doc.title == needle {
        return 100;
    }
    if doc.title.contains(needle) {
        score += 60;
    }
    if doc.description.contains(needle) {
        score += 25;
    }
    if doc.tags.iter().any(|t| t.contains(needle)) {
        score += 20;
    }
    if doc.category.as_deref().is_some_and(|c| c.contains(needle)) {
        score += 15;
    }
    if doc.body.contains(needle) {
        score += 15;
    }

    score.min(100)
}

/// A short window of body text around the first match, with every match
/// inside the window wrapped in `<mark>`.
///
/// Offsets are taken from the lowercased haystack; they are only reused
/// against the original text when lowercasing preserved byte length
/// (always true for ASCII). Otherwise the excerpt falls back to the start
/// of the body.
fn excerpt(body: &str, body_lc: &str, needle: &str) -> String {
    let aligned = body.len() == body_lc.len();

    let window = match body_lc.find(needle) {
        Some(pos) if aligned => {
            let start = clamp_boundary(body, pos.saturating_sub(EXCERPT_CONTEXT));
            let end = clamp_boundary(body, (pos + needle.len() + EXCERPT_CONTEXT).min(body.len()));
            let mut w = String::new();
            if start > 0 {
                w.push('…');
            }
            w.push_str(&body[start..end]);
            if end < body.len() {
                w.push('…');
            }
            w
        }
        _ => {
            let end = clamp_boundary(body, (2 * EXCERPT_CONTEXT).min(body.len()));
            let mut w = body[..end].to_string();
            if end < body.len() {
                w.push('…');
            }
            w
        }
    };

    highlight(&window, needle)
}

/// Wrap case-insensitive occurrences of `needle` in `<mark>` tags.
fn highlight(text: &str, needle: &str) -> String {
    let text_lc = text.to_lowercase();
    if text.len() != text_lc.len() || needle.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut cursor = 0;
    while let Some(found) = text_lc[cursor..].find(needle) {
        let start = cursor + found;
        let end = start + needle.len();
        if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            break;
        }
        out.push_str(&text[cursor..start]);
        out.push_str("<mark>");
        out.push_str(&text[start..end]);
        out.push_str("</mark>");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn clamp_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i.min(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentIndex, SearchIndex};
    use chrono::{TimeZone, Utc};
    use vellum_core::Post;

    fn doc(title: &str, body: &str) -> SearchDoc {
        let post = Post {
            slug: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            description: String::new(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            author: None,
            category: None,
            tags: Vec::new(),
            body: body.to_string(),
        };
        let index = ContentIndex::from_posts(vec![post]);
        SearchIndex::build(&index).docs.remove(0)
    }

    #[test]
    fn title_match_outranks_body_match() {
        let title_hit = score_doc(&doc("Rust Patterns", "nothing relevant"), "rust");
        let body_hit = score_doc(&doc("Other Topic", "some rust in the body"), "rust");
        assert!(title_hit > body_hit);
        assert_eq!(body_hit, 15);
    }

    #[test]
    fn exact_title_match_is_full_score() {
        assert_eq!(score_doc(&doc("Rust", "body"), "rust"), 100);
    }

    #[test]
    fn no_match_scores_zero() {
        assert_eq!(score_doc(&doc("Title", "body"), "zebra"), 0);
    }

    #[test]
    fn excerpt_highlights_matches() {
        let body = "Early text. The borrow checker is strict. More text follows here.";
        let out = excerpt(body, &body.to_lowercase(), "borrow");
        assert!(out.contains("<mark>borrow</mark>"), "got: {out}");
    }

    #[test]
    fn excerpt_windows_long_bodies() {
        let body = format!("{}needle{}", "a".repeat(500), "b".repeat(500));
        let out = excerpt(&body, &body.to_lowercase(), "needle");
        assert!(out.starts_with('…') && out.ends_with('…'));
        assert!(out.len() < 300);
    }

    #[test]
    fn highlight_preserves_original_case() {
        assert_eq!(
            highlight("Rust and rust", "rust"),
            "<mark>Rust</mark> and <mark>rust</mark>"
        );
    }

    #[test]
    fn excerpt_handles_non_ascii_bodies() {
        let body = "Überraschung! The needle is here.";
        let out = excerpt(body, &body.to_lowercase(), "needle");
        // Length changed under lowercasing is tolerated via the fallback.
        assert!(out.contains("needle") || out.contains("Überraschung"));
    }
}
