//! Feed endpoints: RSS 2.0 and JSON Feed 1.1.
//!
//! Output is capped at 50 items, newest first. Free-text fields in the
//! XML are CDATA-wrapped; attribute-position fields are entity-escaped.
//! `HEAD` returns headers only, with `Last-Modified` taken from the
//! newest post.

use axum::extract::{Extension, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use vellum_core::Post;

use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::routes::{parse_query, QueryResult};
use crate::state::AppState;

/// Maximum items in any feed rendition.
const FEED_ITEM_CAP: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedParams {
    pub format: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

/// `GET /api/rss`
pub async fn feed(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    query: QueryResult<FeedParams>,
) -> Result<Response, ApiError> {
    let params = parse_query(query)?;
    let posts = filtered_posts(&state, &params);

    let response = match params.format.as_deref() {
        Some("json") => {
            let body = build_json_feed(&state, &posts);
            (
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/feed+json; charset=utf-8"),
                )],
                serde_json::to_string(&body).map_err(anyhow::Error::new)?,
            )
                .into_response()
        }
        _ => {
            let body = build_rss_xml(&state, &posts);
            (
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/rss+xml; charset=utf-8"),
                )],
                body,
            )
                .into_response()
        }
    };

    Ok(response)
}

/// `HEAD /api/rss` - headers only.
pub async fn head_feed(
    State(state): State<AppState>,
    query: QueryResult<FeedParams>,
) -> Result<Response, ApiError> {
    let params = parse_query(query)?;
    let posts = filtered_posts(&state, &params);

    let content_type = match params.format.as_deref() {
        Some("json") => "application/feed+json; charset=utf-8",
        _ => "application/rss+xml; charset=utf-8",
    };

    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Some(newest) = posts.first() {
        if let Ok(value) = HeaderValue::from_str(&http_date(&newest.date)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
    Ok(response)
}

/// Posts for the requested filters, newest first, capped.
fn filtered_posts<'a>(state: &'a AppState, params: &FeedParams) -> Vec<&'a Post> {
    state
        .content
        .all()
        .iter()
        .filter(|p| {
            params
                .category
                .as_deref()
                .is_none_or(|c| p.in_category(c))
        })
        .filter(|p| params.tag.as_deref().is_none_or(|t| p.has_tag(t)))
        .take(FEED_ITEM_CAP)
        .collect()
}

fn build_rss_xml(state: &AppState, posts: &[&Post]) -> String {
    let config = &state.config;
    let mut xml = String::with_capacity(4096);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(
        r#"<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:atom="http://www.w3.org/2005/Atom">"#,
    );
    xml.push_str("<channel>");

    xml.push_str(&format!("<title>{}</title>", cdata(&config.site_name)));
    xml.push_str(&format!("<link>{}</link>", xml_escape(&config.base_url)));
    xml.push_str(&format!(
        "<description>{}</description>",
        cdata(&config.site_description)
    ));
    xml.push_str("<language>en</language>");
    xml.push_str(&format!(
        r#"<atom:link href="{}/api/rss" rel="self" type="application/rss+xml"/>"#,
        xml_escape(&config.base_url)
    ));

    let last_build = posts
        .first()
        .map(|p| p.date)
        .unwrap_or_else(Utc::now);
    xml.push_str(&format!(
        "<lastBuildDate>{}</lastBuildDate>",
        last_build.to_rfc2822()
    ));

    for post in posts {
        let link = format!("{}/blog/{}", config.base_url, post.slug);
        xml.push_str("<item>");
        xml.push_str(&format!("<title>{}</title>", cdata(&post.title)));
        xml.push_str(&format!("<link>{}</link>", xml_escape(&link)));
        xml.push_str(&format!(
            r#"<guid isPermaLink="true">{}</guid>"#,
            xml_escape(&link)
        ));
        xml.push_str(&format!("<pubDate>{}</pubDate>", post.date.to_rfc2822()));
        xml.push_str(&format!(
            "<description>{}</description>",
            cdata(&post.description)
        ));
        xml.push_str(&format!(
            "<content:encoded>{}</content:encoded>",
            cdata(&post.body)
        ));
        if let Some(category) = &post.category {
            xml.push_str(&format!("<category>{}</category>", xml_escape(category)));
        }
        for tag in &post.tags {
            xml.push_str(&format!("<category>{}</category>", xml_escape(tag)));
        }
        xml.push_str("</item>");
    }

    xml.push_str("</channel></rss>");
    xml
}

fn build_json_feed(state: &AppState, posts: &[&Post]) -> serde_json::Value {
    let config = &state.config;
    let items: Vec<_> = posts
        .iter()
        .map(|post| {
            let url = format!("{}/blog/{}", config.base_url, post.slug);
            json!({
                "id": url,
                "url": url,
                "title": post.title,
                "summary": post.description,
                "content_text": post.body,
                "date_published": post.date.to_rfc3339(),
                "tags": post.tags,
                "authors": post.author.as_ref().map(|a| vec![json!({"name": a})]),
            })
        })
        .collect();

    json!({
        "version": "https://jsonfeed.org/version/1.1",
        "title": config.site_name,
        "description": config.site_description,
        "home_page_url": config.base_url,
        "feed_url": format!("{}/api/rss?format=json", config.base_url),
        "items": items,
    })
}

/// RFC 7231 HTTP-date for the `Last-Modified` header.
fn http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Entity-escape for attribute and simple element positions.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// CDATA-wrap free text. An embedded `]]>` terminator is split across two
/// sections so it cannot close the block early.
fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_xml_entities() {
        assert_eq!(
            xml_escape(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&apos;"
        );
    }

    #[test]
    fn cdata_wraps_and_splits_terminators() {
        assert_eq!(cdata("plain"), "<![CDATA[plain]]>");
        let tricky = cdata("a]]>b");
        assert!(tricky.starts_with("<![CDATA[a"));
        assert!(!tricky.contains("a]]>b"));
    }

    #[test]
    fn http_date_is_gmt() {
        let date = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(http_date(&date), "Fri, 01 Mar 2024 00:00:00 GMT");
    }
}
