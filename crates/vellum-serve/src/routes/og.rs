//! Open Graph share-card generation.
//!
//! Renders a 1200x630 PNG for social embeds: dark background, site name,
//! wrapped post title, description, author/date footer. Card fields come
//! from explicit query parameters, a post looked up by slug, or the site
//! defaults, in that order. Rendered cards are cached in memory.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use vellum_core::metrics;

use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::routes::{parse_query, QueryResult};
use crate::state::AppState;

/// Standard Open Graph dimensions.
const OG_WIDTH: u32 = 1200;
const OG_HEIGHT: u32 = 630;

/// Display caps before truncation.
const TITLE_MAX_CHARS: usize = 60;
const DESCRIPTION_MAX_CHARS: usize = 120;

/// Rough character budget per wrapped title line at the chosen font size.
const TITLE_WRAP_CHARS: usize = 26;

const FONT_FAMILY: &str = "Inter, -apple-system, BlinkMacSystemFont, Segoe UI, Roboto, sans-serif";

#[derive(Debug, Clone, Deserialize)]
pub struct OgParams {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

/// `GET /api/og`
pub async fn card(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    query: QueryResult<OgParams>,
) -> Result<Response, ApiError> {
    let params = parse_query(query)?;

    let post = params
        .slug
        .as_deref()
        .and_then(|slug| state.content.get(slug));

    let title = params
        .title
        .clone()
        .or_else(|| post.map(|p| p.title.clone()))
        .unwrap_or_else(|| state.config.site_name.clone());
    let description = params
        .description
        .clone()
        .or_else(|| post.map(|p| p.description.clone()).filter(|d| !d.is_empty()))
        .unwrap_or_else(|| state.config.site_description.clone());
    let author = params
        .author
        .clone()
        .or_else(|| post.and_then(|p| p.author.clone()))
        .unwrap_or_else(|| state.config.site_author.clone());
    let date = params
        .date
        .clone()
        .or_else(|| post.map(|p| p.date.format("%b %e, %Y").to_string()))
        .unwrap_or_default();

    let title = truncate_chars(&title, TITLE_MAX_CHARS);
    let description = truncate_chars(&description, DESCRIPTION_MAX_CHARS);

    let key = format!("{title}|{description}|{author}|{date}");
    if let Some(cached) = state.og_cache.get(&key).await {
        tracing::debug!("og card cache hit");
        metrics::record_cache_hit("og");
        return Ok(png_response(&cached));
    }
    metrics::record_cache_miss("og");

    let png = generate_card(&state.config.site_name, &title, &description, &author, &date)?;
    let png = Arc::new(png);
    state.og_cache.insert(key, png.clone()).await;

    Ok(png_response(&png))
}

/// Build an HTTP response with PNG content and cache headers.
fn png_response(png_bytes: &[u8]) -> Response {
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600, s-maxage=86400"),
        ),
    ];
    (StatusCode::OK, headers, png_bytes.to_vec()).into_response()
}

/// Render the card as a PNG via an in-memory SVG.
fn generate_card(
    site_name: &str,
    title: &str,
    description: &str,
    author: &str,
    date: &str,
) -> Result<Vec<u8>, ApiError> {
    let mut svg = String::with_capacity(4096);

    svg.push_str(&format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="{w}" height="{h}" fill="#0b0b10"/><rect x="0" y="0" width="{w}" height="8" fill="#d946ef"/>"##,
        w = OG_WIDTH,
        h = OG_HEIGHT,
    ));

    // Site name, top left.
    svg.push_str(&format!(
        r##"<text x="80" y="110" font-family="{font}" font-size="32" font-weight="700" letter-spacing="2" fill="#d946ef">{site}</text>"##,
        font = FONT_FAMILY,
        site = svg_escape(&site_name.to_uppercase()),
    ));

    // Wrapped title.
    for (i, line) in wrap_text(title, TITLE_WRAP_CHARS).iter().take(3).enumerate() {
        svg.push_str(&format!(
            r##"<text x="80" y="{y}" font-family="{font}" font-size="64" font-weight="800" fill="#ffffff">{line}</text>"##,
            y = 230 + i * 78,
            font = FONT_FAMILY,
            line = svg_escape(line),
        ));
    }

    // Description under the title block.
    svg.push_str(&format!(
        r##"<text x="80" y="490" font-family="{font}" font-size="30" fill="#9ca3af">{desc}</text>"##,
        font = FONT_FAMILY,
        desc = svg_escape(description),
    ));

    // Author and date footer.
    let footer = if date.is_empty() {
        author.to_string()
    } else {
        format!("{author} · {date}")
    };
    svg.push_str(&format!(
        r##"<text x="80" y="570" font-family="{font}" font-size="28" font-weight="600" fill="#e5e7eb">{footer}</text>"##,
        font = FONT_FAMILY,
        footer = svg_escape(&footer),
    ));

    svg.push_str("</svg>");

    let mut options = resvg::usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = resvg::usvg::Tree::from_str(&svg, &options)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("SVG parse error: {e}")))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(OG_WIDTH, OG_HEIGHT)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("failed to create pixmap")))?;

    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::default(),
        &mut pixmap.as_mut(),
    );

    let png = pixmap
        .encode_png()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("PNG encode error: {e}")))?;

    Ok(png)
}

/// Truncate to a character budget, appending an ellipsis when cut.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Greedy word wrap by character budget. Overlong single words get their
/// own line rather than being split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn svg_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
