//! Content index: the read-only boundary to the blog's post corpus.
//!
//! The real site renders posts from MDX through its own pipeline; the API
//! only needs existence checks and metadata. This index loads a directory
//! of markdown files with `---` front matter once at startup and exposes
//! lookups over the result. Swapping in a different loader (CMS, database)
//! only has to reproduce this surface.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};

use vellum_core::Post;

/// Immutable, date-descending index of published posts.
pub struct ContentIndex {
    posts: Vec<Post>,
    by_slug: HashMap<String, usize>,
}

impl ContentIndex {
    /// Build an index from already-loaded posts (used by tests and by
    /// embedders with their own loader).
    pub fn from_posts(mut posts: Vec<Post>) -> Self {
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        let by_slug = posts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.slug.clone(), i))
            .collect();
        Self { posts, by_slug }
    }

    /// Load every `.md`/`.mdx` file under `dir`.
    ///
    /// Files that fail to parse are skipped with a warning; a missing
    /// directory yields an empty index so the API still serves feeds and
    /// counters for a content-less deployment.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut posts = Vec::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "content directory unreadable, starting empty");
                return Ok(Self::from_posts(posts));
            }
        };

        for entry in entries {
            let path = entry?.path();
            let is_markdown = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "md" || e == "mdx");
            if !is_markdown {
                continue;
            }

            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path)?;
            match parse_post(slug, &raw) {
                Ok(post) => posts.push(post),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unparseable post");
                }
            }
        }

        tracing::info!(posts = posts.len(), dir = %dir.display(), "content index loaded");
        Ok(Self::from_posts(posts))
    }

    pub fn exists(&self, slug: &str) -> bool {
        self.by_slug.contains_key(slug)
    }

    pub fn get(&self, slug: &str) -> Option<&Post> {
        self.by_slug.get(slug).map(|&i| &self.posts[i])
    }

    /// All posts, newest first.
    pub fn all(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Parse one markdown document with `---` front matter.
fn parse_post(slug: &str, raw: &str) -> anyhow::Result<Post> {
    let rest = raw
        .strip_prefix("---")
        .ok_or_else(|| anyhow::anyhow!("missing front matter"))?;
    let (front, body) = rest
        .split_once("\n---")
        .ok_or_else(|| anyhow::anyhow!("unterminated front matter"))?;

    let mut fields: HashMap<&str, String> = HashMap::new();
    for line in front.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim(), value.trim().to_string());
        }
    }

    let title = fields
        .remove("title")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing title"))?;
    let date_raw = fields
        .remove("date")
        .ok_or_else(|| anyhow::anyhow!("missing date"))?;
    let date = parse_date(&date_raw)?;

    let tags = fields
        .remove("tags")
        .map(|raw| {
            raw.trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(Post {
        slug: slug.to_string(),
        title,
        description: fields.remove("description").unwrap_or_default(),
        date,
        author: fields.remove("author").filter(|a| !a.is_empty()),
        category: fields.remove("category").filter(|c| !c.is_empty()),
        tags,
        body: body.trim_start_matches('\n').to_string(),
    })
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date {raw:?}: {e}"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid date {raw:?}"))?;
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

/// Lowercased search corpus derived from a [`ContentIndex`].
///
/// Built at most once per cache window by the search route; scoring happens
/// over these precomputed haystacks rather than re-lowercasing every post
/// per query.
pub struct SearchIndex {
    pub docs: Vec<SearchDoc>,
}

pub struct SearchDoc {
    pub post: Post,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

impl SearchIndex {
    pub fn build(index: &ContentIndex) -> Self {
        let docs = index
            .all()
            .iter()
            .map(|post| SearchDoc {
                title: post.title.to_lowercase(),
                description: post.description.to_lowercase(),
                body: post.body.to_lowercase(),
                tags: post.tags.iter().map(|t| t.to_lowercase()).collect(),
                category: post.category.as_ref().map(|c| c.to_lowercase()),
                post: post.clone(),
            })
            .collect();
        Self { docs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DOC: &str = "---\ntitle: Hello World\ndescription: The first post\ndate: 2024-03-01\nauthor: Ada\ncategory: Meta\ntags: intro, rust\n---\n\nWelcome to the blog.\n";

    #[test]
    fn parses_front_matter() {
        let post = parse_post("hello-world", DOC).unwrap();
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.title, "Hello World");
        assert_eq!(post.description, "The first post");
        assert_eq!(post.author.as_deref(), Some("Ada"));
        assert_eq!(post.category.as_deref(), Some("Meta"));
        assert_eq!(post.tags, vec!["intro", "rust"]);
        assert_eq!(
            post.date,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(post.body, "Welcome to the blog.\n");
    }

    #[test]
    fn parses_bracketed_tags() {
        let doc = "---\ntitle: T\ndate: 2024-01-01\ntags: [a, b]\n---\nbody";
        let post = parse_post("t", doc).unwrap();
        assert_eq!(post.tags, vec!["a", "b"]);
    }

    #[test]
    fn rejects_missing_title() {
        let doc = "---\ndate: 2024-01-01\n---\nbody";
        assert!(parse_post("x", doc).is_err());
    }

    #[test]
    fn rejects_missing_front_matter() {
        assert!(parse_post("x", "just a body").is_err());
    }

    #[test]
    fn accepts_rfc3339_dates() {
        let doc = "---\ntitle: T\ndate: 2024-03-01T12:30:00Z\n---\nbody";
        let post = parse_post("t", doc).unwrap();
        assert_eq!(
            post.date,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn index_sorts_newest_first_and_looks_up_by_slug() {
        let older = parse_post("older", "---\ntitle: B\ndate: 2024-02-01\n---\nb").unwrap();
        let newer = parse_post("newer", "---\ntitle: A\ndate: 2024-03-01\n---\na").unwrap();
        let index = ContentIndex::from_posts(vec![older, newer]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.all()[0].slug, "newer");
        assert!(index.exists("older"));
        assert!(!index.exists("missing"));
        assert_eq!(index.get("older").unwrap().title, "B");
    }

    #[test]
    fn load_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.md"), DOC).unwrap();
        std::fs::write(dir.path().join("bad.md"), "no front matter").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let index = ContentIndex::load(dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.exists("good"));
    }

    #[test]
    fn load_missing_directory_is_empty() {
        let index = ContentIndex::load(Path::new("/definitely/not/here")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn search_index_lowercases_haystacks() {
        let post = parse_post("hello-world", DOC).unwrap();
        let index = ContentIndex::from_posts(vec![post]);
        let search = SearchIndex::build(&index);
        assert_eq!(search.docs[0].title, "hello world");
        assert_eq!(search.docs[0].tags, vec!["intro", "rust"]);
    }
}
