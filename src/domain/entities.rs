//! Domain entities mirrored from the content directory.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::error::DomainError;

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_AUTHOR: &str = "Anonymous";

/// The three families of content the site publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Project,
    Page,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Project => "project",
            ContentKind::Page => "page",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "post" | "posts" | "blog" => Ok(ContentKind::Post),
            "project" | "projects" => Ok(ContentKind::Project),
            "page" | "pages" => Ok(ContentKind::Page),
            other => Err(DomainError::validation(format!(
                "unknown content kind `{other}` (expected post, project or page)"
            ))),
        }
    }
}

/// Frontmatter-derived metadata with the site's authoring fallbacks applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentMetadata {
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub author: String,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub github: String,
    pub priority: i64,
    pub reading_time: String,
}

impl Default for ContentMetadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: String::new(),
            date: OffsetDateTime::now_utc(),
            author: DEFAULT_AUTHOR.to_string(),
            keywords: Vec::new(),
            tags: Vec::new(),
            github: String::new(),
            priority: 0,
            reading_time: String::new(),
        }
    }
}

/// A single content item: metadata plus the raw Markdown body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentDocument {
    pub kind: ContentKind,
    pub slug: String,
    pub metadata: ContentMetadata,
    pub body_markdown: String,
}

/// Sort documents into listing order: posts newest first, projects and pages
/// by descending priority. Ties keep slug order so listings are stable.
pub fn sort_for_listing(kind: ContentKind, documents: &mut [ContentDocument]) {
    match kind {
        ContentKind::Post => documents.sort_by(|a, b| {
            b.metadata
                .date
                .cmp(&a.metadata.date)
                .then_with(|| a.slug.cmp(&b.slug))
        }),
        ContentKind::Project | ContentKind::Page => documents.sort_by(|a, b| {
            b.metadata
                .priority
                .cmp(&a.metadata.priority)
                .then_with(|| a.slug.cmp(&b.slug))
        }),
    }
}

/// Validate a slug before it is used to address the content store.
pub fn validate_slug(slug: &str) -> Result<&str, DomainError> {
    let trimmed = slug.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("content slug must not be empty"));
    }
    if trimmed.contains(['/', '\\']) || trimmed.starts_with('.') {
        return Err(DomainError::validation(format!(
            "content slug `{trimmed}` must be a plain file stem"
        )));
    }
    Ok(trimmed)
}
