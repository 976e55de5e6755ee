use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::render::paths::BasePath;

/// Rendering request passed into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Identifies the document in logs (usually `kind/slug` or a file path).
    pub label: String,
    /// Markdown body with frontmatter already stripped.
    pub markdown: String,
    /// Deployment prefix applied to root-relative link and image targets.
    #[serde(default)]
    pub base_path: BasePath,
}

impl RenderRequest {
    pub fn new(label: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            markdown: markdown.into(),
            base_path: BasePath::default(),
        }
    }

    pub fn with_base_path(mut self, base_path: BasePath) -> Self {
        self.base_path = base_path;
        self
    }
}

/// A heading captured for the table of contents. Only levels 1 through 3 are
/// recorded; deeper headings still receive anchors in the HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub id: String,
    pub text: String,
    pub level: u8,
}

/// Content-level metrics surfaced alongside rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContentMetrics {
    pub reading_time_minutes: u32,
    pub word_count: u32,
    pub internal_links_count: u32,
    pub external_links_count: u32,
    pub images_count: u32,
    pub code_blocks_count: u32,
}

/// Deterministic rendering result returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    /// Sanitised HTML ready to embed in a page template.
    pub html: String,
    /// Table-of-contents entries in document order.
    pub headings: Vec<Heading>,
    /// Indicates whether the rendered HTML contains any code blocks.
    pub contains_code: bool,
    /// Code blocks that fell back to unhighlighted output.
    #[serde(default)]
    pub degraded_blocks: u32,
    #[serde(default)]
    pub content_metrics: ContentMetrics,
}

/// Structured errors surfaced by the rendering pipeline. Per-block problems
/// are degraded in place; only these whole-document failures escape.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("syntax highlighter failed to initialise: {message}")]
    HighlighterInit { message: String },
    #[error("document processing failed: {message}")]
    Document { message: String },
}

impl RenderError {
    pub fn markdown(message: impl Into<String>) -> Self {
        Self::Markdown {
            message: message.into(),
        }
    }

    pub fn highlighting(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Highlighting {
            language: language.into(),
            message: message.into(),
        }
    }

    pub fn highlighter_init(message: impl Into<String>) -> Self {
        Self::HighlighterInit {
            message: message.into(),
        }
    }

    pub fn document(message: impl Into<String>) -> Self {
        Self::Document {
            message: message.into(),
        }
    }
}

/// Trait exposed by the rendering pipeline. Given the same request an
/// implementation returns identical output.
#[async_trait]
pub trait RenderService: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError>;
}
