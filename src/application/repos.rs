//! Source traits describing content storage adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    entities::{ContentDocument, ContentKind},
    frontmatter::FrontmatterError,
};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content storage error: {0}")]
    Storage(String),
    #[error("invalid frontmatter in `{path}`")]
    Frontmatter {
        path: String,
        #[source]
        source: FrontmatterError,
    },
    #[error("content file `{path}` is not valid UTF-8")]
    Encoding { path: String },
}

impl ContentError {
    pub fn from_storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Read access to authored documents, keyed by kind and slug.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Slugs of every document of `kind`, in no particular order.
    async fn list(&self, kind: ContentKind) -> Result<Vec<String>, ContentError>;

    /// Load a single document; `Ok(None)` when no such document exists.
    async fn get(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentDocument>, ContentError>;
}
