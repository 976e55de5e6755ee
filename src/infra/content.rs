//! Filesystem-backed content source reading `.mdx` files from the content directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument};

use crate::application::repos::{ContentError, ContentSource};
use crate::domain::entities::{ContentDocument, ContentKind, validate_slug};
use crate::domain::frontmatter::parse_document;

const CONTENT_EXTENSION: &str = "mdx";

/// Reads documents from `<root>/blog`, `<root>/projects` and `<root>` itself.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn directory_for(&self, kind: ContentKind) -> PathBuf {
        match kind {
            ContentKind::Post => self.root.join("blog"),
            ContentKind::Project => self.root.join("projects"),
            ContentKind::Page => self.root.clone(),
        }
    }

    fn path_for(&self, kind: ContentKind, slug: &str) -> PathBuf {
        self.directory_for(kind)
            .join(format!("{slug}.{CONTENT_EXTENSION}"))
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[async_trait]
impl ContentSource for FsContentStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list(&self, kind: ContentKind) -> Result<Vec<String>, ContentError> {
        let directory = self.directory_for(kind);
        let mut entries = match fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    target = "infra::content",
                    directory = %directory.display(),
                    "content directory missing; treating as empty"
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(ContentError::from_storage(err)),
        };

        let mut slugs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(ContentError::from_storage)?
        {
            let file_type = entry.file_type().await.map_err(ContentError::from_storage)?;
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CONTENT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                slugs.push(stem.to_string());
            }
        }

        slugs.sort();
        Ok(slugs)
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn get(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentDocument>, ContentError> {
        if validate_slug(slug).is_err() {
            return Ok(None);
        }

        let path = self.path_for(kind, slug);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ContentError::from_storage(err)),
        };

        let source = String::from_utf8(bytes).map_err(|_| ContentError::Encoding {
            path: self.display_path(&path),
        })?;

        parse_document(kind, slug, &source)
            .map(Some)
            .map_err(|source| ContentError::Frontmatter {
                path: self.display_path(&path),
                source,
            })
    }
}
