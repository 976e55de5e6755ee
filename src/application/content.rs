use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::application::error::AppError;
use crate::application::render::{
    BasePath, Heading, RenderOutput, RenderRequest, RenderService,
};
use crate::application::repos::{ContentError, ContentSource};
use crate::domain::entities::{
    ContentDocument, ContentKind, ContentMetadata, sort_for_listing, validate_slug,
};
use crate::domain::error::DomainError;

const SOURCE: &str = "application::content::ContentService";

/// A document with its compiled body, ready for a page template.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    pub kind: ContentKind,
    pub slug: String,
    pub metadata: ContentMetadata,
    #[serde(flatten)]
    pub output: RenderOutput,
}

/// Joins the content source with the render pipeline.
#[derive(Clone)]
pub struct ContentService {
    source: Arc<dyn ContentSource>,
    renderer: Arc<dyn RenderService>,
    base_path: BasePath,
}

impl ContentService {
    pub fn new(
        source: Arc<dyn ContentSource>,
        renderer: Arc<dyn RenderService>,
        base_path: BasePath,
    ) -> Self {
        Self {
            source,
            renderer,
            base_path,
        }
    }

    pub fn base_path(&self) -> &BasePath {
        &self.base_path
    }

    /// Load a document or fail with a typed not-found.
    pub async fn document(&self, kind: ContentKind, slug: &str) -> Result<ContentDocument, AppError> {
        let slug = validate_slug(slug)?;
        let document = self
            .source
            .get(kind, slug)
            .await
            .map_err(|err| source_failure("get", err))?;

        document.ok_or_else(|| DomainError::not_found(kind.as_str(), slug).into())
    }

    /// Every document of `kind`, in listing order.
    pub async fn list(&self, kind: ContentKind) -> Result<Vec<ContentDocument>, AppError> {
        let slugs = self
            .source
            .list(kind)
            .await
            .map_err(|err| source_failure("list", err))?;

        let loaded = try_join_all(slugs.iter().map(|slug| self.source.get(kind, slug)))
            .await
            .map_err(|err| source_failure("get", err))?;

        let mut documents: Vec<ContentDocument> = loaded.into_iter().flatten().collect();
        sort_for_listing(kind, &mut documents);
        debug!(
            target = "application::content",
            kind = %kind,
            count = documents.len(),
            "listed documents"
        );
        Ok(documents)
    }

    /// Compile a stored document.
    pub async fn render(&self, kind: ContentKind, slug: &str) -> Result<RenderedDocument, AppError> {
        let document = self.document(kind, slug).await?;
        let request = RenderRequest::new(format!("{kind}/{}", document.slug), document.body_markdown.clone())
            .with_base_path(self.base_path.clone());
        let output = self.renderer.render(&request).await?;

        if output.degraded_blocks > 0 {
            warn!(
                target = "application::content",
                kind = %kind,
                slug = %document.slug,
                degraded_blocks = output.degraded_blocks,
                "document rendered with unhighlighted code blocks"
            );
        }

        Ok(RenderedDocument {
            kind,
            slug: document.slug,
            metadata: document.metadata,
            output,
        })
    }

    /// Heading list of a stored document.
    pub async fn table_of_contents(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Vec<Heading>, AppError> {
        Ok(self.render(kind, slug).await?.output.headings)
    }

    /// Compile Markdown that does not live in the content store.
    pub async fn render_markdown(
        &self,
        label: impl Into<String>,
        markdown: impl Into<String>,
    ) -> Result<RenderOutput, AppError> {
        let request = RenderRequest::new(label, markdown).with_base_path(self.base_path.clone());
        Ok(self.renderer.render(&request).await?)
    }
}

fn source_failure(operation: &'static str, err: ContentError) -> AppError {
    warn!(
        target = "application::content",
        source = SOURCE,
        operation,
        error = %err,
        "content source failed"
    );
    AppError::Content(err)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::application::render::{ContentMetrics, RenderError};

    #[derive(Default)]
    struct MemorySource {
        documents: HashMap<(ContentKind, String), ContentDocument>,
    }

    impl MemorySource {
        fn with(mut self, kind: ContentKind, slug: &str, priority: i64, body: &str) -> Self {
            let document = ContentDocument {
                kind,
                slug: slug.to_string(),
                metadata: ContentMetadata {
                    title: slug.to_uppercase(),
                    date: datetime!(2024-01-01 0:00 UTC),
                    priority,
                    ..ContentMetadata::default()
                },
                body_markdown: body.to_string(),
            };
            self.documents.insert((kind, slug.to_string()), document);
            self
        }
    }

    #[async_trait]
    impl ContentSource for MemorySource {
        async fn list(&self, kind: ContentKind) -> Result<Vec<String>, ContentError> {
            Ok(self
                .documents
                .keys()
                .filter(|(k, _)| *k == kind)
                .map(|(_, slug)| slug.clone())
                .collect())
        }

        async fn get(
            &self,
            kind: ContentKind,
            slug: &str,
        ) -> Result<Option<ContentDocument>, ContentError> {
            Ok(self.documents.get(&(kind, slug.to_string())).cloned())
        }
    }

    /// Echoes the request so tests can see what reached the renderer.
    struct EchoRenderer;

    #[async_trait]
    impl RenderService for EchoRenderer {
        async fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
            Ok(RenderOutput {
                html: format!("{}|{}", request.base_path, request.markdown),
                headings: vec![Heading {
                    id: "echo".to_string(),
                    text: request.label.clone(),
                    level: 1,
                }],
                contains_code: false,
                degraded_blocks: 0,
                content_metrics: ContentMetrics::default(),
            })
        }
    }

    fn service(source: MemorySource) -> ContentService {
        ContentService::new(
            Arc::new(source),
            Arc::new(EchoRenderer),
            BasePath::new("/blog-app"),
        )
    }

    #[tokio::test]
    async fn renders_documents_with_base_path() {
        let service = service(MemorySource::default().with(ContentKind::Post, "hello", 0, "# Hi"));
        let rendered = service.render(ContentKind::Post, "hello").await.expect("render");

        assert_eq!(rendered.output.html, "/blog-app|# Hi");
        assert_eq!(rendered.output.headings[0].text, "post/hello");
        assert_eq!(rendered.metadata.title, "HELLO");
    }

    #[tokio::test]
    async fn missing_documents_are_not_found() {
        let err = service(MemorySource::default())
            .render(ContentKind::Page, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn rejects_path_like_slugs_before_lookup() {
        let err = service(MemorySource::default())
            .document(ContentKind::Page, "../secrets")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn lists_in_listing_order() {
        let source = MemorySource::default()
            .with(ContentKind::Project, "low", 1, "")
            .with(ContentKind::Project, "high", 9, "")
            .with(ContentKind::Post, "post", 0, "");
        let listed = service(source).list(ContentKind::Project).await.expect("list");
        let slugs: Vec<_> = listed.iter().map(|doc| doc.slug.as_str()).collect();
        assert_eq!(slugs, vec!["high", "low"]);
    }
}
