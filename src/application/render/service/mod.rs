mod augment;
pub(crate) mod config;
mod highlight;
mod rewrite;

use std::sync::Arc;

use async_trait::async_trait;
use comrak::{Arena, format_html, nodes::AstNode, parse_document};
use once_cell::sync::{Lazy, OnceCell};
use thiserror::Error;
use tracing::{debug, error};

use crate::application::render::{
    images::ImagePipelineConfig,
    types::{RenderError, RenderOutput, RenderRequest, RenderService},
};

pub use highlight::{
    FenceInfo, Highlighter, LineDecoration, SharedHighlighter, line_decorations,
    shared_highlighter, theme_css,
};

use augment::augment_semantics;
use config::{build_sanitizer, default_options};
use rewrite::{RewriteContext, RewriteOutcome, rewrite_ast};

/// Comrak-based Markdown compiler with Syntect highlighting, responsive image
/// rewriting and Ammonia sanitisation.
pub struct MarkdownCompiler {
    options: comrak::options::Options<'static>,
    sanitizer: ammonia::Builder<'static>,
    images: ImagePipelineConfig,
    highlighter: Arc<SharedHighlighter>,
}

impl MarkdownCompiler {
    pub fn new(config: RenderPipelineConfig, highlighter: Arc<SharedHighlighter>) -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
            images: config.images,
            highlighter,
        }
    }

    /// Compile Markdown into sanitised HTML plus its table of contents.
    pub async fn compile(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let result = match self.highlighter.get().await {
            Ok(highlighter) => self.compile_with(&highlighter, request, true),
            Err(err) => {
                error!(
                    target = "application::render",
                    document = %request.label,
                    error = %err,
                    "syntax highlighter unavailable"
                );
                Err(err)
            }
        };
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("quire_render_total", "outcome" => outcome).increment(1);
        result
    }

    /// Compile Markdown while skipping the sanitisation stage. Intended for
    /// diagnosing sanitiser rules.
    pub async fn compile_unsanitized(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let highlighter = self.highlighter.get().await?;
        self.compile_with(&highlighter, request, false)
            .map(|output| output.html)
    }

    fn compile_with(
        &self,
        highlighter: &Highlighter,
        request: &RenderRequest,
        sanitize: bool,
    ) -> Result<RenderOutput, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, &request.markdown, &self.options);

        let context = RewriteContext {
            highlighter,
            options: &self.options,
            images: &self.images,
            base_path: &request.base_path,
            label: &request.label,
        };
        let RewriteOutcome {
            headings,
            contains_code,
            degraded_blocks,
        } = rewrite_ast(root, &context);

        let rendered_html = render_html_stage(root, &self.options)?;
        let cleaned_html = if sanitize {
            self.sanitizer.clean(&rendered_html).to_string()
        } else {
            rendered_html
        };
        let augmented = augment_semantics(&cleaned_html, &request.base_path)?;

        debug!(
            target = "application::render",
            document = %request.label,
            headings = headings.len(),
            degraded_blocks,
            sanitized = sanitize,
            "document rendered"
        );

        Ok(RenderOutput {
            html: augmented.html,
            headings,
            contains_code: contains_code || augmented.metrics.code_blocks_count > 0,
            degraded_blocks,
            content_metrics: augmented.metrics,
        })
    }
}

#[async_trait]
impl RenderService for MarkdownCompiler {
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        self.compile(request).await
    }
}

fn render_html_stage<'a>(
    root: &'a AstNode<'a>,
    options: &comrak::options::Options<'static>,
) -> Result<String, RenderError> {
    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| RenderError::markdown(err.to_string()))?;
    Ok(html)
}

#[derive(Debug, Clone, Default)]
pub struct RenderPipelineConfig {
    pub images: ImagePipelineConfig,
}

impl From<&crate::config::RenderSettings> for RenderPipelineConfig {
    fn from(settings: &crate::config::RenderSettings) -> Self {
        Self {
            images: settings.images.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderConfigError {
    #[error("render service already configured")]
    AlreadyConfigured,
}

static RENDER_PIPELINE_CONFIG: OnceCell<RenderPipelineConfig> = OnceCell::new();

static RENDER_SERVICE: Lazy<Arc<MarkdownCompiler>> = Lazy::new(|| {
    Arc::new(MarkdownCompiler::new(
        active_render_config(),
        shared_highlighter(),
    ))
});

/// Install the pipeline configuration. Must run before the first call to
/// [`render_service`]; later calls are rejected.
pub fn configure_render_service(config: RenderPipelineConfig) -> Result<(), RenderConfigError> {
    RENDER_PIPELINE_CONFIG
        .set(config)
        .map_err(|_| RenderConfigError::AlreadyConfigured)
}

/// Access the shared render service instance, initialised on first use.
pub fn render_service() -> Arc<MarkdownCompiler> {
    Arc::clone(&RENDER_SERVICE)
}

fn active_render_config() -> RenderPipelineConfig {
    RENDER_PIPELINE_CONFIG.get().cloned().unwrap_or_default()
}
