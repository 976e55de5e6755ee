//! Markdown rendering pipeline.
//!
//! The pipeline is pure with respect to its inputs: Markdown plus a
//! deployment prefix go in, sanitised HTML and a table of contents come out.
//! The only shared state is the lazily constructed syntax highlighter.

pub mod images;
pub mod paths;
mod service;
mod types;

pub use paths::{BasePath, is_external_url, with_base_path};
pub use service::{
    FenceInfo, Highlighter, LineDecoration, MarkdownCompiler, RenderConfigError,
    RenderPipelineConfig, SharedHighlighter, configure_render_service, line_decorations,
    render_service, shared_highlighter, theme_css,
};
pub use types::{ContentMetrics, Heading, RenderError, RenderOutput, RenderRequest, RenderService};
