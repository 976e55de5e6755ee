use comrak::{
    format_html,
    nodes::{AstNode, NodeHtmlBlock, NodeValue},
    options::Options,
};
use tracing::warn;

use crate::{
    application::render::{
        images::{self, ImagePipelineConfig, ImageRewriteSpec, WidthSpec},
        paths::BasePath,
        types::Heading,
    },
    domain::slug::{AnchorSlugger, plain_text},
};

use super::highlight::{Highlighter, build_plain_code_block, escape_attribute, escape_text};

/// Deepest heading level recorded in the table of contents.
const TOC_MAX_LEVEL: u8 = 3;

#[derive(Debug, Default)]
pub(crate) struct RewriteOutcome {
    pub(crate) headings: Vec<Heading>,
    pub(crate) contains_code: bool,
    pub(crate) degraded_blocks: u32,
}

pub(crate) struct RewriteContext<'a> {
    pub(crate) highlighter: &'a Highlighter,
    pub(crate) options: &'a Options<'static>,
    pub(crate) images: &'a ImagePipelineConfig,
    pub(crate) base_path: &'a BasePath,
    pub(crate) label: &'a str,
}

/// Walk the parsed document once, replacing code blocks, images and headings
/// with pre-rendered HTML and prefixing root-relative link targets.
pub(crate) fn rewrite_ast<'a>(root: &'a AstNode<'a>, context: &RewriteContext<'_>) -> RewriteOutcome {
    let mut walker = RewriteWalker {
        context,
        outcome: RewriteOutcome::default(),
        slugger: AnchorSlugger::new(),
    };
    walker.visit_nodes(root);
    walker.outcome
}

struct RewriteWalker<'c, 'a> {
    context: &'c RewriteContext<'a>,
    outcome: RewriteOutcome,
    slugger: AnchorSlugger,
}

impl RewriteWalker<'_, '_> {
    fn visit_nodes<'n>(&mut self, node: &'n AstNode<'n>) {
        if let Some((info, literal)) = extract_code_block(node) {
            self.process_code_block(node, &info, &literal);
            return;
        }

        if is_image(node) {
            self.process_image_node(node);
            return;
        }

        self.process_link_node(node);

        let mut child = node.first_child();
        while let Some(next) = child {
            self.visit_nodes(next);
            child = next.next_sibling();
        }

        if let Some(level) = heading_level(node) {
            self.process_heading(node, level);
        }
    }

    fn process_code_block(&mut self, node: &AstNode<'_>, info: &str, literal: &str) {
        let html = match self.context.highlighter.render_code_block(info, literal) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target = "application::render::highlight",
                    document = self.context.label,
                    error = %err,
                    "code block left unhighlighted"
                );
                metrics::counter!("quire_render_degraded_total", "stage" => "highlight")
                    .increment(1);
                self.outcome.degraded_blocks = self.outcome.degraded_blocks.saturating_add(1);
                build_plain_code_block(info, literal)
            }
        };

        self.outcome.contains_code = true;
        let mut data = node.data.borrow_mut();
        data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal: html,
        });
    }

    fn process_image_node(&mut self, node: &AstNode<'_>) {
        let (src, title) = {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Image(link) => (link.url.clone(), link.title.clone()),
                _ => return,
            }
        };

        let alt_raw = collect_inline_text(node);
        let alt = alt_raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let spec = ImageRewriteSpec::parse(&title);
        let html = build_image_html(&src, &alt, &spec, self.context.images, self.context.base_path);

        {
            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlInline(html);
        }

        while let Some(child) = node.first_child() {
            child.detach();
        }
    }

    fn process_link_node(&mut self, node: &AstNode<'_>) {
        let mut data = node.data.borrow_mut();
        if let NodeValue::Link(link) = &mut data.value {
            let rewritten = self.context.base_path.apply(&link.url).into_owned();
            link.url = rewritten;
        }
    }

    fn process_heading(&mut self, node: &AstNode<'_>, level: u8) {
        let inner = render_inline_children(node, self.context.options)
            .unwrap_or_else(|message| self.plain_heading_content(node, &message));

        let id = self.slugger.anchor_for(&inner);
        if level <= TOC_MAX_LEVEL {
            let text = plain_text(&inner)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            self.outcome.headings.push(Heading {
                id: id.clone(),
                text,
                level,
            });
        }

        let html = format!(
            "<h{level} id=\"{}\">{inner}</h{level}>\n",
            escape_attribute(&id)
        );

        {
            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: html,
            });
        }

        while let Some(child) = node.first_child() {
            child.detach();
        }
    }

    /// Escaped plain text of a heading whose inline markup failed to render.
    fn plain_heading_content(&self, node: &AstNode<'_>, message: &str) -> String {
        warn!(
            target = "application::render::headings",
            document = self.context.label,
            error = %message,
            "heading content rendered as plain text"
        );
        metrics::counter!("quire_render_degraded_total", "stage" => "heading").increment(1);
        escape_text(&collect_inline_text(node))
    }
}

fn render_inline_children(node: &AstNode<'_>, options: &Options<'static>) -> Result<String, String> {
    let mut html = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        format_html(next, options, &mut html).map_err(|err| err.to_string())?;
        child = next.next_sibling();
    }
    Ok(html.trim().to_string())
}

fn build_image_html(
    src: &str,
    alt: &str,
    spec: &ImageRewriteSpec,
    config: &ImagePipelineConfig,
    base_path: &BasePath,
) -> String {
    let responsive = images::resolve(config, spec.width, src, base_path);
    let final_src = match &responsive {
        Some(resolved) => resolved.src.clone(),
        None => base_path.apply(src).into_owned(),
    };

    let mut html = String::with_capacity(final_src.len() + alt.len() + 128);
    html.push_str("<img src=\"");
    html.push_str(&escape_attribute(&final_src));
    html.push_str("\" alt=\"");
    html.push_str(&escape_attribute(alt));
    html.push('"');

    if let Some(title) = spec.title.as_deref() {
        html.push_str(" title=\"");
        html.push_str(&escape_attribute(title));
        html.push('"');
    }

    if let Some(resolved) = &responsive {
        html.push_str(" srcset=\"");
        html.push_str(&escape_attribute(&resolved.srcset));
        html.push('"');
        if let Some(sizes) = &resolved.sizes {
            html.push_str(" sizes=\"");
            html.push_str(&escape_attribute(sizes));
            html.push('"');
        }
    }

    if let Some(WidthSpec::Pixels(width)) = spec.width {
        html.push_str(&format!(" width=\"{width}\""));
    }
    if let Some(height) = spec.height {
        html.push_str(&format!(" height=\"{height}\""));
    }

    let mut style = Vec::new();
    if spec.center {
        style.push("display: block; margin-left: auto; margin-right: auto".to_string());
    }
    if let Some(WidthSpec::Percent(percent)) = spec.width {
        style.push(format!("width: {percent}%; height: auto"));
    }
    if !style.is_empty() {
        html.push_str(" style=\"");
        html.push_str(&style.join("; "));
        html.push('"');
    }

    let loading = if spec.eager { "eager" } else { "lazy" };
    html.push_str(&format!(" loading=\"{loading}\" decoding=\"async\" />"));
    html
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        walk(next, &mut text);
        child = next.next_sibling();
    }
    text
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}

fn is_image(node: &AstNode<'_>) -> bool {
    matches!(node.data.borrow().value, NodeValue::Image(_))
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    let data = node.data.borrow();
    if let NodeValue::Heading(heading) = &data.value {
        Some(heading.level)
    } else {
        None
    }
}
