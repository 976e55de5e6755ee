use std::{
    collections::BTreeSet,
    fmt::Write as _,
    ops::RangeInclusive,
    sync::Arc,
    time::Instant,
};

use once_cell::sync::Lazy;
use syntect::{
    dumps::from_uncompressed_data,
    highlighting::ThemeSet,
    html::{ClassStyle, css_for_theme_with_class_style, line_tokens_to_classed_spans},
    parsing::{ParseState, Scope, ScopeStack, SyntaxReference, SyntaxSet},
};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::application::render::types::RenderError;

const CLASS_PREFIX: &str = "syntax-";
const LIGHT_THEME: &str = "InspiredGitHub";
const DARK_THEME: &str = "base16-ocean.dark";

/// Parsed code fence info string: ` ```typescript{3-5,9} `.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceInfo {
    pub language: String,
    pub emphasis: Vec<RangeInclusive<usize>>,
}

impl FenceInfo {
    /// Split the info string into a language token and the optional
    /// 1-based emphasis ranges in braces. Malformed range tokens are ignored.
    pub fn parse(info: &str) -> Self {
        let info = info.trim();
        let end = info
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .unwrap_or(info.len());
        let language = info[..end].to_ascii_lowercase();

        let emphasis = info[end..]
            .trim_start()
            .strip_prefix('{')
            .and_then(|rest| rest.split_once('}'))
            .map(|(ranges, _)| parse_ranges(ranges))
            .unwrap_or_default();

        Self {
            language: if language.is_empty() {
                "text".to_string()
            } else {
                language
            },
            emphasis,
        }
    }

    pub fn emphasizes(&self, line: usize) -> bool {
        self.emphasis.iter().any(|range| range.contains(&line))
    }
}

fn parse_ranges(raw: &str) -> Vec<RangeInclusive<usize>> {
    raw.split(',')
        .filter_map(|token| {
            let token = token.trim();
            let (start, end) = match token.split_once('-') {
                Some((start, end)) => (start.trim().parse().ok()?, end.trim().parse().ok()?),
                None => {
                    let line = token.parse().ok()?;
                    (line, line)
                }
            };
            (start >= 1 && start <= end).then_some(start..=end)
        })
        .collect()
}

/// Whole-line emphasis on a 1-based line, spanning `start..end` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDecoration {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// Decorations for every emphasised line that exists in `code`. Requested
/// lines past the end of the block produce nothing.
pub fn line_decorations(code: &str, fence: &FenceInfo) -> Vec<LineDecoration> {
    split_lines(code)
        .enumerate()
        .map(|(index, text)| (index + 1, text))
        .filter(|(line, _)| fence.emphasizes(*line))
        .map(|(line, text)| LineDecoration {
            line,
            start: 0,
            end: text.chars().count(),
        })
        .collect()
}

fn split_lines(code: &str) -> std::str::Split<'_, char> {
    code.strip_suffix('\n').unwrap_or(code).split('\n')
}

/// Syntax highlighter over the bundled syntax pack, emitting `syntax-`
/// prefixed classes so colours come from the generated theme stylesheet.
pub struct Highlighter {
    syntax_set: SyntaxSet,
}

impl Highlighter {
    /// Load the syntax pack embedded at build time.
    pub fn from_syntax_pack() -> Result<Self, RenderError> {
        let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
        let syntax_set: SyntaxSet = from_uncompressed_data(syntax_bytes)
            .map_err(|err| RenderError::highlighter_init(err.to_string()))?;
        Ok(Self::with_syntax_set(syntax_set))
    }

    pub fn with_syntax_set(syntax_set: SyntaxSet) -> Self {
        Self { syntax_set }
    }

    /// Highlight a fenced block and wrap it in the `code-block` container.
    /// Unknown languages are highlighted as plain text.
    pub fn render_code_block(&self, info: &str, code: &str) -> Result<String, RenderError> {
        let fence = FenceInfo::parse(info);
        let decorations = line_decorations(code, &fence);
        let body = self.highlight_lines(&fence.language, code, &decorations)?;
        Ok(wrap_code_block(&fence.language, &body))
    }

    /// Highlight `code` line by line. Every line becomes a
    /// `<span class="line">`; decorated lines gain an inner
    /// `<span class="highlighted-line">`. Scopes that continue across a line
    /// break are closed at the end of the line and reopened on the next so
    /// each line is well-formed on its own.
    pub fn highlight_lines(
        &self,
        language: &str,
        code: &str,
        decorations: &[LineDecoration],
    ) -> Result<String, RenderError> {
        let syntax = self
            .find_syntax(language)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let decorated: BTreeSet<usize> = decorations.iter().map(|d| d.line).collect();
        let class_style = ClassStyle::SpacedPrefixed {
            prefix: CLASS_PREFIX,
        };

        let mut parse_state = ParseState::new(syntax);
        let mut scope_stack = ScopeStack::new();
        let mut html = String::with_capacity(code.len() * 2);
        let mut line_buffer = String::new();

        for (index, line) in split_lines(code).enumerate() {
            if index > 0 {
                html.push('\n');
            }

            line_buffer.clear();
            line_buffer.push_str(line);
            line_buffer.push('\n');

            let ops = parse_state
                .parse_line(&line_buffer, &self.syntax_set)
                .map_err(|err| RenderError::highlighting(language, err.to_string()))?;

            let reopened = open_scope_spans(scope_stack.as_slice());
            let (mut spans, _) =
                line_tokens_to_classed_spans(&line_buffer, &ops, class_style, &mut scope_stack)
                    .map_err(|err| RenderError::highlighting(language, err.to_string()))?;
            if let Some(newline) = spans.rfind('\n') {
                spans.remove(newline);
            }

            let emphasised = decorated.contains(&(index + 1));
            html.push_str("<span class=\"line\">");
            if emphasised {
                html.push_str("<span class=\"highlighted-line\">");
            }
            html.push_str(&reopened);
            html.push_str(&spans);
            for _ in 0..scope_stack.len() {
                html.push_str("</span>");
            }
            if emphasised {
                html.push_str("</span>");
            }
            html.push_str("</span>");
        }

        Ok(html)
    }

    fn find_syntax(&self, token: &str) -> Option<&SyntaxReference> {
        let lowercase = token.to_ascii_lowercase();
        self.syntax_set
            .find_syntax_by_token(&lowercase)
            .or_else(|| self.syntax_set.find_syntax_by_name(&lowercase))
            .or_else(|| self.syntax_set.find_syntax_by_extension(&lowercase))
    }
}

fn open_scope_spans(scopes: &[Scope]) -> String {
    let mut html = String::new();
    for scope in scopes {
        let classes = scope
            .build_string()
            .split('.')
            .map(|atom| format!("{CLASS_PREFIX}{atom}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = write!(html, "<span class=\"{classes}\">");
    }
    html
}

fn wrap_code_block(language: &str, body: &str) -> String {
    let language = escape_attribute(language);
    format!(
        "<div class=\"code-block\" data-language=\"{language}\"><pre class=\"syntax-highlight syntax-lang-{language}\" data-language=\"{language}\"><code class=\"language-{language} syntax-code\">{body}</code></pre></div>"
    )
}

/// Unhighlighted fallback used when highlighting a block fails.
pub(crate) fn build_plain_code_block(info: &str, literal: &str) -> String {
    let fence = FenceInfo::parse(info);
    let escaped_code = escape_text(literal.strip_suffix('\n').unwrap_or(literal));
    let language = escape_attribute(&fence.language);
    format!(
        "<div class=\"code-block\" data-language=\"{language}\"><pre class=\"syntax-highlight\" data-language=\"{language}\"><code>{escaped_code}</code></pre></div>"
    )
}

pub(crate) fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub(crate) fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Stylesheet for the `syntax-` classes: the light theme by default and the
/// dark theme under `prefers-color-scheme: dark`, plus line emphasis rules.
pub fn theme_css() -> Result<String, RenderError> {
    let themes = ThemeSet::load_defaults();
    let class_style = ClassStyle::SpacedPrefixed {
        prefix: CLASS_PREFIX,
    };
    let theme = |name: &str| {
        themes
            .themes
            .get(name)
            .ok_or_else(|| RenderError::highlighter_init(format!("theme `{name}` is not bundled")))
    };

    let light = css_for_theme_with_class_style(theme(LIGHT_THEME)?, class_style)
        .map_err(|err| RenderError::highlighter_init(err.to_string()))?;
    let dark = css_for_theme_with_class_style(theme(DARK_THEME)?, class_style)
        .map_err(|err| RenderError::highlighter_init(err.to_string()))?;

    let mut css = String::with_capacity(light.len() + dark.len() + 256);
    css.push_str(&light);
    css.push_str("\n@media (prefers-color-scheme: dark) {\n");
    css.push_str(&dark);
    css.push_str("}\n\n");
    css.push_str(".code-block .line { display: inline-block; width: 100%; }\n");
    css.push_str(
        ".code-block .highlighted-line { display: inline-block; width: 100%; background-color: rgba(101, 117, 133, 0.16); }\n",
    );
    Ok(css)
}

type Loader = Arc<dyn Fn() -> Result<Highlighter, RenderError> + Send + Sync>;

/// Process-wide highlighter that is constructed at most once.
///
/// Concurrent first callers all wait on the same initialisation; loading the
/// syntax pack runs on the blocking pool. The outcome is stored whether or not
/// it succeeded, so a failed load is reported to every caller without running
/// the loader again.
pub struct SharedHighlighter {
    cell: OnceCell<Result<Arc<Highlighter>, RenderError>>,
    loader: Loader,
}

impl SharedHighlighter {
    pub fn new() -> Self {
        Self::with_loader(Highlighter::from_syntax_pack)
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Highlighter, RenderError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Arc::new(loader),
        }
    }

    /// Whether a highlighter has been loaded successfully.
    pub fn is_initialized(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    pub async fn get(&self) -> Result<Arc<Highlighter>, RenderError> {
        self.cell
            .get_or_init(|| self.load())
            .await
            .as_ref()
            .map(Arc::clone)
            .map_err(Clone::clone)
    }

    async fn load(&self) -> Result<Arc<Highlighter>, RenderError> {
        let loader = Arc::clone(&self.loader);
        let started = Instant::now();
        debug!(
            target = "application::render::highlight",
            "loading syntax highlighter"
        );

        let loaded = tokio::task::spawn_blocking(move || loader())
            .await
            .map_err(|err| RenderError::highlighter_init(err.to_string()))
            .and_then(|result| result);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let outcome = if loaded.is_ok() { "ok" } else { "error" };
        metrics::histogram!("quire_highlighter_init_ms", "outcome" => outcome).record(elapsed_ms);

        match loaded {
            Ok(highlighter) => {
                info!(
                    target = "application::render::highlight",
                    elapsed_ms, "syntax highlighter ready"
                );
                Ok(Arc::new(highlighter))
            }
            Err(err) => {
                error!(
                    target = "application::render::highlight",
                    elapsed_ms,
                    error = %err,
                    "syntax highlighter failed to load"
                );
                Err(err)
            }
        }
    }
}

impl Default for SharedHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_HIGHLIGHTER: Lazy<Arc<SharedHighlighter>> =
    Lazy::new(|| Arc::new(SharedHighlighter::new()));

/// Access the process-wide highlighter handle.
pub fn shared_highlighter() -> Arc<SharedHighlighter> {
    Arc::clone(&SHARED_HIGHLIGHTER)
}
