use std::{borrow::Cow, collections::HashSet};

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::{ListStyleType, Options};

pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

/// Sanitiser for rendered documents. Raw HTML in Markdown is allowed through
/// the parser and filtered here; `target`/`rel` on external links are added
/// after sanitising, so ammonia is told not to inject `rel` itself.
pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "div",
        "em",
        "figcaption",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "input",
        "ins",
        "kbd",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "u",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
        "dl",
        "dt",
        "dd",
        "del",
        "mark",
        "picture",
        "source",
        "video",
        "audio",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "aria-hidden",
        "aria-label",
        "role",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
        "data-footnote-backref-idx",
    ]);
    builder.generic_attributes(generic);
    builder.add_generic_attribute_prefixes(&["data-"]);

    builder.link_rel(None);
    builder.add_tag_attributes("a", &["target"]);
    builder.add_tag_attributes(
        "img",
        &[
            "title", "width", "height", "alt", "loading", "decoding", "srcset", "sizes", "style",
        ],
    );
    builder.add_tag_attributes("source", &["srcset", "sizes", "type", "media", "src"]);
    builder.add_tag_attributes("video", &["src", "controls", "width", "height", "poster"]);
    builder.add_tag_attributes("audio", &["src", "controls"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);

    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());

    builder.attribute_filter(|_element, attribute, value| {
        if attribute.eq_ignore_ascii_case("style") {
            sanitize_style_attribute(value).map(Cow::Owned)
        } else {
            Some(Cow::Borrowed(value))
        }
    });

    builder
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some("---".to_string());
    ext.multiline_block_quotes = true;
    ext.alerts = true;
    ext.underline = true;
    ext.subscript = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.full_info_string = true;
    render.tasklist_classes = true;
    render.list_style = ListStyleType::Dash;
    render.r#unsafe = true;
    render.sourcepos = false;
    render.gfm_quirks = true;
}

fn sanitize_style_attribute(value: &str) -> Option<String> {
    let mut sanitized = Vec::new();

    for declaration in value.split(';') {
        let decl = declaration.trim();
        if decl.is_empty() {
            continue;
        }

        if is_safe_style_declaration(decl) {
            sanitized.push(decl);
        }
    }

    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized.join("; "))
    }
}

fn is_safe_style_declaration(decl: &str) -> bool {
    let lower = decl.to_ascii_lowercase();

    const FORBIDDEN_SUBSTRINGS: [&str; 7] = [
        "expression(",
        "javascript:",
        "vbscript:",
        "-moz-binding",
        "behavior:",
        "behaviour:",
        "@import",
    ];

    if FORBIDDEN_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return false;
    }

    !contains_unsafe_url(&lower)
}

fn contains_unsafe_url(lower_decl: &str) -> bool {
    let mut offset = 0;

    while let Some(start) = lower_decl[offset..].find("url(") {
        let open = offset + start + 4;
        let rest = &lower_decl[open..];
        if let Some(close_rel) = rest.find(')') {
            let close = open + close_rel;
            let target = &lower_decl[open..close];
            let trimmed = target.trim_matches(|c: char| c.is_whitespace() || c == '\'');
            let trimmed = trimmed.trim_matches('"');

            if is_unsafe_url(trimmed) {
                return true;
            }

            offset = close + 1;
        } else {
            // unterminated url(
            return true;
        }
    }

    false
}

fn is_unsafe_url(url: &str) -> bool {
    if url.starts_with("data:image/") {
        return false;
    }

    url.starts_with("data:") || url.starts_with("file:") || url.contains("script:")
}
