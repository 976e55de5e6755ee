//! YAML frontmatter extraction and normalisation into [`ContentMetadata`].

use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use thiserror::Error;
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

use crate::domain::entities::{
    ContentDocument, ContentKind, ContentMetadata, DEFAULT_AUTHOR, DEFAULT_TITLE,
};

pub const WORDS_PER_MINUTE: usize = 200;

/// Errors emitted while parsing or extracting frontmatter.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("unterminated YAML frontmatter block: expected closing '---'")]
    Unterminated,
    #[error("frontmatter parse error: {0}")]
    Parse(String),
    #[error("frontmatter field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl FrontmatterError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrontmatter {
    title: Option<String>,
    description: Option<String>,
    date: Option<YamlValue>,
    author: Option<String>,
    keywords: Option<YamlValue>,
    tags: Option<YamlValue>,
    github: Option<String>,
    priority: Option<YamlValue>,
}

/// Split a source file into its YAML block (if any) and the Markdown body.
///
/// Leading blank lines and a UTF-8 BOM are skipped before looking for the
/// opening `---` fence.
pub fn split_frontmatter(input: &str) -> Result<(Option<&str>, &str), FrontmatterError> {
    let source = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut cursor = 0usize;

    while let Some((line, next)) = next_line(source, cursor) {
        if line.trim().is_empty() {
            cursor = next;
            continue;
        }

        if !is_yaml_fence(line) {
            return Ok((None, input));
        }

        let block_start = next;
        let mut scan = next;
        while let Some((block_line, after)) = next_line(source, scan) {
            if is_yaml_fence(block_line) {
                let block = source[block_start..scan].trim_end_matches(['\r', '\n']);
                return Ok((Some(block), &source[after..]));
            }
            scan = after;
        }
        return Err(FrontmatterError::Unterminated);
    }

    Ok((None, input))
}

/// Parse a full source file into a [`ContentDocument`], applying the
/// authoring fallbacks (`Untitled`, `Anonymous`, current timestamp).
pub fn parse_document(
    kind: ContentKind,
    slug: &str,
    source: &str,
) -> Result<ContentDocument, FrontmatterError> {
    let (block, body) = split_frontmatter(source)?;
    let raw = match block {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str::<Option<RawFrontmatter>>(yaml)
            .map_err(|err| FrontmatterError::Parse(err.to_string()))?
            .unwrap_or_default(),
        _ => RawFrontmatter::default(),
    };

    let metadata = ContentMetadata {
        title: non_empty(raw.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        description: raw.description.unwrap_or_default(),
        date: match raw.date {
            Some(value) => parse_date(&value)?,
            None => OffsetDateTime::now_utc(),
        },
        author: non_empty(raw.author).unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        keywords: raw.keywords.as_ref().map(split_list).unwrap_or_default(),
        tags: raw.tags.as_ref().map(split_list).unwrap_or_default(),
        github: raw.github.unwrap_or_default(),
        priority: raw.priority.as_ref().map(parse_priority).unwrap_or(0),
        reading_time: reading_time(body),
    };

    Ok(ContentDocument {
        kind,
        slug: slug.to_string(),
        metadata,
        body_markdown: body.to_string(),
    })
}

/// Estimate reading time in the `"N min read"` form shown next to posts.
pub fn reading_time(body: &str) -> String {
    let words = body.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    format!("{minutes} min read")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(value: &YamlValue) -> Result<OffsetDateTime, FrontmatterError> {
    let YamlValue::String(raw) = value else {
        return Err(FrontmatterError::invalid("date", "expected a date string"));
    };
    let raw = raw.trim();

    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(parsed);
    }

    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map(|date| date.midnight().assume_utc())
        .map_err(|err| FrontmatterError::invalid("date", format!("`{raw}`: {err}")))
}

/// Comma-separated strings split on `,\s*`; YAML sequences are accepted too.
fn split_list(value: &YamlValue) -> Vec<String> {
    match value {
        YamlValue::String(raw) => raw
            .split(',')
            .map(|item| item.trim_start().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        YamlValue::Sequence(items) => items
            .iter()
            .filter_map(|item| match item {
                YamlValue::String(s) => Some(s.clone()),
                YamlValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_priority(value: &YamlValue) -> i64 {
    match value {
        YamlValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        YamlValue::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn is_yaml_fence(line: &str) -> bool {
    line.trim_end_matches('\r').trim_end() == "---"
}

fn next_line(input: &str, start: usize) -> Option<(&str, usize)> {
    if start >= input.len() {
        return None;
    }

    match input[start..].find('\n') {
        Some(pos) => Some((&input[start..start + pos], start + pos + 1)),
        None => Some((&input[start..], input.len())),
    }
}
