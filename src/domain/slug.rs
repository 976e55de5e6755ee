//! Utilities for generating deterministic heading anchors.
//!
//! Anchors are derived from the *rendered* inline HTML of a heading, so inline
//! emphasis and code spans are resolved before slugification. The base anchor
//! only ever contains `[a-z0-9-]`; anything else collapses into a single
//! hyphen.

use std::collections::{HashMap, HashSet};

/// Derive the base anchor for a rendered heading without uniqueness handling.
///
/// ```
/// use quire::domain::slug::anchor_base;
///
/// assert_eq!(anchor_base("Hello, World!"), "hello-world");
/// assert_eq!(anchor_base("Using <code>Option&lt;T&gt;</code>"), "using-option-t");
/// assert_eq!(anchor_base("?!"), "");
/// ```
pub fn anchor_base(rendered: &str) -> String {
    let text = plain_text(rendered);

    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.chars().filter(|ch| *ch != '`') {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(lower);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Strip tags from rendered inline HTML and decode the entities that commonly
/// appear in titles.
pub fn plain_text(rendered: &str) -> String {
    decode_title_entities(&strip_tags(rendered))
}

fn strip_tags(html: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let mut inside_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => inside_tag = true,
            '>' if inside_tag => inside_tag = false,
            _ if !inside_tag => output.push(ch),
            _ => {}
        }
    }

    output
}

const TITLE_ENTITIES: [(&str, char); 5] = [
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&amp;", '&'),
    ("&quot;", '"'),
    ("&#39;", '\''),
];

fn decode_title_entities(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        output.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match TITLE_ENTITIES
            .iter()
            .find(|(entity, _)| candidate.starts_with(entity))
        {
            Some((entity, decoded)) => {
                output.push(*decoded);
                rest = &candidate[entity.len()..];
            }
            None => {
                output.push('&');
                rest = &candidate[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

/// Deterministically generate unique anchor slugs within a single document.
///
/// Headings processed in order receive suffixes counting prior collisions
/// (e.g. `setup`, `setup-1`, `setup-2`). A suffixed candidate that was already
/// handed out verbatim (a heading literally titled "Setup 1") is skipped.
#[derive(Default, Debug)]
pub struct AnchorSlugger {
    occurrences: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl AnchorSlugger {
    /// Create a new slugger instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an anchor for the provided rendered heading text, unique
    /// within this slugger. Degenerate headings produce an empty base anchor
    /// rather than an error.
    pub fn anchor_for(&mut self, rendered: &str) -> String {
        let base = anchor_base(rendered);
        let count = self.occurrences.entry(base.clone()).or_insert(0);

        loop {
            let candidate = if *count == 0 {
                base.clone()
            } else {
                format!("{base}-{}", *count)
            };
            *count += 1;

            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
