use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use lol_html::{RewriteStrSettings, element, html_content::EndTag, rewrite_str, text};

use crate::{
    application::render::{
        paths::{BasePath, is_external_url},
        types::{ContentMetrics, RenderError},
    },
    domain::frontmatter::WORDS_PER_MINUTE,
};

#[derive(Default, Clone)]
struct AugmentState {
    internal_links: u32,
    external_links: u32,
    images: u32,
    code_blocks: u32,
    word_count: u32,
    // Open `<pre>` elements; their text is code and does not count as prose.
    pre_depth: u32,
    // Chunks of the current text node; lol_html may split one node.
    pending_text: String,
}

pub(crate) struct AugmentOutcome {
    pub(crate) html: String,
    pub(crate) metrics: ContentMetrics,
}

/// Final pass over rendered HTML: prefix root-relative `href`/`src` values
/// (covering raw HTML the Markdown walk never saw), open external links in a
/// new tab, default image loading hints, and collect content metrics.
pub(crate) fn augment_semantics(
    html: &str,
    base_path: &BasePath,
) -> Result<AugmentOutcome, RenderError> {
    let state = Rc::new(RefCell::new(AugmentState::default()));

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("img", {
                    let state = Rc::clone(&state);
                    let base_path = base_path.clone();
                    move |el| {
                        {
                            let mut state = state.borrow_mut();
                            state.images = state.images.saturating_add(1);
                        }

                        if let Some(src) = el.get_attribute("src") {
                            let prefixed = base_path.apply(&src);
                            if prefixed != src {
                                el.set_attribute("src", &prefixed)?;
                            }
                        }
                        if el.get_attribute("alt").is_none() {
                            el.set_attribute("alt", "")?;
                        }
                        if el.get_attribute("loading").is_none() {
                            el.set_attribute("loading", "lazy")?;
                        }
                        if el.get_attribute("decoding").is_none() {
                            el.set_attribute("decoding", "async")?;
                        }
                        Ok(())
                    }
                }),
                element!("a[href]", {
                    let state = Rc::clone(&state);
                    let base_path = base_path.clone();
                    move |el| {
                        let Some(href) = el.get_attribute("href") else {
                            return Ok(());
                        };

                        let prefixed = base_path.apply(&href).into_owned();
                        if prefixed != href {
                            el.set_attribute("href", &prefixed)?;
                        }

                        if is_external_url(&prefixed) {
                            state.borrow_mut().external_links += 1;
                            el.set_attribute("target", "_blank")?;
                            let rel_value =
                                merge_rel(el.get_attribute("rel"), &["noopener", "noreferrer"]);
                            el.set_attribute("rel", &rel_value)?;
                        } else if prefixed.starts_with('/') {
                            state.borrow_mut().internal_links += 1;
                        }
                        Ok(())
                    }
                }),
                element!("pre", {
                    let state = Rc::clone(&state);
                    move |el| {
                        {
                            let mut state = state.borrow_mut();
                            state.code_blocks = state.code_blocks.saturating_add(1);
                            state.pre_depth += 1;
                        }
                        if let Some(handlers) = el.end_tag_handlers() {
                            let state = Rc::clone(&state);
                            handlers.push(Box::new(move |_end: &mut EndTag<'_>| {
                                let mut state = state.borrow_mut();
                                state.pre_depth = state.pre_depth.saturating_sub(1);
                                Ok(())
                            }) as lol_html::EndTagHandler<'static>);
                        }
                        Ok(())
                    }
                }),
                text!("*", {
                    let state = Rc::clone(&state);
                    move |t| {
                        let mut state = state.borrow_mut();
                        if state.pre_depth > 0 {
                            state.pending_text.clear();
                            return Ok(());
                        }

                        state.pending_text.push_str(t.as_str());
                        if t.last_in_text_node() {
                            let words = state.pending_text.split_whitespace().count() as u32;
                            state.word_count = state.word_count.saturating_add(words);
                            state.pending_text.clear();
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::document(err.to_string()))?;

    let state = Rc::try_unwrap(state)
        .map(|cell| cell.into_inner())
        .unwrap_or_else(|rc| rc.borrow().clone());

    Ok(AugmentOutcome {
        html: rewritten,
        metrics: build_content_metrics(&state),
    })
}

fn build_content_metrics(state: &AugmentState) -> ContentMetrics {
    let reading_time_minutes = if state.word_count == 0 {
        0
    } else {
        state.word_count.div_ceil(WORDS_PER_MINUTE as u32).max(1)
    };

    ContentMetrics {
        reading_time_minutes,
        word_count: state.word_count,
        internal_links_count: state.internal_links,
        external_links_count: state.external_links,
        images_count: state.images,
        code_blocks_count: state.code_blocks,
    }
}

fn merge_rel(existing: Option<String>, required: &[&str]) -> String {
    let mut tokens: BTreeSet<String> = existing
        .unwrap_or_default()
        .split_whitespace()
        .map(|token| token.to_string())
        .collect();
    for &token in required {
        tokens.insert(token.to_string());
    }
    tokens.into_iter().collect::<Vec<_>>().join(" ")
}
