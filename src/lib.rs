//! Markdown rendering pipeline for a static personal site.
//!
//! Authored `.mdx` documents are compiled into sanitised HTML with anchored
//! headings, highlighted code, deployment-prefixed links and responsive images.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
