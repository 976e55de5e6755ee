//! Deployment path prefixing for root-relative link and image targets.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Deployment-time path prefix (for example `/blog-app` when the site is
/// served from a project subdirectory). Always stored normalised: no trailing
/// slash, a single leading slash, or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BasePath(String);

impl BasePath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Self::default();
        }
        if trimmed.starts_with('/') {
            Self(trimmed.to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefix `path` with this base path. See [`with_base_path`].
    pub fn apply<'a>(&self, path: &'a str) -> Cow<'a, str> {
        with_base_path(path, &self.0)
    }
}

impl From<String> for BasePath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<BasePath> for String {
    fn from(value: BasePath) -> Self {
        value.0
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefix a root-relative `path` with `prefix`.
///
/// The path is returned unchanged when the prefix is empty, when the path is
/// not root-relative (relative paths, fragments, `mailto:`, absolute URLs),
/// when it is protocol-relative (`//cdn.example.com/...`), or when it already
/// carries the prefix. Applying the function twice is therefore a no-op.
///
/// ```
/// use quire::application::render::paths::with_base_path;
///
/// assert_eq!(with_base_path("/about", "/blog-app"), "/blog-app/about");
/// assert_eq!(with_base_path("/blog-app/about", "/blog-app"), "/blog-app/about");
/// assert_eq!(with_base_path("https://example.com/", "/blog-app"), "https://example.com/");
/// ```
pub fn with_base_path<'a>(path: &'a str, prefix: &str) -> Cow<'a, str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() || !path.starts_with('/') || path.starts_with("//") {
        return Cow::Borrowed(path);
    }

    if has_prefix(path, prefix) {
        return Cow::Borrowed(path);
    }

    Cow::Owned(format!("{prefix}{path}"))
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

/// Whether a link target points off-site. Mirrors the site's convention of
/// treating anything `http`-prefixed (and protocol-relative URLs) as external.
pub fn is_external_url(href: &str) -> bool {
    href.starts_with("http") || href.starts_with("//")
}
