//! Responsive image resolution against the pre-generated variant ladder.
//!
//! Build-time optimisation writes resized copies of every raster image under
//! the optimised source root into a sibling variants folder, one file per
//! ladder width. Nothing here touches the filesystem; candidates are derived
//! purely from the source path and the configured ladder.

use serde::{Deserialize, Serialize};

use crate::application::render::paths::BasePath;

/// Widths the optimiser emits for every source image, ascending.
pub const SIZE_LADDER: [u32; 16] = [
    16, 32, 48, 64, 96, 128, 256, 384, 640, 750, 828, 1080, 1200, 1920, 2048, 3840,
];

/// Width of the article column in CSS pixels.
pub const CONTENT_WIDTH: u32 = 678;

/// Display width assumed when an image carries no width directive.
pub const DEFAULT_DISPLAY_WIDTH: u32 = 640;

pub const DEFAULT_MAX_DISPLAY_WIDTH: u32 = 1920;

const RASTER_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "avif"];

/// Viewport breakpoints used for fluid images, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub name: &'static str,
    pub max_width: u32,
}

pub const BREAKPOINTS: [Breakpoint; 4] = [
    Breakpoint {
        name: "mobile",
        max_width: 480,
    },
    Breakpoint {
        name: "tablet",
        max_width: 768,
    },
    Breakpoint {
        name: "desktop",
        max_width: 1024,
    },
    Breakpoint {
        name: "wide",
        max_width: 1440,
    },
];

/// Where optimised images live and how their variants are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePipelineConfig {
    pub source_root: String,
    pub variants_dir: String,
    pub variant_extension: String,
    pub max_display_width: u32,
    pub content_width: u32,
}

impl Default for ImagePipelineConfig {
    fn default() -> Self {
        Self {
            source_root: "/optimized-images".to_string(),
            variants_dir: "nextImageExportOptimizer".to_string(),
            variant_extension: "WEBP".to_string(),
            max_display_width: DEFAULT_MAX_DISPLAY_WIDTH,
            content_width: CONTENT_WIDTH,
        }
    }
}

/// Requested display width of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthSpec {
    /// Fixed width in CSS pixels.
    Pixels(u32),
    /// Fluid width as a percentage of the content column (1..=100).
    Percent(u32),
}

/// Authoring directives parsed out of an image's title slot, for example
/// `![Diagram](/optimized-images/a.png "width=50% center")`.
///
/// A title made only of unrecognised words is an ordinary title. As soon as
/// one token is recognised the whole string is treated as directives and no
/// visible title is emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRewriteSpec {
    pub width: Option<WidthSpec>,
    pub height: Option<u32>,
    pub center: bool,
    pub eager: bool,
    pub title: Option<String>,
}

impl ImageRewriteSpec {
    pub fn parse(title: &str) -> Self {
        let mut spec = Self::default();
        let mut recognised = false;

        for token in title.split_whitespace() {
            let lower = token.to_ascii_lowercase();
            if lower == "center" {
                spec.center = true;
                recognised = true;
            } else if lower == "eager" {
                spec.eager = true;
                recognised = true;
            } else if let Some(raw) = lower.strip_prefix("width=") {
                if let Some(width) = parse_width(raw) {
                    spec.width = Some(width);
                    recognised = true;
                }
            } else if let Some(raw) = lower.strip_prefix("height=")
                && let Some(height) = parse_pixels(raw)
            {
                spec.height = Some(height);
                recognised = true;
            }
        }

        if !recognised {
            let trimmed = title.trim();
            spec.title = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }

        spec
    }
}

fn parse_width(raw: &str) -> Option<WidthSpec> {
    match raw.strip_suffix('%') {
        Some(percent) => {
            let value: u32 = percent.parse().ok()?;
            (1..=100).contains(&value).then_some(WidthSpec::Percent(value))
        }
        None => parse_pixels(raw.strip_suffix("px").unwrap_or(raw)).map(WidthSpec::Pixels),
    }
}

fn parse_pixels(raw: &str) -> Option<u32> {
    let value: u32 = raw.strip_suffix("px").unwrap_or(raw).parse().ok()?;
    (value > 0).then_some(value)
}

/// Smallest ladder width that is at least `min(target, cap)`, or the largest
/// ladder width when nothing on the ladder is that wide.
///
/// ```
/// use quire::application::render::images::nearest_size;
///
/// assert_eq!(nearest_size(300, 1920), 384);
/// assert_eq!(nearest_size(640, 1920), 640);
/// assert_eq!(nearest_size(3000, 1920), 1920);
/// ```
pub fn nearest_size(target: u32, cap: u32) -> u32 {
    let target = target.min(cap);
    SIZE_LADDER
        .iter()
        .copied()
        .find(|size| *size >= target)
        .unwrap_or(SIZE_LADDER[SIZE_LADDER.len() - 1])
}

/// Attributes derived for an optimised image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsiveImage {
    pub src: String,
    pub srcset: String,
    pub sizes: Option<String>,
}

/// Whether `src` points at an optimised raster image with generated variants.
pub fn is_optimized_source(config: &ImagePipelineConfig, src: &str) -> bool {
    split_source(config, src).is_some()
}

/// Path of the variant of `src` at `width`, without any deployment prefix.
pub fn variant_path(config: &ImagePipelineConfig, src: &str, width: u32) -> Option<String> {
    let (dir, stem) = split_source(config, src)?;
    Some(format!(
        "{dir}/{}/{stem}-opt-{width}.{}",
        config.variants_dir, config.variant_extension
    ))
}

fn split_source<'a>(config: &ImagePipelineConfig, src: &'a str) -> Option<(&'a str, &'a str)> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    let root = config.source_root.trim_end_matches('/');
    let rest = path.strip_prefix(root)?;
    if !rest.starts_with('/') {
        return None;
    }

    let (dir, file) = path.rsplit_once('/')?;
    let (stem, extension) = file.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let extension = extension.to_ascii_lowercase();
    RASTER_EXTENSIONS
        .contains(&extension.as_str())
        .then_some((dir, stem))
}

/// Resolve `src`, `srcset` and `sizes` for an optimised image, with every
/// candidate path carrying the deployment prefix. Returns `None` when `src`
/// is not an optimised raster image.
///
/// Fixed widths produce density descriptors (`1x`, `2x`). Percentage widths
/// produce width descriptors for each breakpoint at 1x and 2x, plus a `sizes`
/// string so the browser can pick per viewport.
pub fn resolve(
    config: &ImagePipelineConfig,
    width: Option<WidthSpec>,
    src: &str,
    base_path: &BasePath,
) -> Option<ResponsiveImage> {
    if !is_optimized_source(config, src) {
        return None;
    }

    let cap = config.max_display_width;
    let candidate = |target: u32| -> Option<String> {
        let path = variant_path(config, src, nearest_size(target, cap))?;
        Some(base_path.apply(&path).into_owned())
    };

    match width.unwrap_or(WidthSpec::Pixels(DEFAULT_DISPLAY_WIDTH)) {
        WidthSpec::Pixels(pixels) => {
            let one_x = candidate(pixels)?;
            let two_x = candidate(pixels.saturating_mul(2))?;
            Some(ResponsiveImage {
                srcset: format!("{one_x} 1x, {two_x} 2x"),
                src: one_x,
                sizes: None,
            })
        }
        WidthSpec::Percent(percent) => {
            let nominal = scale(config.content_width, percent);
            let mut entries = Vec::with_capacity(BREAKPOINTS.len() * 2);
            for breakpoint in BREAKPOINTS {
                let display = scale(breakpoint.max_width, percent);
                for density in [1, 2] {
                    let descriptor = display * density;
                    entries.push(format!("{} {descriptor}w", candidate(descriptor)?));
                }
            }
            Some(ResponsiveImage {
                src: candidate(nominal)?,
                srcset: entries.join(", "),
                sizes: Some(fluid_sizes(percent)),
            })
        }
    }
}

fn scale(width: u32, percent: u32) -> u32 {
    ((u64::from(width) * u64::from(percent) + 50) / 100).max(1) as u32
}

fn fluid_sizes(percent: u32) -> String {
    let (wide, narrower) = BREAKPOINTS
        .split_last()
        .map(|(wide, rest)| (*wide, rest))
        .unwrap_or((BREAKPOINTS[0], &[]));

    let mut parts: Vec<String> = narrower
        .iter()
        .map(|bp| format!("(max-width: {}px) {percent}vw", bp.max_width))
        .collect();
    parts.push(format!("{}px", scale(wide.max_width, percent)));
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> ImagePipelineConfig {
        ImagePipelineConfig::default()
    }

    #[test]
    fn parses_directives() {
        let spec = ImageRewriteSpec::parse("width=50% center");
        assert_eq!(spec.width, Some(WidthSpec::Percent(50)));
        assert!(spec.center);
        assert!(!spec.eager);
        assert_eq!(spec.title, None);

        let spec = ImageRewriteSpec::parse("width=300 height=200 eager");
        assert_eq!(spec.width, Some(WidthSpec::Pixels(300)));
        assert_eq!(spec.height, Some(200));
        assert!(spec.eager);
    }

    #[test]
    fn plain_titles_survive() {
        let spec = ImageRewriteSpec::parse("A sunset over the bay");
        assert_eq!(spec.title.as_deref(), Some("A sunset over the bay"));
        assert_eq!(spec.width, None);
        assert_eq!(ImageRewriteSpec::parse("   ").title, None);
    }

    #[test]
    fn mixed_titles_are_treated_as_directives() {
        let spec = ImageRewriteSpec::parse("width=40% my caption");
        assert_eq!(spec.width, Some(WidthSpec::Percent(40)));
        assert_eq!(spec.title, None);
    }

    #[test]
    fn rejects_out_of_range_widths() {
        assert_eq!(ImageRewriteSpec::parse("width=0").width, None);
        assert_eq!(ImageRewriteSpec::parse("width=150%").width, None);
        assert_eq!(
            ImageRewriteSpec::parse("width=150%").title.as_deref(),
            Some("width=150%")
        );
    }

    #[test]
    fn nearest_size_rounds_up_and_caps() {
        assert_eq!(nearest_size(1, 1920), 16);
        assert_eq!(nearest_size(339, 1920), 384);
        assert_eq!(nearest_size(1921, 1920), 1920);
        assert_eq!(nearest_size(5000, 3840), 3840);
        assert_eq!(nearest_size(1500, 1000), 1080);
        assert_eq!(nearest_size(900, 1000), 1080);
        assert_eq!(nearest_size(500, 1000), 640);
    }

    #[test]
    fn variant_paths_sit_beside_the_source() {
        let cfg = config();
        assert_eq!(
            variant_path(&cfg, "/optimized-images/posts/cat.JPG", 640).as_deref(),
            Some("/optimized-images/posts/nextImageExportOptimizer/cat-opt-640.WEBP")
        );
        assert_eq!(variant_path(&cfg, "/images/cat.png", 640), None);
        assert_eq!(variant_path(&cfg, "/optimized-images/diagram.svg", 640), None);
        assert_eq!(variant_path(&cfg, "/optimized-imagesx/cat.png", 640), None);
    }

    #[test]
    fn fixed_width_uses_density_descriptors() {
        let resolved = resolve(
            &config(),
            Some(WidthSpec::Pixels(300)),
            "/optimized-images/a.png",
            &BasePath::default(),
        )
        .expect("optimized");

        assert_eq!(
            resolved.src,
            "/optimized-images/nextImageExportOptimizer/a-opt-384.WEBP"
        );
        assert_eq!(
            resolved.srcset,
            "/optimized-images/nextImageExportOptimizer/a-opt-384.WEBP 1x, \
             /optimized-images/nextImageExportOptimizer/a-opt-640.WEBP 2x"
        );
        assert_eq!(resolved.sizes, None);
    }

    #[test]
    fn fluid_width_emits_breakpoint_candidates() {
        let resolved = resolve(
            &config(),
            Some(WidthSpec::Percent(50)),
            "/optimized-images/a.png",
            &BasePath::new("/blog-app"),
        )
        .expect("optimized");

        let entries: Vec<_> = resolved.srcset.split(", ").collect();
        assert_eq!(entries.len(), 8);
        assert!(entries.iter().all(|entry| entry.starts_with("/blog-app/optimized-images/")));
        assert!(entries[0].ends_with("a-opt-256.WEBP 240w"));
        assert!(entries[7].ends_with("a-opt-1920.WEBP 1440w"));
        assert_eq!(
            resolved.src,
            "/blog-app/optimized-images/nextImageExportOptimizer/a-opt-384.WEBP"
        );
        assert_eq!(
            resolved.sizes.as_deref(),
            Some("(max-width: 480px) 50vw, (max-width: 768px) 50vw, (max-width: 1024px) 50vw, 720px")
        );
    }

    #[test]
    fn missing_width_defaults_to_fixed_layout() {
        let resolved = resolve(&config(), None, "/optimized-images/a.webp", &BasePath::default())
            .expect("optimized");
        assert!(resolved.src.ends_with("a-opt-640.WEBP"));
        assert!(resolved.srcset.ends_with("a-opt-1920.WEBP 2x"));
    }

    #[test]
    fn non_optimized_sources_are_not_resolved() {
        assert!(resolve(&config(), None, "https://example.com/a.png", &BasePath::default()).is_none());
        assert!(resolve(&config(), None, "/static/a.png", &BasePath::default()).is_none());
    }

    proptest! {
        #[test]
        fn nearest_size_is_monotonic(a in 1u32..5000, b in 1u32..5000) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(nearest_size(low, DEFAULT_MAX_DISPLAY_WIDTH) <= nearest_size(high, DEFAULT_MAX_DISPLAY_WIDTH));
        }

        #[test]
        fn nearest_size_is_on_ladder_and_covers_target(target in 1u32..=1920) {
            let size = nearest_size(target, DEFAULT_MAX_DISPLAY_WIDTH);
            prop_assert!(SIZE_LADDER.contains(&size));
            prop_assert!(size >= target);
            prop_assert!(size <= DEFAULT_MAX_DISPLAY_WIDTH);
        }

        #[test]
        fn nearest_size_covers_capped_target_for_any_cap(
            target in 1u32..8000,
            cap in 16u32..=3840,
        ) {
            let size = nearest_size(target, cap);
            prop_assert!(SIZE_LADDER.contains(&size));
            prop_assert!(size >= target.min(cap));
            prop_assert!(nearest_size(target.saturating_add(1), cap) >= size);
        }
    }
}
