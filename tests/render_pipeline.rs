use std::sync::Arc;

use quire::{
    application::{
        content::ContentService,
        render::{
            BasePath, Heading, MarkdownCompiler, RenderOutput, RenderPipelineConfig,
            RenderRequest, shared_highlighter,
        },
    },
    domain::entities::ContentKind,
    infra::content::FsContentStore,
};

const KITCHEN_SINK: &str = include_str!("fixtures/kitchen_sink.mdx");

fn compiler() -> MarkdownCompiler {
    MarkdownCompiler::new(RenderPipelineConfig::default(), shared_highlighter())
}

async fn render(markdown: &str, base_path: &str) -> RenderOutput {
    let request = RenderRequest::new("fixture", markdown).with_base_path(BasePath::new(base_path));
    compiler()
        .compile(&request)
        .await
        .expect("render succeeds")
}

/// Value of the first `name="…"` attribute on the tag that contains `marker`.
fn attribute_near<'a>(html: &'a str, marker: &str, name: &str) -> Option<&'a str> {
    let at = html.find(marker)?;
    let tag_start = html[..at].rfind('<')?;
    let tag_end = at + html[at..].find('>')?;
    let tag = &html[tag_start..tag_end];
    let needle = format!(" {name}=\"");
    let value_start = tag.find(&needle)? + needle.len();
    let value_len = tag[value_start..].find('"')?;
    Some(&tag[value_start..value_start + value_len])
}

#[tokio::test]
async fn headings_are_anchored_and_listed() {
    let output = render(KITCHEN_SINK, "").await;

    assert_eq!(
        output.headings,
        vec![
            Heading {
                id: "hello-world".to_string(),
                text: "Hello, World!".to_string(),
                level: 2,
            },
            Heading {
                id: "setup".to_string(),
                text: "Setup".to_string(),
                level: 3,
            },
            Heading {
                id: "setup-1".to_string(),
                text: "Setup".to_string(),
                level: 3,
            },
        ]
    );
    assert!(output.html.contains("<h2 id=\"hello-world\">Hello, World!</h2>"));
    assert!(output.html.contains("<h3 id=\"setup-1\">Setup</h3>"));
    assert!(output.html.contains("<h4 id=\"deep-dive\">Deep dive</h4>"));
}

#[tokio::test]
async fn emphasised_lines_are_wrapped() {
    let output = render(KITCHEN_SINK, "").await;

    assert!(output.contains_code);
    assert_eq!(output.degraded_blocks, 0);
    assert_eq!(output.html.matches("class=\"highlighted-line\"").count(), 2);
    assert_eq!(output.html.matches("<span class=\"line\">").count(), 4);
    assert!(output.html.contains("data-language=\"typescript\""));
}

#[tokio::test]
async fn out_of_range_emphasis_only_marks_existing_lines() {
    let markdown = "```rust{2-40}\nfn main() {\n    println!(\"hi\");\n}\n```\n";
    let output = render(markdown, "").await;

    assert_eq!(output.html.matches("class=\"highlighted-line\"").count(), 2);
}

#[tokio::test]
async fn unknown_languages_render_as_plain_text() {
    let output = render("```klingon\nqapla'\n```\n", "").await;

    assert_eq!(output.degraded_blocks, 0);
    assert!(output.html.contains("data-language=\"klingon\""));
    assert!(output.html.contains("qapla"));
}

#[tokio::test]
async fn fluid_images_get_width_descriptors() {
    let output = render(KITCHEN_SINK, "").await;
    let html = &output.html;

    let srcset = attribute_near(html, "alt=\"Architecture diagram\"", "srcset").expect("srcset present");
    assert_eq!(srcset.split(", ").count(), 8);
    assert!(srcset.ends_with("diagram-opt-1920.WEBP 1440w"));

    let sizes = attribute_near(html, "alt=\"Architecture diagram\"", "sizes").expect("sizes present");
    assert!(sizes.starts_with("(max-width: 480px) 50vw"));
    assert!(sizes.ends_with("720px"));

    let style = attribute_near(html, "alt=\"Architecture diagram\"", "style").expect("style present");
    assert!(style.contains("margin-left: auto"));
    assert!(style.contains("width: 50%"));
    assert!(attribute_near(html, "alt=\"Architecture diagram\"", "title").is_none());
}

#[tokio::test]
async fn fixed_images_get_density_descriptors() {
    let output = render(KITCHEN_SINK, "").await;
    let html = &output.html;

    let srcset = attribute_near(html, "alt=\"Logo\"", "srcset").expect("srcset present");
    assert_eq!(
        srcset,
        "/optimized-images/nextImageExportOptimizer/logo-opt-256.WEBP 1x, \
         /optimized-images/nextImageExportOptimizer/logo-opt-640.WEBP 2x"
    );
    assert_eq!(attribute_near(html, "alt=\"Logo\"", "width"), Some("200"));
    assert_eq!(attribute_near(html, "alt=\"Logo\"", "loading"), Some("eager"));
}

#[tokio::test]
async fn plain_titles_stay_tooltips() {
    let output = render(KITCHEN_SINK, "").await;

    assert_eq!(
        attribute_near(&output.html, "plain.png", "title"),
        Some("A tooltip")
    );
    assert!(attribute_near(&output.html, "plain.png", "srcset").is_none());
    assert_eq!(
        attribute_near(&output.html, "plain.png", "loading"),
        Some("lazy")
    );
}

#[tokio::test]
async fn base_path_prefixes_links_and_images_once() {
    let output = render(KITCHEN_SINK, "/blog-app").await;
    let html = &output.html;

    assert!(html.contains("href=\"/blog-app/about\""));
    assert!(!html.contains("/blog-app/blog-app"));
    assert_eq!(
        attribute_near(html, "plain.png", "src"),
        Some("/blog-app/static/plain.png")
    );
    let srcset = attribute_near(html, "alt=\"Architecture diagram\"", "srcset").expect("srcset present");
    assert!(
        srcset
            .split(", ")
            .all(|candidate| candidate.starts_with("/blog-app/optimized-images/"))
    );
}

#[tokio::test]
async fn external_links_open_in_new_tab() {
    let output = render(KITCHEN_SINK, "/blog-app").await;
    let html = &output.html;

    assert_eq!(
        attribute_near(html, "doc.rust-lang.org", "target"),
        Some("_blank")
    );
    assert_eq!(
        attribute_near(html, "doc.rust-lang.org", "rel"),
        Some("noopener noreferrer")
    );
    assert!(attribute_near(html, "/blog-app/about", "target").is_none());
    assert_eq!(output.content_metrics.external_links_count, 1);
    assert_eq!(output.content_metrics.internal_links_count, 1);
    assert_eq!(output.content_metrics.images_count, 3);
    assert_eq!(output.content_metrics.code_blocks_count, 1);
}

#[tokio::test]
async fn raw_scripts_are_sanitised() {
    let output = render("Hello <script>alert(1)</script> world", "").await;
    assert!(!output.html.contains("<script"));
    assert!(output.html.contains("Hello"));
}

#[tokio::test]
async fn frontmatter_is_skipped_by_the_compiler() {
    let output = render(KITCHEN_SINK, "").await;
    assert!(!output.html.contains("Shipping the Blog"));
    assert!(!output.html.contains("author:"));
}

#[tokio::test]
async fn renders_documents_from_the_content_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("blog")).expect("blog dir");
    std::fs::write(dir.path().join("blog/shipping.mdx"), KITCHEN_SINK).expect("write post");

    let service = ContentService::new(
        Arc::new(FsContentStore::new(dir.path())),
        Arc::new(compiler()),
        BasePath::new("/blog-app"),
    );

    let rendered = service
        .render(ContentKind::Post, "shipping")
        .await
        .expect("post renders");
    assert_eq!(rendered.metadata.title, "Shipping the Blog");
    assert_eq!(rendered.metadata.author, "Sam");
    assert!(rendered.output.html.contains("href=\"/blog-app/about\""));

    let toc = service
        .table_of_contents(ContentKind::Post, "shipping")
        .await
        .expect("toc");
    assert_eq!(toc.len(), 3);

    let listed = service.list(ContentKind::Post).await.expect("list");
    assert_eq!(listed.len(), 1);

    let missing = service.render(ContentKind::Post, "nope").await;
    assert!(missing.is_err());
}
