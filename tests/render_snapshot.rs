use quire::application::render::{
    BasePath, MarkdownCompiler, RenderPipelineConfig, RenderRequest, shared_highlighter,
};

fn load_markdown() -> String {
    include_str!("fixtures/snapshot_post.mdx").to_string()
}

fn request() -> RenderRequest {
    RenderRequest::new("snapshot-post", load_markdown()).with_base_path(BasePath::new("/blog-app"))
}

fn compiler() -> MarkdownCompiler {
    MarkdownCompiler::new(RenderPipelineConfig::default(), shared_highlighter())
}

#[tokio::test]
async fn snapshot_fixture_raw_output_matches() {
    let html = compiler()
        .compile_unsanitized(&request())
        .await
        .expect("unsanitized render succeeds");

    let expected = include_str!("fixtures/snapshot_post_raw.html");
    assert_eq!(expected.trim_end(), html.trim_end());
}

#[tokio::test]
async fn snapshot_fixture_sanitized_output_matches() {
    let output = compiler()
        .compile(&request())
        .await
        .expect("sanitized render succeeds");

    let expected = include_str!("fixtures/snapshot_post.html");
    assert_eq!(expected.trim_end(), output.html.trim_end());
}

#[tokio::test]
async fn snapshot_fixture_metrics_match() {
    let output = compiler()
        .compile(&request())
        .await
        .expect("sanitized render succeeds");

    assert_eq!(output.degraded_blocks, 0);
    assert!(output.contains_code);
    assert_eq!(output.content_metrics.internal_links_count, 1);
    assert_eq!(output.content_metrics.external_links_count, 1);
    assert_eq!(output.content_metrics.images_count, 2);
    assert_eq!(output.content_metrics.code_blocks_count, 1);
    // Prose only: the code block and the stripped script contribute nothing.
    assert_eq!(output.content_metrics.word_count, 21);
    assert_eq!(output.content_metrics.reading_time_minutes, 1);
}
