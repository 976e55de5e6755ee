use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::entities::ContentKind;

/// Command-line arguments for the quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Render the site's Markdown content")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "QUIRE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the compiled HTML of a stored document.
    Render(RenderArgs),
    /// Compile an arbitrary Markdown file (frontmatter is skipped).
    #[command(name = "render-file")]
    RenderFile(RenderFileArgs),
    /// Print the heading list of a stored document as JSON.
    Toc(DocumentArgs),
    /// Print the slugs and titles of a content kind in listing order.
    List(ListArgs),
    /// Print the stylesheet for highlighted code blocks.
    #[command(name = "theme-css")]
    ThemeCss,
}

#[derive(Debug, Args, Clone)]
pub struct DocumentArgs {
    /// Content kind: post, project or page.
    #[arg(value_name = "KIND")]
    pub kind: ContentKind,

    /// File stem of the document.
    #[arg(value_name = "SLUG")]
    pub slug: String,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Skip sanitisation; for inspecting what the sanitiser removes.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub unsanitized: bool,

    /// Emit the document metadata, headings and metrics as JSON instead of bare HTML.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RenderFileArgs {
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Skip sanitisation; for inspecting what the sanitiser removes.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub unsanitized: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    #[arg(value_name = "KIND")]
    pub kind: ContentKind,
}

/// Settings overrides accepted by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Deployment prefix for root-relative links and images, e.g. `/blog-app`.
    #[arg(long = "base-path", env = "BASE_PATH", value_name = "PREFIX", global = true)]
    pub base_path: Option<String>,

    /// Override the content directory.
    #[arg(
        long = "content-dir",
        value_name = "PATH",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    pub content_dir: Option<PathBuf>,

    /// Override the widest image variant referenced by generated srcsets.
    #[arg(long = "render-max-display-width", value_name = "PIXELS", global = true)]
    pub max_display_width: Option<u32>,

    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}
