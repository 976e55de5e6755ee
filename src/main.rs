use std::{
    io::{self, Write},
    process::ExitCode,
    sync::Arc,
};

use clap::Parser;
use quire::{
    application::{
        content::ContentService,
        error::{AppError, ErrorReport},
        render::{
            RenderPipelineConfig, RenderRequest, configure_render_service, render_service,
            theme_css,
        },
    },
    config::{self, CliArgs, Command, DocumentArgs, ListArgs, RenderArgs, RenderFileArgs},
    infra::{content::FsContentStore, error::InfraError, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("main", error).render();

    if dispatcher::has_been_set() {
        error!(error = %report, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %report, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = CliArgs::parse();
    let settings = config::load(&cli_args).map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    telemetry::init(&settings.logging)?;
    configure_render_service(RenderPipelineConfig::from(&settings.render))
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    let content = ContentService::new(
        Arc::new(FsContentStore::new(settings.content.root.clone())),
        render_service(),
        settings.render.base_path.clone(),
    );

    match cli_args.command {
        Command::Render(args) => run_render(&content, args).await,
        Command::RenderFile(args) => run_render_file(&content, args).await,
        Command::Toc(args) => run_toc(&content, args).await,
        Command::List(args) => run_list(&content, args).await,
        Command::ThemeCss => write_stdout(&theme_css()?),
    }
}

async fn run_render(content: &ContentService, args: RenderArgs) -> Result<(), AppError> {
    let RenderArgs {
        document: DocumentArgs { kind, slug },
        unsanitized,
        json,
    } = args;

    if unsanitized {
        let document = content.document(kind, &slug).await?;
        let request = RenderRequest::new(format!("{kind}/{}", document.slug), document.body_markdown)
            .with_base_path(content.base_path().clone());
        let html = render_service().compile_unsanitized(&request).await?;
        return write_stdout(&html);
    }

    let rendered = content.render(kind, &slug).await?;
    if json {
        write_json(&rendered)
    } else {
        write_stdout(&rendered.output.html)
    }
}

async fn run_render_file(content: &ContentService, args: RenderFileArgs) -> Result<(), AppError> {
    let markdown = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(InfraError::from)?;
    let label = args.file.display().to_string();

    if args.unsanitized {
        let request =
            RenderRequest::new(label, markdown).with_base_path(content.base_path().clone());
        let html = render_service().compile_unsanitized(&request).await?;
        return write_stdout(&html);
    }

    let output = content.render_markdown(label, markdown).await?;
    write_stdout(&output.html)
}

async fn run_toc(content: &ContentService, args: DocumentArgs) -> Result<(), AppError> {
    let headings = content.table_of_contents(args.kind, &args.slug).await?;
    write_json(&headings)
}

async fn run_list(content: &ContentService, args: ListArgs) -> Result<(), AppError> {
    let documents = content.list(args.kind).await?;
    let listing = documents
        .iter()
        .map(|doc| format!("{}\t{}", doc.slug, doc.metadata.title))
        .collect::<Vec<_>>()
        .join("\n");
    write_stdout(&listing)
}

fn write_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to serialise output: {err}")))?;
    write_stdout(&json)
}

fn write_stdout(contents: &str) -> Result<(), AppError> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{contents}").map_err(InfraError::from)?;
    stdout.flush().map_err(InfraError::from)?;
    Ok(())
}
