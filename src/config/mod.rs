//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::{
    BasePath,
    images::{ImagePipelineConfig, SIZE_LADDER},
};

pub use cli::{
    CliArgs, Command, DocumentArgs, GlobalOverrides, ListArgs, RenderArgs, RenderFileArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const ENV_PREFIX: &str = "QUIRE";
const DEFAULT_CONTENT_DIR: &str = "content";

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub base_path: BasePath,
    pub images: ImagePipelineConfig,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut raw = load_layers(cli.config_file.as_deref(), environment())?;
    raw.apply_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

/// `QUIRE__RENDER__BASE_PATH` maps to `render.base_path`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn load_layers(
    config_file: Option<&Path>,
    environment: Environment,
) -> Result<RawSettings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(environment);

    Ok(builder.build()?.try_deserialize()?)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    content: RawContentSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(base_path) = overrides.base_path.as_ref() {
            self.render.base_path = Some(base_path.clone());
        }
        if let Some(dir) = overrides.content_dir.as_ref() {
            self.content.root = Some(dir.clone());
        }
        if let Some(width) = overrides.max_display_width {
            self.render.max_display_width = Some(width);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            content,
            render,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            content: build_content_settings(content)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let root = content
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR));
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid("content.root", "path must not be empty"));
    }
    Ok(ContentSettings { root })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let defaults = ImagePipelineConfig::default();

    let max_display_width = render
        .max_display_width
        .unwrap_or(defaults.max_display_width);
    let smallest = SIZE_LADDER[0];
    let largest = SIZE_LADDER[SIZE_LADDER.len() - 1];
    if !(smallest..=largest).contains(&max_display_width) {
        return Err(LoadError::invalid(
            "render.max_display_width",
            format!("must be between {smallest} and {largest}"),
        ));
    }

    let content_width = render.content_width.unwrap_or(defaults.content_width);
    if content_width == 0 {
        return Err(LoadError::invalid(
            "render.content_width",
            "must be greater than zero",
        ));
    }

    let source_root = render
        .image_source_root
        .map(|root| root.trim().trim_end_matches('/').to_string())
        .unwrap_or(defaults.source_root);
    if !source_root.starts_with('/') {
        return Err(LoadError::invalid(
            "render.image_source_root",
            "must be a root-relative path",
        ));
    }

    let variants_dir = render.image_variants_dir.unwrap_or(defaults.variants_dir);
    if variants_dir.is_empty() || variants_dir.contains('/') {
        return Err(LoadError::invalid(
            "render.image_variants_dir",
            "must be a single path segment",
        ));
    }

    let variant_extension = render
        .image_variant_extension
        .unwrap_or(defaults.variant_extension);
    if variant_extension.is_empty()
        || !variant_extension
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
    {
        return Err(LoadError::invalid(
            "render.image_variant_extension",
            "must be a bare file extension",
        ));
    }

    Ok(RenderSettings {
        base_path: BasePath::new(render.base_path.unwrap_or_default()),
        images: ImagePipelineConfig {
            source_root,
            variants_dir,
            variant_extension,
            max_display_width,
            content_width,
        },
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    base_path: Option<String>,
    max_display_width: Option<u32>,
    content_width: Option<u32>,
    image_source_root: Option<String>,
    image_variants_dir: Option<String>,
    image_variant_extension: Option<String>,
}

#[cfg(test)]
mod tests;
