use std::io::Write;

use clap::Parser;

use super::*;
use crate::domain::entities::ContentKind;

fn env_with(vars: &[(&str, &str)]) -> Environment {
    let map: config::Map<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    environment().source(Some(map))
}

#[test]
fn defaults_match_site_layout() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.content.root, PathBuf::from("content"));
    assert!(settings.render.base_path.is_empty());
    assert_eq!(settings.render.images.max_display_width, 1920);
    assert_eq!(settings.render.images.content_width, 678);
    assert_eq!(settings.render.images.source_root, "/optimized-images");
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.render.base_path = Some("/from-file".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        base_path: Some("/blog-app".to_string()),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.render.base_path.as_str(), "/blog-app");
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn base_path_is_normalised() {
    let mut raw = RawSettings::default();
    raw.render.base_path = Some("blog-app/".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.base_path.as_str(), "/blog-app");
}

#[test]
fn rejects_display_width_outside_ladder() {
    let mut raw = RawSettings::default();
    raw.render.max_display_width = Some(8);
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.max_display_width",
            ..
        }
    ));
}

#[test]
fn rejects_unparseable_log_level() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn rejects_relative_image_root() {
    let mut raw = RawSettings::default();
    raw.render.image_source_root = Some("optimized-images".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn environment_layer_overrides_config_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[render]\nbase_path = \"/from-file\"\nmax_display_width = 1080\n\n[content]\nroot = \"site\""
    )
    .expect("write config");

    let raw = load_layers(
        Some(file.path()),
        env_with(&[("QUIRE__RENDER__BASE_PATH", "/from-env")]),
    )
    .expect("layers load");
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.render.base_path.as_str(), "/from-env");
    assert_eq!(settings.render.images.max_display_width, 1080);
    assert_eq!(settings.content.root, PathBuf::from("site"));
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let err = load_layers(
        Some(Path::new("/definitely/not/here/quire.toml")),
        env_with(&[]),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Build(_)));
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "quire",
        "render",
        "post",
        "hello-world",
        "--json",
        "--base-path",
        "/blog-app",
    ]);

    assert_eq!(args.overrides.base_path.as_deref(), Some("/blog-app"));
    match args.command {
        Command::Render(render) => {
            assert_eq!(render.document.kind, ContentKind::Post);
            assert_eq!(render.document.slug, "hello-world");
            assert!(render.json);
            assert!(!render.unsanitized);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_render_file_arguments() {
    let args = CliArgs::parse_from([
        "quire",
        "--content-dir",
        "/srv/site",
        "render-file",
        "/tmp/draft.mdx",
        "--unsanitized",
    ]);

    assert_eq!(
        args.overrides.content_dir.as_deref(),
        Some(Path::new("/srv/site"))
    );
    match args.command {
        Command::RenderFile(render) => {
            assert_eq!(render.file, Path::new("/tmp/draft.mdx"));
            assert!(render.unsanitized);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_list_accepts_kind_aliases() {
    let args = CliArgs::parse_from(["quire", "list", "projects", "--log-json", "yes"]);
    assert_eq!(args.overrides.log_json, Some(true));
    match args.command {
        Command::List(list) => assert_eq!(list.kind, ContentKind::Project),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_rejects_unknown_kind() {
    let result = CliArgs::try_parse_from(["quire", "toc", "essay", "intro"]);
    assert!(result.is_err());
}
