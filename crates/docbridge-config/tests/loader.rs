use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use docbridge_config::{Config, ConfigError, ConfigSourceKind, LoadOptions};
use docbridge_core::Precedence;
use tempfile::TempDir;

fn write_file(path: impl AsRef<Path>, contents: &str) {
    let mut file = fs::File::create(path).expect("create config");
    file.write_all(contents.as_bytes()).expect("write config");
}

fn canonical(path: impl AsRef<Path>) -> PathBuf {
    fs::canonicalize(path).expect("canonicalize path")
}

fn validation_message(err: ConfigError) -> String {
    match err {
        ConfigError::Validation(errors) => errors.to_string(),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn loads_defaults_when_no_files_present() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    let config = Config::load(LoadOptions::default().with_working_dir(working_dir.clone()))
        .expect("load defaults");

    assert_eq!(config.search.max_results, 100);
    assert_eq!(config.search.max_results_cap, 1000);
    assert_eq!(config.style.default_precedence, Precedence::StyleFirst);
    assert!(config.pictures.allow_remote);
    assert_eq!(config.pictures.max_bytes, 10 * 1024 * 1024);
    assert_eq!(config.pictures.fetch_timeout_secs, 30);
    assert_eq!(config.tables.max_cells, 100_000);
    assert_eq!(config.sources.working_directory, working_dir);
    assert_eq!(config.sources.layers.len(), 1);
    assert_eq!(config.sources.layers[0].kind, ConfigSourceKind::Default);
}

#[test]
fn applies_precedence_and_merges_fields() {
    let temp = TempDir::new().expect("tempdir");
    let git_root = canonical(temp.path());
    fs::create_dir(git_root.join(".git")).expect("create .git");

    write_file(
        git_root.join(".docbridge.toml"),
        r#"
        [search]
        max_results = 20
        max_results_cap = 500

        [pictures]
        allow_remote = false
        "#,
    );

    let workspace = git_root.join("workspace");
    fs::create_dir(&workspace).expect("create workspace");
    write_file(
        workspace.join(".docbridge.toml"),
        r#"
        [search]
        max_results = 50

        [style]
        default_precedence = "overridesFirst"
        "#,
    );

    let override_path = workspace.join("override.toml");
    write_file(
        &override_path,
        r#"
        [pictures]
        max_bytes = 2048

        [tables]
        max_cells = 64
        "#,
    );

    let config = Config::load(
        LoadOptions::default()
            .with_working_dir(&workspace)
            .with_override_path(&override_path),
    )
    .expect("load config with precedence");

    assert_eq!(config.search.max_results, 50);
    assert_eq!(config.search.max_results_cap, 500);
    assert_eq!(config.style.default_precedence, Precedence::OverridesFirst);
    assert!(!config.pictures.allow_remote);
    assert_eq!(config.pictures.max_bytes, 2048);

    let kinds: Vec<_> = config
        .sources
        .layers
        .iter()
        .map(|layer| layer.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ConfigSourceKind::Default,
            ConfigSourceKind::GitRoot,
            ConfigSourceKind::Local,
            ConfigSourceKind::Override
        ]
    );

    let settings = config.bridge_settings();
    assert_eq!(settings.default_max_results, 50);
    assert_eq!(settings.max_results_cap, 500);
    assert_eq!(settings.pictures.max_bytes, 2048);
    assert!(!settings.pictures.allow_remote);
    assert_eq!(settings.tables.max_cells, 64);
}

#[test]
fn missing_override_is_reported() {
    let temp = TempDir::new().expect("tempdir");
    let err = Config::load(
        LoadOptions::default()
            .with_working_dir(temp.path())
            .with_override_path("nope.toml"),
    )
    .expect_err("expected missing override");
    assert!(matches!(err, ConfigError::OverrideNotFound { .. }));
}

#[test]
fn validation_errors_are_collected() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(".docbridge.toml"),
        r#"
        [search]
        max_results = 0

        [style]
        default_precedence = "whatever"

        [pictures]
        fetch_timeout_secs = -1

        [tables]
        max_cells = 0
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(&working_dir))
        .expect_err("expected validation failure");
    let joined = validation_message(err);
    assert!(joined.contains("search.max_results: must be at least 1"), "{joined}");
    assert!(joined.contains("unknown precedence 'whatever'"), "{joined}");
    assert!(joined.contains("pictures.fetch_timeout_secs"), "{joined}");
    assert!(joined.contains("tables.max_cells"), "{joined}");
    assert!(joined.contains("local config at"), "{joined}");
}

#[test]
fn max_results_above_cap_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(".docbridge.toml"),
        r#"
        [search]
        max_results = 200
        max_results_cap = 100
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(&working_dir))
        .expect_err("expected validation failure");
    assert!(validation_message(err).contains("must not exceed search.max_results_cap"));
}

#[test]
fn unknown_keys_fail_to_parse() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(".docbridge.toml"),
        r#"
        [search]
        max_hits = 3
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(&working_dir))
        .expect_err("expected parse failure");
    assert!(matches!(err, ConfigError::Parse { .. }));
}
