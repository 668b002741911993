//! Configuration primitives and loader for docbridge.
//!
//! The loader resolves configuration using the precedence stack
//! override flag → working directory → git root → built-in defaults.
//! Every resolved value remembers the layer it came from so validation
//! errors can point at the offending file.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use docbridge_core::{BridgeSettings, PictureLimits, Precedence, TableLimits};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".docbridge.toml";

const DEFAULT_MAX_RESULTS: usize = 100;
const DEFAULT_MAX_RESULTS_CAP: usize = 1000;
const DEFAULT_MAX_PICTURE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_TABLE_CELLS: usize = 100_000;

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub search: SearchSettings,
    pub style: StyleSettings,
    pub pictures: PictureSettings,
    pub tables: TableSettings,
    pub sources: ConfigSources,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchSettings {
    pub max_results: usize,
    pub max_results_cap: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleSettings {
    pub default_precedence: Precedence,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PictureSettings {
    pub allow_remote: bool,
    pub max_bytes: usize,
    pub fetch_timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSettings {
    pub max_cells: usize,
}

impl Config {
    /// Settings handed to a bridge session.
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            default_max_results: self.search.max_results,
            max_results_cap: self.search.max_results_cap,
            default_precedence: self.style.default_precedence,
            pictures: PictureLimits {
                allow_remote: self.pictures.allow_remote,
                max_bytes: self.pictures.max_bytes,
            },
            tables: TableLimits {
                max_cells: self.tables.max_cells,
            },
        }
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/git/local/override).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
}

impl ConfigSource {
    fn default() -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        ConfigSource {
            kind,
            path: Some(path),
        }
    }

    fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let default_source = ConfigSource::default();
        let mut merged = defaults_layer(default_source.clone());
        let mut source_layers = vec![default_source];

        let git_root = find_git_root(&working_dir);
        let git_config_path = git_root.as_ref().map(|root| root.join(CONFIG_FILE_NAME));
        let local_config_path = working_dir.join(CONFIG_FILE_NAME);

        if let Some(path) = git_config_path.as_ref() {
            if path.exists() && Some(path) != override_path.as_ref() && path != &local_config_path {
                let source = ConfigSource::for_file(ConfigSourceKind::GitRoot, path.clone());
                merged.merge(load_layer(path, source.clone())?);
                source_layers.push(source);
            }
        }

        if local_config_path.exists() && Some(&local_config_path) != override_path.as_ref() {
            let source = ConfigSource::for_file(ConfigSourceKind::Local, local_config_path.clone());
            merged.merge(load_layer(&local_config_path, source.clone())?);
            source_layers.push(source);
        }

        if let Some(path) = override_path {
            let source = ConfigSource::for_file(ConfigSourceKind::Override, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            source_layers.push(source);
        }

        let resolved = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            search: resolved.search,
            style: resolved.style,
            pictures: resolved.pictures,
            tables: resolved.tables,
            sources: ConfigSources {
                working_directory: working_dir,
                layers: source_layers,
            },
        })
    }
}

impl Default for Config {
    /// Built-in defaults only; no files are consulted.
    fn default() -> Self {
        let source = ConfigSource::default();
        let resolved = defaults_layer(source.clone())
            .finalize()
            .unwrap_or_else(|err| panic!("built-in docbridge defaults are invalid: {err}"));
        Config {
            search: resolved.search,
            style: resolved.style,
            pictures: resolved.pictures,
            tables: resolved.tables,
            sources: ConfigSources {
                working_directory: PathBuf::from("."),
                layers: vec![source],
            },
        }
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })?;
    Ok(raw.into_partial(source))
}

fn defaults_layer(source: ConfigSource) -> PartialConfig {
    let located = |value| Some(Located::new(value, source.clone()));
    PartialConfig {
        max_results: located(DEFAULT_MAX_RESULTS as i64),
        max_results_cap: located(DEFAULT_MAX_RESULTS_CAP as i64),
        default_precedence: Some(Located::new(
            Precedence::StyleFirst.as_str().to_string(),
            source.clone(),
        )),
        allow_remote: Some(Located::new(true, source.clone())),
        max_bytes: located(DEFAULT_MAX_PICTURE_BYTES as i64),
        fetch_timeout_secs: located(DEFAULT_FETCH_TIMEOUT_SECS as i64),
        max_cells: located(DEFAULT_MAX_TABLE_CELLS as i64),
    }
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    max_results: Option<Located<i64>>,
    max_results_cap: Option<Located<i64>>,
    default_precedence: Option<Located<String>>,
    allow_remote: Option<Located<bool>>,
    max_bytes: Option<Located<i64>>,
    fetch_timeout_secs: Option<Located<i64>>,
    max_cells: Option<Located<i64>>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        if other.max_results.is_some() {
            self.max_results = other.max_results;
        }
        if other.max_results_cap.is_some() {
            self.max_results_cap = other.max_results_cap;
        }
        if other.default_precedence.is_some() {
            self.default_precedence = other.default_precedence;
        }
        if other.allow_remote.is_some() {
            self.allow_remote = other.allow_remote;
        }
        if other.max_bytes.is_some() {
            self.max_bytes = other.max_bytes;
        }
        if other.fetch_timeout_secs.is_some() {
            self.fetch_timeout_secs = other.fetch_timeout_secs;
        }
        if other.max_cells.is_some() {
            self.max_cells = other.max_cells;
        }
    }

    fn finalize(self) -> Result<ResolvedConfig, ConfigValidationErrors> {
        let mut errors = Vec::new();

        let max_results = positive(
            self.max_results,
            "search.max_results",
            DEFAULT_MAX_RESULTS as i64,
            &mut errors,
        );
        let max_results_cap = positive(
            self.max_results_cap.clone(),
            "search.max_results_cap",
            DEFAULT_MAX_RESULTS_CAP as i64,
            &mut errors,
        );
        if max_results > max_results_cap {
            errors.push(ConfigValidationError::new(
                self.max_results_cap.map(|located| located.source),
                format!(
                    "search.max_results ({max_results}) must not exceed search.max_results_cap ({max_results_cap})"
                ),
            ));
        }

        let default_precedence = match self.default_precedence {
            Some(located) => match Precedence::from_str(&located.value) {
                Ok(precedence) => precedence,
                Err(message) => {
                    errors.push(
                        ConfigValidationError::new(Some(located.source), message)
                            .with_context("style.default_precedence"),
                    );
                    Precedence::StyleFirst
                }
            },
            None => Precedence::StyleFirst,
        };

        let allow_remote = self
            .allow_remote
            .map(|located| located.value)
            .unwrap_or(true);
        let max_bytes = positive(
            self.max_bytes,
            "pictures.max_bytes",
            DEFAULT_MAX_PICTURE_BYTES as i64,
            &mut errors,
        );
        let fetch_timeout_secs = positive(
            self.fetch_timeout_secs,
            "pictures.fetch_timeout_secs",
            DEFAULT_FETCH_TIMEOUT_SECS as i64,
            &mut errors,
        );
        let max_cells = positive(
            self.max_cells,
            "tables.max_cells",
            DEFAULT_MAX_TABLE_CELLS as i64,
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(ResolvedConfig {
            search: SearchSettings {
                max_results: max_results as usize,
                max_results_cap: max_results_cap as usize,
            },
            style: StyleSettings { default_precedence },
            pictures: PictureSettings {
                allow_remote,
                max_bytes: max_bytes as usize,
                fetch_timeout_secs: fetch_timeout_secs as u64,
            },
            tables: TableSettings {
                max_cells: max_cells as usize,
            },
        })
    }
}

struct ResolvedConfig {
    search: SearchSettings,
    style: StyleSettings,
    pictures: PictureSettings,
    tables: TableSettings,
}

fn positive(
    located: Option<Located<i64>>,
    key: &str,
    fallback: i64,
    errors: &mut Vec<ConfigValidationError>,
) -> i64 {
    match located {
        Some(located) if located.value < 1 => {
            errors.push(
                ConfigValidationError::new(
                    Some(located.source),
                    format!("must be at least 1 (received {})", located.value),
                )
                .with_context(key),
            );
            fallback
        }
        Some(located) => located.value,
        None => fallback,
    }
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

/// Aggregated validation failures.
#[derive(Clone, Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

/// Validation failure with optional provenance.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
    pub context: Option<String>,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: String) -> Self {
        ConfigValidationError {
            source,
            message,
            context: None,
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source.describe())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    search: Option<RawSearch>,
    #[serde(default)]
    style: Option<RawStyle>,
    #[serde(default)]
    pictures: Option<RawPictures>,
    #[serde(default)]
    tables: Option<RawTables>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSearch {
    #[serde(default)]
    max_results: Option<i64>,
    #[serde(default)]
    max_results_cap: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStyle {
    #[serde(default)]
    default_precedence: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPictures {
    #[serde(default)]
    allow_remote: Option<bool>,
    #[serde(default)]
    max_bytes: Option<i64>,
    #[serde(default)]
    fetch_timeout_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTables {
    #[serde(default)]
    max_cells: Option<i64>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        let located = |value| Located::new(value, source.clone());
        let mut partial = PartialConfig::default();
        if let Some(search) = self.search {
            partial.max_results = search.max_results.map(located);
            partial.max_results_cap = search.max_results_cap.map(located);
        }
        if let Some(style) = self.style {
            partial.default_precedence = style
                .default_precedence
                .map(|value| Located::new(value, source.clone()));
        }
        if let Some(pictures) = self.pictures {
            partial.allow_remote = pictures
                .allow_remote
                .map(|value| Located::new(value, source.clone()));
            partial.max_bytes = pictures.max_bytes.map(located);
            partial.fetch_timeout_secs = pictures.fetch_timeout_secs.map(located);
        }
        if let Some(tables) = self.tables {
            partial.max_cells = tables.max_cells.map(located);
        }
        partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.search.max_results, 100);
        assert_eq!(config.search.max_results_cap, 1000);
        assert_eq!(config.style.default_precedence, Precedence::StyleFirst);
        assert!(config.pictures.allow_remote);
        assert_eq!(config.bridge_settings(), BridgeSettings::default());
    }

    #[test]
    fn partial_layers_only_override_present_keys() {
        let source = ConfigSource::for_file(ConfigSourceKind::Local, PathBuf::from("x.toml"));
        let raw: RawConfig = toml::from_str("[search]\nmax_results = 5\n").unwrap();
        let mut merged = defaults_layer(ConfigSource::default());
        merged.merge(raw.into_partial(source));
        let resolved = merged.finalize().unwrap();
        assert_eq!(resolved.search.max_results, 5);
        assert_eq!(resolved.search.max_results_cap, 1000);
    }
}
