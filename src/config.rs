//! Configuration: layered load of `config/fog.{yaml,json,toml}`, environment (`FOG_` prefix) and
//! CLI-flag overrides, following the `config` crate's builder idiom.
//!
//! Placeholder substitution (`$TIMESTAMP`, `$TEMPLATEPATH`) runs as a post-load string-templating
//! pass over the merged view, per spec.md §6.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ErrorCode, FogError};

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TemplatesConfig {
    pub directory: String,
    pub extensions: Vec<String>,
    pub prechecks: Vec<String>,
    pub stop_on_failed_prechecks: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            directory: "templates".to_string(),
            extensions: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            prechecks: Vec::new(),
            stop_on_failed_prechecks: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParametersConfig {
    pub directory: String,
    pub extensions: Vec<String>,
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self { directory: "parameters".to_string(), extensions: vec!["json".to_string(), "yaml".to_string()] }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TagsConfig {
    pub directory: String,
    pub extensions: Vec<String>,
    pub default: std::collections::BTreeMap<String, String>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            directory: "tags".to_string(),
            extensions: vec!["json".to_string(), "yaml".to_string()],
            default: std::collections::BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeploymentsConfig {
    pub directory: String,
    pub extensions: Vec<String>,
}

impl Default for DeploymentsConfig {
    fn default() -> Self {
        Self { directory: "deployments".to_string(), extensions: vec!["json".to_string(), "yaml".to_string()] }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub enabled: bool,
    pub filename: String,
    pub show_previous: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enabled: false, filename: "fog-deployments.jsonl".to_string(), show_previous: false }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DriftConfig {
    pub ignore_tags: Vec<String>,
    pub ignore_blackholes: Vec<String>,
    pub detect_unmanaged_resources: Vec<String>,
    pub ignore_unmanaged_resources: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TableConfig {
    pub style: String,
    pub max_column_width: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { style: "rounded".to_string(), max_column_width: 80 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChangesetConfig {
    pub name_format: String,
}

impl Default for ChangesetConfig {
    fn default() -> Self {
        Self { name_format: "fog-$TIMESTAMP".to_string() }
    }
}

/// The fully-merged `fog` configuration, per spec.md §6's key list.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub output: String,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub rootdir: String,
    pub timezone: String,
    pub templates: TemplatesConfig,
    pub parameters: ParametersConfig,
    pub tags: TagsConfig,
    pub deployments: DeploymentsConfig,
    pub logging: LoggingConfig,
    pub drift: DriftConfig,
    pub table: TableConfig,
    pub changeset: ChangesetConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: "table".to_string(),
            profile: None,
            region: None,
            rootdir: ".".to_string(),
            timezone: "UTC".to_string(),
            templates: TemplatesConfig::default(),
            parameters: ParametersConfig::default(),
            tags: TagsConfig::default(),
            deployments: DeploymentsConfig::default(),
            logging: LoggingConfig::default(),
            drift: DriftConfig::default(),
            table: TableConfig::default(),
            changeset: ChangesetConfig::default(),
        }
    }
}

/// Load configuration by layering, in ascending precedence: built-in defaults,
/// `<rootdir>/config/fog.{yaml,json,toml}`, environment variables prefixed `FOG_` (double
/// underscore as the nesting separator, e.g. `FOG_DRIFT__IGNORE_TAGS`).
pub fn load(rootdir: &Path) -> Result<Config, FogError> {
    let config_stem = rootdir.join("config").join("fog");

    let builder = config::Config::builder()
        .add_source(config::File::from(config_stem.clone()).required(false))
        .add_source(config::Environment::with_prefix("FOG").separator("__"));

    let merged = builder.build().map_err(|error| {
        FogError::new(ErrorCode::ConfigInvalid, format!("couldn't load configuration from `{}`", config_stem.display()))
            .with_cause(error)
    })?;

    let config: Config = merged
        .try_deserialize()
        .map_err(|error| FogError::new(ErrorCode::ConfigInvalid, "configuration didn't match the expected shape").with_cause(error))?;

    Ok(config)
}

/// Substitute `$TIMESTAMP` (ISO-8601, no timezone) and `$TEMPLATEPATH` (relative to `rootdir`) in
/// a single configuration string value.
#[must_use]
pub fn substitute_placeholders(value: &str, timestamp: &chrono::NaiveDateTime, template_path: &Path) -> String {
    value
        .replace("$TIMESTAMP", &timestamp.format("%Y-%m-%dT%H:%M:%S").to_string())
        .replace("$TEMPLATEPATH", &template_path.to_string_lossy())
}

pub fn resolve_rootdir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_key_list() {
        let config = Config::default();
        assert_eq!(config.output, "table");
        assert_eq!(config.templates.directory, "templates");
        assert!(config.templates.stop_on_failed_prechecks);
        assert_eq!(config.changeset.name_format, "fog-$TIMESTAMP");
    }

    #[test]
    fn substitute_placeholders_fills_both_tokens() {
        let timestamp = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        let result = substitute_placeholders("fog-$TIMESTAMP", &timestamp, Path::new("stacks/net.yaml"));
        assert_eq!(result, "fog-2024-01-02T03:04:05");

        let result = substitute_placeholders("$TEMPLATEPATH.bak", &timestamp, Path::new("stacks/net.yaml"));
        assert_eq!(result, "stacks/net.yaml.bak");
    }

    #[test]
    fn load_missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.output, "table");
    }
}
