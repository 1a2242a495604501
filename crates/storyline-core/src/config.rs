//! Configuration management for storyline.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/storyline/config.json`
//! 2. Environment variable: `STORYLINE_CONFIG_CONTENT`
//! 3. Library config: `storyline.json` or `storyline.jsonc` in the library directory
//!
//! JSONC (JSON with comments) is accepted everywhere.

use crate::error::{ConfigError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storyline_snapshot::{DEFAULT_MAX_PER_VERSION, RETENTION_PRESETS};
use tracing::warn;

/// Default number of edited characters between automatic snapshots.
pub const DEFAULT_THRESHOLD: u32 = 500;

/// Character-count thresholds offered to users.
pub const THRESHOLD_PRESETS: [u32; 4] = [250, 500, 1000, 2000];

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Where stories are stored. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Snapshot and version settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versioning: Option<VersioningConfig>,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for storyline_util::log::LogLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

/// When the auto-snapshot policy takes a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotTrigger {
    /// One snapshot when the editor closes, if the content changed.
    #[default]
    OnEditorClose,
    /// A snapshot every `threshold` edited characters.
    CharacterCount,
}

/// Versioning settings as written in config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VersioningConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<SnapshotTrigger>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_snapshots_per_version: Option<u32>,
}

impl VersioningConfig {
    /// Merge another config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            trigger: other.trigger.or(self.trigger),
            threshold: other.threshold.or(self.threshold),
            max_snapshots_per_version: other
                .max_snapshots_per_version
                .or(self.max_snapshots_per_version),
        }
    }
}

/// Resolved versioning settings with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersioningSettings {
    pub trigger: SnapshotTrigger,
    pub threshold: u32,
    pub max_snapshots_per_version: u32,
}

impl Default for VersioningSettings {
    fn default() -> Self {
        Self {
            trigger: SnapshotTrigger::default(),
            threshold: DEFAULT_THRESHOLD,
            max_snapshots_per_version: DEFAULT_MAX_PER_VERSION,
        }
    }
}

impl VersioningSettings {
    /// Character-count trigger with the given threshold.
    pub fn character_count(threshold: u32) -> Self {
        Self {
            trigger: SnapshotTrigger::CharacterCount,
            threshold,
            ..Self::default()
        }
    }

    /// Same settings with a different retention limit.
    pub fn with_max_snapshots(mut self, max: u32) -> Self {
        self.max_snapshots_per_version = max;
        self
    }

    /// Check the settings are usable. Values outside the presets are
    /// accepted with a warning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::Validation {
                message: "threshold must be at least 1".to_string(),
            });
        }
        if self.max_snapshots_per_version < 2 {
            return Err(ConfigError::Validation {
                message: "maxSnapshotsPerVersion must be at least 2".to_string(),
            });
        }
        if !THRESHOLD_PRESETS.contains(&self.threshold) {
            warn!(threshold = self.threshold, "Non-preset snapshot threshold");
        }
        if !RETENTION_PRESETS.contains(&self.max_snapshots_per_version) {
            warn!(
                max = self.max_snapshots_per_version,
                "Non-preset snapshot retention limit"
            );
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/storyline/`
    /// 2. `STORYLINE_CONFIG_CONTENT` environment variable
    /// 3. Library config from `library_dir`
    pub async fn load(library_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(global_dir) = storyline_util::path::config_dir() {
            for name in &["config.json", "config.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        if let Ok(content) = std::env::var("STORYLINE_CONFIG_CONTENT") {
            config = config.merge(Self::parse_jsonc(&content, "<env>")?);
        }

        if let Some(dir) = library_dir {
            for name in &["storyline.jsonc", "storyline.json"] {
                let path = dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        Ok((config, sources))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Save configuration as pretty JSON.
    pub async fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidJson {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::write(path, content).await?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Resolve versioning settings, applying defaults and validating.
    pub fn versioning(&self) -> Result<VersioningSettings, ConfigError> {
        let defaults = VersioningSettings::default();
        let configured = self.versioning.clone().unwrap_or_default();
        let settings = VersioningSettings {
            trigger: configured.trigger.unwrap_or(defaults.trigger),
            threshold: configured.threshold.unwrap_or(defaults.threshold),
            max_snapshots_per_version: configured
                .max_snapshots_per_version
                .unwrap_or(defaults.max_snapshots_per_version),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Directory stories are stored in.
    pub fn resolved_data_dir(&self) -> Result<PathBuf, ConfigError> {
        self.data_dir
            .clone()
            .or_else(storyline_util::path::data_dir)
            .ok_or_else(|| ConfigError::InvalidPath("Could not determine data directory".into()))
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        self.versioning = match (self.versioning, other.versioning) {
            (Some(base), Some(other)) => Some(base.merge(other)),
            (base, None) => base,
            (None, other) => other,
        };
        self
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = strip_comments(content);
        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Strip `//` and `/* */` comments outside of strings.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                result.push(c);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    // Keep line numbers stable for error messages
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            _ => result.push(c),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_strip_comments() {
        let input = r#"{
            // Line comment
            "key": "value", // trailing comment
            /* block comment */
            "key2": "val/*not a comment*/ue",
            "key3": "escaped \" // still a string"
        }"#;

        let result = strip_comments(input);
        assert!(!result.contains("Line comment"));
        assert!(!result.contains("trailing comment"));
        assert!(!result.contains("block comment"));
        assert!(result.contains("val/*not a comment*/ue"));
        assert!(result.contains(r#"escaped \" // still a string"#));
    }

    #[test]
    fn test_parse_jsonc_versioning() {
        let input = r#"{
            // snapshot every 1000 characters
            "log_level": "debug",
            "versioning": {
                "trigger": "character-count",
                "threshold": 1000,
                "maxSnapshotsPerVersion": 100
            }
        }"#;

        let config = Config::parse_jsonc(input, "test").unwrap();
        assert_eq!(config.log_level, Some(LogLevel::Debug));
        let settings = config.versioning().unwrap();
        assert_eq!(settings.trigger, SnapshotTrigger::CharacterCount);
        assert_eq!(settings.threshold, 1000);
        assert_eq!(settings.max_snapshots_per_version, 100);
    }

    #[test]
    fn test_defaults() {
        let settings = Config::default().versioning().unwrap();
        assert_eq!(settings.trigger, SnapshotTrigger::OnEditorClose);
        assert_eq!(settings.threshold, 500);
        assert_eq!(settings.max_snapshots_per_version, 50);
    }

    #[test]
    fn test_validation_rejects_unusable_values() {
        let zero_threshold = Config {
            versioning: Some(VersioningConfig {
                threshold: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            zero_threshold.versioning(),
            Err(ConfigError::Validation { .. })
        ));

        let tiny_retention = Config {
            versioning: Some(VersioningConfig {
                max_snapshots_per_version: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(tiny_retention.versioning().is_err());
    }

    #[test]
    fn test_merge_field_by_field() {
        let base = Config {
            log_level: Some(LogLevel::Info),
            versioning: Some(VersioningConfig {
                trigger: Some(SnapshotTrigger::CharacterCount),
                threshold: Some(250),
                max_snapshots_per_version: None,
            }),
            ..Default::default()
        };
        let other = Config {
            versioning: Some(VersioningConfig {
                threshold: Some(2000),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.log_level, Some(LogLevel::Info));
        let settings = merged.versioning().unwrap();
        assert_eq!(settings.trigger, SnapshotTrigger::CharacterCount);
        assert_eq!(settings.threshold, 2000);
        assert_eq!(settings.max_snapshots_per_version, 50);
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storyline.json");
        let config = Config {
            data_dir: Some(dir.path().join("data")),
            versioning: Some(VersioningConfig {
                max_snapshots_per_version: Some(25),
                ..Default::default()
            }),
            ..Default::default()
        };

        config.save(&path).await.unwrap();
        let loaded = Config::load_file(&path).await.unwrap();
        assert_eq!(loaded, config);

        let (from_dir, sources) = Config::load(Some(dir.path())).await.unwrap();
        assert!(sources.contains(&path));
        assert_eq!(from_dir.versioning().unwrap().max_snapshots_per_version, 25);
    }
}
