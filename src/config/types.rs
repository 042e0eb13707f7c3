//! Configuration types for tanuki-acl
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Permissions description to load at startup
    pub permissions: PermissionsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Where the permissions description comes from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Path to a JSON permissions description
    pub file: Option<String>,

    /// Fail on the first load error instead of keeping what was applied
    pub strict: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            file: None,
            strict: true,
        }
    }
}

impl PermissionsConfig {
    /// Permissions file path with `~` expanded
    pub fn file_path(&self) -> Option<String> {
        self.file
            .as_deref()
            .map(|path| shellexpand::tilde(path).into_owned())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.permissions.file.is_none());
        assert!(config.permissions.strict);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_deserialize_log_format() {
        let format: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, LogFormat::Json);

        let format: LogFormat = serde_json::from_str(r#""pretty""#).unwrap();
        assert_eq!(format, LogFormat::Pretty);

        assert!(serde_json::from_str::<LogFormat>(r#""xml""#).is_err());
    }

    #[test]
    fn test_file_path_expands_tilde() {
        let config = PermissionsConfig {
            file: Some("~/acl.json".to_string()),
            ..Default::default()
        };
        let path = config.file_path().unwrap();
        assert!(!path.starts_with('~'));
        assert!(path.ends_with("acl.json"));
    }
}
