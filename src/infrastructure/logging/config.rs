use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::models::config::LoggingConfig;
use crate::infrastructure::config::ConfigError;

/// Resolved logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level directive (trace, debug, info, warn, error)
    pub level: String,

    /// Console output format
    pub format: LogFormat,

    /// Directory for rolling JSON log files (console only when `None`)
    pub log_dir: Option<PathBuf>,

    /// Emit to stderr as well as to the log file
    pub enable_console: bool,

    /// Log rotation policy
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            log_dir: None,
            enable_console: true,
            rotation: RotationPolicy::Daily,
        }
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = ConfigError;

    fn try_from(settings: &LoggingConfig) -> Result<Self, Self::Error> {
        let format = match settings.format.as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        };
        let rotation = match settings.rotation.as_str() {
            "daily" => RotationPolicy::Daily,
            "hourly" => RotationPolicy::Hourly,
            "never" => RotationPolicy::Never,
            other => return Err(ConfigError::InvalidRotation(other.to_string())),
        };
        Ok(Self {
            level: settings.level.clone(),
            format,
            log_dir: settings.log_dir.as_ref().map(PathBuf::from),
            enable_console: true,
            rotation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            log_dir: Some("/tmp/switchboard-logs".to_string()),
            rotation: "hourly".to_string(),
        };
        let config = LogConfig::try_from(&settings).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.rotation, RotationPolicy::Hourly);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/switchboard-logs")));
    }

    #[test]
    fn test_rejects_unknown_rotation() {
        let settings = LoggingConfig {
            rotation: "weekly".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            LogConfig::try_from(&settings),
            Err(ConfigError::InvalidRotation(_))
        ));
    }
}
