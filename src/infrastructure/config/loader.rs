use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::profile::parse_utc_offset;

/// Directory holding the project configuration files.
pub const CONFIG_DIR: &str = ".switchboard";

/// Prefix for environment overrides; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "SWITCHBOARD_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_workers: {0}. Must be between 1 and 64")]
    InvalidMaxWorkers(usize),

    #[error("Invalid snapshot_interval_secs: must be at least 1")]
    InvalidSnapshotInterval,

    #[error("Invalid task_timeout_secs: must be at least 1")]
    InvalidTaskTimeout,

    #[error("Memory directory cannot be empty")]
    EmptyMemoryDir,

    #[error("Invalid max_entries_per_agent: {0}. Must be at least 2")]
    InvalidMaxEntries(usize),

    #[error("Invalid trim_to: {trim_to}. Must be between 1 and max_entries_per_agent ({max})")]
    InvalidTrimTo { trim_to: usize, max: usize },

    #[error("Invalid recent_context_entries: must be at least 1")]
    InvalidContextEntries,

    #[error("Invalid {field}: {value}. Must be an hour between 0 and 23")]
    InvalidHour { field: &'static str, value: u8 },

    #[error("Invalid max_alerts_per_hour: must be at least 1")]
    InvalidAlertCap,

    #[error("Invalid digest_check_secs: must be at least 1")]
    InvalidDigestCheck,

    #[error("Invalid timezone: {0}. Use UTC or an offset such as +05:30")]
    InvalidTimezone(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the current directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .switchboard/config.yaml (project config)
    /// 3. .switchboard/local.yaml (local overrides, optional)
    /// 4. Environment variables (SWITCHBOARD_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from(".")
    }

    /// Load configuration rooted at `project_dir`
    pub fn load_from(project_dir: impl AsRef<Path>) -> Result<Config> {
        let dir = project_dir.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let orch = &config.orchestrator;
        if orch.max_workers == 0 || orch.max_workers > 64 {
            return Err(ConfigError::InvalidMaxWorkers(orch.max_workers));
        }
        if orch.snapshot_interval_secs == 0 {
            return Err(ConfigError::InvalidSnapshotInterval);
        }
        if orch.task_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTaskTimeout);
        }

        let memory = &config.memory;
        if memory.dir.trim().is_empty() {
            return Err(ConfigError::EmptyMemoryDir);
        }
        if memory.max_entries_per_agent < 2 {
            return Err(ConfigError::InvalidMaxEntries(memory.max_entries_per_agent));
        }
        if memory.trim_to == 0 || memory.trim_to >= memory.max_entries_per_agent {
            return Err(ConfigError::InvalidTrimTo {
                trim_to: memory.trim_to,
                max: memory.max_entries_per_agent,
            });
        }
        if memory.recent_context_entries == 0 {
            return Err(ConfigError::InvalidContextEntries);
        }

        let rules = &config.rules;
        for (field, value) in [
            ("mute_start_hour", rules.mute_start_hour),
            ("mute_end_hour", rules.mute_end_hour),
            ("digest_hour", rules.digest_hour),
        ] {
            if value > 23 {
                return Err(ConfigError::InvalidHour { field, value });
            }
        }
        if rules.max_alerts_per_hour == 0 {
            return Err(ConfigError::InvalidAlertCap);
        }
        if rules.digest_check_secs == 0 {
            return Err(ConfigError::InvalidDigestCheck);
        }

        if parse_utc_offset(&config.profile.timezone).is_none() {
            return Err(ConfigError::InvalidTimezone(config.profile.timezone.clone()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        for schedule in &config.schedules {
            if schedule.worker_type.trim().is_empty() {
                return Err(ConfigError::InvalidSchedule(
                    "worker_type cannot be empty".to_string(),
                ));
            }
            if schedule.interval_secs == 0 {
                return Err(ConfigError::InvalidSchedule(format!(
                    "'{}' interval_secs must be at least 1",
                    schedule.worker_type
                )));
            }
        }

        let mut ids: Vec<&str> = config
            .schedules
            .iter()
            .filter_map(|s| s.id.as_deref())
            .collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::ValidationFailed(format!(
                "duplicate schedule id '{}'",
                pair[0]
            )));
        }

        Ok(())
    }
}
