use serde::{Deserialize, Serialize};

use super::task::Priority;

/// Main configuration structure for switchboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Worker pool and task lifecycle settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Per-worker memory logs and the cross-cutting audit logs
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Standing-rule delivery guards
    #[serde(default)]
    pub rules: RulesConfig,

    /// Alert recipient and channel table
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Recurring jobs registered at startup
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    /// Number of concurrent task executors (1-64)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Priority given to tasks fired by scheduled jobs
    #[serde(default)]
    pub schedule_priority: Priority,

    /// Seconds between system snapshot rewrites
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,

    /// Recent task records included in each snapshot
    #[serde(default = "default_snapshot_audit_entries")]
    pub snapshot_audit_entries: usize,

    /// Optional per-task time limit; a task exceeding it fails
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    /// Terminal tasks kept queryable by id
    #[serde(default = "default_completed_task_history")]
    pub completed_task_history: usize,
}

const fn default_max_workers() -> usize {
    4
}

const fn default_snapshot_interval_secs() -> u64 {
    30
}

const fn default_snapshot_audit_entries() -> usize {
    20
}

const fn default_completed_task_history() -> usize {
    1000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            schedule_priority: Priority::Normal,
            snapshot_interval_secs: default_snapshot_interval_secs(),
            snapshot_audit_entries: default_snapshot_audit_entries(),
            task_timeout_secs: None,
            completed_task_history: default_completed_task_history(),
        }
    }
}

/// Memory log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Write memory logs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root directory of the markdown stores
    #[serde(default = "default_memory_dir")]
    pub dir: String,

    /// Entries a worker log may hold before it is trimmed
    #[serde(default = "default_max_entries_per_agent")]
    pub max_entries_per_agent: usize,

    /// Entries kept after a trim (must be below the maximum)
    #[serde(default = "default_trim_to")]
    pub trim_to: usize,

    /// Upper bound on entries returned as recent context
    #[serde(default = "default_recent_context_entries")]
    pub recent_context_entries: usize,

    /// Entries the inter-worker event log may hold
    #[serde(default = "default_inter_agent_max_entries")]
    pub inter_agent_max_entries: usize,

    /// Rows the global task history may hold
    #[serde(default = "default_task_history_max_entries")]
    pub task_history_max_entries: usize,
}

const fn default_true() -> bool {
    true
}

fn default_memory_dir() -> String {
    ".switchboard/memory".to_string()
}

const fn default_max_entries_per_agent() -> usize {
    500
}

const fn default_trim_to() -> usize {
    400
}

const fn default_recent_context_entries() -> usize {
    10
}

const fn default_inter_agent_max_entries() -> usize {
    1000
}

const fn default_task_history_max_entries() -> usize {
    2000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_memory_dir(),
            max_entries_per_agent: default_max_entries_per_agent(),
            trim_to: default_trim_to(),
            recent_context_entries: default_recent_context_entries(),
            inter_agent_max_entries: default_inter_agent_max_entries(),
            task_history_max_entries: default_task_history_max_entries(),
        }
    }
}

/// Standing rule delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RulesConfig {
    /// Local hour the quiet window starts
    #[serde(default = "default_mute_start_hour")]
    pub mute_start_hour: u8,

    /// Local hour the quiet window ends (exclusive)
    #[serde(default = "default_mute_end_hour")]
    pub mute_end_hour: u8,

    /// Non-critical deliveries allowed per worker in any 60-minute window
    #[serde(default = "default_max_alerts_per_hour")]
    pub max_alerts_per_hour: u32,

    /// Local hour deferred alerts are bundled and delivered
    #[serde(default = "default_digest_hour")]
    pub digest_hour: u8,

    /// Seconds between checks for due digests
    #[serde(default = "default_digest_check_secs")]
    pub digest_check_secs: u64,
}

const fn default_mute_start_hour() -> u8 {
    23
}

const fn default_mute_end_hour() -> u8 {
    7
}

const fn default_max_alerts_per_hour() -> u32 {
    10
}

const fn default_digest_hour() -> u8 {
    8
}

const fn default_digest_check_secs() -> u64 {
    60
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            mute_start_hour: default_mute_start_hour(),
            mute_end_hour: default_mute_end_hour(),
            max_alerts_per_hour: default_max_alerts_per_hour(),
            digest_hour: default_digest_hour(),
            digest_check_secs: default_digest_check_secs(),
        }
    }
}

/// Alert recipient configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileConfig {
    #[serde(default = "default_recipient")]
    pub recipient: String,

    /// `UTC` or a fixed offset such as `+05:30`
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub channels: ChannelConfig,

    /// Channel used when a priority has no explicit mapping
    #[serde(default = "default_channel")]
    pub default_channel: String,
}

impl ProfileConfig {
    pub const DEFAULT_RECIPIENT: &'static str = "@operator";
    pub const DEFAULT_CHANNEL: &'static str = "#switchboard";
}

fn default_recipient() -> String {
    ProfileConfig::DEFAULT_RECIPIENT.to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_channel() -> String {
    ProfileConfig::DEFAULT_CHANNEL.to_string()
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            recipient: default_recipient(),
            timezone: default_timezone(),
            channels: ChannelConfig::default(),
            default_channel: default_channel(),
        }
    }
}

/// Channel per priority; an unset priority falls back to the default channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelConfig {
    #[serde(default)]
    pub critical: Option<String>,
    #[serde(default)]
    pub high: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub low: Option<String>,
}

impl ChannelConfig {
    /// Configured `(priority, channel)` pairs.
    pub fn entries(&self) -> Vec<(Priority, String)> {
        [
            (Priority::Critical, &self.critical),
            (Priority::High, &self.high),
            (Priority::Normal, &self.normal),
            (Priority::Low, &self.low),
        ]
        .into_iter()
        .filter_map(|(p, c)| c.clone().map(|c| (p, c)))
        .collect()
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            critical: Some("#breaking-alerts".to_string()),
            high: Some("dm".to_string()),
            normal: Some("#media-alerts".to_string()),
            low: Some("#media-alerts".to_string()),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation (daily, hourly, never)
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// A recurring job declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScheduleConfig {
    /// Stable job id; generated when omitted
    #[serde(default)]
    pub id: Option<String>,

    pub worker_type: String,

    pub interval_secs: u64,

    /// Overrides `orchestrator.schedule_priority`
    #[serde(default)]
    pub priority: Option<Priority>,

    /// Input handed to every fired task
    #[serde(default)]
    pub input: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.orchestrator.max_workers, 4);
        assert_eq!(config.memory.max_entries_per_agent, 500);
        assert_eq!(config.memory.trim_to, 400);
        assert_eq!(config.rules.mute_start_hour, 23);
        assert_eq!(config.rules.mute_end_hour, 7);
        assert_eq!(config.rules.max_alerts_per_hour, 10);
        assert_eq!(config.profile.timezone, "UTC");
        assert!(config.schedules.is_empty());
    }

    #[test]
    fn test_yaml_with_schedules() {
        let yaml = r"
orchestrator:
  max_workers: 8
  schedule_priority: high
schedules:
  - id: trending_monitor
    worker_type: trending
    interval_secs: 300
  - worker_type: compliance
    interval_secs: 600
    priority: LOW
    input:
      mode: scheduled
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.orchestrator.max_workers, 8);
        assert_eq!(config.orchestrator.schedule_priority, Priority::High);
        assert_eq!(config.schedules.len(), 2);
        assert_eq!(config.schedules[0].id.as_deref(), Some("trending_monitor"));
        assert_eq!(config.schedules[1].priority, Some(Priority::Low));
        assert_eq!(config.schedules[1].input["mode"], "scheduled");
        assert!(config.schedules[0].input.is_null());
    }

    #[test]
    fn test_channel_entries_skip_unset() {
        let channels = ChannelConfig {
            critical: Some("#pager".to_string()),
            high: None,
            normal: None,
            low: None,
        };
        assert_eq!(channels.entries(), vec![(Priority::Critical, "#pager".to_string())]);
    }
}
