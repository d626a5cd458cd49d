//! Layered configuration feeding the orchestrator.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::ScriptedWorker;
use switchboard::domain::models::{Priority, QuietHours, UserProfile, WorkerType};
use switchboard::domain::ports::{StoreProvider, Worker};
use switchboard::infrastructure::config::{ConfigLoader, CONFIG_DIR};
use switchboard::infrastructure::store::InMemoryStoreProvider;
use switchboard::services::{OrchestratorBuilder, OrchestratorSettings};

/// Env keys these tests touch, cleared around every load.
const KEYS: [&str; 6] = [
    "SWITCHBOARD_ORCHESTRATOR__MAX_WORKERS",
    "SWITCHBOARD_ORCHESTRATOR__TASK_TIMEOUT_SECS",
    "SWITCHBOARD_RULES__MAX_ALERTS_PER_HOUR",
    "SWITCHBOARD_RULES__MUTE_START_HOUR",
    "SWITCHBOARD_RULES__DIGEST_HOUR",
    "SWITCHBOARD_PROFILE__TIMEZONE",
];

fn project(config_yaml: &str) -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    let cfg_dir = dir.path().join(CONFIG_DIR);
    std::fs::create_dir_all(&cfg_dir).unwrap();
    std::fs::write(cfg_dir.join("config.yaml"), config_yaml).unwrap();
    dir
}

fn load_with(dir: &Path, vars: &[(&str, &str)]) -> anyhow::Result<switchboard::Config> {
    let mut all: Vec<(&str, Option<&str>)> = KEYS.iter().map(|k| (*k, None)).collect();
    for &(key, value) in vars {
        all.retain(|(k, _)| *k != key);
        all.push((key, Some(value)));
    }
    temp_env::with_vars(all, || ConfigLoader::load_from(dir))
}

#[test]
fn test_env_overrides_reach_orchestrator_settings() {
    let dir = project("rules:\n  max_alerts_per_hour: 4\n  mute_start_hour: 22\n  mute_end_hour: 6\n");
    let config = load_with(
        dir.path(),
        &[
            ("SWITCHBOARD_RULES__MAX_ALERTS_PER_HOUR", "25"),
            ("SWITCHBOARD_ORCHESTRATOR__TASK_TIMEOUT_SECS", "90"),
        ],
    )
    .unwrap();

    let settings = OrchestratorSettings::from_config(&config);
    assert_eq!(settings.rules.max_alerts_per_hour, 25);
    assert_eq!(settings.rules.quiet_hours, QuietHours::new(22, 6));
    assert_eq!(settings.task_timeout, Some(Duration::from_secs(90)));
    assert_eq!(settings.memory.max_entries, config.memory.max_entries_per_agent);
}

#[test]
fn test_profile_channels_and_env_timezone() {
    let dir = project(
        "profile:\n  recipient: \"@newsdesk\"\n  default_channel: \"#desk\"\n  channels:\n    critical: \"#breaking\"\n",
    );
    let config = load_with(dir.path(), &[("SWITCHBOARD_PROFILE__TIMEZONE", "+05:30")]).unwrap();

    let profile = UserProfile::from_config(&config.profile).unwrap();
    assert_eq!(profile.recipient, "@newsdesk");
    assert_eq!(
        profile.channel_for(Priority::Critical).map(|c| c.as_str()),
        Some("#breaking")
    );
    assert!(profile.channel_for(Priority::Low).is_none());
    assert_eq!(profile.default_channel().as_str(), "#desk");
    assert_eq!(profile.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
}

#[test]
fn test_invalid_env_values_are_rejected() {
    let dir = project("orchestrator:\n  max_workers: 2\n");

    assert!(load_with(dir.path(), &[("SWITCHBOARD_RULES__DIGEST_HOUR", "25")]).is_err());
    assert!(load_with(dir.path(), &[("SWITCHBOARD_ORCHESTRATOR__MAX_WORKERS", "0")]).is_err());
    assert!(load_with(dir.path(), &[("SWITCHBOARD_RULES__MAX_ALERTS_PER_HOUR", "lots")]).is_err());
    assert!(load_with(dir.path(), &[("SWITCHBOARD_PROFILE__TIMEZONE", "Mars/Olympus")]).is_err());

    // The file alone is fine.
    assert_eq!(load_with(dir.path(), &[]).unwrap().orchestrator.max_workers, 2);
}

#[test]
fn test_duplicate_schedule_ids_are_rejected() {
    let dir = project(
        "schedules:\n  - id: trending_monitor\n    worker_type: trending\n    interval_secs: 300\n  - id: trending_monitor\n    worker_type: social\n    interval_secs: 600\n",
    );
    assert!(load_with(dir.path(), &[]).is_err());
}

#[tokio::test]
async fn test_configured_schedules_register_on_orchestrator() {
    let dir = project(
        "orchestrator:\n  schedule_priority: LOW\nschedules:\n  - id: trending_monitor\n    worker_type: trending\n    interval_secs: 300\n    input:\n      mode: scheduled\n  - id: compliance_sweep\n    worker_type: compliance\n    interval_secs: 900\n    priority: HIGH\n",
    );
    let config = load_with(dir.path(), &[]).unwrap();
    assert_eq!(config.schedules.len(), 2);

    let orch = OrchestratorBuilder::from_config(&config)
        .unwrap()
        .with_stores(Arc::new(InMemoryStoreProvider::new()) as Arc<dyn StoreProvider>)
        .register_worker(ScriptedWorker::new("trending") as Arc<dyn Worker>)
        .register_worker(ScriptedWorker::new("compliance") as Arc<dyn Worker>)
        .build()
        .await
        .unwrap();

    let ids = orch.register_configured_schedules(&config.schedules).await.unwrap();
    assert_eq!(ids.len(), 2);

    let jobs = orch.list_jobs().await;
    let trending = jobs.iter().find(|j| j.id.as_str() == "trending_monitor").unwrap();
    assert_eq!(trending.worker_type, WorkerType::new("trending"));
    assert_eq!(trending.interval, Duration::from_secs(300));
    assert_eq!(trending.priority, Priority::Low);
    assert_eq!(trending.input["mode"], "scheduled");

    let sweep = jobs.iter().find(|j| j.id.as_str() == "compliance_sweep").unwrap();
    assert_eq!(sweep.priority, Priority::High);
}

#[tokio::test]
async fn test_schedule_for_unknown_worker_fails_registration() {
    let dir = project("schedules:\n  - worker_type: weather\n    interval_secs: 60\n");
    let config = load_with(dir.path(), &[]).unwrap();

    let orch = OrchestratorBuilder::from_config(&config)
        .unwrap()
        .with_stores(Arc::new(InMemoryStoreProvider::new()) as Arc<dyn StoreProvider>)
        .register_worker(ScriptedWorker::new("trending") as Arc<dyn Worker>)
        .build()
        .await
        .unwrap();

    assert!(orch.register_configured_schedules(&config.schedules).await.is_err());
    assert!(orch.list_jobs().await.is_empty());
}
