//! Built-in tables for the broadcast-media worker swarm.
//!
//! These describe the deployment the CLI runs out of the box. Embedders
//! wiring their own workers do not need any of it.

use std::time::Duration;

use super::event::EventType;
use super::subscription::SubscriptionTable;
use super::task::WorkerType;
use super::trigger::{ItemTest, TriggerCondition, TriggerTable};

pub const CAPTION: &str = "caption";
pub const CLIP: &str = "clip";
pub const ARCHIVE: &str = "archive";
pub const COMPLIANCE: &str = "compliance";
pub const SOCIAL: &str = "social";
pub const LOCALIZATION: &str = "localization";
pub const RIGHTS: &str = "rights";
pub const TRENDING: &str = "trending";
pub const DEEPFAKE_DETECTION: &str = "deepfake_detection";
pub const LIVE_FACT_CHECK: &str = "live_fact_check";
pub const AUDIENCE_INTELLIGENCE: &str = "audience_intelligence";
pub const AI_PRODUCTION_DIRECTOR: &str = "ai_production_director";
pub const BRAND_SAFETY: &str = "brand_safety";
pub const CARBON_INTELLIGENCE: &str = "carbon_intelligence";
pub const INGEST_TRANSCODE: &str = "ingest_transcode";
pub const SIGNAL_QUALITY: &str = "signal_quality";
pub const PLAYOUT_SCHEDULING: &str = "playout_scheduling";
pub const OTT_DISTRIBUTION: &str = "ott_distribution";
pub const NEWSROOM_INTEGRATION: &str = "newsroom_integration";

/// Every worker type of the broadcast deployment.
pub const WORKER_TYPES: [&str; 19] = [
    CAPTION,
    CLIP,
    ARCHIVE,
    COMPLIANCE,
    SOCIAL,
    LOCALIZATION,
    RIGHTS,
    TRENDING,
    DEEPFAKE_DETECTION,
    LIVE_FACT_CHECK,
    AUDIENCE_INTELLIGENCE,
    AI_PRODUCTION_DIRECTOR,
    BRAND_SAFETY,
    CARBON_INTELLIGENCE,
    INGEST_TRANSCODE,
    SIGNAL_QUALITY,
    PLAYOUT_SCHEDULING,
    OTT_DISTRIBUTION,
    NEWSROOM_INTEGRATION,
];

/// Subscription table of the broadcast deployment.
///
/// No worker subscribes to an event it raises itself: `trending` stays off
/// `BREAKING_NEWS` and `rights` stays off the license and violation events,
/// which go to compliance review instead.
pub fn subscriptions() -> SubscriptionTable {
    let table: [(EventType, &[&str]); 8] = [
        (
            EventType::NewContent,
            &[
                CAPTION,
                CLIP,
                COMPLIANCE,
                ARCHIVE,
                DEEPFAKE_DETECTION,
                BRAND_SAFETY,
                AUDIENCE_INTELLIGENCE,
            ],
        ),
        (
            EventType::CaptionComplete,
            &[LOCALIZATION, SOCIAL, LIVE_FACT_CHECK],
        ),
        (EventType::ClipDetected, &[SOCIAL]),
        (EventType::ComplianceAlert, &[SOCIAL]),
        (EventType::TrendingSpike, &[SOCIAL, ARCHIVE]),
        (EventType::LicenseExpiring, &[COMPLIANCE]),
        (EventType::ViolationDetected, &[COMPLIANCE]),
        (
            EventType::BreakingNews,
            &[SOCIAL, AI_PRODUCTION_DIRECTOR, LIVE_FACT_CHECK],
        ),
    ];

    let mut subs = SubscriptionTable::new();
    for (event, workers) in table {
        for worker in workers {
            subs.subscribe(event, WorkerType::new(worker));
        }
    }
    subs
}

/// Result classification rules of the broadcast deployment.
pub fn triggers() -> TriggerTable {
    TriggerTable::new()
        .with(CAPTION, EventType::CaptionComplete, TriggerCondition::Always)
        .with(
            CLIP,
            EventType::ClipDetected,
            TriggerCondition::non_empty("viral_moments"),
        )
        .with(
            COMPLIANCE,
            EventType::ComplianceAlert,
            TriggerCondition::any_item(
                "issues",
                "severity",
                ItemTest::Equals(serde_json::json!("critical")),
            ),
        )
        .with(
            TRENDING,
            EventType::TrendingSpike,
            TriggerCondition::any_item("trends", "velocity_score", ItemTest::GreaterThan(90.0)),
        )
        .with(
            TRENDING,
            EventType::BreakingNews,
            TriggerCondition::non_empty("breaking_news"),
        )
        .with(
            RIGHTS,
            EventType::ViolationDetected,
            TriggerCondition::non_empty("violations"),
        )
        .with(
            RIGHTS,
            EventType::LicenseExpiring,
            TriggerCondition::any_item(
                "expiring_soon",
                "days_until_expiry",
                ItemTest::LessThan(30.0),
            ),
        )
}

/// Recurring monitors of the broadcast deployment: `(worker, interval)`.
pub fn schedules() -> Vec<(&'static str, Duration)> {
    vec![
        (TRENDING, Duration::from_secs(300)),
        (COMPLIANCE, Duration::from_secs(600)),
        (RIGHTS, Duration::from_secs(3600)),
        (ARCHIVE, Duration::from_secs(21_600)),
        (DEEPFAKE_DETECTION, Duration::from_secs(120)),
        (LIVE_FACT_CHECK, Duration::from_secs(180)),
        (AUDIENCE_INTELLIGENCE, Duration::from_secs(300)),
        (AI_PRODUCTION_DIRECTOR, Duration::from_secs(60)),
        (BRAND_SAFETY, Duration::from_secs(120)),
        (CARBON_INTELLIGENCE, Duration::from_secs(1800)),
        (SIGNAL_QUALITY, Duration::from_secs(120)),
        (NEWSROOM_INTEGRATION, Duration::from_secs(180)),
        (PLAYOUT_SCHEDULING, Duration::from_secs(300)),
        (OTT_DISTRIBUTION, Duration::from_secs(600)),
    ]
}

/// High-value output keys per worker, used for memory summaries.
pub fn summary_keys(worker: &str) -> &'static [&'static str] {
    match worker {
        CAPTION => &["segments", "qa_issues", "confidence_avg", "word_count"],
        CLIP => &["viral_moments", "clip_count", "top_score", "duration_s"],
        ARCHIVE => &["indexed_items", "categories", "storage_used_mb", "retrieval_score"],
        COMPLIANCE => &["issues", "violations", "score", "critical_count"],
        SOCIAL => &["posts_scheduled", "platforms", "reach_estimate", "engagement_score"],
        LOCALIZATION => &["languages", "segments_localized", "confidence_avg", "translation_pairs"],
        RIGHTS => &["licenses", "violations", "expiring_soon", "cleared_pct"],
        TRENDING => &["trends", "breaking_news", "velocity_score", "top_topic"],
        DEEPFAKE_DETECTION => &["risk_score", "verdict", "layers_checked", "confidence"],
        LIVE_FACT_CHECK => &["claims_checked", "false_claims", "confidence", "databases_queried"],
        AUDIENCE_INTELLIGENCE => &["retention_curve", "drop_off_risk", "engagement_score", "demographic_bands"],
        AI_PRODUCTION_DIRECTOR => &["shots_planned", "lower_thirds", "rundown_changes", "auto_accepted"],
        BRAND_SAFETY => &["safety_score", "garm_flags", "cpm_modifier", "advertiser_profiles"],
        CARBON_INTELLIGENCE => &["carbon_footprint_kg", "scope", "esg_score", "renewable_pct"],
        INGEST_TRANSCODE => &["profiles", "output_files", "duration_s", "bitrate_kbps"],
        SIGNAL_QUALITY => &["loudness_lufs", "true_peak_dbtp", "issues", "compliance_status"],
        PLAYOUT_SCHEDULING => &["items_scheduled", "next_item", "gaps_found", "on_air_confidence"],
        OTT_DISTRIBUTION => &["streams_active", "cdn_health", "bitrate_avg_mbps", "viewer_count"],
        NEWSROOM_INTEGRATION => &["rundown_items", "sync_status", "stories_updated", "breaking_count"],
        _ => &[],
    }
}
