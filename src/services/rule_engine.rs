//! Standing-instruction rule engine.
//!
//! Users attach free-text rules to a worker type. After every task the
//! engine checks the worker's active rules against the outcome: IMMEDIATE
//! rules fire at once, DAILY rules collect into a digest. A fired rule is
//! delivered unless quiet hours or the hourly cap hold it back, in which
//! case it is folded into the next digest. CRITICAL rules bypass both.
//!
//! Rule state is loaded lazily per worker and written back after every
//! change. Storage and delivery failures are logged and never propagate
//! to the task that triggered the evaluation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Timelike, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Alert, DeliveryChannel, EventType, HopeRule, Priority, QuietHours, RuleId, RuleSchedule,
    RuleStatus, RulesConfig, TaskId, WorkerType,
};
use crate::domain::ports::RuleStore;
use crate::services::notification_router::NotificationRouter;

/// Words ignored when turning a condition into keywords.
const STOPWORDS: &[&str] = &[
    "the", "and", "any", "are", "for", "from", "has", "have", "into", "its", "about", "alert",
    "tell", "notify", "when", "whenever", "with", "that", "this", "there", "than", "then", "was",
    "were", "what", "will", "you", "your", "please", "let", "know", "show", "send", "all", "out",
    "goes", "get", "gets", "happens", "something", "if",
];

const MIN_KEYWORD_LEN: usize = 3;

/// What a finished task looked like, as seen by rules.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub worker_type: WorkerType,
    pub success: bool,
    pub input_summary: String,
    pub output_summary: String,
    pub events: Vec<EventType>,
    pub error: Option<String>,
}

impl TaskOutcome {
    /// Lower-cased text the keyword predicate searches.
    pub fn haystack(&self) -> String {
        let mut text = format!(
            "{} {} {} {}",
            self.worker_type,
            if self.success { "success" } else { "failure failed error" },
            self.input_summary,
            self.output_summary,
        );
        for event in &self.events {
            text.push(' ');
            text.push_str(event.as_str());
            text.push(' ');
            text.push_str(&event.as_str().replace('_', " "));
        }
        if let Some(error) = &self.error {
            text.push(' ');
            text.push_str(error);
        }
        text.to_lowercase()
    }
}

/// Decides whether a rule's condition accepts a task outcome.
pub trait RulePredicate: Send + Sync {
    fn matches(&self, rule: &HopeRule, outcome: &TaskOutcome) -> bool;
}

/// Accepts an outcome when every keyword of the condition appears in it.
///
/// Keywords are the condition's words of three or more characters, minus
/// common filler words. A condition with no keywords never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordPredicate;

impl KeywordPredicate {
    pub fn keywords(condition: &str) -> Vec<String> {
        condition
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .map(str::to_lowercase)
            .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(&w.as_str()))
            .collect()
    }
}

impl RulePredicate for KeywordPredicate {
    fn matches(&self, rule: &HopeRule, outcome: &TaskOutcome) -> bool {
        let keywords = Self::keywords(&rule.condition);
        if keywords.is_empty() {
            return false;
        }
        let haystack = outcome.haystack();
        keywords.iter().all(|k| haystack.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleEngineConfig {
    pub quiet_hours: QuietHours,
    pub max_alerts_per_hour: usize,
    pub digest_hour: u8,
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self::from(&RulesConfig::default())
    }
}

impl From<&RulesConfig> for RuleEngineConfig {
    fn from(config: &RulesConfig) -> Self {
        Self {
            quiet_hours: QuietHours::new(config.mute_start_hour, config.mute_end_hour),
            max_alerts_per_hour: usize::try_from(config.max_alerts_per_hour).unwrap_or(usize::MAX),
            digest_hour: config.digest_hour,
        }
    }
}

/// Why a delivery was folded into the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    QuietHours,
    RateLimited,
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuietHours => f.write_str("quiet hours"),
            Self::RateLimited => f.write_str("rate limited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FireOutcome {
    Delivered { channel: DeliveryChannel },
    Deferred { reason: DeferReason },
    /// Collected for a DAILY rule's digest.
    Queued,
    Failed { channel: DeliveryChannel, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFiring {
    pub rule_id: RuleId,
    pub outcome: FireOutcome,
}

#[derive(Debug, Clone)]
struct DigestItem {
    rule_id: RuleId,
    priority: Priority,
    title: String,
    note: String,
}

type DigestKey = (WorkerType, u8);

/// What to do with one matched rule once the engine lock is released.
enum Decision {
    Settled(FireOutcome),
    Send { alert: Alert, reserved: bool },
}

#[derive(Debug, Default)]
struct EngineState {
    rules: HashMap<WorkerType, Vec<HopeRule>>,
    loaded: HashSet<WorkerType>,
    /// Delivery times of non-critical alerts inside the rolling hour.
    windows: HashMap<WorkerType, VecDeque<DateTime<Utc>>>,
    digests: HashMap<DigestKey, Vec<DigestItem>>,
    digest_sent: HashMap<DigestKey, NaiveDate>,
}

pub struct RuleEngine {
    store: Arc<dyn RuleStore>,
    predicate: Arc<dyn RulePredicate>,
    router: NotificationRouter,
    config: RuleEngineConfig,
    state: Mutex<EngineState>,
}

impl RuleEngine {
    pub fn new(
        store: Arc<dyn RuleStore>,
        predicate: Arc<dyn RulePredicate>,
        router: NotificationRouter,
        config: RuleEngineConfig,
    ) -> Self {
        Self {
            store,
            predicate,
            router,
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn config(&self) -> &RuleEngineConfig {
        &self.config
    }

    /// Create an ACTIVE rule for `worker`.
    #[instrument(skip(self, worker, condition), fields(worker = %worker), err)]
    pub async fn add_rule(
        &self,
        worker: &WorkerType,
        condition: &str,
        schedule: RuleSchedule,
        priority: Priority,
    ) -> DomainResult<HopeRule> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state, worker).await;
        let rules = state.rules.entry(worker.clone()).or_default();
        let next = rules
            .iter()
            .filter_map(|r| r.id.sequence())
            .max()
            .unwrap_or(0)
            + 1;
        let rule = HopeRule::new(
            RuleId::from_sequence(next),
            worker.clone(),
            condition,
            schedule,
            priority,
        )?;
        rules.push(rule.clone());
        info!(rule_id = %rule.id, schedule = %rule.schedule, "Rule added");
        self.persist(&state, worker).await;
        Ok(rule)
    }

    /// Deactivate a rule. Cancelled rules stay listed but never fire again.
    #[instrument(skip(self, worker, id), fields(worker = %worker, rule_id = %id), err)]
    pub async fn cancel_rule(&self, worker: &WorkerType, id: &RuleId) -> DomainResult<HopeRule> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state, worker).await;
        let rule = state
            .rules
            .get_mut(worker)
            .and_then(|rules| rules.iter_mut().find(|r| &r.id == id))
            .ok_or_else(|| DomainError::RuleNotFound(id.clone()))?;
        if !rule.is_active() {
            return Err(DomainError::RuleInactive(id.clone()));
        }
        rule.status = RuleStatus::Inactive;
        let cancelled = rule.clone();
        info!("Rule cancelled");
        self.persist(&state, worker).await;
        Ok(cancelled)
    }

    pub async fn list_rules(&self, worker: &WorkerType) -> Vec<HopeRule> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state, worker).await;
        state.rules.get(worker).cloned().unwrap_or_default()
    }

    /// Rules of every worker that has any, grouped by worker name.
    pub async fn list_all_rules(&self) -> Vec<HopeRule> {
        let mut workers: Vec<WorkerType> = match self.store.workers().await {
            Ok(workers) => workers,
            Err(e) => {
                warn!(error = %e, "Could not list rule tables");
                Vec::new()
            }
        };
        let mut state = self.state.lock().await;
        workers.extend(state.rules.keys().cloned());
        workers.sort();
        workers.dedup();

        let mut all = Vec::new();
        for worker in &workers {
            self.ensure_loaded(&mut state, worker).await;
            all.extend(state.rules.get(worker).cloned().unwrap_or_default());
        }
        all
    }

    pub async fn evaluate(&self, outcome: &TaskOutcome) -> Vec<RuleFiring> {
        self.evaluate_at(outcome, Utc::now()).await
    }

    /// Run the worker's active rules against a finished task.
    ///
    /// Decisions and rule counters are settled under the engine lock;
    /// deliveries happen after it is released.
    #[instrument(skip(self, outcome), fields(worker = %outcome.worker_type, task_id = %outcome.task_id))]
    pub async fn evaluate_at(&self, outcome: &TaskOutcome, now: DateTime<Utc>) -> Vec<RuleFiring> {
        let worker = &outcome.worker_type;
        let decisions = {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state, worker).await;

            let matched: Vec<HopeRule> = state
                .rules
                .get(worker)
                .map(|rules| {
                    rules
                        .iter()
                        .filter(|r| r.is_active() && self.predicate.matches(r, outcome))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            if matched.is_empty() {
                return Vec::new();
            }

            let mut decisions = Vec::with_capacity(matched.len());
            for rule in &matched {
                if let Some(stored) = state
                    .rules
                    .get_mut(worker)
                    .and_then(|rules| rules.iter_mut().find(|r| r.id == rule.id))
                {
                    stored.record_trigger(now);
                }
                let decision = match rule.schedule {
                    RuleSchedule::Immediate => self.fire(&mut state, rule, outcome, now),
                    RuleSchedule::Daily { hour } => {
                        state
                            .digests
                            .entry((worker.clone(), hour))
                            .or_default()
                            .push(digest_item(rule, outcome, "daily rule"));
                        debug!(rule_id = %rule.id, hour, "Match queued for digest");
                        Decision::Settled(FireOutcome::Queued)
                    }
                };
                decisions.push((rule.id.clone(), decision));
            }

            self.persist(&state, worker).await;
            decisions
        };

        let mut firings = Vec::with_capacity(decisions.len());
        let mut released = 0;
        for (rule_id, decision) in decisions {
            let outcome = match decision {
                Decision::Settled(outcome) => outcome,
                Decision::Send { alert, reserved } => match self.router.deliver(&alert).await {
                    Ok(channel) => FireOutcome::Delivered { channel },
                    Err(e) => {
                        error!(rule_id = %rule_id, error = %e, "Alert delivery failed");
                        if reserved {
                            released += 1;
                        }
                        FireOutcome::Failed {
                            channel: self.router.route(alert.priority),
                            error: e.to_string(),
                        }
                    }
                },
            };
            firings.push(RuleFiring { rule_id, outcome });
        }

        if released > 0 {
            let mut state = self.state.lock().await;
            if let Some(window) = state.windows.get_mut(worker) {
                for _ in 0..released {
                    if let Some(pos) = window.iter().rposition(|t| *t == now) {
                        window.remove(pos);
                    }
                }
            }
        }
        firings
    }

    /// Decide whether one IMMEDIATE rule is delivered now or folded into
    /// the digest. A non-critical delivery takes its rate-limit slot here
    /// and gives it back if the delivery fails.
    fn fire(
        &self,
        state: &mut EngineState,
        rule: &HopeRule,
        outcome: &TaskOutcome,
        now: DateTime<Utc>,
    ) -> Decision {
        let worker = &rule.worker_type;
        let reserved = rule.priority != Priority::Critical;
        if reserved {
            let local_hour = self.local_hour(now);
            let reason = if self.config.quiet_hours.contains(local_hour) {
                Some(DeferReason::QuietHours)
            } else if self.window_len(state, worker, now) >= self.config.max_alerts_per_hour {
                Some(DeferReason::RateLimited)
            } else {
                None
            };
            if let Some(reason) = reason {
                state
                    .digests
                    .entry((worker.clone(), self.config.digest_hour))
                    .or_default()
                    .push(digest_item(rule, outcome, &reason.to_string()));
                info!(rule_id = %rule.id, %reason, "Alert deferred to digest");
                return Decision::Settled(FireOutcome::Deferred { reason });
            }
            state.windows.entry(worker.clone()).or_default().push_back(now);
        }

        let alert = Alert {
            worker_type: worker.clone(),
            rule_id: Some(rule.id.clone()),
            priority: rule.priority,
            title: alert_title(rule),
            body: format!(
                "Rule {} matched task {}: {}",
                rule.id,
                outcome.task_id.short(),
                outcome.output_summary
            ),
            created_at: now,
        };
        Decision::Send { alert, reserved }
    }

    pub async fn daily_digest(&self, worker: &WorkerType) -> Option<FireOutcome> {
        self.daily_digest_at(worker, Utc::now()).await
    }

    /// Deliver the digest for `worker` if the current local hour has one.
    ///
    /// At most one digest per worker, hour and local day. The digest ignores
    /// quiet hours and the cap, and counts as a single delivery.
    #[instrument(skip(self, worker, now), fields(worker = %worker))]
    pub async fn daily_digest_at(
        &self,
        worker: &WorkerType,
        now: DateTime<Utc>,
    ) -> Option<FireOutcome> {
        let mut state = self.state.lock().await;
        self.send_digest(&mut state, worker, now).await
    }

    /// Deliver every digest due at `now`.
    pub async fn run_due_digests(&self, now: DateTime<Utc>) -> Vec<(WorkerType, FireOutcome)> {
        let hour = self.local_hour(now);
        let mut state = self.state.lock().await;
        let mut workers: Vec<WorkerType> = state
            .digests
            .iter()
            .filter(|((_, h), items)| *h == hour && !items.is_empty())
            .map(|((w, _), _)| w.clone())
            .collect();
        workers.sort();

        let mut sent = Vec::new();
        for worker in workers {
            if let Some(outcome) = self.send_digest(&mut state, &worker, now).await {
                sent.push((worker, outcome));
            }
        }
        sent
    }

    async fn send_digest(
        &self,
        state: &mut EngineState,
        worker: &WorkerType,
        now: DateTime<Utc>,
    ) -> Option<FireOutcome> {
        let local = self.router.profile().local_time(now);
        let hour = u8::try_from(local.hour()).unwrap_or(0);
        let today = local.date_naive();
        let key = (worker.clone(), hour);

        if state.digest_sent.get(&key) == Some(&today) {
            return None;
        }
        let items = state.digests.remove(&key).filter(|items| !items.is_empty())?;
        state.digest_sent.insert(key, today);

        let priority = items
            .iter()
            .map(|i| i.priority)
            .max()
            .unwrap_or_default();
        let body = items
            .iter()
            .map(|i| format!("- [{}] {} ({})", i.rule_id, i.title, i.note))
            .collect::<Vec<_>>()
            .join("\n");
        let alert = Alert {
            worker_type: worker.clone(),
            rule_id: None,
            priority,
            title: format!("Daily digest for {worker}: {} item(s)", items.len()),
            body,
            created_at: now,
        };

        match self.router.deliver(&alert).await {
            Ok(channel) => {
                state.windows.entry(worker.clone()).or_default().push_back(now);
                info!(items = items.len(), channel = %channel, "Digest delivered");
                Some(FireOutcome::Delivered { channel })
            }
            Err(e) => {
                error!(items = items.len(), error = %e, "Digest delivery failed");
                Some(FireOutcome::Failed {
                    channel: self.router.route(priority),
                    error: e.to_string(),
                })
            }
        }
    }

    /// Items waiting in any digest for `worker`.
    pub async fn pending_digest_items(&self, worker: &WorkerType) -> usize {
        let state = self.state.lock().await;
        state
            .digests
            .iter()
            .filter(|((w, _), _)| w == worker)
            .map(|(_, items)| items.len())
            .sum()
    }

    fn local_hour(&self, now: DateTime<Utc>) -> u8 {
        u8::try_from(self.router.profile().local_time(now).hour()).unwrap_or(0)
    }

    /// Prune the rolling window and return how many deliveries remain in it.
    fn window_len(&self, state: &mut EngineState, worker: &WorkerType, now: DateTime<Utc>) -> usize {
        let Some(window) = state.windows.get_mut(worker) else {
            return 0;
        };
        let horizon = now - TimeDelta::hours(1);
        while window.front().is_some_and(|t| *t <= horizon) {
            window.pop_front();
        }
        window.len()
    }

    async fn ensure_loaded(&self, state: &mut EngineState, worker: &WorkerType) {
        if state.loaded.contains(worker) {
            return;
        }
        let rules = match self.store.load(worker).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(worker = %worker, error = %e, "Rule table unreadable, recreating empty");
                if let Err(e) = self.store.save(worker, &[]).await {
                    error!(worker = %worker, error = %e, "Failed to recreate rule table");
                }
                Vec::new()
            }
        };
        state.rules.insert(worker.clone(), rules);
        state.loaded.insert(worker.clone());
    }

    async fn persist(&self, state: &EngineState, worker: &WorkerType) {
        let rules = state.rules.get(worker).map_or(&[][..], Vec::as_slice);
        if let Err(e) = self.store.save(worker, rules).await {
            error!(worker = %worker, error = %e, "Failed to save rules");
        }
    }
}

fn alert_title(rule: &HopeRule) -> String {
    format!("{}: {}", rule.worker_type, rule.condition)
}

fn digest_item(rule: &HopeRule, outcome: &TaskOutcome, note: &str) -> DigestItem {
    DigestItem {
        rule_id: rule.id.clone(),
        priority: rule.priority,
        title: alert_title(rule),
        note: format!("task {}, {note}", outcome.task_id.short()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::UserProfile;
    use crate::domain::ports::AlertSink;
    use crate::infrastructure::notify::InMemoryAlertSink;
    use crate::infrastructure::store::InMemoryRuleStore;
    use chrono::TimeZone;

    fn engine(sink: &Arc<InMemoryAlertSink>) -> RuleEngine {
        let router = NotificationRouter::new(
            Arc::clone(sink) as Arc<dyn AlertSink>,
            UserProfile::new("@desk", "UTC").unwrap(),
        );
        RuleEngine::new(
            Arc::new(InMemoryRuleStore::new()),
            Arc::new(KeywordPredicate),
            router,
            RuleEngineConfig::default(),
        )
    }

    fn outcome(output: &str) -> TaskOutcome {
        TaskOutcome {
            task_id: TaskId::new(),
            worker_type: WorkerType::new("compliance"),
            success: true,
            input_summary: "{asset=evening_news}".to_string(),
            output_summary: output.to_string(),
            events: vec![EventType::ComplianceAlert],
            error: None,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_keywords_drop_filler() {
        assert_eq!(
            KeywordPredicate::keywords("Tell me when a CRITICAL violation shows up!"),
            vec!["critical", "violation", "shows"]
        );
        assert!(KeywordPredicate::keywords("if it is").is_empty());
    }

    #[test]
    fn test_predicate_requires_every_keyword() {
        let rule = HopeRule::new(
            RuleId::from_sequence(1),
            WorkerType::new("compliance"),
            "critical violation",
            RuleSchedule::Immediate,
            Priority::High,
        )
        .unwrap();
        assert!(KeywordPredicate.matches(&rule, &outcome("severity=critical, type=violation")));
        assert!(!KeywordPredicate.matches(&rule, &outcome("severity=critical")));
        // Event names are searchable in both spellings.
        let by_event = HopeRule {
            condition: "compliance_alert".to_string(),
            ..rule
        };
        assert!(KeywordPredicate.matches(&by_event, &outcome("none")));
    }

    #[tokio::test]
    async fn test_rule_lifecycle() {
        let sink = Arc::new(InMemoryAlertSink::new());
        let engine = engine(&sink);
        let worker = WorkerType::new("compliance");
        let first = engine
            .add_rule(&worker, "critical", RuleSchedule::Immediate, Priority::High)
            .await
            .unwrap();
        let second = engine
            .add_rule(&worker, "loudness", RuleSchedule::Daily { hour: 9 }, Priority::Low)
            .await
            .unwrap();
        assert_eq!(first.id.as_str(), "hope_001");
        assert_eq!(second.id.as_str(), "hope_002");

        let cancelled = engine.cancel_rule(&worker, &first.id).await.unwrap();
        assert_eq!(cancelled.status, RuleStatus::Inactive);
        assert!(matches!(
            engine.cancel_rule(&worker, &first.id).await,
            Err(DomainError::RuleInactive(_))
        ));
        assert!(matches!(
            engine.cancel_rule(&worker, &RuleId::new("hope_404")).await,
            Err(DomainError::RuleNotFound(_))
        ));
        assert_eq!(engine.list_rules(&worker).await.len(), 2);

        // Cancelled rules never fire.
        let firings = engine.evaluate_at(&outcome("critical"), noon()).await;
        assert!(firings.is_empty());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_immediate_rule_delivers_and_counts() {
        let sink = Arc::new(InMemoryAlertSink::new());
        let engine = engine(&sink);
        let worker = WorkerType::new("compliance");
        engine
            .add_rule(&worker, "critical", RuleSchedule::Immediate, Priority::High)
            .await
            .unwrap();

        let firings = engine.evaluate_at(&outcome("severity=critical"), noon()).await;
        assert_eq!(firings.len(), 1);
        assert!(matches!(firings[0].outcome, FireOutcome::Delivered { .. }));
        let rule = &engine.list_rules(&worker).await[0];
        assert_eq!(rule.trigger_count, 1);
        assert_eq!(rule.last_triggered, Some(noon()));
    }

    #[tokio::test]
    async fn test_daily_rule_queues_then_digests_once() {
        let sink = Arc::new(InMemoryAlertSink::new());
        let engine = engine(&sink);
        let worker = WorkerType::new("compliance");
        engine
            .add_rule(&worker, "critical", RuleSchedule::Daily { hour: 9 }, Priority::Normal)
            .await
            .unwrap();

        for _ in 0..3 {
            let firings = engine.evaluate_at(&outcome("critical"), noon()).await;
            assert_eq!(firings[0].outcome, FireOutcome::Queued);
        }
        assert_eq!(engine.pending_digest_items(&worker).await, 3);
        assert!(engine.daily_digest_at(&worker, noon()).await.is_none());

        let nine = Utc.with_ymd_and_hms(2026, 10, 20, 9, 5, 0).unwrap();
        let sent = engine.run_due_digests(nine).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sink.count(), 1);
        let (_, alert) = &sink.delivered()[0];
        assert!(alert.rule_id.is_none());
        assert_eq!(alert.body.lines().count(), 3);

        engine.evaluate_at(&outcome("critical"), nine).await;
        assert!(engine.daily_digest_at(&worker, nine).await.is_none());
    }
}
