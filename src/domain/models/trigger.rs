//! Declarative classification of worker results into events.
//!
//! A worker may hard-code its own `triggered_events`; workers that only
//! need field checks can instead be driven by a [`TriggerTable`].

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::event::EventType;
use super::task::WorkerType;
use super::work::WorkResult;

/// Test applied to one field of a list item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemTest {
    Equals(Value),
    GreaterThan(f64),
    LessThan(f64),
}

impl ItemTest {
    fn check(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Self::Equals(expected), Some(actual)) => actual == expected,
            (Self::GreaterThan(bound), Some(actual)) => {
                actual.as_f64().is_some_and(|v| v > *bound)
            }
            (Self::LessThan(bound), Some(actual)) => actual.as_f64().is_some_and(|v| v < *bound),
            (_, None) => false,
        }
    }
}

/// Condition under which a successful result raises an event.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerCondition {
    /// Every successful result.
    Always,
    /// `field` is a non-empty list (or a non-empty object/string).
    NonEmpty { field: String },
    /// `field` is a list with at least one item whose `key` passes `test`.
    AnyItem {
        field: String,
        key: String,
        test: ItemTest,
    },
}

impl TriggerCondition {
    pub fn non_empty(field: &str) -> Self {
        Self::NonEmpty {
            field: field.to_string(),
        }
    }

    pub fn any_item(field: &str, key: &str, test: ItemTest) -> Self {
        Self::AnyItem {
            field: field.to_string(),
            key: key.to_string(),
            test,
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Self::Always => true,
            Self::NonEmpty { field } => match data.get(field) {
                Some(Value::Array(items)) => !items.is_empty(),
                Some(Value::Object(map)) => !map.is_empty(),
                Some(Value::String(s)) => !s.is_empty(),
                _ => false,
            },
            Self::AnyItem { field, key, test } => data
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|item| test.check(item.get(key)))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventTrigger {
    pub event_type: EventType,
    pub condition: TriggerCondition,
}

/// Per-worker list of event triggers.
#[derive(Debug, Clone, Default)]
pub struct TriggerTable {
    triggers: BTreeMap<WorkerType, Vec<EventTrigger>>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, worker: &str, event_type: EventType, condition: TriggerCondition) -> Self {
        self.add(WorkerType::new(worker), event_type, condition);
        self
    }

    pub fn add(&mut self, worker: WorkerType, event_type: EventType, condition: TriggerCondition) {
        self.triggers.entry(worker).or_default().push(EventTrigger {
            event_type,
            condition,
        });
    }

    pub fn triggers_for(&self, worker: &WorkerType) -> &[EventTrigger] {
        self.triggers.get(worker).map_or(&[], Vec::as_slice)
    }

    /// Events raised by `result`, in table order, without duplicates.
    pub fn classify(&self, worker: &WorkerType, result: &WorkResult) -> Vec<EventType> {
        let mut events = Vec::new();
        for trigger in self.triggers_for(worker) {
            if trigger.condition.matches(result.data()) && !events.contains(&trigger.event_type) {
                events.push(trigger.event_type);
            }
        }
        events
    }

    /// Every event type `worker` can raise.
    pub fn emits(&self, worker: &WorkerType) -> Vec<EventType> {
        let mut events: Vec<EventType> = self
            .triggers_for(worker)
            .iter()
            .map(|t| t.event_type)
            .collect();
        events.dedup();
        events
    }

    pub fn emits_map(&self) -> HashMap<WorkerType, Vec<EventType>> {
        self.triggers
            .keys()
            .map(|w| (w.clone(), self.emits(w)))
            .collect()
    }
}
