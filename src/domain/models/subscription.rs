//! Event subscription table and its acyclicity check.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::event::EventType;
use super::task::WorkerType;
use crate::domain::errors::{DomainError, DomainResult};

/// Static mapping from event type to the worker types that react to it.
///
/// Subscriber lists keep insertion order; fan-out follows that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionTable {
    subscribers: BTreeMap<EventType, Vec<WorkerType>>,
}

/// Node of the event/worker graph walked by the cycle check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Event(EventType),
    Worker(WorkerType),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(e) => write!(f, "{e}"),
            Self::Worker(w) => write!(f, "{w}"),
        }
    }
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `worker` to `event_type`'s subscribers. Returns false if it was
    /// already subscribed.
    pub fn subscribe(&mut self, event_type: EventType, worker: WorkerType) -> bool {
        let list = self.subscribers.entry(event_type).or_default();
        if list.contains(&worker) {
            return false;
        }
        list.push(worker);
        true
    }

    pub fn unsubscribe(&mut self, event_type: EventType, worker: &WorkerType) -> bool {
        let Some(list) = self.subscribers.get_mut(&event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|w| w != worker);
        before != list.len()
    }

    pub fn subscribers(&self, event_type: EventType) -> &[WorkerType] {
        self.subscribers.get(&event_type).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventType, &[WorkerType])> {
        self.subscribers.iter().map(|(e, w)| (*e, w.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.values().all(Vec::is_empty)
    }

    /// Verify that no chain of events starting at `roots` can revisit an
    /// event type.
    ///
    /// `emits` lists the event types each worker can publish. Edges run
    /// `event -> subscriber -> emitted event`; a cycle is reported as the
    /// path that closes it.
    pub fn check_acyclic(
        &self,
        roots: &[EventType],
        emits: &HashMap<WorkerType, Vec<EventType>>,
    ) -> DomainResult<()> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for root in roots {
            let node = Node::Event(*root);
            if !visited.contains(&node) {
                if let Some(cycle) =
                    self.detect_cycle(node, emits, &mut visited, &mut on_stack, &mut path)
                {
                    return Err(DomainError::SubscriptionCycle(cycle));
                }
            }
        }
        Ok(())
    }

    fn successors(&self, node: &Node, emits: &HashMap<WorkerType, Vec<EventType>>) -> Vec<Node> {
        match node {
            Node::Event(e) => self
                .subscribers(*e)
                .iter()
                .cloned()
                .map(Node::Worker)
                .collect(),
            Node::Worker(w) => emits
                .get(w)
                .map(|events| events.iter().copied().map(Node::Event).collect())
                .unwrap_or_default(),
        }
    }

    fn detect_cycle(
        &self,
        node: Node,
        emits: &HashMap<WorkerType, Vec<EventType>>,
        visited: &mut HashSet<Node>,
        on_stack: &mut HashSet<Node>,
        path: &mut Vec<Node>,
    ) -> Option<Vec<String>> {
        visited.insert(node.clone());
        on_stack.insert(node.clone());
        path.push(node.clone());

        for next in self.successors(&node, emits) {
            if on_stack.contains(&next) {
                let start = path.iter().position(|n| *n == next).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
                cycle.push(next.to_string());
                return Some(cycle);
            }
            if !visited.contains(&next) {
                if let Some(cycle) = self.detect_cycle(next, emits, visited, on_stack, path) {
                    return Some(cycle);
                }
            }
        }

        on_stack.remove(&node);
        path.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(name: &str) -> WorkerType {
        WorkerType::new(name)
    }

    #[test]
    fn test_subscribe_dedupes_and_keeps_order() {
        let mut table = SubscriptionTable::new();
        assert!(table.subscribe(EventType::NewContent, w("caption")));
        assert!(table.subscribe(EventType::NewContent, w("clip")));
        assert!(!table.subscribe(EventType::NewContent, w("caption")));
        assert_eq!(table.subscribers(EventType::NewContent), &[w("caption"), w("clip")]);
        assert!(table.subscribers(EventType::BreakingNews).is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::ClipDetected, w("social"));
        assert!(table.unsubscribe(EventType::ClipDetected, &w("social")));
        assert!(!table.unsubscribe(EventType::ClipDetected, &w("social")));
        assert!(table.is_empty());
    }

    #[test]
    fn test_chain_without_cycle_passes() {
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::NewContent, w("caption"));
        table.subscribe(EventType::CaptionComplete, w("social"));
        let emits = HashMap::from([(w("caption"), vec![EventType::CaptionComplete])]);
        assert!(table.check_acyclic(&EventType::ALL, &emits).is_ok());
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::BreakingNews, w("trending"));
        let emits = HashMap::from([(w("trending"), vec![EventType::BreakingNews])]);
        let err = table
            .check_acyclic(&[EventType::BreakingNews], &emits)
            .unwrap_err();
        match err {
            DomainError::SubscriptionCycle(path) => {
                assert_eq!(path, vec!["BREAKING_NEWS", "trending", "BREAKING_NEWS"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_unreachable_from_roots_is_ignored() {
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::BreakingNews, w("trending"));
        table.subscribe(EventType::NewContent, w("caption"));
        let emits = HashMap::from([(w("trending"), vec![EventType::BreakingNews])]);
        assert!(table.check_acyclic(&[EventType::NewContent], &emits).is_ok());
    }
}
