use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::task::Priority;

/// Priority queue item wrapper
///
/// Pairs an item with its priority and the sequence number it was
/// enqueued with. The sequence number breaks ties so that items of equal
/// priority leave the queue in submission order.
#[derive(Debug, Clone)]
pub struct QueueItem<T> {
    /// Priority of the wrapped item
    pub priority: Priority,
    /// Monotonic submission counter
    pub sequence: u64,
    /// The wrapped item
    pub item: T,
}

impl<T> PartialEq for QueueItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl<T> Eq for QueueItem<T> {}

impl<T> PartialOrd for QueueItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then the older sequence number.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Generic priority-based task queue
///
/// Items with a higher [`Priority`] are dequeued first. Items with equal
/// priority are dequeued in FIFO order. Enqueue and dequeue are
/// `O(log n)`.
///
/// # Examples
///
/// ```
/// use switchboard::domain::models::{Priority, TaskQueue};
///
/// let mut queue = TaskQueue::new();
/// queue.enqueue("a", Priority::Normal);
/// queue.enqueue("b", Priority::Low);
/// queue.enqueue("c", Priority::Critical);
/// queue.enqueue("d", Priority::Normal);
///
/// assert_eq!(queue.dequeue(), Some("c"));
/// assert_eq!(queue.dequeue(), Some("a"));
/// assert_eq!(queue.dequeue(), Some("d"));
/// assert_eq!(queue.dequeue(), Some("b"));
/// ```
#[derive(Debug, Clone)]
pub struct TaskQueue<T> {
    heap: BinaryHeap<QueueItem<T>>,
    next_sequence: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    /// Creates a new empty task queue
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Creates a new task queue with room for `capacity` items
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            next_sequence: 0,
        }
    }

    /// Adds an item to the queue with the specified priority
    ///
    /// Returns the sequence number assigned to the item.
    pub fn enqueue(&mut self, item: T, priority: Priority) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueueItem {
            priority,
            sequence,
            item,
        });
        sequence
    }

    /// Removes and returns the highest priority item
    pub fn dequeue(&mut self) -> Option<T> {
        self.heap.pop().map(|entry| entry.item)
    }

    /// Returns a reference to the item that would be dequeued next
    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|entry| &entry.item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Returns the queued items in dequeue order
    ///
    /// This sorts a copy of the heap, so it is `O(n log n)`; it is meant for
    /// snapshots and diagnostics, not for the hot path.
    pub fn ordered(&self) -> Vec<&QueueItem<T>> {
        let mut items: Vec<&QueueItem<T>> = self.heap.iter().collect();
        items.sort_by(|a, b| b.cmp(a));
        items
    }

    /// Removes all items matching the predicate, returning how many were removed
    pub fn remove_matching<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.heap.len();
        self.heap.retain(|entry| !predicate(&entry.item));
        before - self.heap.len()
    }

    /// Counts items matching the predicate
    pub fn count_matching<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        self.heap.iter().filter(|entry| predicate(&entry.item)).count()
    }
}
