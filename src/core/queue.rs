//! Ordering of a batch of pending events before they reach the machine.

use crate::models::QueuedEvent;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    event: QueuedEvent,
    seq: u64,
}

impl Pending {
    fn key(&self) -> (i64, u8, u64) {
        (
            self.event.at.timestamp(),
            self.event.event.priority(),
            self.seq,
        )
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap keyed by (timestamp, source priority, arrival order).
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Pending>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: QueuedEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Pending { event, seq }));
    }

    pub fn pop(&mut self) -> Option<QueuedEvent> {
        self.heap.pop().map(|Reverse(p)| p.event)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove every pending event, earliest first.
    pub fn drain_ordered(&mut self) -> Vec<QueuedEvent> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(ev) = self.pop() {
            out.push(ev);
        }
        out
    }
}
