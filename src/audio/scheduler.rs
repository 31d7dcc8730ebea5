//! Cancellable one-shot timers on the engine clock.
//!
//! Nothing fires on its own: the host polls with the current engine time and
//! gets back every task that has come due. Recurring work re-arms itself by
//! scheduling again after it runs.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy)]
struct Slot {
    due: f64,
    seq: u64,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.total_cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

pub struct Scheduler<T> {
    queue: BinaryHeap<Reverse<Slot>>,
    pending: HashMap<u64, T>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self { queue: BinaryHeap::new(), pending: HashMap::new(), next_seq: 0 }
    }

    pub fn schedule(&mut self, due: f64, task: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Slot { due, seq }));
        self.pending.insert(seq, task);
        TimerHandle(seq)
    }

    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle.0).is_some()
    }

    /// Remove and return every task due at or before `now`, earliest first,
    /// ties in arming order. A timer that is late fires once.
    pub fn poll(&mut self, now: f64) -> Vec<(TimerHandle, T)> {
        let mut due = Vec::new();
        while let Some(Reverse(slot)) = self.queue.peek().copied() {
            if slot.due > now {
                break;
            }
            self.queue.pop();
            if let Some(task) = self.pending.remove(&slot.seq) {
                due.push((TimerHandle(slot.seq), task));
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
