//! One-shot alarms ordered by deadline.
//!
//! A min-heap of `(deadline, sequence)` keys with the payloads held in a
//! side table. Cancelling removes the payload; the heap key is skipped
//! lazily when it reaches the top. Alarms with equal deadlines fire in the
//! order they were armed.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use tokio::time::Instant;

/// Identifies one armed alarm. Handles are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

struct Scheduled {
    deadline: Instant,
    seq: u64,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Queue of one-shot alarms carrying a `T` each.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Scheduled>>,
    pending: HashMap<u64, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Arms an alarm `delay` from now.
    pub fn arm(&mut self, delay: Duration, payload: T) -> TimerHandle {
        self.arm_at(Instant::now() + delay, payload)
    }

    /// Arms an alarm at an absolute deadline.
    pub fn arm_at(&mut self, deadline: Instant, payload: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { deadline, seq }));
        self.pending.insert(seq, payload);
        TimerHandle(seq)
    }

    /// Cancels an alarm. Returns `false` if it already fired or was
    /// already cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle.0).is_some()
    }

    /// Whether `handle` is armed and has not fired.
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle.0)
    }

    /// Number of armed alarms.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.pending.contains_key(&top.seq) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Deadline of the earliest armed alarm.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(s)| s.deadline)
    }

    /// Removes and returns the earliest alarm if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerHandle, T)> {
        self.discard_cancelled();
        match self.heap.peek() {
            Some(Reverse(top)) if top.deadline <= now => {}
            _ => return None,
        }
        let Reverse(top) = self.heap.pop()?;
        let payload = self.pending.remove(&top.seq)?;
        Some((TimerHandle(top.seq), payload))
    }
}
