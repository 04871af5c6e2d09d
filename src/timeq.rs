/*
Time-queue for the cache model.

The coherence engine itself is untimed: every dispatch runs to completion within one call.  Latency
is modeled only at the edges, where results are parked in a `DelayQueue` until the cycle at which
the surrounding simulation is allowed to observe them:
    - processor replies are released `hit_time` cycles after the dispatch that produced them
    - coherence messages are released `lookup_time` cycles after the dispatch that produced them

Entries with equal ready cycles leave in the order they were pushed, so a dispatch that emits
several messages keeps their relative order on the wire.
*/

use std::collections::VecDeque;

pub type Cycle = u64;

#[derive(Debug)]
struct Delayed<T> {
    ready_at: Cycle,
    payload: T,
}

// Ordered by ready cycle, FIFO among equal cycles.
#[derive(Debug)]
pub struct DelayQueue<T> {
    entries: VecDeque<Delayed<T>>,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // Schedule `payload` to become visible `delay` cycles after `now`.
    pub fn push(&mut self, now: Cycle, delay: Cycle, payload: T) {
        let ready_at = now.saturating_add(delay);
        let pos = self.entries.partition_point(|entry| entry.ready_at <= ready_at);
        self.entries.insert(pos, Delayed { ready_at, payload });
    }

    // Pop the oldest payload whose ready cycle has been reached.
    pub fn pop_ready(&mut self, now: Cycle) -> Option<T> {
        match self.entries.front() {
            Some(front) if front.ready_at <= now => {
                self.entries.pop_front().map(|entry| entry.payload)
            }
            _ => None,
        }
    }

    // Drain every payload ready at `now` and invoke the callback in release order.
    pub fn drain_ready<F>(&mut self, now: Cycle, mut callback: F)
    where
        F: FnMut(T),
    {
        while let Some(payload) = self.pop_ready(now) {
            callback(payload);
        }
    }

    // Cycle at which the next payload becomes visible.
    pub fn next_ready_at(&self) -> Option<Cycle> {
        self.entries.front().map(|entry| entry.ready_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
