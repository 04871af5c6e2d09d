use std::collections::VecDeque;

use serde::Serialize;

use super::request::ProcRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StallKind {
    /// No free MSHR entry.
    MshrStall,
    /// The line already has an outstanding transaction.
    PrevPendStall,
    /// The replacement victim is itself mid-transaction.
    LruBusyStall,
    /// The line is being evicted to make room for another line.
    TransStall,
}

#[derive(Debug, Clone)]
pub struct StallEntry {
    pub kind: StallKind,
    pub request: ProcRequest,
    /// Line whose transaction has to finish before the request is retried.
    pub blocking: u64,
}

impl StallEntry {
    /// Whether a transaction finishing on `line` clears this entry.  MSHR stalls wait for any
    /// entry to be freed, the rest for their blocking line.
    pub fn is_woken_by(&self, line: u64, mshr_freed: bool) -> bool {
        match self.kind {
            StallKind::MshrStall => mshr_freed,
            _ => self.blocking == line,
        }
    }
}

/// Deferred processor requests in arrival order.
#[derive(Debug, Default)]
pub struct StallBuffer {
    entries: VecDeque<StallEntry>,
}

impl StallBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, kind: StallKind, request: ProcRequest, blocking: u64) {
        self.entries.push_back(StallEntry {
            kind,
            request,
            blocking,
        });
    }

    /// Remove every entry satisfying `pred`, returning them oldest first.  Entries left behind
    /// keep their relative order.
    pub fn wake_matching<F>(&mut self, mut pred: F) -> Vec<StallEntry>
    where
        F: FnMut(&StallEntry) -> bool,
    {
        let mut woken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if pred(&entry) {
                woken.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        woken
    }

    pub fn kinds(&self) -> impl Iterator<Item = StallKind> + '_ {
        self.entries.iter().map(|entry| entry.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StallEntry> {
        self.entries.iter()
    }

    pub fn back(&self) -> Option<&StallEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
