//! Bounded journal of delivered debug events.

use crate::debug::events::DebugEventKind;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// No handler registered for the kind.
    Unhandled,
    Handled,
    /// The handler returned an error or panicked.
    HandlerFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub ts: String,
    pub kind: DebugEventKind,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug, Default)]
struct JournalState {
    entries: VecDeque<JournalEntry>,
    next_seq: u64,
}

/// Oldest entries are dropped once `capacity` is reached. Sequence numbers keep counting.
#[derive(Debug)]
pub struct EventJournal {
    capacity: usize,
    state: Mutex<JournalState>,
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNAL_CAPACITY)
    }
}

impl EventJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(JournalState {
                entries: VecDeque::new(),
                next_seq: 1,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, returning its sequence number.
    pub fn record(&self, kind: DebugEventKind, outcome: DeliveryOutcome) -> u64 {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        if self.capacity == 0 {
            return seq;
        }
        while state.entries.len() >= self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(JournalEntry {
            seq,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind,
            outcome,
        });
        seq
    }

    /// Update the outcome of a retained entry. `false` if it has already been dropped.
    pub fn set_outcome(&self, seq: u64, outcome: DeliveryOutcome) -> bool {
        let mut state = self.state.lock();
        match state.entries.iter_mut().rev().find(|entry| entry.seq == seq) {
            Some(entry) => {
                entry.outcome = outcome;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.state.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: DebugEventKind) -> usize {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }
}
