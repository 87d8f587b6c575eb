//! Bounded in-memory log of recent processing outcomes.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use mediasort_core::{ItemKind, ProcessingStatus};
use parking_lot::Mutex;
use serde::Serialize;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub source_path: String,
    pub destination_path: Option<String>,
    pub status: ProcessingStatus,
    pub title: Option<String>,
    pub kind: Option<ItemKind>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounters {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub duplicates: u64,
    pub movies: u64,
    pub episodes: u64,
    pub last_processed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub counters: StatusCounters,
    pub recent: Vec<StatusEntry>,
    pub recent_errors: Vec<StatusEntry>,
}

struct Inner {
    entries: VecDeque<StatusEntry>,
    counters: StatusCounters,
}

/// Counters cover everything ever recorded; only the newest `capacity`
/// entries are kept.
pub struct StatusLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                counters: StatusCounters::default(),
            }),
        }
    }

    pub fn record(&self, entry: StatusEntry) {
        let mut inner = self.inner.lock();
        let c = &mut inner.counters;
        c.total += 1;
        match entry.status {
            ProcessingStatus::Success => {
                c.success += 1;
                match entry.kind {
                    Some(ItemKind::Movie) => c.movies += 1,
                    Some(ItemKind::Episode) => c.episodes += 1,
                    _ => {}
                }
            }
            ProcessingStatus::Error => c.error += 1,
            ProcessingStatus::SkippedDuplicate => c.duplicates += 1,
        }
        c.last_processed = Some(entry.at);

        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters plus the `limit` newest entries and newest errors, newest first.
    pub fn summary(&self, limit: usize) -> StatusSummary {
        let inner = self.inner.lock();
        StatusSummary {
            counters: inner.counters.clone(),
            recent: inner.entries.iter().rev().take(limit).cloned().collect(),
            recent_errors: inner
                .entries
                .iter()
                .rev()
                .filter(|e| e.status == ProcessingStatus::Error)
                .take(limit)
                .cloned()
                .collect(),
        }
    }
}
