//! Bounded chronicle of notable ecosystem moments.
//!
//! The log itself is a plain FIFO capped at a fixed capacity; similarity
//! filtering happens at read time so the raw history stays intact.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// How many recently surfaced entries a candidate is compared against.
const DEDUP_WINDOW: usize = 3;

/// Word-overlap ratio above which two entries read as the same event.
const DEDUP_THRESHOLD: f64 = 0.7;

/// A single codex line, stamped with the cycle it was recorded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodexEntry {
    pub cycle: u64,
    pub text: String,
}

/// Capped FIFO of codex entries, oldest evicted first.
#[derive(Debug, Clone, PartialEq)]
pub struct CodexLog {
    entries: VecDeque<CodexEntry>,
    capacity: usize,
}

impl CodexLog {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    /// Rebuild a log from previously persisted entries, trimming to capacity.
    #[must_use]
    pub fn from_entries(capacity: usize, entries: Vec<CodexEntry>) -> Self {
        let mut log = Self::with_capacity(capacity);
        for entry in entries {
            log.entries.push_back(entry);
        }
        while log.entries.len() > log.capacity {
            log.entries.pop_front();
        }
        log
    }

    /// Append an entry, evicting the oldest when over capacity.
    pub fn push(&mut self, cycle: u64, text: impl Into<String>) {
        self.entries.push_back(CodexEntry {
            cycle,
            text: text.into(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest-to-newest view of the raw history.
    pub fn entries(&self) -> impl Iterator<Item = &CodexEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<CodexEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Whether any entry's text contains the given fragment.
    #[must_use]
    pub fn contains(&self, fragment: &str) -> bool {
        self.entries.iter().any(|entry| entry.text.contains(fragment))
    }

    /// Up to `max` entries, newest first, with near-duplicates suppressed.
    ///
    /// An entry is dropped when its text overlaps more than the threshold
    /// with any of the newest few entries kept, so the surfaced feed reads
    /// as distinct events even when the raw log repeats itself.
    #[must_use]
    pub fn recent(&self, max: usize) -> Vec<&CodexEntry> {
        let mut kept: Vec<&CodexEntry> = Vec::new();
        for entry in self.entries.iter().rev() {
            if kept.len() >= max {
                break;
            }
            // Always compare against the newest kept entries, not a window
            // that slides with the walk.
            let duplicate = kept
                .iter()
                .take(DEDUP_WINDOW)
                .any(|seen| is_near_duplicate(&seen.text, &entry.text));
            if !duplicate {
                kept.push(entry);
            }
        }
        kept
    }
}

fn is_near_duplicate(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    word_overlap(a, b) > DEDUP_THRESHOLD
}

/// Shared distinct lowercase words divided by the larger word set.
fn word_overlap(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    let larger = words_a.len().max(words_b.len());
    if larger == 0 {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    shared as f64 / larger as f64
}
