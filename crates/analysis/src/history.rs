use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Detection history of one symbol for the current day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateHistoryEntry {
    pub symbol: String,
    pub occurrences: Vec<DateTime<Utc>>,
    pub daily_count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Per-symbol detection counts. Cleared wholesale by the daily reset.
#[derive(Debug, Default)]
pub struct CandidateHistory {
    entries: HashMap<String, CandidateHistoryEntry>,
}

impl CandidateHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one detection and return the updated entry.
    pub fn record(&mut self, symbol: &str, at: DateTime<Utc>) -> &CandidateHistoryEntry {
        let entry = self
            .entries
            .entry(symbol.to_string())
            .or_insert_with(|| CandidateHistoryEntry {
                symbol: symbol.to_string(),
                occurrences: Vec::new(),
                daily_count: 0,
                first_seen: at,
                last_seen: at,
            });
        entry.occurrences.push(at);
        entry.daily_count += 1;
        entry.last_seen = at;
        entry
    }

    pub fn get(&self, symbol: &str) -> Option<&CandidateHistoryEntry> {
        self.entries.get(symbol)
    }

    pub fn daily_count(&self, symbol: &str) -> u32 {
        self.entries.get(symbol).map(|e| e.daily_count).unwrap_or(0)
    }

    /// Entries, most recently seen first.
    pub fn entries(&self) -> Vec<&CandidateHistoryEntry> {
        let mut out: Vec<_> = self.entries.values().collect();
        out.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.symbol.cmp(&b.symbol)));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
