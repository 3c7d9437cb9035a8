//! The Browser Command Buffer — the gating ledger.
//!
//! Append-only ring of commands the gate can see. Human entries are what
//! block assistant submissions; assistant entries exist so `cancel` can
//! surgically remove its own tracks without touching human history.

use sshmux_core::{BrowserCommandEntry, CommandId, ExecOutcome, Source};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug)]
pub struct BrowserCommandBuffer {
    entries: VecDeque<BrowserCommandEntry>,
    capacity: usize,
}

impl BrowserCommandBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry, dropping the oldest on overflow.
    pub fn append(&mut self, entry: BrowserCommandEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Record a command's final result. Called exactly once per executed
    /// command; an unknown id is logged but does not fail the command (the
    /// ring may have dropped the entry, or a reset cleared it).
    pub fn update_result(&mut self, id: &CommandId, result: ExecOutcome) {
        match self.entries.iter_mut().rev().find(|e| &e.command_id == id) {
            Some(entry) => entry.result = result,
            None => warn!(command_id = %id, "ledger entry not found for result update"),
        }
    }

    /// Copy of the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<BrowserCommandEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The set the gate consults: human-sourced entries only.
    pub fn human_entries(&self) -> Vec<BrowserCommandEntry> {
        self.entries
            .iter()
            .filter(|e| e.source == Source::Human)
            .cloned()
            .collect()
    }

    /// Empty the buffer (recovery reset, and after emitting a gating error).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop assistant-sourced entries only; human history survives.
    pub fn remove_assistant_entries(&mut self) {
        self.entries.retain(|e| e.source != Source::Assistant);
    }
}
