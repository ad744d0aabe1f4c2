use std::collections::VecDeque;

use crate::canvas::Snapshot;

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// A labelled full-canvas snapshot.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub description: String,
    pub snapshot: Snapshot,
}

impl HistoryEntry {
    pub fn memory_size(&self) -> usize {
        self.snapshot.memory_bytes() + self.description.len()
    }
}

// ============================================================================
// HISTORY MANAGER - linear snapshot list with a cursor
// ============================================================================

/// Undo/redo store.
///
/// `entries[cursor]` is always the state currently on screen.  Pushing drops
/// everything after the cursor; overflowing the limit evicts from the front
/// and shifts the cursor so it still points at the newest entry.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    max_history_size: usize,
    /// Optional memory cap in bytes.  The newest entry is never evicted.
    max_memory_bytes: Option<usize>,
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            max_history_size: max_history_size.max(1),
            max_memory_bytes: None,
            total_memory: 0,
        }
    }

    pub fn with_memory_limit(mut self, max_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_bytes;
        self
    }

    pub fn push(&mut self, description: impl Into<String>, snapshot: Snapshot) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        while self.entries.len() > keep {
            if let Some(dropped) = self.entries.pop_back() {
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
            }
        }

        let entry = HistoryEntry {
            description: description.into(),
            snapshot,
        };
        self.total_memory += entry.memory_size();
        self.entries.push_back(entry);

        let evicted = self.prune();
        if evicted > 0 {
            crate::log_debug!("history: evicted {} oldest snapshot(s)", evicted);
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step back one entry and return the snapshot to restore.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                self.entries.get(c - 1).map(|e| &e.snapshot)
            }
            _ => None,
        }
    }

    pub fn redo(&mut self) -> Option<&Snapshot> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                self.entries.get(c + 1).map(|e| &e.snapshot)
            }
            _ => None,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    /// Index of the entry on screen, `None` when empty.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|c| self.entries.get(c)).map(|e| &e.snapshot)
    }

    /// Label of the edit an undo would revert.
    pub fn undo_description(&self) -> Option<&str> {
        match self.cursor {
            Some(c) if c > 0 => self.entries.get(c).map(|e| e.description.as_str()),
            _ => None,
        }
    }

    pub fn redo_description(&self) -> Option<&str> {
        let c = self.cursor?;
        self.entries.get(c + 1).map(|e| e.description.as_str())
    }

    /// Labels of undoable edits, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        match self.cursor {
            Some(c) => self
                .entries
                .iter()
                .take(c + 1)
                .skip(1)
                .rev()
                .map(|e| e.description.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.max_history_size
    }

    pub fn undo_count(&self) -> usize {
        self.cursor.unwrap_or(0)
    }

    pub fn redo_count(&self) -> usize {
        self.cursor.map_or(0, |c| self.entries.len() - 1 - c)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.total_memory = 0;
    }

    /// Evict from the front until within limits.  Returns how many went.
    fn prune(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.max_history_size {
            if let Some(removed) = self.entries.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                evicted += 1;
            }
        }
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.entries.len() > 1 {
                if let Some(removed) = self.entries.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                    evicted += 1;
                }
            }
        }
        evicted
    }
}
