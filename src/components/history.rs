use std::collections::VecDeque;

// ============================================================================
// HISTORY STACK - Linear undo/redo timeline with branch pruning
// ============================================================================

/// Linear undo/redo container of immutable snapshots.
///
/// The same type backs three independent surfaces: committed image versions,
/// mask raster states and annotation raster states. Pushing after an undo
/// discards the redoable future; the timeline never forks.
#[derive(Clone, Debug)]
pub struct HistoryStack<T> {
    entries: VecDeque<T>,
    /// Index of the current entry. `None` iff `entries` is empty.
    cursor: Option<usize>,
    /// Oldest entries are dropped once the stack grows past this.
    max_entries: Option<usize>,
    /// Set by the owner for the duration of a gesture; pushes are ignored meanwhile.
    mutating: bool,
}

impl<T> Default for HistoryStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HistoryStack<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            max_entries: None,
            mutating: false,
        }
    }

    /// Bounded history. A limit of zero is treated as one.
    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries.max(1)),
            ..Self::new()
        }
    }

    /// Truncates to `cursor + 1`, appends and advances the cursor.
    /// Returns `false` (and drops the snapshot) while a mutation is in progress.
    pub fn push(&mut self, snapshot: T) -> bool {
        if self.mutating {
            return false;
        }
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push_back(snapshot);
        self.cursor = Some(self.entries.len() - 1);
        self.prune();
        true
    }

    /// Steps back one entry and returns it, or `None` when already at the start.
    pub fn undo(&mut self) -> Option<&T> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                self.entries.get(c - 1)
            }
            _ => None,
        }
    }

    /// Steps forward one entry and returns it, or `None` when already at the end.
    pub fn redo(&mut self) -> Option<&T> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                self.entries.get(c + 1)
            }
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    pub fn first(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Replaces the whole timeline with a single entry.
    pub fn reset(&mut self, initial: T) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.cursor = Some(0);
        self.mutating = false;
    }

    /// Jumps to the first entry and permanently drops everything after it.
    pub fn truncate_to_first(&mut self) -> Option<&T> {
        self.entries.truncate(1);
        self.cursor = if self.entries.is_empty() { None } else { Some(0) };
        self.entries.front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.mutating = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    pub fn begin_mutation(&mut self) {
        self.mutating = true;
    }

    pub fn end_mutation(&mut self) {
        self.mutating = false;
    }

    pub fn is_mutating(&self) -> bool {
        self.mutating
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Drop oldest entries to stay within `max_entries`.
    fn prune(&mut self) {
        let Some(max) = self.max_entries else {
            return;
        };
        while self.entries.len() > max {
            self.entries.pop_front();
            self.cursor = self.cursor.map(|c| c.saturating_sub(1));
        }
    }
}
