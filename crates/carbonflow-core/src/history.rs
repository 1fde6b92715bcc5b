//! # History
//!
//! Snapshot-based undo/redo.
//!
//! Entries are `Graph` values, which share unchanged nodes with each other
//! and with the live graph, so a push costs one map-spine copy at most.
//! The cursor points at the entry matching the live graph. Undo and redo at
//! either end are no-ops.

use crate::graph::Graph;

/// Undo/redo stack of graph snapshots.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Graph>,
    cursor: usize,
    limit: usize,
}

impl History {
    /// Create a history whose first entry is `initial`.
    #[must_use]
    pub fn new(initial: Graph, limit: usize) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record the state after a user action.
    ///
    /// Discards any redoable entries, then drops the oldest entry once the
    /// limit is exceeded.
    pub fn push(&mut self, graph: Graph) {
        self.entries.truncate(self.cursor.saturating_add(1));
        self.entries.push(graph);
        if self.entries.len() > self.limit {
            self.entries.remove(0);
        }
        self.cursor = self.entries.len().saturating_sub(1);
    }

    /// Step back one entry. Returns `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&Graph> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward one entry. Returns `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&Graph> {
        if self.cursor.saturating_add(1) >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.saturating_add(1) < self.entries.len()
    }

    /// The entry at the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Graph> {
        self.entries.get(self.cursor)
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
