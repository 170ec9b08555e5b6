use std::collections::HashMap;

use crate::model::ClassRecord;

/// Snapshots retained per undo key and per deletion stack.
pub const MAX_HISTORY: usize = 50;

/// Past/present/future snapshot stack for one class.
#[derive(Debug, Clone)]
struct ClassHistory {
    past: Vec<ClassRecord>,
    present: ClassRecord,
    future: Vec<ClassRecord>,
}

/// Session-scoped undo/redo bookkeeping over whole class snapshots, plus the
/// deleted-class stacks. Values are opaque to this store: it never inspects a
/// record beyond cloning it.
#[derive(Debug, Default)]
pub struct HistoryStore {
    by_class: HashMap<String, ClassHistory>,
    deleted: Vec<ClassRecord>,
    redo_deleted: Vec<ClassRecord>,
}

impl HistoryStore {
    /// Seed the stack for a class from its stored state. No-op if already
    /// tracked, so callers invoke this before every tracked edit.
    pub fn ensure(&mut self, class_id: &str, current: &ClassRecord) {
        self.by_class
            .entry(class_id.to_string())
            .or_insert_with(|| ClassHistory {
                past: Vec::new(),
                present: current.clone(),
                future: Vec::new(),
            });
    }

    /// Record a tracked edit: the old present moves into the past (capped at
    /// MAX_HISTORY) and any redo branch is discarded.
    pub fn record_edit(&mut self, class_id: &str, next: ClassRecord) {
        let entry = self
            .by_class
            .entry(class_id.to_string())
            .or_insert_with(|| ClassHistory {
                past: Vec::new(),
                present: next.clone(),
                future: Vec::new(),
            });
        if entry.past.len() >= MAX_HISTORY {
            entry.past.remove(0);
        }
        let prev = std::mem::replace(&mut entry.present, next);
        entry.past.push(prev);
        entry.future.clear();
    }

    /// Step back one snapshot; returns the new present, or None when there is
    /// nothing to undo (callers no-op rather than error).
    pub fn undo(&mut self, class_id: &str) -> Option<ClassRecord> {
        let entry = self.by_class.get_mut(class_id)?;
        let previous = entry.past.pop()?;
        let current = std::mem::replace(&mut entry.present, previous);
        entry.future.push(current);
        Some(entry.present.clone())
    }

    /// Step forward one snapshot; returns the new present, or None when the
    /// redo branch is empty.
    pub fn redo(&mut self, class_id: &str) -> Option<ClassRecord> {
        let entry = self.by_class.get_mut(class_id)?;
        let next = entry.future.pop()?;
        if entry.past.len() >= MAX_HISTORY {
            entry.past.remove(0);
        }
        let current = std::mem::replace(&mut entry.present, next);
        entry.past.push(current);
        Some(entry.present.clone())
    }

    /// Drop all bookkeeping for a class (on deletion).
    pub fn forget(&mut self, class_id: &str) {
        self.by_class.remove(class_id);
    }

    /// Reset everything (bulk import replaces the whole workspace).
    pub fn reset(&mut self) {
        self.by_class.clear();
        self.deleted.clear();
        self.redo_deleted.clear();
    }

    /// Track a deleted class for later restoration. A fresh deletion clears
    /// the redo-deletion branch.
    pub fn push_deleted(&mut self, record: ClassRecord) {
        if self.deleted.len() >= MAX_HISTORY {
            self.deleted.remove(0);
        }
        self.deleted.push(record);
        self.redo_deleted.clear();
    }

    /// A new class arriving (paste) invalidates redoing past deletions.
    pub fn clear_redo_deleted(&mut self) {
        self.redo_deleted.clear();
    }

    pub fn undo_delete(&mut self) -> Option<ClassRecord> {
        let record = self.deleted.pop()?;
        if self.redo_deleted.len() >= MAX_HISTORY {
            self.redo_deleted.remove(0);
        }
        self.redo_deleted.push(record.clone());
        Some(record)
    }

    pub fn redo_delete(&mut self) -> Option<ClassRecord> {
        let record = self.redo_deleted.pop()?;
        if self.deleted.len() >= MAX_HISTORY {
            self.deleted.remove(0);
        }
        self.deleted.push(record.clone());
        Some(record)
    }
}
