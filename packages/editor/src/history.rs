//! # Undo/Redo History
//!
//! Tracks local operation batches and their inverses.
//!
//! ## Design
//!
//! - Inverses are computed batch-by-batch against the document state each
//!   operation was applied to, then stored in reverse application order.
//! - `undo`/`redo` hand back a batch of operations for the caller to apply
//!   through the normal recording path, so undos synchronize to peers like
//!   any other local edit.
//! - New batches clear the redo stack.
//! - Remote operations never enter the history; only the session's own
//!   batches are recorded here.

use crate::document::Document;
use crate::operations::{ApplyError, Operation};

/// One undoable step: the operations of a local batch plus their inverses
/// in reverse order.
#[derive(Debug, Clone)]
pub struct OperationBatch {
    pub operations: Vec<Operation>,
    pub inverses: Vec<Operation>,
}

/// Undo/redo stack over local operation batches.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<OperationBatch>,
    redo_stack: Vec<OperationBatch>,
    max_levels: usize,
}

impl History {
    /// Default capacity of 100 undo levels.
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    /// `max_levels` of 0 means unlimited.
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Record a freshly applied local batch. `before` is the document state
    /// the batch was applied to; inverses are derived by replaying the
    /// operations against a copy of it. Empty batches are ignored.
    pub fn record(
        &mut self,
        operations: &[Operation],
        before: &Document,
    ) -> Result<(), ApplyError> {
        if operations.is_empty() {
            return Ok(());
        }
        let mut doc = before.clone();
        let mut inverses = Vec::with_capacity(operations.len());
        for op in operations {
            inverses.push(op.inverse(&doc)?);
            doc.apply(op)?;
        }
        inverses.reverse();
        self.push(OperationBatch {
            operations: operations.to_vec(),
            inverses,
        });
        Ok(())
    }

    fn push(&mut self, batch: OperationBatch) {
        self.undo_stack.push(batch);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Pop the most recent batch and return the operations that undo it.
    pub fn undo(&mut self) -> Option<Vec<Operation>> {
        let batch = self.undo_stack.pop()?;
        let inverses = batch.inverses.clone();
        self.redo_stack.push(batch);
        Some(inverses)
    }

    /// Return the operations that reapply the most recently undone batch.
    pub fn redo(&mut self) -> Option<Vec<Operation>> {
        let batch = self.redo_stack.pop()?;
        let operations = batch.operations.clone();
        self.undo_stack.push(batch);
        Some(operations)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InlinePath;
    use crate::editor::{Editor, EditorChange};

    fn insert(text: &str, offset: usize) -> EditorChange {
        EditorChange::Edit(Operation::InsertText {
            at: InlinePath::new(0, 0),
            offset,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_undo_then_redo_round_trips_text() {
        let mut editor = Editor::new();
        let mut history = History::new();

        let before = editor.document().clone();
        let ops = editor.record_batch(vec![insert("hello", 0)]).unwrap();
        history.record(&ops, &before).unwrap();
        assert_eq!(editor.document().first_block().text(), "hello");

        let undo_ops = history.undo().unwrap();
        let changes: Vec<_> = undo_ops.into_iter().map(EditorChange::Edit).collect();
        editor.record_batch(changes).unwrap();
        assert_eq!(editor.document().first_block().text(), "");

        let redo_ops = history.redo().unwrap();
        let changes: Vec<_> = redo_ops.into_iter().map(EditorChange::Edit).collect();
        editor.record_batch(changes).unwrap();
        assert_eq!(editor.document().first_block().text(), "hello");
    }

    #[test]
    fn test_multi_operation_batch_undoes_as_one_step() {
        let mut editor = Editor::new();
        let mut history = History::new();

        let before = editor.document().clone();
        let ops = editor
            .record_batch(vec![insert("ab", 0), insert("cd", 2)])
            .unwrap();
        history.record(&ops, &before).unwrap();
        assert_eq!(editor.document().first_block().text(), "abcd");

        let undo_ops = history.undo().unwrap();
        assert_eq!(undo_ops.len(), 2);
        for op in &undo_ops {
            editor.apply_remote(op).unwrap();
        }
        assert_eq!(editor.document().first_block().text(), "");
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[test]
    fn test_new_batch_clears_redo() {
        let mut editor = Editor::new();
        let mut history = History::new();

        let before = editor.document().clone();
        let ops = editor.record_batch(vec![insert("a", 0)]).unwrap();
        history.record(&ops, &before).unwrap();
        history.undo().unwrap();
        assert!(history.can_redo());

        let before = editor.document().clone();
        let ops = editor.record_batch(vec![insert("b", 1)]).unwrap();
        history.record(&ops, &before).unwrap();
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut history = History::with_max_levels(2);
        let mut editor = Editor::new();
        for i in 0..3 {
            let before = editor.document().clone();
            let ops = editor.record_batch(vec![insert("x", i)]).unwrap();
            history.record(&ops, &before).unwrap();
        }
        assert!(history.undo().is_some());
        assert!(history.undo().is_some());
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_empty_batch_is_not_recorded() {
        let mut history = History::new();
        history.record(&[], &Document::new()).unwrap();
        assert!(!history.can_undo());
    }
}
