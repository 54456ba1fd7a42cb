//! # Operation Log
//!
//! The [`Editor`] owns the document and is its single mutation gateway.
//! Every local change enters through [`Editor::record_batch`] and comes back
//! out as the exact sequence of [`Operation`]s applied, ready for
//! transmission. Remote changes enter through [`Editor::apply_remote`],
//! which uses the same application path but records nothing, so a replayed
//! peer edit can never echo back onto the wire.
//!
//! ```text
//! widget changes ──► record_batch ──► [Operation, ...] ──► sync channel
//!                         │                                     │
//!                         ▼                                     ▼
//!                      Document  ◄──────── apply_remote ◄── peer ops
//! ```
//!
//! Selection updates and whole-value replacement are local-only: they are
//! not operations, produce no batch entries, and are never transmitted.

use crate::document::{Document, Point};
use crate::operations::{ApplyError, Operation};

/// Local caret/range state. Never synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

/// What the editor widget reports for one logical edit event. Only `Edit`
/// entries are genuine operations; the rest are filtered out of the
/// recorded batch before it is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorChange {
    Edit(Operation),
    Select { anchor: Point, focus: Point },
    ReplaceValue(Document),
}

/// Document plus operation log: the one object through which all mutation
/// flows.
#[derive(Debug, Default)]
pub struct Editor {
    document: Document,
    selection: Option<Selection>,
}

impl Editor {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            selection: None,
        }
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            document,
            selection: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Apply one logical batch of widget changes and return exactly the
    /// operations that were applied, in order.
    ///
    /// Selection entries update local selection state; `ReplaceValue`
    /// entries replace the document wholesale. Neither is recorded, so a
    /// selection-only event yields an empty batch, which callers must not
    /// transmit. On error the already-applied prefix stays applied and the
    /// caller is expected to treat the session as desynchronized.
    pub fn record_batch(
        &mut self,
        changes: impl IntoIterator<Item = EditorChange>,
    ) -> Result<Vec<Operation>, ApplyError> {
        let mut recorded = Vec::new();
        for change in changes {
            match change {
                EditorChange::Edit(op) => {
                    self.document.apply(&op)?;
                    recorded.push(op);
                }
                EditorChange::Select { anchor, focus } => {
                    self.selection = Some(Selection { anchor, focus });
                }
                EditorChange::ReplaceValue(document) => {
                    self.load(document);
                }
            }
        }
        Ok(recorded)
    }

    /// Apply one externally received operation without recording it.
    ///
    /// Runs through the same application path as local edits so the two
    /// cannot diverge. An error here means this replica is out of sync with
    /// the operation's origin and must be surfaced to the session.
    pub fn apply_remote(&mut self, op: &Operation) -> Result<(), ApplyError> {
        self.document.apply(op)
    }

    /// Install a snapshot wholesale. The one legitimate whole-document
    /// replacement (channel join / resync); never recorded, never
    /// re-broadcast.
    pub fn load(&mut self, document: Document) {
        self.document = document;
        self.selection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, InlinePath};

    fn insert(text: &str, offset: usize) -> EditorChange {
        EditorChange::Edit(Operation::InsertText {
            at: InlinePath::new(0, 0),
            offset,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_recorded_batch_matches_applied_operations() {
        let mut editor = Editor::new();
        let batch = editor
            .record_batch(vec![insert("he", 0), insert("y", 2)])
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(editor.document().first_block().text(), "hey");
    }

    #[test]
    fn test_selection_only_batch_is_empty() {
        let mut editor = Editor::new();
        let point = Point {
            path: InlinePath::new(0, 0),
            offset: 0,
        };
        let batch = editor
            .record_batch(vec![EditorChange::Select {
                anchor: point,
                focus: point,
            }])
            .unwrap();
        assert!(batch.is_empty());
        assert!(editor.selection().is_some());
    }

    #[test]
    fn test_replace_value_is_not_recorded() {
        let mut editor = Editor::new();
        let replacement = Document::from_blocks(vec![Block::paragraph("loaded")]);
        let batch = editor
            .record_batch(vec![EditorChange::ReplaceValue(replacement)])
            .unwrap();
        assert!(batch.is_empty());
        assert_eq!(editor.document().first_block().text(), "loaded");
    }

    #[test]
    fn test_remote_application_records_nothing() {
        let mut editor = Editor::new();
        let op = Operation::InsertText {
            at: InlinePath::new(0, 0),
            offset: 0,
            text: "remote".to_string(),
        };
        editor.apply_remote(&op).unwrap();
        assert_eq!(editor.document().first_block().text(), "remote");

        // A later local batch contains only its own operations.
        let batch = editor.record_batch(vec![insert("!", 6)]).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(matches!(&batch[0], Operation::InsertText { text, .. } if text == "!"));
    }

    #[test]
    fn test_load_resets_selection() {
        let mut editor = Editor::new();
        let point = Point {
            path: InlinePath::new(0, 0),
            offset: 0,
        };
        editor.set_selection(Some(Selection {
            anchor: point,
            focus: point,
        }));
        editor.load(Document::new());
        assert!(editor.selection().is_none());
    }
}
