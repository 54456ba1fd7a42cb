//! # Operations
//!
//! The closed vocabulary of atomic, replayable document edits.
//!
//! ## Design Principles
//!
//! 1. **Closed sum**: six fixed kinds, exhaustively matched everywhere they
//!    are interpreted. Selection changes and whole-value replacement are not
//!    operations at all (see `EditorChange`); they can never reach the wire.
//! 2. **Replayable**: an operation carries its target path, offsets, and
//!    payload, enough to apply deterministically against an equivalent
//!    document on a remote peer.
//! 3. **Invertible**: every operation's inverse is computable against the
//!    document state it is about to be applied to, which is what the
//!    undo/redo history is built on.
//!
//! ## Semantics
//!
//! - `InsertText` / `RemoveText`: char-offset edits within one run.
//!   `RemoveText` carries the removed text for inversion; apply validates
//!   offsets only.
//! - `SplitNode` / `MergeNode`: block splits at a run index, run splits at a
//!   char offset; merge folds a node into its previous sibling. Merging node
//!   0 fails, which is what preserves the non-empty document invariant.
//! - `SetNode`: retags a block. Runs carry no settable properties (their
//!   decorations are derived), so inline targets are rejected.
//! - `MoveNode`: same-depth relocation; destination index interpreted after
//!   removal and clamped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{BlockKind, Document, InlinePath, NodePath};

/// Failure to apply an operation to the current document structure.
///
/// These are desynchronization signals: the peer that produced the operation
/// sees a different document shape. They must be surfaced, never dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("no node at path {0}")]
    InvalidPath(NodePath),

    #[error("offset {offset} exceeds length {len} at {path}")]
    OffsetOutOfRange {
        path: NodePath,
        offset: usize,
        len: usize,
    },

    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}

/// One atomic edit to the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert `text` at a char offset within one run.
    InsertText {
        at: InlinePath,
        offset: usize,
        text: String,
    },

    /// Remove the given text at a char offset within one run.
    RemoveText {
        at: InlinePath,
        offset: usize,
        text: String,
    },

    /// Split a node into two siblings. For a block, `position` is a run
    /// index; for a run, a char offset.
    SplitNode { at: NodePath, position: usize },

    /// Merge the node at `at` into its previous sibling. `position` records
    /// the previous sibling's length at merge time (run count for blocks,
    /// char count for runs); it is carried for inversion, not validated.
    MergeNode { at: NodePath, position: usize },

    /// Retag a block.
    SetNode { at: NodePath, kind: BlockKind },

    /// Relocate a node to a same-depth position.
    MoveNode { from: NodePath, to: NodePath },
}

impl Operation {
    /// Apply this operation to a document.
    pub(crate) fn apply_to(&self, doc: &mut Document) -> Result<(), ApplyError> {
        match self {
            Operation::InsertText { at, offset, text } => {
                let run = doc
                    .run_mut(*at)
                    .ok_or(ApplyError::InvalidPath(NodePath::Inline(*at)))?;
                let len = run.char_len();
                run.insert_at(*offset, text)
                    .ok_or(ApplyError::OffsetOutOfRange {
                        path: NodePath::Inline(*at),
                        offset: *offset,
                        len,
                    })
            }

            Operation::RemoveText { at, offset, text } => {
                let run = doc
                    .run_mut(*at)
                    .ok_or(ApplyError::InvalidPath(NodePath::Inline(*at)))?;
                let len = run.char_len();
                let count = text.chars().count();
                run.remove_range(*offset, count)
                    .map(|_| ())
                    .ok_or(ApplyError::OffsetOutOfRange {
                        path: NodePath::Inline(*at),
                        offset: *offset + count,
                        len,
                    })
            }

            Operation::SplitNode { at, position } => match at {
                NodePath::Block(i) => doc.split_block(*i, *position),
                NodePath::Inline(p) => doc.split_run(*p, *position),
            },

            Operation::MergeNode { at, .. } => match at {
                NodePath::Block(i) => doc.merge_block(*i),
                NodePath::Inline(p) => doc.merge_run(*p),
            },

            Operation::SetNode { at, kind } => match at {
                NodePath::Block(i) => {
                    let block = doc
                        .block_mut(*i)
                        .ok_or(ApplyError::InvalidPath(NodePath::Block(*i)))?;
                    block.set_kind(*kind);
                    Ok(())
                }
                NodePath::Inline(_) => Err(ApplyError::InvalidStructure(
                    "text runs carry no settable properties".into(),
                )),
            },

            Operation::MoveNode { from, to } => doc.move_node(*from, *to),
        }
    }

    /// Compute the operation that undoes this one, evaluated against the
    /// document state this operation is about to be applied to.
    pub fn inverse(&self, doc: &Document) -> Result<Operation, ApplyError> {
        match self {
            Operation::InsertText { at, offset, text } => Ok(Operation::RemoveText {
                at: *at,
                offset: *offset,
                text: text.clone(),
            }),

            Operation::RemoveText { at, offset, text } => Ok(Operation::InsertText {
                at: *at,
                offset: *offset,
                text: text.clone(),
            }),

            Operation::SplitNode { at, position } => {
                let merge_at = match at {
                    NodePath::Block(i) => NodePath::Block(i + 1),
                    NodePath::Inline(p) => NodePath::Inline(InlinePath::new(p.block, p.run + 1)),
                };
                Ok(Operation::MergeNode {
                    at: merge_at,
                    position: *position,
                })
            }

            Operation::MergeNode { at, .. } => match at {
                NodePath::Block(i) => {
                    if *i == 0 {
                        return Err(ApplyError::InvalidStructure(
                            "block 0 has no previous sibling to merge into".into(),
                        ));
                    }
                    let prev = doc
                        .block(i - 1)
                        .ok_or(ApplyError::InvalidPath(NodePath::Block(i - 1)))?;
                    Ok(Operation::SplitNode {
                        at: NodePath::Block(i - 1),
                        position: prev.runs().len(),
                    })
                }
                NodePath::Inline(p) => {
                    if p.run == 0 {
                        return Err(ApplyError::InvalidStructure(format!(
                            "run {} has no previous sibling to merge into",
                            NodePath::Inline(*p)
                        )));
                    }
                    let prev_path = InlinePath::new(p.block, p.run - 1);
                    let prev = doc
                        .run(prev_path)
                        .ok_or(ApplyError::InvalidPath(NodePath::Inline(prev_path)))?;
                    Ok(Operation::SplitNode {
                        at: NodePath::Inline(prev_path),
                        position: prev.char_len(),
                    })
                }
            },

            Operation::SetNode { at, .. } => match at {
                NodePath::Block(i) => {
                    let block = doc
                        .block(*i)
                        .ok_or(ApplyError::InvalidPath(NodePath::Block(*i)))?;
                    Ok(Operation::SetNode {
                        at: *at,
                        kind: block.kind(),
                    })
                }
                NodePath::Inline(_) => Err(ApplyError::InvalidStructure(
                    "text runs carry no settable properties".into(),
                )),
            },

            Operation::MoveNode { from, to } => {
                let effective = match (from, to) {
                    (NodePath::Block(i), NodePath::Block(j)) => {
                        if *i >= doc.blocks().len() {
                            return Err(ApplyError::InvalidPath(*from));
                        }
                        NodePath::Block((*j).min(doc.blocks().len() - 1))
                    }
                    (NodePath::Inline(src), NodePath::Inline(dst)) => {
                        let dest = doc
                            .block(dst.block)
                            .ok_or(ApplyError::InvalidPath(*to))?;
                        let mut dest_len = dest.runs().len();
                        if src.block == dst.block {
                            dest_len -= 1;
                        }
                        NodePath::Inline(InlinePath::new(dst.block, dst.run.min(dest_len)))
                    }
                    _ => {
                        return Err(ApplyError::InvalidStructure(
                            "move endpoints must address the same depth".into(),
                        ))
                    }
                };
                Ok(Operation::MoveNode {
                    from: effective,
                    to: *from,
                })
            }
        }
    }
}
