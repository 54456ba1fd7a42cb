//! # Document Model
//!
//! A Document is an ordered tree two levels deep: block nodes (paragraphs,
//! headings) containing inline text runs.
//!
//! ## Invariants
//!
//! - A Document always contains at least one Block.
//! - A Block always contains at least one Inline run (possibly empty text),
//!   so first-line extraction never fails.
//! - Structural mutation happens only through [`Operation`] application;
//!   fields are private and the mutators are crate-internal, which is what
//!   guarantees that every change is observable by the operation log.
//! - Decoration flags are never part of the model. Renderable math spans are
//!   derived views (see `decorate`), recomputed from raw text on demand.
//!
//! Text offsets are counted in Unicode scalar values, not bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::operations::{ApplyError, Operation};

/// Address of an inline run: block index, then run index within the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InlinePath {
    pub block: usize,
    pub run: usize,
}

impl InlinePath {
    pub fn new(block: usize, run: usize) -> Self {
        Self { block, run }
    }
}

impl fmt::Display for InlinePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}.{}]", self.block, self.run)
    }
}

/// Address of a node at either level of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePath {
    Block(usize),
    Inline(InlinePath),
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePath::Block(i) => write!(f, "[{}]", i),
            NodePath::Inline(p) => p.fmt(f),
        }
    }
}

/// A position inside a run's text. Used for selections and overlay ranges;
/// never serialized, never synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub path: InlinePath,
    pub offset: usize,
}

/// Block type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading,
}

/// Leaf node holding literal text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inline {
    text: String,
}

impl Inline {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Byte index of the given char offset, or None when out of range.
    fn byte_index(&self, char_offset: usize) -> Option<usize> {
        if char_offset > self.char_len() {
            return None;
        }
        Some(
            self.text
                .char_indices()
                .nth(char_offset)
                .map(|(b, _)| b)
                .unwrap_or(self.text.len()),
        )
    }

    /// Insert at a char offset; None when the offset is out of range.
    pub(crate) fn insert_at(&mut self, char_offset: usize, s: &str) -> Option<()> {
        let at = self.byte_index(char_offset)?;
        self.text.insert_str(at, s);
        Some(())
    }

    /// Remove `char_count` chars starting at `char_offset`, returning the
    /// removed text; None when the range is out of bounds.
    pub(crate) fn remove_range(&mut self, char_offset: usize, char_count: usize) -> Option<String> {
        if char_offset + char_count > self.char_len() {
            return None;
        }
        let start = self.byte_index(char_offset)?;
        let end = self.byte_index(char_offset + char_count)?;
        Some(self.text.drain(start..end).collect())
    }

    /// Split off the text after `char_offset` into a new run.
    pub(crate) fn split_at_char(&mut self, char_offset: usize) -> Option<Inline> {
        let at = self.byte_index(char_offset)?;
        Some(Inline {
            text: self.text.split_off(at),
        })
    }

    pub(crate) fn append_text(&mut self, s: &str) {
        self.text.push_str(s);
    }
}

/// Top-level structural unit: a typed sequence of inline runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawBlock")]
pub struct Block {
    kind: BlockKind,
    runs: Vec<Inline>,
}

/// Deserialization shape for Block; normalized on conversion so the
/// at-least-one-run invariant survives untrusted input.
#[derive(Deserialize)]
struct RawBlock {
    kind: BlockKind,
    runs: Vec<Inline>,
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        Block::new(raw.kind, raw.runs)
    }
}

impl Block {
    /// Create a block; an empty run list is normalized to one empty run.
    pub fn new(kind: BlockKind, mut runs: Vec<Inline>) -> Self {
        if runs.is_empty() {
            runs.push(Inline::default());
        }
        Self { kind, runs }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockKind::Paragraph, vec![Inline::new(text)])
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn runs(&self) -> &[Inline] {
        &self.runs
    }

    /// Concatenated plain text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(Inline::text).collect()
    }

    pub(crate) fn set_kind(&mut self, kind: BlockKind) {
        self.kind = kind;
    }
}

/// The shared document: a non-empty ordered sequence of blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDocument")]
pub struct Document {
    blocks: Vec<Block>,
}

#[derive(Deserialize)]
struct RawDocument {
    blocks: Vec<Block>,
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        Document::from_blocks(raw.blocks)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A fresh document: one paragraph with one empty run.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::new(BlockKind::Paragraph, Vec::new())],
        }
    }

    /// Build a document from blocks; an empty list is normalized to the
    /// default single empty paragraph.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::new();
        }
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// The first block. Total by the non-empty invariant.
    pub fn first_block(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn run(&self, path: InlinePath) -> Option<&Inline> {
        self.blocks.get(path.block)?.runs.get(path.run)
    }

    pub fn text_of(&self, path: InlinePath) -> Option<&str> {
        self.run(path).map(Inline::text)
    }

    /// Apply one operation. The only mutation path; fails loudly on paths
    /// that do not exist in the current structure.
    pub(crate) fn apply(&mut self, op: &Operation) -> Result<(), ApplyError> {
        op.apply_to(self)
    }

    pub(crate) fn run_mut(&mut self, path: InlinePath) -> Option<&mut Inline> {
        self.blocks.get_mut(path.block)?.runs.get_mut(path.run)
    }

    pub(crate) fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Split the block at `index` into two siblings at run index `position`.
    /// Either side left without runs is backfilled with one empty run.
    pub(crate) fn split_block(&mut self, index: usize, position: usize) -> Result<(), ApplyError> {
        let block = self
            .blocks
            .get_mut(index)
            .ok_or(ApplyError::InvalidPath(NodePath::Block(index)))?;
        if position > block.runs.len() {
            return Err(ApplyError::InvalidStructure(format!(
                "split position {} exceeds run count {} in block {}",
                position,
                block.runs.len(),
                index
            )));
        }
        let mut tail = block.runs.split_off(position);
        if block.runs.is_empty() {
            block.runs.push(Inline::default());
        }
        if tail.is_empty() {
            tail.push(Inline::default());
        }
        let kind = block.kind;
        self.blocks.insert(index + 1, Block { kind, runs: tail });
        Ok(())
    }

    /// Split the run at `path` into two siblings at char offset `position`.
    pub(crate) fn split_run(&mut self, path: InlinePath, position: usize) -> Result<(), ApplyError> {
        let run = self
            .run_mut(path)
            .ok_or(ApplyError::InvalidPath(NodePath::Inline(path)))?;
        let len = run.char_len();
        let tail = run
            .split_at_char(position)
            .ok_or(ApplyError::OffsetOutOfRange {
                path: NodePath::Inline(path),
                offset: position,
                len,
            })?;
        self.blocks[path.block].runs.insert(path.run + 1, tail);
        Ok(())
    }

    /// Merge the block at `index` into its previous sibling.
    pub(crate) fn merge_block(&mut self, index: usize) -> Result<(), ApplyError> {
        if index >= self.blocks.len() {
            return Err(ApplyError::InvalidPath(NodePath::Block(index)));
        }
        if index == 0 {
            return Err(ApplyError::InvalidStructure(
                "block 0 has no previous sibling to merge into".into(),
            ));
        }
        let removed = self.blocks.remove(index);
        self.blocks[index - 1].runs.extend(removed.runs);
        Ok(())
    }

    /// Merge the run at `path` into its previous sibling.
    pub(crate) fn merge_run(&mut self, path: InlinePath) -> Result<(), ApplyError> {
        let block = self
            .blocks
            .get_mut(path.block)
            .ok_or(ApplyError::InvalidPath(NodePath::Inline(path)))?;
        if path.run >= block.runs.len() {
            return Err(ApplyError::InvalidPath(NodePath::Inline(path)));
        }
        if path.run == 0 {
            return Err(ApplyError::InvalidStructure(format!(
                "run {} has no previous sibling to merge into",
                NodePath::Inline(path)
            )));
        }
        let removed = block.runs.remove(path.run);
        block.runs[path.run - 1].append_text(removed.text());
        Ok(())
    }

    /// Relocate a node. Both endpoints must address the same depth; the
    /// destination index is interpreted after removal and clamped.
    pub(crate) fn move_node(&mut self, from: NodePath, to: NodePath) -> Result<(), ApplyError> {
        match (from, to) {
            (NodePath::Block(i), NodePath::Block(j)) => {
                if i >= self.blocks.len() {
                    return Err(ApplyError::InvalidPath(from));
                }
                let block = self.blocks.remove(i);
                let at = j.min(self.blocks.len());
                self.blocks.insert(at, block);
                Ok(())
            }
            (NodePath::Inline(src), NodePath::Inline(dst)) => {
                let src_runs = self
                    .blocks
                    .get(src.block)
                    .ok_or(ApplyError::InvalidPath(from))?
                    .runs
                    .len();
                if src.run >= src_runs {
                    return Err(ApplyError::InvalidPath(from));
                }
                if src_runs == 1 {
                    return Err(ApplyError::InvalidStructure(format!(
                        "cannot move {}: it is its block's only run",
                        NodePath::Inline(src)
                    )));
                }
                if dst.block >= self.blocks.len() {
                    return Err(ApplyError::InvalidPath(to));
                }
                let run = self.blocks[src.block].runs.remove(src.run);
                let dest = &mut self.blocks[dst.block];
                let at = dst.run.min(dest.runs.len());
                dest.runs.insert(at, run);
                Ok(())
            }
            _ => Err(ApplyError::InvalidStructure(
                "move endpoints must address the same depth".into(),
            )),
        }
    }
}
