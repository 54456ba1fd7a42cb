//! # Coscribe Editor
//!
//! Core document editing engine for Coscribe: the shared-document model,
//! the operation log that captures every local mutation as a replayable
//! batch, and the derived views (math decoration, topic) recomputed from
//! raw text on every change.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: Block/Inline tree + invariants    │
//! └─────────────────────────────────────────────┘
//!                     ↑
//! ┌─────────────────────────────────────────────┐
//! │ editor: operation log                       │
//! │  - record_batch: local edits → Operations   │
//! │  - apply_remote: peer ops, same apply path  │
//! │  - load: snapshot install, never recorded   │
//! └─────────────────────────────────────────────┘
//!                     ↑
//! ┌─────────────────────────────────────────────┐
//! │ derived views (pure, recomputed per change) │
//! │  - decorate: $...$ → overlay ranges         │
//! │  - topic: first block text                  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The document is canonical**: overlay ranges and topics are derived
//!    views and are never stored or synchronized.
//! 2. **One mutation path**: local and remote edits both go through
//!    operation application, so the two cannot diverge.
//! 3. **Closed operation vocabulary**: six kinds, exhaustively matched;
//!    selection and whole-value replacement are structurally excluded from
//!    the wire.

mod decorate;
mod document;
mod editor;
mod history;
mod operations;
mod topic;

pub use decorate::{decorate, decorate_document, DecorationFlag, OverlayRange};
pub use document::{Block, BlockKind, Document, Inline, InlinePath, NodePath, Point};
pub use editor::{Editor, EditorChange, Selection};
pub use history::{History, OperationBatch};
pub use operations::{ApplyError, Operation};
pub use topic::extract_topic;
