//! # Math Decorator
//!
//! Derives inline-math overlay ranges from raw run text. Decoration is
//! presentation-only: the `$...$` source text remains the canonical stored
//! content, and the ranges produced here are never persisted or
//! synchronized. Given identical text the output is identical — the scan is
//! stateless, deterministic, and order-stable.

use regex::Regex;
use std::sync::OnceLock;

use crate::document::{Document, Inline, InlinePath, Point};

/// Which derived rendering a range requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationFlag {
    /// Render the enclosed LaTeX-like expression; the range covers the
    /// whole `$...$` span including both delimiters.
    Math,
}

/// Ephemeral, recomputed-per-render span over one run's text. Offsets are
/// in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRange {
    pub flag: DecorationFlag,
    pub start: Point,
    pub end: Point,
}

impl OverlayRange {
    /// The expression a renderer should typeset: the span's text with the
    /// delimiters stripped. None when the document no longer matches the
    /// range (overlays are throwaway; recompute instead of reusing).
    pub fn expression(&self, document: &Document) -> Option<String> {
        let text = document.text_of(self.start.path)?;
        if self.end.offset > text.chars().count() || self.start.offset + 2 > self.end.offset {
            return None;
        }
        Some(
            text.chars()
                .skip(self.start.offset + 1)
                .take(self.end.offset - self.start.offset - 2)
                .collect(),
        )
    }
}

fn math_span() -> &'static Regex {
    static MATH_SPAN: OnceLock<Regex> = OnceLock::new();
    // Non-greedy pair of `$` delimiters; an unterminated `$` simply never
    // matches, so malformed input yields fewer ranges, never an error.
    MATH_SPAN.get_or_init(|| Regex::new(r"\$(.*?)\$").expect("math span pattern is valid"))
}

/// Scan one run for `$`-delimited math segments. Matches are non-overlapping
/// and emitted left to right.
pub fn decorate(run: &Inline, path: InlinePath) -> Vec<OverlayRange> {
    let text = run.text();
    math_span()
        .find_iter(text)
        .map(|m| {
            let start = text[..m.start()].chars().count();
            let len = m.as_str().chars().count();
            OverlayRange {
                flag: DecorationFlag::Math,
                start: Point {
                    path,
                    offset: start,
                },
                end: Point {
                    path,
                    offset: start + len,
                },
            }
        })
        .collect()
}

/// Decorate every run of the document, in document order.
pub fn decorate_document(document: &Document) -> Vec<OverlayRange> {
    let mut ranges = Vec::new();
    for (block_index, block) in document.blocks().iter().enumerate() {
        for (run_index, run) in block.runs().iter().enumerate() {
            ranges.extend(decorate(run, InlinePath::new(block_index, run_index)));
        }
    }
    ranges
}
