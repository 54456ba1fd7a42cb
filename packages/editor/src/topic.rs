//! Topic extraction: the document's first line drives the article feed.

use crate::document::Document;

/// Plain-text content of the document's first block. Total: the non-empty
/// document invariant guarantees block 0 exists.
pub fn extract_topic(document: &Document) -> String {
    document.first_block().text()
}
