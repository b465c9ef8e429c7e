//! Block-aware clipboard helpers.
//!
//! Copy always yields the raw selected bytes; the one addition is a
//! synthesized marker when a whole-block selection starts at the implicit
//! first block, so pasting elsewhere reconstructs the same blocks with
//! the same tags. Paste policy (verbatim at boundaries, escaped
//! mid-block) is decided by the editor, which owns the seam-escape rule.

use crate::blocks::{BlockIndex, emit_marker};
use crate::editing::Document;

/// The clipboard payload for a selection, or `None` when it is empty.
///
/// When the selection aligns exactly with whole-block boundaries and the
/// first selected block is the implicit markerless one, its marker is
/// synthesized as a prefix; its language tag would otherwise be lost in
/// transfer.
pub(crate) fn copy_payload(
    index: &BlockIndex,
    doc: &Document,
    selection: std::ops::Range<usize>,
) -> Option<String> {
    if selection.is_empty() {
        return None;
    }
    let aligned_start = index
        .blocks()
        .iter()
        .find(|b| b.range.start == selection.start);
    let aligned_end = index.blocks().iter().any(|b| b.range.end == selection.end);

    let mut payload = String::new();
    if let Some(first) = aligned_start
        && aligned_end
        && !first.has_marker()
    {
        payload.push_str(&emit_marker(first.language, first.auto));
    }
    payload.push_str(&doc.slice_to_cow(selection));
    Some(payload)
}

/// True at any block's start or at the document end, the positions where
/// pasted markers are honored verbatim.
pub(crate) fn is_block_boundary(index: &BlockIndex, doc_len: usize, at: usize) -> bool {
    at == doc_len || index.block_at(at).range.start == at
}
