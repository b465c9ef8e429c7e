//! The block index: the derived, ordered projection of the buffer into
//! blocks.
//!
//! Built once per document load by a full scan, then patched per
//! transaction by shifting untouched boundaries through the delta and
//! re-scanning only the region around the change. The index must never
//! drift from the literal delimiter bytes in the buffer; when a
//! pathological edit leaves the patched result unverifiable, it falls
//! back to a full rescan rather than propagating a broken structure.

use std::collections::VecDeque;

use xi_rope::delta::Transformer;
use xi_rope::{Delta, RopeInfo};

use crate::blocks::{Block, BlockId, marker};
use crate::editing::Document;

pub struct BlockIndex {
    blocks: Vec<Block>,
    next_id: u64,
}

impl BlockIndex {
    /// Scan the whole text once, O(length). Marker-shaped text that is
    /// not line-initial is plain content; a document not starting with a
    /// marker opens with an implicit block; empty text is one empty
    /// block. Never errors.
    pub fn rebuild_full(text: &str) -> Self {
        let mut index = Self {
            blocks: Vec::new(),
            next_id: 0,
        };
        index.blocks = index.scan(text);
        index
    }

    fn fresh_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    fn scan(&mut self, text: &str) -> Vec<Block> {
        let found = marker::scan_markers(text, 0);
        let mut blocks = Vec::with_capacity(found.len() + 1);
        let first_marker_start = found.first().map(|m| m.range.start).unwrap_or(text.len());
        if first_marker_start > 0 || found.is_empty() {
            blocks.push(Block {
                id: self.fresh_id(),
                range: 0..first_marker_start,
                content: 0..first_marker_start,
                language: None,
                auto: false,
            });
        }
        for (i, m) in found.iter().enumerate() {
            let end = found.get(i + 1).map(|n| n.range.start).unwrap_or(text.len());
            blocks.push(Block {
                id: self.fresh_id(),
                range: m.range.start..end,
                content: m.range.end..end,
                language: m.language,
                auto: m.auto,
            });
        }
        blocks
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// The block containing `offset`, by binary search over boundaries.
    /// Offsets at or past the document end resolve to the last block, so
    /// a caret at the end always has a current block.
    pub fn block_at(&self, offset: usize) -> &Block {
        let i = self.blocks.partition_point(|b| b.range.start <= offset);
        &self.blocks[i.saturating_sub(1)]
    }

    /// Rewrite one block's language metadata without touching the buffer.
    /// Only valid for the implicit markerless first block, whose tag has
    /// no physical marker to carry it; marker blocks are retagged through
    /// a buffer transaction instead.
    pub(crate) fn set_language(
        &mut self,
        id: BlockId,
        language: Option<crate::language::Language>,
        auto: bool,
    ) {
        if let Some(b) = self.blocks.iter_mut().find(|b| b.id == id) {
            b.language = language;
            b.auto = auto;
        }
    }

    /// Map one committed transaction onto the index.
    ///
    /// Boundaries outside the change keep their identity and shift by the
    /// net length delta; only the blocks overlapping the changed ranges
    /// (widened by a line of slack on the left and one whole block on the
    /// right, so no marker can straddle the window unseen) are re-scanned
    /// and spliced back in. A block comes out "new" (fresh id, language
    /// taken from its marker, auto-pending when untagged) only when its
    /// marker was inserted or altered.
    pub(crate) fn apply_change(
        &mut self,
        delta: &Delta<RopeInfo>,
        changed: &[std::ops::Range<usize>],
        doc: &Document,
    ) {
        if changed.is_empty() {
            return;
        }
        let new_len = doc.len();

        // Shift every boundary into new-document coordinates. Prefix and
        // suffix blocks come out exact; the affected middle is re-scanned
        // below, so distortion there is fine.
        let mut transformer = Transformer::new(delta);
        let mut shifted = self.blocks.clone();
        for b in &mut shifted {
            let start = transformer.transform(b.range.start, false);
            let content_start = transformer.transform(b.content.start, false);
            let end = transformer.transform(b.range.end, false).max(start);
            b.range = start..end;
            b.content = content_start.clamp(start, end)..end;
        }

        let win_start = changed.iter().map(|r| r.start).min().unwrap_or(0);
        let win_end = changed.iter().map(|r| r.end).max().unwrap_or(0);

        // Affected blocks, boundary-touching included. One extra block on
        // the right: an edit can re-align marker matching across the next
        // boundary (a freed newline turns a marker-shaped content line
        // into a real marker).
        let first = shifted
            .iter()
            .position(|b| b.range.end >= win_start)
            .unwrap_or(0);
        let mut last = match shifted.iter().rposition(|b| b.range.start <= win_end) {
            Some(p) => p.max(first),
            None => first,
        };
        last = (last + 1).min(shifted.len() - 1);

        let scan_start = if first == 0 {
            0
        } else {
            shifted[first].range.start
        };
        let scan_end = if last == shifted.len() - 1 {
            new_len
        } else {
            shifted[last].range.end
        };

        // One line of slack to the left: an edit at the window's start
        // boundary can complete a marker out of the previous block's
        // trailing line. The window must not start before the previous
        // block's content: matching has to resume exactly where the full
        // scan resumes after that block's marker, or the marker's
        // terminator newline gets re-matched as a marker lead and the
        // bytes it swallows hide the real marker that follows.
        let slack_start = if first == 0 {
            0
        } else {
            doc.line_start(scan_start.saturating_sub(1))
                .saturating_sub(1)
                .max(shifted[first - 1].content.start)
        };

        let window = doc.slice_to_cow(slack_start..scan_end);
        let found = marker::scan_markers(&window, slack_start);

        // If the window's trailing line plus the suffix's leading newline
        // would form a marker, matching re-aligns past the window in ways
        // a local splice cannot represent. Rare; rebuild instead.
        if scan_end < new_len
            && let Some(nl) = window.rfind('\n')
        {
            let mut candidate = window[nl..].to_string();
            candidate.push('\n');
            if marker::parse_marker(&candidate).is_some() {
                log::warn!("marker straddles rescan window; falling back to full rebuild");
                let text = doc.text();
                self.blocks = self.scan(&text);
                return;
            }
        }

        // Marker-ness must be judged on the pre-edit block: a deleted
        // marker collapses to an empty range under the transform and
        // would masquerade as the implicit first block.
        let first_was_markerless = !self.blocks[first].has_marker();

        let mut result: Vec<Block> = shifted[..first].to_vec();
        let mut queue: VecDeque<Block> = shifted[first..=last].iter().cloned().collect();

        let first_marker_start = found.first().map(|m| m.range.start).unwrap_or(scan_end);
        if first > 0 {
            // Everything before the first marker belongs to the previous
            // block now (a deleted marker merges content leftward; a
            // boundary shifted left shrinks the prefix).
            let prev = result.last_mut().expect("prefix is non-empty when first > 0");
            prev.range.end = first_marker_start;
            prev.content.end = first_marker_start;
        } else if first_marker_start > 0 || found.is_empty() {
            // The implicit first block. It keeps its identity as long as
            // it was markerless before the edit too.
            let block = match queue.front() {
                Some(_) if first_was_markerless => {
                    let old = queue.pop_front().expect("front exists");
                    Block {
                        id: old.id,
                        range: 0..first_marker_start,
                        content: 0..first_marker_start,
                        language: old.language,
                        auto: old.auto,
                    }
                }
                _ => Block {
                    id: self.fresh_id(),
                    range: 0..first_marker_start,
                    content: 0..first_marker_start,
                    language: None,
                    auto: false,
                },
            };
            result.push(block);
        }

        for (i, m) in found.iter().enumerate() {
            let end = found.get(i + 1).map(|n| n.range.start).unwrap_or(scan_end);
            let id = match take_identity(&mut queue, m) {
                Some(old) => old.id,
                None => self.fresh_id(),
            };
            result.push(Block {
                id,
                range: m.range.start..end,
                content: m.range.end..end,
                language: m.language,
                auto: m.auto,
            });
        }

        result.extend_from_slice(&shifted[last + 1..]);

        if coverage_ok(&result, new_len) {
            self.blocks = result;
        } else {
            log::warn!("incremental block splice failed coverage check; rebuilding index");
            let text = doc.text();
            self.blocks = self.scan(&text);
        }
    }
}

/// Rebind a re-scanned marker to an old block so identity survives edits
/// that did not insert or alter the marker. Exact position-and-tag
/// matches win; then same tag anywhere in the affected set (offsets move
/// under reorder); then a marker altered in place keeps its id with the
/// new tag.
fn take_identity(queue: &mut VecDeque<Block>, m: &marker::MarkerMatch) -> Option<Block> {
    let pos = queue
        .iter()
        .position(|b| {
            b.range.start == m.range.start && b.language == m.language && b.auto == m.auto
        })
        .or_else(|| {
            queue
                .iter()
                .position(|b| b.language == m.language && b.auto == m.auto)
        })
        .or_else(|| {
            queue
                .iter()
                .position(|b| b.has_marker() && b.range.start == m.range.start)
        })?;
    queue.remove(pos)
}

fn coverage_ok(blocks: &[Block], doc_len: usize) -> bool {
    if blocks.is_empty() {
        return false;
    }
    let mut pos = 0;
    for b in blocks {
        if b.range.start != pos
            || b.content.start < b.range.start
            || b.content.start > b.range.end
            || b.content.end != b.range.end
        {
            return false;
        }
        pos = b.range.end;
    }
    pos == doc_len
}
