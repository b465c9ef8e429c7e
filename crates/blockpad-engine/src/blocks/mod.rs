/*!
 * The block-structured document model.
 *
 * - **`marker`**: the delimiter protocol, the literal token separating
 *   blocks and carrying each block's language tag.
 * - **`index`**: the derived, ordered projection of the buffer into
 *   blocks, maintained incrementally across transactions.
 * - **`ops`**: block-level mutations (insert, retag, merge, split,
 *   reorder, delete), each compiled to a single transaction.
 */

pub mod index;
pub mod marker;
pub mod ops;

pub use index::BlockIndex;
pub use marker::{MarkerMatch, ParsedMarker, emit_marker, escape_markers, parse_marker, scan_markers};
pub use ops::EditError;

use crate::language::{Language, LanguageState};

/// Stable identifier for a block. Survives edits that do not insert or
/// alter the block's marker; fold state and detection generations key
/// off it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct BlockId(pub u64);

/// A contiguous, language-tagged span of the document.
///
/// `range` covers the block's own marker plus content; `content` is the
/// part the user edits. For the implicit first block the marker is empty
/// and the two ranges coincide. `content.end` always equals `range.end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub range: std::ops::Range<usize>,
    pub content: std::ops::Range<usize>,
    /// `None` means unset: readers resolve it to the configured default.
    pub language: Option<Language>,
    /// True when the tag was written by detection rather than the user.
    pub auto: bool,
}

impl Block {
    pub fn marker_range(&self) -> std::ops::Range<usize> {
        self.range.start..self.content.start
    }

    /// False only for the implicit first block.
    pub fn has_marker(&self) -> bool {
        self.content.start > self.range.start
    }

    pub fn content_is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn state(&self) -> LanguageState {
        LanguageState::of(self.language, self.auto)
    }
}
