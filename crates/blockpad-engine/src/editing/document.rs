use xi_rope::delta::Transformer;
use xi_rope::{Delta, Rope, RopeInfo};

use crate::editing::{Cmd, Origin, Patch, commands};

/// The flat text buffer plus cursor state.
///
/// The buffer is the single source of truth; everything structural (the
/// block index) is derived from it. All mutations flow through
/// [`Document::apply`] as one delta per transaction, and saving writes the
/// rope bytes verbatim, so round-trips are exact.
pub struct Document {
    /// xi-rope buffer containing the entire document as UTF-8 text.
    pub(crate) buffer: Rope,
    /// Current selection/cursor position as byte offsets in the buffer.
    pub(crate) selection: std::ops::Range<usize>,
    /// Version counter incremented on each transaction.
    pub(crate) version: u64,
}

/// A committed transaction: the public patch plus the delta the block
/// index needs to shift its boundaries through.
pub struct Transaction {
    pub patch: Patch,
    pub(crate) delta: Delta<RopeInfo>,
}

impl Document {
    /// Create a new document from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        Ok(Self::from_text(text))
    }

    pub fn from_text(text: &str) -> Self {
        let buffer = Rope::from(text);
        let len = buffer.len();
        Self {
            buffer,
            selection: len..len,
            version: 0,
        }
    }

    /// Compile and commit one command as a single transaction.
    pub(crate) fn apply(&mut self, cmd: &Cmd, origin: Origin) -> Transaction {
        let delta = commands::compile_command(self.buffer.len(), cmd);
        let changed = commands::changed_ranges(&delta);

        self.buffer = delta.apply(&self.buffer);

        // Carry the cursor through the edit. `after = true` keeps typing
        // natural: an insertion at the caret leaves the caret behind it.
        let mut transformer = Transformer::new(&delta);
        let new_selection = transformer.transform(self.selection.start, true)
            ..transformer.transform(self.selection.end, true);
        self.selection = new_selection.clone();

        self.version += 1;

        Transaction {
            patch: Patch {
                origin,
                changed,
                new_selection,
                version: self.version,
            },
            delta,
        }
    }

    pub fn text(&self) -> String {
        self.buffer.to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.to_string().into_bytes()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn selection(&self) -> std::ops::Range<usize> {
        self.selection.clone()
    }

    pub fn set_selection(&mut self, selection: std::ops::Range<usize>) {
        let len = self.buffer.len();
        let start = selection.start.min(len);
        let end = selection.end.min(len).max(start);
        self.selection = start..end;
    }

    /// Slice the buffer to a cow string, clamping out-of-bounds ranges
    /// instead of panicking.
    pub fn slice_to_cow(&self, range: std::ops::Range<usize>) -> std::borrow::Cow<'_, str> {
        let doc_len = self.buffer.len();
        let start = range.start.min(doc_len);
        let end = range.end.min(doc_len).max(start);
        self.buffer.slice_to_cow(start..end)
    }

    /// Offset of the first byte of the line containing `offset`.
    pub(crate) fn line_start(&self, offset: usize) -> usize {
        let prefix = self.slice_to_cow(0..offset);
        match prefix.rfind('\n') {
            Some(pos) => pos + 1,
            None => 0,
        }
    }

    /// Offset one past the newline ending the line containing `offset`,
    /// or the document length for the last line.
    pub(crate) fn line_end(&self, offset: usize) -> usize {
        let suffix = self.slice_to_cow(offset..self.buffer.len());
        match suffix.find('\n') {
            Some(pos) => offset + pos + 1,
            None => self.buffer.len(),
        }
    }

    /// Largest char boundary at or before `offset`, for caret movement.
    pub fn prev_char_boundary(&self, offset: usize) -> usize {
        if offset == 0 {
            return 0;
        }
        let text = self.slice_to_cow(0..offset.min(self.buffer.len()));
        text.char_indices().next_back().map(|(i, _)| i).unwrap_or(0)
    }
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            selection: self.selection.clone(),
            version: self.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_valid_utf8() {
        let text = "hello\nworld";
        let doc = Document::from_bytes(text.as_bytes()).unwrap();
        assert_eq!(doc.text(), text);
        assert_eq!(doc.version(), 0);
        assert_eq!(doc.selection(), text.len()..text.len());
    }

    #[test]
    fn test_from_bytes_invalid_utf8() {
        assert!(Document::from_bytes(&[0xFF, 0xFE, 0xFD]).is_err());
    }

    #[test]
    fn test_round_trip_preserves_bytes() {
        let original = "mixed\r\nendings\nand unicode 世界 🦀\n";
        let doc = Document::from_bytes(original.as_bytes()).unwrap();
        assert_eq!(doc.to_bytes(), original.as_bytes());
    }

    #[test]
    fn test_apply_increments_version_and_moves_caret() {
        let mut doc = Document::from_bytes(b"Hello").unwrap();
        doc.set_selection(5..5);
        let tx = doc.apply(
            &Cmd::Insert {
                at: 5,
                text: " World".to_string(),
            },
            Origin::UserInput,
        );
        assert_eq!(doc.text(), "Hello World");
        assert_eq!(tx.patch.version, 1);
        assert_eq!(tx.patch.changed, vec![5..11]);
        assert_eq!(doc.selection(), 11..11);
    }

    #[test]
    fn test_selection_collapses_into_deleted_range() {
        let mut doc = Document::from_bytes(b"Hello World").unwrap();
        doc.set_selection(8..10);
        doc.apply(&Cmd::Delete { range: 6..11 }, Origin::UserInput);
        assert_eq!(doc.selection(), 6..6);
    }

    #[test]
    fn test_selection_shifts_past_earlier_insert() {
        let mut doc = Document::from_bytes(b"Hello World").unwrap();
        doc.set_selection(8..10);
        doc.apply(
            &Cmd::Insert {
                at: 0,
                text: ">> ".to_string(),
            },
            Origin::UserInput,
        );
        assert_eq!(doc.selection(), 11..13);
    }

    #[test]
    fn test_line_helpers() {
        let doc = Document::from_bytes(b"one\ntwo\nthree").unwrap();
        assert_eq!(doc.line_start(0), 0);
        assert_eq!(doc.line_start(5), 4);
        assert_eq!(doc.line_start(4), 4);
        assert_eq!(doc.line_end(0), 4);
        assert_eq!(doc.line_end(9), 13);
    }

    #[test]
    fn test_prev_char_boundary_multibyte() {
        let doc = Document::from_bytes("a€b".as_bytes()).unwrap();
        assert_eq!(doc.prev_char_boundary(4), 1); // start of the euro sign
        assert_eq!(doc.prev_char_boundary(1), 0);
        assert_eq!(doc.prev_char_boundary(0), 0);
    }

    #[test]
    fn test_slice_to_cow_clamps() {
        let doc = Document::from_bytes(b"short").unwrap();
        assert_eq!(doc.slice_to_cow(0..100), "short");
        assert_eq!(doc.slice_to_cow(100..200), "");
    }
}
