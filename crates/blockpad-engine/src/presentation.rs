//! Block-relative gutter data: per-block line numbering and fold ranges.
//! Pure functions of the document and index; fold *state* lives on the
//! editor.

use crate::blocks::{BlockId, BlockIndex};
use crate::editing::Document;

/// One visual line for the gutter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GutterLine {
    pub block: BlockId,
    /// 1-based line number within the owning block's content; `None` for
    /// delimiter lines (the marker's blank line and its tag line).
    pub number: Option<usize>,
    /// Byte span of the line, newline included.
    pub range: std::ops::Range<usize>,
}

/// Line numbering restarts at 1 inside each block, which is the whole
/// point: markers are structure, not content, so they get no number.
pub fn line_numbers(index: &BlockIndex, doc: &Document) -> Vec<GutterLine> {
    let text = doc.text();
    let mut lines = Vec::new();
    let mut pos = 0;
    let mut current_block = None;
    let mut number = 0;

    let mut push = |start: usize, end: usize| {
        let block = index.block_at(start);
        if current_block != Some(block.id) {
            current_block = Some(block.id);
            number = 0;
        }
        let numbered = start >= block.content.start;
        if numbered {
            number += 1;
        }
        lines.push(GutterLine {
            block: block.id,
            number: numbered.then_some(number),
            range: start..end,
        });
    };

    for line in text.split_inclusive('\n') {
        push(pos, pos + line.len());
        pos += line.len();
    }
    // The caret can sit on a final empty line after a trailing newline,
    // and the empty document still shows one line.
    if text.is_empty() || text.ends_with('\n') {
        push(pos, pos);
    }
    lines
}

/// The foldable span of a block: its content beyond the first line.
/// `None` when there is nothing to hide.
pub fn fold_range(
    index: &BlockIndex,
    doc: &Document,
    id: BlockId,
) -> Option<std::ops::Range<usize>> {
    let pos = index.position(id)?;
    let block = &index.blocks()[pos];
    if block.content_is_empty() {
        return None;
    }
    let first_line_end = doc.line_end(block.content.start);
    if first_line_end >= block.content.end {
        return None;
    }
    Some(first_line_end..block.content.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture(text: &str) -> (Document, BlockIndex) {
        let doc = Document::from_bytes(text.as_bytes()).unwrap();
        let index = BlockIndex::rebuild_full(text);
        (doc, index)
    }

    fn numbers(lines: &[GutterLine]) -> Vec<Option<usize>> {
        lines.iter().map(|l| l.number).collect()
    }

    #[test]
    fn test_numbering_restarts_per_block() {
        let (doc, index) = fixture("\n# lang:text\none\ntwo\n\n# lang:python\nprint(1)\n");
        let lines = line_numbers(&index, &doc);
        // Marker blank line + tag line, content, marker again, content,
        // then the trailing caret line.
        assert_eq!(
            numbers(&lines),
            vec![
                None,
                None,
                Some(1),
                Some(2),
                None,
                None,
                Some(1),
                Some(2)
            ]
        );
    }

    #[test]
    fn test_implicit_first_block_is_numbered_from_line_one() {
        let (doc, index) = fixture("alpha\nbeta\n\n# lang:json\n{}\n");
        let lines = line_numbers(&index, &doc);
        assert_eq!(lines[0].number, Some(1));
        assert_eq!(lines[1].number, Some(2));
        assert_eq!(lines[0].block, index.blocks()[0].id);
        // The blank separator line is the next marker's leading newline.
        assert_eq!(lines[2].number, None);
        assert_eq!(lines[2].block, index.blocks()[1].id);
    }

    #[test]
    fn test_empty_document_has_one_line() {
        let (doc, index) = fixture("");
        let lines = line_numbers(&index, &doc);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].number, Some(1));
        assert_eq!(lines[0].range, 0..0);
    }

    #[test]
    fn test_fold_range_hides_everything_past_first_line() {
        let (doc, index) = fixture("\n# lang:python\nprint(1)\nprint(2)\nprint(3)\n");
        let block = &index.blocks()[0];
        let range = fold_range(&index, &doc, block.id).unwrap();
        assert_eq!(doc.slice_to_cow(range), "print(2)\nprint(3)\n");
    }

    #[test]
    fn test_single_line_block_has_no_fold() {
        let (doc, index) = fixture("\n# lang:text\nonly line\n");
        assert_eq!(fold_range(&index, &doc, index.blocks()[0].id), None);
    }

    #[test]
    fn test_fold_of_unknown_block() {
        let (doc, index) = fixture("hello\n");
        assert_eq!(fold_range(&index, &doc, crate::blocks::BlockId(42)), None);
    }
}
