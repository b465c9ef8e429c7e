//! Block-level mutations, each planned as one command so it commits as a
//! single transaction. Planners validate against the current index but do
//! not mutate anything themselves; the editor applies the returned command
//! and lets the index catch up through the normal change path.

use crate::blocks::{Block, BlockId, BlockIndex, emit_marker};
use crate::editing::{Cmd, Edit, Document};
use crate::language::Language;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("editor is read-only")]
    ReadOnly,
    #[error("no such block: {0:?}")]
    UnknownBlock(BlockId),
    #[error("blocks are not adjacent")]
    BlocksNotAdjacent,
    #[error("offset {0} is not inside editable content")]
    InvalidOffset(usize),
    #[error("target index {0} is out of range")]
    InvalidTarget(usize),
}

fn lookup<'a>(index: &'a BlockIndex, id: BlockId) -> Result<&'a Block, EditError> {
    index
        .position(id)
        .map(|pos| &index.blocks()[pos])
        .ok_or(EditError::UnknownBlock(id))
}

/// Insert an empty block directly after `anchor`. Returns the command and
/// the caret offset of the new block's content.
pub(crate) fn insert_block_after(
    index: &BlockIndex,
    anchor: BlockId,
    language: Option<Language>,
    auto: bool,
) -> Result<(Cmd, usize), EditError> {
    let block = lookup(index, anchor)?;
    let marker = emit_marker(language, auto);
    let at = block.range.end;
    let caret = at + marker.len();
    Ok((Cmd::Insert { at, text: marker }, caret))
}

/// Insert an empty block directly before `anchor`.
///
/// When the anchor is the implicit first block it has no marker of its
/// own, so one is synthesized for it in the same transaction; otherwise
/// its content would silently join the new block.
pub(crate) fn insert_block_before(
    index: &BlockIndex,
    anchor: BlockId,
    language: Option<Language>,
    auto: bool,
) -> Result<(Cmd, usize), EditError> {
    let block = lookup(index, anchor)?;
    let marker = emit_marker(language, auto);
    let caret = block.range.start + marker.len();
    if block.has_marker() {
        let at = block.range.start;
        Ok((Cmd::Insert { at, text: marker }, caret))
    } else {
        let mut text = marker;
        text.push_str(&emit_marker(block.language, block.auto));
        Ok((Cmd::Insert { at: 0, text }, caret))
    }
}

/// Append an empty block at the end of the document.
pub(crate) fn insert_block_at_end(
    doc_len: usize,
    language: Option<Language>,
    auto: bool,
) -> (Cmd, usize) {
    let marker = emit_marker(language, auto);
    let caret = doc_len + marker.len();
    (
        Cmd::Insert {
            at: doc_len,
            text: marker,
        },
        caret,
    )
}

/// Delete a block, marker included. Deleting the last remaining block
/// leaves the empty document, which is itself one empty untagged block.
pub(crate) fn delete_block(index: &BlockIndex, id: BlockId) -> Result<Cmd, EditError> {
    let block = lookup(index, id)?;
    Ok(Cmd::Delete {
        range: block.range.clone(),
    })
}

/// Retag a block by rewriting its marker in place. The implicit first
/// block gains a real marker at offset zero.
pub(crate) fn change_language(
    index: &BlockIndex,
    id: BlockId,
    language: Option<Language>,
    auto: bool,
) -> Result<Cmd, EditError> {
    let block = lookup(index, id)?;
    let marker = emit_marker(language, auto);
    if block.has_marker() {
        Ok(Cmd::Replace {
            range: block.marker_range(),
            text: marker,
        })
    } else {
        Ok(Cmd::Insert {
            at: block.range.start,
            text: marker,
        })
    }
}

/// Merge block `b` into the block before it by deleting `b`'s marker.
/// Both contents are kept; the joined block keeps `a`'s tag.
pub(crate) fn merge_adjacent(
    index: &BlockIndex,
    a: BlockId,
    b: BlockId,
) -> Result<Cmd, EditError> {
    let pos_a = index.position(a).ok_or(EditError::UnknownBlock(a))?;
    let pos_b = index.position(b).ok_or(EditError::UnknownBlock(b))?;
    if pos_b != pos_a + 1 {
        return Err(EditError::BlocksNotAdjacent);
    }
    let marker = index.blocks()[pos_b].marker_range();
    Ok(Cmd::Delete { range: marker })
}

/// Split the block containing `offset` in two by inserting a marker
/// there. The tail inherits the language as an auto tag, leaving it open
/// to re-detection.
pub(crate) fn split_at(index: &BlockIndex, offset: usize) -> Result<Cmd, EditError> {
    let block = index.block_at(offset);
    if offset < block.content.start || offset > block.content.end {
        return Err(EditError::InvalidOffset(offset));
    }
    let marker = emit_marker(block.language, true);
    Ok(Cmd::Insert {
        at: offset,
        text: marker,
    })
}

/// Move a block so it ends up at `target` in the resulting order. The
/// block travels with its marker; blocks that lose or gain the implicit
/// first position get markers synthesized so every tag survives the move.
pub(crate) fn reorder(
    index: &BlockIndex,
    doc: &Document,
    id: BlockId,
    target: usize,
) -> Result<Cmd, EditError> {
    let pos = index.position(id).ok_or(EditError::UnknownBlock(id))?;
    if target >= index.len() {
        return Err(EditError::InvalidTarget(target));
    }
    if target == pos {
        return Ok(Cmd::Edits { edits: Vec::new() });
    }

    let blocks = index.blocks();
    let moving = &blocks[pos];

    let mut text = String::new();
    if !moving.has_marker() {
        text.push_str(&emit_marker(moving.language, moving.auto));
    }
    text.push_str(&doc.slice_to_cow(moving.range.clone()));

    let rest: Vec<&Block> = blocks
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != pos)
        .map(|(_, b)| b)
        .collect();
    let insert_at = if target == rest.len() {
        doc.len()
    } else {
        rest[target].range.start
    };
    // Landing in front of the implicit first block: it needs a marker so
    // its content does not join the moved block.
    if insert_at == 0 && !rest.is_empty() && !rest[0].has_marker() {
        text.push_str(&emit_marker(rest[0].language, rest[0].auto));
    }

    Ok(Cmd::Edits {
        edits: vec![
            Edit {
                range: moving.range.clone(),
                text: String::new(),
            },
            Edit {
                range: insert_at..insert_at,
                text,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::Origin;
    use pretty_assertions::assert_eq;

    fn fixture(text: &str) -> (Document, BlockIndex) {
        let doc = Document::from_bytes(text.as_bytes()).unwrap();
        let index = BlockIndex::rebuild_full(text);
        (doc, index)
    }

    fn commit(doc: &mut Document, index: &mut BlockIndex, cmd: Cmd) {
        let tx = doc.apply(&cmd, Origin::Block);
        index.apply_change(&tx.delta, &tx.patch.changed, doc);
    }

    #[test]
    fn test_insert_block_after() {
        let (mut doc, mut index) = fixture("\n# lang:text\nhello\n");
        let anchor = index.blocks()[0].id;
        let (cmd, caret) =
            insert_block_after(&index, anchor, Some(Language::Json), false).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:text\nhello\n\n# lang:json\n");
        assert_eq!(index.len(), 2);
        assert_eq!(index.blocks()[1].language, Some(Language::Json));
        assert!(index.blocks()[1].content_is_empty());
        assert_eq!(caret, doc.len());
    }

    #[test]
    fn test_insert_block_before_implicit_first_synthesizes_both_markers() {
        let (mut doc, mut index) = fixture("plain notes\n");
        let anchor = index.blocks()[0].id;
        let (cmd, caret) =
            insert_block_before(&index, anchor, Some(Language::Rust), false).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:rust\n\n# lang:\nplain notes\n");
        assert_eq!(index.len(), 2);
        assert_eq!(index.blocks()[0].language, Some(Language::Rust));
        assert!(index.blocks()[0].content_is_empty());
        // The old first block keeps its content and its unset tag.
        assert_eq!(index.blocks()[1].language, None);
        assert_eq!(doc.slice_to_cow(index.blocks()[1].content.clone()), "plain notes\n");
        assert_eq!(caret, 13);
    }

    #[test]
    fn test_insert_block_at_end() {
        let (mut doc, mut index) = fixture("\n# lang:text\nhello");
        let (cmd, caret) = insert_block_at_end(doc.len(), Some(Language::Python), true);
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:text\nhello\n# lang:python-a\n");
        assert_eq!(index.len(), 2);
        assert!(index.blocks()[1].auto);
        assert_eq!(caret, doc.len());
    }

    #[test]
    fn test_delete_middle_block() {
        let (mut doc, mut index) = fixture("\n# lang:text\na\n# lang:json\n{}\n# lang:rust\nb\n");
        assert_eq!(index.len(), 3);
        let id = index.blocks()[1].id;
        let survivors = [index.blocks()[0].id, index.blocks()[2].id];
        let cmd = delete_block(&index, id).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:text\na\n# lang:rust\nb\n");
        assert_eq!(index.len(), 2);
        assert_eq!([index.blocks()[0].id, index.blocks()[1].id], survivors);
    }

    #[test]
    fn test_delete_only_block_leaves_empty_document() {
        let (mut doc, mut index) = fixture("\n# lang:text\nhello\n");
        let id = index.blocks()[0].id;
        let cmd = delete_block(&index, id).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "");
        assert_eq!(index.len(), 1);
        assert_eq!(index.blocks()[0].language, None);
        assert!(index.blocks()[0].content_is_empty());
    }

    #[test]
    fn test_delete_unknown_block() {
        let (_, index) = fixture("hello");
        assert_eq!(
            delete_block(&index, BlockId(999)),
            Err(EditError::UnknownBlock(BlockId(999)))
        );
    }

    #[test]
    fn test_change_language_rewrites_marker_in_place() {
        let (mut doc, mut index) = fixture("\n# lang:text\nselect 1;\n");
        let id = index.blocks()[0].id;
        let cmd = change_language(&index, id, Some(Language::Sql), false).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:sql\nselect 1;\n");
        assert_eq!(index.len(), 1);
        assert_eq!(index.blocks()[0].id, id);
        assert_eq!(index.blocks()[0].language, Some(Language::Sql));
        assert!(!index.blocks()[0].auto);
    }

    #[test]
    fn test_change_language_materializes_marker_for_implicit_block() {
        let (mut doc, mut index) = fixture("print(1)\n");
        let id = index.blocks()[0].id;
        let cmd = change_language(&index, id, Some(Language::Python), false).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:python\nprint(1)\n");
        assert_eq!(index.len(), 1);
        assert_eq!(index.blocks()[0].language, Some(Language::Python));
    }

    #[test]
    fn test_merge_adjacent_keeps_both_contents() {
        let (mut doc, mut index) = fixture("\n# lang:text\nhello\n# lang:python-a\nprint(1)\n");
        let a = index.blocks()[0].id;
        let b = index.blocks()[1].id;
        let cmd = merge_adjacent(&index, a, b).unwrap();
        commit(&mut doc, &mut index, cmd);

        // Exactly the marker bytes disappear, leading newline included,
        // so the two contents join directly.
        assert_eq!(doc.text(), "\n# lang:text\nhelloprint(1)\n");
        assert_eq!(index.len(), 1);
        assert_eq!(index.blocks()[0].id, a);
        assert_eq!(index.blocks()[0].language, Some(Language::Text));
    }

    #[test]
    fn test_merge_rejects_non_adjacent() {
        let (_, index) = fixture("\n# lang:text\na\n# lang:json\n{}\n# lang:rust\nb\n");
        let a = index.blocks()[0].id;
        let c = index.blocks()[2].id;
        assert_eq!(merge_adjacent(&index, a, c), Err(EditError::BlocksNotAdjacent));
        // Order matters: merging upward only.
        assert_eq!(
            merge_adjacent(&index, index.blocks()[1].id, a),
            Err(EditError::BlocksNotAdjacent)
        );
    }

    #[test]
    fn test_split_inherits_language_as_auto() {
        let (mut doc, mut index) = fixture("\n# lang:python\nprint(1)\nprint(2)\n");
        let cmd = split_at(&index, 24).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(
            doc.text(),
            "\n# lang:python\nprint(1)\n\n# lang:python-a\nprint(2)\n"
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.blocks()[1].language, Some(Language::Python));
        assert!(index.blocks()[1].auto);
        assert!(!index.blocks()[0].auto);
    }

    #[test]
    fn test_split_inside_marker_is_rejected() {
        let (_, index) = fixture("\n# lang:python\nprint(1)\n");
        assert_eq!(split_at(&index, 5), Err(EditError::InvalidOffset(5)));
    }

    #[test]
    fn test_reorder_moves_block_with_marker() {
        let (mut doc, mut index) = fixture("\n# lang:text\na\n# lang:json\n{}\n# lang:rust\nb\n");
        let id = index.blocks()[2].id;
        let cmd = reorder(&index, &doc, id, 0).unwrap();
        commit(&mut doc, &mut index, cmd);

        // The moved block takes its leading newline with it, so the
        // former last block no longer ends in one.
        assert_eq!(doc.text(), "\n# lang:rust\nb\n\n# lang:text\na\n# lang:json\n{}");
        assert_eq!(index.len(), 3);
        assert_eq!(index.blocks()[0].language, Some(Language::Rust));
        assert_eq!(index.blocks()[1].language, Some(Language::Text));
        assert_eq!(index.blocks()[2].language, Some(Language::Json));
    }

    #[test]
    fn test_reorder_implicit_first_block_gains_marker() {
        let (mut doc, mut index) = fixture("notes\n\n# lang:json\n{}\n");
        let id = index.blocks()[0].id;
        let cmd = reorder(&index, &doc, id, 1).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:json\n{}\n\n# lang:\nnotes\n");
        assert_eq!(index.len(), 2);
        assert_eq!(index.blocks()[0].language, Some(Language::Json));
        assert_eq!(index.blocks()[1].language, None);
        assert_eq!(
            doc.slice_to_cow(index.blocks()[1].content.clone()),
            "notes\n"
        );
    }

    #[test]
    fn test_reorder_before_implicit_first_synthesizes_its_marker() {
        let (mut doc, mut index) = fixture("notes\n\n# lang:json\n{}\n");
        let id = index.blocks()[1].id;
        let cmd = reorder(&index, &doc, id, 0).unwrap();
        commit(&mut doc, &mut index, cmd);

        assert_eq!(doc.text(), "\n# lang:json\n{}\n\n# lang:\nnotes\n");
        assert_eq!(index.len(), 2);
        assert_eq!(index.blocks()[0].language, Some(Language::Json));
        assert_eq!(index.blocks()[1].language, None);
    }

    #[test]
    fn test_reorder_out_of_range_target() {
        let (doc, index) = fixture("hello");
        let id = index.blocks()[0].id;
        assert_eq!(
            reorder(&index, &doc, id, 1),
            Err(EditError::InvalidTarget(1))
        );
    }
}
