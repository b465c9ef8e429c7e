use xi_rope::delta::Builder;
use xi_rope::{Delta, Rope, RopeInfo};

/// One range replacement within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: std::ops::Range<usize>,
    pub text: String,
}

/// Commands that can be applied to the document. Every command compiles
/// to a single delta, so each one is exactly one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    Insert {
        at: usize,
        text: String,
    },
    Delete {
        range: std::ops::Range<usize>,
    },
    Replace {
        range: std::ops::Range<usize>,
        text: String,
    },
    /// Several disjoint replacements applied atomically. Used by block
    /// operations (reorder, seam escaping) that must touch more than one
    /// place without ever committing an intermediate state.
    Edits {
        edits: Vec<Edit>,
    },
}

/// Compile a command into a delta over a document of length `base_len`.
pub(crate) fn compile_command(base_len: usize, cmd: &Cmd) -> Delta<RopeInfo> {
    let mut builder = Builder::new(base_len);
    match cmd {
        Cmd::Insert { at, text } => {
            builder.replace(*at..*at, Rope::from(text.as_str()));
        }
        Cmd::Delete { range } => {
            builder.delete(range.clone());
        }
        Cmd::Replace { range, text } => {
            builder.replace(range.clone(), Rope::from(text.as_str()));
        }
        Cmd::Edits { edits } => {
            // The builder wants ascending, non-overlapping intervals.
            let mut sorted: Vec<&Edit> = edits.iter().collect();
            sorted.sort_by_key(|e| (e.range.start, e.range.end));
            for edit in sorted {
                if edit.text.is_empty() {
                    builder.delete(edit.range.clone());
                } else {
                    builder.replace(edit.range.clone(), Rope::from(edit.text.as_str()));
                }
            }
        }
    }
    builder.build()
}

/// Byte ranges touched by a delta, in new-document coordinates. Pure
/// deletions show up as empty ranges at the join point so the block index
/// still widens its re-scan window around them.
pub(crate) fn changed_ranges(delta: &Delta<RopeInfo>) -> Vec<std::ops::Range<usize>> {
    let mut changed = Vec::new();
    let mut old_pos = 0;
    let mut new_pos = 0;
    for op in delta.els.iter() {
        match op {
            xi_rope::delta::DeltaElement::Copy(from, to) => {
                if old_pos < *from {
                    // Bytes deleted between the previous element and this copy.
                    changed.push(new_pos..new_pos);
                }
                new_pos += to - from;
                old_pos = *to;
            }
            xi_rope::delta::DeltaElement::Insert(inserted) => {
                changed.push(new_pos..new_pos + inserted.len());
                new_pos += inserted.len();
            }
        }
    }
    if old_pos < delta.base_len {
        // Trailing deletion.
        changed.push(new_pos..new_pos);
    }
    changed
}
