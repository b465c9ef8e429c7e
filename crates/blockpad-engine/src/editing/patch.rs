/// Annotation carried by every committed transaction so downstream
/// listeners (autosave, language detection) can tell programmatic
/// structural edits apart from direct user typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Direct typing or deletion by the user.
    UserInput,
    /// Clipboard paste.
    Paste,
    /// A block-level operation (insert/merge/split/reorder/delete/cut).
    Block,
    /// A marker rewrite changing only a block's language tag.
    Language,
    /// In-place reformat of a block's content.
    Format,
    /// Whole-document replacement via `set_content`.
    SetContent,
}

/// Result of applying a command: what changed, where the cursor went,
/// and the document version after the edit. Ranges are offsets into the
/// new document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub origin: Origin,
    pub changed: Vec<std::ops::Range<usize>>,
    pub new_selection: std::ops::Range<usize>,
    pub version: u64,
}
