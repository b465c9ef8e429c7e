//! The editor facade: one `Document`, one `BlockIndex`, and the service
//! state around them (detection, autosave, folds, options, events).
//! Hosts talk to this type; everything below it is plumbing.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::autosave::{Autosave, DEFAULT_AUTOSAVE_DELAY, SaveFn};
use crate::blocks::{Block, BlockId, BlockIndex, EditError, escape_markers, ops, scan_markers};
use crate::clipboard;
use crate::editing::{Cmd, Document, Edit, Origin, Patch};
use crate::events::{EditorEvent, EventBus, SubscriptionId};
use crate::format;
use crate::language::detect::DEFAULT_DETECTION_DELAY;
use crate::language::{
    DetectionEngine, DetectionRequest, DetectionResult, DetectorRegistry, Language,
};
use crate::presentation::{self, GutterLine};

/// Keymap flavor; currently only influences copy behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Keymap {
    #[default]
    Default,
    Emacs,
}

impl Keymap {
    pub fn from_name(name: &str) -> Keymap {
        match name {
            "emacs" => Keymap::Emacs,
            _ => Keymap::Default,
        }
    }

    /// Emacs collapses the mark after a copy.
    pub(crate) fn deselect_on_copy(self) -> bool {
        matches!(self, Keymap::Emacs)
    }
}

pub struct Editor {
    doc: Document,
    index: BlockIndex,
    detection: DetectionEngine,
    registry: DetectorRegistry,
    autosave: Autosave,
    events: EventBus,
    folds: HashSet<BlockId>,
    default_language: Language,
    keymap: Keymap,
    read_only: bool,
    show_line_numbers: bool,
    show_fold_gutter: bool,
}

impl Editor {
    pub fn new(content: &str) -> Self {
        Self {
            doc: Document::from_text(content),
            index: BlockIndex::rebuild_full(content),
            detection: DetectionEngine::new(DEFAULT_DETECTION_DELAY),
            registry: DetectorRegistry::with_builtins(),
            autosave: Autosave::new(DEFAULT_AUTOSAVE_DELAY),
            events: EventBus::default(),
            folds: HashSet::new(),
            default_language: Language::Text,
            keymap: Keymap::Default,
            read_only: false,
            show_line_numbers: true,
            show_fold_gutter: true,
        }
    }

    // --- content & blocks -------------------------------------------------

    pub fn get_content(&self) -> String {
        self.doc.text()
    }

    /// Replace the whole document and re-derive the index from scratch.
    /// Block identity intentionally resets; fold and detection state is
    /// dropped with it.
    pub fn set_content(&mut self, content: &str) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let len = self.doc.len();
        let tx = self.doc.apply(
            &Cmd::Replace {
                range: 0..len,
                text: content.to_string(),
            },
            Origin::SetContent,
        );
        self.index = BlockIndex::rebuild_full(content);
        self.folds.clear();
        self.detection.clear();
        self.autosave.mark_dirty(Instant::now());
        self.events.emit(&EditorEvent::ContentChanged {
            version: tx.patch.version,
        });
        self.events.emit(&EditorEvent::BlocksChanged);
        Ok(())
    }

    pub fn get_blocks(&self) -> &[Block] {
        self.index.blocks()
    }

    pub fn block_at(&self, offset: usize) -> &Block {
        self.index.block_at(offset)
    }

    pub fn current_block(&self) -> &Block {
        self.index.block_at(self.doc.selection().start)
    }

    pub fn version(&self) -> u64 {
        self.doc.version()
    }

    /// A block's language with `None` resolved to the configured default.
    pub fn effective_language(&self, block: &Block) -> Language {
        block.language.unwrap_or(self.default_language)
    }

    pub fn block_content(&self, block: &Block) -> std::borrow::Cow<'_, str> {
        self.doc.slice_to_cow(block.content.clone())
    }

    // --- edits ------------------------------------------------------------

    /// Apply one command as one transaction. The typed-input path runs
    /// the seam-escape rule so no insertion can complete a marker out of
    /// surrounding bytes.
    pub fn apply(&mut self, cmd: &Cmd, origin: Origin) -> Result<Patch, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let cmd = match (origin, cmd) {
            (Origin::UserInput, Cmd::Insert { at, text }) => self.seam_escaped(*at..*at, text),
            (Origin::UserInput, Cmd::Replace { range, text }) => {
                self.seam_escaped(range.clone(), text)
            }
            _ => cmd.clone(),
        };
        Ok(self.commit(&cmd, origin))
    }

    /// Type at the caret, replacing the selection if there is one.
    pub fn insert_text(&mut self, text: &str) -> Result<Patch, EditError> {
        let selection = self.doc.selection();
        let cmd = if selection.is_empty() {
            Cmd::Insert {
                at: selection.start,
                text: text.to_string(),
            }
        } else {
            Cmd::Replace {
                range: selection,
                text: text.to_string(),
            }
        };
        self.apply(&cmd, Origin::UserInput)
    }

    /// Delete the selection, or the char before the caret. `None` when
    /// there is nothing to delete.
    pub fn backspace(&mut self) -> Result<Option<Patch>, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let selection = self.doc.selection();
        let range = if !selection.is_empty() {
            selection
        } else if selection.start == 0 {
            return Ok(None);
        } else {
            self.doc.prev_char_boundary(selection.start)..selection.start
        };
        Ok(Some(self.commit(&Cmd::Delete { range }, Origin::UserInput)))
    }

    // --- block operations -------------------------------------------------

    pub fn insert_block_after(
        &mut self,
        id: BlockId,
        language: Option<Language>,
    ) -> Result<BlockId, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let (cmd, caret) = ops::insert_block_after(&self.index, id, language, false)?;
        self.commit(&cmd, Origin::Block);
        self.place_caret(caret);
        Ok(self.index.block_at(caret).id)
    }

    pub fn insert_block_before(
        &mut self,
        id: BlockId,
        language: Option<Language>,
    ) -> Result<BlockId, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let (cmd, caret) = ops::insert_block_before(&self.index, id, language, false)?;
        self.commit(&cmd, Origin::Block);
        self.place_caret(caret);
        Ok(self.index.block_at(caret).id)
    }

    pub fn insert_block_at_end(&mut self, language: Option<Language>) -> Result<BlockId, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let (cmd, caret) = ops::insert_block_at_end(self.doc.len(), language, false);
        self.commit(&cmd, Origin::Block);
        self.place_caret(caret);
        Ok(self.index.block_at(caret).id)
    }

    pub fn delete_block(&mut self, id: BlockId) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let cmd = ops::delete_block(&self.index, id)?;
        self.commit(&cmd, Origin::Block);
        Ok(())
    }

    pub fn merge_adjacent(&mut self, a: BlockId, b: BlockId) -> Result<BlockId, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let cmd = ops::merge_adjacent(&self.index, a, b)?;
        self.commit(&cmd, Origin::Block);
        Ok(a)
    }

    pub fn split_at(&mut self, offset: usize) -> Result<(BlockId, BlockId), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let cmd = ops::split_at(&self.index, offset)?;
        self.commit(&cmd, Origin::Block);
        let right = self.index.block_at(offset).id;
        let pos = self.index.position(right).unwrap_or(0);
        let left = self.index.blocks()[pos.saturating_sub(1)].id;
        Ok((left, right))
    }

    pub fn reorder(&mut self, id: BlockId, target: usize) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let cmd = ops::reorder(&self.index, &self.doc, id, target)?;
        if let Cmd::Edits { edits } = &cmd
            && edits.is_empty()
        {
            return Ok(());
        }
        self.commit(&cmd, Origin::Block);
        Ok(())
    }

    // --- language ---------------------------------------------------------

    pub fn change_language(
        &mut self,
        id: BlockId,
        language: Option<Language>,
        auto: bool,
    ) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let pos = self.index.position(id).ok_or(EditError::UnknownBlock(id))?;
        let start = self.index.blocks()[pos].range.start;
        let cmd = ops::change_language(&self.index, id, language, auto)?;
        self.commit(&cmd, Origin::Language);
        let block = self.index.block_at(start).id;
        self.events.emit(&EditorEvent::LanguageChanged {
            block,
            language,
            auto,
        });
        Ok(())
    }

    pub fn change_current_language(
        &mut self,
        language: Option<Language>,
        auto: bool,
    ) -> Result<(), EditError> {
        let id = self.current_block().id;
        self.change_language(id, language, auto)
    }

    /// Apply a finished detection run. Dropped silently when the result
    /// is stale (the block changed since the snapshot), the block is
    /// gone, or it is no longer detection-eligible.
    pub fn apply_detection(&mut self, result: DetectionResult) {
        if self.read_only {
            return;
        }
        if !self.detection.is_current(result.block, result.generation) {
            log::debug!("dropping stale detection for {:?}", result.block);
            return;
        }
        let Some(pos) = self.index.position(result.block) else {
            return;
        };
        let (has_marker, start, eligible, already) = {
            let block = &self.index.blocks()[pos];
            (
                block.has_marker(),
                block.range.start,
                block.state().detection_eligible(block.content_is_empty()),
                block.language == Some(result.language) && block.auto,
            )
        };
        if !eligible || already {
            return;
        }
        if has_marker {
            match ops::change_language(&self.index, result.block, Some(result.language), true) {
                Ok(cmd) => {
                    self.commit(&cmd, Origin::Language);
                }
                Err(err) => {
                    log::warn!("detection could not retag {:?}: {err}", result.block);
                    return;
                }
            }
            let block = self.index.block_at(start).id;
            self.events.emit(&EditorEvent::LanguageChanged {
                block,
                language: Some(result.language),
                auto: true,
            });
        } else {
            // The implicit first block has no marker to rewrite and
            // detection never materializes one; the tag lives only in
            // the index.
            self.index
                .set_language(result.block, Some(result.language), true);
            self.events.emit(&EditorEvent::LanguageChanged {
                block: result.block,
                language: Some(result.language),
                auto: true,
            });
        }
    }

    // --- clipboard --------------------------------------------------------

    pub fn copy(&mut self) -> Option<String> {
        let payload = clipboard::copy_payload(&self.index, &self.doc, self.doc.selection())?;
        if self.keymap.deselect_on_copy() {
            let head = self.doc.selection().start;
            self.set_selection(head..head);
        }
        Some(payload)
    }

    pub fn cut(&mut self) -> Result<Option<String>, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let selection = self.doc.selection();
        let Some(payload) = clipboard::copy_payload(&self.index, &self.doc, selection.clone())
        else {
            return Ok(None);
        };
        self.commit(&Cmd::Delete { range: selection }, Origin::Block);
        Ok(Some(payload))
    }

    /// Paste at the selection. At an exact block boundary the text goes
    /// in verbatim so markers in the payload produce blocks; mid-block,
    /// markers are escaped and seams checked so the paste never splits
    /// the block.
    pub fn paste(&mut self, text: &str) -> Result<Patch, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let selection = self.doc.selection();
        let cmd = if selection.is_empty()
            && clipboard::is_block_boundary(&self.index, self.doc.len(), selection.start)
        {
            Cmd::Insert {
                at: selection.start,
                text: text.to_string(),
            }
        } else {
            let escaped = escape_markers(text);
            self.seam_escaped(selection, &escaped)
        };
        Ok(self.commit(&cmd, Origin::Paste))
    }

    // --- selection & navigation -------------------------------------------

    pub fn selection(&self) -> std::ops::Range<usize> {
        self.doc.selection()
    }

    pub fn set_selection(&mut self, selection: std::ops::Range<usize>) {
        let before = self.doc.selection();
        self.doc.set_selection(selection);
        let after = self.doc.selection();
        if after != before {
            self.events
                .emit(&EditorEvent::SelectionChanged { selection: after });
        }
    }

    pub fn select_block(&mut self, id: BlockId) -> Result<(), EditError> {
        let pos = self.index.position(id).ok_or(EditError::UnknownBlock(id))?;
        let content = self.index.blocks()[pos].content.clone();
        self.set_selection(content);
        Ok(())
    }

    pub fn previous_block(&mut self) -> Option<BlockId> {
        let pos = self.index.position(self.current_block().id)?;
        let target = self.index.blocks().get(pos.checked_sub(1)?)?;
        let (id, caret) = (target.id, target.content.start);
        self.place_caret(caret);
        Some(id)
    }

    pub fn next_block(&mut self) -> Option<BlockId> {
        let pos = self.index.position(self.current_block().id)?;
        let target = self.index.blocks().get(pos + 1)?;
        let (id, caret) = (target.id, target.content.start);
        self.place_caret(caret);
        Some(id)
    }

    // --- presentation & folds ---------------------------------------------

    pub fn line_numbers(&self) -> Vec<GutterLine> {
        presentation::line_numbers(&self.index, &self.doc)
    }

    pub fn fold_range(&self, id: BlockId) -> Option<std::ops::Range<usize>> {
        presentation::fold_range(&self.index, &self.doc, id)
    }

    /// Toggle and report the new state. Blocks with nothing to hide
    /// never fold.
    pub fn toggle_fold(&mut self, id: BlockId) -> bool {
        if self.fold_range(id).is_none() {
            self.folds.remove(&id);
            return false;
        }
        if self.folds.insert(id) {
            true
        } else {
            self.folds.remove(&id);
            false
        }
    }

    pub fn is_folded(&self, id: BlockId) -> bool {
        self.folds.contains(&id)
    }

    // --- events -----------------------------------------------------------

    pub fn subscribe(&mut self, handler: Box<dyn FnMut(&EditorEvent)>) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Ask the host to show its language picker for the current block.
    pub fn open_language_selector(&mut self) {
        let block = self.current_block().id;
        self.events
            .emit(&EditorEvent::LanguageSelectorRequested { block });
    }

    // --- formatting -------------------------------------------------------

    /// Reformat the current block in place. `Ok(false)` when there is no
    /// formatter for the language, the content does not parse, or it is
    /// already canonical.
    pub fn format_current_block(&mut self) -> Result<bool, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let block = self.current_block();
        let language = self.effective_language(block);
        let range = block.content.clone();
        let Some(formatter) = format::formatter_for(language) else {
            return Ok(false);
        };
        let content = self.doc.slice_to_cow(range.clone());
        let Some(formatted) = formatter.format(&content) else {
            return Ok(false);
        };
        if formatted == content {
            return Ok(false);
        }
        self.commit(
            &Cmd::Replace {
                range,
                text: formatted,
            },
            Origin::Format,
        );
        Ok(true)
    }

    // --- options ----------------------------------------------------------

    pub fn set_default_language(&mut self, language: Language) {
        self.default_language = language;
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    pub fn set_keymap(&mut self, keymap: Keymap) {
        self.keymap = keymap;
    }

    pub fn keymap(&self) -> Keymap {
        self.keymap
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_show_line_numbers(&mut self, show: bool) {
        self.show_line_numbers = show;
    }

    pub fn show_line_numbers(&self) -> bool {
        self.show_line_numbers
    }

    pub fn set_show_fold_gutter(&mut self, show: bool) {
        self.show_fold_gutter = show;
    }

    pub fn show_fold_gutter(&self) -> bool {
        self.show_fold_gutter
    }

    pub fn set_autosave_delay(&mut self, delay: Duration) {
        self.autosave.set_delay(delay);
    }

    pub fn set_detection_delay(&mut self, delay: Duration) {
        self.detection.set_delay(delay);
    }

    pub fn set_save_fn(&mut self, save: Option<SaveFn>) {
        self.autosave.set_save_fn(save);
    }

    // --- timers -----------------------------------------------------------

    /// Drive the timer queue: run due detections synchronously and let
    /// the autosave window elapse.
    pub fn poll(&mut self, now: Instant) {
        let due = self.detection.take_due(now);
        let mut requests: Vec<DetectionRequest> = Vec::new();
        for id in due {
            let Some(pos) = self.index.position(id) else {
                self.detection.forget(id);
                continue;
            };
            let block = &self.index.blocks()[pos];
            if !block.state().detection_eligible(block.content_is_empty()) {
                continue;
            }
            let content = self.doc.slice_to_cow(block.content.clone()).into_owned();
            if content.trim().is_empty() {
                continue;
            }
            requests.push(DetectionRequest {
                block: id,
                generation: self.detection.generation(id),
                content,
            });
        }
        for request in requests {
            if let Some(language) = self.registry.detect(&request.content) {
                self.apply_detection(DetectionResult {
                    block: request.block,
                    generation: request.generation,
                    language,
                });
            }
        }

        if self.autosave.next_deadline().is_some_and(|d| d <= now) {
            let content = self.doc.text();
            self.autosave.poll(now, &content);
        }
    }

    /// The next instant `poll` has work to do, for hosts that sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.detection.next_deadline(), self.autosave.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }

    pub fn flush_saves(&mut self) -> bool {
        let content = self.doc.text();
        self.autosave.flush(&content)
    }

    // --- internals --------------------------------------------------------

    fn commit(&mut self, cmd: &Cmd, origin: Origin) -> Patch {
        let now = Instant::now();
        let selection_before = self.doc.selection();
        let shape_before = self.block_shape();

        let tx = self.doc.apply(cmd, origin);
        self.index.apply_change(&tx.delta, &tx.patch.changed, &self.doc);

        let live: HashSet<BlockId> = self.index.blocks().iter().map(|b| b.id).collect();
        self.folds.retain(|id| live.contains(id));
        self.detection.retain(|id| live.contains(&id));
        self.schedule_detection(&tx.patch.changed, origin, now);
        self.autosave.mark_dirty(now);

        self.events.emit(&EditorEvent::ContentChanged {
            version: tx.patch.version,
        });
        if self.block_shape() != shape_before {
            self.events.emit(&EditorEvent::BlocksChanged);
        }
        if self.doc.selection() != selection_before {
            self.events.emit(&EditorEvent::SelectionChanged {
                selection: self.doc.selection(),
            });
        }
        tx.patch
    }

    fn block_shape(&self) -> Vec<(BlockId, Option<Language>, bool)> {
        self.index
            .blocks()
            .iter()
            .map(|b| (b.id, b.language, b.auto))
            .collect()
    }

    /// Bump generations for blocks the change touched. Tag rewrites and
    /// reformats invalidate in-flight results without scheduling a new
    /// run; so do blocks that are not currently eligible.
    fn schedule_detection(&mut self, changed: &[std::ops::Range<usize>], origin: Origin, now: Instant) {
        let schedule = !matches!(
            origin,
            Origin::Language | Origin::Format | Origin::SetContent
        );
        let mut affected: Vec<BlockId> = Vec::new();
        for range in changed {
            for block in self.index.blocks() {
                if range.start <= block.range.end && range.end >= block.range.start {
                    affected.push(block.id);
                }
            }
        }
        affected.sort();
        affected.dedup();
        for id in affected {
            self.detection.bump(id, now);
            let eligible = self
                .index
                .get(id)
                .is_some_and(|b| b.state().detection_eligible(b.content_is_empty()));
            if !schedule || !eligible {
                self.detection.cancel(id);
            }
        }
    }

    fn place_caret(&mut self, at: usize) {
        self.set_selection(at..at);
    }

    /// Rewrite a user edit so it cannot complete a delimiter marker out
    /// of the bytes around the seam. The candidate window is the edit's
    /// surrounding line (preceding newline included); any marker match
    /// that involves the inserted bytes and is not an existing marker
    /// gets its hash doubled inside the same transaction.
    fn seam_escaped(&self, del: std::ops::Range<usize>, text: &str) -> Cmd {
        let plain = || {
            if del.is_empty() {
                Cmd::Insert {
                    at: del.start,
                    text: text.to_string(),
                }
            } else if text.is_empty() {
                Cmd::Delete { range: del.clone() }
            } else {
                Cmd::Replace {
                    range: del.clone(),
                    text: text.to_string(),
                }
            }
        };

        // Editing inside an existing marker token is retagging by hand,
        // not marker creation.
        let block = self.index.block_at(del.start);
        if block.has_marker()
            && del.start > block.range.start
            && del.start < block.content.start
        {
            return plain();
        }

        let cs = self.doc.line_start(del.start).saturating_sub(1);
        let ce = self.doc.line_end(del.end);
        let prefix = self.doc.slice_to_cow(cs..del.start);
        let suffix = self.doc.slice_to_cow(del.end..ce);
        let mut candidate = String::with_capacity(prefix.len() + text.len() + suffix.len());
        candidate.push_str(&prefix);
        candidate.push_str(text);
        candidate.push_str(&suffix);

        let ins_start = prefix.len();
        let ins_end = ins_start + text.len();
        let old_pos = |p: usize| {
            if p <= ins_start {
                cs + p
            } else if p >= ins_end {
                del.end + (p - ins_end)
            } else {
                del.start
            }
        };

        let mut inserted = text.to_string();
        let mut shift = 0usize;
        let mut before: Vec<Edit> = Vec::new();
        let mut after: Vec<Edit> = Vec::new();

        for m in scan_markers(&candidate, 0) {
            if m.range.end <= ins_start || m.range.start >= ins_end {
                continue;
            }
            let old_span = old_pos(m.range.start)..old_pos(m.range.end);
            let overlaps_existing = self.index.blocks().iter().any(|b| {
                b.has_marker() && old_span.start < b.content.start && old_span.end > b.range.start
            });
            if overlaps_existing {
                continue;
            }
            // Double the hash: "\n# lang:.." -> "\n## lang:..".
            let q = m.range.start + 2;
            if q < ins_start {
                let p = cs + q;
                before.push(Edit {
                    range: p..p,
                    text: "#".to_string(),
                });
            } else if q <= ins_end {
                inserted.insert(q - ins_start + shift, '#');
                shift += 1;
            } else {
                let p = del.end + (q - ins_end);
                after.push(Edit {
                    range: p..p,
                    text: "#".to_string(),
                });
            }
        }

        if before.is_empty() && after.is_empty() && shift == 0 {
            return plain();
        }
        let mut edits = before;
        edits.push(Edit {
            range: del.clone(),
            text: inserted,
        });
        edits.extend(after);
        Cmd::Edits { edits }
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        if self.autosave.is_dirty() {
            self.flush_saves();
        }
    }
}
