//! Typed pub/sub for editor state changes. Subscribers are anonymous
//! callbacks; the editor publishes, hosts react. Handlers must not call
//! back into the editor.

use crate::blocks::BlockId;
use crate::language::Language;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The block partition changed: blocks added, removed, moved or
    /// retagged.
    BlocksChanged,
    /// The buffer text changed; carries the new document version.
    ContentChanged { version: u64 },
    /// One block's language assignment changed.
    LanguageChanged {
        block: BlockId,
        language: Option<Language>,
        auto: bool,
    },
    SelectionChanged { selection: std::ops::Range<usize> },
    /// The host should present its language picker for this block.
    LanguageSelectorRequested { block: BlockId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&EditorEvent)>;

#[derive(Default)]
pub(crate) struct EventBus {
    handlers: Vec<(SubscriptionId, Handler)>,
    next: u64,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next);
        self.next += 1;
        self.handlers.push((id, handler));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _)| *sub != id);
        self.handlers.len() != before
    }

    pub(crate) fn emit(&mut self, event: &EditorEvent) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }
}
