pub mod autosave;
pub mod blocks;
pub mod clipboard;
pub mod editing;
pub mod editor;
pub mod events;
pub mod format;
pub mod io;
pub mod language;
pub mod presentation;

// Re-export key types for easier usage
pub use autosave::SaveFn;
pub use blocks::{Block, BlockId, BlockIndex, EditError};
pub use editing::{Cmd, Document, Edit, Origin, Patch};
pub use editor::{Editor, Keymap};
pub use events::{EditorEvent, SubscriptionId};
pub use format::Formatter;
pub use language::{DetectionResult, DetectorRegistry, Language, LanguageState};
pub use presentation::GutterLine;
