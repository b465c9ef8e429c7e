pub mod detect;
pub mod detectors;

pub use detect::{DetectionEngine, DetectionRequest, DetectionResult};
pub use detectors::{Detection, Detector, DetectorRegistry};

use serde::{Deserialize, Serialize};

/// The set of languages a block can be tagged with.
///
/// The serialized form doubles as the tag written into delimiter markers,
/// so it is restricted to `[a-z0-9_]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Text,
    Markdown,
    Json,
    Python,
    Rust,
    Javascript,
    Sql,
    Shell,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Text,
        Language::Markdown,
        Language::Json,
        Language::Python,
        Language::Rust,
        Language::Javascript,
        Language::Sql,
        Language::Shell,
    ];

    /// The tag written into delimiter markers.
    pub fn token(self) -> &'static str {
        match self {
            Language::Text => "text",
            Language::Markdown => "markdown",
            Language::Json => "json",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Javascript => "javascript",
            Language::Sql => "sql",
            Language::Shell => "shell",
        }
    }

    /// Parse a marker tag. Unknown tags are not an error; the caller treats
    /// them as "boundary present, language unset".
    pub fn from_token(token: &str) -> Option<Language> {
        Language::ALL.iter().copied().find(|l| l.token() == token)
    }

    /// The next language in display order, wrapping. Used by hosts that
    /// cycle through languages with a single key.
    pub fn cycle(self) -> Language {
        let i = Language::ALL.iter().position(|&l| l == self).unwrap_or(0);
        Language::ALL[(i + 1) % Language::ALL.len()]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Per-block language assignment state, derived from the block's tag and
/// auto flag rather than stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageState {
    /// No tag and detection has not run yet.
    AutoPending,
    /// Tagged by the detection pipeline; may be overwritten by later runs.
    Auto(Language),
    /// Tagged by the user; detection must never overwrite this.
    Manual(Language),
}

impl LanguageState {
    pub fn of(language: Option<Language>, auto: bool) -> LanguageState {
        match language {
            None => LanguageState::AutoPending,
            Some(l) if auto => LanguageState::Auto(l),
            Some(l) => LanguageState::Manual(l),
        }
    }

    /// Whether the detection pipeline may write to a block in this state.
    /// A manually tagged block becomes eligible again only once its content
    /// has been cleared back to empty.
    pub fn detection_eligible(self, content_is_empty: bool) -> bool {
        match self {
            LanguageState::AutoPending | LanguageState::Auto(_) => true,
            LanguageState::Manual(_) => content_is_empty,
        }
    }
}
