//! The delimiter protocol: the literal token that separates blocks.
//!
//! A marker is the exact byte sequence `"\n# lang:" tag flag? "\n"` where
//! `tag` is over `[A-Za-z0-9_]` (possibly empty or unknown, meaning the
//! language is unset) and `flag` is the literal `-a` marking an
//! auto-detected tag. The leading newline is part of the token: that is
//! the whole disambiguation rule. Marker-shaped text that is not preceded
//! by a newline is ordinary content, so the only way user input can create
//! a boundary is to produce the full token, and the escape rule (doubling
//! the hash) makes that impossible for typed or mid-block pasted text.
//!
//! A marker can sit at offset 0 only when the document's first byte is the
//! token's own newline. A document not starting with a marker opens with
//! an implicit, markerless first block.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::language::Language;

pub const MARKER_PREFIX: &str = "# lang:";

fn marker_regex() -> &'static Regex {
    static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
    MARKER_REGEX
        .get_or_init(|| Regex::new(r"\n# lang:([A-Za-z0-9_]*)(-a)?\n").expect("Invalid marker regex"))
}

fn whole_marker_regex() -> &'static Regex {
    static WHOLE_MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
    WHOLE_MARKER_REGEX.get_or_init(|| {
        Regex::new(r"^\n# lang:([A-Za-z0-9_]*)(-a)?\n$").expect("Invalid marker regex")
    })
}

/// A well-formed marker parsed out of buffer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMarker {
    /// `None` when the tag is empty or unknown: boundary present, language unset.
    pub language: Option<Language>,
    pub auto: bool,
}

/// A marker occurrence found by [`scan_markers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    /// Byte range of the whole token, leading and trailing newline included.
    pub range: std::ops::Range<usize>,
    pub language: Option<Language>,
    pub auto: bool,
}

/// Render the canonical marker text for a language tag.
pub fn emit_marker(language: Option<Language>, auto: bool) -> String {
    let tag = language.map(Language::token).unwrap_or("");
    let flag = if auto { "-a" } else { "" };
    format!("\n{MARKER_PREFIX}{tag}{flag}\n")
}

/// Parse text that should be exactly one marker token. Total: returns
/// `None` for anything that is not a marker, never errors.
pub fn parse_marker(text: &str) -> Option<ParsedMarker> {
    let caps = whole_marker_regex().captures(text)?;
    Some(ParsedMarker {
        language: Language::from_token(&caps[1]),
        auto: caps.get(2).is_some(),
    })
}

/// Find every marker token in `text`, reporting ranges offset by `base`.
///
/// Matches are non-overlapping, which enforces the no-shared-newline rule:
/// in `"\n# lang:a\n# lang:b\n"` the second line's would-be leading newline
/// is already the first token's terminator, so only the first is a marker.
pub fn scan_markers(text: &str, base: usize) -> Vec<MarkerMatch> {
    marker_regex()
        .captures_iter(text)
        .map(|caps| {
            let m = caps.get(0).expect("capture group 0 always present");
            MarkerMatch {
                range: base + m.start()..base + m.end(),
                language: Language::from_token(&caps[1]),
                auto: caps.get(2).is_some(),
            }
        })
        .collect()
}

/// Neutralize embedded marker tokens by doubling the hash, so pasting text
/// mid-block can never silently split the block. `"\n# lang:x\n"` becomes
/// `"\n## lang:x\n"`, which is visible, stable, and outside the grammar.
pub fn escape_markers(text: &str) -> Cow<'_, str> {
    marker_regex().replace_all(text, "\n## lang:$1$2\n")
}
