//! In-place content formatting, currently JSON only. Formatters are
//! total over their own language: input that does not parse is left
//! untouched rather than reported.

use crate::language::Language;

pub trait Formatter {
    fn name(&self) -> &'static str;

    /// Reformatted content, or `None` to leave the block as-is.
    fn format(&self, content: &str) -> Option<String>;
}

/// Pretty-prints with `serde_json`, which is canonical: formatting an
/// already-formatted block returns the identical string.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn format(&self, content: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(content.trim()).ok()?;
        let mut pretty = serde_json::to_string_pretty(&value).ok()?;
        // Keep the block's trailing newline so the next marker still
        // starts at a line boundary.
        if content.ends_with('\n') {
            pretty.push('\n');
        }
        Some(pretty)
    }
}

pub fn formatter_for(language: Language) -> Option<&'static dyn Formatter> {
    match language {
        Language::Json => Some(&JsonFormatter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_pretty_prints() {
        // Keys come back sorted: serde_json's Value stores objects in a
        // BTreeMap, which is part of what makes the output canonical.
        let formatted = JsonFormatter.format("{\"b\":1,\"a\":[2,3]}\n").unwrap();
        assert_eq!(formatted, "{\n  \"a\": [\n    2,\n    3\n  ],\n  \"b\": 1\n}\n");
    }

    #[test]
    fn test_json_format_is_idempotent() {
        let once = JsonFormatter.format("{\"b\":1,\"a\":[2,3]}\n").unwrap();
        let twice = JsonFormatter.format(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_invalid_json_is_left_alone() {
        assert_eq!(JsonFormatter.format("{oops"), None);
        assert_eq!(JsonFormatter.format(""), None);
    }

    #[test]
    fn test_trailing_newline_preserved_either_way() {
        assert!(JsonFormatter.format("[1]").unwrap().ends_with(']'));
        assert!(JsonFormatter.format("[1]\n").unwrap().ends_with("]\n"));
    }

    #[test]
    fn test_formatter_lookup() {
        assert!(formatter_for(Language::Json).is_some());
        assert!(formatter_for(Language::Text).is_none());
        assert!(formatter_for(Language::Python).is_none());
    }
}
