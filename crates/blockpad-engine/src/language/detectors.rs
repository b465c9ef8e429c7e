//! Pluggable language detectors.
//!
//! Detectors are heuristics, not parsers of record: each may decline, and
//! a wrong guess is recoverable because detection only ever writes auto
//! tags. The registry runs them in priority order and takes the first
//! answer at or above its confidence threshold.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag};
use regex::Regex;

use crate::language::Language;

/// Minimum confidence a detector result needs to be applied.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub language: Language,
    pub confidence: f32,
}

pub trait Detector {
    fn name(&self) -> &'static str;

    /// `None` means "no opinion". Detectors must not error; anything that
    /// fails to parse is simply not that language.
    fn detect(&self, content: &str) -> Option<Detection>;
}

/// Detectors in priority order plus the acceptance threshold.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
    threshold: f32,
}

impl DetectorRegistry {
    pub fn new(threshold: f32) -> Self {
        Self {
            detectors: Vec::new(),
            threshold,
        }
    }

    /// The built-in stack: JSON (strongest signal) first, then Markdown
    /// structure, then token heuristics for the remaining languages.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new(DEFAULT_THRESHOLD);
        registry.register(Box::new(JsonDetector));
        registry.register(Box::new(MarkdownDetector));
        registry.register(Box::new(TokenDetector));
        registry
    }

    pub fn register(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }

    /// First confident answer wins.
    pub fn detect(&self, content: &str) -> Option<Language> {
        for detector in &self.detectors {
            if let Some(detection) = detector.detect(content)
                && detection.confidence >= self.threshold
            {
                log::debug!(
                    "detector {} matched {} ({:.2})",
                    detector.name(),
                    detection.language,
                    detection.confidence
                );
                return Some(detection.language);
            }
        }
        None
    }
}

/// Accepts content whose first value parses as a JSON object or array.
/// Bare scalars are excluded: `42` or `true` is far more likely prose.
pub struct JsonDetector;

impl Detector for JsonDetector {
    fn name(&self) -> &'static str {
        "json"
    }

    fn detect(&self, content: &str) -> Option<Detection> {
        let trimmed = content.trim();
        if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
            return None;
        }
        serde_json::from_str::<serde_json::Value>(trimmed)
            .ok()
            .map(|_| Detection {
                language: Language::Json,
                confidence: 0.95,
            })
    }
}

/// Counts structural Markdown constructs. Paragraph text alone never
/// counts, so plain prose stays undetected.
pub struct MarkdownDetector;

impl Detector for MarkdownDetector {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn detect(&self, content: &str) -> Option<Detection> {
        let mut signals = 0usize;
        for event in Parser::new(content) {
            match event {
                Event::Start(
                    Tag::Heading { .. }
                    | Tag::List(_)
                    | Tag::BlockQuote(_)
                    | Tag::CodeBlock(CodeBlockKind::Fenced(_))
                    | Tag::Link { .. }
                    | Tag::Emphasis
                    | Tag::Strong,
                )
                | Event::Rule => signals += 1,
                _ => {}
            }
        }
        // One hash line could just be a shell comment; demand a second
        // construct before claiming the block.
        if signals < 2 {
            return None;
        }
        let lines = content.lines().count().max(1);
        let confidence = (0.5 + signals as f32 / lines as f32).min(0.9);
        Some(Detection {
            language: Language::Markdown,
            confidence,
        })
    }
}

struct TokenProfile {
    language: Language,
    patterns: &'static [&'static str],
}

const TOKEN_PROFILES: &[TokenProfile] = &[
    TokenProfile {
        language: Language::Python,
        patterns: &[
            r"(?m)^def \w+\(",
            r"(?m)^class \w+[(:]",
            r"(?m)^(import|from) [\w.]+",
            r"(?m)^\s*(elif |return |pass$)",
            r"print\(",
        ],
    },
    TokenProfile {
        language: Language::Rust,
        patterns: &[
            r"\bfn \w+\s*\(",
            r"\blet (mut )?\w+",
            r"->\s*[\w&(]",
            r"\buse \w+(::|;)",
            r"\b(impl|struct|enum|match)\b",
        ],
    },
    TokenProfile {
        language: Language::Javascript,
        patterns: &[
            r"\bfunction\s*\w*\s*\(",
            r"\b(const|let|var)\s+\w+\s*=",
            r"=>",
            r"console\.\w+\(",
            r"===|!==",
        ],
    },
    TokenProfile {
        language: Language::Sql,
        patterns: &[
            r"(?is)\bselect\b.*\bfrom\b",
            r"(?i)\b(insert into|delete from)\b",
            r"(?i)\b(create|alter|drop) (table|index|view)\b",
            r"(?i)\bupdate \w+ set\b",
            r"(?i)\b(where|group by|order by|join)\b",
        ],
    },
    TokenProfile {
        language: Language::Shell,
        patterns: &[
            r"(?m)^#!\s*/[\w/]*\b(ba|z)?sh\b",
            r"(?m)^\s*(if \[|fi$|done$|esac$)",
            r"\$\{?\w+",
            r"(?m)^(export|echo|cd|source|alias) ",
            r"\|\s*(grep|awk|sed|sort|xargs)\b",
        ],
    },
];

fn compiled_profiles() -> &'static Vec<(Language, Vec<Regex>)> {
    static PROFILES: OnceLock<Vec<(Language, Vec<Regex>)>> = OnceLock::new();
    PROFILES.get_or_init(|| {
        TOKEN_PROFILES
            .iter()
            .map(|p| {
                let regexes = p
                    .patterns
                    .iter()
                    .map(|pat| Regex::new(pat).expect("static detector pattern"))
                    .collect();
                (p.language, regexes)
            })
            .collect()
    })
}

/// Regex heuristics for languages without a cheap structural parse.
/// Scores by how many distinct pattern families match; a single hit is
/// never enough, so stray keywords in prose do not flip a block.
pub struct TokenDetector;

impl Detector for TokenDetector {
    fn name(&self) -> &'static str {
        "tokens"
    }

    fn detect(&self, content: &str) -> Option<Detection> {
        // A shebang is decisive on its own.
        if content.starts_with("#!") && content.lines().next().is_some_and(|l| l.contains("sh")) {
            return Some(Detection {
                language: Language::Shell,
                confidence: 0.95,
            });
        }

        let mut best: Option<Detection> = None;
        for (language, patterns) in compiled_profiles() {
            let hits = patterns.iter().filter(|re| re.is_match(content)).count();
            if hits < 2 {
                continue;
            }
            let confidence = (0.45 + 0.15 * hits as f32).min(0.95);
            if best.is_none_or(|b| confidence > b.confidence) {
                best = Some(Detection {
                    language: *language,
                    confidence,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn registry() -> DetectorRegistry {
        DetectorRegistry::with_builtins()
    }

    #[rstest]
    #[case(r#"{"name": "test", "values": [1, 2, 3]}"#, Language::Json)]
    #[case("[1, 2, 3]\n", Language::Json)]
    #[case("# Notes\n\n- first\n- second\n", Language::Markdown)]
    #[case("def greet(name):\n    return f\"hi {name}\"\n\nprint(greet('x'))\n", Language::Python)]
    #[case("fn main() {\n    let mut total = 0;\n    match total { _ => {} }\n}\n", Language::Rust)]
    #[case("const add = (a, b) => a + b;\nconsole.log(add(1, 2));\n", Language::Javascript)]
    #[case("select id, name from users where active = 1 order by name;\n", Language::Sql)]
    #[case("#!/bin/bash\necho hi\n", Language::Shell)]
    fn test_builtin_detection(#[case] content: &str, #[case] expected: Language) {
        assert_eq!(registry().detect(content), Some(expected));
    }

    #[rstest]
    #[case("just some plain prose about nothing in particular\n")]
    #[case("")]
    #[case("42")]
    #[case("shopping: eggs, milk, where did I put the list\n")]
    fn test_prose_is_not_detected(#[case] content: &str) {
        assert_eq!(registry().detect(content), None);
    }

    #[test]
    fn test_invalid_json_declines() {
        assert_eq!(JsonDetector.detect("{not json"), None);
        assert_eq!(JsonDetector.detect("plain text"), None);
    }

    #[test]
    fn test_markdown_needs_more_than_one_construct() {
        // A single hash heading reads like a shell comment.
        assert_eq!(MarkdownDetector.detect("# reminder\n"), None);
        assert!(MarkdownDetector.detect("# title\n\n> quoted\n").is_some());
    }

    #[test]
    fn test_json_outranks_token_heuristics() {
        // Valid JSON that also contains SQL-looking keywords.
        let content = r#"{"query": "select x from t where y = 1 order by x"}"#;
        assert_eq!(registry().detect(content), Some(Language::Json));
    }

    #[test]
    fn test_threshold_filters_weak_matches() {
        let mut strict = DetectorRegistry::new(0.99);
        strict.register(Box::new(TokenDetector));
        assert_eq!(
            strict.detect("select id from users where active = 1;\n"),
            None
        );
    }
}
