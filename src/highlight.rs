//! Rule-driven syntax highlighting: a pure `line -> token spans` function
//! applied lazily at render time, never on the ingest path.
//!
//! Rules come from the configuration; each compiles to a regex once. The
//! resulting token list is cached on the record itself, so a line is
//! scanned at most once no matter how often it is drawn.

use crate::config::HighlightRule;
use crate::record::{LineRecord, Token, TokenKind};
use regex::Regex;

struct CompiledRule {
    kind: TokenKind,
    color: String,
    style: String,
    pattern: Regex,
}

pub struct Highlighter {
    rules: Vec<CompiledRule>,
}

impl Highlighter {
    /// Compile the configured rules; rules with invalid patterns are
    /// dropped.
    pub fn new(rules: &[HighlightRule]) -> Self {
        let compiled = rules
            .iter()
            .filter_map(|rule| {
                Regex::new(&rule.pattern).ok().map(|pattern| CompiledRule {
                    kind: kind_for_rule(&rule.name),
                    color: rule.color.clone(),
                    style: rule.style.clone(),
                    pattern,
                })
            })
            .collect();
        Highlighter { rules: compiled }
    }

    /// Token spans for a record, computed on first use and cached on the
    /// record.
    pub fn tokens<'a>(&self, record: &'a LineRecord) -> &'a [Token] {
        record.tokens.get_or_init(|| self.scan(&record.raw))
    }

    /// Scan a raw line against every rule, producing non-overlapping spans
    /// ordered by start offset.
    pub fn scan(&self, raw: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        for rule in &self.rules {
            for found in rule.pattern.find_iter(raw) {
                insert_sorted(
                    &mut tokens,
                    Token {
                        text: found.as_str().to_string(),
                        kind: rule.kind,
                        start: found.start(),
                        end: found.end(),
                    },
                );
            }
        }
        // Earlier rules win where spans overlap.
        let mut result: Vec<Token> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if result.last().map_or(true, |prev| token.start >= prev.end) {
                result.push(token);
            }
        }
        result
    }

    /// Color and style names configured for a token kind, when a rule of
    /// that kind exists.
    #[allow(dead_code)] // Public API for external use and tests
    pub fn appearance(&self, kind: TokenKind) -> Option<(&str, &str)> {
        self.rules
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| (r.color.as_str(), r.style.as_str()))
    }
}

/// Single-pass insertion sort by start offset: token lists are short and
/// arrive nearly sorted per rule.
fn insert_sorted(tokens: &mut Vec<Token>, token: Token) {
    let mut at = tokens.len();
    while at > 0 && tokens[at - 1].start > token.start {
        at -= 1;
    }
    tokens.insert(at, token);
}

fn kind_for_rule(name: &str) -> TokenKind {
    match name {
        "timestamp" => TokenKind::Timestamp,
        "loglevel" | "level" => TokenKind::Level,
        "ip_address" | "ip" => TokenKind::Ip,
        "status_code" => TokenKind::StatusCode,
        "uuid" => TokenKind::Uuid,
        "url" => TokenKind::Url,
        "number" => TokenKind::Number,
        "string" | "quoted" => TokenKind::Quoted,
        "json" => TokenKind::Json,
        _ => TokenKind::Keyword,
    }
}
