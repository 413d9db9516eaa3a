//! Filter engine: compiles query strings and evaluates them per record.
//!
//! Two compiled forms exist. Simple queries become a flat predicate
//! combining four axes (text, levels, sources, time range) with AND, kept
//! for backward compatibility and for the programmatic
//! [`FilterOptions`] path. Advanced queries (boolean connectives,
//! comparison operators, time ranges, multiple field predicates) become an
//! expression tree. Single-word shortcuts are expanded before
//! classification.

pub mod query;

use crate::record::{FilterOptions, LineRecord, TimeRange};
use query::{parse_field_expression, parse_query, FieldPredicate, QueryError, QueryExpr};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Characters that promote a plain query to a regex text search.
const REGEX_METACHARS: &[char] = &['.', '*', '+', '?', '^', '$', '{', '}', '[', ']', '|', '(', ')'];

/// Markers that classify a query as advanced. Checked case-insensitively.
const ADVANCED_MARKERS: &[&str] = &[" AND ", " OR ", " NOT ", "time:[", ":>", ":<", ":!=", ":~"];

/// Seed values for the shortcut table; the configuration can extend or
/// override them.
const DEFAULT_SHORTCUTS: &[(&str, &str)] = &[
    ("errors", "level:ERROR"),
    ("warnings", "level:WARN"),
    ("info", "level:INFO"),
    ("debug", "level:DEBUG"),
    ("5xx", "status:>=500"),
    ("4xx", "status:>=400 AND status:<500"),
    ("3xx", "status:>=300 AND status:<400"),
    ("2xx", "status:>=200 AND status:<300"),
    ("slow", "response_time:>1000"),
    ("today", "time:[today 00:00:00 TO today 23:59:59]"),
    ("last_hour", "time:[now-1h TO now]"),
];

/// Text axis of a simple filter.
#[derive(Debug, Clone)]
enum TextMatcher {
    Substring { needle: String, case_sensitive: bool },
    Regex(Regex),
}

impl TextMatcher {
    fn matches(&self, raw: &str) -> bool {
        match self {
            TextMatcher::Substring {
                needle,
                case_sensitive: true,
            } => raw.contains(needle.as_str()),
            TextMatcher::Substring { needle, .. } => {
                query::contains_ignore_ascii_case(raw, needle)
            }
            TextMatcher::Regex(pattern) => pattern.is_match(raw),
        }
    }
}

/// Flat predicate compiled from [`FilterOptions`]: the four axes combine
/// with AND, plus any inline `field:value` terms from the query text.
#[derive(Debug, Clone, Default)]
pub struct SimpleFilter {
    text: Option<TextMatcher>,
    fields: Vec<FieldPredicate>,
    levels: BTreeSet<String>,
    sources: BTreeSet<String>,
    time_range: Option<TimeRange>,
}

impl SimpleFilter {
    fn compile(options: &FilterOptions) -> Result<SimpleFilter, QueryError> {
        let mut filter = SimpleFilter {
            levels: options
                .log_levels
                .iter()
                .map(|l| l.to_ascii_uppercase())
                .collect(),
            sources: options.sources.iter().cloned().collect(),
            time_range: options.time_range,
            ..SimpleFilter::default()
        };

        let query = options.query.trim();
        if query.is_empty() {
            return Ok(filter);
        }

        if query.contains(':') {
            // Field form: split on whitespace (quotes kept together) and
            // compile each `field:value` term; a bare term becomes the
            // keyword text.
            for part in split_query_parts(query) {
                if part.contains(':') {
                    filter.fields.push(parse_field_expression(&part)?);
                } else if filter.text.is_none() {
                    filter.text = Some(TextMatcher::Substring {
                        needle: part,
                        case_sensitive: options.case_sensitive,
                    });
                }
            }
        } else if options.is_regex {
            let flags = if options.case_sensitive { "" } else { "(?i)" };
            let pattern = Regex::new(&format!("{}{}", flags, query))
                .map_err(|e| QueryError::Regex(e.to_string()))?;
            filter.text = Some(TextMatcher::Regex(pattern));
        } else {
            filter.text = Some(TextMatcher::Substring {
                needle: query.to_string(),
                case_sensitive: options.case_sensitive,
            });
        }

        Ok(filter)
    }

    fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.fields.is_empty()
            && self.levels.is_empty()
            && self.sources.is_empty()
            && self.time_range.is_none()
    }

    fn matches(&self, record: &LineRecord) -> bool {
        if let Some(range) = &self.time_range {
            // Records without a parsed timestamp never match a time range.
            if !record.timestamp.is_some_and(|ts| range.contains(ts)) {
                return false;
            }
        }
        if !self.levels.is_empty() && !self.levels.contains(record.level_str()) {
            return false;
        }
        if !self.sources.is_empty()
            && !self.sources.contains(record.source.to_string_lossy().as_ref())
        {
            return false;
        }
        if let Some(text) = &self.text {
            if !text.matches(&record.raw) {
                return false;
            }
        }
        self.fields.iter().all(|f| f.matches(record))
    }

    fn summary(&self) -> String {
        let mut parts = Vec::new();
        match &self.text {
            Some(TextMatcher::Substring { needle, .. }) => {
                parts.push(format!("text:\"{}\"", needle));
            }
            Some(TextMatcher::Regex(pattern)) => {
                parts.push(format!("regex:\"{}\"", pattern.as_str()));
            }
            None => {}
        }
        for field in &self.fields {
            parts.push(format!("{}{}{}", field.name, field.op.token(), field.value));
        }
        if !self.levels.is_empty() {
            let levels: Vec<&str> = self.levels.iter().map(String::as_str).collect();
            parts.push(format!("levels:[{}]", levels.join(" ")));
        }
        if !self.sources.is_empty() {
            let sources: Vec<&str> = self.sources.iter().map(String::as_str).collect();
            parts.push(format!("sources:[{}]", sources.join(" ")));
        }
        if let Some(range) = &self.time_range {
            parts.push(format!(
                "time:{} to {}",
                range.start.format("%H:%M:%S"),
                range.end.format("%H:%M:%S")
            ));
        }
        if parts.is_empty() {
            "No filter".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// A compiled filter: flat predicate for simple queries, expression tree
/// for advanced ones.
#[derive(Debug, Clone)]
pub enum CompiledQuery {
    Simple(SimpleFilter),
    Tree(QueryExpr),
}

/// Holds the current compiled query and the last-submitted raw string.
#[derive(Debug, Default)]
pub struct FilterEngine {
    compiled: Option<CompiledQuery>,
    last_query: String,
    shortcuts: BTreeMap<String, String>,
}

impl FilterEngine {
    pub fn new() -> Self {
        let mut engine = FilterEngine::default();
        for (word, expansion) in DEFAULT_SHORTCUTS {
            engine
                .shortcuts
                .insert((*word).to_string(), (*expansion).to_string());
        }
        engine
    }

    /// Merge configuration-provided shortcuts over the defaults.
    pub fn extend_shortcuts(&mut self, extra: &BTreeMap<String, String>) {
        for (word, expansion) in extra {
            self.shortcuts.insert(word.clone(), expansion.clone());
        }
    }

    /// Expand a single-word shortcut; other queries pass through untouched.
    pub fn expand_shortcut<'a>(&'a self, raw: &'a str) -> &'a str {
        let trimmed = raw.trim();
        if trimmed.contains(char::is_whitespace) {
            return raw;
        }
        self.shortcuts
            .get(trimmed)
            .map(String::as_str)
            .unwrap_or(raw)
    }

    /// Whether a query needs the expression-tree compiler.
    pub fn is_advanced_query(query: &str) -> bool {
        let upper = query.to_ascii_uppercase();
        ADVANCED_MARKERS
            .iter()
            .any(|m| upper.contains(&m.to_ascii_uppercase()))
            || query.matches(':').count() > 1
    }

    /// Main entry point for user-typed queries: expand, classify, compile.
    /// An empty query clears the filter. On error the previous filter stays
    /// installed.
    pub fn set_query(&mut self, raw: &str) -> Result<(), QueryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.clear();
            return Ok(());
        }
        let expanded = self.expand_shortcut(trimmed).to_string();
        if Self::is_advanced_query(&expanded) {
            let tree = parse_query(&expanded)?;
            self.compiled = Some(CompiledQuery::Tree(tree));
        } else {
            let options = FilterOptions {
                is_regex: !expanded.contains(':') && has_regex_metachars(&expanded),
                query: expanded,
                ..FilterOptions::default()
            };
            let filter = SimpleFilter::compile(&options)?;
            self.compiled = (!filter.is_empty()).then_some(CompiledQuery::Simple(filter));
        }
        self.last_query = trimmed.to_string();
        Ok(())
    }

    /// Compile a flat predicate from explicit options (programmatic path).
    pub fn set_simple_filter(&mut self, options: &FilterOptions) -> Result<(), QueryError> {
        let filter = SimpleFilter::compile(options)?;
        self.compiled = (!filter.is_empty()).then_some(CompiledQuery::Simple(filter));
        self.last_query = options.query.trim().to_string();
        Ok(())
    }

    /// Parse an advanced query string and install the expression tree.
    pub fn set_advanced_filter(&mut self, query: &str) -> Result<(), QueryError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.clear();
            return Ok(());
        }
        let tree = parse_query(trimmed)?;
        self.compiled = Some(CompiledQuery::Tree(tree));
        self.last_query = trimmed.to_string();
        Ok(())
    }

    /// Drop any compiled state.
    pub fn clear(&mut self) {
        self.compiled = None;
        self.last_query.clear();
    }

    pub fn has_filter(&self) -> bool {
        self.compiled.is_some()
    }

    /// Last raw query string as submitted, for display.
    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    /// Whether the record satisfies the current filter; false when none is
    /// set.
    pub fn matches(&self, record: &LineRecord) -> bool {
        match &self.compiled {
            Some(CompiledQuery::Simple(filter)) => filter.matches(record),
            Some(CompiledQuery::Tree(tree)) => tree.matches(record),
            None => false,
        }
    }

    /// Syntactic check without committing state.
    pub fn validate(&self, query: &str, is_regex: bool) -> Result<(), QueryError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        let expanded = self.expand_shortcut(trimmed);
        if is_regex && !expanded.contains(':') {
            Regex::new(expanded).map_err(|e| QueryError::Regex(e.to_string()))?;
            return Ok(());
        }
        if Self::is_advanced_query(expanded) {
            parse_query(expanded)?;
            return Ok(());
        }
        let options = FilterOptions {
            is_regex: !expanded.contains(':') && has_regex_metachars(expanded),
            query: expanded.to_string(),
            ..FilterOptions::default()
        };
        SimpleFilter::compile(&options)?;
        Ok(())
    }

    /// Short human-readable description for the status bar.
    pub fn summary(&self) -> String {
        match &self.compiled {
            None => "No filter".to_string(),
            Some(CompiledQuery::Simple(filter)) => filter.summary(),
            Some(CompiledQuery::Tree(_)) => format!("query:\"{}\"", self.last_query),
        }
    }

    /// Indices of matching records, oldest-to-newest.
    #[allow(dead_code)] // Public API for external use and tests
    pub fn matching_indices(&self, records: &[Arc<LineRecord>]) -> Vec<usize> {
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| self.matches(r))
            .map(|(i, _)| i)
            .collect()
    }

    #[allow(dead_code)] // Public API for external use and tests
    pub fn match_count(&self, records: &[Arc<LineRecord>]) -> usize {
        records.iter().filter(|r| self.matches(r)).count()
    }
}

fn has_regex_metachars(query: &str) -> bool {
    query.contains(REGEX_METACHARS)
}

/// Split a query string on whitespace, keeping quoted sections and
/// parenthesized groups together.
fn split_query_parts(query: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    for ch in query.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '(' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
