//! Per-line parser: recognizes structured records and extracts timestamps
//! and levels.
//!
//! Parsing is a pipeline of recognizers tried in order with short-circuit on
//! success: JSON object form, single-line `key: value` block form, then a
//! regex fallback for unstructured text. The parser never fails; a line that
//! matches nothing simply keeps its fields empty. `parse` is deterministic
//! and idempotent.

use crate::record::{LineRecord, LogLevel};
use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDateTime, TimeZone};
use regex::Regex;
use serde_json::{Map, Number, Value};

/// Ordered keys probed for a timestamp in structured records.
const TIMESTAMP_KEYS: &[&str] = &[
    "timestamp",
    "time",
    "ts",
    "@timestamp",
    "datetime",
    "created_at",
    "logged_at",
];

/// Ordered keys probed for a level in structured records.
const LEVEL_KEYS: &[&str] = &["level", "severity", "priority", "loglevel", "log_level"];

/// Markers that make a line look like timestamped plain text rather than a
/// key-value block (`14:30:22 ERROR: boom`).
const LEVEL_LINE_MARKERS: &[&str] = &[" INFO:", " DEBUG:", " WARN:", " ERROR:", " FATAL:"];

/// A single recognition stage. Stages are composed by iteration so each one
/// stays testable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognizer {
    /// `{...}` parsed as a JSON object.
    JsonObject,
    /// Single-line `key: value` mapping with at least two entries.
    BlockMapping,
    /// Regex extraction of timestamp and level from free text.
    Unstructured,
}

pub struct LineParser {
    recognizers: Vec<Recognizer>,
    timestamp_patterns: Vec<Regex>,
    level_patterns: Vec<Regex>,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        LineParser {
            recognizers: vec![
                Recognizer::JsonObject,
                Recognizer::BlockMapping,
                Recognizer::Unstructured,
            ],
            timestamp_patterns: compile_timestamp_patterns(),
            level_patterns: compile_level_patterns(),
        }
    }

    /// Populate `parsed`, `timestamp` and `level` in place. Never fails.
    pub fn parse(&self, record: &mut LineRecord) {
        if record.raw.is_empty() {
            return;
        }
        for recognizer in &self.recognizers {
            if self.apply(*recognizer, record) {
                break;
            }
        }
    }

    /// Run one recognition stage; returns true when the stage accepted the
    /// line.
    pub fn apply(&self, recognizer: Recognizer, record: &mut LineRecord) -> bool {
        match recognizer {
            Recognizer::JsonObject => self.try_json_object(record),
            Recognizer::BlockMapping => self.try_block_mapping(record),
            Recognizer::Unstructured => {
                self.extract_unstructured(record);
                true
            }
        }
    }

    fn try_json_object(&self, record: &mut LineRecord) -> bool {
        let trimmed = record.raw.trim();
        if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
            return false;
        }
        let parsed: Map<String, Value> = match serde_json::from_str(trimmed) {
            Ok(Value::Object(map)) => map,
            _ => return false,
        };
        self.fill_from_mapping(record, parsed);
        true
    }

    fn try_block_mapping(&self, record: &mut LineRecord) -> bool {
        let trimmed = record.raw.trim();
        if !trimmed.contains(':') {
            return false;
        }
        // Timestamped text lines ("... ERROR: boom") are not key-value blocks.
        if LEVEL_LINE_MARKERS.iter().any(|m| trimmed.contains(m)) {
            return false;
        }
        let parsed = match parse_block_mapping(trimmed) {
            Some(map) if map.len() >= 2 => map,
            _ => return false,
        };
        self.fill_from_mapping(record, parsed);
        true
    }

    fn fill_from_mapping(&self, record: &mut LineRecord, parsed: Map<String, Value>) {
        if let Some(ts) = self.timestamp_from_mapping(&parsed) {
            record.timestamp = Some(ts);
        }
        if let Some(level) = level_from_mapping(&parsed) {
            record.level = Some(level);
        }
        record.parsed = Some(parsed);
    }

    fn extract_unstructured(&self, record: &mut LineRecord) {
        if record.timestamp.is_none() {
            record.timestamp = self.extract_timestamp(&record.raw);
        }
        if record.level.is_none() {
            record.level = self.extract_level(&record.raw);
        }
    }

    fn timestamp_from_mapping(&self, parsed: &Map<String, Value>) -> Option<DateTime<Local>> {
        for key in TIMESTAMP_KEYS {
            if let Some(value) = parsed.get(*key) {
                if let Some(ts) = parse_timestamp_value(value) {
                    return Some(ts);
                }
            }
        }
        None
    }

    /// First timestamp pattern with a parseable match wins.
    pub fn extract_timestamp(&self, text: &str) -> Option<DateTime<Local>> {
        for pattern in &self.timestamp_patterns {
            if let Some(found) = pattern.find(text) {
                if let Some(ts) = parse_timestamp_str(found.as_str()) {
                    return Some(ts);
                }
            }
        }
        None
    }

    /// First level pattern with a match wins.
    pub fn extract_level(&self, text: &str) -> Option<LogLevel> {
        for pattern in &self.level_patterns {
            if let Some(caps) = pattern.captures(text) {
                if let Some(token) = caps.get(1) {
                    if let Some(level) = LogLevel::from_token(token.as_str()) {
                        return Some(level);
                    }
                }
            }
        }
        None
    }

    /// Whether the record carries a non-empty parsed mapping.
    #[allow(dead_code)] // Public API for external use and tests
    pub fn is_structured(&self, record: &LineRecord) -> bool {
        record.parsed.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// Traverse a dotted path (`a.b.c`) through nested mappings, returning the
/// terminal value. Used by the filter engine for field queries on structured
/// logs.
pub fn get_parsed_field<'a>(record: &'a LineRecord, path: &str) -> Option<&'a Value> {
    let parsed = record.parsed.as_ref()?;
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = parsed.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Parse a single-line `key: value` mapping. Flow-style braces are allowed;
/// entries are comma-separated; keys must be bare words. Values are typed as
/// bool, number or string.
fn parse_block_mapping(trimmed: &str) -> Option<Map<String, Value>> {
    let body = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);

    let mut map = Map::new();
    for part in body.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once(':')?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        map.insert(key.to_string(), type_scalar(value.trim()));
    }
    Some(map)
}

/// Give a scalar its natural JSON type.
fn type_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    Value::String(unquoted.to_string())
}

fn level_from_mapping(parsed: &Map<String, Value>) -> Option<LogLevel> {
    for key in LEVEL_KEYS {
        if let Some(Value::String(raw)) = parsed.get(*key) {
            if let Some(level) = LogLevel::from_token(raw) {
                return Some(level);
            }
        }
    }
    None
}

/// Accept string timestamps, integer seconds, floating seconds, or an
/// RFC3339 string. Everything is converted into the local timezone.
fn parse_timestamp_value(value: &Value) -> Option<DateTime<Local>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                return local_from_timestamp(secs, 0);
            }
            let f = n.as_f64()?;
            let secs = f.trunc() as i64;
            let nanos = ((f - f.trunc()) * 1e9) as u32;
            local_from_timestamp(secs, nanos)
        }
        _ => None,
    }
}

fn local_from_timestamp(secs: i64, nanos: u32) -> Option<DateTime<Local>> {
    match Local.timestamp_opt(secs, nanos) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(t, _) => Some(t),
        LocalResult::None => None,
    }
}

fn naive_to_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        // DST gap or fold: take whatever the local time library offers first.
        LocalResult::Ambiguous(t, _) => Some(t),
        LocalResult::None => None,
    }
}

/// Naive formats tried after the offset-carrying ones.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
];

/// Parse a timestamp string in any of the accepted formats: RFC3339 and
/// RFC3339-nano, `YYYY-MM-DD HH:MM:SS[.sss]`, `YYYY/MM/DD HH:MM:SS`, syslog
/// (`Jan  2 15:04:05`, current year assumed), Apache
/// (`02/Jan/2006:15:04:05 -0700`) and Unix date.
pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Local));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%d/%b/%Y:%H:%M:%S %z"] {
        if let Ok(t) = DateTime::parse_from_str(s, format) {
            return Some(t.with_timezone(&Local));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return naive_to_local(naive);
        }
    }
    // Syslog style carries no year; assume the current one.
    let with_year = format!("{} {}", Local::now().year(), s);
    if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S") {
        return naive_to_local(naive);
    }
    None
}

fn compile_timestamp_patterns() -> Vec<Regex> {
    [
        // ISO 8601
        r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
        // Slash-separated
        r"\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}",
        // Apache access log
        r"\d{2}/\w{3}/\d{4}:\d{2}:\d{2}:\d{2} [+-]\d{4}",
        // Unix date (before syslog: the syslog pattern is a prefix of it)
        r"\w{3} \w{3} {1,2}\d{1,2} \d{2}:\d{2}:\d{2} \d{4}",
        // Syslog
        r"\w{3} {1,2}\d{1,2} \d{2}:\d{2}:\d{2}",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

fn compile_level_patterns() -> Vec<Regex> {
    [
        r"(?i)\b(TRACE|DEBUG|INFO|WARN|WARNING|ERROR|FATAL|PANIC)\b",
        r"(?i)\[(TRACE|DEBUG|INFO|WARN|WARNING|ERROR|FATAL|PANIC)\]",
        r#"(?i)"(?:level|severity)"\s*:\s*"(TRACE|DEBUG|INFO|WARN|WARNING|ERROR|FATAL|PANIC)""#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}
