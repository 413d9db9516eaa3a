//! Core data model for log lines and session state.
//!
//! A [`LineRecord`] is created by the tailer, enriched exactly once by the
//! parser, then wrapped in an `Arc` and shared between the main and filtered
//! stores. `raw` is never mutated after creation.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Normalized log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Canonical display form (`TRACE` .. `FATAL`).
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Map a raw token to a normalized level. `WARNING` folds into `WARN`,
    /// `PANIC` into `FATAL`. Matching is case-insensitive.
    pub fn from_token(token: &str) -> Option<LogLevel> {
        match token.to_ascii_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            "FATAL" | "PANIC" => Some(LogLevel::Fatal),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a highlighted token within a raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Default,
    Timestamp,
    Level,
    Ip,
    StatusCode,
    Uuid,
    Url,
    Number,
    Quoted,
    Json,
    Keyword,
}

/// A highlighted span of a raw line (byte offsets into `raw`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// A single log entry with all associated metadata.
#[derive(Debug, Serialize)]
pub struct LineRecord {
    /// Unique id within the process lifetime: `<path>:<seq>`.
    pub id: String,
    /// Path of the file this line came from.
    pub source: PathBuf,
    /// Original raw text, newline stripped. Never mutated.
    pub raw: String,
    /// Parsed JSON / key-value mapping if the line is structured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Map<String, Value>>,
    /// Timestamp extracted by the parser. `None` when the line carries no
    /// recognizable timestamp; time-range filters only match parsed
    /// timestamps.
    pub timestamp: Option<DateTime<Local>>,
    /// Wall-clock arrival time, set by the tailer. Used as a provisional
    /// display value when no timestamp could be parsed.
    #[serde(skip)]
    pub received_at: DateTime<Local>,
    /// Normalized log level if one was detected.
    pub level: Option<LogLevel>,
    /// Byte offset of the start of this line in the source file.
    pub offset: Option<u64>,
    /// Per-file line number (monotonic, survives rotation).
    pub line_num: u64,
    /// Highlight tokens, populated lazily on first render.
    #[serde(skip)]
    pub tokens: OnceLock<Vec<Token>>,
}

impl LineRecord {
    /// Create a fresh record as emitted by the tailer. Parsing fields are
    /// left empty for the parser step.
    pub fn new(source: &Path, line_num: u64, offset: Option<u64>, raw: String) -> Self {
        LineRecord {
            id: format!("{}:{}", source.display(), line_num),
            source: source.to_path_buf(),
            raw,
            parsed: None,
            timestamp: None,
            received_at: Local::now(),
            level: None,
            offset,
            line_num,
            tokens: OnceLock::new(),
        }
    }

    /// Best timestamp for display and export: the parsed one when present,
    /// otherwise the arrival time.
    pub fn display_timestamp(&self) -> DateTime<Local> {
        self.timestamp.unwrap_or(self.received_at)
    }

    /// Level as a display string, empty when none was detected.
    pub fn level_str(&self) -> &'static str {
        self.level.map(|l| l.as_str()).unwrap_or("")
    }
}

/// A named pointer to a historical record. Bookmarks outlive the record they
/// point to; dereferencing one whose target was evicted yields nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub name: String,
    pub source: PathBuf,
    pub line_id: String,
    pub created_at: DateTime<Local>,
    /// Short excerpt of the target line for display.
    pub context: String,
}

/// A saved search query from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_regex: bool,
}

/// Inclusive time filter range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl TimeRange {
    /// Whether `ts` falls inside the range (inclusive on both ends).
    pub fn contains(&self, ts: DateTime<Local>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Flat search and filter configuration for simple queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub log_levels: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

/// Which pane currently receives keyboard navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneKind {
    AllLogs,
    Filtered,
}

/// UI state captured in a session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiState {
    pub active_pane: PaneKind,
    pub is_paused: bool,
    pub selected_line: usize,
    pub scroll_offset: usize,
    pub filtered_count: usize,
    pub total_count: usize,
    pub current_filter: FilterOptions,
}

/// Serializable session snapshot; round-trips through JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub sources: Vec<PathBuf>,
    pub bookmarks: Vec<Bookmark>,
    pub saved_queries: Vec<SavedQuery>,
    pub last_filter: FilterOptions,
    pub ui_state: UiState,
    pub last_accessed: DateTime<Local>,
}

/// Events emitted by file followers on the tailer channel.
#[derive(Debug)]
pub enum TailerEvent {
    /// A new line was read from a followed file.
    NewLine(LineRecord),
    /// The file was truncated or replaced; the follower reopened it.
    FileRotated(PathBuf),
    /// A non-fatal read or stat error. The follower keeps running.
    FileError { path: PathBuf, message: String },
    /// The follower caught up with the end of the file.
    Eof(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_token_canonical() {
        assert_eq!(LogLevel::from_token("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_token("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_token("panic"), Some(LogLevel::Fatal));
        assert_eq!(LogLevel::from_token("notice"), None);
    }

    #[test]
    fn test_record_id_includes_source_and_line() {
        let rec = LineRecord::new(Path::new("/var/log/app.log"), 42, Some(1024), "hello".into());
        assert_eq!(rec.id, "/var/log/app.log:42");
        assert_eq!(rec.line_num, 42);
        assert_eq!(rec.offset, Some(1024));
        assert!(rec.parsed.is_none());
        assert!(rec.timestamp.is_none());
    }

    #[test]
    fn test_display_timestamp_falls_back_to_arrival() {
        let mut rec = LineRecord::new(Path::new("a.log"), 1, None, "x".into());
        assert_eq!(rec.display_timestamp(), rec.received_at);
        let parsed = Local::now() - chrono::Duration::hours(1);
        rec.timestamp = Some(parsed);
        assert_eq!(rec.display_timestamp(), parsed);
    }

    #[test]
    fn test_time_range_inclusive_bounds() {
        let start = Local::now();
        let end = start + chrono::Duration::seconds(10);
        let range = TimeRange { start, end };
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_session_state_round_trip() {
        let session = SessionState {
            sources: vec![PathBuf::from("/var/log/app.log")],
            bookmarks: vec![Bookmark {
                id: "bm-1".into(),
                name: "deploy start".into(),
                source: PathBuf::from("/var/log/app.log"),
                line_id: "/var/log/app.log:17".into(),
                created_at: Local::now(),
                context: "starting deploy".into(),
            }],
            saved_queries: vec![SavedQuery {
                name: "errors".into(),
                query: "level:ERROR".into(),
                description: "error lines".into(),
                is_regex: false,
            }],
            last_filter: FilterOptions {
                query: "boom".into(),
                ..FilterOptions::default()
            },
            ui_state: UiState {
                active_pane: PaneKind::Filtered,
                is_paused: false,
                selected_line: 3,
                scroll_offset: 0,
                filtered_count: 1,
                total_count: 2,
                current_filter: FilterOptions::default(),
            },
            last_accessed: Local::now(),
        };

        let json = serde_json::to_string_pretty(&session).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sources, session.sources);
        assert_eq!(back.bookmarks[0].line_id, session.bookmarks[0].line_id);
        assert_eq!(back.saved_queries, session.saved_queries);
        assert_eq!(back.ui_state.active_pane, PaneKind::Filtered);
        assert_eq!(back.last_filter.query, "boom");
    }
}
