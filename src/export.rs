//! Export of record slices to text, JSON, CSV and HTML, plus session
//! persistence.
//!
//! Exporters consume a stable-ordered slice of the store and never touch
//! live state. CSV quoting follows RFC4180 (double quotes escaped by
//! doubling); the HTML output is a self-contained dark-themed document.

use crate::record::{LineRecord, SessionState, TimeRange};
use chrono::Local;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
    Html,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "html" => Ok(ExportFormat::Html),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Text => "text",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum ExportError {
    /// Nothing to export.
    Empty,
    UnsupportedFormat(String),
    Io(io::Error),
    Encode(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Empty => write!(f, "no lines to export"),
            ExportError::UnsupportedFormat(name) => {
                write!(f, "unsupported export format: {}", name)
            }
            ExportError::Io(e) => write!(f, "export I/O error: {}", e),
            ExportError::Encode(msg) => write!(f, "export encoding error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ExportError {
    fn from(e: io::Error) -> Self {
        ExportError::Io(e)
    }
}

/// Options controlling a single export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Write the raw line verbatim instead of the formatted
    /// timestamp/source/level prefix (text format only).
    pub include_raw: bool,
    /// Include the parsed mapping (CSV column / HTML detail block).
    pub include_parsed: bool,
    pub time_range: Option<TimeRange>,
    /// Free-form metadata written into headers.
    pub metadata: BTreeMap<String, String>,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("tool".to_string(), "traceace".to_string());
        ExportOptions {
            format,
            include_raw: true,
            include_parsed: false,
            time_range: None,
            metadata,
        }
    }
}

/// Export records to `path`, creating parent directories as needed.
pub fn export_lines(
    path: &Path,
    records: &[Arc<LineRecord>],
    options: &ExportOptions,
) -> Result<usize, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // The time-range cut considers only parsed timestamps.
    let filtered: Vec<&Arc<LineRecord>> = match &options.time_range {
        Some(range) => records
            .iter()
            .filter(|r| r.timestamp.is_some_and(|ts| range.contains(ts)))
            .collect(),
        None => records.iter().collect(),
    };

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    match options.format {
        ExportFormat::Text => write_text(&mut writer, &filtered, options)?,
        ExportFormat::Json => write_json(&mut writer, &filtered, options)?,
        ExportFormat::Csv => write_csv(&mut writer, &filtered, options)?,
        ExportFormat::Html => write_html(&mut writer, &filtered, options)?,
    }
    writer.flush()?;
    Ok(filtered.len())
}

fn write_text<W: Write>(
    w: &mut W,
    records: &[&Arc<LineRecord>],
    options: &ExportOptions,
) -> Result<(), ExportError> {
    if !options.metadata.is_empty() {
        writeln!(w, "# Export Metadata")?;
        for (key, value) in &options.metadata {
            writeln!(w, "# {}: {}", key, value)?;
        }
        writeln!(w, "# exported_at: {}", Local::now().to_rfc3339())?;
        writeln!(w, "# total_lines: {}", records.len())?;
        writeln!(w)?;
    }
    for record in records {
        if options.include_raw {
            writeln!(w, "{}", record.raw)?;
        } else {
            writeln!(w, "{}", format_line_for_text(record))?;
        }
    }
    Ok(())
}

fn format_line_for_text(record: &LineRecord) -> String {
    let mut parts = Vec::new();
    parts.push(
        record
            .display_timestamp()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    );
    parts.push(format!("[{}]", record.source.display()));
    if record.level.is_some() {
        parts.push(format!("{}:", record.level_str()));
    }
    parts.push(record.raw.clone());
    parts.join(" ")
}

fn write_json<W: Write>(
    w: &mut W,
    records: &[&Arc<LineRecord>],
    options: &ExportOptions,
) -> Result<(), ExportError> {
    let mut metadata = json!({
        "exported_at": Local::now().to_rfc3339(),
        "total_lines": records.len(),
        "format": options.format.to_string(),
        "options": {
            "include_raw": options.include_raw,
            "include_parsed": options.include_parsed,
        },
    });
    if let Some(map) = metadata.as_object_mut() {
        for (key, value) in &options.metadata {
            map.insert(key.clone(), json!(value));
        }
    }
    let export = json!({
        "metadata": metadata,
        "lines": records,
    });
    serde_json::to_writer_pretty(&mut *w, &export)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    writeln!(w)?;
    Ok(())
}

fn write_csv<W: Write>(
    w: &mut W,
    records: &[&Arc<LineRecord>],
    options: &ExportOptions,
) -> Result<(), ExportError> {
    let mut header = vec!["timestamp", "source", "level", "raw"];
    if options.include_parsed {
        header.push("parsed_json");
    }
    writeln!(w, "{}", header.join(","))?;

    for record in records {
        let mut row = vec![
            escape_csv(&record.display_timestamp().to_rfc3339()),
            escape_csv(&record.source.to_string_lossy()),
            escape_csv(record.level_str()),
            escape_csv(&record.raw),
        ];
        if options.include_parsed {
            let parsed = match &record.parsed {
                Some(map) => serde_json::to_string(map)
                    .map_err(|e| ExportError::Encode(e.to_string()))?,
                None => String::new(),
            };
            row.push(escape_csv(&parsed));
        }
        writeln!(w, "{}", row.join(","))?;
    }
    Ok(())
}

fn write_html<W: Write>(
    w: &mut W,
    records: &[&Arc<LineRecord>],
    options: &ExportOptions,
) -> Result<(), ExportError> {
    w.write_all(HTML_HEADER.as_bytes())?;

    writeln!(w, r#"        <div class="metadata">"#)?;
    writeln!(w, "            <h2>Export Information</h2>")?;
    writeln!(
        w,
        "            <p>Exported at: {}</p>",
        Local::now().to_rfc3339()
    )?;
    writeln!(w, "            <p>Total lines: {}</p>", records.len())?;
    for (key, value) in &options.metadata {
        writeln!(
            w,
            "            <p>{}: {}</p>",
            escape_html(key),
            escape_html(value)
        )?;
    }
    writeln!(w, "        </div>")?;

    writeln!(w, r#"        <div class="log-lines">"#)?;
    for record in records {
        writeln!(w, r#"            <div class="log-line">"#)?;
        if let Some(ts) = record.timestamp {
            writeln!(
                w,
                r#"                <span class="timestamp">{}</span>"#,
                ts.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        writeln!(
            w,
            r#"                <span class="source">[{}]</span>"#,
            escape_html(&record.source.to_string_lossy())
        )?;
        if let Some(level) = record.level {
            writeln!(
                w,
                r#"                <span class="level-{}">{}</span>"#,
                level.as_str().to_ascii_lowercase(),
                level.as_str()
            )?;
        }
        writeln!(
            w,
            r#"                <span class="raw-text">{}</span>"#,
            escape_html(&record.raw)
        )?;
        if options.include_parsed {
            if let Some(parsed) = &record.parsed {
                let pretty = serde_json::to_string_pretty(parsed)
                    .map_err(|e| ExportError::Encode(e.to_string()))?;
                writeln!(
                    w,
                    r#"                <div class="parsed-data">{}</div>"#,
                    escape_html(&pretty)
                )?;
            }
        }
        writeln!(w, "            </div>")?;
    }
    writeln!(w, "        </div>")?;
    w.write_all(HTML_FOOTER.as_bytes())?;
    Ok(())
}

const HTML_HEADER: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Log Export</title>
    <meta charset="utf-8">
    <style>
        body { font-family: monospace; background-color: #1e1e1e; color: #d4d4d4; }
        .container { max-width: 1200px; margin: 0 auto; padding: 20px; }
        .metadata { background-color: #2d2d30; padding: 15px; border-radius: 5px; margin-bottom: 20px; }
        .log-line { padding: 5px; border-bottom: 1px solid #404040; }
        .log-line:hover { background-color: #2d2d30; }
        .timestamp { color: #4fc1ff; }
        .source { color: #ce9178; }
        .level-trace { color: #808080; }
        .level-debug { color: #9cdcfe; }
        .level-info { color: #4ec9b0; }
        .level-warn { color: #dcdcaa; }
        .level-error { color: #f44747; }
        .level-fatal { color: #ff00ff; }
        .raw-text { white-space: pre-wrap; }
        .parsed-data { background-color: #0f1419; padding: 10px; margin-top: 5px; border-left: 3px solid #007acc; }
    </style>
</head>
<body>
    <div class="container">
"#;

const HTML_FOOTER: &str = r#"    </div>
</body>
</html>
"#;

/// RFC4180 quoting: wrap when the value contains a comma, quote or newline,
/// escaping quotes by doubling them.
fn escape_csv(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Write the session state as pretty JSON.
pub fn export_session(path: &Path, session: &SessionState) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, session)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

/// Read a session state back from JSON.
#[allow(dead_code)] // Public API for external use and tests
pub fn import_session(path: &Path) -> Result<SessionState, ExportError> {
    let file = File::open(path)?;
    serde_json::from_reader(file).map_err(|e| ExportError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LineParser;
    use crate::record::{FilterOptions, PaneKind, UiState};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sample_records() -> Vec<Arc<LineRecord>> {
        let parser = LineParser::new();
        let raws = [
            "2024-01-15 14:30:22 INFO started",
            r#"{"level":"error","status":502,"msg":"bad, gateway"}"#,
            "plain \"quoted\" text",
        ];
        raws.iter()
            .enumerate()
            .map(|(i, raw)| {
                let mut rec = LineRecord::new(
                    Path::new("app.log"),
                    i as u64 + 1,
                    Some(i as u64 * 10),
                    raw.to_string(),
                );
                parser.parse(&mut rec);
                Arc::new(rec)
            })
            .collect()
    }

    #[test]
    fn test_text_export_with_metadata_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let records = sample_records();
        let options = ExportOptions::new(ExportFormat::Text);
        let written = export_lines(&path, &records, &options).unwrap();
        assert_eq!(written, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Export Metadata"));
        assert!(content.contains("# tool: traceace"));
        assert!(content.contains("2024-01-15 14:30:22 INFO started"));
    }

    #[test]
    fn test_text_export_formatted_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let records = sample_records();
        let mut options = ExportOptions::new(ExportFormat::Text);
        options.include_raw = false;
        export_lines(&path, &records, &options).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[app.log]"));
        assert!(content.contains("INFO:"));
    }

    #[test]
    fn test_json_export_structure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        let records = sample_records();
        export_lines(&path, &records, &ExportOptions::new(ExportFormat::Json)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["total_lines"], 3);
        assert_eq!(value["metadata"]["format"], "json");
        assert_eq!(value["metadata"]["tool"], "traceace");
        let lines = value["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["line_num"], 1);
        assert_eq!(lines[1]["level"], "ERROR");
        assert_eq!(lines[1]["parsed"]["status"], 502);
    }

    #[test]
    fn test_csv_export_quoting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = sample_records();
        let mut options = ExportOptions::new(ExportFormat::Csv);
        options.include_parsed = true;
        export_lines(&path, &records, &options).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,source,level,raw,parsed_json"
        );
        // The comma inside the JSON message forces quoting, and the inner
        // quotes double.
        assert!(content.contains(r#""{""level"":""error"""#));
        assert!(content.contains(r#""plain ""quoted"" text""#));
    }

    #[test]
    fn test_html_export_is_self_contained() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.html");
        let records = sample_records();
        let mut options = ExportOptions::new(ExportFormat::Html);
        options.include_parsed = true;
        export_lines(&path, &records, &options).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<!DOCTYPE html>"));
        assert!(content.contains("class=\"level-error\""));
        assert!(content.contains("class=\"parsed-data\""));
        // Raw text is escaped.
        assert!(content.contains("plain &quot;quoted&quot; text"));
        assert!(content.ends_with("</html>\n"));
    }

    #[test]
    fn test_time_range_cut_skips_unparsed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let records = sample_records();
        let with_ts = records[0].timestamp.unwrap();
        let mut options = ExportOptions::new(ExportFormat::Text);
        options.time_range = Some(TimeRange {
            start: with_ts - chrono::Duration::seconds(1),
            end: with_ts + chrono::Duration::seconds(1),
        });
        let written = export_lines(&path, &records, &options).unwrap();
        // Only the timestamped line qualifies; the other two have no
        // parsed timestamp.
        assert_eq!(written, 1);
    }

    #[test]
    fn test_empty_export_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let err = export_lines(&path, &[], &ExportOptions::new(ExportFormat::Text));
        assert!(matches!(err, Err(ExportError::Empty)));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("TEXT".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("parquet".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_session_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = SessionState {
            sources: vec![PathBuf::from("a.log"), PathBuf::from("b.log")],
            bookmarks: Vec::new(),
            saved_queries: Vec::new(),
            last_filter: FilterOptions {
                query: "level:ERROR".into(),
                ..FilterOptions::default()
            },
            ui_state: UiState {
                active_pane: PaneKind::AllLogs,
                is_paused: true,
                selected_line: 10,
                scroll_offset: 4,
                filtered_count: 2,
                total_count: 40,
                current_filter: FilterOptions::default(),
            },
            last_accessed: Local::now(),
        };
        export_session(&path, &session).unwrap();
        let back = import_session(&path).unwrap();
        assert_eq!(back.sources, session.sources);
        assert!(back.ui_state.is_paused);
        assert_eq!(back.last_filter.query, "level:ERROR");
    }
}
