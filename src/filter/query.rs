//! Advanced query language: expression tree and parser.
//!
//! Queries combine field predicates (`level:ERROR`, `status:>=500`,
//! `source:~test`), text searches (bare words, `"quoted"` for
//! case-sensitive, `~regex`), and time ranges (`time:[start TO end]`) with
//! `AND`, `OR`, `NOT` and parentheses. Implicit `AND` applies between
//! adjacent primary expressions. Every regex in the tree is compiled at
//! construction, so evaluation is allocation-free on the text paths.
//!
//! ```text
//! (level:ERROR OR level:FATAL) AND NOT source:~test
//! status:>=500 "bad gateway"
//! time:[14:29:30 TO 14:30:30] level:WARN
//! ```

use crate::parser::get_parsed_field;
use crate::record::{LineRecord, TimeRange};
use chrono::{DateTime, Duration, Local, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Error compiling a query. The previously installed filter is preserved by
/// the engine when compilation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Grammar error: unbalanced parenthesis, empty expression, bad field
    /// form.
    Syntax(String),
    /// An embedded regex failed to compile.
    Regex(String),
    /// A time-range bound could not be parsed.
    TimeBound(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Syntax(msg) => write!(f, "query syntax error: {}", msg),
            QueryError::Regex(msg) => write!(f, "invalid regex: {}", msg),
            QueryError::TimeBound(msg) => write!(f, "invalid time bound: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    NotEq,
    Regex,
    Gt,
    Lt,
    Ge,
    Le,
}

impl FieldOp {
    /// The query-language token for this operator.
    pub fn token(&self) -> &'static str {
        match self {
            FieldOp::Eq => ":",
            FieldOp::NotEq => ":!=",
            FieldOp::Regex => ":~",
            FieldOp::Gt => ":>",
            FieldOp::Lt => ":<",
            FieldOp::Ge => ":>=",
            FieldOp::Le => ":<=",
        }
    }
}

/// Built-in field names resolve directly against record metadata; anything
/// else goes through the parser's dotted-path lookup on `parsed`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldLookup {
    Level,
    Source,
    Message,
    Timestamp,
    Id,
    LineNum,
    Offset,
    Parsed,
}

impl FieldLookup {
    fn for_name(name: &str) -> FieldLookup {
        match name.to_ascii_lowercase().as_str() {
            "level" | "severity" | "lvl" => FieldLookup::Level,
            "source" | "file" | "src" => FieldLookup::Source,
            "message" | "msg" | "text" | "raw" => FieldLookup::Message,
            "timestamp" | "time" | "ts" => FieldLookup::Timestamp,
            "id" => FieldLookup::Id,
            "line" | "linenum" => FieldLookup::LineNum,
            "offset" => FieldLookup::Offset,
            _ => FieldLookup::Parsed,
        }
    }
}

/// Substring or regex match against the raw line.
#[derive(Debug, Clone)]
pub struct TextPredicate {
    pub text: String,
    pub case_sensitive: bool,
    pub pattern: Option<Regex>,
}

impl TextPredicate {
    pub fn substring(text: &str, case_sensitive: bool) -> Self {
        TextPredicate {
            text: text.to_string(),
            case_sensitive,
            pattern: None,
        }
    }

    /// Case-insensitive regex text search (the `~` prefix form).
    pub fn regex(pattern: &str) -> Result<Self, QueryError> {
        let compiled = Regex::new(&format!("(?i){}", pattern))
            .map_err(|e| QueryError::Regex(e.to_string()))?;
        Ok(TextPredicate {
            text: pattern.to_string(),
            case_sensitive: false,
            pattern: Some(compiled),
        })
    }

    pub fn matches(&self, raw: &str) -> bool {
        if let Some(pattern) = &self.pattern {
            return pattern.is_match(raw);
        }
        if self.case_sensitive {
            raw.contains(self.text.as_str())
        } else {
            contains_ignore_ascii_case(raw, &self.text)
        }
    }
}

/// `field:op value` predicate with the lookup resolved at construction.
#[derive(Debug, Clone)]
pub struct FieldPredicate {
    pub name: String,
    pub op: FieldOp,
    pub value: String,
    pub pattern: Option<Regex>,
    lookup: FieldLookup,
}

impl FieldPredicate {
    pub fn new(name: &str, op: FieldOp, value: &str) -> Result<Self, QueryError> {
        let pattern = if op == FieldOp::Regex {
            Some(Regex::new(value).map_err(|e| QueryError::Regex(e.to_string()))?)
        } else {
            None
        };
        Ok(FieldPredicate {
            lookup: FieldLookup::for_name(name),
            name: name.to_string(),
            op,
            value: value.to_string(),
            pattern,
        })
    }

    pub fn matches(&self, record: &LineRecord) -> bool {
        let value = self.resolve(record);
        match self.op {
            FieldOp::Eq => value.eq_ignore_ascii_case(&self.value),
            FieldOp::NotEq => !value.eq_ignore_ascii_case(&self.value),
            FieldOp::Regex => self
                .pattern
                .as_ref()
                .is_some_and(|p| p.is_match(value.as_ref())),
            FieldOp::Gt | FieldOp::Lt | FieldOp::Ge | FieldOp::Le => {
                compare(value.as_ref(), &self.value, self.op)
            }
        }
    }

    fn resolve<'a>(&self, record: &'a LineRecord) -> Cow<'a, str> {
        match self.lookup {
            FieldLookup::Level => Cow::Borrowed(record.level_str()),
            FieldLookup::Source => record.source.to_string_lossy(),
            FieldLookup::Message => Cow::Borrowed(record.raw.as_str()),
            // Only parser-extracted timestamps take part in comparisons.
            FieldLookup::Timestamp => match record.timestamp {
                Some(ts) => Cow::Owned(ts.to_rfc3339()),
                None => Cow::Borrowed(""),
            },
            FieldLookup::Id => Cow::Borrowed(record.id.as_str()),
            FieldLookup::LineNum => Cow::Owned(record.line_num.to_string()),
            FieldLookup::Offset => Cow::Owned(record.offset.unwrap_or(0).to_string()),
            FieldLookup::Parsed => match get_parsed_field(record, &self.name) {
                Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
                Some(Value::Bool(true)) => Cow::Borrowed("true"),
                Some(Value::Bool(false)) => Cow::Borrowed("false"),
                Some(Value::Number(n)) => Cow::Owned(n.to_string()),
                Some(other) => Cow::Owned(other.to_string()),
                None => Cow::Borrowed(""),
            },
        }
    }
}

/// Numeric comparison when both sides parse as numbers, lexicographic
/// otherwise.
fn compare(field: &str, query: &str, op: FieldOp) -> bool {
    if let (Ok(a), Ok(b)) = (field.parse::<f64>(), query.parse::<f64>()) {
        return match op {
            FieldOp::Gt => a > b,
            FieldOp::Lt => a < b,
            FieldOp::Ge => a >= b,
            FieldOp::Le => a <= b,
            _ => false,
        };
    }
    match op {
        FieldOp::Gt => field > query,
        FieldOp::Lt => field < query,
        FieldOp::Ge => field >= query,
        FieldOp::Le => field <= query,
        _ => false,
    }
}

/// Allocation-free ASCII case-insensitive substring search.
pub(crate) fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

/// Rooted query expression tree. Boolean nodes short-circuit.
#[derive(Debug, Clone)]
pub enum QueryExpr {
    And(Box<QueryExpr>, Box<QueryExpr>),
    Or(Box<QueryExpr>, Box<QueryExpr>),
    Not(Box<QueryExpr>),
    Text(TextPredicate),
    Field(FieldPredicate),
    TimeRange(TimeRange),
}

impl QueryExpr {
    pub fn matches(&self, record: &LineRecord) -> bool {
        match self {
            QueryExpr::And(left, right) => left.matches(record) && right.matches(record),
            QueryExpr::Or(left, right) => left.matches(record) || right.matches(record),
            QueryExpr::Not(inner) => !inner.matches(record),
            QueryExpr::Text(text) => text.matches(&record.raw),
            QueryExpr::Field(field) => field.matches(record),
            // Records without a parsed timestamp never match a time range.
            QueryExpr::TimeRange(range) => record.timestamp.is_some_and(|ts| range.contains(ts)),
        }
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpr::And(l, r) => write!(f, "({} AND {})", l, r),
            QueryExpr::Or(l, r) => write!(f, "({} OR {})", l, r),
            QueryExpr::Not(inner) => write!(f, "NOT {}", inner),
            QueryExpr::Text(t) => {
                if t.pattern.is_some() {
                    write!(f, "~{}", t.text)
                } else if t.case_sensitive {
                    write!(f, "\"{}\"", t.text)
                } else {
                    write!(f, "{}", t.text)
                }
            }
            QueryExpr::Field(p) => {
                if p.value.contains(' ') {
                    write!(f, "{}{}\"{}\"", p.name, p.op.token(), p.value)
                } else {
                    write!(f, "{}{}{}", p.name, p.op.token(), p.value)
                }
            }
            QueryExpr::TimeRange(range) => write!(
                f,
                "time:[{} TO {}]",
                range.start.format("%Y-%m-%d %H:%M:%S"),
                range.end.format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }
}

/// Parse an advanced query string into an expression tree.
pub fn parse_query(input: &str) -> Result<QueryExpr, QueryError> {
    let mut parser = QueryParser {
        input: input.trim(),
        pos: 0,
    };
    let expr = parser.parse_expression()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(QueryError::Syntax(format!(
            "unexpected input at position {}: '{}'",
            parser.pos,
            &parser.input[parser.pos..]
        )));
    }
    Ok(expr)
}

struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> QueryParser<'a> {
    fn byte(&self, at: usize) -> Option<u8> {
        self.input.as_bytes().get(at).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.byte(self.pos), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    /// OR has the lowest precedence.
    fn parse_expression(&mut self) -> Result<QueryExpr, QueryError> {
        let mut left = self.parse_and_expression()?;
        loop {
            self.skip_whitespace();
            if !self.match_keyword("OR") {
                break;
            }
            let right = self.parse_and_expression()?;
            left = QueryExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Explicit `AND`, or implicit AND between adjacent primary expressions.
    fn parse_and_expression(&mut self) -> Result<QueryExpr, QueryError> {
        let mut left = self.parse_unary_expression()?;
        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                break;
            }
            if !self.match_keyword("AND") && !self.lookahead_is_expression() {
                break;
            }
            let right = self.parse_unary_expression()?;
            left = QueryExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<QueryExpr, QueryError> {
        self.skip_whitespace();
        if self.match_keyword("NOT") {
            let inner = self.parse_unary_expression()?;
            return Ok(QueryExpr::Not(Box::new(inner)));
        }
        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> Result<QueryExpr, QueryError> {
        self.skip_whitespace();
        if self.pos >= self.input.len() {
            return Err(QueryError::Syntax("unexpected end of query".into()));
        }
        if self.byte(self.pos) == Some(b'(') {
            self.pos += 1;
            let expr = self.parse_expression()?;
            self.skip_whitespace();
            if self.byte(self.pos) != Some(b')') {
                return Err(QueryError::Syntax("missing closing parenthesis".into()));
            }
            self.pos += 1;
            return Ok(expr);
        }

        let token = self.parse_token();
        if token.is_empty() {
            return Err(QueryError::Syntax("empty expression".into()));
        }
        if token.starts_with("time:[") {
            return parse_time_range(token).map(QueryExpr::TimeRange);
        }
        if token.contains(':') {
            return parse_field_expression(token).map(QueryExpr::Field);
        }
        parse_text_expression(token).map(QueryExpr::Text)
    }

    /// Whole-word, case-insensitive keyword match that consumes on success.
    fn match_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let end = self.pos + keyword.len();
        if end > self.input.len() {
            return false;
        }
        if !self.input[self.pos..end].eq_ignore_ascii_case(keyword) {
            return false;
        }
        if let Some(next) = self.byte(end) {
            if next.is_ascii_alphanumeric() || next == b'_' {
                return false;
            }
        }
        self.pos = end;
        true
    }

    /// Read one token: a quoted string, a bracketed `time:[...]` form, or a
    /// bare word (which may contain an embedded quoted section, as in
    /// `msg:"bad gateway"`).
    fn parse_token(&mut self) -> &'a str {
        self.skip_whitespace();
        let start = self.pos;
        if self.pos >= self.input.len() {
            return "";
        }

        if self.byte(self.pos) == Some(b'"') {
            self.pos += 1;
            while self.pos < self.input.len() && self.byte(self.pos) != Some(b'"') {
                self.pos += 1;
            }
            if self.pos < self.input.len() {
                self.pos += 1;
            }
            return &self.input[start..self.pos];
        }

        if self.input[self.pos..].starts_with("time:[") {
            let mut depth = 0;
            while self.pos < self.input.len() {
                match self.byte(self.pos) {
                    Some(b'[') => depth += 1,
                    Some(b']') => {
                        depth -= 1;
                        if depth == 0 {
                            self.pos += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                self.pos += 1;
            }
            return &self.input[start..self.pos];
        }

        while self.pos < self.input.len() {
            match self.byte(self.pos) {
                Some(b' ') | Some(b'\t') | Some(b'(') | Some(b')') => break,
                Some(b'"') => {
                    // Embedded quoted value: consume through the closing
                    // quote so `msg:"bad gateway"` stays one token.
                    self.pos += 1;
                    while self.pos < self.input.len() && self.byte(self.pos) != Some(b'"') {
                        self.pos += 1;
                    }
                    if self.pos < self.input.len() {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        &self.input[start..self.pos]
    }

    /// Does the next token look like the start of another primary
    /// expression? Decides implicit AND.
    fn lookahead_is_expression(&mut self) -> bool {
        let saved = self.pos;
        let token = self.parse_token();
        self.pos = saved;
        !token.is_empty()
            && (token.contains(':')
                || token.starts_with("time:[")
                || token.starts_with('~')
                || token.starts_with('"')
                || token.eq_ignore_ascii_case("NOT"))
    }
}

/// Operators ordered so longer forms win over their prefixes (`:>=` before
/// `:>`).
const FIELD_OPERATORS: &[(&str, FieldOp)] = &[
    (":!=", FieldOp::NotEq),
    (":>=", FieldOp::Ge),
    (":<=", FieldOp::Le),
    (":~", FieldOp::Regex),
    (":>", FieldOp::Gt),
    (":<", FieldOp::Lt),
    (":", FieldOp::Eq),
];

/// Parse a `field:opvalue` token, e.g. `status:>=500` or `msg:"bad gateway"`.
pub fn parse_field_expression(token: &str) -> Result<FieldPredicate, QueryError> {
    for (text, op) in FIELD_OPERATORS {
        if let Some(idx) = token.find(text) {
            let field = &token[..idx];
            let value = &token[idx + text.len()..];
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            if field.is_empty() || value.is_empty() {
                return Err(QueryError::Syntax(format!(
                    "invalid field expression: {}",
                    token
                )));
            }
            return FieldPredicate::new(field, *op, value);
        }
    }
    Err(QueryError::Syntax(format!(
        "invalid field expression: {}",
        token
    )))
}

fn parse_text_expression(token: &str) -> Result<TextPredicate, QueryError> {
    if let Some(pattern) = token.strip_prefix('~') {
        return TextPredicate::regex(pattern);
    }
    if let Some(inner) = token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        // Quoted text searches are exact, so case-sensitive.
        return Ok(TextPredicate::substring(inner, true));
    }
    Ok(TextPredicate::substring(token, false))
}

/// Parse a `time:[start TO end]` token.
pub fn parse_time_range(token: &str) -> Result<TimeRange, QueryError> {
    let inner = token
        .strip_prefix("time:[")
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| QueryError::TimeBound(format!("invalid time range: {}", token)))?;
    let (start, end) = inner.split_once(" TO ").ok_or_else(|| {
        QueryError::TimeBound("time range must have the form time:[start TO end]".into())
    })?;
    Ok(TimeRange {
        start: parse_time_bound(start.trim())?,
        end: parse_time_bound(end.trim())?,
    })
}

/// Parse one time-range bound. Accepted forms: `HH:MM:SS` (today, local
/// timezone), `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS[Z]`, RFC3339, and
/// the dynamic forms `now`, `now-<N>{h,m,s}` and `today HH:MM:SS` used by
/// query shortcuts.
pub fn parse_time_bound(raw: &str) -> Result<DateTime<Local>, QueryError> {
    // The shortcut table spells minus with U+2212.
    let normalized = raw.trim().replace('\u{2212}', "-");
    let s = normalized.as_str();

    if s.eq_ignore_ascii_case("now") {
        return Ok(Local::now());
    }
    if let Some(rest) = s.to_ascii_lowercase().strip_prefix("now-") {
        return parse_relative_bound(rest)
            .ok_or_else(|| QueryError::TimeBound(format!("unable to parse time: {}", raw)));
    }
    if let Some(rest) = s.strip_prefix("today ") {
        if let Ok(time) = NaiveTime::parse_from_str(rest.trim(), "%H:%M:%S") {
            return today_at(time)
                .ok_or_else(|| QueryError::TimeBound(format!("unable to parse time: {}", raw)));
        }
    }
    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
        return today_at(time)
            .ok_or_else(|| QueryError::TimeBound(format!("unable to parse time: {}", raw)));
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Local));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            if let Some(t) = naive_to_local(naive) {
                return Ok(t);
            }
        }
    }
    Err(QueryError::TimeBound(format!("unable to parse time: {}", raw)))
}

fn parse_relative_bound(rest: &str) -> Option<DateTime<Local>> {
    let rest = rest.trim();
    let unit = rest.chars().last()?;
    let amount: i64 = rest[..rest.len() - 1].parse().ok()?;
    let delta = match unit {
        'h' => Duration::hours(amount),
        'm' => Duration::minutes(amount),
        's' => Duration::seconds(amount),
        _ => return None,
    };
    Some(Local::now() - delta)
}

fn today_at(time: NaiveTime) -> Option<DateTime<Local>> {
    naive_to_local(Local::now().date_naive().and_time(time))
}

fn naive_to_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(t) => Some(t),
        chrono::LocalResult::Ambiguous(t, _) => Some(t),
        chrono::LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::path::Path;

    fn record(raw: &str) -> LineRecord {
        record_from("app.log", raw)
    }

    fn record_from(source: &str, raw: &str) -> LineRecord {
        let parser = crate::parser::LineParser::new();
        let mut rec = LineRecord::new(Path::new(source), 1, None, raw.to_string());
        parser.parse(&mut rec);
        rec
    }

    #[test]
    fn test_single_field_equality() {
        let expr = parse_query("level:ERROR").unwrap();
        assert!(expr.matches(&record(r#"{"level":"error","msg":"x","y":1}"#)));
        assert!(!expr.matches(&record(r#"{"level":"info","msg":"x","y":1}"#)));
    }

    #[test]
    fn test_field_and_numeric_comparison() {
        // ERROR with status 502 matches level + status:>=500.
        let expr = parse_query("level:ERROR AND status:>=500").unwrap();
        let rec = record(r#"{"level":"ERROR","status":502,"msg":"bad gateway"}"#);
        assert!(expr.matches(&rec));

        let eq = parse_query("status:502").unwrap();
        assert!(eq.matches(&rec));

        let wrong_level = parse_query("level:WARN AND status:>=500").unwrap();
        assert!(!wrong_level.matches(&rec));
    }

    #[test]
    fn test_comparison_operator_variants() {
        let rec = record(r#"{"status":404,"level":"warn"}"#);
        assert!(parse_query("status:>400").unwrap().matches(&rec));
        assert!(parse_query("status:<500").unwrap().matches(&rec));
        assert!(parse_query("status:>=404").unwrap().matches(&rec));
        assert!(parse_query("status:<=404").unwrap().matches(&rec));
        assert!(!parse_query("status:>404").unwrap().matches(&rec));
        assert!(parse_query("status:!=500").unwrap().matches(&rec));
    }

    #[test]
    fn test_not_and_grouping() {
        let expr = parse_query("(level:ERROR OR level:FATAL) AND NOT source:~test").unwrap();
        let app1 = record_from("app.log", r#"{"level":"error","m":"a"}"#);
        let test1 = record_from("test.log", r#"{"level":"error","m":"b"}"#);
        let app2 = record_from("app.log", r#"{"level":"error","m":"c"}"#);
        assert!(expr.matches(&app1));
        assert!(!expr.matches(&test1));
        assert!(expr.matches(&app2));
    }

    #[test]
    fn test_implicit_and_between_primaries() {
        let expr = parse_query(r#"level:ERROR "Gateway""#).unwrap();
        assert!(expr.matches(&record(r#"{"level":"error","msg":"Bad Gateway"}"#)));
        // Quoted text is case-sensitive.
        assert!(!expr.matches(&record(r#"{"level":"error","msg":"bad gateway"}"#)));
    }

    #[test]
    fn test_not_with_bare_text() {
        let expr = parse_query("NOT boom").unwrap();
        assert!(expr.matches(&record("all quiet")));
        assert!(!expr.matches(&record("BOOM goes the dynamite")));
    }

    #[test]
    fn test_regex_text_search() {
        let expr = parse_query("~conn.*refused").unwrap();
        assert!(expr.matches(&record("ERROR Connection refused by peer")));
        assert!(!expr.matches(&record("connection accepted")));
    }

    #[test]
    fn test_field_regex() {
        let expr = parse_query("source:~app").unwrap();
        assert!(expr.matches(&record_from("app.log", "x")));
        assert!(!expr.matches(&record_from("system.log", "x")));
    }

    #[test]
    fn test_quoted_field_value_with_spaces() {
        let expr = parse_query(r#"msg:"bad gateway""#).unwrap();
        assert!(expr.matches(&record(r#"{"msg":"bad gateway","level":"error"}"#)));
        assert!(!expr.matches(&record(r#"{"msg":"ok","level":"error"}"#)));
    }

    #[test]
    fn test_dotted_field_path() {
        let expr = parse_query("user.id:u-1").unwrap();
        assert!(expr.matches(&record(r#"{"user":{"id":"u-1"},"level":"info"}"#)));
        assert!(!expr.matches(&record(r#"{"user":{"id":"u-2"},"level":"info"}"#)));
    }

    #[test]
    fn test_time_range_matches_only_parsed_timestamps() {
        let today = Local::now().format("%Y-%m-%d");
        let inside = record(&format!("{} 14:30:00 INFO inside", today));
        let before = record(&format!("{} 14:29:00 INFO before", today));
        let after = record(&format!("{} 14:31:00 INFO after", today));
        let no_ts = record("no timestamp at all");
        assert!(inside.timestamp.is_some());

        let expr = parse_query("time:[14:29:30 TO 14:30:30]").unwrap();
        assert!(expr.matches(&inside));
        assert!(!expr.matches(&before));
        assert!(!expr.matches(&after));
        // A missing timestamp never matches, even though the record arrived
        // just now (arrival time is provisional, not parsed).
        assert!(!expr.matches(&no_ts));
    }

    #[test]
    fn test_time_bound_formats() {
        assert!(parse_time_bound("14:30:00").is_ok());
        assert!(parse_time_bound("2024-01-15 14:30:00").is_ok());
        assert!(parse_time_bound("2024-01-15T14:30:00").is_ok());
        assert!(parse_time_bound("2024-01-15T14:30:00Z").is_ok());
        assert!(parse_time_bound("2024-01-15T14:30:00+02:00").is_ok());
        assert!(parse_time_bound("now").is_ok());
        assert!(parse_time_bound("today 00:00:00").is_ok());
        assert!(parse_time_bound("not a time").is_err());

        let hour_ago = parse_time_bound("now-1h").unwrap();
        let delta = Local::now() - hour_ago;
        assert!((delta - Duration::hours(1)).num_seconds().abs() <= 1);

        // U+2212 minus from the shortcut table is accepted.
        assert!(parse_time_bound("now\u{2212}30m").is_ok());
    }

    #[test]
    fn test_hh_mm_ss_bound_is_today() {
        let bound = parse_time_bound("14:30:00").unwrap();
        assert_eq!(bound.date_naive(), Local::now().date_naive());
        assert_eq!((bound.hour(), bound.minute(), bound.second()), (14, 30, 0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_query("(level:ERROR"),
            Err(QueryError::Syntax(_))
        ));
        assert!(matches!(parse_query(""), Err(QueryError::Syntax(_))));
        assert!(matches!(
            parse_query("source:~[invalid"),
            Err(QueryError::Regex(_))
        ));
        assert!(matches!(
            parse_query("time:[bogus TO 14:00:00]"),
            Err(QueryError::TimeBound(_))
        ));
        assert!(matches!(
            parse_query("time:[14:00:00]"),
            Err(QueryError::TimeBound(_))
        ));
        assert!(matches!(parse_query("level:"), Err(QueryError::Syntax(_))));
    }

    #[test]
    fn test_operator_precedence() {
        // a OR b AND c parses as a OR (b AND c).
        let expr = parse_query("level:FATAL OR level:ERROR source:~app").unwrap();
        let fatal_test = record_from("test.log", r#"{"level":"fatal","m":1}"#);
        let error_app = record_from("app.log", r#"{"level":"error","m":1}"#);
        let error_test = record_from("test.log", r#"{"level":"error","m":1}"#);
        assert!(expr.matches(&fatal_test));
        assert!(expr.matches(&error_app));
        assert!(!expr.matches(&error_test));
    }

    #[test]
    fn test_short_circuit_evaluation() {
        // And(false, _) is false and Or(true, _) is true regardless of the
        // right side.
        let never = QueryExpr::Text(TextPredicate::substring("no-such-text", false));
        let always = QueryExpr::Text(TextPredicate::substring("", false));
        let rec = record("anything");

        let and = QueryExpr::And(Box::new(never.clone()), Box::new(always.clone()));
        assert!(!and.matches(&rec));
        let or = QueryExpr::Or(Box::new(always), Box::new(never));
        assert!(or.matches(&rec));
    }

    #[test]
    fn test_print_parse_round_trip() {
        let queries = [
            "level:ERROR AND status:>=500",
            "(level:ERROR OR level:FATAL) AND NOT source:~test",
            "~conn.*refused",
            r#"msg:"bad gateway" level:ERROR"#,
            "status:!=200",
            "time:[2024-01-15 14:00:00 TO 2024-01-15 15:00:00]",
        ];
        let samples = [
            record(r#"{"level":"error","status":502,"msg":"bad gateway"}"#),
            record(r#"{"level":"fatal","status":200,"msg":"ok"}"#),
            record_from("test.log", r#"{"level":"error","status":500,"m":1}"#),
            record("2024-01-15 14:30:00 ERROR Connection refused"),
            record("plain text"),
        ];
        for query in queries {
            let tree = parse_query(query).unwrap();
            let reparsed = parse_query(&tree.to_string()).unwrap();
            for sample in &samples {
                assert_eq!(
                    tree.matches(sample),
                    reparsed.matches(sample),
                    "round trip diverged for {:?} on {:?}",
                    query,
                    sample.raw
                );
            }
        }
    }

    #[test]
    fn test_compile_determinism() {
        let query = "(level:ERROR OR level:WARN) AND NOT source:~test";
        let first = parse_query(query).unwrap();
        let second = parse_query(query).unwrap();
        let samples = [
            record_from("app.log", r#"{"level":"error","m":1}"#),
            record_from("test.log", r#"{"level":"warn","m":1}"#),
            record_from("app.log", "no level"),
        ];
        for sample in &samples {
            assert_eq!(first.matches(sample), second.matches(sample));
        }
    }

    #[test]
    fn test_missing_field_resolves_empty() {
        let rec = record("plain unstructured line");
        // Missing fields compare as empty strings: equality with a value
        // fails, inequality succeeds.
        assert!(!parse_query("widget:blue").unwrap().matches(&rec));
        assert!(parse_query("widget:!=blue").unwrap().matches(&rec));
    }
}
