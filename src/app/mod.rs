//! Coordinator: owns the stores, the filter engine, bookmarks, pane state
//! and the tailer.
//!
//! Incoming lines drain from the tailer channel in fixed-size batches; a
//! commit parses each record, appends it to the main store and, when a
//! filter is installed and matches, to the filtered store. Filter changes
//! flush the pending batch, clear the filtered store and re-scan the whole
//! window. While paused, new lines are parsed and discarded; the live
//! stream is a fire-hose and is not buffered during pauses.

pub mod batch;
pub mod pane;

use crate::config::Config;
use crate::export::{self, ExportError, ExportFormat, ExportOptions};
use crate::filter::query::QueryError;
use crate::filter::FilterEngine;
use crate::highlight::Highlighter;
use crate::parser::LineParser;
use crate::record::{
    Bookmark, FilterOptions, LineRecord, PaneKind, SessionState, TailerEvent, UiState,
};
use crate::store::CircularStore;
use crate::tailer::{FileError, Tailer, TailerOptions};
use batch::Batcher;
use chrono::Local;
use pane::LogPane;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Records re-scanned per window on a filter change.
const RESCAN_WINDOW: usize = 1000;

/// Progress status cadence (and minimum window size) for long re-scans.
const PROGRESS_MILESTONE: usize = 5000;

/// How long transient status messages stay visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Read-only snapshot for the status bar.
#[derive(Debug, Clone)]
pub struct Stats {
    pub total: usize,
    pub filtered: usize,
    pub paused: bool,
    pub active_pane: PaneKind,
    pub has_filter: bool,
    pub bookmark_count: usize,
    pub watched_files: Vec<PathBuf>,
}

pub struct App {
    pub config: Config,
    parser: LineParser,
    pub filter: FilterEngine,
    pub highlighter: Highlighter,
    tailer: Tailer,
    events: Option<Receiver<TailerEvent>>,
    pub main_store: Arc<CircularStore>,
    pub filtered_store: Arc<CircularStore>,
    batcher: Batcher,
    pub bookmarks: Vec<Bookmark>,
    bookmark_seq: u64,
    pub all_pane: LogPane,
    pub filtered_pane: LogPane,
    pub active_pane: PaneKind,
    pub paused: bool,
    /// When false, a follower is dropped once it reaches end of file
    /// (`--tail=false`).
    pub follow: bool,
    pub should_quit: bool,
    pub show_help: bool,
    pub search_active: bool,
    pub search_input: String,
    status: Option<(String, Instant)>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let tailer_options = TailerOptions {
            rotation_check_interval: Duration::from_millis(
                config.general.file_rotation_check_ms.max(1),
            ),
            ..TailerOptions::default()
        };
        Self::with_tailer_options(config, tailer_options)
    }

    /// Constructor with explicit tailer tuning; tests shrink the intervals.
    pub fn with_tailer_options(config: Config, tailer_options: TailerOptions) -> Self {
        let capacity = config.ui.max_buffer_lines.max(1);
        let mut tailer = Tailer::new(tailer_options);
        let events = tailer.events();
        let mut filter = FilterEngine::new();
        filter.extend_shortcuts(&config.shortcuts);
        let highlighter = Highlighter::new(&config.highlight_rules);

        App {
            config,
            parser: LineParser::new(),
            filter,
            highlighter,
            tailer,
            events,
            main_store: Arc::new(CircularStore::new(capacity)),
            filtered_store: Arc::new(CircularStore::new(capacity)),
            batcher: Batcher::default(),
            bookmarks: Vec::new(),
            bookmark_seq: 0,
            all_pane: LogPane::new("All Logs"),
            filtered_pane: LogPane::new("Filtered"),
            active_pane: PaneKind::AllLogs,
            paused: false,
            follow: true,
            should_quit: false,
            show_help: false,
            search_active: false,
            search_input: String::new(),
            status: None,
        }
    }

    // ------------------------------------------------------------------
    // File management
    // ------------------------------------------------------------------

    pub fn add_file(&mut self, path: &Path) -> Result<(), FileError> {
        self.tailer.add_file(path)?;
        self.set_status(format!("Watching {}", path.display()));
        Ok(())
    }

    pub fn tail_from_start(&mut self, path: &Path) -> Result<(), FileError> {
        self.tailer.tail_from_start(path)?;
        self.set_status(format!("Reading {} from the beginning", path.display()));
        Ok(())
    }

    pub fn remove_file(&mut self, path: &Path) -> Result<(), FileError> {
        self.tailer.remove_file(path)
    }

    // ------------------------------------------------------------------
    // Event intake and batching
    // ------------------------------------------------------------------

    /// Drain up to `budget` tailer events, then run the tick timer. Returns
    /// how many events were handled.
    pub fn pump_events(&mut self, budget: usize) -> usize {
        let mut drained = Vec::new();
        if let Some(rx) = &self.events {
            while drained.len() < budget {
                match rx.try_recv() {
                    Ok(event) => drained.push(event),
                    Err(_) => break,
                }
            }
        }
        let handled = drained.len();
        for event in drained {
            self.handle_event(event);
        }
        self.tick();
        handled
    }

    pub fn handle_event(&mut self, event: TailerEvent) {
        match event {
            TailerEvent::NewLine(mut record) => {
                if self.paused {
                    // Parse for consistency, then drop: pauses do not
                    // buffer the stream.
                    self.parser.parse(&mut record);
                    return;
                }
                if self.batcher.push(record) {
                    self.commit_batch();
                }
            }
            TailerEvent::FileRotated(path) => {
                self.set_status(format!("File rotated: {}", path.display()));
            }
            TailerEvent::FileError { message, .. } => {
                self.set_status(message);
            }
            TailerEvent::Eof(path) => {
                if !self.follow {
                    let _ = self.tailer.remove_file(&path);
                }
            }
        }
    }

    /// Commit on timeout. Called once per loop iteration.
    pub fn tick(&mut self) {
        if self.batcher.timed_out() {
            self.commit_batch();
        }
    }

    /// Parse and append the pending batch; matching records also land in
    /// the filtered store. Panes pinned to the bottom follow the new end.
    pub fn commit_batch(&mut self) {
        let pending = self.batcher.take();
        if pending.is_empty() {
            return;
        }
        for mut record in pending {
            self.parser.parse(&mut record);
            let record = Arc::new(record);
            self.main_store.append(Arc::clone(&record));
            if self.filter.has_filter() && self.filter.matches(&record) {
                self.filtered_store.append(record);
            }
        }
        self.all_pane.follow(self.main_store.len());
        self.filtered_pane.follow(self.filtered_store.len());
    }

    // ------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------

    /// Install a new filter and re-scan the whole window. On error the
    /// previous filter (and filtered store) stay untouched.
    pub fn set_filter(&mut self, query: &str) -> Result<(), QueryError> {
        self.commit_batch();
        self.filter.set_query(query)?;
        self.refilter();
        Ok(())
    }

    /// Install a flat filter from explicit options and re-scan.
    pub fn set_simple_filter(&mut self, options: &FilterOptions) -> Result<(), QueryError> {
        self.commit_batch();
        self.filter.set_simple_filter(options)?;
        self.refilter();
        Ok(())
    }

    pub fn clear_filter(&mut self) {
        self.commit_batch();
        self.filter.clear();
        self.filtered_store.clear();
        self.filtered_pane.clamp(0);
        self.active_pane = PaneKind::AllLogs;
        self.set_status("Filter cleared");
    }

    /// Re-scan the main store oldest-to-newest in windows, rebuilding the
    /// filtered store.
    fn refilter(&mut self) {
        self.filtered_store.clear();
        if !self.filter.has_filter() {
            self.filtered_pane.clamp(0);
            return;
        }
        let total = self.main_store.len();
        let mut matches = 0usize;
        let mut start = 0usize;
        while start < total {
            let end = (start + RESCAN_WINDOW).min(total);
            for record in self.main_store.range(start, end) {
                if self.filter.matches(&record) {
                    self.filtered_store.append(record);
                    matches += 1;
                }
            }
            if total >= PROGRESS_MILESTONE && start > 0 && start % PROGRESS_MILESTONE == 0 {
                let percent = start * 100 / total;
                self.set_status(format!(
                    "Filtering... {}% ({} matches so far)",
                    percent, matches
                ));
            }
            start = end;
        }
        self.filtered_pane.to_bottom(self.filtered_store.len());
        self.set_status(format!("Found {}/{} matches", matches, total));
    }

    pub fn filter_summary(&self) -> String {
        self.filter.summary()
    }

    // ------------------------------------------------------------------
    // Pane state, scrolling, match navigation
    // ------------------------------------------------------------------

    pub fn pane(&self, kind: PaneKind) -> &LogPane {
        match kind {
            PaneKind::AllLogs => &self.all_pane,
            PaneKind::Filtered => &self.filtered_pane,
        }
    }

    fn store_for(&self, kind: PaneKind) -> &Arc<CircularStore> {
        match kind {
            PaneKind::AllLogs => &self.main_store,
            PaneKind::Filtered => &self.filtered_store,
        }
    }

    fn active_parts(&mut self) -> (&mut LogPane, Arc<CircularStore>) {
        match self.active_pane {
            PaneKind::AllLogs => (&mut self.all_pane, Arc::clone(&self.main_store)),
            PaneKind::Filtered => (&mut self.filtered_pane, Arc::clone(&self.filtered_store)),
        }
    }

    pub fn toggle_pane(&mut self) {
        self.active_pane = match self.active_pane {
            PaneKind::AllLogs => PaneKind::Filtered,
            PaneKind::Filtered => PaneKind::AllLogs,
        };
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if self.paused {
            self.set_status("Stream paused");
        } else {
            self.set_status("Stream resumed");
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        let (pane, _) = self.active_parts();
        pane.scroll_up(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        let (pane, store) = self.active_parts();
        pane.scroll_down(n, store.len());
    }

    pub fn page_up(&mut self) {
        let (pane, _) = self.active_parts();
        let page = pane.last_height.max(1);
        pane.scroll_up(page);
    }

    pub fn page_down(&mut self) {
        let (pane, store) = self.active_parts();
        let page = pane.last_height.max(1);
        pane.scroll_down(page, store.len());
    }

    pub fn scroll_top(&mut self) {
        let (pane, _) = self.active_parts();
        pane.to_top();
    }

    pub fn scroll_bottom(&mut self) {
        let (pane, store) = self.active_parts();
        pane.to_bottom(store.len());
    }

    /// Center line `index` of the active pane in the viewport.
    pub fn scroll_to_line(&mut self, index: usize) {
        let (pane, store) = self.active_parts();
        pane.center_on(index, store.len());
    }

    /// Walk forward from the cursor to the next line matching the current
    /// filter, wrapping around once.
    pub fn next_match(&mut self) {
        self.find_match(true);
    }

    /// Walk backward to the previous matching line, wrapping around once.
    pub fn prev_match(&mut self) {
        self.find_match(false);
    }

    fn find_match(&mut self, forward: bool) {
        if !self.filter.has_filter() {
            self.set_status("No filter set");
            return;
        }
        let (cursor, store) = {
            let (pane, store) = self.active_parts();
            (pane.cursor, store)
        };
        let len = store.len();
        if len == 0 {
            self.set_status("No match found");
            return;
        }
        for step in 1..=len {
            let index = if forward {
                (cursor + step) % len
            } else {
                (cursor + len - (step % len)) % len
            };
            let hit = store
                .get(index)
                .map(|record| self.filter.matches(&record))
                .unwrap_or(false);
            if hit {
                self.scroll_to_line(index);
                return;
            }
        }
        self.set_status("No match found");
    }

    // ------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------

    /// Bookmark the line under the cursor of the active pane.
    pub fn add_bookmark(&mut self, name: Option<String>) {
        let (cursor, store) = {
            let (pane, store) = self.active_parts();
            (pane.cursor, store)
        };
        let Some(record) = store.get(cursor) else {
            self.set_status("No line selected");
            return;
        };
        self.bookmark_seq += 1;
        let mut context: String = record.raw.chars().take(80).collect();
        if context.len() < record.raw.len() {
            context.push('…');
        }
        let bookmark = Bookmark {
            id: format!("bm-{}", self.bookmark_seq),
            name: name.unwrap_or_else(|| format!("bookmark {}", self.bookmark_seq)),
            source: record.source.clone(),
            line_id: record.id.clone(),
            created_at: Local::now(),
            context,
        };
        self.set_status(format!("Bookmarked {}", bookmark.line_id));
        self.bookmarks.push(bookmark);
    }

    /// Dereference a bookmark; the target may have been evicted.
    #[allow(dead_code)] // Public API for external use and tests
    pub fn resolve_bookmark(&self, bookmark: &Bookmark) -> Option<Arc<LineRecord>> {
        let mut found = None;
        self.main_store.for_each(|record| {
            if record.id == bookmark.line_id {
                found = Some(Arc::clone(record));
                false
            } else {
                true
            }
        });
        found
    }

    // ------------------------------------------------------------------
    // Read APIs for the view layer
    // ------------------------------------------------------------------

    /// Visible slice of a pane. Records the viewport height for paging and
    /// follow math.
    pub fn viewport(&mut self, kind: PaneKind, height: usize) -> Vec<Arc<LineRecord>> {
        let store = Arc::clone(self.store_for(kind));
        let pane = match kind {
            PaneKind::AllLogs => &mut self.all_pane,
            PaneKind::Filtered => &mut self.filtered_pane,
        };
        pane.last_height = height;
        pane.clamp(store.len());
        store.range(pane.scroll, pane.scroll + height)
    }

    pub fn stats(&self) -> Stats {
        Stats {
            total: self.main_store.len(),
            filtered: self.filtered_store.len(),
            paused: self.paused,
            active_pane: self.active_pane,
            has_filter: self.filter.has_filter(),
            bookmark_count: self.bookmarks.len(),
            watched_files: self.tailer.watched_files(),
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    /// Current status line, if it has not timed out.
    pub fn status_message(&self) -> Option<&str> {
        match &self.status {
            Some((message, at)) if at.elapsed() < STATUS_TIMEOUT => Some(message),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Export and session
    // ------------------------------------------------------------------

    /// Export the entire active pane to `path`.
    pub fn export_active_pane(
        &self,
        path: &Path,
        format: ExportFormat,
    ) -> Result<usize, ExportError> {
        let store = self.store_for(self.active_pane);
        let records = store.range(0, store.len());
        export::export_lines(path, &records, &ExportOptions::new(format))
    }

    pub fn session_state(&self) -> SessionState {
        let pane = self.pane(self.active_pane);
        SessionState {
            sources: self.tailer.watched_files(),
            bookmarks: self.bookmarks.clone(),
            saved_queries: self.config.saved_queries.clone(),
            last_filter: FilterOptions {
                query: self.filter.last_query().to_string(),
                ..FilterOptions::default()
            },
            ui_state: UiState {
                active_pane: self.active_pane,
                is_paused: self.paused,
                selected_line: pane.cursor,
                scroll_offset: pane.scroll,
                filtered_count: self.filtered_store.len(),
                total_count: self.main_store.len(),
                current_filter: FilterOptions {
                    query: self.filter.last_query().to_string(),
                    ..FilterOptions::default()
                },
            },
            last_accessed: Local::now(),
        }
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Flush the pending batch, close the event channel and await the
    /// followers.
    pub fn stop(&mut self) {
        self.commit_batch();
        // Drop the receiver first so blocked senders unwind promptly.
        self.events = None;
        self.tailer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn test_app() -> App {
        let mut config = Config::default();
        config.ui.max_buffer_lines = 100_000;
        App::with_tailer_options(
            config,
            TailerOptions {
                channel_capacity: 1000,
                rotation_check_interval: Duration::from_millis(40),
                poll_interval: Duration::from_millis(10),
            },
        )
    }

    fn new_line(app: &mut App, n: u64, raw: &str) {
        let record = LineRecord::new(Path::new("test.log"), n, None, raw.to_string());
        app.handle_event(TailerEvent::NewLine(record));
    }

    #[test]
    fn test_commit_parses_and_appends() {
        let mut app = test_app();
        new_line(&mut app, 1, r#"{"level":"error","msg":"boom"}"#);
        new_line(&mut app, 2, "2024-01-15 14:30:22 INFO fine");
        app.commit_batch();

        assert_eq!(app.main_store.len(), 2);
        let first = app.main_store.get(0).unwrap();
        assert_eq!(first.level, Some(LogLevel::Error));
        assert!(first.parsed.is_some());
        let second = app.main_store.get(1).unwrap();
        assert!(second.timestamp.is_some());
    }

    #[test]
    fn test_batch_commits_when_full() {
        let mut app = test_app();
        for n in 0..batch::BATCH_SIZE as u64 {
            new_line(&mut app, n, "line");
        }
        // A full batch commits without an explicit tick.
        assert_eq!(app.main_store.len(), batch::BATCH_SIZE);
    }

    #[test]
    fn test_live_filtering_on_commit() {
        let mut app = test_app();
        app.set_filter("boom").unwrap();
        new_line(&mut app, 1, "2024-01-15 14:30:22 INFO hello");
        new_line(&mut app, 2, "2024-01-15 14:30:23 ERROR boom");
        app.commit_batch();

        assert_eq!(app.main_store.len(), 2);
        assert_eq!(app.filtered_store.len(), 1);
        assert_eq!(app.filtered_store.get(0).unwrap().line_num, 2);
        assert_eq!(app.filter_summary(), "text:\"boom\"");
    }

    #[test]
    fn test_filter_change_rescans_whole_window() {
        // After set_filter, the filtered store holds exactly the matching
        // records of the main store, in order.
        let mut app = test_app();
        for n in 0..50 {
            let raw = if n % 10 == 0 {
                format!(r#"{{"level":"error","n":{}}}"#, n)
            } else {
                format!(r#"{{"level":"info","n":{}}}"#, n)
            };
            new_line(&mut app, n, &raw);
        }
        app.commit_batch();

        app.set_filter("errors").unwrap();
        assert_eq!(app.filtered_store.len(), 5);
        let expected: Vec<u64> = vec![0, 10, 20, 30, 40];
        let got: Vec<u64> = app
            .filtered_store
            .range(0, 5)
            .iter()
            .map(|r| r.line_num)
            .collect();
        assert_eq!(got, expected);

        // Changing the filter replaces the filtered window wholesale.
        app.set_filter("level:INFO").unwrap();
        assert_eq!(app.filtered_store.len(), 45);
    }

    #[test]
    fn test_invalid_filter_keeps_previous_state() {
        let mut app = test_app();
        new_line(&mut app, 1, r#"{"level":"error","m":1}"#);
        app.commit_batch();
        app.set_filter("errors").unwrap();
        assert_eq!(app.filtered_store.len(), 1);

        assert!(app.set_filter("(broken").is_err());
        // Old filter and filtered store survive.
        assert!(app.filter.has_filter());
        assert_eq!(app.filtered_store.len(), 1);
    }

    #[test]
    fn test_clear_filter_empties_filtered_store() {
        let mut app = test_app();
        new_line(&mut app, 1, r#"{"level":"error","m":1}"#);
        app.commit_batch();
        app.set_filter("errors").unwrap();
        app.toggle_pane();
        assert_eq!(app.active_pane, PaneKind::Filtered);

        app.clear_filter();
        assert!(!app.filter.has_filter());
        assert_eq!(app.filtered_store.len(), 0);
        assert_eq!(app.active_pane, PaneKind::AllLogs);
    }

    #[test]
    fn test_pause_discards_lines() {
        let mut app = test_app();
        app.toggle_pause();
        assert!(app.paused);
        new_line(&mut app, 1, "dropped while paused");
        app.commit_batch();
        assert_eq!(app.main_store.len(), 0);

        app.toggle_pause();
        new_line(&mut app, 2, "kept after resume");
        app.commit_batch();
        assert_eq!(app.main_store.len(), 1);
    }

    #[test]
    fn test_match_navigation_wraps() {
        let mut app = test_app();
        for n in 0..10 {
            let raw = if n % 4 == 0 {
                format!("ERROR bad thing {}", n)
            } else {
                format!("INFO ok {}", n)
            };
            new_line(&mut app, n, &raw);
        }
        app.commit_batch();
        app.set_filter("errors").unwrap();
        app.all_pane.last_height = 5;
        app.all_pane.cursor = 0;

        // Matches sit at indices 0, 4, 8 in the all pane.
        app.next_match();
        assert_eq!(app.all_pane.cursor, 4);
        app.next_match();
        assert_eq!(app.all_pane.cursor, 8);
        // Wraps around to the first match.
        app.next_match();
        assert_eq!(app.all_pane.cursor, 0);
        app.prev_match();
        assert_eq!(app.all_pane.cursor, 8);
    }

    #[test]
    fn test_match_navigation_requires_filter() {
        let mut app = test_app();
        new_line(&mut app, 1, "x");
        app.commit_batch();
        app.next_match();
        assert_eq!(app.status_message(), Some("No filter set"));
    }

    #[test]
    fn test_bookmark_and_stale_resolution() {
        let mut config = Config::default();
        config.ui.max_buffer_lines = 4;
        let mut app = App::with_tailer_options(config, TailerOptions::default());

        for n in 0..4 {
            new_line(&mut app, n, &format!("line {}", n));
        }
        app.commit_batch();
        app.all_pane.cursor = 0;
        app.add_bookmark(Some("first".into()));
        assert_eq!(app.bookmarks.len(), 1);

        let bookmark = app.bookmarks[0].clone();
        assert!(app.resolve_bookmark(&bookmark).is_some());

        // Evict the target by overflowing the 4-slot store.
        for n in 4..10 {
            new_line(&mut app, n, &format!("line {}", n));
        }
        app.commit_batch();
        // The bookmark outlives the record; dereferencing yields nothing.
        assert!(app.resolve_bookmark(&bookmark).is_none());
        assert_eq!(app.bookmarks.len(), 1);
    }

    #[test]
    fn test_viewport_and_follow() {
        let mut app = test_app();
        for n in 0..100 {
            new_line(&mut app, n, &format!("line {}", n));
        }
        app.commit_batch();

        let view = app.viewport(PaneKind::AllLogs, 10);
        assert_eq!(view.len(), 10);
        // Initial position follows the bottom.
        app.scroll_bottom();
        let view = app.viewport(PaneKind::AllLogs, 10);
        assert_eq!(view.last().unwrap().line_num, 99);

        // New commits keep the pane pinned to the bottom.
        for n in 100..120 {
            new_line(&mut app, n, &format!("line {}", n));
        }
        app.commit_batch();
        let view = app.viewport(PaneKind::AllLogs, 10);
        assert_eq!(view.last().unwrap().line_num, 119);

        // After scrolling away, commits leave the viewport alone.
        app.scroll_up(50);
        let before = app.pane(PaneKind::AllLogs).scroll;
        for n in 120..140 {
            new_line(&mut app, n, &format!("line {}", n));
        }
        app.commit_batch();
        assert_eq!(app.pane(PaneKind::AllLogs).scroll, before);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut app = test_app();
        new_line(&mut app, 1, r#"{"level":"error","m":1}"#);
        new_line(&mut app, 2, r#"{"level":"info","m":2}"#);
        app.commit_batch();
        app.set_filter("errors").unwrap();
        app.add_bookmark(None);

        let stats = app.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.filtered, 1);
        assert!(stats.has_filter);
        assert!(!stats.paused);
        assert_eq!(stats.bookmark_count, 1);
    }

    #[test]
    fn test_high_volume_batch_throughput() {
        // Fire-hose shape: 20k lines, 1% errors, live filter.
        let mut app = test_app();
        app.set_filter("errors").unwrap();
        let total: u64 = 20_000;
        for n in 0..total {
            let raw = if n % 100 == 0 {
                format!(r#"{{"level":"error","n":{}}}"#, n)
            } else {
                format!(r#"{{"level":"info","n":{}}}"#, n)
            };
            new_line(&mut app, n, &raw);
        }
        app.commit_batch();

        assert_eq!(app.main_store.len(), total as usize);
        assert_eq!(app.filtered_store.len(), (total / 100) as usize);
        // Order inside the filtered store mirrors the main store.
        let filtered: Vec<u64> = app
            .filtered_store
            .range(0, 5)
            .iter()
            .map(|r| r.line_num)
            .collect();
        assert_eq!(filtered, vec![0, 100, 200, 300, 400]);
    }

    #[test]
    fn test_pipeline_end_to_end_no_line_loss() {
        // Every line appended to a watched file appears exactly once in the
        // main store.
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.log");
        {
            let mut f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .unwrap();
            for n in 0..500 {
                writeln!(f, r#"{{"level":"info","n":{}}}"#, n).unwrap();
            }
        }

        let mut app = test_app();
        app.add_file(&path).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while app.main_store.len() < 500 && Instant::now() < deadline {
            app.pump_events(1000);
            std::thread::sleep(Duration::from_millis(10));
        }
        app.commit_batch();
        assert_eq!(app.main_store.len(), 500);

        // In-order per source, each exactly once.
        let nums: Vec<u64> = app
            .main_store
            .range(0, 500)
            .iter()
            .map(|r| r.line_num)
            .collect();
        assert_eq!(nums, (1..=500).collect::<Vec<_>>());

        app.stop();
    }

    #[test]
    fn test_session_state_reflects_app() {
        let mut app = test_app();
        new_line(&mut app, 1, r#"{"level":"error","m":1}"#);
        app.commit_batch();
        app.set_filter("errors").unwrap();
        app.toggle_pause();

        let session = app.session_state();
        assert_eq!(session.last_filter.query, "errors");
        assert!(session.ui_state.is_paused);
        assert_eq!(session.ui_state.total_count, 1);
        assert_eq!(session.ui_state.filtered_count, 1);
    }

    #[test]
    fn test_export_active_pane() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dump.txt");
        let mut app = test_app();
        new_line(&mut app, 1, "alpha");
        new_line(&mut app, 2, "beta");
        app.commit_batch();

        let written = app
            .export_active_pane(&out, crate::export::ExportFormat::Text)
            .unwrap();
        assert_eq!(written, 2);
        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("alpha"));
        assert!(content.contains("beta"));
    }
}
