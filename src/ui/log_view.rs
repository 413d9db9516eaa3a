//! Log pane rendering: viewport slices styled through the highlighter.

use super::Theme;
use crate::app::App;
use crate::record::{LineRecord, LogLevel, PaneKind, TokenKind};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

pub(super) fn render_pane(
    f: &mut Frame,
    area: Rect,
    app: &mut App,
    kind: PaneKind,
    theme: &Theme,
) {
    let height = area.height.saturating_sub(2) as usize;
    let width = area.width.saturating_sub(2) as usize;
    let records = app.viewport(kind, height);

    let pane = app.pane(kind);
    let store_len = match kind {
        PaneKind::AllLogs => app.main_store.len(),
        PaneKind::Filtered => app.filtered_store.len(),
    };
    let title = format!(" {} ({}) ", pane.title, store_len);
    let is_active = app.active_pane == kind;
    let border_style = if is_active {
        Style::default().fg(theme.border_active)
    } else {
        Style::default().fg(theme.dim)
    };

    let show_numbers = app.config.ui.show_line_numbers;
    let cursor = pane.cursor;
    let scroll = pane.scroll;
    let lines: Vec<Line> = records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let selected = is_active && scroll + row == cursor;
            styled_line(app, record, show_numbers, selected, width, theme)
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title),
    );
    f.render_widget(paragraph, area);
}

/// Build one styled line: optional line number, then the raw text split
/// into highlighter token spans.
fn styled_line<'a>(
    app: &App,
    record: &'a Arc<LineRecord>,
    show_numbers: bool,
    selected: bool,
    width: usize,
    theme: &Theme,
) -> Line<'a> {
    let mut spans: Vec<Span> = Vec::new();
    if show_numbers {
        spans.push(Span::styled(
            format!("{:>6} ", record.line_num),
            Style::default().fg(theme.dim),
        ));
    }

    let raw = truncated(&record.raw, width.saturating_sub(if show_numbers { 7 } else { 0 }));
    if theme.monochrome {
        spans.push(Span::raw(raw.to_string()));
    } else {
        let tokens = app.highlighter.tokens(record);
        let mut at = 0usize;
        for token in tokens {
            if token.start >= raw.len() {
                break;
            }
            if token.start > at {
                spans.push(Span::raw(raw[at..token.start].to_string()));
            }
            let end = token.end.min(raw.len());
            spans.push(Span::styled(
                raw[token.start..end].to_string(),
                token_style(token.kind, &raw[token.start..end], record, theme),
            ));
            at = end;
        }
        if at < raw.len() {
            spans.push(Span::raw(raw[at..].to_string()));
        }
    }

    let mut line = Line::from(spans);
    if selected {
        line = line.style(Style::default().add_modifier(Modifier::REVERSED));
    }
    line
}

/// Cut the raw text at a display width boundary so one record stays one
/// terminal row.
fn truncated(raw: &str, width: usize) -> &str {
    if raw.width() <= width {
        return raw;
    }
    let mut end = 0;
    let mut used = 0;
    for (idx, ch) in raw.char_indices() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        end = idx + ch.len_utf8();
    }
    &raw[..end]
}

fn token_style(kind: TokenKind, text: &str, record: &LineRecord, theme: &Theme) -> Style {
    match kind {
        TokenKind::Timestamp => Style::default().fg(Color::Cyan),
        TokenKind::Level => level_style(record.level),
        TokenKind::Ip => Style::default().fg(Color::Yellow),
        TokenKind::StatusCode => status_style(text),
        TokenKind::Uuid => Style::default().fg(Color::Magenta),
        TokenKind::Url => Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::UNDERLINED),
        TokenKind::Number => Style::default().fg(Color::LightBlue),
        TokenKind::Quoted => Style::default().fg(Color::Green),
        TokenKind::Json => Style::default().fg(Color::LightGreen),
        TokenKind::Keyword | TokenKind::Default => Style::default().fg(theme.foreground),
    }
}

/// Level token coloring; also used by the status bar.
pub(super) fn level_style(level: Option<LogLevel>) -> Style {
    let style = Style::default().add_modifier(Modifier::BOLD);
    match level {
        Some(LogLevel::Trace) => style.fg(Color::DarkGray),
        Some(LogLevel::Debug) => style.fg(Color::LightBlue),
        Some(LogLevel::Info) => style.fg(Color::Green),
        Some(LogLevel::Warn) => style.fg(Color::Yellow),
        Some(LogLevel::Error) => style.fg(Color::Red),
        Some(LogLevel::Fatal) => style.fg(Color::LightMagenta),
        None => style,
    }
}

fn status_style(text: &str) -> Style {
    match text.as_bytes().first() {
        Some(b'2') => Style::default().fg(Color::Green),
        Some(b'3') => Style::default().fg(Color::Cyan),
        Some(b'4') => Style::default().fg(Color::Yellow),
        Some(b'5') => Style::default().fg(Color::Red),
        _ => Style::default(),
    }
}
