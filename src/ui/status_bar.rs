//! Footer status bar and the filter input prompt.

use super::Theme;
use crate::app::App;
use crate::record::PaneKind;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub(super) fn render_status_bar(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let stats = app.stats();
    let pane_name = match stats.active_pane {
        PaneKind::AllLogs => "all",
        PaneKind::Filtered => "filtered",
    };
    let counts = format!(
        " {} lines | {} filtered | pane: {} | files: {}{}{}",
        stats.total,
        stats.filtered,
        pane_name,
        stats.watched_files.len(),
        if stats.bookmark_count > 0 {
            format!(" | bookmarks: {}", stats.bookmark_count)
        } else {
            String::new()
        },
        if stats.paused { " | PAUSED" } else { "" },
    );

    // Status messages expire after three seconds; otherwise show the
    // filter summary or a key hint.
    let bottom = if let Some(message) = app.status_message() {
        Line::from(Span::styled(
            format!(" {}", message),
            Style::default().fg(Color::Green),
        ))
    } else if stats.has_filter {
        Line::from(Span::styled(
            format!(" {}", app.filter_summary()),
            Style::default().fg(theme.accent),
        ))
    } else {
        Line::from(Span::styled(
            " q - Quit | / - Filter | space - Pause | ? - Help",
            Style::default().fg(theme.dim),
        ))
    };

    let lines = vec![
        Line::from(Span::styled(
            counts,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        bottom,
    ];
    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(paragraph, area);
}

pub(super) fn render_filter_input(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let input = &app.search_input;
    let valid = app.filter.validate(input, false).is_ok();
    let border = if !valid {
        Color::Red
    } else if crate::filter::FilterEngine::is_advanced_query(input) {
        Color::Magenta
    } else {
        theme.accent
    };
    let label = if crate::filter::FilterEngine::is_advanced_query(input) {
        "Query"
    } else {
        "Filter"
    };

    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{}: ", label),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(input.as_str()),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(paragraph, area);
}
