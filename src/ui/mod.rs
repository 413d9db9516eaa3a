//! Terminal rendering: log panes, filter prompt, status bar and help
//! overlay.
//!
//! The view layer is read-only over the coordinator: it pulls immutable
//! snapshots through `App::viewport` and `App::stats` and maps records to
//! styled lines via the highlighter. Nothing here touches the ingest path.

pub mod help;
pub mod keymap;
pub mod log_view;
pub mod status_bar;

use crate::app::App;
use crate::record::PaneKind;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Color;
use ratatui::Frame;

/// Palette derived from the configured theme name.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub foreground: Color,
    pub dim: Color,
    pub accent: Color,
    pub border_active: Color,
    pub monochrome: bool,
}

impl Theme {
    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Theme {
                foreground: Color::Black,
                dim: Color::DarkGray,
                accent: Color::Blue,
                border_active: Color::Blue,
                monochrome: false,
            },
            "monochrome" => Theme {
                foreground: Color::White,
                dim: Color::Gray,
                accent: Color::White,
                border_active: Color::White,
                monochrome: true,
            },
            _ => Theme {
                foreground: Color::White,
                dim: Color::DarkGray,
                accent: Color::Cyan,
                border_active: Color::Cyan,
                monochrome: false,
            },
        }
    }
}

/// Draw one frame. The filtered pane appears only while a filter is
/// installed.
pub fn render(f: &mut Frame, app: &mut App) {
    let theme = Theme::from_name(&app.config.ui.theme);
    let area = f.area();

    let mut constraints = vec![Constraint::Min(5)];
    if app.search_active {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(4));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let panes_area = rows[0];
    if app.filter.has_filter() {
        let panes = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(panes_area);
        log_view::render_pane(f, panes[0], app, PaneKind::AllLogs, &theme);
        log_view::render_pane(f, panes[1], app, PaneKind::Filtered, &theme);
    } else {
        log_view::render_pane(f, panes_area, app, PaneKind::AllLogs, &theme);
    }

    let mut next_row = 1;
    if app.search_active {
        status_bar::render_filter_input(f, rows[next_row], app, &theme);
        next_row += 1;
    }
    status_bar::render_status_bar(f, rows[next_row], app, &theme);

    if app.show_help {
        help::render_help(f, area, app, &theme);
    }
}

/// Centered sub-rectangle used by overlays.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
