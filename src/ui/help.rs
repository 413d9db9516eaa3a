//! Help overlay listing the effective keybindings.

use super::keymap::{describe_binding, Action, KeyMap};
use super::{centered_rect, Theme};
use crate::app::App;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

pub(super) fn render_help(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let keymap = KeyMap::from_config(&app.config);
    let mut lines = vec![Line::from(""), Line::from("  Keybindings"), Line::from("")];
    for (action, name, description) in Action::ALL {
        let key = keymap
            .binding_for(*action)
            .map(describe_binding)
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<10}", key),
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{:<14} {}", name, description)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  Query examples: level:ERROR AND status:>=500, ~conn.*refused,",
        Style::default().fg(theme.dim),
    )));
    lines.push(Line::from(Span::styled(
        "  time:[14:00:00 TO 15:00:00], errors, 5xx, last_hour",
        Style::default().fg(theme.dim),
    )));

    let overlay = centered_rect(70, 80, area);
    f.render_widget(Clear, overlay);
    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Help "));
    f.render_widget(paragraph, overlay);
}
