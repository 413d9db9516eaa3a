//! Keybinding resolution: config strings like `ctrl+d` or `G` map to
//! actions.

use crate::config::Config;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

/// Everything a key can do in the main view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Search,
    Escape,
    NextMatch,
    PrevMatch,
    PauseResume,
    Bookmark,
    Export,
    ToggleView,
    ClearFilter,
    Help,
    Quit,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    GotoTop,
    GotoBottom,
}

impl Action {
    /// Config action names, in the order shown by the help overlay.
    pub const ALL: &'static [(Action, &'static str, &'static str)] = &[
        (Action::Search, "search", "enter a filter query"),
        (Action::Escape, "escape", "close overlay / cancel input"),
        (Action::NextMatch, "next_match", "jump to next match"),
        (Action::PrevMatch, "prev_match", "jump to previous match"),
        (Action::PauseResume, "pause_resume", "pause or resume the stream"),
        (Action::Bookmark, "bookmark", "bookmark the selected line"),
        (Action::Export, "export", "export the active pane"),
        (Action::ToggleView, "toggle_view", "switch between panes"),
        (Action::ClearFilter, "clear_filter", "clear the filter"),
        (Action::Help, "help", "toggle this help"),
        (Action::Quit, "quit", "quit"),
        (Action::ScrollUp, "scroll_up", "scroll up one line"),
        (Action::ScrollDown, "scroll_down", "scroll down one line"),
        (Action::PageUp, "page_up", "scroll up one page"),
        (Action::PageDown, "page_down", "scroll down one page"),
        (Action::GotoTop, "goto_top", "jump to the oldest line"),
        (Action::GotoBottom, "goto_bottom", "jump to the newest line (follow)"),
    ];
}

/// A key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

/// Parse a config key string (`/`, `esc`, `space`, `ctrl+d`, `G`).
pub fn parse_binding(spec: &str) -> Option<KeyBinding> {
    let mut modifiers = KeyModifiers::NONE;
    let mut key = spec.trim();
    while let Some((prefix, rest)) = key.split_once('+') {
        match prefix.to_ascii_lowercase().as_str() {
            "ctrl" => modifiers |= KeyModifiers::CONTROL,
            "alt" => modifiers |= KeyModifiers::ALT,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            _ => return None,
        }
        key = rest;
    }
    let code = match key.to_ascii_lowercase().as_str() {
        "esc" | "escape" => KeyCode::Esc,
        "space" => KeyCode::Char(' '),
        "tab" => KeyCode::Tab,
        "enter" => KeyCode::Enter,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        _ => {
            let mut chars = key.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            KeyCode::Char(c)
        }
    };
    Some(KeyBinding { code, modifiers })
}

/// Compiled action table for the main view.
pub struct KeyMap {
    bindings: HashMap<KeyBinding, Action>,
}

impl KeyMap {
    pub fn from_config(config: &Config) -> Self {
        let mut bindings = HashMap::new();
        for (action, name, _) in Action::ALL {
            if let Some(binding) = config.keybinding(name).as_deref().and_then(parse_binding) {
                bindings.insert(binding, *action);
            }
        }
        // Arrow keys always work alongside the configured vi-style keys.
        bindings.insert(
            KeyBinding {
                code: KeyCode::Up,
                modifiers: KeyModifiers::NONE,
            },
            Action::ScrollUp,
        );
        bindings.insert(
            KeyBinding {
                code: KeyCode::Down,
                modifiers: KeyModifiers::NONE,
            },
            Action::ScrollDown,
        );
        KeyMap { bindings }
    }

    /// Resolve a terminal key event. Shift is folded into the character for
    /// `Char` codes, so `G` matches whether or not the terminal reports the
    /// SHIFT modifier.
    pub fn action(&self, event: &KeyEvent) -> Option<Action> {
        let mut modifiers = event.modifiers;
        if matches!(event.code, KeyCode::Char(_)) {
            modifiers -= KeyModifiers::SHIFT;
        }
        self.bindings
            .get(&KeyBinding {
                code: event.code,
                modifiers,
            })
            .copied()
    }

    /// The key bound to an action, for the help overlay.
    pub fn binding_for(&self, action: Action) -> Option<KeyBinding> {
        self.bindings
            .iter()
            .find(|(_, a)| **a == action)
            .map(|(binding, _)| *binding)
    }
}

/// Human-readable form of a binding for the help overlay.
pub fn describe_binding(binding: KeyBinding) -> String {
    let mut parts = Vec::new();
    if binding.modifiers.contains(KeyModifiers::CONTROL) {
        parts.push("ctrl".to_string());
    }
    if binding.modifiers.contains(KeyModifiers::ALT) {
        parts.push("alt".to_string());
    }
    let key = match binding.code {
        KeyCode::Esc => "esc".to_string(),
        KeyCode::Tab => "tab".to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Up => "up".to_string(),
        KeyCode::Down => "down".to_string(),
        KeyCode::Char(' ') => "space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        other => format!("{:?}", other).to_lowercase(),
    };
    parts.push(key);
    parts.join("+")
}
