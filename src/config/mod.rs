//! Application configuration: YAML-backed, created with defaults on first
//! run, rewritten whenever saved queries change.

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use loader::{config_dir, load, save};

use crate::record::SavedQuery;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ui: UiConfig,
    pub highlight_rules: Vec<HighlightRule>,
    pub saved_queries: Vec<SavedQuery>,
    pub keybindings: BTreeMap<String, String>,
    pub general: GeneralConfig,
    /// Extra single-word query shortcuts, merged over the built-in table.
    pub shortcuts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    pub theme: String,
    pub context_lines: usize,
    pub max_buffer_lines: usize,
    pub refresh_rate_ms: u64,
    pub show_line_numbers: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            theme: "dark".to_string(),
            context_lines: 3,
            // Large window so busy services keep useful history in memory.
            max_buffer_lines: 1_000_000,
            refresh_rate_ms: 50,
            show_line_numbers: true,
        }
    }
}

/// A syntax highlighting rule applied lazily at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightRule {
    pub name: String,
    pub pattern: String,
    pub color: String,
    pub style: String,
}

impl Default for HighlightRule {
    fn default() -> Self {
        HighlightRule {
            name: String::new(),
            pattern: String::new(),
            color: "white".to_string(),
            style: "normal".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub log_level: String,
    pub enable_telemetry: bool,
    pub max_index_size: u64,
    pub file_rotation_check_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
            enable_telemetry: false,
            max_index_size: 100 * 1024 * 1024,
            file_rotation_check_ms: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ui: UiConfig::default(),
            highlight_rules: default_highlight_rules(),
            saved_queries: default_saved_queries(),
            keybindings: default_keybindings(),
            general: GeneralConfig::default(),
            shortcuts: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Key bound to `action`, falling back to the built-in defaults when the
    /// user removed an entry.
    pub fn keybinding(&self, action: &str) -> Option<String> {
        if let Some(key) = self.keybindings.get(action) {
            return Some(key.clone());
        }
        default_keybindings().get(action).cloned()
    }

    pub fn saved_query(&self, name: &str) -> Option<&SavedQuery> {
        self.saved_queries.iter().find(|q| q.name == name)
    }

    /// Insert or replace a saved query and rewrite the config file.
    pub fn add_saved_query(&mut self, query: SavedQuery, path: &Path) -> Result<(), ConfigError> {
        match self.saved_queries.iter_mut().find(|q| q.name == query.name) {
            Some(existing) => *existing = query,
            None => self.saved_queries.push(query),
        }
        save(self, path)
    }

    /// Remove a saved query by name and rewrite the config file. Removing a
    /// name that does not exist is not an error.
    pub fn remove_saved_query(&mut self, name: &str, path: &Path) -> Result<(), ConfigError> {
        let before = self.saved_queries.len();
        self.saved_queries.retain(|q| q.name != name);
        if self.saved_queries.len() != before {
            save(self, path)?;
        }
        Ok(())
    }
}

fn default_highlight_rules() -> Vec<HighlightRule> {
    let rule = |name: &str, pattern: &str, color: &str, style: &str| HighlightRule {
        name: name.to_string(),
        pattern: pattern.to_string(),
        color: color.to_string(),
        style: style.to_string(),
    };
    vec![
        rule(
            "timestamp",
            r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}",
            "cyan",
            "normal",
        ),
        rule(
            "loglevel",
            r"\b(ERROR|WARN|INFO|DEBUG|TRACE|FATAL)\b",
            "auto",
            "bold",
        ),
        rule("ip_address", r"\b(?:\d{1,3}\.){3}\d{1,3}\b", "yellow", "normal"),
        rule("status_code", r"\b[1-5]\d{2}\b", "auto", "normal"),
        rule(
            "uuid",
            r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
            "magenta",
            "normal",
        ),
        rule("url", r"https?://[^\s]+", "blue", "underline"),
    ]
}

fn default_saved_queries() -> Vec<SavedQuery> {
    vec![
        SavedQuery {
            name: "errors".to_string(),
            query: "level:ERROR".to_string(),
            description: "Show all error level logs".to_string(),
            is_regex: false,
        },
        SavedQuery {
            name: "warnings_and_errors".to_string(),
            query: "level:ERROR OR level:WARN".to_string(),
            description: "Show warnings and errors".to_string(),
            is_regex: false,
        },
    ]
}

fn default_keybindings() -> BTreeMap<String, String> {
    [
        ("search", "/"),
        ("escape", "esc"),
        ("next_match", "n"),
        ("prev_match", "N"),
        ("pause_resume", "space"),
        ("bookmark", "b"),
        ("export", "e"),
        ("toggle_view", "t"),
        ("clear_filter", "c"),
        ("help", "?"),
        ("quit", "q"),
        ("scroll_up", "k"),
        ("scroll_down", "j"),
        ("page_up", "ctrl+u"),
        ("page_down", "ctrl+d"),
        ("goto_top", "g"),
        ("goto_bottom", "G"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sensible() {
        let cfg = Config::default();
        assert_eq!(cfg.ui.theme, "dark");
        assert_eq!(cfg.ui.max_buffer_lines, 1_000_000);
        assert!(cfg.ui.show_line_numbers);
        assert_eq!(cfg.general.file_rotation_check_ms, 1000);
        assert_eq!(cfg.highlight_rules.len(), 6);
        assert_eq!(cfg.saved_queries.len(), 2);
        assert!(cfg.keybinding("quit").is_some());
    }

    #[test]
    fn test_keybinding_falls_back_to_defaults() {
        let mut cfg = Config::default();
        cfg.keybindings.clear();
        assert_eq!(cfg.keybinding("search").as_deref(), Some("/"));
        cfg.keybindings
            .insert("search".to_string(), "s".to_string());
        assert_eq!(cfg.keybinding("search").as_deref(), Some("s"));
        assert!(cfg.keybinding("no_such_action").is_none());
    }

    #[test]
    fn test_yaml_round_trip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("ui:\n  theme: light\n").unwrap();
        assert_eq!(cfg.ui.theme, "light");
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.ui.max_buffer_lines, 1_000_000);
        assert_eq!(cfg.saved_queries.len(), 2);
    }
}
