//! Config error types with file locations and typo suggestions.

use std::fmt;
use std::path::PathBuf;
use strsim::jaro_winkler;

/// Known field names across the config schema, used for suggestions.
const KNOWN_FIELDS: &[&str] = &[
    "ui",
    "highlight_rules",
    "saved_queries",
    "keybindings",
    "general",
    "shortcuts",
    "theme",
    "context_lines",
    "max_buffer_lines",
    "refresh_rate_ms",
    "show_line_numbers",
    "name",
    "pattern",
    "color",
    "style",
    "query",
    "description",
    "is_regex",
    "log_level",
    "enable_telemetry",
    "max_index_size",
    "file_rotation_check_ms",
];

/// Similarity threshold for suggestions (0.0 - 1.0). 0.8 balances catching
/// typos against false positives.
const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Error loading, parsing or writing a config file.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading or writing the config file or its directory.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML parse error.
    Parse {
        path: PathBuf,
        message: String,
        line: Option<usize>,
        column: Option<usize>,
        suggestion: Option<String>,
    },

    /// Semantic error after parsing, or a serialization failure.
    Validation { path: PathBuf, message: String },
}

impl ConfigError {
    /// Build a parse error from a serde_yaml error, extracting the location
    /// and generating a suggestion for unknown fields.
    pub fn from_yaml_error(path: PathBuf, error: serde_yaml::Error) -> Self {
        let message = error.to_string();
        let (line, column) = match error.location() {
            Some(location) => (Some(location.line()), Some(location.column())),
            None => (None, None),
        };
        let suggestion = extract_unknown_field(&message).and_then(|f| find_suggestion(&f));
        ConfigError::Parse {
            path,
            message,
            line,
            column,
            suggestion,
        }
    }

    /// Format the error Cargo-style with a `-->` location line.
    pub fn format_cargo_style(&self) -> String {
        match self {
            ConfigError::Io { path, source } => {
                format!(
                    "error: cannot access config file\n  --> {}\n  |\n  = {}\n",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse {
                path,
                message,
                line,
                column,
                suggestion,
            } => {
                let location = match (line, column) {
                    (Some(l), Some(c)) => format!("{}:{}:{}", path.display(), l, c),
                    (Some(l), None) => format!("{}:{}", path.display(), l),
                    _ => format!("{}", path.display()),
                };
                let mut output = format!("error: {}\n  --> {}\n  |\n", message, location);
                if let Some(suggestion) = suggestion {
                    output.push_str(&format!("  = help: did you mean `{}`?\n", suggestion));
                }
                output
            }
            ConfigError::Validation { path, message } => {
                format!("error: {}\n  --> {}\n  |\n", message, path.display())
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_cargo_style())
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Extract the unknown field name from a serde error message.
///
/// `deny_unknown_fields` produces messages like:
/// "unknown field `fieldname`, expected one of `ui`, `general`".
fn extract_unknown_field(error_msg: &str) -> Option<String> {
    let prefix = "unknown field `";
    let start = error_msg.find(prefix)?;
    let rest = &error_msg[start + prefix.len()..];
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// Best suggestion for an unknown field by Jaro-Winkler similarity.
fn find_suggestion(unknown_field: &str) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for &known in KNOWN_FIELDS {
        let similarity = jaro_winkler(unknown_field, known);
        if similarity >= SIMILARITY_THRESHOLD
            && best.map_or(true, |(_, score)| similarity > score)
        {
            best = Some((known, similarity));
        }
    }
    best.map(|(field, _)| field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_unknown_field() {
        let msg = "unknown field `keybindngs`, expected one of `ui`, `keybindings`";
        assert_eq!(extract_unknown_field(msg), Some("keybindngs".to_string()));
        assert_eq!(extract_unknown_field("some other error"), None);
    }

    #[test]
    fn test_find_suggestion_typo() {
        assert_eq!(
            find_suggestion("keybindngs"),
            Some("keybindings".to_string())
        );
        assert_eq!(find_suggestion("them"), Some("theme".to_string()));
        assert_eq!(find_suggestion("zzzzz"), None);
    }

    #[test]
    fn test_parse_error_from_yaml() {
        let err = serde_yaml::from_str::<crate::config::Config>("ui: [\nbroken").unwrap_err();
        let config_err = ConfigError::from_yaml_error(PathBuf::from("/tmp/config.yaml"), err);
        match &config_err {
            ConfigError::Parse { path, .. } => {
                assert_eq!(path, &PathBuf::from("/tmp/config.yaml"));
            }
            other => panic!("expected Parse error, got {:?}", other),
        }
        assert!(config_err.to_string().contains("/tmp/config.yaml"));
    }

    #[test]
    fn test_unknown_field_suggestion_end_to_end() {
        let err =
            serde_yaml::from_str::<crate::config::Config>("keybindngs:\n  quit: q\n").unwrap_err();
        let config_err = ConfigError::from_yaml_error(PathBuf::from("/tmp/config.yaml"), err);
        let display = config_err.to_string();
        assert!(display.contains("keybindngs"));
        assert!(display.contains("did you mean `keybindings`?"));
    }

    #[test]
    fn test_display_io_error() {
        let err = ConfigError::Io {
            path: PathBuf::from("/etc/traceace/config.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let display = err.to_string();
        assert!(display.contains("cannot access config file"));
        assert!(display.contains("/etc/traceace/config.yaml"));
    }

    #[test]
    fn test_display_validation_error() {
        let err = ConfigError::Validation {
            path: PathBuf::from("/tmp/config.yaml"),
            message: "empty highlight pattern".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("empty highlight pattern"));
    }
}
