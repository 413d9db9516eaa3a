//! Config directory resolution, loading and saving.
//!
//! `XDG_CONFIG_HOME` selects the config root (default `$HOME/.config`); the
//! application directory is `<root>/traceace/` with `config.yaml` inside.
//! On first run the file is created with defaults.

use crate::config::{Config, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve (and create) the application config directory.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let root = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .map(|home| home.join(".config"))
            .ok_or_else(|| ConfigError::Validation {
                path: PathBuf::from("~"),
                message: "cannot determine home directory".to_string(),
            })?,
    };
    let app_dir = root.join("traceace");
    fs::create_dir_all(&app_dir).map_err(|source| ConfigError::Io {
        path: app_dir.clone(),
        source,
    })?;
    Ok(app_dir)
}

/// The effective config file path: an explicit override, or
/// `<config_dir>/config.yaml`.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config_dir()?.join("config.yaml")),
    }
}

/// Load the configuration, creating the file with defaults on first run.
/// Returns the config together with the path it came from.
pub fn load(explicit: Option<&Path>) -> Result<(Config, PathBuf), ConfigError> {
    let path = config_path(explicit)?;
    if !path.exists() {
        let config = Config::default();
        save(&config, &path)?;
        return Ok((config, path));
    }
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = serde_yaml::from_str(&content)
        .map_err(|e| ConfigError::from_yaml_error(path.clone(), e))?;
    Ok((config, path))
}

/// Serialize the configuration back to its YAML file.
pub fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::Validation {
        path: path.to_path_buf(),
        message: format!("cannot serialize config: {}", e),
    })?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SavedQuery;
    use tempfile::tempdir;

    #[test]
    fn test_first_run_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let (config, loaded_from) = load(Some(&path)).unwrap();
        assert_eq!(loaded_from, path);
        assert!(path.exists());
        assert_eq!(config, Config::default());

        // Loading again reads the file instead of rewriting it.
        let (again, _) = load(Some(&path)).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.ui.theme = "light".to_string();
        config.ui.context_lines = 7;
        config
            .shortcuts
            .insert("mine".to_string(), "user.id:u-1".to_string());
        save(&config, &path).unwrap();

        let (loaded, _) = load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_error_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "ui: [\nbroken").unwrap();
        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn test_add_saved_query_rewrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let (mut config, _) = load(Some(&path)).unwrap();
        let count = config.saved_queries.len();

        config
            .add_saved_query(
                SavedQuery {
                    name: "gateway".to_string(),
                    query: "status:>=502".to_string(),
                    description: "gateway failures".to_string(),
                    is_regex: false,
                },
                &path,
            )
            .unwrap();

        let (reloaded, _) = load(Some(&path)).unwrap();
        assert_eq!(reloaded.saved_queries.len(), count + 1);
        assert!(reloaded.saved_query("gateway").is_some());

        // Adding the same name replaces in place.
        config
            .add_saved_query(
                SavedQuery {
                    name: "gateway".to_string(),
                    query: "status:>=500".to_string(),
                    description: String::new(),
                    is_regex: false,
                },
                &path,
            )
            .unwrap();
        let (reloaded, _) = load(Some(&path)).unwrap();
        assert_eq!(reloaded.saved_queries.len(), count + 1);
        assert_eq!(
            reloaded.saved_query("gateway").unwrap().query,
            "status:>=500"
        );
    }

    #[test]
    fn test_remove_saved_query_rewrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let (mut config, _) = load(Some(&path)).unwrap();
        assert!(config.saved_query("errors").is_some());

        config.remove_saved_query("errors", &path).unwrap();
        let (reloaded, _) = load(Some(&path)).unwrap();
        assert!(reloaded.saved_query("errors").is_none());

        // Removing an unknown name is a no-op.
        config.remove_saved_query("does-not-exist", &path).unwrap();
    }
}
