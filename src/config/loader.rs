//! Configuration file discovery and loading.

use crate::config::merger::merge_configs;
use crate::config::schema::DeckhandConfig;
use crate::config::validator::ensure_valid;
use crate::error::{InstallerError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Project config file name, looked up in the working directory.
pub const PROJECT_CONFIG: &str = "deckhand.yml";

/// Configuration files in merge order (later overrides earlier).
///
/// 1. User global config (`~/.deckhand/config.yml`)
/// 2. Project config (`./deckhand.yml`)
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user_global: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

impl ConfigPaths {
    /// Find the config files that exist for `project_root`.
    pub fn discover(project_root: &Path) -> Self {
        let user_global = dirs::home_dir().map(|h| h.join(".deckhand").join("config.yml"));
        Self {
            user_global: user_global.filter(|p| p.is_file()),
            project: Some(project_root.join(PROJECT_CONFIG)).filter(|p| p.is_file()),
        }
    }

    pub fn all_existing(&self) -> Vec<&PathBuf> {
        self.user_global.iter().chain(self.project.iter()).collect()
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InstallerError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            InstallerError::Io(e)
        }
    })
}

/// Load and parse a single file.
///
/// # Errors
///
/// `ConfigNotFound` if the file doesn't exist, `ConfigParseError` if the
/// YAML does not match the schema.
pub fn load_config_file(path: &Path) -> Result<DeckhandConfig> {
    let content = read_file(path)?;
    parse_config(&content, path)
}

/// Parse YAML content. An empty document yields the defaults.
pub fn parse_config(content: &str, source_path: &Path) -> Result<DeckhandConfig> {
    if content.trim().is_empty() {
        return Ok(DeckhandConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| InstallerError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a file as a raw YAML value, for merging.
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = read_file(path)?;
    serde_yaml::from_str(&content).map_err(|e| InstallerError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge every discovered file over the defaults.
pub fn load_merged_config(project_root: &Path) -> Result<DeckhandConfig> {
    let paths = ConfigPaths::discover(project_root);
    let existing = paths.all_existing();
    if existing.is_empty() {
        tracing::debug!("No configuration files found, using defaults");
        return Ok(DeckhandConfig::default());
    }

    let layers = existing
        .iter()
        .map(|p| {
            tracing::debug!("Loading config layer {}", p.display());
            load_config_value(p)
        })
        .collect::<Result<Vec<_>>>()?;

    serde_yaml::from_value(merge_configs(layers)).map_err(|e| InstallerError::ConfigParseError {
        path: project_root.join(PROJECT_CONFIG),
        message: format!("Failed to parse merged config: {}", e),
    })
}

/// Load and validate the configuration.
///
/// An explicit `config_override` must exist and is loaded on its own.
/// Otherwise discovered files are merged, falling back to the defaults.
pub fn load_config(project_root: &Path, config_override: Option<&Path>) -> Result<DeckhandConfig> {
    let config = match config_override {
        Some(path) => load_config_file(path)?,
        None => load_merged_config(project_root)?,
    };
    ensure_valid(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InstallMode;
    use tempfile::TempDir;

    #[test]
    fn discover_finds_project_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_CONFIG), "release: v3").unwrap();

        let paths = ConfigPaths::discover(temp.path());
        assert_eq!(paths.project, Some(temp.path().join(PROJECT_CONFIG)));
    }

    #[test]
    fn discover_ignores_missing_project_config() {
        let temp = TempDir::new().unwrap();
        assert!(ConfigPaths::discover(temp.path()).project.is_none());
    }

    #[test]
    fn load_config_file_parses_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "release: v3.0.2\nmode: prebuilt").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.release, "v3.0.2");
        assert_eq!(config.mode, InstallMode::Prebuilt);
    }

    #[test]
    fn load_config_file_reports_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = load_config_file(&temp.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, InstallerError::ConfigNotFound { .. }));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = parse_config("release: [unclosed", Path::new("broken.yml")).unwrap_err();
        match err {
            InstallerError::ConfigParseError { path, .. } => {
                assert_eq!(path, PathBuf::from("broken.yml"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("  \n", Path::new("empty.yml")).unwrap();
        assert_eq!(config, DeckhandConfig::default());
    }

    #[test]
    fn project_file_is_loaded_without_override() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG),
            "steam:\n  autostart: false\n",
        )
        .unwrap();

        let config = load_config(temp.path(), None).unwrap();
        assert!(!config.steam.autostart);
        assert!(config.steam.shortcut);
    }

    #[test]
    fn override_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.yml");
        assert!(load_config(temp.path(), Some(&missing)).is_err());
    }

    #[test]
    fn invalid_config_fails_validation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yml");
        fs::write(&path, "verification:\n  max_attempts: 0\n").unwrap();

        let err = load_config(temp.path(), Some(&path)).unwrap_err();
        assert!(matches!(err, InstallerError::ConfigValidationError { .. }));
    }
}
