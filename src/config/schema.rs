//! Configuration file schema.
//!
//! Every section is optional; an empty file (or no file at all) yields the
//! built-in defaults for the host platform.
//!
//! ```yaml
//! release: v3.0.2
//! mode: build
//! dependencies:
//!   - name: Node.js
//!     package_id: OpenJS.NodeJS
//!     check: [node, --version]
//!     version: "18.18"
//! verification:
//!   max_attempts: 3
//! steam:
//!   autostart: false
//! ```

use crate::requirements::{default_dependencies, DependencySpec, PackageManager};
use crate::shell::platform::home_dir;
use crate::shell::CommandTemplate;
use crate::verify::VerifyPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Nightly Windows build of the loader.
pub const DEFAULT_PREBUILT_URL: &str =
    "https://nightly.link/SteamDeckHomebrew/decky-loader/workflows/build-win/main/PluginLoader%20Win.zip";

fn default_release() -> String {
    "main".to_string()
}

fn default_prebuilt_url() -> String {
    DEFAULT_PREBUILT_URL.to_string()
}

fn default_true() -> bool {
    true
}

/// Which pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Install the toolchain and run the build script.
    #[default]
    Build,
    /// Download and unpack a prebuilt loader.
    Prebuilt,
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckhandConfig {
    /// Release tag or branch passed to the build script.
    #[serde(default = "default_release")]
    pub release: String,

    #[serde(default)]
    pub mode: InstallMode,

    #[serde(default = "PackageManager::host_default")]
    pub package_manager: PackageManager,

    /// Host dependencies, installed in this order.
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<DependencySpec>,

    #[serde(default)]
    pub verification: VerifyPolicy,

    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub steam: SteamSettings,

    #[serde(default = "default_prebuilt_url")]
    pub prebuilt_url: String,

    /// Defaults to `~/homebrew`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homebrew_dir: Option<PathBuf>,
}

impl Default for DeckhandConfig {
    fn default() -> Self {
        Self {
            release: default_release(),
            mode: InstallMode::default(),
            package_manager: PackageManager::host_default(),
            dependencies: default_dependencies(),
            verification: VerifyPolicy::default(),
            build: BuildSettings::default(),
            steam: SteamSettings::default(),
            prebuilt_url: default_prebuilt_url(),
            homebrew_dir: None,
        }
    }
}

impl DeckhandConfig {
    pub fn homebrew_root(&self) -> PathBuf {
        self.homebrew_dir
            .clone()
            .unwrap_or_else(|| home_dir().join("homebrew"))
    }

    /// Where the loader executables live.
    pub fn services_dir(&self) -> PathBuf {
        self.homebrew_root().join("services")
    }
}

/// The external build script and the JavaScript build tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_script")]
    pub script: PathBuf,

    /// Defaults to the current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default = "default_tool_check")]
    pub tool_check: CommandTemplate,

    #[serde(default = "default_tool_install")]
    pub tool_install: CommandTemplate,
}

fn default_interpreter() -> String {
    if cfg!(windows) { "python" } else { "python3" }.to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("decky_builder.py")
}

fn default_tool_check() -> CommandTemplate {
    CommandTemplate::new("pnpm", ["--version"])
}

fn default_tool_install() -> CommandTemplate {
    CommandTemplate::new("npm", ["i", "-g", "pnpm"])
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: default_script(),
            working_dir: None,
            tool_check: default_tool_check(),
            tool_install: default_tool_install(),
        }
    }
}

impl BuildSettings {
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Steam integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteamSettings {
    /// Steam install directory; located automatically when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Create a launcher that starts Steam with `-dev`.
    #[serde(default = "default_true")]
    pub shortcut: bool,

    /// Start the loader at login.
    #[serde(default = "default_true")]
    pub autostart: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart_dir: Option<PathBuf>,
}

impl Default for SteamSettings {
    fn default() -> Self {
        Self {
            path: None,
            shortcut: true,
            autostart: true,
            shortcut_dir: None,
            autostart_dir: None,
        }
    }
}

impl SteamSettings {
    /// Desktop on Windows, the applications menu elsewhere.
    pub fn shortcut_dir(&self) -> PathBuf {
        if let Some(dir) = &self.shortcut_dir {
            return dir.clone();
        }
        if cfg!(windows) {
            dirs::desktop_dir().unwrap_or_else(|| home_dir().join("Desktop"))
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| home_dir().join(".local").join("share"))
                .join("applications")
        }
    }

    /// The per-user Startup folder on Windows, `~/.config/autostart` elsewhere.
    pub fn autostart_dir(&self) -> PathBuf {
        if let Some(dir) = &self.autostart_dir {
            return dir.clone();
        }
        let config = dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"));
        if cfg!(windows) {
            config
                .join("Microsoft")
                .join("Windows")
                .join("Start Menu")
                .join("Programs")
                .join("Startup")
        } else {
            config.join("autostart")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config: DeckhandConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, DeckhandConfig::default());
        assert_eq!(config.release, "main");
        assert_eq!(config.mode, InstallMode::Build);
        assert_eq!(config.dependencies.len(), 3);
    }

    #[test]
    fn parses_mode_and_partial_sections() {
        let yaml = r#"
release: v3.0.2
mode: prebuilt
verification:
  max_attempts: 5
steam:
  autostart: false
"#;
        let config: DeckhandConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mode, InstallMode::Prebuilt);
        assert_eq!(config.verification.max_attempts, 5);
        assert_eq!(config.verification.retry_delay_secs, 2);
        assert!(!config.steam.autostart);
        assert!(config.steam.shortcut);
    }

    #[test]
    fn homebrew_paths_follow_override() {
        let config = DeckhandConfig {
            homebrew_dir: Some(PathBuf::from("/srv/homebrew")),
            ..Default::default()
        };
        assert_eq!(config.services_dir(), PathBuf::from("/srv/homebrew/services"));
    }

    #[test]
    fn explicit_steam_dirs_win() {
        let steam = SteamSettings {
            shortcut_dir: Some(PathBuf::from("/tmp/desk")),
            autostart_dir: Some(PathBuf::from("/tmp/auto")),
            ..Default::default()
        };
        assert_eq!(steam.shortcut_dir(), PathBuf::from("/tmp/desk"));
        assert_eq!(steam.autostart_dir(), PathBuf::from("/tmp/auto"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let parsed: Result<DeckhandConfig, _> = serde_yaml::from_str("mode: sideways");
        assert!(parsed.is_err());
    }
}
