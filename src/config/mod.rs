//! Configuration loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Layering in [`merger`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use deckhand::config::load_config;
//! use std::fs;
//! use tempfile::TempDir;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("deckhand.yml"), "release: v3.0.2").unwrap();
//!
//! let config = load_config(temp.path(), None).unwrap();
//! assert_eq!(config.release, "v3.0.2");
//! ```

pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use loader::{
    load_config, load_config_file, load_config_value, load_merged_config, parse_config,
    ConfigPaths, PROJECT_CONFIG,
};
pub use merger::{deep_merge, merge_configs};
pub use schema::{BuildSettings, DeckhandConfig, InstallMode, SteamSettings, DEFAULT_PREBUILT_URL};
pub use validator::{ensure_valid, validate_config, ValidationError};
