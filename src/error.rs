//! Error types for deckhand operations.
//!
//! This module defines [`InstallerError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Process, download and version errors carry enough context to be shown
//!   to the user verbatim
//! - Use `anyhow::Error` (via `InstallerError::Other`) for unexpected errors
//! - The pipeline reduces any error to its `Display` text before reporting it,
//!   never a debug trace

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for deckhand operations.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The executable could not be started at all.
    #[error("Failed to launch '{program}': {message}")]
    Launch { program: String, message: String },

    /// The process ran but exited unsuccessfully.
    #[error("Command failed with exit code {code:?}: {command}")]
    NonZeroExit { command: String, code: Option<i32> },

    /// Elevation was required but refused or unavailable.
    #[error("Permission denied running '{program}': {message}")]
    PermissionDenied { program: String, message: String },

    /// A download failed (transport error or non-success status).
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// A tool is present but reports the wrong version.
    #[error("{name} {found} found, but {required}.x is required")]
    VersionMismatch {
        name: String,
        found: String,
        required: String,
    },

    /// Post-install verification gave up. Always advisory.
    #[error("Verification failed for '{artifact}' after {attempts} attempt(s)")]
    VerificationFailed { artifact: String, attempts: u32 },

    /// A dependency could not be installed.
    #[error("Could not install '{name}': {message}")]
    DependencyFailed { name: String, message: String },

    /// A pipeline step failed.
    #[error("{step}: {message}")]
    StepFailed { step: String, message: String },

    /// An archive could not be read or unpacked.
    #[error("Failed to extract {path}: {message}")]
    Archive { path: PathBuf, message: String },

    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InstallerError {
    /// Build a step failure from any error, keeping only its message.
    pub fn step(step: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::StepFailed {
            step: step.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error must never abort a pipeline.
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::VerificationFailed { .. })
    }
}

/// Result type alias for deckhand operations.
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_displays_program_and_message() {
        let err = InstallerError::Launch {
            program: "pnpm".into(),
            message: "No such file or directory".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pnpm"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn non_zero_exit_displays_command_and_code() {
        let err = InstallerError::NonZeroExit {
            command: "npm i -g pnpm".into(),
            code: Some(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("npm i -g pnpm"));
        assert!(msg.contains("1"));
    }

    #[test]
    fn version_mismatch_names_both_versions() {
        let err = InstallerError::VersionMismatch {
            name: "Node.js".into(),
            found: "v20.1.0".into(),
            required: "18.18".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("v20.1.0"));
        assert!(msg.contains("18.18"));
    }

    #[test]
    fn step_failed_is_stage_then_message() {
        let err = InstallerError::step("Creating homebrew directories", "read-only file system");
        assert_eq!(
            err.to_string(),
            "Creating homebrew directories: read-only file system"
        );
    }

    #[test]
    fn only_verification_is_advisory() {
        let verify = InstallerError::VerificationFailed {
            artifact: "aiohttp".into(),
            attempts: 3,
        };
        assert!(verify.is_advisory());

        let net = InstallerError::Network {
            url: "https://example.invalid".into(),
            message: "timeout".into(),
        };
        assert!(!net.is_advisory());
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: InstallerError = io_err.into();
        assert!(matches!(err, InstallerError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(InstallerError::ConfigValidationError {
                message: "test".into(),
            })
        }
        assert!(returns_error().is_err());
    }
}
