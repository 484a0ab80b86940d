//! Deckhand - installs the Decky plugin loader.
//!
//! Deckhand checks and installs the host toolchain, builds (or downloads)
//! the loader, and wires it into Steam. Work is split into ordered steps run
//! by a single-flight [`pipeline::Sequencer`] that reports through a
//! [`ui::StatusSink`].
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`fetch`] - Downloads and archive extraction
//! - [`pipeline`] - Install steps, plans and the sequencer
//! - [`requirements`] - Dependency detection and installation
//! - [`shell`] - Process execution and the search path
//! - [`ui`] - Status sinks and terminal output
//! - [`verify`] - Post-install verification with retries
//!
//! # Example
//!
//! ```
//! use deckhand::shell::CommandTemplate;
//! use std::collections::HashMap;
//!
//! let install = CommandTemplate::new("winget", ["install", "--id", "${package_id}"]);
//! let vars = HashMap::from([("package_id", "Git.Git".to_string())]);
//! let invocation = install.render(&vars).unwrap();
//! assert_eq!(invocation.command_line(), "winget install --id Git.Git");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod requirements;
pub mod shell;
pub mod ui;
pub mod verify;

pub use error::{InstallerError, Result};
