//! Host dependency detection and installation.
//!
//! # Modules
//!
//! - [`spec`] - Dependency descriptors, the package manager, built-in list
//! - [`version`] - Version extraction from tool output
//! - [`resolver`] - Check-then-install for each dependency

pub mod resolver;
pub mod spec;
pub mod version;

pub use resolver::{Presence, Resolution, Resolver};
pub use spec::{default_dependencies, DependencySpec, PackageManager, VendorInstaller};
pub use version::{extract_version, ToolVersion, VersionRequirement};
