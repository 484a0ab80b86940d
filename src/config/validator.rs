//! Configuration validation rules.
//!
//! - Dependency names are unique and non-empty
//! - Every dependency has a package identifier
//! - Install templates reference the values they are given
//! - Verification makes at least one attempt

use crate::config::schema::DeckhandConfig;
use crate::error::{InstallerError, Result};
use crate::shell::CommandTemplate;
use std::collections::HashSet;

/// One broken rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    pub message: String,
    /// Dependency name if the error is dependency-specific
    pub dependency: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            dependency: None,
        }
    }

    fn for_dependency(rule: &str, name: &str, message: String) -> Self {
        Self {
            dependency: Some(name.to_string()),
            ..Self::new(rule, message)
        }
    }
}

/// Validate a configuration and return every error found.
pub fn validate_config(config: &DeckhandConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.release.trim().is_empty() {
        errors.push(ValidationError::new(
            "empty-release",
            "'release' must not be empty".to_string(),
        ));
    }

    if !references(&config.package_manager.install, "package_id") {
        errors.push(ValidationError::new(
            "install-template",
            format!(
                "Package manager install command '{}' must reference ${{package_id}}",
                config.package_manager.install
            ),
        ));
    }

    errors.extend(validate_dependencies(config));

    if config.verification.max_attempts == 0 {
        errors.push(ValidationError::new(
            "max-attempts",
            "verification.max_attempts must be at least 1".to_string(),
        ));
    }

    errors
}

fn validate_dependencies(config: &DeckhandConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for dep in &config.dependencies {
        if dep.name.trim().is_empty() {
            errors.push(ValidationError::new(
                "empty-name",
                "Dependency names must not be empty".to_string(),
            ));
            continue;
        }

        if !seen.insert(dep.name.as_str()) {
            errors.push(ValidationError::for_dependency(
                "duplicate-dependency",
                &dep.name,
                format!("Dependency '{}' is listed more than once", dep.name),
            ));
        }

        if dep.package_id.trim().is_empty() {
            errors.push(ValidationError::for_dependency(
                "missing-package-id",
                &dep.name,
                format!("Dependency '{}' has no package_id", dep.name),
            ));
        }

        if let Some(vendor) = &dep.vendor_installer {
            if !references(&vendor.command, "installer") {
                errors.push(ValidationError::for_dependency(
                    "vendor-template",
                    &dep.name,
                    format!(
                        "Vendor installer for '{}' must reference ${{installer}}",
                        dep.name
                    ),
                ));
            }
        }
    }

    errors
}

fn references(template: &CommandTemplate, var: &str) -> bool {
    template.variables().iter().any(|v| v == var)
}

/// Fail with every broken rule joined into one message.
pub fn ensure_valid(config: &DeckhandConfig) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(InstallerError::ConfigValidationError { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::{DependencySpec, VendorInstaller};

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&DeckhandConfig::default()).is_empty());
        assert!(ensure_valid(&DeckhandConfig::default()).is_ok());
    }

    #[test]
    fn duplicate_dependency_is_reported() {
        let mut config = DeckhandConfig::default();
        config.dependencies = vec![
            DependencySpec::new("Git", "Git.Git", &["git", "--version"]),
            DependencySpec::new("Git", "Git.Git", &["git", "--version"]),
        ];
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "duplicate-dependency");
        assert_eq!(errors[0].dependency.as_deref(), Some("Git"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = DeckhandConfig::default();
        config.release = " ".to_string();
        config.verification.max_attempts = 0;
        config.dependencies = vec![DependencySpec::new("Python", "", &[])];

        let rules: Vec<_> = validate_config(&config)
            .into_iter()
            .map(|e| e.rule)
            .collect();
        assert_eq!(rules, ["empty-release", "missing-package-id", "max-attempts"]);
    }

    #[test]
    fn install_template_must_use_package_id() {
        let mut config = DeckhandConfig::default();
        config.package_manager.install = CommandTemplate::new("brew", ["install", "node"]);
        let errors = validate_config(&config);
        assert_eq!(errors[0].rule, "install-template");
    }

    #[test]
    fn vendor_command_must_use_installer() {
        let mut config = DeckhandConfig::default();
        config.dependencies = vec![DependencySpec::new("Node.js", "nodejs", &["node", "--version"])
            .with_vendor_installer(VendorInstaller {
                url: "https://example.com/node.msi".to_string(),
                command: CommandTemplate::new("msiexec", ["/qn"]),
            })];

        let err = ensure_valid(&config).unwrap_err();
        assert!(err.to_string().contains("${installer}"));
    }
}
