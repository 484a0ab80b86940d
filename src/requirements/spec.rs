//! Dependency descriptors and the host package manager.

use crate::error::Result;
use crate::requirements::version::VersionRequirement;
use crate::shell::template::{parse_interpolation, CommandTemplate, Segment};
use crate::shell::ProcessInvocation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// One tool the host must have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Display name, e.g. "Node.js".
    pub name: String,

    /// Identifier passed to the package manager.
    pub package_id: String,

    /// Presence check argv. Empty means "always install".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check: Vec<String>,

    /// Failure to provide a required dependency aborts the pipeline.
    #[serde(default = "default_true")]
    pub required: bool,

    /// Exact `major.minor` the check output must report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionRequirement>,

    /// Direct download used when the package manager fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_installer: Option<VendorInstaller>,

    /// Directories the install is known to add to the search path.
    /// `${VAR}` references are expanded from the environment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_hints: Vec<String>,
}

impl DependencySpec {
    /// A required dependency checked with `check`.
    pub fn new(name: &str, package_id: &str, check: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            package_id: package_id.to_string(),
            check: check.iter().map(|s| s.to_string()).collect(),
            required: true,
            version: None,
            vendor_installer: None,
            path_hints: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_version(mut self, version: VersionRequirement) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_vendor_installer(mut self, vendor: VendorInstaller) -> Self {
        self.vendor_installer = Some(vendor);
        self
    }

    pub fn with_path_hint(mut self, hint: &str) -> Self {
        self.path_hints.push(hint.to_string());
        self
    }

    /// The presence check as a capture-only invocation, if there is one.
    pub fn check_invocation(&self) -> Option<ProcessInvocation> {
        let (program, args) = self.check.split_first()?;
        Some(
            ProcessInvocation::new(program.clone())
                .args(args.iter().cloned())
                .quiet(),
        )
    }

    /// Path hints with environment references expanded.
    ///
    /// Hints that reference an unset variable are dropped.
    pub fn expanded_path_hints(&self) -> Vec<PathBuf> {
        self.path_hints
            .iter()
            .filter_map(|hint| expand_env(hint))
            .collect()
    }
}

/// Expand `${VAR}` references from the process environment.
pub fn expand_env(input: &str) -> Option<PathBuf> {
    let mut out = String::new();
    for segment in parse_interpolation(input) {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Variable(name) => out.push_str(&std::env::var(&name).ok()?),
        }
    }
    Some(PathBuf::from(out))
}

/// A vendor installer: download `url`, then run `command` elevated.
///
/// `${installer}` in the command is replaced with the downloaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorInstaller {
    pub url: String,
    pub command: CommandTemplate,
}

/// The host package manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManager {
    pub name: String,

    /// Confirms the package manager itself runs.
    pub check: CommandTemplate,

    /// Non-interactive install; `${package_id}` is substituted.
    pub install: CommandTemplate,

    #[serde(default)]
    pub elevated: bool,
}

impl PackageManager {
    /// The default for the platform this binary was built for.
    pub fn host_default() -> Self {
        if cfg!(windows) {
            Self::winget()
        } else {
            Self::apt()
        }
    }

    pub fn winget() -> Self {
        Self {
            name: "winget".to_string(),
            check: CommandTemplate::new("winget", ["--version"]),
            install: CommandTemplate::new(
                "winget",
                [
                    "install",
                    "--id",
                    "${package_id}",
                    "-e",
                    "--silent",
                    "--accept-package-agreements",
                    "--accept-source-agreements",
                ],
            ),
            elevated: false,
        }
    }

    pub fn apt() -> Self {
        Self {
            name: "apt-get".to_string(),
            check: CommandTemplate::new("apt-get", ["--version"]),
            install: CommandTemplate::new("apt-get", ["install", "-y", "${package_id}"]),
            elevated: true,
        }
    }

    /// The install invocation for `spec`.
    pub fn install_invocation(&self, spec: &DependencySpec) -> Result<ProcessInvocation> {
        let vars = HashMap::from([("package_id", spec.package_id.clone())]);
        Ok(self.install.render(&vars)?.elevated(self.elevated))
    }

    /// The self-check invocation.
    pub fn check_invocation(&self) -> Result<ProcessInvocation> {
        Ok(self.check.render(&HashMap::new())?.quiet())
    }
}

/// Node.js 18.18 Windows installer, used when winget cannot provide it.
pub const NODE_MSI_URL: &str = "https://nodejs.org/dist/v18.18.0/node-v18.18.0-x64.msi";

/// The built-in dependency list for this platform, in install order.
pub fn default_dependencies() -> Vec<DependencySpec> {
    if cfg!(windows) {
        vec![
            DependencySpec::new("Python", "Python.Python.3.11", &["python", "--version"]),
            DependencySpec::new("Git", "Git.Git", &["git", "--version"])
                .with_path_hint("${ProgramFiles}\\Git\\cmd"),
            DependencySpec::new("Node.js", "OpenJS.NodeJS", &["node", "--version"])
                .with_version(VersionRequirement::new(18, 18))
                .with_vendor_installer(VendorInstaller {
                    url: NODE_MSI_URL.to_string(),
                    command: CommandTemplate::new("msiexec", ["/i", "${installer}", "/qn"]),
                })
                .with_path_hint("${ProgramFiles}\\nodejs")
                .with_path_hint("${APPDATA}\\npm"),
        ]
    } else {
        vec![
            DependencySpec::new("Python", "python3", &["python3", "--version"]),
            DependencySpec::new("Git", "git", &["git", "--version"]),
            DependencySpec::new("Node.js", "nodejs", &["node", "--version"])
                .with_version(VersionRequirement::new(18, 18)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_python_git_node() {
        let names: Vec<_> = default_dependencies().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Python", "Git", "Node.js"]);
    }

    #[test]
    fn node_requires_exact_minor() {
        let deps = default_dependencies();
        let node = deps.iter().find(|d| d.name == "Node.js").unwrap();
        assert_eq!(node.version, Some(VersionRequirement::new(18, 18)));
    }

    #[test]
    fn empty_check_has_no_invocation() {
        let spec = DependencySpec::new("Anything", "anything", &[]);
        assert!(spec.check_invocation().is_none());
    }

    #[test]
    fn check_invocation_is_quiet() {
        let spec = DependencySpec::new("Git", "git", &["git", "--version"]);
        let inv = spec.check_invocation().unwrap();
        assert_eq!(inv.command_line(), "git --version");
        assert_eq!(inv.capture, crate::shell::CaptureMode::Capture);
    }

    #[test]
    fn install_invocation_substitutes_package_id() {
        let spec = DependencySpec::new("Git", "Git.Git", &["git", "--version"]);
        let inv = PackageManager::winget().install_invocation(&spec).unwrap();
        assert!(inv.command_line().starts_with("winget install --id Git.Git -e --silent"));
        assert!(!inv.elevated);

        let inv = PackageManager::apt().install_invocation(&spec).unwrap();
        assert_eq!(inv.command_line(), "apt-get install -y Git.Git");
        assert!(inv.elevated);
    }

    #[test]
    fn path_hints_expand_environment() {
        std::env::set_var("DECKHAND_TEST_HINT_ROOT", "/opt/hint");
        let spec = DependencySpec::new("X", "x", &[])
            .with_path_hint("${DECKHAND_TEST_HINT_ROOT}/bin")
            .with_path_hint("${DECKHAND_TEST_UNSET_VAR}/bin");
        assert_eq!(spec.expanded_path_hints(), vec![PathBuf::from("/opt/hint/bin")]);
    }

    #[test]
    fn deserializes_with_defaults() {
        let yaml = r#"
name: Node.js
package_id: OpenJS.NodeJS
check: [node, --version]
version: "18.18"
"#;
        let spec: DependencySpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.required);
        assert_eq!(spec.version, Some(VersionRequirement::new(18, 18)));
        assert!(spec.path_hints.is_empty());
    }
}
