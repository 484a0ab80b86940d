//! Dependency detection and installation.
//!
//! For each [`DependencySpec`] the resolver runs the presence check and,
//! only when the check fails, installs through the package manager. A
//! vendor installer is tried when the package manager cannot help.

use crate::error::{InstallerError, Result};
use crate::fetch::Downloader;
use crate::requirements::spec::{DependencySpec, PackageManager, VendorInstaller};
use crate::requirements::version::{extract_version, ToolVersion};
use crate::shell::{PathManager, ProcessRunner};
use crate::ui::StatusSink;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What the presence check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Installed, with the version it reported if one was found.
    Present(Option<ToolVersion>),
    /// Installed but not the required `major.minor`.
    WrongVersion(ToolVersion),
    Missing,
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present(_))
    }
}

/// What `resolve` did for one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    AlreadyPresent,
    Installed,
}

/// Checks and installs dependencies.
pub struct Resolver<'a> {
    runner: &'a dyn ProcessRunner,
    downloader: &'a dyn Downloader,
    package_manager: &'a PackageManager,
}

impl<'a> Resolver<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        downloader: &'a dyn Downloader,
        package_manager: &'a PackageManager,
    ) -> Self {
        Self {
            runner,
            downloader,
            package_manager,
        }
    }

    /// Run the package manager's own check.
    pub async fn bootstrap(&self, sink: &dyn StatusSink) -> Result<()> {
        let inv = self.package_manager.check_invocation()?;
        let result = self.runner.execute(&inv, sink).await?.check(&inv)?;
        if let Some(line) = result.first_line() {
            sink.on_log_line(&format!("{} {}", self.package_manager.name, line));
        }
        Ok(())
    }

    /// Probe for `spec` without installing anything.
    pub async fn probe(&self, spec: &DependencySpec, sink: &dyn StatusSink) -> Presence {
        let Some(inv) = spec.check_invocation() else {
            debug!(dependency = %spec.name, "No check command; treating as missing");
            return Presence::Missing;
        };

        let result = match self.runner.execute(&inv, sink).await {
            Ok(result) if result.success() => result,
            Ok(result) => {
                debug!(dependency = %spec.name, exit_code = ?result.exit_code, "Check failed");
                return Presence::Missing;
            }
            Err(e) => {
                debug!(dependency = %spec.name, error = %e, "Check could not run");
                return Presence::Missing;
            }
        };

        let found = extract_version(&result.stdout_text())
            .or_else(|| extract_version(&result.stderr.join("\n")));

        let Some(required) = spec.version else {
            return Presence::Present(found);
        };

        match found {
            Some(version) if required.matches(&version) => Presence::Present(Some(version)),
            Some(version) => {
                let mismatch = InstallerError::VersionMismatch {
                    name: spec.name.clone(),
                    found: version.to_string(),
                    required: required.to_string(),
                };
                sink.on_log_line(&mismatch.to_string());
                Presence::WrongVersion(version)
            }
            None => {
                debug!(dependency = %spec.name, "No version in check output");
                Presence::Missing
            }
        }
    }

    /// Whether `spec` is present (and at the required version).
    pub async fn check(&self, spec: &DependencySpec, sink: &dyn StatusSink) -> bool {
        self.probe(spec, sink).await.is_present()
    }

    /// Install `spec` and put its known directories on the search path.
    pub async fn install(
        &self,
        spec: &DependencySpec,
        paths: &mut PathManager,
        sink: &dyn StatusSink,
    ) -> Result<()> {
        let failed = |message: String| InstallerError::DependencyFailed {
            name: spec.name.clone(),
            message,
        };

        info!(dependency = %spec.name, package = %spec.package_id, "Installing dependency");
        let inv = self.package_manager.install_invocation(spec)?;
        let outcome = match self.runner.execute(&inv, sink).await {
            Ok(result) => result.check(&inv).map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            let Some(vendor) = &spec.vendor_installer else {
                return Err(failed(e.to_string()));
            };
            warn!(dependency = %spec.name, error = %e, "Package manager failed; trying vendor installer");
            sink.on_warning(&format!(
                "{} could not install {}; downloading the vendor installer",
                self.package_manager.name, spec.name
            ));
            self.install_vendor(vendor, paths, sink)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }

        for dir in spec.expanded_path_hints() {
            paths.ensure(dir);
        }
        Ok(())
    }

    async fn install_vendor(
        &self,
        vendor: &VendorInstaller,
        paths: &mut PathManager,
        sink: &dyn StatusSink,
    ) -> Result<()> {
        let installer = self.downloader.download(&vendor.url, sink).await?;
        let vars = HashMap::from([("installer", installer.to_string_lossy().into_owned())]);
        let inv = vendor.command.render(&vars)?.elevated(true);

        self.runner.execute(&inv, sink).await?.check(&inv)?;

        // The installer changed the machine path, not ours.
        paths.refresh();
        Ok(())
    }

    /// Check `spec` and install it only if the check fails.
    pub async fn resolve(
        &self,
        spec: &DependencySpec,
        paths: &mut PathManager,
        sink: &dyn StatusSink,
    ) -> Result<Resolution> {
        if self.check(spec, sink).await {
            sink.on_log_line(&format!("{} is installed", spec.name));
            return Ok(Resolution::AlreadyPresent);
        }
        self.install(spec, paths, sink).await?;
        sink.on_log_line(&format!("{} installed", spec.name));
        Ok(Resolution::Installed)
    }
}
