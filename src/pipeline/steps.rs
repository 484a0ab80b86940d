//! The concrete steps of the build and prebuilt plans.

use crate::error::{InstallerError, Result};
use crate::fetch::extract_zip;
use crate::pipeline::step::{StepAction, StepContext};
use crate::requirements::{DependencySpec, PackageManager, Resolver};
use crate::shell::{CommandTemplate, ProcessInvocation, ProcessRunner};
use crate::ui::StatusSink;
use crate::verify::{Verifier, VerifyPolicy};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sub-directories of the homebrew root the loader expects.
pub const HOMEBREW_SUBDIRS: &[&str] = &["data", "logs", "plugins", "services", "settings", "themes"];

/// Marker file that makes Steam expose its CEF debugger.
pub const CEF_DEBUG_MARKER: &str = ".cef-enable-remote-debugging";

/// Loader executable names, newest build first.
pub fn loader_process_names() -> Vec<String> {
    if cfg!(windows) {
        vec![
            "PluginLoader.exe".to_string(),
            "PluginLoader_noconsole.exe".to_string(),
        ]
    } else {
        vec!["PluginLoader".to_string()]
    }
}

/// The executable autostart launches.
pub fn loader_executable_name() -> &'static str {
    if cfg!(windows) {
        "PluginLoader_noconsole.exe"
    } else {
        "PluginLoader"
    }
}

fn step_error(message: impl Into<String>) -> InstallerError {
    InstallerError::Other(anyhow::anyhow!(message.into()))
}

/// Terminates loader processes left over from a previous install.
pub struct StopLoaderProcesses {
    pub names: Vec<String>,
}

impl StopLoaderProcesses {
    fn invocation(name: &str) -> ProcessInvocation {
        let inv = if cfg!(windows) {
            ProcessInvocation::new("taskkill").args(["/F", "/IM", name])
        } else {
            ProcessInvocation::new("pkill").args(["-x", name])
        };
        inv.quiet()
    }

    async fn stop_all(&self, runner: &dyn ProcessRunner, sink: &dyn StatusSink) -> Result<()> {
        for name in &self.names {
            let inv = Self::invocation(name);
            match runner.execute(&inv, sink).await {
                Ok(result) if result.success() => {
                    sink.on_log_line(&format!("Terminated {} process", name));
                }
                // Non-zero means nothing matched.
                Ok(_) => debug!(process = %name, "No running process"),
                Err(e) => sink.on_warning(&format!("Could not terminate {}: {}", name, e)),
            }
        }
        Ok(())
    }
}

impl StepAction for StopLoaderProcesses {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.stop_all(ctx.runner.as_ref(), sink).await })
    }
}

/// Creates the homebrew directory tree.
pub struct CreateHomebrewDirs {
    pub root: PathBuf,
}

impl CreateHomebrewDirs {
    pub fn create(&self, sink: &dyn StatusSink) -> Result<()> {
        for sub in HOMEBREW_SUBDIRS {
            let dir = self.root.join(sub);
            std::fs::create_dir_all(&dir)?;
            debug!(dir = %dir.display(), "Ensured directory");
        }
        sink.on_log_line(&format!("Homebrew directories ready in {}", self.root.display()));
        Ok(())
    }
}

impl StepAction for CreateHomebrewDirs {
    fn run<'a>(
        &'a self,
        _ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        let result = self.create(sink);
        Box::pin(async move { result })
    }
}

/// Finds the Steam installation directory.
#[derive(Debug, Clone)]
pub struct SteamLocator {
    /// Explicit location from configuration.
    pub configured: Option<PathBuf>,
}

impl SteamLocator {
    /// Registry keys that may hold `InstallPath`, 64-bit view first.
    const REGISTRY_KEYS: &'static [&'static str] = &[
        r"HKLM\SOFTWARE\WOW6432Node\Valve\Steam",
        r"HKLM\SOFTWARE\Valve\Steam",
    ];

    /// Configured path, else the registry (Windows), else the platform default.
    pub async fn locate(&self, runner: &dyn ProcessRunner, sink: &dyn StatusSink) -> PathBuf {
        if let Some(path) = &self.configured {
            return path.clone();
        }

        if cfg!(windows) {
            for key in Self::REGISTRY_KEYS {
                let inv = ProcessInvocation::new("reg")
                    .args(["query", key, "/v", "InstallPath"])
                    .quiet();
                if let Ok(result) = runner.execute(&inv, sink).await {
                    if let Some(path) = parse_reg_install_path(&result.stdout) {
                        return path;
                    }
                }
            }
        }

        default_steam_dir()
    }
}

/// The conventional Steam location for this platform.
pub fn default_steam_dir() -> PathBuf {
    if cfg!(windows) {
        let base = std::env::var_os("ProgramFiles(x86)")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Program Files (x86)"));
        base.join("Steam")
    } else {
        crate::shell::platform::home_dir().join(".steam").join("steam")
    }
}

/// Pull the value out of `reg query ... /v InstallPath` output.
pub fn parse_reg_install_path(lines: &[String]) -> Option<PathBuf> {
    lines.iter().find_map(|line| {
        let (_, value) = line.trim().split_once("REG_SZ")?;
        let value = value.trim();
        (!value.is_empty()).then(|| PathBuf::from(value))
    })
}

/// Writes Steam's CEF remote debugging marker.
pub struct EnableCefDebugging {
    pub steam: SteamLocator,
}

impl EnableCefDebugging {
    pub fn write_marker(steam_dir: &Path, sink: &dyn StatusSink) -> Result<()> {
        if !steam_dir.is_dir() {
            return Err(step_error(format!(
                "Steam installation directory not found: {}",
                steam_dir.display()
            )));
        }
        std::fs::write(steam_dir.join(CEF_DEBUG_MARKER), "")?;
        sink.on_log_line(&format!("Created {} file", CEF_DEBUG_MARKER));
        Ok(())
    }
}

impl StepAction for EnableCefDebugging {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let dir = self.steam.locate(ctx.runner.as_ref(), sink).await;
            Self::write_marker(&dir, sink)
        })
    }
}

/// Confirms the package manager runs.
pub struct BootstrapPackageManager {
    pub package_manager: PackageManager,
}

impl StepAction for BootstrapPackageManager {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let resolver = Resolver::new(
                ctx.runner.as_ref(),
                ctx.downloader.as_ref(),
                &self.package_manager,
            );
            resolver.bootstrap(sink).await
        })
    }
}

/// Checks one dependency and installs it if missing.
pub struct ResolveDependency {
    pub spec: DependencySpec,
    pub package_manager: PackageManager,
}

impl StepAction for ResolveDependency {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let StepContext {
                runner,
                downloader,
                paths,
                ..
            } = ctx;
            let resolver = Resolver::new(runner.as_ref(), downloader.as_ref(), &self.package_manager);
            resolver.resolve(&self.spec, paths, sink).await.map(|_| ())
        })
    }
}

/// Installs the JavaScript build tool globally if it is missing.
pub struct InstallBuildTool {
    pub check: CommandTemplate,
    pub install: CommandTemplate,
}

impl StepAction for InstallBuildTool {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let vars = HashMap::new();
            let check = self.check.render(&vars)?.quiet();
            let present = matches!(
                ctx.runner.execute(&check, sink).await,
                Ok(result) if result.success()
            );
            if present {
                sink.on_log_line(&format!("{} is installed", self.check.program));
                return Ok(());
            }

            info!(tool = %self.check.program, "Installing build tool");
            let install = self.install.render(&vars)?;
            ctx.runner.execute(&install, sink).await?.check(&install)?;

            let result = ctx.runner.execute(&check, sink).await?.check(&check)?;
            sink.on_log_line(&format!(
                "Installed {} {}",
                self.check.program,
                result.first_line().unwrap_or_default()
            ));
            Ok(())
        })
    }
}

/// Probes (and repairs) the Python packages the loader imports.
pub struct VerifyPackages {
    pub policy: VerifyPolicy,
}

impl StepAction for VerifyPackages {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let report = Verifier::new(ctx.runner.as_ref(), &self.policy)
                .verify_all(sink)
                .await;
            sink.on_log_line(&format!(
                "Verified {} of {} packages",
                report.verified.len(),
                self.policy.packages.len()
            ));
            Ok(())
        })
    }
}

/// Runs the external build script with the release as its argument.
pub struct RunBuildScript {
    pub interpreter: String,
    pub script: PathBuf,
    pub release: String,
    pub working_dir: PathBuf,
}

impl RunBuildScript {
    pub fn invocation(&self) -> ProcessInvocation {
        ProcessInvocation::new(self.interpreter.clone())
            .arg(self.script.to_string_lossy())
            .arg(self.release.clone())
            .cwd(self.working_dir.clone())
    }
}

impl StepAction for RunBuildScript {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let inv = self.invocation();
            ctx.runner.execute(&inv, sink).await?.check(&inv)?;
            Ok(())
        })
    }
}

/// Downloads the prebuilt loader archive into the step context.
pub struct DownloadPrebuilt {
    pub url: String,
}

impl StepAction for DownloadPrebuilt {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let archive = ctx.downloader.download(&self.url, sink).await?;
            ctx.release_scratch();
            ctx.scratch = Some(archive);
            Ok(())
        })
    }
}

/// Unpacks the downloaded archive, replacing files already there.
pub struct ExtractPrebuilt {
    pub dest: PathBuf,
}

impl StepAction for ExtractPrebuilt {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let archive = ctx
                .scratch
                .take()
                .ok_or_else(|| step_error("no downloaded archive to extract"))?;
            let dest = self.dest.clone();

            let summary = tokio::task::spawn_blocking(move || {
                let summary = extract_zip(&archive, &dest, true);
                let _ = archive.close();
                summary
            })
            .await
            .map_err(|e| step_error(format!("extraction task failed: {}", e)))??;

            sink.on_log_line(&format!(
                "Extracted {} files to {}",
                summary.written,
                self.dest.display()
            ));
            Ok(())
        })
    }
}

/// Adds a launcher that starts Steam in developer mode.
pub struct CreateSteamShortcut {
    pub steam: SteamLocator,
    pub shortcut_dir: PathBuf,
}

impl CreateSteamShortcut {
    pub const WINDOWS_NAME: &'static str = "Steam (Decky).lnk";
    pub const DESKTOP_NAME: &'static str = "steam-decky.desktop";

    /// PowerShell that creates a `.lnk` through `WScript.Shell`.
    pub fn powershell_script(shortcut: &Path, target: &Path, working_dir: &Path) -> String {
        format!(
            "$WshShell = New-Object -comObject WScript.Shell; \
             $Shortcut = $WshShell.CreateShortcut('{}'); \
             $Shortcut.TargetPath = '{}'; \
             $Shortcut.Arguments = '-dev'; \
             $Shortcut.WorkingDirectory = '{}'; \
             $Shortcut.Description = 'Launch Steam with Decky Loader'; \
             $Shortcut.Save()",
            shortcut.display(),
            target.display(),
            working_dir.display()
        )
    }

    /// A freedesktop launcher running `steam -dev`.
    pub fn desktop_entry() -> String {
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Steam (Decky)\n\
         Comment=Launch Steam with Decky Loader\n\
         Exec=steam -dev %U\n\
         Icon=steam\n\
         Terminal=false\n\
         Categories=Game;\n"
            .to_string()
    }

    async fn create(&self, runner: &dyn ProcessRunner, sink: &dyn StatusSink) -> Result<()> {
        std::fs::create_dir_all(&self.shortcut_dir)?;

        if cfg!(windows) {
            let steam_dir = self.steam.locate(runner, sink).await;
            let steam_exe = steam_dir.join("steam.exe");
            if !steam_exe.is_file() {
                return Err(step_error(format!(
                    "Steam executable not found: {}",
                    steam_exe.display()
                )));
            }
            let shortcut = self.shortcut_dir.join(Self::WINDOWS_NAME);
            let script = Self::powershell_script(&shortcut, &steam_exe, &steam_dir);
            let inv = ProcessInvocation::new("powershell").args(["-NoProfile", "-Command", &script]);
            runner.execute(&inv, sink).await?.check(&inv)?;
            sink.on_log_line(&format!("Created {}", shortcut.display()));
        } else {
            let shortcut = self.shortcut_dir.join(Self::DESKTOP_NAME);
            std::fs::write(&shortcut, Self::desktop_entry())?;
            sink.on_log_line(&format!("Created {}", shortcut.display()));
        }
        Ok(())
    }
}

impl StepAction for CreateSteamShortcut {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.create(ctx.runner.as_ref(), sink).await })
    }
}

/// Starts the loader at login.
pub struct SetupAutostart {
    pub services_dir: PathBuf,
    pub autostart_dir: PathBuf,
}

impl SetupAutostart {
    pub const WINDOWS_NAME: &'static str = "start_decky.bat";
    pub const DESKTOP_NAME: &'static str = "decky-loader.desktop";

    /// The autostart entry's file name and contents for `loader`.
    pub fn entry(&self, loader: &Path) -> (&'static str, String) {
        if cfg!(windows) {
            (Self::WINDOWS_NAME, format!("@echo off\n\"{}\"\n", loader.display()))
        } else {
            (
                Self::DESKTOP_NAME,
                format!(
                    "[Desktop Entry]\n\
                     Type=Application\n\
                     Name=Decky Loader\n\
                     Exec=\"{}\"\n\
                     Path={}\n\
                     X-GNOME-Autostart-enabled=true\n",
                    loader.display(),
                    self.services_dir.display()
                ),
            )
        }
    }

    /// A detached launch of `loader` that returns as soon as it started.
    pub fn launch_invocation(&self, loader: &Path) -> ProcessInvocation {
        let loader = loader.to_string_lossy().into_owned();
        let inv = if cfg!(windows) {
            ProcessInvocation::new("cmd").args(["/C", "start", "", loader.as_str()])
        } else {
            ProcessInvocation::new("sh").args([
                "-c",
                "nohup \"$0\" >/dev/null 2>&1 &",
                loader.as_str(),
            ])
        };
        inv.cwd(self.services_dir.clone()).quiet()
    }

    /// Write the login entry and return the loader it points at.
    pub fn write_entry(&self, sink: &dyn StatusSink) -> Result<PathBuf> {
        let loader = self.services_dir.join(loader_executable_name());
        if !loader.is_file() {
            return Err(step_error(format!(
                "{} not found in {}",
                loader_executable_name(),
                self.services_dir.display()
            )));
        }

        std::fs::create_dir_all(&self.autostart_dir)?;
        let (name, contents) = self.entry(&loader);
        let path = self.autostart_dir.join(name);
        std::fs::write(&path, contents)?;
        sink.on_log_line(&format!("Created startup entry at {}", path.display()));
        Ok(loader)
    }

    /// Write the login entry, then start the loader for this session.
    ///
    /// A failed launch is only a warning; the entry starts it at next login.
    pub async fn create(&self, runner: &dyn ProcessRunner, sink: &dyn StatusSink) -> Result<()> {
        let loader = self.write_entry(sink)?;

        let inv = self.launch_invocation(&loader);
        let launched = match runner.execute(&inv, sink).await {
            Ok(result) => result.check(&inv).map(|_| ()),
            Err(e) => Err(e),
        };
        match launched {
            Ok(()) => {
                info!(loader = %loader.display(), "Loader started");
                sink.on_log_line(&format!("Started {}", loader_executable_name()));
            }
            Err(e) => {
                warn!(error = %e, "Could not start the loader");
                sink.on_warning(&format!(
                    "Could not start {}: {}",
                    loader_executable_name(),
                    e
                ));
            }
        }
        Ok(())
    }
}

impl StepAction for SetupAutostart {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.create(ctx.runner.as_ref(), sink).await })
    }
}
