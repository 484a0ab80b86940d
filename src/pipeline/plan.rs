//! Assembly of the ordered step lists from configuration.

use crate::config::{DeckhandConfig, InstallMode};
use crate::pipeline::step::{InstallStep, Severity};
use crate::pipeline::steps::{
    loader_process_names, BootstrapPackageManager, CreateHomebrewDirs, CreateSteamShortcut,
    DownloadPrebuilt, EnableCefDebugging, ExtractPrebuilt, InstallBuildTool, ResolveDependency,
    RunBuildScript, SetupAutostart, SteamLocator, StopLoaderProcesses, VerifyPackages,
};

/// The plan selected by `config.mode`.
pub fn plan_for(config: &DeckhandConfig) -> Vec<InstallStep> {
    match config.mode {
        InstallMode::Build => build_plan(config),
        InstallMode::Prebuilt => prebuilt_plan(config),
    }
}

fn steam_locator(config: &DeckhandConfig) -> SteamLocator {
    SteamLocator {
        configured: config.steam.path.clone(),
    }
}

fn stop_loader() -> InstallStep {
    InstallStep::advisory(
        "Stopping running loader",
        StopLoaderProcesses {
            names: loader_process_names(),
        },
    )
}

fn homebrew_dirs(config: &DeckhandConfig) -> InstallStep {
    InstallStep::fatal(
        "Creating homebrew directories",
        CreateHomebrewDirs {
            root: config.homebrew_root(),
        },
    )
}

fn cef_debugging(config: &DeckhandConfig) -> InstallStep {
    InstallStep::fatal(
        "Enabling CEF debugging",
        EnableCefDebugging {
            steam: steam_locator(config),
        },
    )
}

/// Shortcut and autostart, each only when enabled.
fn host_integration(config: &DeckhandConfig, steps: &mut Vec<InstallStep>) {
    if config.steam.shortcut {
        steps.push(InstallStep::fatal(
            "Creating Steam shortcut",
            CreateSteamShortcut {
                steam: steam_locator(config),
                shortcut_dir: config.steam.shortcut_dir(),
            },
        ));
    }
    if config.steam.autostart {
        steps.push(InstallStep::fatal(
            "Setting up autostart",
            SetupAutostart {
                services_dir: config.services_dir(),
                autostart_dir: config.steam.autostart_dir(),
            },
        ));
    }
}

/// Install the toolchain and build the loader from source.
pub fn build_plan(config: &DeckhandConfig) -> Vec<InstallStep> {
    let mut steps = vec![
        stop_loader(),
        homebrew_dirs(config),
        cef_debugging(config),
        InstallStep::fatal(
            format!("Checking {}", config.package_manager.name),
            BootstrapPackageManager {
                package_manager: config.package_manager.clone(),
            },
        ),
    ];

    for spec in &config.dependencies {
        let severity = if spec.required {
            Severity::Fatal
        } else {
            Severity::Advisory
        };
        steps.push(InstallStep::new(
            format!("Installing {}", spec.name),
            severity,
            ResolveDependency {
                spec: spec.clone(),
                package_manager: config.package_manager.clone(),
            },
        ));
    }

    steps.push(InstallStep::fatal(
        format!("Installing {}", config.build.tool_check.program),
        InstallBuildTool {
            check: config.build.tool_check.clone(),
            install: config.build.tool_install.clone(),
        },
    ));
    steps.push(InstallStep::advisory(
        "Verifying Python packages",
        VerifyPackages {
            policy: config.verification.clone(),
        },
    ));
    steps.push(InstallStep::fatal(
        format!("Building Decky {}", config.release),
        RunBuildScript {
            interpreter: config.build.interpreter.clone(),
            script: config.build.script.clone(),
            release: config.release.clone(),
            working_dir: config.build.working_dir(),
        },
    ));

    host_integration(config, &mut steps);
    steps
}

/// Download and unpack a prebuilt loader.
pub fn prebuilt_plan(config: &DeckhandConfig) -> Vec<InstallStep> {
    let mut steps = vec![
        stop_loader(),
        cef_debugging(config),
        homebrew_dirs(config),
        InstallStep::fatal(
            "Downloading Decky",
            DownloadPrebuilt {
                url: config.prebuilt_url.clone(),
            },
        ),
        InstallStep::fatal(
            "Extracting Decky",
            ExtractPrebuilt {
                dest: config.services_dir(),
            },
        ),
    ];
    host_integration(config, &mut steps);
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::DependencySpec;

    fn labels(steps: &[InstallStep]) -> Vec<&str> {
        steps.iter().map(|s| s.label.as_str()).collect()
    }

    fn config_with_two_deps() -> DeckhandConfig {
        DeckhandConfig {
            dependencies: vec![
                DependencySpec::new("Python", "python3", &["python3", "--version"]),
                DependencySpec::new("Git", "git", &["git", "--version"]).optional(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn build_plan_order() {
        let mut config = config_with_two_deps();
        config.release = "v3.0.2".to_string();
        config.package_manager.name = "apt-get".to_string();

        let steps = build_plan(&config);
        assert_eq!(
            labels(&steps),
            [
                "Stopping running loader",
                "Creating homebrew directories",
                "Enabling CEF debugging",
                "Checking apt-get",
                "Installing Python",
                "Installing Git",
                "Installing pnpm",
                "Verifying Python packages",
                "Building Decky v3.0.2",
                "Creating Steam shortcut",
                "Setting up autostart",
            ]
        );
    }

    #[test]
    fn dependency_severity_follows_required() {
        let steps = build_plan(&config_with_two_deps());
        let python = steps.iter().find(|s| s.label == "Installing Python").unwrap();
        let git = steps.iter().find(|s| s.label == "Installing Git").unwrap();
        assert!(python.is_fatal());
        assert!(!git.is_fatal());
    }

    #[test]
    fn verification_and_process_stop_are_advisory() {
        let steps = build_plan(&DeckhandConfig::default());
        for label in ["Stopping running loader", "Verifying Python packages"] {
            let step = steps.iter().find(|s| s.label == label).unwrap();
            assert!(!step.is_fatal(), "{label} should be advisory");
        }
    }

    #[test]
    fn step_count_grows_with_dependencies() {
        let mut config = DeckhandConfig::default();
        config.dependencies.clear();
        let base = build_plan(&config).len();

        let config = config_with_two_deps();
        assert_eq!(build_plan(&config).len(), base + 2);
    }

    #[test]
    fn prebuilt_plan_order() {
        let mut config = DeckhandConfig::default();
        config.steam.autostart = false;
        assert_eq!(
            labels(&prebuilt_plan(&config)),
            [
                "Stopping running loader",
                "Enabling CEF debugging",
                "Creating homebrew directories",
                "Downloading Decky",
                "Extracting Decky",
                "Creating Steam shortcut",
            ]
        );
    }

    #[test]
    fn mode_selects_plan() {
        let mut config = DeckhandConfig::default();
        config.mode = InstallMode::Prebuilt;
        assert!(plan_for(&config)
            .iter()
            .any(|s| s.label == "Downloading Decky"));
    }
}
