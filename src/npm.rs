//! npm plugin version resolution and updates.
//!
//! Local versions come from `<pm> list`, remote versions from `<pm> view`.
//! "Up to date" means the two strings are equal; there is no semver
//! ordering. Upgrades are never trusted on exit status alone: the installed
//! version is read back afterwards.

use futures_util::future::join_all;
use regex::Regex;

use crate::app_logger::LogLevel;
use crate::cli::resolve_cli;
use crate::config::PackageManager;
use crate::manifest::{bare_version, Manifest};
use crate::outcome::{PkgCheck, PkgUpdate, UpdateError};
use crate::registry::Origin;
use crate::report::{BatchReport, ReportLine, UPDATE_FAILED_CHECK_LOGS};
use crate::runner::{CommandOutput, Invocation};
use crate::updater::Updater;

pub const DEFAULT_TAG: &str = "latest";

/// Output fragments the package manager prints for a missing package.
const NOT_INSTALLED_MARKERS: &[&str] = &["empty", "extraneous"];

const LOG_SOURCE: &str = "npm";

// ---------------------------------------------------------------------------
// Package manager commands
// ---------------------------------------------------------------------------

impl PackageManager {
    fn command(self) -> Invocation {
        Invocation::new(resolve_cli(self.binary()))
    }

    pub(crate) fn list(self, name: &str) -> Invocation {
        self.command().args(["list", name, "--depth=0"])
    }

    /// `latest` is a plain version query, any other tag a dist-tag query.
    pub(crate) fn view(self, name: &str, tag: &str) -> Invocation {
        let field = if tag == DEFAULT_TAG {
            "version".to_string()
        } else {
            format!("dist-tags.{tag}")
        };
        self.command().args(["view", name, field.as_str()])
    }

    /// Upgrade each `(name, version)` to exactly that version.
    pub(crate) fn upgrade<'a>(self, targets: impl IntoIterator<Item = (&'a str, &'a str)>) -> Invocation {
        let verb = match self {
            Self::Pnpm => "update",
            Self::Npm => "install",
        };
        self.command()
            .arg(verb)
            .args(targets.into_iter().map(|(name, version)| format!("{name}@{version}")))
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Local and remote version of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPair {
    pub local: String,
    pub remote: String,
}

impl VersionPair {
    pub fn is_outdated(&self) -> bool {
        self.local != self.remote
    }
}

fn is_not_installed(output: &CommandOutput) -> bool {
    let error_text = output.error_text();
    NOT_INSTALLED_MARKERS
        .iter()
        .any(|marker| output.stdout.contains(marker) || error_text.contains(marker))
}

/// Find `<name>@x.y.z` (npm tree) or `<name> x.y.z` (pnpm table) in list
/// output. The name must start a token so `foo` doesn't match `@scope/foo`.
pub(crate) fn parse_listed_version(stdout: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(?m)(?:^|[\s─└├│+`])(?:{})[@ ]v?(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Package names are passed as bare arguments; reject anything a package
/// manager would read as a flag or that can't be a registry name.
pub fn validate_package_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("package name is required".to_string());
    }
    if name.starts_with('-') {
        return Err(format!("invalid package name \"{name}\""));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(format!("package name \"{name}\" contains whitespace"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resolution and orchestration
// ---------------------------------------------------------------------------

impl Updater {
    fn pm(&self) -> PackageManager {
        self.config().package_manager
    }

    fn in_project(&self, invocation: Invocation) -> Invocation {
        invocation.current_dir(self.config().project_dir.clone())
    }

    /// Locally installed version of `name`.
    ///
    /// Falls back to the version declared in `package.json` when the list
    /// output has no recognisable version line. That fallback is only an
    /// approximation of what is installed.
    pub async fn get_pkg_version(&self, name: &str) -> Result<String, UpdateError> {
        let invocation = self.in_project(self.pm().list(name));
        let command = invocation.to_string();
        let output = self.exec(invocation).await;

        if is_not_installed(&output) {
            return Err(UpdateError::NotInstalled(name.to_string()));
        }
        if let Some(err) = output.error {
            return Err(UpdateError::execution(command, err));
        }
        if let Some(version) = parse_listed_version(&output.stdout, name) {
            return Ok(version);
        }

        let manifest = Manifest::load(&self.config().manifest_path())?;
        manifest
            .declared_version(name)
            .map(str::to_string)
            .ok_or_else(|| UpdateError::NotInstalled(name.to_string()))
    }

    /// Published version of `name` for `tag` (`latest` by default).
    pub async fn get_remote_pkg_version(&self, name: &str, tag: &str) -> Result<String, UpdateError> {
        let invocation = self.in_project(self.pm().view(name, tag));
        let command = invocation.to_string();
        let output = self.exec(invocation).await;

        if is_not_installed(&output) {
            return Err(UpdateError::NotInstalled(name.to_string()));
        }
        if let Some(err) = output.error {
            return Err(UpdateError::execution(command, err));
        }
        let version = output.stdout.trim();
        if version.is_empty() {
            return Err(UpdateError::Registry(format!("{name} has no version published under \"{tag}\"")));
        }
        Ok(version.to_string())
    }

    async fn resolve_pair(&self, name: &str, tag: &str) -> Result<VersionPair, UpdateError> {
        let (local, remote) = tokio::join!(
            self.get_pkg_version(name),
            self.get_remote_pkg_version(name, tag)
        );
        Ok(VersionPair {
            local: local?,
            remote: remote?,
        })
    }

    /// Compare local and remote versions of `name`. Never fails: resolution
    /// errors come back as [`PkgCheck::Error`].
    pub async fn check_pkg_update(&self, name: &str) -> PkgCheck {
        match self.resolve_pair(name, DEFAULT_TAG).await {
            Ok(pair) if pair.is_outdated() => PkgCheck::Yes {
                local: pair.local,
                remote: pair.remote,
            },
            Ok(pair) => PkgCheck::No { local: pair.local },
            Err(e) => {
                self.log(LogLevel::Warn, LOG_SOURCE, &format!("检查 {name} 更新失败: {e}"));
                PkgCheck::Error { error: e.to_string() }
            }
        }
    }

    /// Upgrade `name` to the version published under `tag`.
    ///
    /// An already-current package is reported as `failed`, and no upgrade
    /// command is issued for it.
    pub async fn update_pkg(&self, name: &str, tag: &str) -> PkgUpdate {
        let pair = match self.resolve_pair(name, tag).await {
            Ok(pair) => pair,
            Err(e) => {
                self.log(LogLevel::Warn, LOG_SOURCE, &format!("获取 {name} 版本失败: {e}"));
                return PkgUpdate::Error { data: e.to_string() };
            }
        };

        if !pair.is_outdated() {
            return PkgUpdate::Failed {
                data: format!("{name} 已是最新版本 {}，没有可更新的版本", pair.local),
            };
        }

        let invocation = self.in_project(self.pm().upgrade([(name, pair.remote.as_str())]));
        let command = invocation.to_string();
        self.log(
            LogLevel::Info,
            LOG_SOURCE,
            &format!("更新 {name}: {} -> {}", pair.local, pair.remote),
        );
        let output = self.exec(invocation).await;
        if let Some(err) = output.error {
            self.log(LogLevel::Error, LOG_SOURCE, &format!("{command} 失败: {err}"));
            return PkgUpdate::Failed { data: err.to_string() };
        }

        let installed = match self.get_pkg_version(name).await {
            Ok(version) => version,
            Err(e) => {
                self.log(LogLevel::Error, LOG_SOURCE, &format!("更新后无法读取 {name} 版本: {e}"));
                return PkgUpdate::Failed {
                    data: format!("{name} 更新后无法读取已安装版本: {e}，请手动更新: {command}"),
                };
            }
        };
        if installed != pair.remote {
            let err = UpdateError::VerificationFailed {
                expected: pair.remote.clone(),
                actual: installed,
            };
            self.log(LogLevel::Error, LOG_SOURCE, &format!("{name}: {err}"));
            return PkgUpdate::Failed {
                data: format!("{name} {err}，请手动更新: {command}"),
            };
        }

        self.log(LogLevel::Info, LOG_SOURCE, &format!("{name} 更新成功"));
        PkgUpdate::Ok {
            data: format!("{name} 更新成功: {} -> {}", pair.local, pair.remote),
            local: pair.local,
            remote: pair.remote,
        }
    }

    /// Update every npm plugin plus the host package in one batch command.
    /// Always produces a report, even when the pass itself fails.
    pub async fn update_all_pkg(&self) -> BatchReport {
        match self.try_update_all_pkg().await {
            Ok(report) => report,
            Err(e) => {
                self.log(LogLevel::Error, LOG_SOURCE, &format!("批量更新失败: {e}"));
                let text = e.to_string();
                BatchReport::message(if text.is_empty() {
                    UPDATE_FAILED_CHECK_LOGS.to_string()
                } else {
                    text
                })
            }
        }
    }

    async fn try_update_all_pkg(&self) -> Result<BatchReport, UpdateError> {
        let mut names = self.registry().list_plugins(Origin::Npm, false)?;
        let host = &self.config().host_package;
        if !host.is_empty() && !names.iter().any(|n| n == host) {
            names.push(host.clone());
        }

        let probes = names.iter().map(|name| async move {
            match self.resolve_pair(name, DEFAULT_TAG).await {
                Ok(pair) => Some((name.as_str(), pair)),
                Err(e) => {
                    self.log(LogLevel::Warn, LOG_SOURCE, &format!("跳过 {name}: {e}"));
                    None
                }
            }
        });
        let planned: Vec<(&str, String)> = join_all(probes)
            .await
            .into_iter()
            .flatten()
            .filter(|(_, pair)| pair.is_outdated())
            .map(|(name, pair)| (name, pair.remote))
            .collect();

        if planned.is_empty() {
            return Ok(BatchReport::nothing_to_update());
        }

        let invocation = self.in_project(
            self.pm()
                .upgrade(planned.iter().map(|(name, version)| (*name, version.as_str()))),
        );
        let command = invocation.to_string();
        self.log(LogLevel::Info, LOG_SOURCE, &format!("批量更新: {command}"));
        let output = self.exec(invocation).await;

        let mut report = BatchReport::new();
        if let Some(err) = output.error {
            self.log(LogLevel::Error, LOG_SOURCE, &format!("{command} 失败: {err}"));
            for (name, _) in &planned {
                report.push(ReportLine::failed(
                    *name,
                    format!("更新失败: {err}，请手动执行: {command}"),
                ));
            }
            return Ok(report.finish());
        }

        // The batch path checks what package.json now declares, not what
        // `list` reports as installed.
        match Manifest::load(&self.config().manifest_path()) {
            Ok(manifest) => {
                for (name, expected) in &planned {
                    match manifest.declared_version(name).map(bare_version) {
                        Some(declared) if declared == expected.as_str() => {
                            report.push(ReportLine::succeeded(*name, format!("已更新到 {expected}")));
                        }
                        declared => report.push(ReportLine::failed(
                            *name,
                            format!(
                                "期望 {expected}，package.json 中为 {}，请手动更新",
                                declared.unwrap_or("未声明")
                            ),
                        )),
                    }
                }
            }
            Err(e) => {
                for (name, _) in &planned {
                    report.push(ReportLine::failed(*name, format!("无法校验: {e}")));
                }
            }
        }

        report.successes_first();
        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
