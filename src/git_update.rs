//! Git plugin updates, single and batch.
//!
//! An update is judged by `HEAD` moving, not by the git command's exit
//! status: a `pull` that succeeds without new commits is reported as failed.

use futures_util::future::join_all;
use std::path::Path;
use std::time::Duration;

use crate::app_logger::LogLevel;
use crate::git::{ensure_repo, CommitQuery};
use crate::git_cli;
use crate::outcome::{GitUpdate, UpdateError};
use crate::registry::Origin;
use crate::report::{BatchReport, ReportLine};
use crate::updater::Updater;

pub const DEFAULT_UPDATE_CMD: &str = "pull";

/// Git subcommands an update line may start with.
pub const UPDATE_SUBCOMMANDS: [&str; 5] = ["pull", "fetch", "reset", "checkout", "merge"];

/// Options that make git run a program of the caller's choosing.
const FORBIDDEN_OPTIONS: [&str; 4] = ["--upload-pack", "--receive-pack", "--exec", "--config"];

/// Accept only update lines of the form `<subcommand> [args...]` with an
/// allowed subcommand. Blank means `pull`.
pub fn validate_update_cmd(cmd: &str) -> Result<(), String> {
    let mut words = cmd.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(());
    };
    if !UPDATE_SUBCOMMANDS.contains(&first) {
        return Err(format!(
            "unsupported git command \"{first}\" (expected one of: {})",
            UPDATE_SUBCOMMANDS.join(", ")
        ));
    }
    for word in words {
        if FORBIDDEN_OPTIONS.iter().any(|opt| word.starts_with(opt)) || word.contains("::") {
            return Err(format!("git option \"{word}\" is not allowed"));
        }
    }
    Ok(())
}

const RETRY_HINT: &str = "请稍后重试或使用强制更新";

const LOG_SOURCE: &str = "git";

impl Updater {
    /// Run `git <cmd>` in the checkout at `path` and report whether `HEAD`
    /// moved.
    pub async fn update_git_plugin(&self, path: &Path, cmd: &str, timeout: Duration) -> GitUpdate {
        if let Err(e) = validate_update_cmd(cmd) {
            return GitUpdate::Error { data: e };
        }
        if let Err(e) = ensure_repo(path) {
            return GitUpdate::Error { data: e.to_string() };
        }

        match tokio::time::timeout(timeout, self.pull(path, cmd)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let err = UpdateError::Timeout(timeout);
                self.log(LogLevel::Warn, LOG_SOURCE, &format!("{}: {err}", path.display()));
                GitUpdate::Timeout { data: err.to_string() }
            }
        }
    }

    async fn pull(&self, path: &Path, cmd: &str) -> GitUpdate {
        let before = match self.get_hash(path, true).await {
            Ok(hash) => hash,
            Err(e) => return GitUpdate::Error { data: e.to_string() },
        };

        let invocation = git_cli::subcommand(path, cmd);
        let command = invocation.to_string();
        self.log(
            LogLevel::Info,
            LOG_SOURCE,
            &format!("{}: {command}", path.display()),
        );
        if let Some(err) = self.exec(invocation).await.error {
            self.log(
                LogLevel::Error,
                LOG_SOURCE,
                &format!("{}: {command} 失败: {err}", path.display()),
            );
            return GitUpdate::Failed {
                data: format!("{err}\n{RETRY_HINT}"),
            };
        }

        let after = match self.get_hash(path, true).await {
            Ok(hash) => hash,
            Err(e) => return GitUpdate::Failed { data: e.to_string() },
        };

        if before == after {
            let time = self.get_time(path).await;
            return GitUpdate::Failed {
                data: format!("已经是最新的了\n最后更新时间：{time}"),
            };
        }

        let log = match self.get_commit(&CommitQuery::new(path)).await {
            Ok(log) => log,
            Err(e) => e.to_string(),
        };
        self.log(
            LogLevel::Info,
            LOG_SOURCE,
            &format!("{} 更新成功: {before} -> {after}", path.display()),
        );
        GitUpdate::Ok {
            data: format!("更新成功\n{log}"),
            before,
            after,
        }
    }

    /// Update every git plugin concurrently. Every plugin gets a line, in
    /// listing order, whatever happened to the others.
    pub async fn update_all_git_plugin(&self, cmd: &str, timeout: Duration) -> BatchReport {
        if let Err(e) = validate_update_cmd(cmd) {
            self.log(LogLevel::Error, LOG_SOURCE, &format!("批量更新失败: {e}"));
            return BatchReport::message(e);
        }
        let names = match self.registry().list_plugins(Origin::Git, false) {
            Ok(names) => names,
            Err(e) => {
                self.log(LogLevel::Error, LOG_SOURCE, &format!("批量更新失败: {e}"));
                return BatchReport::message(e.to_string());
            }
        };
        if names.is_empty() {
            return BatchReport::nothing_to_update();
        }

        let plugins_dir = self.config().plugins_path();
        let updates = names.iter().map(|name| {
            let path = plugins_dir.join(Origin::Git.strip(name));
            async move { self.update_git_plugin(&path, cmd, timeout).await }
        });
        let outcomes = join_all(updates).await;

        let mut report = BatchReport::new();
        for (name, outcome) in names.iter().zip(outcomes) {
            let line = if outcome.is_ok() {
                ReportLine::succeeded(name.as_str(), outcome.message())
            } else {
                ReportLine::failed(name.as_str(), outcome.message())
            };
            report.push(line);
        }
        report.finish()
    }
}
