//! Git plugin inspection: upstream drift, commit logs, hashes and times.
//!
//! Every check runs inside a time budget. When it expires the pending future
//! is dropped, which kills the in-flight git child.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_logger::LogLevel;
use crate::git_cli::{self, LogRange};
use crate::outcome::{GitCheck, UpdateError};
use crate::updater::Updater;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Upstream ref used to read the commits a plugin is missing.
const UPSTREAM: &str = "@{u}";

const LOG_SOURCE: &str = "git";

lazy_static! {
    static ref BEHIND_RE: Regex =
        Regex::new(r"behind '.*?' by (\d+) commit").expect("valid behind regex");
}

/// What [`Updater::get_commit`] should read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    pub path: PathBuf,
    pub count: u32,
    /// Takes precedence over `branch`.
    pub hash: Option<String>,
    pub branch: Option<String>,
}

impl CommitQuery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            count: 1,
            hash: None,
            branch: None,
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    pub fn since(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    fn range(&self) -> LogRange<'_> {
        match (&self.hash, &self.branch) {
            (Some(hash), _) => LogRange::Since(hash),
            (None, Some(branch)) => LogRange::Branch(branch, self.count),
            (None, None) => LogRange::Head(self.count),
        }
    }
}

// ---------------------------------------------------------------------------
// Status parsing
// ---------------------------------------------------------------------------

pub(crate) fn is_up_to_date(status: &str) -> bool {
    status.contains("up to date") || status.contains("up-to-date")
}

/// Commits behind upstream per `git status`. Output that says the branch
/// is not current but gives no count (diverged, no tracking info) counts as 1.
pub(crate) fn parse_behind_count(status: &str) -> u32 {
    BEHIND_RE
        .captures(status)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1)
}

/// Fail fast with the fixed precondition messages.
pub(crate) fn ensure_repo(path: &Path) -> Result<(), UpdateError> {
    if !path.exists() {
        return Err(UpdateError::PathNotFound(path.to_path_buf()));
    }
    if !path.join(".git").exists() {
        return Err(UpdateError::NotAGitRepo(path.to_path_buf()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspector
// ---------------------------------------------------------------------------

impl Updater {
    /// Whether the checkout at `path` is behind its upstream.
    pub async fn check_git_plugin_update(&self, path: &Path, timeout: Duration) -> GitCheck {
        if let Err(e) = ensure_repo(path) {
            return GitCheck::Error { data: e.to_string() };
        }

        match tokio::time::timeout(timeout, self.probe_upstream(path)).await {
            Ok(Ok(check)) => check,
            Ok(Err(e)) => {
                self.log(
                    LogLevel::Warn,
                    LOG_SOURCE,
                    &format!("检查 {} 更新失败: {e}", path.display()),
                );
                GitCheck::Error { data: e.to_string() }
            }
            Err(_) => {
                let err = UpdateError::Timeout(timeout);
                self.log(LogLevel::Warn, LOG_SOURCE, &format!("{}: {err}", path.display()));
                GitCheck::Timeout { data: err.to_string() }
            }
        }
    }

    async fn probe_upstream(&self, path: &Path) -> Result<GitCheck, UpdateError> {
        let fetch = git_cli::fetch(path);
        let command = fetch.to_string();
        if let Some(err) = self.exec(fetch).await.error {
            return Err(UpdateError::execution(command, err));
        }

        let status = git_cli::status(path);
        let command = status.to_string();
        let stdout = self
            .exec(status)
            .await
            .into_result()
            .map_err(|e| UpdateError::execution(command, e))?;

        if is_up_to_date(&stdout) {
            return Ok(GitCheck::No {
                data: self.get_time(path).await,
            });
        }

        let count = parse_behind_count(&stdout);
        let data = self
            .get_commit(&CommitQuery::new(path).count(count).branch(UPSTREAM))
            .await?;
        Ok(GitCheck::Yes { data, count })
    }

    /// Commit log lines formatted as `[MM-DD HH:MM]subject`.
    pub async fn get_commit(&self, query: &CommitQuery) -> Result<String, UpdateError> {
        let invocation = git_cli::log(&query.path, query.range());
        let command = invocation.to_string();
        let stdout = self
            .exec(invocation)
            .await
            .into_result()
            .map_err(|e| UpdateError::execution(command, e))?;
        Ok(stdout.trim_end().to_string())
    }

    /// Hash of `HEAD`, abbreviated when `short`.
    pub async fn get_hash(&self, path: &Path, short: bool) -> Result<String, UpdateError> {
        let invocation = git_cli::rev_parse_head(path, short);
        let command = invocation.to_string();
        let stdout = self
            .exec(invocation)
            .await
            .into_result()
            .map_err(|e| UpdateError::execution(command, e))?;
        Ok(stdout.trim().to_string())
    }

    /// Last commit time as `YYYY-MM-DD HH:MM:SS`. Failures come back as a
    /// readable message in place of the time.
    pub async fn get_time(&self, path: &Path) -> String {
        let output = self.exec(git_cli::last_commit_time(path)).await;
        match output.into_result() {
            Ok(stdout) if !stdout.trim().is_empty() => stdout.trim().to_string(),
            Ok(_) => "获取时间失败: 没有提交记录".to_string(),
            Err(e) => format!("获取时间失败: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
