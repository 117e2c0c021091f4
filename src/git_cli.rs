//! Git invocation builders.
//!
//! Every git command the inspector and updater issue is built here so the
//! environment is uniform: no credential prompts, and `LC_ALL=C` so status
//! text parsing sees English output regardless of the host locale.

use std::path::Path;

use crate::cli::resolve_cli;
use crate::runner::Invocation;

/// Commit-log line format: `[MM-DD HH:MM]subject`.
pub(crate) const COMMIT_LOG_FORMAT: &str = "--format=[%ad]%s";
pub(crate) const COMMIT_LOG_DATE: &str = "--date=format:%m-%d %H:%M";
/// Last-commit timestamp format: `YYYY-MM-DD HH:MM:SS`.
pub(crate) const COMMIT_TIME_DATE: &str = "--date=format:%Y-%m-%d %H:%M:%S";

/// Which commits a log query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogRange<'a> {
    /// Everything after `hash` up to `HEAD`.
    Since(&'a str),
    /// The last `count` commits of `branch`.
    Branch(&'a str, u32),
    /// The last `count` commits of the current branch.
    Head(u32),
}

/// Base git invocation rooted at the given directory.
pub(crate) fn git_cmd(cwd: &Path) -> Invocation {
    Invocation::new(resolve_cli("git"))
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
}

pub(crate) fn fetch(cwd: &Path) -> Invocation {
    git_cmd(cwd).arg("fetch")
}

/// Status against the upstream-tracking branch, ignoring untracked files.
pub(crate) fn status(cwd: &Path) -> Invocation {
    git_cmd(cwd).args(["status", "-uno"])
}

pub(crate) fn rev_parse_head(cwd: &Path, short: bool) -> Invocation {
    let cmd = git_cmd(cwd).arg("rev-parse");
    let cmd = if short { cmd.arg("--short") } else { cmd };
    cmd.arg("HEAD")
}

pub(crate) fn log(cwd: &Path, range: LogRange<'_>) -> Invocation {
    let cmd = git_cmd(cwd).arg("log");
    let cmd = match range {
        LogRange::Since(hash) => cmd.arg(format!("{hash}..HEAD")),
        LogRange::Branch(branch, count) => cmd.arg(format!("-{count}")).arg(branch),
        LogRange::Head(count) => cmd.arg(format!("-{count}")),
    };
    cmd.args([COMMIT_LOG_DATE, COMMIT_LOG_FORMAT])
}

pub(crate) fn last_commit_time(cwd: &Path) -> Invocation {
    git_cmd(cwd).args(["log", "-1", COMMIT_TIME_DATE, "--format=%cd"])
}

/// A git subcommand line such as `pull` or `pull --rebase`, already checked
/// by `validate_update_cmd`. Blank input falls back to `pull`.
pub(crate) fn subcommand(cwd: &Path, line: &str) -> Invocation {
    let mut parts = line.split_whitespace().peekable();
    if parts.peek().is_none() {
        return git_cmd(cwd).arg("pull");
    }
    git_cmd(cwd).args(parts)
}
