//! Errors and tagged outcomes of the update operations.
//!
//! Helpers return `Result<_, UpdateError>`. Orchestration entry points never
//! return an error: they fold everything into one of the outcome enums below,
//! which serialize with a `status` tag for the console front-end.
//!
//! Status vocabulary is the same for every operation:
//! - `error`: a precondition failed before anything was mutated
//! - `failed`: an update was attempted (or refused by policy) and did not land
//! - `timeout`: the operation exceeded its time budget and was cancelled

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::ExecError;

pub const PATH_NOT_FOUND: &str = "路径不存在";
pub const NOT_A_GIT_REPO: &str = "该路径不是一个git仓库";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// The package manager reports the package as absent.
    NotInstalled(String),
    NotAGitRepo(PathBuf),
    PathNotFound(PathBuf),
    /// An external command failed.
    Execution { command: String, source: ExecError },
    /// The update command ran but the resulting state is not the expected one.
    VerificationFailed { expected: String, actual: String },
    Timeout(Duration),
    /// The plugin listing or the manifest could not be read.
    Registry(String),
}

impl UpdateError {
    pub(crate) fn execution(command: impl fmt::Display, source: ExecError) -> Self {
        Self::Execution {
            command: command.to_string(),
            source,
        }
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled(name) => write!(f, "未安装 {name}"),
            Self::NotAGitRepo(_) => f.write_str(NOT_A_GIT_REPO),
            Self::PathNotFound(_) => f.write_str(PATH_NOT_FOUND),
            Self::Execution { command, source } => write!(f, "执行 {command} 失败: {source}"),
            Self::VerificationFailed { expected, actual } => {
                write!(f, "更新后版本校验失败: 期望 {expected}，实际 {actual}")
            }
            Self::Timeout(limit) => write!(f, "操作超时 ({}s)", limit.as_secs()),
            Self::Registry(msg) => write!(f, "读取插件信息失败: {msg}"),
        }
    }
}

impl std::error::Error for UpdateError {}

// ---------------------------------------------------------------------------
// npm outcomes
// ---------------------------------------------------------------------------

/// Result of `check_pkg_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PkgCheck {
    Yes { local: String, remote: String },
    No { local: String },
    Error { error: String },
}

/// Result of `update_pkg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PkgUpdate {
    Ok {
        local: String,
        remote: String,
        data: String,
    },
    Failed { data: String },
    Error { data: String },
}

impl PkgUpdate {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

// ---------------------------------------------------------------------------
// git outcomes
// ---------------------------------------------------------------------------

/// Result of `check_git_plugin_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GitCheck {
    /// Behind upstream: `data` is the commit log of the missing commits.
    Yes { data: String, count: u32 },
    /// Up to date: `data` is the last-commit time.
    No { data: String },
    Error { data: String },
    Timeout { data: String },
}

/// Result of `update_git_plugin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GitUpdate {
    Ok {
        data: String,
        before: String,
        after: String,
    },
    Failed { data: String },
    Error { data: String },
    Timeout { data: String },
}

impl GitUpdate {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Ok { data, .. }
            | Self::Failed { data }
            | Self::Error { data }
            | Self::Timeout { data } => data,
        }
    }
}
