//! External command execution.
//!
//! Every npm/pnpm/git invocation in the crate goes through a [`CommandRunner`].
//! The default [`ShellRunner`] spawns the process on the tokio runtime,
//! captures its output, and kills the child when the awaiting future is
//! dropped. Callers bound an operation by wrapping it in
//! `tokio::time::timeout`.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error from a single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The process could not be spawned (missing binary, permission error).
    SpawnFailed { program: String, message: String },
    /// The process exited with a non-zero status code.
    NonZeroExit { code: Option<i32>, stderr: String },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { program, message } => {
                write!(f, "Failed to spawn {program}: {message}")
            }
            Self::NonZeroExit { code, stderr } => {
                let code_str = code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                if stderr.is_empty() {
                    write!(f, "exited with code {code_str}")
                } else {
                    write!(f, "exited with code {code_str}: {stderr}")
                }
            }
        }
    }
}

impl std::error::Error for ExecError {}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A fully described external command: program, arguments, working
/// directory and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, val: &str) -> Self {
        self.envs.push((key.to_string(), val.to_string()));
        self
    }
}

/// Renders as a command line, using only the file name of the resolved
/// program (`/usr/bin/git log -1` shows as `git log -1`).
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let program = Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| self.program.as_str().into());
        write!(f, "{program}")?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Captured result of an invocation. `error` is `None` exactly when
/// `status` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub error: Option<ExecError>,
    pub status: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            error: None,
            status: true,
        }
    }

    pub fn failed(error: ExecError) -> Self {
        let stderr = match &error {
            ExecError::NonZeroExit { stderr, .. } => stderr.clone(),
            _ => String::new(),
        };
        Self {
            stdout: String::new(),
            stderr,
            error: Some(error),
            status: false,
        }
    }

    /// Shorthand for a non-zero exit with the given stderr.
    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self::failed(ExecError::NonZeroExit {
            code: Some(code),
            stderr: stderr.into(),
        })
    }

    /// The error rendered as text, or an empty string on success.
    pub fn error_text(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }

    /// Stdout on success, the error otherwise.
    pub fn into_result(self) -> Result<String, ExecError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.stdout),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner trait
// ---------------------------------------------------------------------------

/// Runs external commands. Implementations never return `Err`: failures are
/// reported through [`CommandOutput::error`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> CommandOutput;
}

/// Spawns real child processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn execute(&self, invocation: &Invocation) -> CommandOutput {
        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the output future (timeout, caller cancelled) kills the child.
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        for (key, val) in &invocation.envs {
            cmd.env(key, val);
        }

        let output = match cmd.output().await {
            Ok(o) => o,
            Err(e) => {
                return CommandOutput::failed(ExecError::SpawnFailed {
                    program: invocation.program.clone(),
                    message: e.to_string(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            return CommandOutput {
                stdout,
                stderr,
                error: None,
                status: true,
            };
        }

        CommandOutput {
            stdout,
            stderr: stderr.clone(),
            error: Some(ExecError::NonZeroExit {
                code: output.status.code(),
                stderr,
            }),
            status: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
