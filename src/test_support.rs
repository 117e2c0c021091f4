//! In-memory collaborators for orchestrator tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_logger::{shared_log_buffer, RingSink, SharedLogBuffer};
use crate::config::UpdaterConfig;
use crate::outcome::UpdateError;
use crate::registry::{Origin, PluginRegistry};
use crate::runner::{CommandOutput, CommandRunner, ExecError, Invocation};
use crate::updater::Updater;

#[derive(Clone)]
struct Reply {
    output: CommandOutput,
    delay: Option<Duration>,
}

struct Rule {
    pattern: String,
    cwd: Option<PathBuf>,
    replies: VecDeque<Reply>,
}

/// Answers invocations whose command line contains a registered pattern.
/// Replies for a pattern are consumed in order; the last one repeats.
/// Unscripted commands fail with a spawn error.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, pattern: &str, output: CommandOutput) -> Self {
        self.add(None, pattern, Reply { output, delay: None })
    }

    pub(crate) fn on_in(self, cwd: &Path, pattern: &str, output: CommandOutput) -> Self {
        self.add(Some(cwd.to_path_buf()), pattern, Reply { output, delay: None })
    }

    /// Reply only after `delay`, for timeout tests.
    pub(crate) fn on_slow(self, pattern: &str, delay: Duration, output: CommandOutput) -> Self {
        self.add(
            None,
            pattern,
            Reply {
                output,
                delay: Some(delay),
            },
        )
    }

    fn add(self, cwd: Option<PathBuf>, pattern: &str, reply: Reply) -> Self {
        {
            let mut rules = self.rules.lock();
            match rules
                .iter_mut()
                .find(|r| r.pattern == pattern && r.cwd == cwd)
            {
                Some(rule) => rule.replies.push_back(reply),
                None => rules.push(Rule {
                    pattern: pattern.to_string(),
                    cwd,
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    /// Every command line issued so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.to_string()).collect()
    }

    pub(crate) fn count_calls(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    pub(crate) fn was_called(&self, pattern: &str) -> bool {
        self.count_calls(pattern) > 0
    }

    fn next_reply(&self, invocation: &Invocation) -> Option<Reply> {
        let line = invocation.to_string();
        let mut rules = self.rules.lock();
        let rule = rules.iter_mut().find(|r| {
            line.contains(&r.pattern)
                && r.cwd
                    .as_ref()
                    .is_none_or(|cwd| invocation.cwd.as_ref() == Some(cwd))
        })?;
        if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, invocation: &Invocation) -> CommandOutput {
        self.calls.lock().push(invocation.clone());
        let Some(reply) = self.next_reply(invocation) else {
            return CommandOutput::failed(ExecError::SpawnFailed {
                program: invocation.program.clone(),
                message: format!("unscripted command: {invocation}"),
            });
        };
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.output
    }
}

/// Fixed plugin lists.
#[derive(Default)]
pub(crate) struct StaticRegistry {
    pub(crate) npm: Vec<String>,
    pub(crate) git: Vec<String>,
}

impl StaticRegistry {
    pub(crate) fn npm(names: &[&str]) -> Self {
        Self {
            npm: names.iter().map(|n| n.to_string()).collect(),
            git: Vec::new(),
        }
    }

    pub(crate) fn git(names: &[&str]) -> Self {
        Self {
            npm: Vec::new(),
            git: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl PluginRegistry for StaticRegistry {
    fn list_plugins(&self, origin: Origin, with_prefix: bool) -> Result<Vec<String>, UpdateError> {
        let names = match origin {
            Origin::Npm => &self.npm,
            Origin::Git => &self.git,
        };
        Ok(names
            .iter()
            .map(|n| if with_prefix { origin.tag(n) } else { n.clone() })
            .collect())
    }
}

/// A registry whose listing always fails.
pub(crate) struct BrokenRegistry;

impl PluginRegistry for BrokenRegistry {
    fn list_plugins(&self, _origin: Origin, _with_prefix: bool) -> Result<Vec<String>, UpdateError> {
        Err(UpdateError::Registry("package.json is unreadable".into()))
    }
}

/// An updater over a scripted runner, logging into a fresh ring buffer.
pub(crate) fn updater_with(
    runner: Arc<ScriptedRunner>,
    registry: impl PluginRegistry + 'static,
    config: UpdaterConfig,
) -> (Updater, SharedLogBuffer) {
    let logs = shared_log_buffer();
    let updater = Updater::new(runner, Arc::new(registry), config)
        .with_logger(Arc::new(RingSink::new(logs.clone())));
    (updater, logs)
}

/// Config rooted at `dir`, with a host package name the tests script.
pub(crate) fn config_in(dir: &Path) -> UpdaterConfig {
    UpdaterConfig {
        project_dir: dir.to_path_buf(),
        host_package: "host-app".to_string(),
        ..UpdaterConfig::default()
    }
}

/// Write `package.json` into `dir`.
pub(crate) fn write_manifest(dir: &Path, json: &str) {
    std::fs::write(dir.join("package.json"), json).expect("write package.json");
}

/// Create `dir/name/.git` and return the checkout path.
pub(crate) fn fake_repo(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::create_dir_all(path.join(".git")).expect("create fake repo");
    path
}

/// Run git in `dir` with a throwaway identity, panicking on failure.
pub(crate) fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args([
            "-c",
            "user.name=pluginkeeper",
            "-c",
            "user.email=pluginkeeper@localhost",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Write `file` and commit it with `message`.
pub(crate) fn commit_file(repo: &Path, file: &str, message: &str) {
    std::fs::write(repo.join(file), message).expect("write file");
    run_git(repo, &["add", file]);
    run_git(repo, &["commit", "-q", "-m", message]);
}

/// An upstream repo with one commit and a clone of it under `dir/plugins`.
pub(crate) fn cloned_repo(dir: &Path) -> (PathBuf, PathBuf) {
    let upstream = dir.join("upstream");
    std::fs::create_dir_all(&upstream).expect("create upstream");
    run_git(&upstream, &["init", "-q"]);
    commit_file(&upstream, "a.txt", "init");

    let plugins = dir.join("plugins");
    std::fs::create_dir_all(&plugins).expect("create plugins dir");
    let src = upstream.to_string_lossy().to_string();
    run_git(&plugins, &["clone", "-q", &src, "karin-plugin-demo"]);
    (upstream, plugins.join("karin-plugin-demo"))
}
