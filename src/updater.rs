//! The update orchestrator handle.
//!
//! [`Updater`] owns the collaborators every flow needs (command runner,
//! plugin registry, log sink, configuration). The npm flows live in
//! `npm.rs`, the git inspector in `git.rs` and the git update flows in
//! `git_update.rs`, all as `impl Updater` blocks.

use std::path::Path;
use std::sync::Arc;

use crate::app_logger::{LogLevel, LogSink, TracingSink};
use crate::config::UpdaterConfig;
use crate::registry::{FsRegistry, PluginRegistry};
use crate::runner::{CommandOutput, CommandRunner, Invocation, ShellRunner};

#[derive(Clone)]
pub struct Updater {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<dyn PluginRegistry>,
    log: Arc<dyn LogSink>,
    config: UpdaterConfig,
}

impl Updater {
    /// Logs to tracing until [`Updater::with_logger`] says otherwise.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<dyn PluginRegistry>,
        config: UpdaterConfig,
    ) -> Self {
        Self {
            runner,
            registry,
            log: Arc::new(TracingSink),
            config,
        }
    }

    /// Real processes and the filesystem registry described by `config`.
    pub fn from_config(config: UpdaterConfig) -> Self {
        let registry = FsRegistry::new(&config);
        Self::new(Arc::new(ShellRunner), Arc::new(registry), config)
    }

    pub fn with_logger(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn registry(&self) -> &dyn PluginRegistry {
        self.registry.as_ref()
    }

    pub(crate) async fn exec(&self, invocation: Invocation) -> CommandOutput {
        let is_git = Path::new(&invocation.program)
            .file_stem()
            .is_some_and(|stem| stem == "git");
        let source = if is_git { "git" } else { "npm" };
        self.log(LogLevel::Debug, source, &format!("$ {invocation}"));
        let output = self.runner.execute(&invocation).await;
        if let Some(err) = &output.error {
            self.log(LogLevel::Debug, source, &format!("{invocation}: {err}"));
        }
        output
    }

    pub(crate) fn log(&self, level: LogLevel, source: &str, message: &str) {
        self.log.log(level, source, message);
    }
}
