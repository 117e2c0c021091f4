//! Version checks and updates for the npm and git plugins of a Node bot host.
//!
//! [`Updater`] is the entry point: npm flows in [`npm`], git inspection in
//! [`git`], git updates in [`git_update`]. Orchestration calls never return
//! `Err`; they produce the tagged outcomes in [`outcome`] or a
//! [`BatchReport`].

pub mod app_logger;
pub mod cli;
pub mod commands;
pub mod config;
pub mod git;
pub(crate) mod git_cli;
pub mod git_update;
pub mod http;
pub mod manifest;
pub mod npm;
pub mod outcome;
pub mod registry;
pub mod report;
pub mod runner;
pub mod state;
pub mod updater;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{PackageManager, UpdaterConfig};
pub use outcome::{GitCheck, GitUpdate, PkgCheck, PkgUpdate, UpdateError};
pub use registry::{FsRegistry, Origin, PluginRegistry};
pub use report::{BatchReport, ReportLine};
pub use runner::{CommandOutput, CommandRunner, ExecError, Invocation, ShellRunner};
pub use updater::Updater;
