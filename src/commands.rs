//! Command-line front-end.
//!
//! Single-plugin commands print their outcome as JSON. Batch commands print
//! the report text unless `--json` is given.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{
    config_dir, load_json_config, load_json_config_from, save_json_config, save_json_config_to,
    PackageManager, UpdaterConfig, CONFIG_FILE,
};
use crate::git_update::{validate_update_cmd, DEFAULT_UPDATE_CMD};
use crate::npm::{validate_package_name, DEFAULT_TAG};
use crate::registry::Origin;
use crate::report::BatchReport;
use crate::state::AppState;
use crate::updater::Updater;

/// Env var holding the tracing filter directive.
pub const LOG_ENV: &str = "PLUGINKEEPER_LOG";

/// pluginkeeper - keep npm and git plugins of a bot host up to date
#[derive(Parser, Debug)]
#[command(name = "pluginkeeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print batch reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "PLUGINKEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host project root holding package.json
    #[arg(long, global = true, env = "PLUGINKEEPER_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// pnpm or npm
    #[arg(long, global = true)]
    pub package_manager: Option<PackageManager>,

    /// Time budget in seconds for each git check/update
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare the installed and published version of an npm plugin
    Check { name: String },

    /// Update one npm plugin
    Update {
        name: String,
        /// Dist-tag to update to
        #[arg(long, default_value = DEFAULT_TAG)]
        tag: String,
    },

    /// Update every npm plugin and the host package in one batch
    UpdateAll,

    /// Check whether a git plugin is behind its upstream
    GitCheck {
        /// Plugin name under the plugins directory, or a checkout path
        path: String,
    },

    /// Update one git plugin
    GitUpdate {
        path: String,
        /// Git subcommand to run
        #[arg(long, default_value = DEFAULT_UPDATE_CMD)]
        cmd: String,
    },

    /// Update every git plugin
    GitUpdateAll {
        #[arg(long, default_value = DEFAULT_UPDATE_CMD)]
        cmd: String,
    },

    /// List installed plugins
    Plugins {
        #[arg(long, default_value = "npm")]
        origin: Origin,
        /// Print `npm:`/`git:` prefixed identifiers
        #[arg(long)]
        prefixed: bool,
    },

    /// Serve the local HTTP API
    Serve {
        /// Overrides the configured port
        #[arg(long, env = "PLUGINKEEPER_PORT")]
        port: Option<u16>,
    },

    /// Show or persist the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write the effective configuration to the config file
    Save,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| config_dir().join(CONFIG_FILE))
    }

    /// File config with command-line overrides applied.
    pub fn load_config(&self) -> UpdaterConfig {
        let base = match &self.config {
            Some(path) => load_json_config_from(path),
            None => load_json_config(CONFIG_FILE),
        };
        self.apply_overrides(base)
    }

    fn apply_overrides(&self, mut config: UpdaterConfig) -> UpdaterConfig {
        if let Some(dir) = &self.project_dir {
            config.project_dir = dir.clone();
        }
        if let Some(pm) = self.package_manager {
            config.package_manager = pm;
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
        config
    }
}

/// A git plugin argument: an existing path as given, otherwise a plugin
/// name under the plugins directory.
fn locate_git_plugin(config: &UpdaterConfig, raw: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(raw);
    if path.is_absolute() || path.exists() {
        return Ok(path.to_path_buf());
    }
    let name = Origin::git_name(raw).map_err(anyhow::Error::msg)?;
    Ok(config.plugins_path().join(name))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: &BatchReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }
    println!("{report}");
    Ok(())
}

/// Console logging to stderr, filtered by `PLUGINKEEPER_LOG` (default `info`).
pub fn init_tracing() {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    execute(cli).await
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config();
    let timeout: Duration = config.timeout();

    match &cli.command {
        Commands::Check { name } => {
            validate_package_name(name).map_err(anyhow::Error::msg)?;
            let updater = Updater::from_config(config);
            print_json(&updater.check_pkg_update(name).await)
        }
        Commands::Update { name, tag } => {
            validate_package_name(name).map_err(anyhow::Error::msg)?;
            let updater = Updater::from_config(config);
            print_json(&updater.update_pkg(name, tag).await)
        }
        Commands::UpdateAll => {
            let updater = Updater::from_config(config);
            print_report(&updater.update_all_pkg().await, cli.json)
        }
        Commands::GitCheck { path } => {
            let path = locate_git_plugin(&config, path)?;
            let updater = Updater::from_config(config);
            print_json(&updater.check_git_plugin_update(&path, timeout).await)
        }
        Commands::GitUpdate { path, cmd } => {
            validate_update_cmd(cmd).map_err(anyhow::Error::msg)?;
            let path = locate_git_plugin(&config, path)?;
            let updater = Updater::from_config(config);
            print_json(&updater.update_git_plugin(&path, cmd, timeout).await)
        }
        Commands::GitUpdateAll { cmd } => {
            validate_update_cmd(cmd).map_err(anyhow::Error::msg)?;
            let updater = Updater::from_config(config);
            print_report(&updater.update_all_git_plugin(cmd, timeout).await, cli.json)
        }
        Commands::Plugins { origin, prefixed } => {
            let updater = Updater::from_config(config);
            let plugins = updater.registry().list_plugins(*origin, *prefixed)?;
            if cli.json {
                return print_json(&plugins);
            }
            for plugin in plugins {
                println!("{plugin}");
            }
            Ok(())
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.http_port);
            let state = AppState::new(config);
            crate::http::start_server(state, port)
                .await
                .with_context(|| format!("HTTP API on port {port} failed"))
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => print_json(&config),
            ConfigAction::Path => {
                println!("{}", cli.config_path().display());
                Ok(())
            }
            ConfigAction::Save => {
                let saved = match &cli.config {
                    Some(path) => {
                        let dir = path.parent().unwrap_or_else(|| Path::new("."));
                        let filename = path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or(CONFIG_FILE);
                        save_json_config_to(dir, filename, &config)
                    }
                    None => save_json_config(CONFIG_FILE, &config),
                }
                .map_err(anyhow::Error::msg)?;
                tracing::info!("Saved config to {}", saved.display());
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands_with_defaults() {
        let cli = Cli::try_parse_from(["pluginkeeper", "update", "karin-plugin-a"]).unwrap();
        match cli.command {
            Commands::Update { name, tag } => {
                assert_eq!(name, "karin-plugin-a");
                assert_eq!(tag, "latest");
            }
            other => panic!("Expected update, got {other:?}"),
        }

        let cli = Cli::try_parse_from(["pluginkeeper", "git-update-all", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::GitUpdateAll { ref cmd } if cmd == "pull"));
    }

    #[test]
    fn rejects_unknown_origin_and_package_manager() {
        assert!(Cli::try_parse_from(["pluginkeeper", "plugins", "--origin", "svn"]).is_err());
        assert!(Cli::try_parse_from(["pluginkeeper", "update-all", "--package-manager", "yarn"]).is_err());
    }

    #[test]
    fn flags_override_file_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_json_config_to(
            dir.path(),
            CONFIG_FILE,
            &UpdaterConfig {
                host_package: "my-host".into(),
                timeout_secs: 60,
                ..UpdaterConfig::default()
            },
        )
        .unwrap();
        let config_arg = path.to_string_lossy().to_string();

        let cli = Cli::try_parse_from([
            "pluginkeeper",
            "--config",
            &config_arg,
            "--package-manager",
            "npm",
            "--timeout",
            "5",
            "update-all",
        ])
        .unwrap();
        let config = cli.load_config();
        assert_eq!(config.host_package, "my-host");
        assert_eq!(config.package_manager, PackageManager::Npm);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn git_plugin_argument_resolution() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = UpdaterConfig {
            project_dir: dir.path().to_path_buf(),
            ..UpdaterConfig::default()
        };
        assert_eq!(
            locate_git_plugin(&config, "git:karin-plugin-a").unwrap(),
            dir.path().join("plugins").join("karin-plugin-a")
        );
        let absolute = dir.path().to_string_lossy().to_string();
        assert_eq!(locate_git_plugin(&config, &absolute).unwrap(), dir.path());
        assert!(locate_git_plugin(&config, "npm:karin-plugin-a").is_err());
    }

    #[tokio::test]
    async fn git_update_refuses_git_options_in_cmd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = dir.path().to_string_lossy().to_string();
        let config_arg = dir.path().join("cfg.json").to_string_lossy().to_string();
        let cli = Cli::try_parse_from([
            "pluginkeeper",
            "--config",
            &config_arg,
            "--project-dir",
            &project,
            "git-update",
            "karin-plugin-a",
            "--cmd=-c alias.zz=!touch${IFS}marker zz",
        ])
        .unwrap();
        let err = execute(cli).await.unwrap_err();
        assert!(err.to_string().contains("unsupported git command"));

        let cli = Cli::try_parse_from([
            "pluginkeeper",
            "--config",
            &config_arg,
            "git-update-all",
            "--cmd=--exec-path=/tmp pull",
        ])
        .unwrap();
        assert!(execute(cli).await.is_err());
    }

    #[tokio::test]
    async fn config_save_writes_to_given_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("custom.json");
        let cli = Cli::try_parse_from([
            "pluginkeeper",
            "--config",
            target.to_str().unwrap(),
            "--project-dir",
            "/srv/bot",
            "config",
            "save",
        ])
        .unwrap();
        execute(cli).await.unwrap();

        let saved: UpdaterConfig = load_json_config_from(&target);
        assert_eq!(saved.project_dir, PathBuf::from("/srv/bot"));
    }
}
