//! Installed plugin listing.
//!
//! Plugins come from two origins. npm plugins are dependencies of the host's
//! `package.json` whose name carries a plugin prefix; git plugins are
//! checkouts under the plugins directory. Identifiers are `npm:<name>` /
//! `git:<name>` in prefixed form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::UpdaterConfig;
use crate::manifest::Manifest;
use crate::outcome::UpdateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Npm,
    Git,
}

impl Origin {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Npm => "npm:",
            Self::Git => "git:",
        }
    }

    pub fn tag(self, name: &str) -> String {
        format!("{}{name}", self.prefix())
    }

    /// Drop this origin's prefix if present.
    pub fn strip(self, id: &str) -> &str {
        id.strip_prefix(self.prefix()).unwrap_or(id)
    }

    /// Split a prefixed identifier into its origin and bare name.
    pub fn parse_id(id: &str) -> Option<(Self, &str)> {
        [Self::Npm, Self::Git]
            .into_iter()
            .find_map(|origin| id.strip_prefix(origin.prefix()).map(|name| (origin, name)))
    }

    /// Bare checkout name for a git plugin argument. Unprefixed names pass
    /// through; an `npm:` identifier names no checkout.
    pub fn git_name(id: &str) -> Result<&str, String> {
        match Self::parse_id(id) {
            Some((Self::Git, name)) => Ok(name),
            Some((Self::Npm, _)) => Err(format!("\"{id}\" is an npm plugin, not a git checkout")),
            None => Ok(id),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches(':'))
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "npm" => Ok(Self::Npm),
            "git" => Ok(Self::Git),
            other => Err(format!("unknown plugin origin \"{other}\" (expected npm or git)")),
        }
    }
}

/// Source of the installed plugin set.
pub trait PluginRegistry: Send + Sync {
    fn list_plugins(&self, origin: Origin, with_prefix: bool) -> Result<Vec<String>, UpdateError>;
}

/// Registry backed by the host's `package.json` and plugins directory.
#[derive(Debug, Clone)]
pub struct FsRegistry {
    manifest_path: PathBuf,
    plugins_dir: PathBuf,
    prefixes: Vec<String>,
}

impl FsRegistry {
    pub fn new(config: &UpdaterConfig) -> Self {
        Self {
            manifest_path: config.manifest_path(),
            plugins_dir: config.plugins_path(),
            prefixes: config.plugin_prefixes.clone(),
        }
    }

    /// `@scope/karin-plugin-x` counts as matching `karin-plugin-`.
    fn is_plugin_name(&self, name: &str) -> bool {
        let bare = name.rsplit('/').next().unwrap_or(name);
        self.prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()) || bare.starts_with(p.as_str()))
    }

    fn npm_plugins(&self) -> Result<Vec<String>, UpdateError> {
        let manifest = Manifest::load(&self.manifest_path)?;
        let mut names: Vec<String> = Vec::new();
        for name in manifest.installed_names() {
            if self.is_plugin_name(name) && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn git_plugins(&self) -> Result<Vec<String>, UpdateError> {
        let entries = match std::fs::read_dir(&self.plugins_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(UpdateError::Registry(format!(
                    "Failed to read {}: {e}",
                    self.plugins_dir.display()
                )));
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir() && entry.path().join(".git").exists())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}

impl PluginRegistry for FsRegistry {
    fn list_plugins(&self, origin: Origin, with_prefix: bool) -> Result<Vec<String>, UpdateError> {
        let names = match origin {
            Origin::Npm => self.npm_plugins()?,
            Origin::Git => self.git_plugins()?,
        };
        if !with_prefix {
            return Ok(names);
        }
        Ok(names.iter().map(|n| origin.tag(n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, FsRegistry) {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("package.json"),
            r#"{
                "dependencies": {
                    "node-karin": "^1.4.0",
                    "karin-plugin-zeta": "1.0.0",
                    "@karinjs/karin-plugin-alpha": "2.0.0",
                    "lodash": "4.17.21"
                },
                "devDependencies": { "karin-plugin-dev": "0.1.0", "karin-plugin-zeta": "1.0.0" }
            }"#,
        )
        .unwrap();

        let plugins = dir.path().join("plugins");
        fs::create_dir_all(plugins.join("repo-b/.git")).unwrap();
        fs::create_dir_all(plugins.join("repo-a/.git")).unwrap();
        fs::create_dir_all(plugins.join("not-a-repo")).unwrap();
        fs::write(plugins.join("stray-file"), "x").unwrap();

        let config = UpdaterConfig {
            project_dir: dir.path().to_path_buf(),
            ..UpdaterConfig::default()
        };
        let registry = FsRegistry::new(&config);
        (dir, registry)
    }

    #[test]
    fn npm_plugins_follow_manifest_order_without_duplicates() {
        let (_dir, registry) = fixture();
        let names = registry.list_plugins(Origin::Npm, false).unwrap();
        assert_eq!(
            names,
            vec!["karin-plugin-zeta", "@karinjs/karin-plugin-alpha", "karin-plugin-dev"]
        );
    }

    #[test]
    fn git_plugins_are_sorted_repo_directories() {
        let (_dir, registry) = fixture();
        let names = registry.list_plugins(Origin::Git, true).unwrap();
        assert_eq!(names, vec!["git:repo-a", "git:repo-b"]);
    }

    #[test]
    fn missing_plugins_dir_lists_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = UpdaterConfig {
            project_dir: dir.path().to_path_buf(),
            ..UpdaterConfig::default()
        };
        let registry = FsRegistry::new(&config);
        assert!(registry.list_plugins(Origin::Git, false).unwrap().is_empty());
        assert!(registry.list_plugins(Origin::Npm, false).is_err());
    }

    #[test]
    fn origin_prefix_handling() {
        assert_eq!(Origin::Npm.tag("foo"), "npm:foo");
        assert_eq!(Origin::Git.strip("git:bar"), "bar");
        assert_eq!(Origin::Git.strip("bar"), "bar");
        assert_eq!(Origin::parse_id("npm:foo"), Some((Origin::Npm, "foo")));
        assert_eq!(Origin::parse_id("foo"), None);
        assert_eq!(Origin::git_name("git:bar"), Ok("bar"));
        assert_eq!(Origin::git_name("bar"), Ok("bar"));
        assert!(Origin::git_name("npm:karin-plugin-a").is_err());
        assert_eq!("GIT".parse::<Origin>(), Ok(Origin::Git));
    }
}
