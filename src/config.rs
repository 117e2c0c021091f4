use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/pluginkeeper/`
/// - Linux: `~/.config/pluginkeeper/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/pluginkeeper/`
///
/// Falls back to `~/.pluginkeeper/` if the platform dir is unavailable.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("pluginkeeper"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pluginkeeper")
        })
}

// ---------------------------------------------------------------------------
// Updater config
// ---------------------------------------------------------------------------

/// Package manager used for version queries and upgrades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Pnpm,
    Npm,
}

impl PackageManager {
    pub fn binary(self) -> &'static str {
        match self {
            Self::Pnpm => "pnpm",
            Self::Npm => "npm",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pnpm" => Ok(Self::Pnpm),
            "npm" => Ok(Self::Npm),
            other => Err(format!("unknown package manager \"{other}\" (expected pnpm or npm)")),
        }
    }
}

/// Where the host lives and how its plugins are updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    pub package_manager: PackageManager,
    /// Host project root (holds `package.json` and `node_modules`).
    pub project_dir: PathBuf,
    /// Git plugin checkouts; relative paths resolve against `project_dir`.
    pub plugins_dir: PathBuf,
    /// The host package itself, always included in npm update passes.
    pub host_package: String,
    /// Dependency-name prefixes that mark a package as a plugin.
    pub plugin_prefixes: Vec<String>,
    /// Budget for each git check/update.
    pub timeout_secs: u64,
    pub http_port: u16,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            package_manager: PackageManager::Pnpm,
            project_dir: PathBuf::from("."),
            plugins_dir: PathBuf::from("plugins"),
            host_package: "node-karin".to_string(),
            plugin_prefixes: vec!["karin-plugin-".to_string()],
            timeout_secs: 120,
            http_port: 7880,
        }
    }
}

impl UpdaterConfig {
    pub fn manifest_path(&self) -> PathBuf {
        self.project_dir.join("package.json")
    }

    /// `Path::join` keeps an absolute `plugins_dir` as-is.
    pub fn plugins_path(&self) -> PathBuf {
        self.project_dir.join(&self.plugins_dir)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// JSON persistence
// ---------------------------------------------------------------------------

/// Load a JSON config file from the config dir, returning Default if missing
/// or corrupt.
pub fn load_json_config<T: DeserializeOwned + Default>(filename: &str) -> T {
    load_json_config_from(&config_dir().join(filename))
}

/// Load a JSON config file, returning Default if missing or corrupt.
/// A file that exists but can't be used is logged, so a silent reset to
/// defaults is visible.
pub fn load_json_config_from<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Could not read config {}: {e}", path.display());
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Corrupt config {}: {e}. Using defaults.", path.display());
            T::default()
        }
    }
}

/// Save a JSON config file into the config dir.
pub fn save_json_config<T: Serialize>(filename: &str, config: &T) -> Result<PathBuf, String> {
    save_json_config_to(&config_dir(), filename, config)
}

/// Save a JSON config file atomically (temp file + rename).
pub fn save_json_config_to<T: Serialize>(
    dir: &Path,
    filename: &str,
    config: &T,
) -> Result<PathBuf, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create config directory: {e}"))?;

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {e}"))?;

    let target = dir.join(filename);
    let temp = dir.join(format!("{filename}.tmp.{}", std::process::id()));

    std::fs::write(&temp, &json).map_err(|e| format!("Failed to write temp config: {e}"))?;
    std::fs::rename(&temp, &target).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        format!("Failed to save config: {e}")
    })?;
    Ok(target)
}
