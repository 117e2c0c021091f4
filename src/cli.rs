//! Package-manager and git binary resolution with caching.
//!
//! Hosts started from service managers (systemd units, pm2, Windows
//! services) often run with a minimal PATH, so `pnpm` installed through
//! corepack or a user-level npm prefix isn't found. This module probes the
//! usual install locations and caches the results for the process lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Directories where node tooling and git commonly live outside a service
/// PATH. Computed once.
fn extra_bin_dirs() -> &'static [PathBuf] {
    static DIRS: OnceLock<Vec<PathBuf>> = OnceLock::new();
    DIRS.get_or_init(|| {
        let home = dirs::home_dir().unwrap_or_default();
        let mut dirs = Vec::new();

        #[cfg(not(target_os = "windows"))]
        {
            dirs.extend([
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/usr/bin"),
                home.join(".local/share/pnpm"),
                home.join(".npm-global/bin"),
                home.join(".volta/bin"),
            ]);
        }

        #[cfg(target_os = "macos")]
        {
            dirs.push(PathBuf::from("/opt/homebrew/bin"));
            dirs.push(home.join("Library/pnpm"));
        }

        #[cfg(target_os = "windows")]
        {
            let app_data = std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join("AppData\\Roaming"));
            let local_app_data = std::env::var("LOCALAPPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join("AppData\\Local"));
            dirs.extend([
                app_data.join("npm"),
                local_app_data.join("pnpm"),
                PathBuf::from("C:\\Program Files\\nodejs"),
                PathBuf::from("C:\\Program Files\\Git\\cmd"),
            ]);
        }

        dirs
    })
}

/// Resolve a CLI binary to its full path. Falls back to the bare name so the
/// OS PATH lookup still gets a chance at spawn time.
pub fn resolve_cli(name: &str) -> String {
    static CACHE: OnceLock<parking_lot::Mutex<HashMap<String, String>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| parking_lot::Mutex::new(HashMap::new()));

    if let Some(cached) = cache.lock().get(name) {
        return cached.clone();
    }

    let resolved = resolve_in(name, extra_bin_dirs());
    cache.lock().insert(name.to_string(), resolved.clone());
    resolved
}

fn resolve_in(name: &str, dirs: &[PathBuf]) -> String {
    let candidates: &[&str] = if cfg!(windows) {
        &[".cmd", ".exe", ""]
    } else {
        &[""]
    };
    for dir in dirs {
        for ext in candidates {
            let candidate = dir.join(format!("{name}{ext}"));
            if candidate.is_file() {
                return candidate.to_string_lossy().to_string();
            }
        }
    }
    name.to_string()
}

/// Check if a CLI tool exists on PATH or in the well-known directories.
pub fn has_cli(name: &str) -> bool {
    let checker = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };
    let on_path = std::process::Command::new(checker)
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    on_path || Path::new(&resolve_cli(name)).is_absolute()
}
