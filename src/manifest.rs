//! The host project's `package.json`.
//!
//! Only the three dependency maps matter here. Declaration order is kept
//! (serde_json `preserve_order`) so registry listings follow the manifest.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

use crate::outcome::UpdateError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: Map<String, Value>,
    #[serde(default)]
    pub dev_dependencies: Map<String, Value>,
    #[serde(default)]
    pub peer_dependencies: Map<String, Value>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, UpdateError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UpdateError::Registry(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| UpdateError::Registry(format!("Failed to parse {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// The first version string declared for `name`, looking at
    /// `dependencies`, then `devDependencies`, then `peerDependencies`.
    pub fn declared_version(&self, name: &str) -> Option<&str> {
        [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
        ]
        .into_iter()
        .find_map(|deps| deps.get(name).and_then(Value::as_str))
    }

    /// Installed dependency names (runtime then dev), in declaration order.
    pub fn installed_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .map(String::as_str)
    }
}

/// Strip range operators so a declared `^1.2.3` compares equal to `1.2.3`.
pub fn bare_version(declared: &str) -> &str {
    declared.trim().trim_start_matches(['^', '~', '=', 'v'])
}
