//! Project metadata reader.
//!
//! Reads `name`, `version` and `peek-extensions.entry-point` from package.json.
//! A missing or malformed file yields empty metadata; it never fails a compile.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_VERSION: &str = "0.0.0";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionConfig {
    #[serde(rename = "entry-point", default)]
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "peek-extensions", default)]
    pub extensions: Option<ExtensionConfig>,
}

impl ProjectMetadata {
    pub fn read(path: &Path) -> Self {
        let data = match fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Error parsing {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.entry_point.as_deref())
            .filter(|entry| !entry.trim().is_empty())
    }
}
