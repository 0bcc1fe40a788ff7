//! Bundler configuration.
//!
//! Every field has a default so a partial JSON config file is enough.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 4205;
pub const DEFAULT_NAMESPACE: &str = "app/components";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BundleMode {
    /// One assembled artifact holding every reachable module.
    #[default]
    Single,
    /// Every reachable module copied as its own file.
    Multi,
    /// Every component file under the module root copied, reachable or not.
    Mirror,
}

impl FromStr for BundleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(BundleMode::Single),
            "multi" => Ok(BundleMode::Multi),
            "mirror" => Ok(BundleMode::Mirror),
            other => Err(format!(
                "unknown bundle mode `{}` (expected single, multi or mirror)",
                other
            )),
        }
    }
}

impl fmt::Display for BundleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BundleMode::Single => "single",
            BundleMode::Multi => "multi",
            BundleMode::Mirror => "mirror",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BundlerOptions {
    pub project_root: PathBuf,
    pub modules_root: PathBuf,
    pub output_dir: PathBuf,
    pub public_url: String,
    pub default_port: u16,
    pub extension: String,
    /// Specifier prefix of in-project modules. Derived from the package name when unset.
    pub namespace: Option<String>,
    /// Overrides `peek-extensions.entry-point` from package.json.
    pub entry_point: Option<String>,
    pub mode: BundleMode,
    pub shrink: bool,
    /// Artifact path in single mode, relative to the output dir. Defaults to the
    /// entry's relative path.
    pub bundle_file_name: Option<String>,
    pub package_json: PathBuf,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            modules_root: PathBuf::from("app/components"),
            output_dir: PathBuf::from("public/assets/extension-files"),
            public_url: "assets/extension-files".to_string(),
            default_port: DEFAULT_PORT,
            extension: "gjs".to_string(),
            namespace: None,
            entry_point: None,
            mode: BundleMode::default(),
            shrink: false,
            bundle_file_name: None,
            package_json: PathBuf::from("package.json"),
        }
    }
}

impl BundlerOptions {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn under_project(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn modules_root_path(&self) -> PathBuf {
        self.under_project(&self.modules_root)
    }

    pub fn output_dir_path(&self) -> PathBuf {
        self.under_project(&self.output_dir)
    }

    pub fn package_json_path(&self) -> PathBuf {
        self.under_project(&self.package_json)
    }

    /// Namespace used for local specifiers and manifest names.
    pub fn resolve_namespace(&self, package_name: Option<&str>) -> String {
        if let Some(ns) = &self.namespace {
            return ns.trim_end_matches('/').to_string();
        }
        match package_name {
            Some(name) if !name.trim().is_empty() => format!("{}/components", name.trim()),
            _ => DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// URL the assets are served from before the host server reports its address.
    pub fn initial_base_url(&self) -> String {
        ServerAddress::default().base_url(self.default_port)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Address reported by the host server once it is listening.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerAddress {
    #[serde(default)]
    pub https: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServerAddress {
    pub fn base_url(&self, default_port: u16) -> String {
        let protocol = if self.https { "https" } else { "http" };
        let host = match self.host.as_deref() {
            None | Some("") | Some("::1") => "localhost",
            Some(host) => host,
        };
        let port = self.port.unwrap_or(default_port);
        format!("{}://{}:{}", protocol, host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let options = BundlerOptions::from_json(r#"{ "mode": "multi", "shrink": true }"#).unwrap();
        assert_eq!(options.mode, BundleMode::Multi);
        assert!(options.shrink);
        assert_eq!(options.extension, "gjs");
        assert_eq!(options.public_url, "assets/extension-files");
        assert_eq!(options.default_port, DEFAULT_PORT);
    }

    #[test]
    fn test_namespace_resolution() {
        let mut options = BundlerOptions::default();
        assert_eq!(
            options.resolve_namespace(Some("ember-app-suite")),
            "ember-app-suite/components"
        );
        assert_eq!(options.resolve_namespace(None), DEFAULT_NAMESPACE);

        options.namespace = Some("suite/widgets/".to_string());
        assert_eq!(options.resolve_namespace(Some("ignored")), "suite/widgets");
    }

    #[test]
    fn test_server_address_base_url() {
        let loopback = ServerAddress {
            https: false,
            host: Some("::1".to_string()),
            port: Some(5173),
        };
        assert_eq!(loopback.base_url(DEFAULT_PORT), "http://localhost:5173");

        let secure = ServerAddress {
            https: true,
            host: Some("10.0.0.2".to_string()),
            port: None,
        };
        assert_eq!(secure.base_url(DEFAULT_PORT), "https://10.0.0.2:4205");
    }

    #[test]
    fn test_bundle_mode_parsing() {
        assert_eq!("mirror".parse::<BundleMode>().unwrap(), BundleMode::Mirror);
        assert!("bogus".parse::<BundleMode>().is_err());
    }
}
