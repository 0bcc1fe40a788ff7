//! Manifest emission.
//!
//! The manifest tells the host application where to fetch the artifact and
//! under which module name to register it. Emission is pure: the base URL is
//! passed in, never read from ambient state.

use serde::{Deserialize, Serialize};

use crate::naming::capitalize;
use crate::options::BundleMode;

pub const MANIFEST_TYPE: &str = "ember-extension";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub url: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<ManifestEntry>>,
    pub main_dependency: ManifestEntry,
}

impl Manifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Data the emitter needs besides the module paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestContext<'a> {
    pub namespace: &'a str,
    pub public_url: &'a str,
    pub version: &'a str,
    pub extension: &'a str,
    pub mode: BundleMode,
}

/// A module as it appears in the manifest: its name comes from `module_path`,
/// its URL from `asset_path`. They differ only for a single-mode bundle whose
/// file name was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestModule<'a> {
    pub module_path: &'a str,
    pub asset_path: &'a str,
}

impl<'a> ManifestModule<'a> {
    pub fn same(path: &'a str) -> Self {
        Self {
            module_path: path,
            asset_path: path,
        }
    }
}

fn strip_extension<'p>(path: &'p str, extension: &str) -> &'p str {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    path.strip_suffix(suffix.as_str()).unwrap_or(path)
}

pub fn module_name(relative_path: &str, context: &ManifestContext) -> String {
    let stem = strip_extension(relative_path, context.extension);
    match context.mode {
        BundleMode::Mirror => format!("./{}", capitalize(stem)),
        BundleMode::Single | BundleMode::Multi => format!("{}/{}", context.namespace, stem),
    }
}

pub fn join_url(base_url: &str, public_url: &str, relative_path: &str) -> String {
    [base_url, public_url, relative_path]
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn entry_for(module: ManifestModule, base_url: &str, context: &ManifestContext) -> ManifestEntry {
    ManifestEntry {
        name: module_name(module.module_path, context),
        url: join_url(base_url, context.public_url, module.asset_path),
        version: context.version.to_string(),
        kind: MANIFEST_TYPE.to_string(),
    }
}

/// Builds the manifest. Single mode ignores `dependencies`: they are inlined.
pub fn emit(
    entry: ManifestModule,
    dependencies: &[ManifestModule],
    base_url: &str,
    context: &ManifestContext,
) -> Manifest {
    let dependencies = match context.mode {
        BundleMode::Single => None,
        BundleMode::Multi | BundleMode::Mirror => Some(
            dependencies
                .iter()
                .map(|dep| entry_for(*dep, base_url, context))
                .collect(),
        ),
    };

    Manifest {
        dependencies,
        main_dependency: entry_for(entry, base_url, context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(mode: BundleMode) -> ManifestContext<'static> {
        ManifestContext {
            namespace: "ember-app-suite/components",
            public_url: "assets/extension-files",
            version: "1.2.3",
            extension: "gjs",
            mode,
        }
    }

    #[test]
    fn test_single_mode_has_only_main_dependency() {
        let manifest = emit(
            ManifestModule::same("widget.gjs"),
            &[ManifestModule::same("button.gjs")],
            "http://localhost:4205",
            &context(BundleMode::Single),
        );
        assert!(manifest.dependencies.is_none());
        assert_eq!(
            manifest.main_dependency,
            ManifestEntry {
                name: "ember-app-suite/components/widget".to_string(),
                url: "http://localhost:4205/assets/extension-files/widget.gjs".to_string(),
                version: "1.2.3".to_string(),
                kind: MANIFEST_TYPE.to_string(),
            }
        );

        let json = manifest.to_json().unwrap();
        assert!(!json.contains("dependencies"));
        assert!(json.contains("\"type\": \"ember-extension\""));
        assert!(json.contains("\"mainDependency\""));
    }

    #[test]
    fn test_multi_mode_lists_dependencies_first() {
        let manifest = emit(
            ManifestModule::same("widget.gjs"),
            &[ManifestModule::same("form/submit-button.gjs")],
            "https://example.test:8443/",
            &context(BundleMode::Multi),
        );
        let deps = manifest.dependencies.clone().unwrap();
        assert_eq!(deps[0].name, "ember-app-suite/components/form/submit-button");
        assert_eq!(
            deps[0].url,
            "https://example.test:8443/assets/extension-files/form/submit-button.gjs"
        );

        let json = manifest.to_json().unwrap();
        let deps_at = json.find("\"dependencies\"").unwrap();
        let main_at = json.find("\"mainDependency\"").unwrap();
        assert!(deps_at < main_at);
    }

    #[test]
    fn test_mirror_mode_names() {
        let ctx = context(BundleMode::Mirror);
        assert_eq!(module_name("widget.gjs", &ctx), "./Widget");
        assert_eq!(module_name("form/submit-button.gjs", &ctx), "./Form/submit-button");
    }

    #[test]
    fn test_bundle_file_name_only_changes_url() {
        let manifest = emit(
            ManifestModule {
                module_path: "widget.gjs",
                asset_path: "bundle.js",
            },
            &[],
            "http://localhost:4205",
            &context(BundleMode::Single),
        );
        assert_eq!(
            manifest.main_dependency.name,
            "ember-app-suite/components/widget"
        );
        assert!(manifest.main_dependency.url.ends_with("/bundle.js"));
    }
}
