//! Module resolution.
//!
//! Maps a dependency specifier to a component file under the module root.
//! Probing order is `<root>/<path>.<ext>` then `<root>/<path>/index.<ext>`.

use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{BundleError, Result};

/// A component file that exists under the module root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleLocation {
    pub absolute_path: PathBuf,
    /// Relative to the module root, always `/`-separated.
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    namespace: String,
    extension: String,
}

impl Resolver {
    pub fn new(root: impl Into<PathBuf>, namespace: &str, extension: &str) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.trim_end_matches('/').to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path under the module root named by `specifier`, without extension.
    fn module_path<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        let path = match specifier.strip_prefix(self.namespace.as_str()) {
            Some(rest) if rest.starts_with('/') => rest,
            _ => specifier.strip_prefix("./").unwrap_or(specifier),
        };
        let path = path.trim_matches('/');
        let suffix = format!(".{}", self.extension);
        let path = path.strip_suffix(suffix.as_str()).unwrap_or(path);

        let escapes = Path::new(path)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return None;
        }
        Some(path)
    }

    pub fn resolve(&self, specifier: &str) -> Option<ModuleLocation> {
        let path = self.module_path(specifier)?;
        let candidates = [
            format!("{}.{}", path, self.extension),
            format!("{}/index.{}", path, self.extension),
        ];

        candidates.into_iter().find_map(|relative_path| {
            let absolute_path = self.root.join(&relative_path);
            absolute_path.is_file().then(|| ModuleLocation {
                absolute_path,
                relative_path,
            })
        })
    }

    pub fn load(&self, location: &ModuleLocation) -> Result<ModuleRecord> {
        let source = fs::read_to_string(&location.absolute_path)
            .map_err(|e| BundleError::io(&location.absolute_path, e))?;
        Ok(ModuleRecord {
            absolute_path: location.absolute_path.clone(),
            relative_path: location.relative_path.clone(),
            source,
        })
    }

    /// Specifier strings that name `relative_path`: with and without extension,
    /// and the bare directory for index files.
    pub fn canonical_specifiers(&self, relative_path: &str) -> Vec<String> {
        let suffix = format!(".{}", self.extension);
        let stem = relative_path.strip_suffix(suffix.as_str()).unwrap_or(relative_path);
        let mut specifiers = vec![
            format!("{}/{}", self.namespace, stem),
            format!("{}/{}", self.namespace, relative_path),
        ];
        if let Some(dir) = stem.strip_suffix("/index") {
            specifiers.push(format!("{}/{}", self.namespace, dir));
        }
        specifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "ember-app-suite/components";

    fn fixture() -> (tempfile::TempDir, Resolver) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("form/select")).unwrap();
        fs::write(root.join("widget.gjs"), "").unwrap();
        fs::write(root.join("form/submit-button.gjs"), "").unwrap();
        fs::write(root.join("form/select/index.gjs"), "").unwrap();
        let resolver = Resolver::new(root, NS, "gjs");
        (dir, resolver)
    }

    #[test]
    fn test_namespaced_specifier() {
        let (_dir, resolver) = fixture();
        let loc = resolver
            .resolve("ember-app-suite/components/form/submit-button")
            .unwrap();
        assert_eq!(loc.relative_path, "form/submit-button.gjs");
        assert!(loc.absolute_path.ends_with("form/submit-button.gjs"));
    }

    #[test]
    fn test_extension_and_root_relative_forms() {
        let (_dir, resolver) = fixture();
        assert_eq!(
            resolver
                .resolve("ember-app-suite/components/widget.gjs")
                .unwrap()
                .relative_path,
            "widget.gjs"
        );
        assert_eq!(resolver.resolve("./widget").unwrap().relative_path, "widget.gjs");
        assert_eq!(resolver.resolve("widget.gjs").unwrap().relative_path, "widget.gjs");
    }

    #[test]
    fn test_directory_index() {
        let (_dir, resolver) = fixture();
        let loc = resolver.resolve("ember-app-suite/components/form/select").unwrap();
        assert_eq!(loc.relative_path, "form/select/index.gjs");
    }

    #[test]
    fn test_not_found_and_escape() {
        let (_dir, resolver) = fixture();
        assert!(resolver.resolve("ember-app-suite/components/missing").is_none());
        assert!(resolver.resolve("./../widget").is_none());
        assert!(resolver.resolve("ember-app-suite/components/").is_none());
    }

    #[test]
    fn test_canonical_specifiers_for_index() {
        let resolver = Resolver::new("/tmp", NS, "gjs");
        assert_eq!(
            resolver.canonical_specifiers("form/select/index.gjs"),
            vec![
                "ember-app-suite/components/form/select/index".to_string(),
                "ember-app-suite/components/form/select/index.gjs".to_string(),
                "ember-app-suite/components/form/select".to_string(),
            ]
        );
    }
}
