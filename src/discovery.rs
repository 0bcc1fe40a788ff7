//! Component discovery.
//!
//! Recursively scans the module root for component files. Used by mirror mode,
//! which ships every component whether or not the entry reaches it.

use std::path::Path;
use walkdir::WalkDir;

use crate::resolve::ModuleLocation;

/// Every `*.<extension>` file under `root`, sorted by relative path.
/// A missing root yields no files.
pub fn find_component_files(root: &Path, extension: &str) -> Vec<ModuleLocation> {
    let extension = extension.trim_start_matches('.');
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != extension) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(ModuleLocation {
            absolute_path: path.to_path_buf(),
            relative_path,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    files
}
