//! Content fingerprints of the module root.
//!
//! Watch mode polls instead of subscribing to OS events: it takes a snapshot,
//! sleeps, takes another and reports every path whose hash changed, appeared
//! or disappeared.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: IndexMap<PathBuf, String>,
}

impl Snapshot {
    /// Hashes every regular file under `root`. Unreadable files are skipped.
    pub fn capture(root: &Path) -> Self {
        let mut files = IndexMap::new();
        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            match fs::read(entry.path()) {
                Ok(bytes) => {
                    files.insert(entry.path().to_path_buf(), compute_hash(&bytes));
                }
                Err(e) => log::debug!("Skipping {}: {}", entry.path().display(), e),
            }
        }
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths modified or added since `previous`, then paths removed.
    pub fn changed_paths(&self, previous: &Snapshot) -> Vec<PathBuf> {
        let mut changed: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|(path, hash)| previous.files.get(*path) != Some(*hash))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            previous
                .files
                .keys()
                .filter(|path| !self.files.contains_key(*path))
                .cloned(),
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_is_sha256_hex() {
        assert_eq!(
            compute_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_changed_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.gjs"), "a").unwrap();
        fs::write(root.join("b.gjs"), "b").unwrap();
        let before = Snapshot::capture(root);
        assert_eq!(before.len(), 2);

        fs::write(root.join("a.gjs"), "changed").unwrap();
        fs::remove_file(root.join("b.gjs")).unwrap();
        fs::write(root.join("c.gjs"), "c").unwrap();
        let after = Snapshot::capture(root);

        assert_eq!(
            after.changed_paths(&before),
            vec![root.join("a.gjs"), root.join("c.gjs"), root.join("b.gjs")]
        );
        assert!(after.changed_paths(&after).is_empty());
    }
}
