//! Asset writing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BundleError, Result};

/// Destination for compiled assets. Paths are relative to the output directory
/// and `/`-separated.
pub trait AssetWriter {
    fn write_asset(&mut self, relative_path: &str, contents: &str) -> Result<()>;
}

/// Writes into a directory on disk. Each file is written to a sibling temp
/// file first and renamed into place, so readers never observe a partial file.
#[derive(Debug, Clone)]
pub struct FsAssetWriter {
    out_dir: PathBuf,
}

impl FsAssetWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

impl AssetWriter for FsAssetWriter {
    fn write_asset(&mut self, relative_path: &str, contents: &str) -> Result<()> {
        let target = self.out_dir.join(relative_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BundleError::io(parent, e))?;
        }

        let mut temp_name = target.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp = target.with_file_name(temp_name);

        fs::write(&temp, contents).map_err(|e| BundleError::io(&temp, e))?;
        fs::rename(&temp, &target).map_err(|e| {
            fs::remove_file(&temp).ok();
            BundleError::io(&target, e)
        })?;
        log::info!("Generated {}", target.display());
        Ok(())
    }
}

/// Collects assets in memory, in write order.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetWriter {
    pub assets: Vec<(String, String)>,
}

impl AssetWriter for MemoryAssetWriter {
    fn write_asset(&mut self, relative_path: &str, contents: &str) -> Result<()> {
        self.assets
            .push((relative_path.to_string(), contents.to_string()));
        Ok(())
    }
}
