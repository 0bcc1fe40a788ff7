//! # Extension Bundler
//!
//! Compiles a tree of `.gjs` component files into a distributable extension:
//! starting from the declared entry point, every locally authored dependency is
//! found, inlined into one artifact with cross-file references rewritten to
//! local bindings, optionally shrunk, and described by a `manifest.json` that a
//! host application uses to load it at runtime.
//!
//! ## Pipeline
//!
//! ```text
//! resolve → walk (graph) → assemble → shrink? → emit manifest → write
//! ```
//!
//! Every stage before `write` is pure over the files it reads, so a compile
//! that fails writes nothing.
//!
//! ## Invariants
//!
//! 1. **One declaration per module**: each reachable module is declared exactly
//!    once, bound to the identifier derived from its relative path.
//! 2. **Distinct bindings**: two modules that derive the same identifier, or
//!    two modules declaring the same top-level name, fail the compile
//!    (`BUNDLE-NAMING-COLLISION`).
//! 3. **Protected spans**: template markup, backtick literals, decorators and
//!    regex literals are never rewritten and survive shrinking byte for byte.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod assemble;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod naming;
pub mod options;
pub mod package;
pub mod pipeline;
pub mod resolve;
pub mod scan;
pub mod shrink;
pub mod snapshot;
pub mod spans;
pub mod writer;

#[cfg(test)]
mod pipeline_tests;

pub use error::{BuildWarning, BundleError, Result};
pub use manifest::{Manifest, ManifestEntry};
pub use options::{BundleMode, BundlerOptions, ServerAddress};
pub use package::ProjectMetadata;
pub use pipeline::{compile, write_compilation, BundlePlugin, Compilation, OutputAsset};
pub use writer::{AssetWriter, FsAssetWriter, MemoryAssetWriter};

/// Compiles and writes the extension described by `options_json`, returning
/// the manifest as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_bundle_native(options_json: String, base_url: Option<String>) -> napi::Result<String> {
    let options = BundlerOptions::from_json(&options_json)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let metadata = ProjectMetadata::read(&options.package_json_path());
    let base_url = base_url.unwrap_or_else(|| options.initial_base_url());

    let compilation =
        compile(&options, &metadata, &base_url).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let mut writer = FsAssetWriter::new(options.output_dir_path());
    write_compilation(&mut writer, &compilation)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    compilation
        .manifest
        .to_json()
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
