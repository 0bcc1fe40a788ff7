//! Compile pipeline and host lifecycle.
//!
//! `compile` computes every output in memory; `write_compilation` then hands
//! them to an `AssetWriter`. A compile that fails therefore writes nothing.

use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::assemble::assemble;
use crate::discovery::find_component_files;
use crate::error::{BuildWarning, BundleError, Result};
use crate::graph::{walk, DependencyGraph};
use crate::manifest::{emit, Manifest, ManifestContext, ManifestModule, MANIFEST_FILE_NAME};
use crate::options::{BundleMode, BundlerOptions, ServerAddress};
use crate::package::ProjectMetadata;
use crate::resolve::{ModuleLocation, Resolver};
use crate::shrink::shrink;
use crate::writer::AssetWriter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAsset {
    /// Relative to the output directory.
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compilation {
    pub manifest: Manifest,
    pub assets: Vec<OutputAsset>,
    pub warnings: Vec<BuildWarning>,
    /// Relative paths of every module that went into the output.
    pub modules: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE
// ═══════════════════════════════════════════════════════════════════════════════

pub fn compile(
    options: &BundlerOptions,
    metadata: &ProjectMetadata,
    base_url: &str,
) -> Result<Compilation> {
    let entry = options
        .entry_point
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .or_else(|| metadata.entry_point())
        .ok_or_else(|| BundleError::configuration_missing(&options.package_json_path()))?;

    let namespace = options.resolve_namespace(metadata.name.as_deref());
    let modules_root = options.modules_root_path();
    let resolver = Resolver::new(&modules_root, &namespace, &options.extension);
    let entry = resolver
        .resolve(entry)
        .ok_or_else(|| BundleError::module_not_found(entry, &modules_root))?;

    let context = ManifestContext {
        namespace: &namespace,
        public_url: &options.public_url,
        version: metadata.version(),
        extension: resolver.extension(),
        mode: options.mode,
    };

    log::debug!(
        "Compiling {} ({} mode, namespace {})",
        entry.relative_path,
        options.mode,
        namespace
    );
    match options.mode {
        BundleMode::Single => compile_single(options, &resolver, &entry, base_url, &context),
        BundleMode::Multi => compile_multi(&resolver, &entry, base_url, &context),
        BundleMode::Mirror => compile_mirror(&resolver, &entry, base_url, &context),
    }
}

fn compile_single(
    options: &BundlerOptions,
    resolver: &Resolver,
    entry: &ModuleLocation,
    base_url: &str,
    context: &ManifestContext,
) -> Result<Compilation> {
    let graph = walk(resolver, entry)?;
    let artifact = assemble(&graph, resolver.namespace())?;
    let mut contents = artifact.render();
    if options.shrink {
        contents = shrink(&contents)?;
    }

    let asset_path = options
        .bundle_file_name
        .clone()
        .unwrap_or_else(|| entry.relative_path.clone());
    let manifest = emit(
        ManifestModule {
            module_path: &entry.relative_path,
            asset_path: &asset_path,
        },
        &[],
        base_url,
        context,
    );

    Ok(Compilation {
        manifest,
        assets: vec![OutputAsset {
            path: asset_path,
            contents,
        }],
        modules: owned_paths(&graph),
        warnings: graph.warnings,
    })
}

fn compile_multi(
    resolver: &Resolver,
    entry: &ModuleLocation,
    base_url: &str,
    context: &ManifestContext,
) -> Result<Compilation> {
    let graph = walk(resolver, entry)?;
    let dependencies: Vec<ManifestModule> = graph
        .dependencies()
        .map(|m| ManifestModule::same(&m.record.relative_path))
        .collect();
    let manifest = emit(
        ManifestModule::same(&entry.relative_path),
        &dependencies,
        base_url,
        context,
    );

    let assets = graph
        .modules
        .iter()
        .map(|m| OutputAsset {
            path: m.record.relative_path.clone(),
            contents: m.record.source.clone(),
        })
        .collect();

    Ok(Compilation {
        manifest,
        assets,
        modules: owned_paths(&graph),
        warnings: graph.warnings,
    })
}

fn compile_mirror(
    resolver: &Resolver,
    entry: &ModuleLocation,
    base_url: &str,
    context: &ManifestContext,
) -> Result<Compilation> {
    let files = find_component_files(resolver.root(), resolver.extension());
    if !files.iter().any(|f| f.relative_path == entry.relative_path) {
        return Err(BundleError::module_not_found(
            &entry.relative_path,
            resolver.root(),
        ));
    }

    let records = files
        .iter()
        .map(|f| resolver.load(f))
        .collect::<Result<Vec<_>>>()?;
    let dependencies: Vec<ManifestModule> = records
        .iter()
        .filter(|r| r.relative_path != entry.relative_path)
        .map(|r| ManifestModule::same(&r.relative_path))
        .collect();
    let manifest = emit(
        ManifestModule::same(&entry.relative_path),
        &dependencies,
        base_url,
        context,
    );

    Ok(Compilation {
        manifest,
        modules: records.iter().map(|r| r.relative_path.clone()).collect(),
        assets: records
            .into_iter()
            .map(|r| OutputAsset {
                path: r.relative_path,
                contents: r.source,
            })
            .collect(),
        warnings: Vec::new(),
    })
}

fn owned_paths(graph: &DependencyGraph) -> Vec<String> {
    graph
        .relative_paths()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Writes every asset, then the manifest, so a host that polls the manifest
/// never sees it point at assets that are not there yet.
pub fn write_compilation(writer: &mut dyn AssetWriter, compilation: &Compilation) -> Result<()> {
    for asset in &compilation.assets {
        writer.write_asset(&asset.path, &asset.contents)?;
    }
    let manifest = compilation.manifest.to_json().map_err(|e| {
        BundleError::io(
            Path::new(MANIFEST_FILE_NAME),
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    writer.write_asset(MANIFEST_FILE_NAME, &manifest)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOST LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Recompiles and rewrites the output on every host event. Methods take
/// `&mut self`; a host that shares one plugin across threads must serialize
/// calls.
pub struct BundlePlugin<W: AssetWriter> {
    options: BundlerOptions,
    writer: W,
    base_url: String,
    last: Option<Compilation>,
}

impl<W: AssetWriter> BundlePlugin<W> {
    pub fn new(options: BundlerOptions, writer: W) -> Self {
        let base_url = options.initial_base_url();
        Self {
            options,
            writer,
            base_url,
            last: None,
        }
    }

    pub fn options(&self) -> &BundlerOptions {
        &self.options
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn last_compilation(&self) -> Option<&Compilation> {
        self.last.as_ref()
    }

    pub fn build_start(&mut self) -> Result<&Compilation> {
        self.rebuild()
    }

    pub fn server_listening(&mut self, address: &ServerAddress) -> Result<&Compilation> {
        self.base_url = address.base_url(self.options.default_port);
        log::info!("Serving extension assets from {}", self.base_url);
        self.rebuild()
    }

    /// Recompiles when `path` lies under the module root; other paths are ignored.
    pub fn file_changed(&mut self, path: &Path) -> Result<Option<&Compilation>> {
        if !self.watches(path) {
            log::debug!("Ignoring change outside module root: {}", path.display());
            return Ok(None);
        }
        log::info!("Changed: {}", path.display());
        self.rebuild().map(Some)
    }

    fn watches(&self, path: &Path) -> bool {
        let root = self.options.modules_root_path();
        if path.starts_with(&root) {
            return true;
        }
        // Deleted files cannot be canonicalized; their parent usually can.
        let parent = path.parent().and_then(|p| p.canonicalize().ok());
        match (root.canonicalize(), parent) {
            (Ok(root), Some(parent)) => parent.starts_with(root),
            _ => false,
        }
    }

    fn rebuild(&mut self) -> Result<&Compilation> {
        let started = Instant::now();
        let metadata = ProjectMetadata::read(&self.options.package_json_path());
        let compilation = compile(&self.options, &metadata, &self.base_url)?;
        write_compilation(&mut self.writer, &compilation)?;
        log::info!(
            "Compiled {} modules in {:?} ({} warnings)",
            compilation.modules.len(),
            started.elapsed(),
            compilation.warnings.len()
        );
        Ok(&*self.last.insert(compilation))
    }
}
