//! Dependency graph walker.
//!
//! Depth-first over local imports in appearance order. A module is appended
//! after its dependencies, so the resulting order is also a valid declaration
//! order for acyclic graphs. Visited modules are keyed by absolute path and
//! never expanded twice, which also terminates cycles.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{BuildWarning, BundleError, Result};
use crate::resolve::{ModuleLocation, ModuleRecord, Resolver};
use crate::scan::scan_imports;

#[derive(Debug, Clone)]
pub struct GraphModule {
    pub record: ModuleRecord,
    /// Every specifier that resolved to this module, in first-seen order.
    pub specifiers: IndexSet<String>,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Dependencies before dependents; the entry is last.
    pub modules: Vec<GraphModule>,
    pub entry: usize,
    pub warnings: Vec<BuildWarning>,
}

impl DependencyGraph {
    pub fn entry_module(&self) -> &GraphModule {
        &self.modules[self.entry]
    }

    /// Every module except the entry, in traversal order.
    pub fn dependencies(&self) -> impl Iterator<Item = &GraphModule> {
        self.modules
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.entry)
            .map(|(_, m)| m)
    }

    pub fn relative_paths(&self) -> Vec<&str> {
        self.modules
            .iter()
            .map(|m| m.record.relative_path.as_str())
            .collect()
    }
}

struct Walker<'a> {
    resolver: &'a Resolver,
    visited: HashSet<PathBuf>,
    stack: Vec<PathBuf>,
    order: Vec<ModuleRecord>,
    aliases: IndexMap<PathBuf, IndexSet<String>>,
    warnings: Vec<BuildWarning>,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, location: &ModuleLocation, importer: Option<&str>) -> Result<()> {
        if !self.visited.insert(location.absolute_path.clone()) {
            if self.stack.contains(&location.absolute_path) {
                let importer = importer.unwrap_or_default().to_string();
                log::warn!(
                    "Cyclic dependency: {} -> {}",
                    importer,
                    location.relative_path
                );
                self.warnings.push(BuildWarning::CyclicDependency {
                    importer,
                    dependency: location.relative_path.clone(),
                });
            }
            return Ok(());
        }

        let record = self.resolver.load(location)?;
        log::debug!("Visiting {}", record.relative_path);
        self.stack.push(location.absolute_path.clone());

        for import in scan_imports(&record.source, self.resolver.namespace()) {
            if !import.local {
                continue;
            }
            let specifier = import.specifier.specifier;
            match self.resolver.resolve(&specifier) {
                Some(dependency) => {
                    self.aliases
                        .entry(dependency.absolute_path.clone())
                        .or_default()
                        .insert(specifier);
                    self.visit(&dependency, Some(&record.relative_path))?;
                }
                None => {
                    log::warn!(
                        "Module not found: {} (from {})",
                        specifier,
                        record.relative_path
                    );
                    self.warnings.push(BuildWarning::ModuleNotFound {
                        specifier,
                        importer: record.relative_path.clone(),
                    });
                }
            }
        }

        self.stack.pop();
        self.order.push(record);
        Ok(())
    }
}

pub fn walk(resolver: &Resolver, entry: &ModuleLocation) -> Result<DependencyGraph> {
    let mut walker = Walker {
        resolver,
        visited: HashSet::new(),
        stack: Vec::new(),
        order: Vec::new(),
        aliases: IndexMap::new(),
        warnings: Vec::new(),
    };
    walker.visit(entry, None)?;

    let Walker {
        order,
        mut aliases,
        warnings,
        ..
    } = walker;

    let modules: Vec<GraphModule> = order
        .into_iter()
        .map(|record| {
            let mut specifiers = aliases.shift_remove(&record.absolute_path).unwrap_or_default();
            specifiers.extend(resolver.canonical_specifiers(&record.relative_path));
            GraphModule { record, specifiers }
        })
        .collect();

    // Post-order puts the entry last.
    let entry_index = modules
        .iter()
        .rposition(|m| m.record.absolute_path == entry.absolute_path)
        .ok_or_else(|| BundleError::module_not_found(&entry.relative_path, resolver.root()))?;
    debug_assert_eq!(entry_index, modules.len() - 1);
    Ok(DependencyGraph {
        modules,
        entry: entry_index,
        warnings,
    })
}
