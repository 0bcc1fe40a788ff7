//! Error and warning types for the bundler.
//!
//! Fatal conditions are `BundleError`s carrying a stable code; recoverable ones
//! are `BuildWarning`s that travel with the compilation result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_CONFIGURATION_MISSING: &str = "BUNDLE-CONFIG-MISSING";
pub const ERR_MODULE_NOT_FOUND: &str = "BUNDLE-MODULE-NOT-FOUND";
pub const ERR_NAMING_COLLISION: &str = "BUNDLE-NAMING-COLLISION";
pub const ERR_PROTECTION_VIOLATION: &str = "BUNDLE-PROTECTION-VIOLATION";
pub const ERR_IO: &str = "BUNDLE-IO";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_CONFIGURATION_MISSING => "No output is written without a declared entry point.",
        ERR_MODULE_NOT_FOUND => "The entry module always exists in the emitted artifact.",
        ERR_NAMING_COLLISION => "Every module in a bundle is bound to a distinct identifier.",
        ERR_PROTECTION_VIOLATION => {
            "Markup, verbatim text and annotations survive shrinking byte for byte."
        }
        ERR_IO => "A failed compile leaves the previous output in place.",
        _ => "Unknown error.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUNDLE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleError {
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub paths: Vec<String>,
    pub hints: Vec<String>,
}

pub type Result<T> = std::result::Result<T, BundleError>;

impl BundleError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self::with_details(code, message, vec![], vec![])
    }

    pub fn with_details(
        code: &str,
        message: impl Into<String>,
        paths: Vec<String>,
        hints: Vec<String>,
    ) -> Self {
        BundleError {
            code: code.to_string(),
            message: message.into(),
            guarantee: get_guarantee(code).to_string(),
            paths,
            hints,
        }
    }

    pub fn configuration_missing(package_json: &Path) -> Self {
        Self::with_details(
            ERR_CONFIGURATION_MISSING,
            "No entry point declared",
            vec![package_json.to_string_lossy().to_string()],
            vec![
                "Set \"peek-extensions\": { \"entry-point\": \"...\" } in package.json".to_string(),
                "or pass an explicit entry point in the bundler options".to_string(),
            ],
        )
    }

    pub fn module_not_found(specifier: &str, modules_root: &Path) -> Self {
        Self::with_details(
            ERR_MODULE_NOT_FOUND,
            format!("Module not found: {}", specifier),
            vec![modules_root.to_string_lossy().to_string()],
            vec![],
        )
    }

    pub fn naming_collision(identifier: &str, first: &str, second: &str) -> Self {
        Self::with_details(
            ERR_NAMING_COLLISION,
            format!(
                "`{}` and `{}` both derive the binding `{}`",
                first, second, identifier
            ),
            vec![first.to_string(), second.to_string()],
            vec!["Rename one of the files so their derived names differ".to_string()],
        )
    }

    pub fn duplicate_declaration(name: &str, first: &str, second: &str) -> Self {
        Self::with_details(
            ERR_NAMING_COLLISION,
            format!(
                "`{}` is declared at the top level of both `{}` and `{}`",
                name, first, second
            ),
            vec![first.to_string(), second.to_string()],
            vec!["Rename one of the declarations; bundled modules share one scope".to_string()],
        )
    }

    pub fn protection_violation(message: impl Into<String>) -> Self {
        Self::new(ERR_PROTECTION_VIOLATION, message)
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::with_details(
            ERR_IO,
            format!("{}: {}", path.display(), err),
            vec![path.to_string_lossy().to_string()],
            vec![],
        )
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        for hint in &self.hints {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for BundleError {}

// ═══════════════════════════════════════════════════════════════════════════════
// WARNINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Recoverable conditions found while compiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BuildWarning {
    /// A local specifier did not resolve; the edge was skipped.
    #[serde(rename_all = "camelCase")]
    ModuleNotFound { specifier: String, importer: String },
    /// `importer` refers back to `dependency`, which is still being expanded.
    /// Its declaration follows the importer's in the artifact.
    #[serde(rename_all = "camelCase")]
    CyclicDependency { importer: String, dependency: String },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::ModuleNotFound {
                specifier,
                importer,
            } => write!(f, "Module not found: {} (from {})", specifier, importer),
            BuildWarning::CyclicDependency {
                importer,
                dependency,
            } => write!(
                f,
                "Cyclic dependency: {} imports {}, which is declared later",
                importer, dependency
            ),
        }
    }
}
