//! Binding identifier derivation.
//!
//! `form/submit-button.gjs` becomes `FormSubmitButton`. The transform drops
//! separators, so distinct paths can collide; collisions are detected over the
//! whole module set and fail the compile. Module identifiers are compared
//! ignoring ASCII case, so `a/b` (`AB`) and `ab` (`Ab`) collide as well.

use indexmap::IndexMap;

use crate::error::{BundleError, Result};

pub fn derive_identifier(relative_path: &str) -> String {
    let file_start = relative_path.rfind(['/', '\\']).map_or(0, |p| p + 1);
    let stem = match relative_path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &relative_path[..file_start + dot],
        _ => relative_path,
    };

    let mut ident: String = stem
        .split(['/', '\\', '-'])
        .filter(|segment| !segment.is_empty())
        .map(capitalize)
        .collect::<String>()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();

    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

pub fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Derives identifiers for `relative_paths` in order, failing on the first
/// duplicate. `reserved` maps names already bound in the artifact (hoisted
/// external imports) to a description of where they come from.
pub fn assign_identifiers<'a>(
    relative_paths: impl IntoIterator<Item = &'a str>,
    reserved: &IndexMap<String, String>,
) -> Result<Vec<String>> {
    // Keyed by the lowercased identifier.
    let mut owners: IndexMap<String, &str> = IndexMap::new();
    let mut identifiers = Vec::new();

    for path in relative_paths {
        let ident = derive_identifier(path);
        if let Some(origin) = reserved.get(&ident) {
            return Err(BundleError::naming_collision(&ident, origin, path));
        }
        let key = ident.to_ascii_lowercase();
        if let Some(first) = owners.get(&key) {
            return Err(BundleError::naming_collision(&ident, first, path));
        }
        owners.insert(key, path);
        identifiers.push(ident);
    }

    Ok(identifiers)
}
