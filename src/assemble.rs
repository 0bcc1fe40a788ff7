//! Bundle content assembly.
//!
//! Merges every module of a dependency graph into one artifact:
//!
//! ```text
//! import Component from '@glimmer/component';   // hoisted externals
//!
//! const Button = class extends Component { … };  // one per module
//! const Widget = <template><Button /></template>;
//!
//! export default Widget;
//! ```
//!
//! Local imports are dropped and their bindings rewritten to the derived
//! identifiers; a named import `fmt` from `utils` becomes `Utils.fmt`.
//! External imports are hoisted once to the top.
//!
//! Every module shares one top-level scope in the artifact, so names declared
//! at the top level of two modules, or matching a module identifier or an
//! external import binding, fail the compile as naming collisions.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{BundleError, Result};
use crate::graph::DependencyGraph;
use crate::naming::assign_identifiers;
use crate::scan::{find_specifier_matches, scan_imports, ImportStatement};
use crate::spans::{
    code_bytes, is_code_at, is_ident_byte, lex, matching_brace, protected_spans, span_at,
    statement_end, ProtectedSpan, Segment, SpanKind,
};

lazy_static! {
    static ref EXPORT_DEFAULT_RE: Regex = Regex::new(r"(?m)^[ \t]*export\s+default\b\s*").unwrap();
    static ref FUNCTION_HEAD_RE: Regex =
        Regex::new(r"^(async\s+)?function\s*(\*)?\s*([A-Za-z_$][\w$]*)?\s*\(").unwrap();
    static ref CLASS_NAME_RE: Regex = Regex::new(r"^class\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref EXPORT_DECL_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(export\s+)((?:async\s+)?function\s*\*?|class|const|let|var)\s*([A-Za-z_$][\w$]*)"
    )
    .unwrap();
    static ref EXPORT_LIST_RE: Regex =
        Regex::new(r"(?m)^[ \t]*export\s*\{([^}]*)\}[ \t]*;?[ \t]*(?:\r?\n)?").unwrap();
    static ref DECLARATION_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:async\s+)?(function\b\s*\*?\s*|(?:class|const|let|var)\s+)([A-Za-z_$][\w$]*)"
    )
    .unwrap();
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][\w$]*$").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARTIFACT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub identifier: String,
    pub relative_path: String,
    /// Top-level statements that preceded the exported unit.
    pub prelude: String,
    /// Equal to `identifier` when the prelude already binds the exported value.
    pub body: String,
    /// Source that followed the exported unit.
    pub epilogue: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleArtifact {
    pub externals: Vec<String>,
    pub declarations: Vec<Declaration>,
    pub export_identifier: String,
}

impl BundleArtifact {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.externals.is_empty() {
            out.push_str(&self.externals.join("\n"));
            out.push_str("\n\n");
        }
        for decl in &self.declarations {
            if !decl.prelude.is_empty() {
                out.push_str(&decl.prelude);
                out.push('\n');
            }
            if decl.body != decl.identifier {
                out.push_str(&format!("const {} = {};\n", decl.identifier, decl.body));
            }
            if !decl.epilogue.is_empty() {
                out.push_str(&decl.epilogue);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&format!("export default {};\n", self.export_identifier));
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSEMBLY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

/// Applies non-overlapping replacements; on overlap the earliest, then longest, wins.
fn apply_replacements(text: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for r in replacements {
        if r.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..r.start]);
        out.push_str(&r.text);
        cursor = r.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn normalize_import(statement: &str) -> String {
    let normalized = WHITESPACE_RE
        .replace_all(statement.trim(), " ")
        .replace('"', "'");
    if normalized.ends_with(';') {
        normalized
    } else {
        format!("{};", normalized)
    }
}

fn with_semicolon(statement: &str) -> String {
    let statement = statement.trim();
    if statement.ends_with(';') {
        statement.to_string()
    } else {
        format!("{};", statement)
    }
}

fn remove_imports(source: &str, imports: &[ImportStatement]) -> String {
    apply_replacements(
        source,
        imports
            .iter()
            .map(|stmt| Replacement {
                start: stmt.start,
                end: stmt.end,
                text: String::new(),
            })
            .collect(),
    )
}

pub fn assemble(graph: &DependencyGraph, namespace: &str) -> Result<BundleArtifact> {
    let scanned: Vec<Vec<ImportStatement>> = graph
        .modules
        .iter()
        .map(|m| scan_imports(&m.record.source, namespace))
        .collect();

    // 1. Hoist externals
    let mut externals: IndexMap<String, String> = IndexMap::new();
    let mut reserved: IndexMap<String, String> = IndexMap::new();
    for (module, imports) in graph.modules.iter().zip(&scanned) {
        for stmt in imports.iter().filter(|s| !s.local) {
            let text = stmt.text(&module.record.source);
            externals
                .entry(normalize_import(text))
                .or_insert_with(|| with_semicolon(text));
            for local in stmt.bindings.locals() {
                reserved
                    .entry(local.to_string())
                    .or_insert_with(|| format!("import from '{}'", stmt.specifier.specifier));
            }
        }
    }

    let parts: Vec<ModuleParts> = graph
        .modules
        .iter()
        .zip(&scanned)
        .map(|(m, imports)| split_exported_unit(&remove_imports(&m.record.source, imports)))
        .collect();

    // Top-level declarations share the artifact scope
    let mut declared: IndexMap<String, &str> = IndexMap::new();
    for (module, part) in graph.modules.iter().zip(&parts) {
        let path = module.record.relative_path.as_str();
        for name in part.declared_names() {
            if let Some(origin) = reserved.get(&name) {
                return Err(BundleError::naming_collision(&name, origin, path));
            }
            match declared.get(&name).copied() {
                Some(owner) if owner != path => {
                    return Err(BundleError::duplicate_declaration(&name, owner, path));
                }
                Some(_) => {}
                None => {
                    declared.insert(name, path);
                }
            }
        }
    }
    for (name, path) in declared {
        reserved.insert(name, format!("declaration in {}", path));
    }

    let identifiers = assign_identifiers(graph.relative_paths(), &reserved)?;

    let mut by_specifier: HashMap<&str, &str> = HashMap::new();
    for (module, ident) in graph.modules.iter().zip(&identifiers) {
        for spec in &module.specifiers {
            by_specifier.insert(spec.as_str(), ident.as_str());
        }
    }

    // 2-4. Transform and declare each module
    let mut declarations = Vec::with_capacity(graph.modules.len());
    for (index, ((module, imports), parts)) in
        graph.modules.iter().zip(&scanned).zip(&parts).enumerate()
    {
        let identifier = &identifiers[index];
        let mut bindings: Vec<(&str, String)> = Vec::new();
        for stmt in imports.iter().filter(|s| s.local) {
            let Some(&target) = by_specifier.get(stmt.specifier.specifier.as_str()) else {
                continue;
            };
            for local in stmt.bindings.default.iter().chain(&stmt.bindings.namespace) {
                bindings.push((local.as_str(), target.to_string()));
            }
            for named in &stmt.bindings.named {
                let member = if named.imported == "default" {
                    target.to_string()
                } else {
                    format!("{}.{}", target, named.imported)
                };
                bindings.push((named.local.as_str(), member));
            }
        }
        if let Some(name) = &parts.exported_name {
            bindings.push((name.as_str(), identifier.clone()));
        }

        let rewrite = |part: &str| -> String {
            let spans = protected_spans(part);
            let mut replacements = Vec::new();
            for (other, other_ident) in graph.modules.iter().zip(&identifiers) {
                if std::ptr::eq(other, module) {
                    continue;
                }
                for spec in &other.specifiers {
                    replacements.extend(find_specifier_matches(part, &spans, spec).into_iter().map(
                        |m| Replacement {
                            start: m.start,
                            end: m.end,
                            text: other_ident.clone(),
                        },
                    ));
                }
            }
            for (local, target) in &bindings {
                if *local != target.as_str() {
                    replacements.extend(binding_replacements(part, &spans, local, target));
                }
            }
            apply_replacements(part, replacements)
        };

        log::debug!(
            "Declaring {} as {}",
            module.record.relative_path,
            identifier
        );
        declarations.push(Declaration {
            identifier: identifier.clone(),
            relative_path: module.record.relative_path.clone(),
            prelude: rewrite(parts.preamble.trim()),
            body: rewrite(&parts.body),
            epilogue: rewrite(parts.epilogue.trim()),
        });
    }

    // 5. Export the entry
    Ok(BundleArtifact {
        externals: externals.into_values().collect(),
        declarations,
        export_identifier: identifiers[graph.entry].clone(),
    })
}

/// Identifier-bounded occurrences of `local` outside strings, verbatim text,
/// annotations and patterns. Member accesses (`.local`) and template arguments (`@local`)
/// are left alone.
fn binding_replacements(
    text: &str,
    spans: &[ProtectedSpan],
    local: &str,
    target: &str,
) -> Vec<Replacement> {
    let bytes = text.as_bytes();
    text.match_indices(local)
        .filter(|(start, _)| {
            let end = start + local.len();
            let before = start.checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(end).copied();
            !before.is_some_and(|b| is_ident_byte(b) || b == b'.' || b == b'@')
                && !after.is_some_and(is_ident_byte)
        })
        .filter(|(start, _)| {
            !matches!(
                span_at(spans, *start).map(|s| s.kind),
                Some(SpanKind::QuotedText)
                    | Some(SpanKind::VerbatimText)
                    | Some(SpanKind::Annotation)
                    | Some(SpanKind::Pattern)
            )
        })
        .map(|(start, _)| Replacement {
            start,
            end: start + local.len(),
            text: target.to_string(),
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPORTED UNIT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleParts {
    pub preamble: String,
    pub body: String,
    pub epilogue: String,
    /// Name the module gave its exported value, rebound to the module identifier.
    pub exported_name: Option<String>,
}

impl ModuleParts {
    /// Names the preamble and epilogue declare at the top level, except the
    /// exported name.
    pub fn declared_names(&self) -> Vec<String> {
        top_level_declarations(&self.preamble)
            .into_iter()
            .chain(top_level_declarations(&self.epilogue))
            .filter(|name| self.exported_name.as_deref() != Some(name.as_str()))
            .collect()
    }
}

/// Function, class and variable declarations at brace depth zero, outside
/// comments and protected spans. Destructuring patterns are not reported.
fn top_level_declarations(text: &str) -> Vec<String> {
    let segments = lex(text);
    let braces: Vec<(usize, i32)> = code_bytes(text)
        .into_iter()
        .filter_map(|(i, b)| match b {
            b'{' => Some((i, 1)),
            b'}' => Some((i, -1)),
            _ => None,
        })
        .collect();
    let depth_at = |offset: usize| -> i32 {
        braces
            .iter()
            .take_while(|(i, _)| *i < offset)
            .map(|(_, d)| d)
            .sum()
    };

    DECLARATION_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let keyword = cap.get(1)?;
            let name = cap.get(2)?;
            (is_code_at(&segments, keyword.start()) && depth_at(keyword.start()) == 0)
                .then(|| name.as_str().to_string())
        })
        .collect()
}

pub fn split_exported_unit(text: &str) -> ModuleParts {
    let segments = lex(text);
    let spans = protected_spans(text);

    let marker = EXPORT_DEFAULT_RE.find_iter(text).find(|m| {
        let keyword = m.start() + (m.as_str().len() - m.as_str().trim_start().len());
        is_code_at(&segments, keyword)
    });
    if let Some(m) = marker {
        let value = exported_value(text, m.end());
        let preamble = &text[..m.start()];
        let exported_name = value.name.or_else(|| {
            let declared = IDENTIFIER_RE.is_match(&value.body)
                && top_level_declarations(preamble)
                    .iter()
                    .chain(&top_level_declarations(&text[value.end..]))
                    .any(|name| *name == value.body);
            declared.then(|| value.body.clone())
        });
        return ModuleParts {
            preamble: preamble.to_string(),
            body: value.body,
            epilogue: trim_leading_semicolon(&text[value.end..]),
            exported_name,
        };
    }

    // A top-level template block is the implicit default export.
    let template = spans.iter().find(|s| {
        s.kind == SpanKind::Markup
            && text[s.start..].starts_with("<template")
            && text[..s.start]
                .rsplit('\n')
                .next()
                .is_some_and(|line| line.trim().is_empty())
    });
    if let Some(span) = template {
        return ModuleParts {
            preamble: text[..span.start].to_string(),
            body: text[span.start..span.end].to_string(),
            epilogue: trim_leading_semicolon(&text[span.end..]),
            exported_name: None,
        };
    }

    named_exports(text, &segments)
}

fn trim_leading_semicolon(text: &str) -> String {
    let text = text.trim_start();
    text.strip_prefix(';').unwrap_or(text).to_string()
}

struct ExportedValue {
    /// Anonymous value expression.
    body: String,
    end: usize,
    /// Name of a default-exported function or class.
    name: Option<String>,
}

fn exported_value(text: &str, start: usize) -> ExportedValue {
    let rest = &text[start..];

    if let Some(cap) = FUNCTION_HEAD_RE.captures(rest) {
        let head = format!(
            "{}function{} (",
            cap.get(1).map_or("", |_| "async "),
            cap.get(2).map_or("", |m| m.as_str())
        );
        let name = cap.get(3).map(|m| m.as_str().to_string());
        let head_end = start + cap[0].len();
        let params_end = code_bytes(text)
            .into_iter()
            .filter(|(i, _)| *i >= head_end - 1)
            .scan(0i32, |depth, (i, b)| {
                match b {
                    b'(' => *depth += 1,
                    b')' => *depth -= 1,
                    _ => {}
                }
                Some((i, *depth))
            })
            .find(|(_, depth)| *depth == 0)
            .map(|(i, _)| i + 1);
        if let Some(end) = params_end.and_then(|p| braced_end(text, p)) {
            return ExportedValue {
                body: format!("{}{}", head, &text[head_end..end]),
                end,
                name,
            };
        }
        return ExportedValue {
            body: format!("{}{}", head, text[head_end..].trim_end()),
            end: text.len(),
            name,
        };
    }

    if rest.starts_with("class") && rest[5..].starts_with(|c: char| c.is_whitespace() || c == '{') {
        // Drop the class name, keep any heritage clause.
        let (head_end, name) = match CLASS_NAME_RE.captures(rest) {
            Some(cap) if &cap[1] != "extends" => (start + cap[0].len(), Some(cap[1].to_string())),
            _ => (start + "class".len(), None),
        };
        if let Some(end) = braced_end(text, head_end) {
            return ExportedValue {
                body: format!("class{}", &text[head_end..end]),
                end,
                name,
            };
        }
        return ExportedValue {
            body: format!("class{}", text[head_end..].trim_end()),
            end: text.len(),
            name,
        };
    }

    let end = statement_end(text, start).unwrap_or(text.len());
    ExportedValue {
        body: text[start..end].trim().to_string(),
        end,
        name: None,
    }
}

/// End of the first brace block at or after `from`.
fn braced_end(text: &str, from: usize) -> Option<usize> {
    let open = code_bytes(text)
        .into_iter()
        .find(|(i, b)| *i >= from && *b == b'{')
        .map(|(i, _)| i)?;
    matching_brace(text, open)
}

/// Module without a default export: its value is an object of its named exports.
fn named_exports(text: &str, segments: &[Segment]) -> ModuleParts {
    let mut replacements = Vec::new();
    let mut fields = Vec::new();

    for cap in EXPORT_DECL_RE.captures_iter(text) {
        let Some(keyword) = cap.get(1) else {
            continue;
        };
        if !is_code_at(segments, keyword.start()) {
            continue;
        }
        replacements.push(Replacement {
            start: keyword.start(),
            end: keyword.end(),
            text: String::new(),
        });
        fields.push(cap[3].to_string());
    }

    for cap in EXPORT_LIST_RE.captures_iter(text) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        let re_export = text[whole.end()..].trim_start().starts_with("from");
        let keyword = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
        if re_export || !is_code_at(segments, keyword) {
            continue;
        }
        replacements.push(Replacement {
            start: whole.start(),
            end: whole.end(),
            text: String::new(),
        });
        for item in cap[1].split(',').map(str::trim).filter(|i| !i.is_empty()) {
            match item.split_once(" as ") {
                Some((local, exported)) => {
                    fields.push(format!("{}: {}", exported.trim(), local.trim()))
                }
                None => fields.push(item.to_string()),
            }
        }
    }

    let body = if fields.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", fields.join(", "))
    };

    ModuleParts {
        preamble: apply_replacements(text, replacements),
        body,
        epilogue: String::new(),
        exported_name: None,
    }
}
