//! Import scanning.
//!
//! Finds top-level `import` statements line by line and reports them as typed
//! matches with byte offsets. Lines that begin inside a markup or verbatim-text
//! span are never treated as imports, so `import` written inside a template or
//! a backtick literal is ignored. Dynamic `import(...)` and `import.meta` are
//! not statements and are skipped.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::spans::{is_ident_byte, protected_spans, span_at, ProtectedSpan, SpanKind};

lazy_static! {
    /// `import <clause> from '<specifier>'`
    static ref IMPORT_FROM_RE: Regex = Regex::new(
        r#"^import\b\s*([^;'"`]*?)\s*\bfrom\s*(['"])([^'"\n]+)['"][ \t]*;?"#
    )
    .unwrap();

    /// `import '<specifier>'`
    static ref IMPORT_BARE_RE: Regex =
        Regex::new(r#"^import\s*(['"])([^'"\n]+)['"][ \t]*;?"#).unwrap();

    static ref NAMED_BINDING_RE: Regex =
        Regex::new(r"^([A-Za-z_$][\w$]*)(?:\s+as\s+([A-Za-z_$][\w$]*))?$").unwrap();
}

/// A specifier occurrence inside some text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecifierMatch {
    pub start: usize,
    pub end: usize,
    pub specifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedBinding {
    pub imported: String,
    pub local: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBindings {
    pub default: Option<String>,
    pub namespace: Option<String>,
    pub named: Vec<NamedBinding>,
}

impl ImportBindings {
    /// Every local name the statement introduces.
    pub fn locals(&self) -> Vec<&str> {
        self.default
            .iter()
            .chain(self.namespace.iter())
            .map(String::as_str)
            .chain(self.named.iter().map(|n| n.local.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatement {
    /// Offset of the `import` keyword.
    pub start: usize,
    /// Offset past the statement, including the rest of its last line.
    pub end: usize,
    pub specifier: SpecifierMatch,
    pub bindings: ImportBindings,
    pub local: bool,
}

impl ImportStatement {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source[self.start..self.end].trim()
    }
}

/// True when `specifier` names a module of this project.
pub fn is_local_specifier(specifier: &str, namespace: &str) -> bool {
    specifier.starts_with("./")
        || specifier
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn scan_imports(source: &str, namespace: &str) -> Vec<ImportStatement> {
    let spans = protected_spans(source);
    let mut imports = Vec::new();
    let mut offset = 0;

    while offset < source.len() {
        let line_end = source[offset..]
            .find('\n')
            .map_or(source.len(), |p| offset + p + 1);
        let indent = source[offset..line_end].len() - source[offset..line_end].trim_start().len();
        let start = offset + indent;

        let statement = if starts_statement(source, start, &spans) {
            parse_import(source, start, namespace)
        } else {
            None
        };

        match statement {
            Some(stmt) => {
                offset = stmt.end;
                imports.push(stmt);
            }
            None => offset = line_end,
        }
    }

    imports
}

fn starts_statement(source: &str, start: usize, spans: &[ProtectedSpan]) -> bool {
    let rest = &source[start..];
    if !rest.starts_with("import") {
        return false;
    }
    match rest.as_bytes().get("import".len()) {
        Some(b) if is_ident_byte(*b) || *b == b'(' || *b == b'.' => return false,
        _ => {}
    }
    !matches!(
        span_at(spans, start).map(|s| s.kind),
        Some(SpanKind::Markup) | Some(SpanKind::VerbatimText) | Some(SpanKind::QuotedText)
    )
}

fn parse_import(source: &str, start: usize, namespace: &str) -> Option<ImportStatement> {
    let rest = &source[start..];

    let (clause, spec_start, spec_end, matched_len) = if let Some(cap) = IMPORT_FROM_RE.captures(rest)
    {
        let spec = cap.get(3)?;
        (cap[1].to_string(), spec.start(), spec.end(), cap[0].len())
    } else if let Some(cap) = IMPORT_BARE_RE.captures(rest) {
        let spec = cap.get(2)?;
        (String::new(), spec.start(), spec.end(), cap[0].len())
    } else {
        return None;
    };

    // Swallow trailing whitespace up to and including the newline.
    let after = start + matched_len;
    let tail = &source[after..];
    let end = match tail.find('\n') {
        Some(p) if tail[..p].trim().is_empty() => after + p + 1,
        None if tail.trim().is_empty() => source.len(),
        _ => after,
    };

    let specifier = rest[spec_start..spec_end].to_string();
    Some(ImportStatement {
        start,
        end,
        local: is_local_specifier(&specifier, namespace),
        specifier: SpecifierMatch {
            start: start + spec_start,
            end: start + spec_end,
            specifier,
        },
        bindings: parse_clause(&clause),
    })
}

fn parse_clause(clause: &str) -> ImportBindings {
    let mut bindings = ImportBindings::default();
    let clause = clause.trim();
    if clause.is_empty() {
        return bindings;
    }

    let (head, braced) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => (&clause[..open], Some(&clause[open + 1..close])),
        _ => (clause, None),
    };

    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(ns) = part.strip_prefix('*') {
            let ns = ns.trim().trim_start_matches("as").trim();
            if !ns.is_empty() {
                bindings.namespace = Some(ns.to_string());
            }
        } else if part != "type" {
            bindings.default = Some(part.to_string());
        }
    }

    if let Some(inner) = braced {
        for item in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(cap) = NAMED_BINDING_RE.captures(item) {
                let imported = cap[1].to_string();
                let local = cap.get(2).map_or(imported.clone(), |m| m.as_str().to_string());
                bindings.named.push(NamedBinding { imported, local });
            }
        }
    }

    bindings
}

fn is_specifier_byte(b: u8) -> bool {
    is_ident_byte(b) || matches!(b, b'/' | b'.' | b'-' | b'@')
}

/// Exact occurrences of `specifier` in `text` that are not part of a longer
/// specifier and do not start inside a span that shields references.
pub fn find_specifier_matches(
    text: &str,
    spans: &[ProtectedSpan],
    specifier: &str,
) -> Vec<SpecifierMatch> {
    if specifier.is_empty() {
        return Vec::new();
    }
    let bytes = text.as_bytes();
    text.match_indices(specifier)
        .filter(|(start, _)| {
            let end = start + specifier.len();
            let before = start.checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(end).copied();
            !before.is_some_and(is_specifier_byte) && !after.is_some_and(is_specifier_byte)
        })
        .filter(|(start, _)| {
            !span_at(spans, *start).is_some_and(|span| span.kind.shields_references())
        })
        .map(|(start, matched)| SpecifierMatch {
            start,
            end: start + matched.len(),
            specifier: matched.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "ember-app-suite/components";

    #[test]
    fn test_default_import_offsets() {
        let source = "import Button from 'ember-app-suite/components/button';\nconst x = 1;\n";
        let imports = scan_imports(source, NS);
        assert_eq!(imports.len(), 1);
        let stmt = &imports[0];
        assert!(stmt.local);
        assert_eq!(stmt.bindings.default.as_deref(), Some("Button"));
        assert_eq!(
            &source[stmt.specifier.start..stmt.specifier.end],
            "ember-app-suite/components/button"
        );
        assert_eq!(&source[stmt.end..], "const x = 1;\n");
    }

    #[test]
    fn test_clause_forms() {
        let source = concat!(
            "import Component from '@glimmer/component';\n",
            "import { tracked } from '@glimmer/tracking';\n",
            "import { on as onEvent, fn } from '@ember/modifier';\n",
            "import * as utils from './utils';\n",
            "import Default, { helper } from 'pkg';\n",
            "import 'side-effect';\n",
        );
        let imports = scan_imports(source, NS);
        assert_eq!(imports.len(), 6);
        assert!(!imports[0].local);
        assert_eq!(imports[1].bindings.named[0].local, "tracked");
        assert_eq!(
            imports[2].bindings.named[0],
            NamedBinding {
                imported: "on".to_string(),
                local: "onEvent".to_string()
            }
        );
        assert_eq!(imports[3].bindings.namespace.as_deref(), Some("utils"));
        assert!(imports[3].local);
        assert_eq!(imports[4].bindings.locals(), vec!["Default", "helper"]);
        assert_eq!(imports[5].specifier.specifier, "side-effect");
        assert!(imports[5].bindings.locals().is_empty());
    }

    #[test]
    fn test_multiline_import() {
        let source = "import {\n  a,\n  b as c,\n} from 'pkg';\nrest();";
        let imports = scan_imports(source, NS);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].bindings.named.len(), 2);
        assert_eq!(&source[imports[0].end..], "rest();");
    }

    #[test]
    fn test_imports_inside_protected_spans_are_ignored() {
        let source = concat!(
            "const doc = `\n",
            "import Fake from 'ember-app-suite/components/fake';\n",
            "`;\n",
            "<template>\n",
            "import Nope from 'ember-app-suite/components/nope';\n",
            "</template>\n",
            "const lazy = import('ember-app-suite/components/lazy');\n",
        );
        assert!(scan_imports(source, NS).is_empty());
    }

    #[test]
    fn test_namespace_prefix_needs_separator() {
        assert!(is_local_specifier("ember-app-suite/components/a", NS));
        assert!(is_local_specifier("./a", NS));
        assert!(!is_local_specifier("ember-app-suite/components-extra/a", NS));
        assert!(!is_local_specifier("@glimmer/component", NS));
    }

    #[test]
    fn test_specifier_matches_respect_boundaries() {
        let text = "load('ns/button'); load('ns/button-group'); load('ns/button.gjs');";
        let spans = protected_spans(text);
        let matches = find_specifier_matches(text, &spans, "ns/button");
        assert_eq!(matches.len(), 1);
        assert_eq!(&text[matches[0].start..matches[0].end], "ns/button");
        assert_eq!(matches[0].start, 6);
    }

    #[test]
    fn test_specifier_matches_skip_markup_and_verbatim() {
        let text = "a('ns/x'); const t = `ns/x`; <template>ns/x</template>";
        let spans = protected_spans(text);
        let matches = find_specifier_matches(text, &spans, "ns/x");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 3);
    }
}
