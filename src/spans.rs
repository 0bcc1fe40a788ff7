//! Span lexer for component source text.
//!
//! Splits text into code, comments and protected spans. Protected spans are
//! regions whose interior belongs to another sub-language and must never be
//! rewritten or reformatted:
//!
//! - **Markup**: `<template>…</template>` blocks and `{{…}}` / `{{{…}}}` expressions
//! - **VerbatimText**: backtick literals, including nested `${…}` interpolations
//! - **Annotation**: decorators such as `@tracked` or `@service('store')`
//! - **QuotedText**: single- and double-quoted string literals
//! - **Pattern**: regular expression literals such as `/^https?:\/\//g`
//!
//! A `/` opens a pattern only where an expression may start (after an
//! operator, an opening bracket, a separator or a keyword such as `return`);
//! elsewhere it is division.
//!
//! The lexer works on bytes. Every delimiter it looks for is ASCII, so all
//! offsets it reports fall on `char` boundaries.

use serde::Serialize;

const TEMPLATE_OPEN: &str = "<template";
const TEMPLATE_CLOSE: &str = "</template>";

/// Keywords after which `/` starts a pattern rather than a division.
const PATTERN_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpanKind {
    Markup,
    VerbatimText,
    Annotation,
    QuotedText,
    Pattern,
}

impl SpanKind {
    /// Specifier rewriting skips every span kind except plain strings.
    pub fn shields_references(self) -> bool {
        !matches!(self, SpanKind::QuotedText)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedSpan {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Code { start: usize, end: usize },
    Comment { start: usize, end: usize },
    Protected(ProtectedSpan),
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEXER
// ═══════════════════════════════════════════════════════════════════════════════

enum Piece {
    Comment(usize),
    Span(usize, SpanKind),
}

pub fn lex(text: &str) -> Vec<Segment> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        let piece = match bytes[i] {
            b'/' if next == Some(b'/') => Some(Piece::Comment(line_end(bytes, i))),
            b'/' if next == Some(b'*') => block_comment_end(text, i).map(Piece::Comment),
            b'/' if starts_pattern(bytes, i) => {
                pattern_end(bytes, i).map(|end| Piece::Span(end, SpanKind::Pattern))
            }
            b'<' => template_block_end(text, i).map(|end| Piece::Span(end, SpanKind::Markup)),
            b'{' if next == Some(b'{') => {
                mustache_end(text, i).map(|end| Piece::Span(end, SpanKind::Markup))
            }
            b'`' => {
                template_literal_end(bytes, i).map(|end| Piece::Span(end, SpanKind::VerbatimText))
            }
            b'\'' | b'"' => quoted_end(bytes, i).map(|end| Piece::Span(end, SpanKind::QuotedText)),
            b'@' => annotation_end(bytes, i).map(|end| Piece::Span(end, SpanKind::Annotation)),
            _ => None,
        };

        let Some(piece) = piece else {
            i += 1;
            continue;
        };

        if code_start < i {
            segments.push(Segment::Code {
                start: code_start,
                end: i,
            });
        }
        let end = match piece {
            Piece::Comment(end) => {
                segments.push(Segment::Comment { start: i, end });
                end
            }
            Piece::Span(end, kind) => {
                segments.push(Segment::Protected(ProtectedSpan {
                    start: i,
                    end,
                    kind,
                }));
                end
            }
        };
        i = end;
        code_start = end;
    }

    if code_start < bytes.len() {
        segments.push(Segment::Code {
            start: code_start,
            end: bytes.len(),
        });
    }
    segments
}

pub fn protected_spans(text: &str) -> Vec<ProtectedSpan> {
    lex(text)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Protected(span) => Some(span),
            _ => None,
        })
        .collect()
}

/// Protected span containing `offset`, if any. `spans` must be sorted by start.
pub fn span_at(spans: &[ProtectedSpan], offset: usize) -> Option<&ProtectedSpan> {
    let idx = spans.partition_point(|s| s.end <= offset);
    spans.get(idx).filter(|s| s.start <= offset)
}

/// Whether `offset` lies in plain code, outside comments and protected spans.
pub fn is_code_at(segments: &[Segment], offset: usize) -> bool {
    segments.iter().any(|seg| {
        matches!(seg, Segment::Code { start, end } if *start <= offset && offset < *end)
    })
}

/// Removes line and block comments, leaving protected spans untouched.
/// A block comment that spans lines is replaced by a newline, otherwise a space.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for seg in lex(text) {
        match seg {
            Segment::Code { start, end } => out.push_str(&text[start..end]),
            Segment::Protected(span) => out.push_str(&text[span.start..span.end]),
            Segment::Comment { start, end } => {
                let comment = &text[start..end];
                if comment.starts_with("/*") {
                    out.push(if comment.contains('\n') { '\n' } else { ' ' });
                }
            }
        }
    }
    out
}

/// Offsets and bytes of code outside comments and protected spans.
pub fn code_bytes(text: &str) -> Vec<(usize, u8)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    for seg in lex(text) {
        if let Segment::Code { start, end } = seg {
            out.extend((start..end).map(|i| (i, bytes[i])));
        }
    }
    out
}

/// Offset just past the brace that closes the `{` at `open`, ignoring braces
/// inside comments and protected spans.
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in code_bytes(text).into_iter().filter(|(i, _)| *i >= open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Offset of the first `;` at bracket depth zero at or after `from`.
pub fn statement_end(text: &str, from: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, b) in code_bytes(text).into_iter().filter(|(i, _)| *i >= from) {
        match b {
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => depth -= 1,
            b';' if depth <= 0 => return Some(i),
            _ => {}
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPAN BOUNDARIES
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn line_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| start + p)
}

fn block_comment_end(text: &str, start: usize) -> Option<usize> {
    text[start + 2..].find("*/").map(|p| start + 2 + p + 2)
}

fn is_template_open(text: &str, at: usize) -> bool {
    text[at..].starts_with(TEMPLATE_OPEN)
        && matches!(
            text.as_bytes().get(at + TEMPLATE_OPEN.len()),
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
        )
}

fn next_template_open(text: &str, from: usize) -> Option<usize> {
    text[from..]
        .match_indices(TEMPLATE_OPEN)
        .map(|(p, _)| from + p)
        .find(|&p| is_template_open(text, p))
}

fn template_block_end(text: &str, start: usize) -> Option<usize> {
    if !is_template_open(text, start) {
        return None;
    }
    let mut depth = 1;
    let mut i = start + TEMPLATE_OPEN.len();
    while i < text.len() {
        let close = i + text[i..].find(TEMPLATE_CLOSE)?;
        if let Some(open) = next_template_open(text, i).filter(|&o| o < close) {
            depth += 1;
            i = open + TEMPLATE_OPEN.len();
            continue;
        }
        depth -= 1;
        i = close + TEMPLATE_CLOSE.len();
        if depth == 0 {
            return Some(i);
        }
    }
    None
}

fn mustache_end(text: &str, start: usize) -> Option<usize> {
    let (open, close) = if text[start..].starts_with("{{{") {
        (3, "}}}")
    } else {
        (2, "}}")
    };
    text[start + open..]
        .find(close)
        .map(|p| start + open + p + close.len())
}

fn quoted_end(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn template_literal_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => i = interpolation_end(bytes, i + 2)?,
            _ => i += 1,
        }
    }
    None
}

/// Offset just past the `}` closing an interpolation whose body starts at `i`.
fn interpolation_end(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut depth = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'`' => i = template_literal_end(bytes, i)?,
            b'\'' | b'"' => i = quoted_end(bytes, i).unwrap_or(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn starts_pattern(bytes: &[u8], at: usize) -> bool {
    let Some(prev) = bytes[..at].iter().rposition(|b| !b.is_ascii_whitespace()) else {
        return true;
    };
    match bytes[prev] {
        b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';' | b'+'
        | b'-' | b'*' | b'%' | b'<' | b'>' | b'~' | b'^' => true,
        b if is_ident_byte(b) => {
            let word_start = bytes[..prev]
                .iter()
                .rposition(|b| !is_ident_byte(*b))
                .map_or(0, |p| p + 1);
            let member = word_start > 0 && bytes[word_start - 1] == b'.';
            !member
                && PATTERN_KEYWORDS
                    .iter()
                    .any(|kw| kw.as_bytes() == &bytes[word_start..=prev])
        }
        _ => false,
    }
}

/// End of the pattern literal opened at `start`, flags included. Patterns
/// never span lines.
fn pattern_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut in_class = false;
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' | b'\r' => return None,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}

fn balanced_paren_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'`' => i = template_literal_end(bytes, i)?,
            b'\'' | b'"' => i = quoted_end(bytes, i)?,
            _ => i += 1,
        }
    }
    None
}

fn annotation_end(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && (is_ident_byte(bytes[start - 1]) || bytes[start - 1] == b'.') {
        return None;
    }
    if !bytes.get(start + 1).copied().is_some_and(is_ident_start) {
        return None;
    }

    let mut i = start + 1;
    loop {
        while i < bytes.len() && is_ident_byte(bytes[i]) {
            i += 1;
        }
        let continues = bytes.get(i) == Some(&b'.')
            && bytes.get(i + 1).copied().is_some_and(is_ident_start);
        if !continues {
            break;
        }
        i += 1;
    }

    if bytes.get(i) == Some(&b'(') {
        if let Some(end) = balanced_paren_end(bytes, i) {
            return Some(end);
        }
    }
    Some(i)
}
