//! Artifact shrinking.
//!
//! Pure text transform, applied in this order:
//!
//! 1. strip comments
//! 2. protect markup, verbatim text, annotations and quoted strings behind placeholders
//! 3. strip blank lines
//! 4. collapse whitespace runs to one space
//! 5. drop whitespace around operators, commas and brackets
//! 6. restore every placeholder
//! 7. trim
//!
//! Placeholders are `<open><index><close>` where `open` and `close` are
//! private-use characters that do not occur anywhere in the input, so restoring
//! can never match text that was not a placeholder.
//!
//! Blank lines are stripped after protecting so that blank lines inside a
//! template or backtick literal survive.
//!
//! Passes 4 and 5 collapse newlines, so statements in the input must be
//! terminated explicitly.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{BundleError, Result};
use crate::spans::{protected_spans, strip_comments};

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

const TIGHT_CHARS: &[char] = &[
    '=', '<', '>', '!', '+', '-', '*', '/', '%', ',', '(', ')', '[', ']', '{', '}',
];

/// Text with every protected span swapped for a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protected {
    pub text: String,
    originals: Vec<String>,
    open: char,
    close: char,
}

fn unused_sentinels(text: &str) -> (char, char) {
    let mut free = ('\u{E000}'..='\u{F8FF}').filter(|c| !text.contains(*c));
    // The private-use area has 6400 code points; text holding all of them
    // would be at least 19 KiB of nothing else.
    let open = free.next().unwrap_or('\u{F0000}');
    let close = free.next().unwrap_or('\u{F0001}');
    (open, close)
}

pub fn protect(text: &str) -> Protected {
    let (open, close) = unused_sentinels(text);
    let mut out = String::with_capacity(text.len());
    let mut originals = Vec::new();
    let mut cursor = 0;

    for span in protected_spans(text) {
        out.push_str(&text[cursor..span.start]);
        out.push(open);
        out.push_str(&originals.len().to_string());
        out.push(close);
        originals.push(text[span.start..span.end].to_string());
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);

    Protected {
        text: out,
        originals,
        open,
        close,
    }
}

impl Protected {
    pub fn span_count(&self) -> usize {
        self.originals.len()
    }

    /// Substitutes every placeholder in `text` back in one pass. Each placeholder
    /// must appear exactly once and intact.
    pub fn restore(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut used = vec![false; self.originals.len()];
        let mut chars = text.chars();

        while let Some(c) = chars.next() {
            if c == self.close {
                return Err(BundleError::protection_violation(
                    "placeholder terminator without a matching opener",
                ));
            }
            if c != self.open {
                out.push(c);
                continue;
            }

            let mut digits = String::new();
            let mut terminated = false;
            for d in chars.by_ref() {
                if d == self.close {
                    terminated = true;
                    break;
                }
                digits.push(d);
            }
            let index = digits
                .parse::<usize>()
                .ok()
                .filter(|_| terminated)
                .filter(|i| *i < self.originals.len())
                .ok_or_else(|| {
                    BundleError::protection_violation(format!(
                        "malformed placeholder `{}`",
                        digits
                    ))
                })?;
            if std::mem::replace(&mut used[index], true) {
                return Err(BundleError::protection_violation(format!(
                    "placeholder {} restored twice",
                    index
                )));
            }
            out.push_str(&self.originals[index]);
        }

        if let Some(missing) = used.iter().position(|u| !u) {
            return Err(BundleError::protection_violation(format!(
                "placeholder {} was lost before restoring",
                missing
            )));
        }
        Ok(out)
    }
}

pub fn strip_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drops single spaces next to operator and bracket characters, except where
/// that would fuse `+ +`, `- -` or `/ /` into a different token.
pub fn tighten_operators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if c != ' ' {
            out.push(c);
            continue;
        }
        let prev = out.chars().last();
        let next = chars.get(i + 1).copied();
        let tight = prev.is_some_and(|p| TIGHT_CHARS.contains(&p))
            || next.is_some_and(|n| TIGHT_CHARS.contains(&n));
        let fuses = matches!((prev, next), (Some(p), Some(n)) if p == n && matches!(p, '+' | '-' | '/'));
        if !tight || fuses {
            out.push(c);
        }
    }
    out
}

pub fn shrink(text: &str) -> Result<String> {
    let stripped = strip_comments(text);
    let protected = protect(&stripped);
    let compact = strip_blank_lines(&protected.text);
    let collapsed = WHITESPACE_RE.replace_all(&compact, " ");
    let tightened = tighten_operators(&collapsed);
    let restored = protected.restore(&tightened)?;
    log::debug!(
        "Shrunk {} bytes to {} ({} protected spans)",
        text.len(),
        restored.len(),
        protected.span_count()
    );
    Ok(restored.trim().to_string())
}
