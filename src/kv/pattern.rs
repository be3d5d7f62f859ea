//! Glob patterns over storage keys.
//!
//! Patterns use the usual keyed-store syntax: `*` matches any run of
//! characters (including `:` and `/`), `?` matches one character, `[...]`
//! is a character class, and `\` escapes the next character.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{Error, Result};

const META: &[char] = &['*', '?', '[', ']', '{', '}', '\\'];

/// A compiled key pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    matcher: GlobMatcher,
    prefix: String,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let source = collapse_stars(pattern);
        let glob = GlobBuilder::new(&source)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| Error::Parse(format!("invalid key pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            prefix: literal_prefix(&source),
            matcher: glob.compile_matcher(),
            source,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }

    /// The literal text every matching key starts with.
    pub fn literal_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Escape pattern metacharacters so `text` only matches itself.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// Runs of unescaped `*` mean the same as one `*`, but globset rejects `**`
// outside of path components.
fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut escaped = false;
    let mut last_was_star = false;
    for c in pattern.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            last_was_star = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
                last_was_star = false;
            }
            '*' if last_was_star => {}
            '*' => {
                out.push(c);
                last_was_star = true;
            }
            _ => {
                out.push(c);
                last_was_star = false;
            }
        }
    }
    out
}

fn literal_prefix(pattern: &str) -> String {
    let mut prefix = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => prefix.push(next),
                None => break,
            },
            '*' | '?' | '[' | '{' => break,
            _ => prefix.push(c),
        }
    }
    prefix
}
