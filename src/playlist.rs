//! Extended-playlist (`#EXTM3U`) parser.
//!
//! ```text
//! #EXTM3U
//! #EXTINF:-1 group-title="News",Channel One
//! http://example.test/1.m3u8
//! ```
//!
//! A `#EXTINF:` metadata line opens an entry. The next non-blank line that
//! is not a comment is taken verbatim as the entry's URL. Another metadata
//! line, or the end of input, before that URL drops the open entry. Bad
//! entries are collected in [`ParsedPlaylist::skipped`] instead of failing
//! the parse.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{ChannelRecord, PlaylistEntry};

const HEADER: &str = "#EXTM3U";
const DIRECTIVE: &str = "#EXTINF:";
const GROUP_ATTR: &str = "group-title=\"";

/// Why an entry produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Metadata line with no URL line before the next metadata line or EOF.
    MissingUrl,
    /// Metadata line without a display name.
    EmptyName,
    /// URL line with no metadata line in front of it.
    OrphanUrl,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::MissingUrl => "metadata line has no url line",
            SkipReason::EmptyName => "entry has an empty name",
            SkipReason::OrphanUrl => "url line has no metadata line",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// 1-based line number of the offending line.
    pub line: usize,
    pub reason: SkipReason,
}

/// Parser output: valid entries in source order plus everything skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlaylist {
    pub entries: Vec<PlaylistEntry>,
    pub skipped: Vec<SkippedEntry>,
}

impl ParsedPlaylist {
    /// Assign dense ids in parse order: the first entry gets `0`.
    pub fn into_records(self) -> Vec<ChannelRecord> {
        self.entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.into_record(i))
            .collect()
    }
}

struct Pending {
    line: usize,
    name: String,
    category: Option<String>,
}

pub fn parse_playlist(text: &str) -> ParsedPlaylist {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut out = ParsedPlaylist::default();
    let mut pending: Option<Pending> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line == HEADER {
            continue;
        }

        if let Some(meta) = line.strip_prefix(DIRECTIVE) {
            if let Some(open) = pending.take() {
                out.skipped.push(SkippedEntry {
                    line: open.line,
                    reason: SkipReason::MissingUrl,
                });
            }
            let (category, name) = parse_metadata(meta);
            pending = Some(Pending {
                line: line_no,
                name,
                category,
            });
        } else if line.starts_with('#') {
            // comment or unsupported directive
        } else {
            match pending.take() {
                Some(open) if open.name.is_empty() => out.skipped.push(SkippedEntry {
                    line: open.line,
                    reason: SkipReason::EmptyName,
                }),
                Some(open) => out.entries.push(PlaylistEntry {
                    name: open.name,
                    category: open.category,
                    url: line.to_string(),
                    line: open.line,
                }),
                None => out.skipped.push(SkippedEntry {
                    line: line_no,
                    reason: SkipReason::OrphanUrl,
                }),
            }
        }
    }

    if let Some(open) = pending {
        out.skipped.push(SkippedEntry {
            line: open.line,
            reason: SkipReason::MissingUrl,
        });
    }

    out
}

/// Read and parse a playlist file.
pub async fn read_playlist(path: &Path) -> Result<ParsedPlaylist> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(parse_playlist(&text))
}

/// Split `-1 group-title="News",Channel One` into category and name.
///
/// The name starts after the first comma outside double quotes, so a quoted
/// attribute value may itself contain commas.
fn parse_metadata(meta: &str) -> (Option<String>, String) {
    let mut in_quotes = false;
    let mut split = None;
    for (i, c) in meta.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                split = Some(i);
                break;
            }
            _ => {}
        }
    }

    let (attrs, name) = match split {
        Some(i) => (&meta[..i], meta[i + 1..].trim()),
        None => (meta, ""),
    };

    let category = attrs
        .find(GROUP_ATTR)
        .and_then(|start| {
            let rest = &attrs[start + GROUP_ATTR.len()..];
            rest.find('"').map(|end| rest[..end].to_string())
        })
        .filter(|c| !c.is_empty());

    (category, name.to_string())
}
