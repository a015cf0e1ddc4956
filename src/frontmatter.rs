// src/frontmatter.rs

//! Frontmatter codec for task documents.
//!
//! A task document may start with a small metadata block:
//!
//! ```text
//! ---
//! iteration: 2
//! last_run: 2026-10-19T14:02:11
//! status: done
//! ---
//! # Write me a haiku
//! ```
//!
//! Only flat `key: value` pairs are understood, not general YAML. The
//! dispatcher owns three keys and passes everything else through untouched.
//!
//! Parsing never fails from the caller's point of view ([`parse`]); a block
//! we cannot understand degrades to "no metadata" and the raw text is kept as
//! the body. [`try_parse`] exposes the failure for callers that want to log
//! it.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::TaskStatus;

/// Line that opens and closes the metadata block.
pub const DELIMITER: &str = "---";

pub const ITERATION_KEY: &str = "iteration";
pub const STATUS_KEY: &str = "status";
pub const LAST_RUN_KEY: &str = "last_run";

/// Ordered key/value metadata.
///
/// Backed by a `BTreeMap` so rendering is stable regardless of insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of successful runs so far. Absent or unparseable reads as `None`.
    pub fn iteration(&self) -> Option<u64> {
        self.get(ITERATION_KEY)?.trim().parse().ok()
    }

    pub fn set_iteration(&mut self, iteration: u64) {
        self.insert(ITERATION_KEY, iteration.to_string());
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.get(STATUS_KEY)?.parse().ok()
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.insert(STATUS_KEY, status.as_str());
    }

    pub fn last_run(&self) -> Option<&str> {
        self.get(LAST_RUN_KEY).filter(|s| !s.is_empty())
    }

    pub fn set_last_run(&mut self, timestamp: impl Into<String>) {
        self.insert(LAST_RUN_KEY, timestamp);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A task document split into metadata and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub metadata: Metadata,
    pub body: String,
}

impl Document {
    pub fn render(&self) -> String {
        render(&self.metadata, &self.body)
    }
}

/// Why a leading `---` block could not be read as metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMetadata {
    #[error("metadata block is not closed by a `---` line")]
    Unterminated,

    #[error("metadata line {line} is not a `key: value` pair: {text:?}")]
    BadLine { line: usize, text: String },
}

/// Split `text` into metadata and body, degrading to empty metadata on any
/// malformed block.
pub fn parse(text: &str) -> Document {
    try_parse(text).unwrap_or_else(|_| Document {
        metadata: Metadata::new(),
        body: text.to_string(),
    })
}

/// Split `text` into metadata and body.
///
/// Text that does not open with a delimiter line has no metadata and is
/// returned whole as the body.
pub fn try_parse(text: &str) -> Result<Document, MalformedMetadata> {
    let Some(rest) = strip_opening_delimiter(text) else {
        return Ok(Document {
            metadata: Metadata::new(),
            body: text.to_string(),
        });
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if is_delimiter(line) {
            let metadata = parse_block(&rest[..offset])?;
            let body = rest[offset + line.len()..].to_string();
            return Ok(Document { metadata, body });
        }
        offset += line.len();
    }

    Err(MalformedMetadata::Unterminated)
}

/// Serialize metadata followed by the body.
///
/// Empty metadata renders the body alone, so documents that never had a
/// block do not grow one until there is something to put in it.
pub fn render(metadata: &Metadata, body: &str) -> String {
    if metadata.is_empty() {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len() + 64);
    out.push_str(DELIMITER);
    out.push('\n');
    for (key, value) in metadata.iter() {
        if value.is_empty() {
            out.push_str(&format!("{key}:\n"));
        } else {
            out.push_str(&format!("{key}: {value}\n"));
        }
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(body);
    out
}

fn strip_opening_delimiter(text: &str) -> Option<&str> {
    let first_line_len = text.find('\n')? + 1;
    if is_delimiter(&text[..first_line_len]) {
        Some(&text[first_line_len..])
    } else {
        None
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']) == DELIMITER
}

fn parse_block(block: &str) -> Result<Metadata, MalformedMetadata> {
    let mut metadata = Metadata::new();

    for (idx, line) in block.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let bad_line = || MalformedMetadata::BadLine {
            line: idx + 1,
            text: line.to_string(),
        };

        let (key, value) = trimmed.split_once(':').ok_or_else(bad_line)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(bad_line());
        }
        metadata.insert(key, value.trim());
    }

    Ok(metadata)
}
