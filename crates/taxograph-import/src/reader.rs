//! Edge-list file reader.
//!
//! Each line holds `category,subcategory`. Fields may be double-quoted and a
//! backslash escapes the next character. Rows that do not have exactly two
//! non-empty fields are skipped and counted. Files ending in `.gz` are
//! decompressed on the fly.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flate2::read::GzDecoder;
use taxograph_core::{Edge, EntityName};

use crate::error::{ImportError, Result};

const READ_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Streaming iterator of [`Edge`]s read from a delimited text source.
pub struct EdgeReader {
    source: Box<dyn BufRead + Send>,
    line: String,
    line_no: u64,
    skipped: Arc<AtomicU64>,
    failed: bool,
}

impl EdgeReader {
    /// Open an edge-list file. A `.gz` extension selects gzip decoding.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let gzipped = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

        let source: Box<dyn BufRead + Send> = if gzipped {
            Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, GzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, file))
        };
        Ok(Self::from_reader(source))
    }

    pub fn from_reader(source: Box<dyn BufRead + Send>) -> Self {
        Self {
            source,
            line: String::new(),
            line_no: 0,
            skipped: Arc::new(AtomicU64::new(0)),
            failed: false,
        }
    }

    /// Rows skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Shared handle on the skip counter, readable after the reader moves.
    pub fn skipped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.skipped)
    }

    fn parse_line(&self) -> Option<Edge> {
        let line = self.line.trim_end_matches(['\n', '\r']);
        let fields = split_fields(line);
        let [parent, child] = <[String; 2]>::try_from(fields).ok()?;
        let parent = EntityName::new(parent).ok()?;
        let child = EntityName::new(child).ok()?;
        Some(Edge::new(parent, child))
    }
}

impl Iterator for EdgeReader {
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.line.clear();
            match self.source.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    if let Some(edge) = self.parse_line() {
                        return Some(Ok(edge));
                    }
                    self.skipped.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(line = self.line_no, "Skipping malformed row");
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(ImportError::Io(e)));
                }
            }
        }
    }
}

/// Split one row on commas, honouring double quotes and backslash escapes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(2);
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    field.push(escaped);
                }
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
