//! Inline-or-reference result summaries.
//!
//! Small results are embedded verbatim. Large results are represented by a
//! preview of the first [`PREVIEW_LINES`] records plus the artifact path.
//! Every read here is bounded, so summarizing a multi-gigabyte artifact
//! costs the same as a tiny one.

use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::util::{format_bytes, truncate_string};

/// Maximum item count embedded directly in a result.
pub const INLINE_THRESHOLD: usize = 50;

/// Maximum records shown in a preview.
pub const PREVIEW_LINES: usize = 20;

/// Byte cap on inline content, for results with few but very long records.
pub const INLINE_BYTE_LIMIT: u64 = 256 * 1024;

/// Byte cap on a single preview record.
pub const MAX_PREVIEW_LINE_BYTES: usize = 512;

/// Bounded view of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub item_count: usize,
    /// `true` iff `item_count <= INLINE_THRESHOLD`.
    pub inline: bool,
    /// Full content when inline, otherwise at most [`PREVIEW_LINES`] records.
    pub preview_text: String,
    pub artifact_reference: PathBuf,
    /// Artifact size on disk.
    pub artifact_bytes: u64,
}

impl ResultSummary {
    /// Retrieval note for results that were not embedded.
    #[must_use]
    pub fn retrieval_note(&self) -> Option<String> {
        if self.inline {
            return None;
        }
        Some(format!(
            "Showing first {} of {} items. Full results ({}) are in {}; read that file with an offset to see more.",
            PREVIEW_LINES.min(self.item_count),
            self.item_count,
            format_bytes(self.artifact_bytes),
            self.artifact_reference.display()
        ))
    }

    /// The preview followed by the retrieval note, if any.
    #[must_use]
    pub fn render(&self) -> String {
        match self.retrieval_note() {
            Some(note) if self.preview_text.is_empty() => note,
            Some(note) => format!("{}\n\n{}", self.preview_text.trim_end(), note),
            None => self.preview_text.clone(),
        }
    }
}

/// Builds the summary for an artifact whose records end in `delimiter`.
///
/// NUL-delimited records are shown one per line.
///
/// # Errors
///
/// Returns any I/O error from reading the artifact.
pub fn summarize(path: &Path, item_count: usize, delimiter: u8) -> std::io::Result<ResultSummary> {
    let artifact_bytes = std::fs::metadata(path).map(|m| m.len())?;
    let inline = item_count <= INLINE_THRESHOLD;

    let preview_text = if inline {
        read_inline(path, delimiter)?
    } else {
        preview(path, delimiter, PREVIEW_LINES)?
    };

    Ok(ResultSummary {
        item_count,
        inline,
        preview_text,
        artifact_reference: path.to_path_buf(),
        artifact_bytes,
    })
}

fn read_inline(path: &Path, delimiter: u8) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    let size = File::open(path)?
        .take(INLINE_BYTE_LIMIT + 1)
        .read_to_end(&mut bytes)?;
    let truncated = size as u64 > INLINE_BYTE_LIMIT;
    bytes.truncate(INLINE_BYTE_LIMIT as usize);

    if delimiter != b'\n' {
        for b in &mut bytes {
            if *b == delimiter {
                *b = b'\n';
            }
        }
    }
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str(&format!(
            "\n[output truncated at {}]",
            format_bytes(INLINE_BYTE_LIMIT)
        ));
    }
    Ok(text)
}

/// Reads at most `max_records` records, each capped at
/// [`MAX_PREVIEW_LINE_BYTES`], joined by newlines.
///
/// # Errors
///
/// Returns any I/O error from reading the artifact.
pub fn preview(path: &Path, delimiter: u8, max_records: usize) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::with_capacity(max_records);
    let mut record = Vec::new();

    while lines.len() < max_records {
        record.clear();
        // Bound the read even if the artifact has no delimiter at all.
        let read = (&mut reader)
            .take(MAX_PREVIEW_LINE_BYTES as u64 * 4)
            .read_until(delimiter, &mut record)?;
        if read == 0 {
            break;
        }
        let complete = record.last() == Some(&delimiter);
        if complete {
            record.pop();
        } else {
            skip_record(&mut reader, delimiter)?;
        }
        let text = String::from_utf8_lossy(&record);
        lines.push(truncate_string(text.trim_end_matches('\r'), MAX_PREVIEW_LINE_BYTES));
    }

    Ok(lines.join("\n"))
}

/// Discards the rest of an over-long record without buffering it.
fn skip_record(reader: &mut impl BufRead, delimiter: u8) -> std::io::Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(pos) = buf.iter().position(|b| *b == delimiter) {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}
