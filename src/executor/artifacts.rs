//! Per-invocation artifact files.
//!
//! Every execution gets a fresh `.out` / `.err` pair under the storage
//! directory. Names combine a process-wide sequence number with a random
//! UUID so concurrent invocations (in one process or several) never share
//! a file. Nothing here deletes artifacts.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{TollgateError, TollgateResult};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Read buffer used when scanning artifacts.
const SCAN_BUFFER_SIZE: usize = 64 * 1024;

/// Output/error file pair for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub output_path: PathBuf,
    pub error_path: PathBuf,
}

/// Directory holding per-invocation artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh, empty artifact pair and returns open handles.
    ///
    /// # Errors
    ///
    /// Returns [`TollgateError::Storage`] if the directory or files cannot
    /// be created.
    pub fn create(&self, label: &str) -> TollgateResult<(ArtifactPair, File, File)> {
        fs::create_dir_all(&self.root)
            .map_err(|e| TollgateError::storage(self.root.display().to_string(), e.to_string()))?;

        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let stem = format!(
            "{}-{:06}-{}",
            sanitize_label(label),
            seq,
            uuid::Uuid::new_v4().simple()
        );
        let pair = ArtifactPair {
            output_path: self.root.join(format!("{stem}.out")),
            error_path: self.root.join(format!("{stem}.err")),
        };

        let stdout = create_new(&pair.output_path)?;
        let stderr = create_new(&pair.error_path)?;
        Ok((pair, stdout, stderr))
    }
}

fn create_new(path: &Path) -> TollgateResult<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| TollgateError::storage(path.display().to_string(), e.to_string()))
}

/// Keeps artifact names filesystem-safe.
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .take(32)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "exec".to_string()
    } else {
        cleaned
    }
}

/// Appends a diagnostic line to an artifact.
pub(crate) fn append_line(path: &Path, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    writeln!(file, "{message}")
}

/// Size of an artifact via `stat`; a missing file counts as empty.
#[must_use]
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Counts occurrences of `delimiter` in a single streaming pass.
///
/// A final record without a trailing delimiter is counted too.
///
/// # Errors
///
/// Returns any I/O error from opening or reading the file.
pub fn count_delimited(path: &Path, delimiter: u8) -> std::io::Result<usize> {
    let mut reader = File::open(path)?;
    let mut buffer = vec![0u8; SCAN_BUFFER_SIZE];
    let mut count = 0;
    let mut last = None;

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        count += buffer[..read].iter().filter(|b| **b == delimiter).count();
        last = Some(buffer[read - 1]);
    }

    if matches!(last, Some(b) if b != delimiter) {
        count += 1;
    }
    Ok(count)
}

/// Counts delimited records for which `keep` returns `true`, reading one
/// record at a time.
///
/// # Errors
///
/// Returns any I/O error from opening or reading the file.
pub fn count_records_where(
    path: &Path,
    delimiter: u8,
    mut keep: impl FnMut(&[u8]) -> bool,
) -> std::io::Result<usize> {
    let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, File::open(path)?);
    let mut record = Vec::new();
    let mut count = 0;

    loop {
        record.clear();
        if reader.read_until(delimiter, &mut record)? == 0 {
            break;
        }
        if record.last() == Some(&delimiter) {
            record.pop();
        }
        if keep(&record) {
            count += 1;
        }
    }
    Ok(count)
}

/// Reads at most `max_bytes` from the start of an artifact, lossily
/// decoded.
///
/// # Errors
///
/// Returns any I/O error from opening or reading the file.
pub fn read_head(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    File::open(path)?.take(max_bytes).read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
