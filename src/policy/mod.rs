//! File-operation policy.
//!
//! Higher-level file tools call [`FilePolicy`] before touching disk:
//!
//! - paths are resolved against a base directory, or rejected when
//!   relative and auto-resolution is off;
//! - creation refuses to overwrite an existing file unless configured;
//! - editing an existing file requires a prior read recorded in the
//!   session's [`AccessRecord`]; new files are exempt;
//! - writes never follow symlinks and never land under a protected prefix.

pub mod access;
pub mod urls;

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

pub use access::{AccessRecord, SessionContext};
pub use urls::UrlPolicy;

use crate::config::{Config, FileSettings};
use crate::error::{TollgateError, TollgateResult};

#[derive(Debug, Clone)]
pub struct FilePolicy {
    base_dir: PathBuf,
    settings: FileSettings,
}

impl FilePolicy {
    pub fn new(base_dir: impl Into<PathBuf>, settings: FileSettings) -> Self {
        Self {
            base_dir: base_dir.into(),
            settings,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.working_dir(), config.files.clone())
    }

    /// Resolves `path` to a normalized absolute path.
    ///
    /// Normalization is lexical: `.` and `..` are folded without touching
    /// the filesystem, so reads and edits of the same spelling agree.
    ///
    /// # Errors
    ///
    /// Returns [`TollgateError::PathPolicy`] for an empty path, or a
    /// relative path when auto-resolution is disabled.
    pub fn resolve_path(&self, path: &str) -> TollgateResult<PathBuf> {
        if path.trim().is_empty() {
            return Err(TollgateError::path_policy(path, "path must not be empty"));
        }
        let candidate = Path::new(path);
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else if self.settings.auto_resolve_paths {
            self.base_dir.join(candidate)
        } else {
            return Err(TollgateError::path_policy(
                path,
                "path must be absolute (automatic resolution is disabled)",
            ));
        };
        Ok(normalize(&absolute))
    }

    /// Records a read so the file may be edited later.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be resolved.
    pub fn record_read(&self, path: &str, access: &AccessRecord) -> TollgateResult<PathBuf> {
        let resolved = self.resolve_path(path)?;
        access.record(resolved.clone());
        Ok(resolved)
    }

    /// Checks that a new file may be created at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TollgateError::PathPolicy`] if the target is protected, is a
    /// symlink, or already exists and overwriting is disabled.
    pub fn check_create(&self, path: &str) -> TollgateResult<PathBuf> {
        let resolved = self.resolve_path(path)?;
        self.check_protected(path, &resolved)?;

        match existing_kind(&resolved)? {
            Existing::Missing => Ok(resolved),
            Existing::Symlink => Err(symlink_rejected(path)),
            Existing::Present if self.settings.allow_overwrite => Ok(resolved),
            Existing::Present => {
                warn!(path = %path, "Security: create would overwrite existing file");
                Err(TollgateError::path_policy(
                    path,
                    "file already exists; read it and edit it instead of recreating it",
                ))
            }
        }
    }

    /// Checks that `path` may be edited.
    ///
    /// # Errors
    ///
    /// Returns [`TollgateError::PathPolicy`] if the target is protected, is a
    /// symlink, or exists and was not read earlier in this session.
    pub fn check_edit(&self, path: &str, access: &AccessRecord) -> TollgateResult<PathBuf> {
        let resolved = self.resolve_path(path)?;
        self.check_protected(path, &resolved)?;

        match existing_kind(&resolved)? {
            Existing::Missing => Ok(resolved),
            Existing::Symlink => Err(symlink_rejected(path)),
            Existing::Present if access.contains(&resolved) => Ok(resolved),
            Existing::Present => {
                warn!(path = %path, "Security: edit without prior read rejected");
                Err(TollgateError::path_policy(
                    path,
                    "file must be read in this session before it can be edited",
                ))
            }
        }
    }

    fn check_protected(&self, path: &str, resolved: &Path) -> TollgateResult<()> {
        if let Some(protected) = self
            .settings
            .protected_paths
            .iter()
            .find(|p| resolved.starts_with(p))
        {
            warn!(path = %path, protected = %protected.display(), "Security: write to protected path rejected");
            return Err(TollgateError::path_policy(
                path,
                format!("writes under {} are not allowed", protected.display()),
            ));
        }
        Ok(())
    }
}

enum Existing {
    Missing,
    Symlink,
    Present,
}

/// Inspects the path itself, without following a final symlink.
fn existing_kind(path: &Path) -> TollgateResult<Existing> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(Existing::Symlink),
        Ok(_) => Ok(Existing::Present),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Existing::Missing),
        Err(e) => Err(TollgateError::path_policy(
            path.display().to_string(),
            format!("cannot inspect path: {e}"),
        )),
    }
}

fn symlink_rejected(path: &str) -> TollgateError {
    warn!(path = %path, "Security: symlink rejected - TOCTOU mitigation");
    TollgateError::path_policy(path, "operations on symlinks are not allowed")
}

/// Folds `.` and `..` components lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
