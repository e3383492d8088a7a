//! Configuration for Tollgate.
//!
//! Configuration is read from a TOML file. Every field has a default, so an
//! empty file (or no file at all) yields a working configuration.
//!
//! # Example
//!
//! ```toml
//! storage_dir = "/var/tmp/tollgate"
//! working_dir = "."
//!
//! [files]
//! allow_overwrite = false
//! auto_resolve_paths = true
//!
//! [urls]
//! extra_trusted_domains = ["*.internal.example.com"]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::get_cache_dir;

/// Environment variable that overrides the artifact storage directory.
pub const STORAGE_DIR_ENV: &str = "TOLLGATE_STORAGE_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error when reading the config file.
    #[error("IO error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings for the file-operation policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Allow file creation to overwrite an existing file.
    pub allow_overwrite: bool,
    /// Resolve relative paths against the working directory instead of
    /// rejecting them.
    pub auto_resolve_paths: bool,
    /// Path prefixes that may never be written.
    pub protected_paths: Vec<PathBuf>,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            allow_overwrite: false,
            auto_resolve_paths: true,
            protected_paths: default_protected_paths(),
        }
    }
}

/// Returns platform-specific protected paths.
#[cfg(unix)]
fn default_protected_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/etc"),
        PathBuf::from("/usr"),
        PathBuf::from("/bin"),
        PathBuf::from("/sbin"),
    ]
}

/// Returns platform-specific protected paths for Windows.
#[cfg(windows)]
fn default_protected_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(r"C:\Windows"),
        PathBuf::from(r"C:\Program Files"),
        PathBuf::from(r"C:\Program Files (x86)"),
    ]
}

/// Settings for the URL allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UrlSettings {
    /// Host patterns trusted in addition to the built-in set.
    ///
    /// `*.example.com` matches any subdomain of `example.com`.
    pub extra_trusted_domains: Vec<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for per-invocation output/error artifacts.
    ///
    /// `None` selects [`Config::default_storage_dir`].
    pub storage_dir: Option<PathBuf>,
    /// Base directory for tool invocations and relative path resolution.
    ///
    /// `None` means the process working directory.
    pub working_dir: Option<PathBuf>,
    /// File-operation policy settings.
    pub files: FileSettings,
    /// URL allow-list settings.
    pub urls: UrlSettings,
}

impl Config {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or has mistyped fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads configuration from `path` if given, otherwise from the default
    /// config location if that file exists, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match crate::util::get_config_dir().map(|d| d.join("tollgate.toml")) {
            Some(default_path) if default_path.exists() => Self::load(&default_path),
            _ => Ok(Self::default()),
        }
    }

    /// Applies the `TOLLGATE_STORAGE_DIR` environment override, if set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(STORAGE_DIR_ENV).filter(|v| !v.is_empty()) {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// The platform cache directory for artifacts, falling back to the
    /// system temp directory.
    #[must_use]
    pub fn default_storage_dir() -> PathBuf {
        get_cache_dir()
            .map(|d| d.join("artifacts"))
            .unwrap_or_else(|| std::env::temp_dir().join("tollgate").join("artifacts"))
    }

    /// The effective artifact storage directory.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(Self::default_storage_dir)
    }

    /// The effective working directory.
    #[must_use]
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
