//! Centralized error types for Tollgate.
//!
//! `TollgateError` covers the failures that happen *before* or *around*
//! process execution: security denials, malformed tool parameters, file and
//! URL policy violations, and artifact storage problems.
//!
//! Failures of a process that actually ran (non-zero exit, spawn failure,
//! cancellation) are not errors at this level. They are reported through
//! [`ExecutionStatus`](crate::executor::ExecutionStatus) so callers branch on
//! one result shape.
//!
//! # Example
//!
//! ```
//! use tollgate::error::{TollgateError, TollgateResult};
//!
//! fn check(depth: i64) -> TollgateResult<()> {
//!     if depth < 0 {
//!         return Err(TollgateError::malformed_parameters("find_files", "max_depth must be >= 0"));
//!     }
//!     Ok(())
//! }
//!
//! let err = check(-1).unwrap_err();
//! assert!(!err.is_security_related());
//! assert_eq!(err.category(), "parameters");
//! ```

use std::fmt;

/// Result type alias using `TollgateError`.
pub type TollgateResult<T> = Result<T, TollgateError>;

/// Centralized error type for Tollgate.
#[derive(Debug)]
pub enum TollgateError {
    // ============== Validation Errors ==============
    /// A command was rejected by the security validator.
    SecurityDenied {
        /// The command that was rejected.
        command: String,
        /// Why it was rejected. Never empty.
        reason: String,
    },

    /// Tool parameters failed schema or semantic validation.
    MalformedParameters {
        /// The tool whose parameters were rejected.
        tool: String,
        /// Description of the problem.
        message: String,
    },

    // ============== Policy Errors ==============
    /// A file operation was rejected by the file policy.
    PathPolicy {
        /// The path the operation targeted.
        path: String,
        /// Description of the violated rule.
        reason: String,
    },

    /// A URL was rejected by the URL allow-list.
    UrlPolicy {
        /// The rejected URL.
        url: String,
        /// Description of the violated rule.
        reason: String,
    },

    // ============== Storage Errors ==============
    /// The artifact store could not create or stat an artifact.
    Storage {
        /// The path being accessed.
        path: String,
        /// Description of the I/O error.
        message: String,
    },

    // ============== Configuration Errors ==============
    /// Configuration could not be loaded.
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    // ============== Wrapped Errors ==============
    /// Error from anyhow or other sources.
    Other {
        /// The wrapped error message.
        message: String,
    },
}

// ============== Constructor Methods ==============

impl TollgateError {
    /// Creates a security denial error.
    #[must_use]
    pub fn security_denied(command: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::SecurityDenied {
            command: command.into(),
            reason: if reason.is_empty() {
                "command denied".to_string()
            } else {
                reason
            },
        }
    }

    /// Creates a malformed parameters error.
    #[must_use]
    pub fn malformed_parameters(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedParameters {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Creates a path policy error.
    #[must_use]
    pub fn path_policy(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathPolicy {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a URL policy error.
    #[must_use]
    pub fn url_policy(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UrlPolicy {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============== Category Methods ==============

impl TollgateError {
    /// Returns `true` if this error is security-related.
    ///
    /// Security errors are always surfaced verbatim and never retried.
    #[must_use]
    pub fn is_security_related(&self) -> bool {
        matches!(
            self,
            Self::SecurityDenied { .. } | Self::PathPolicy { .. } | Self::UrlPolicy { .. }
        )
    }

    /// Returns `true` if the error was detected before any process existed.
    #[must_use]
    pub fn is_pre_execution(&self) -> bool {
        !matches!(self, Self::Storage { .. } | Self::Other { .. })
    }

    /// Returns a short category label for logs and summaries.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::SecurityDenied { .. } => "security",
            Self::MalformedParameters { .. } => "parameters",
            Self::PathPolicy { .. } | Self::UrlPolicy { .. } => "policy",
            Self::Storage { .. } => "storage",
            Self::Config { .. } => "config",
            Self::Other { .. } => "unknown",
        }
    }
}

// ============== Display Implementation ==============

impl fmt::Display for TollgateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecurityDenied { command, reason } => {
                write!(f, "security: command '{}' denied: {}", command, reason)
            }
            Self::MalformedParameters { tool, message } => {
                write!(f, "parameters: invalid input for '{}': {}", tool, message)
            }
            Self::PathPolicy { path, reason } => {
                write!(f, "policy: path '{}' rejected: {}", path, reason)
            }
            Self::UrlPolicy { url, reason } => {
                write!(f, "policy: url '{}' rejected: {}", url, reason)
            }
            Self::Storage { path, message } => {
                write!(f, "storage: artifact '{}': {}", path, message)
            }
            Self::Config { message } => write!(f, "config: {}", message),
            Self::Other { message } => write!(f, "error: {}", message),
        }
    }
}

impl std::error::Error for TollgateError {}

// ============== Conversion Implementations ==============

impl From<anyhow::Error> for TollgateError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            message: format!("{:#}", err),
        }
    }
}

impl From<crate::config::ConfigError> for TollgateError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::config(err.to_string())
    }
}
