//! Platform shell used by the validated `run_command` tool.
//!
//! Only text that has already passed [`crate::security::validate`] is handed
//! to the shell. Structured adapters never come through here.
//!
//! # Examples
//!
//! ```
//! use tollgate::shell::ShellConfig;
//!
//! let config = ShellConfig::default();
//! let request = config.request("git status");
//! // On Unix: sh -c 'git status'
//! assert_eq!(request.argv().last().map(String::as_str), Some("git status"));
//! ```

use crate::executor::ExecutionRequest;

/// Platform-specific shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ShellConfig {
    /// The shell executable (e.g., "sh" or "cmd.exe").
    pub command: String,
    /// Arguments placed before the script (e.g., ["-c"] or ["/C"]).
    pub args: Vec<String>,
}

#[cfg(unix)]
impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            command: "sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }
}

#[cfg(windows)]
impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            command: "cmd.exe".to_string(),
            args: vec!["/C".to_string()],
        }
    }
}

impl ShellConfig {
    /// Builds an execution request that runs `script` through this shell.
    ///
    /// The script is passed as a single argument, exactly as validated.
    pub fn request(&self, script: &str) -> ExecutionRequest {
        ExecutionRequest::new(&self.command)
            .args(self.args.iter().cloned())
            .arg(script)
            .label("shell")
    }
}
