//! Program availability, detected once and cached.
//!
//! Adapters ask a [`ToolAvailability`] whether a program exists instead of
//! spawning a check on every call. [`SystemAvailability`] searches `PATH`
//! for a fixed set of programs when it is built; [`FixedAvailability`]
//! answers from an explicit list so fallback paths are testable.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Programs the built-in adapters may use.
pub const KNOWN_PROGRAMS: &[&str] = &["find", "rg", "eza", "ls", "jq", "sh"];

/// Answers whether a program can be launched.
pub trait ToolAvailability: Send + Sync + std::fmt::Debug {
    fn is_available(&self, program: &str) -> bool;
}

/// `PATH` lookup results captured at construction.
#[derive(Debug, Clone, Default)]
pub struct SystemAvailability {
    found: HashMap<String, Option<PathBuf>>,
}

impl SystemAvailability {
    /// Detects [`KNOWN_PROGRAMS`].
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_programs(KNOWN_PROGRAMS.iter().copied())
    }

    /// Looks up the given programs against the current `PATH`.
    #[must_use]
    pub fn detect_programs<'a>(programs: impl IntoIterator<Item = &'a str>) -> Self {
        let path_var = std::env::var_os("PATH");
        let found = programs
            .into_iter()
            .map(|program| {
                let location = path_var
                    .as_ref()
                    .and_then(|p| find_in_path(program, std::env::split_paths(p)));
                debug!(program = %program, location = ?location, "Detected program availability");
                (program.to_string(), location)
            })
            .collect();
        Self { found }
    }

    /// Where a detected program was found.
    #[must_use]
    pub fn location(&self, program: &str) -> Option<&Path> {
        self.found.get(program).and_then(|p| p.as_deref())
    }
}

impl ToolAvailability for SystemAvailability {
    fn is_available(&self, program: &str) -> bool {
        self.location(program).is_some()
    }
}

/// Availability from a fixed list of present programs.
#[derive(Debug, Clone, Default)]
pub struct FixedAvailability {
    present: HashSet<String>,
}

impl FixedAvailability {
    pub fn new<I, S>(present: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            present: present.into_iter().map(Into::into).collect(),
        }
    }
}

impl ToolAvailability for FixedAvailability {
    fn is_available(&self, program: &str) -> bool {
        self.present.contains(program)
    }
}

fn find_in_path(binary: &str, dirs: impl Iterator<Item = PathBuf>) -> Option<PathBuf> {
    for dir in dirs {
        let candidate = dir.join(binary);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{binary}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
