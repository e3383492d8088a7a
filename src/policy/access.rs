//! Session-scoped access tracking.
//!
//! [`AccessRecord`] remembers which files were read in this session so the
//! edit guard can require a read first. [`SessionContext`] owns it together
//! with the URLs the user supplied in the current turn. Each session gets
//! its own context; nothing here is process-global.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Paths read during a session. Grows until [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct AccessRecord {
    paths: RwLock<HashSet<PathBuf>>,
}

impl AccessRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read. Only the read path calls this.
    pub fn record(&self, path: impl Into<PathBuf>) {
        self.paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into());
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.paths.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Per-session state consulted by the file and URL policies.
#[derive(Debug, Default)]
pub struct SessionContext {
    access: AccessRecord,
    user_urls: RwLock<HashSet<String>>,
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn access(&self) -> &AccessRecord {
        &self.access
    }

    /// Marks a URL as typed by the user in the current turn.
    pub fn add_user_url(&self, url: impl Into<String>) {
        self.user_urls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into());
    }

    #[must_use]
    pub fn is_user_supplied(&self, url: &str) -> bool {
        self.user_urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Starts a new turn: user-supplied URLs from the last turn expire.
    pub fn begin_turn(&self) {
        self.user_urls.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Clears everything, as on an explicit session reset.
    pub fn reset(&self) {
        self.access.clear();
        self.begin_turn();
    }
}
