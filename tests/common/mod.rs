//! Common test utilities and fixtures for Tollgate.
//!
//! This module provides shared test infrastructure including:
//! - A temp-dir backed workspace with an artifact directory
//! - A tool registry wired to that workspace
//! - Binary availability checks for optional tools

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tollgate::executor::BoundedExecutor;
use tollgate::tools::{SystemAvailability, ToolAvailability, ToolContext, ToolRegistry};

/// Test context providing common setup for integration tests.
pub struct TestContext {
    /// Temporary directory for test file operations.
    pub temp_dir: tempfile::TempDir,
}

impl TestContext {
    /// Creates a new test context with a temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Workspace directory the tools run in.
    #[must_use]
    pub fn workspace(&self) -> PathBuf {
        let dir = self.temp_dir.path().join("workspace");
        std::fs::create_dir_all(&dir).expect("failed to create workspace");
        dir
    }

    /// Artifact directory, kept outside the workspace so listings and
    /// searches never see their own output.
    #[must_use]
    pub fn artifacts(&self) -> PathBuf {
        self.temp_dir.path().join("artifacts")
    }

    /// Creates a file in the workspace with the given content.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.workspace().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write file");
        path
    }

    pub fn executor(&self) -> BoundedExecutor {
        BoundedExecutor::new(self.artifacts())
    }

    /// A registry using the given availability.
    pub fn registry_with(&self, availability: Arc<dyn ToolAvailability>) -> ToolRegistry {
        ToolRegistry::new(ToolContext::new(self.executor(), self.workspace(), availability))
    }

    /// A registry probing the real `PATH`.
    pub fn registry(&self) -> ToolRegistry {
        self.registry_with(Arc::new(SystemAvailability::detect()))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `true` when `program` is on `PATH`; otherwise logs a skip note.
pub fn require(program: &str) -> bool {
    let present = SystemAvailability::detect_programs([program]).is_available(program);
    if !present {
        eprintln!("skipping: '{program}' is not installed");
    }
    present
}
