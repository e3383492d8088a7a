//! Tollgate - command-safety validation and bounded-output tool execution.
//!
//! Two contracts are exposed to an agent loop:
//!
//! - [`security::validate`] decides whether raw shell text is read-only
//!   before anything is spawned.
//! - [`tools::ToolRegistry`] runs structured search, listing and query
//!   requests with output streamed to disk and returns bounded summaries.
//!
//! [`policy`] adds the companion gate for file edits and URL fetches.

pub mod config;
pub mod error;
pub mod executor;
pub mod policy;
pub mod security;
pub mod shell;
pub mod summary;
pub mod tools;
pub mod util;

// Re-export core types for convenient access
pub use config::Config;
pub use error::{TollgateError, TollgateResult};
pub use security::{validate, SecurityVerdict};
pub use tools::{ToolCall, ToolOutcome, ToolRegistry};
