//! Structured tool adapters and their registry.
//!
//! Each adapter turns typed parameters into an argv, runs it through the
//! [`BoundedExecutor`], counts records in the output artifact and returns a
//! [`ToolOutcome`] holding a bounded summary. Pattern and path values are
//! always single argv elements; no adapter builds shell text.
//!
//! # Example
//!
//! ```no_run
//! use tollgate::config::Config;
//! use tollgate::tools::{ToolCall, ToolContext, ToolRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let registry = ToolRegistry::new(ToolContext::from_config(&Config::default()));
//! let outcome = registry
//!     .invoke(
//!         ToolCall::new("find_files", serde_json::json!({ "pattern": "*.rs" })),
//!         CancellationToken::new(),
//!     )
//!     .await;
//! println!("{}", outcome.llm_summary);
//! # }
//! ```

pub mod availability;
pub mod find;
pub mod listing;
pub mod query;
pub mod search;
pub mod shell;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use availability::{FixedAvailability, SystemAvailability, ToolAvailability};

use crate::config::Config;
use crate::error::{TollgateError, TollgateResult};
use crate::executor::{read_head, BoundedExecutor, ExecutionResult, ExecutionStatus};
use crate::summary::{self, ResultSummary};
use crate::util::{format_bytes, format_elapsed, pluralize};

/// Bytes of the error artifact quoted in a failure summary.
const ERROR_EXCERPT_BYTES: u64 = 4 * 1024;

/// Default limit for [`ToolRegistry::invoke_all`].
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// A tool request as received from the caller.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }
}

/// Why a tool did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SecurityDenied,
    MalformedParameters,
    SpawnFailure,
    NonZeroExit,
    Cancelled,
    /// Artifact files could not be created or read.
    Storage,
}

impl FailureKind {
    /// `true` for failures detected before any process existed.
    #[must_use]
    pub fn is_pre_execution(self) -> bool {
        matches!(self, Self::SecurityDenied | Self::MalformedParameters)
    }

    /// The failure an execution status represents, if any.
    #[must_use]
    pub fn from_status(status: ExecutionStatus) -> Option<Self> {
        match status {
            ExecutionStatus::Success => None,
            ExecutionStatus::NonZeroExit => Some(Self::NonZeroExit),
            ExecutionStatus::SpawnFailure => Some(Self::SpawnFailure),
            ExecutionStatus::Cancelled => Some(Self::Cancelled),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::SecurityDenied => "security denied",
            Self::MalformedParameters => "malformed parameters",
            Self::SpawnFailure => "spawn failure",
            Self::NonZeroExit => "non-zero exit",
            Self::Cancelled => "cancelled",
            Self::Storage => "storage failure",
        };
        f.write_str(text)
    }
}

/// The uniform result of invoking a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub success: bool,
    pub failure: Option<FailureKind>,
    /// Bounded text for the model.
    pub llm_summary: String,
    /// One line for humans.
    pub display_summary: String,
    pub artifact_path: Option<PathBuf>,
    pub item_count: usize,
    pub inline: bool,
    /// Substitutions and other non-error remarks.
    pub notes: Vec<String>,
    pub execution: Option<ExecutionResult>,
}

impl ToolOutcome {
    fn failed(tool: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            tool: tool.to_string(),
            success: false,
            failure: Some(kind),
            display_summary: format!("{tool}: {kind}"),
            llm_summary: message,
            artifact_path: None,
            item_count: 0,
            inline: true,
            notes: Vec::new(),
            execution: None,
        }
    }

    /// A command rejected by the validator. Nothing was spawned.
    pub fn denied(tool: &str, command: &str, reason: &str) -> Self {
        warn!(tool = %tool, command = %command, reason = %reason, "Security: command denied");
        Self::failed(
            tool,
            FailureKind::SecurityDenied,
            format!("Command denied by security policy: {reason}"),
        )
    }

    /// Parameters rejected before dispatch. Nothing was spawned.
    pub fn malformed(tool: &str, message: &str) -> Self {
        debug!(tool = %tool, message = %message, "Rejected tool parameters");
        Self::failed(
            tool,
            FailureKind::MalformedParameters,
            format!("Invalid parameters for {tool}: {message}"),
        )
    }

    /// Maps a crate error to an outcome.
    pub fn from_error(tool: &str, err: &TollgateError) -> Self {
        match err {
            TollgateError::SecurityDenied { command, reason } => Self::denied(tool, command, reason),
            TollgateError::MalformedParameters { message, .. } => Self::malformed(tool, message),
            other => {
                warn!(tool = %tool, error = %other, "Tool failed before execution");
                let kind = if matches!(other, TollgateError::Storage { .. }) {
                    FailureKind::Storage
                } else {
                    FailureKind::MalformedParameters
                };
                Self::failed(tool, kind, other.to_string())
            }
        }
    }

    /// Outcome of an execution that did not succeed, quoting the head of
    /// the error artifact.
    pub fn from_failed_execution(tool: &str, execution: ExecutionResult) -> Self {
        let kind = FailureKind::from_status(execution.status).unwrap_or(FailureKind::NonZeroExit);
        let excerpt = read_head(&execution.error_path, ERROR_EXCERPT_BYTES).unwrap_or_default();
        let code = execution
            .exit_code
            .map_or_else(String::new, |c| format!(", exit code {c}"));

        let mut llm_summary = format!("{tool} failed ({kind}{code}) running `{}`.", execution.command);
        if !excerpt.trim().is_empty() {
            llm_summary.push_str("\nstderr:\n");
            llm_summary.push_str(excerpt.trim_end());
        }
        if kind == FailureKind::Cancelled && execution.output_size_bytes > 0 {
            llm_summary.push_str(&format!(
                "\nPartial output ({}) kept at {}",
                format_bytes(execution.output_size_bytes),
                execution.output_path.display()
            ));
        }

        Self {
            tool: tool.to_string(),
            success: false,
            failure: Some(kind),
            display_summary: format!(
                "{tool}: {kind}{code} after {}",
                format_elapsed(execution.execution_time_ms)
            ),
            llm_summary,
            artifact_path: Some(execution.output_path.clone()),
            item_count: 0,
            inline: true,
            notes: Vec::new(),
            execution: Some(execution),
        }
    }

    /// Outcome of a successful execution whose artifact holds
    /// `item_count` records ending in `delimiter`.
    pub fn completed(
        tool: &str,
        execution: ExecutionResult,
        item_count: usize,
        delimiter: u8,
        noun: (&str, &str),
        notes: Vec<String>,
    ) -> Self {
        let summary = match summary::summarize(&execution.output_path, item_count, delimiter) {
            Ok(summary) => summary,
            Err(e) => {
                let err = TollgateError::storage(execution.output_path.display().to_string(), e.to_string());
                return Self::from_error(tool, &err);
            }
        };
        Self::from_summary(tool, execution, summary, noun, notes)
    }

    fn from_summary(
        tool: &str,
        execution: ExecutionResult,
        summary: ResultSummary,
        noun: (&str, &str),
        notes: Vec<String>,
    ) -> Self {
        let counted = pluralize(summary.item_count, noun.0, noun.1);
        let mut llm_summary = format!("{counted} ({}).", format_bytes(summary.artifact_bytes));
        push_notes(&mut llm_summary, &notes);
        let body = summary.render();
        if !body.trim().is_empty() {
            llm_summary.push('\n');
            llm_summary.push_str(&body);
        }

        Self {
            tool: tool.to_string(),
            success: true,
            failure: None,
            display_summary: format!(
                "{tool}: {counted}, {} in {}",
                format_bytes(summary.artifact_bytes),
                format_elapsed(execution.execution_time_ms)
            ),
            llm_summary,
            artifact_path: Some(summary.artifact_reference),
            item_count: summary.item_count,
            inline: summary.inline,
            notes,
            execution: Some(execution),
        }
    }

    /// Attaches notes to an outcome built without them, so the model sees
    /// them alongside any failure text.
    #[must_use]
    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        push_notes(&mut self.llm_summary, &notes);
        self.notes.extend(notes);
        self
    }
}

fn push_notes(llm_summary: &mut String, notes: &[String]) {
    for note in notes {
        llm_summary.push_str("\nNote: ");
        llm_summary.push_str(note);
    }
}

/// One prepared tool request.
#[async_trait]
pub trait ToolInvocation: Send + Sync {
    /// What this invocation will do, including any backend substitution.
    fn description(&self) -> String;

    /// Checks parameters without side effects. `Some` is the problem.
    fn validate(&self) -> Option<String>;

    /// Runs the tool. Never called when [`validate`](Self::validate) fails.
    async fn execute(&self, cancel: CancellationToken) -> ToolOutcome;
}

/// Shared dependencies for adapters.
#[derive(Debug, Clone)]
pub struct ToolContext {
    executor: BoundedExecutor,
    working_dir: PathBuf,
    availability: Arc<dyn ToolAvailability>,
}

impl ToolContext {
    pub fn new(
        executor: BoundedExecutor,
        working_dir: impl Into<PathBuf>,
        availability: Arc<dyn ToolAvailability>,
    ) -> Self {
        Self {
            executor,
            working_dir: working_dir.into(),
            availability,
        }
    }

    /// Builds a context from configuration, probing `PATH` once.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BoundedExecutor::new(config.storage_dir()),
            config.working_dir(),
            Arc::new(SystemAvailability::detect()),
        )
    }

    #[must_use]
    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    #[must_use]
    pub fn availability(&self) -> &dyn ToolAvailability {
        self.availability.as_ref()
    }
}

/// Renders a user path as one argv element that cannot be read as an
/// option.
pub(crate) fn path_operand(path: &str) -> String {
    if path.starts_with('-') {
        format!("./{path}")
    } else {
        path.to_string()
    }
}

/// Rejects a negative integer parameter.
pub(crate) fn check_non_negative(name: &str, value: Option<i64>) -> Option<String> {
    match value {
        Some(v) if v < 0 => Some(format!("{name} must be >= 0, got {v}")),
        _ => None,
    }
}

/// Built-in tool names.
pub const TOOL_NAMES: &[&str] = &[
    find::TOOL_NAME,
    search::TOOL_NAME,
    listing::TOOL_NAME,
    query::TOOL_NAME,
    shell::TOOL_NAME,
];

/// Dispatches [`ToolCall`]s to adapters.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    context: ToolContext,
    max_concurrency: usize,
}

impl ToolRegistry {
    pub fn new(context: ToolContext) -> Self {
        Self {
            context,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Parses a call into an invocation.
    ///
    /// # Errors
    ///
    /// Returns [`TollgateError::MalformedParameters`] for an unknown tool or
    /// input that does not match the tool's parameter schema.
    pub fn build(&self, call: &ToolCall) -> TollgateResult<Box<dyn ToolInvocation>> {
        let ctx = self.context.clone();
        let invocation: Box<dyn ToolInvocation> = match call.name.as_str() {
            find::TOOL_NAME => Box::new(find::FindFiles::new(parse(call)?, ctx)),
            search::TOOL_NAME => Box::new(search::Search::new(parse(call)?, ctx)),
            listing::TOOL_NAME => Box::new(listing::ListDirectory::new(parse(call)?, ctx)),
            query::TOOL_NAME => Box::new(query::Query::new(parse(call)?, ctx)),
            shell::TOOL_NAME => Box::new(shell::RunCommand::new(parse(call)?, ctx)),
            other => {
                return Err(TollgateError::malformed_parameters(
                    other,
                    format!("unknown tool; expected one of {}", TOOL_NAMES.join(", ")),
                ))
            }
        };
        Ok(invocation)
    }

    /// Parses, validates and runs one call.
    pub async fn invoke(&self, call: ToolCall, cancel: CancellationToken) -> ToolOutcome {
        let invocation = match self.build(&call) {
            Ok(invocation) => invocation,
            Err(e) => return ToolOutcome::from_error(&call.name, &e),
        };
        if let Some(problem) = invocation.validate() {
            return ToolOutcome::malformed(&call.name, &problem);
        }
        debug!(tool = %call.name, description = %invocation.description(), "Invoking tool");
        invocation.execute(cancel).await
    }

    /// Runs several calls concurrently, bounded by the concurrency limit.
    /// Outcomes are returned in call order.
    pub async fn invoke_all(&self, calls: Vec<ToolCall>, cancel: CancellationToken) -> Vec<ToolOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let futures: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let sem = Arc::clone(&semaphore);
                let cancel = cancel.clone();
                async move {
                    // The semaphore is never closed, so acquire cannot fail.
                    let _permit = sem.acquire().await.ok();
                    self.invoke(call, cancel).await
                }
            })
            .collect();
        futures::future::join_all(futures).await
    }
}

fn parse<T: DeserializeOwned>(call: &ToolCall) -> TollgateResult<T> {
    serde_json::from_value(call.input.clone())
        .map_err(|e| TollgateError::malformed_parameters(&call.name, e.to_string()))
}
