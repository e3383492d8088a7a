//! `list_directory`: directory listing with `eza`, falling back to `ls`.
//!
//! The backend is chosen once, when the invocation is built, from the
//! context's [`ToolAvailability`](super::ToolAvailability). The `ls`
//! fallback keeps the listing correct and drops what it cannot express.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{check_non_negative, path_operand, ToolContext, ToolInvocation, ToolOutcome};
use crate::error::TollgateError;
use crate::executor::{count_records_where, ExecutionRequest};

pub const TOOL_NAME: &str = "list_directory";

/// Program used to produce the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingBackend {
    Eza,
    Ls,
}

impl ListingBackend {
    /// `eza` when present, otherwise `ls`.
    #[must_use]
    pub fn select(availability: &dyn super::ToolAvailability) -> Self {
        if availability.is_available("eza") {
            Self::Eza
        } else {
            Self::Ls
        }
    }

    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Eza => "eza",
            Self::Ls => "ls",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    Name,
    Size,
    Modified,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDirectoryParams {
    #[serde(default)]
    pub path: Option<String>,
    /// Include hidden entries.
    #[serde(default)]
    pub all: bool,
    /// One entry per line with permissions, size and date.
    #[serde(default)]
    pub long: bool,
    #[serde(default)]
    pub sort: Option<SortMode>,
    /// Recursive tree view (eza only).
    #[serde(default)]
    pub tree: bool,
    /// Tree depth limit. Requires `tree`.
    #[serde(default)]
    pub max_depth: Option<i64>,
}

#[derive(Debug)]
pub struct ListDirectory {
    params: ListDirectoryParams,
    ctx: ToolContext,
    backend: ListingBackend,
}

impl ListDirectory {
    pub fn new(params: ListDirectoryParams, ctx: ToolContext) -> Self {
        let backend = ListingBackend::select(ctx.availability());
        Self {
            params,
            ctx,
            backend,
        }
    }

    #[must_use]
    pub fn backend(&self) -> ListingBackend {
        self.backend
    }

    /// The argv for the selected backend.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        match self.backend {
            ListingBackend::Eza => self.eza_argv(),
            ListingBackend::Ls => self.ls_argv(),
        }
    }

    fn eza_argv(&self) -> Vec<String> {
        let p = &self.params;
        let mut argv = Vec::new();
        if !p.long && !p.tree {
            argv.push("--oneline".to_string());
        }
        if p.all {
            argv.push("--all".to_string());
        }
        if p.long {
            argv.push("--long".to_string());
        }
        if let Some(sort) = p.sort {
            let key = match sort {
                SortMode::Name => "name",
                SortMode::Size => "size",
                SortMode::Modified => "modified",
            };
            argv.push(format!("--sort={key}"));
        }
        if p.tree {
            argv.push("--tree".to_string());
            if let Some(depth) = p.max_depth {
                argv.push(format!("--level={depth}"));
            }
        }
        argv.push("--color=never".to_string());
        argv.push("--".to_string());
        argv.push(path_operand(p.path.as_deref().unwrap_or(".")));
        argv
    }

    fn ls_argv(&self) -> Vec<String> {
        let p = &self.params;
        let mut argv = vec![if p.long { "-l" } else { "-1" }.to_string()];
        if p.all {
            argv.push("-A".to_string());
        }
        match p.sort {
            Some(SortMode::Size) => argv.push("-S".to_string()),
            Some(SortMode::Modified) => argv.push("-t".to_string()),
            Some(SortMode::Name) | None => {}
        }
        argv.push("--".to_string());
        argv.push(path_operand(p.path.as_deref().unwrap_or(".")));
        argv
    }

    /// Remarks about flags the fallback could not honour.
    fn substitution_notes(&self) -> Vec<String> {
        if self.backend != ListingBackend::Ls {
            return Vec::new();
        }
        let mut notes = vec!["eza is not installed; listed with ls instead".to_string()];
        if self.params.tree {
            notes.push("tree view is not available with ls; showing the top level only".to_string());
        }
        notes
    }

    /// Whether an output line is a listed entry rather than a header.
    fn is_entry(&self, line: &[u8]) -> bool {
        if line.is_empty() {
            return false;
        }
        match self.backend {
            ListingBackend::Ls => !(self.params.long && line.starts_with(b"total ")),
            ListingBackend::Eza => true,
        }
    }
}

#[async_trait]
impl ToolInvocation for ListDirectory {
    fn description(&self) -> String {
        let path = self.params.path.as_deref().unwrap_or(".");
        match self.backend {
            ListingBackend::Eza => format!("List {path} with eza"),
            ListingBackend::Ls => format!("List {path} with ls (eza unavailable)"),
        }
    }

    fn validate(&self) -> Option<String> {
        let p = &self.params;
        if let Some(problem) = check_non_negative("max_depth", p.max_depth) {
            return Some(problem);
        }
        if p.max_depth.is_some() && !p.tree {
            return Some("max_depth requires tree".to_string());
        }
        None
    }

    async fn execute(&self, cancel: CancellationToken) -> ToolOutcome {
        let notes = self.substitution_notes();
        if !notes.is_empty() {
            info!(tool = TOOL_NAME, notes = ?notes, "Using fallback listing backend");
        }

        let request = ExecutionRequest::new(self.backend.program())
            .args(self.argv())
            .cwd(self.ctx.working_dir())
            .cancel_token(cancel)
            .label(TOOL_NAME);

        let execution = match self.ctx.executor().execute(request).await {
            Ok(execution) => execution,
            Err(e) => return ToolOutcome::from_error(TOOL_NAME, &e),
        };
        if !execution.success() {
            return ToolOutcome::from_failed_execution(TOOL_NAME, execution).with_notes(notes);
        }

        let mut first = true;
        let skip_root = self.backend == ListingBackend::Eza && self.params.tree;
        let counted = count_records_where(&execution.output_path, b'\n', |line| {
            // eza's tree view starts with the root directory itself.
            let is_root = skip_root && std::mem::take(&mut first);
            !is_root && self.is_entry(line)
        });

        match counted {
            Ok(count) => ToolOutcome::completed(TOOL_NAME, execution, count, b'\n', ("entry", "entries"), notes),
            Err(e) => ToolOutcome::from_error(
                TOOL_NAME,
                &TollgateError::storage(execution.output_path.display().to_string(), e.to_string()),
            ),
        }
    }
}
