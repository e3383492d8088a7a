//! `find_files`: name-pattern file search backed by `find -print0`.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_non_negative, path_operand, ToolContext, ToolInvocation, ToolOutcome};
use crate::executor::{count_delimited, ExecutionRequest};

pub const TOOL_NAME: &str = "find_files";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindFilesParams {
    /// Shell glob matched against entry names, e.g. `*.rs`.
    pub pattern: String,
    /// Directory to search. Defaults to the working directory.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max_depth: Option<i64>,
    /// `file` or `directory`.
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
}

#[derive(Debug)]
pub struct FindFiles {
    params: FindFilesParams,
    ctx: ToolContext,
}

impl FindFiles {
    pub fn new(params: FindFilesParams, ctx: ToolContext) -> Self {
        Self { params, ctx }
    }

    /// The argv passed to `find`.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let p = &self.params;
        let mut argv = vec![path_operand(p.path.as_deref().unwrap_or("."))];
        if let Some(depth) = p.max_depth {
            argv.push("-maxdepth".to_string());
            argv.push(depth.to_string());
        }
        match p.file_type.as_deref() {
            Some("file") => argv.extend(["-type".to_string(), "f".to_string()]),
            Some("directory") => argv.extend(["-type".to_string(), "d".to_string()]),
            _ => {}
        }
        argv.push(if p.case_insensitive { "-iname" } else { "-name" }.to_string());
        argv.push(p.pattern.clone());
        argv.push("-print0".to_string());
        argv
    }
}

#[async_trait]
impl ToolInvocation for FindFiles {
    fn description(&self) -> String {
        format!(
            "Find entries named '{}' under {}",
            self.params.pattern,
            self.params.path.as_deref().unwrap_or(".")
        )
    }

    fn validate(&self) -> Option<String> {
        let p = &self.params;
        if p.pattern.trim().is_empty() {
            return Some("pattern must not be empty".to_string());
        }
        if let Some(problem) = check_non_negative("max_depth", p.max_depth) {
            return Some(problem);
        }
        match p.file_type.as_deref() {
            None | Some("file") | Some("directory") => None,
            Some(other) => Some(format!(
                "file_type must be 'file' or 'directory', got '{other}'"
            )),
        }
    }

    async fn execute(&self, cancel: CancellationToken) -> ToolOutcome {
        let request = ExecutionRequest::new("find")
            .args(self.argv())
            .cwd(self.ctx.working_dir())
            .cancel_token(cancel)
            .label(TOOL_NAME);

        let execution = match self.ctx.executor().execute(request).await {
            Ok(execution) => execution,
            Err(e) => return ToolOutcome::from_error(TOOL_NAME, &e),
        };

        // find exits 1 when some directories were unreadable but still
        // reports everything it could reach.
        let partial = execution.exit_code == Some(1) && execution.output_size_bytes > 0;
        if !execution.success() && !partial {
            return ToolOutcome::from_failed_execution(TOOL_NAME, execution);
        }

        let count = match count_delimited(&execution.output_path, b'\0') {
            Ok(count) => count,
            Err(e) => {
                let err = crate::error::TollgateError::storage(
                    execution.output_path.display().to_string(),
                    e.to_string(),
                );
                return ToolOutcome::from_error(TOOL_NAME, &err);
            }
        };
        debug!(count, "find_files counted entries");

        let mut notes = Vec::new();
        if partial {
            notes.push(format!(
                "some paths could not be read; see {}",
                execution.error_path.display()
            ));
        }
        ToolOutcome::completed(TOOL_NAME, execution, count, b'\0', ("entry", "entries"), notes)
    }
}
