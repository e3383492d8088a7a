//! `search`: regex content search backed by ripgrep.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{check_non_negative, path_operand, ToolContext, ToolInvocation, ToolOutcome};
use crate::error::TollgateError;
use crate::executor::{count_records_where, ExecutionRequest};

pub const TOOL_NAME: &str = "search";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchParams {
    /// Regular expression, or a literal when `fixed_strings` is set.
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Restrict to files matching this glob, e.g. `*.rs`.
    #[serde(default)]
    pub glob: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub fixed_strings: bool,
    #[serde(default)]
    pub context_lines: Option<i64>,
    /// List matching files instead of matching lines.
    #[serde(default)]
    pub files_with_matches: bool,
    /// Stop after this many matches per file.
    #[serde(default)]
    pub max_count: Option<i64>,
}

#[derive(Debug)]
pub struct Search {
    params: SearchParams,
    ctx: ToolContext,
}

impl Search {
    pub fn new(params: SearchParams, ctx: ToolContext) -> Self {
        Self { params, ctx }
    }

    /// The argv passed to `rg`.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let p = &self.params;
        // `--sort path` keeps output order identical between runs.
        let mut argv: Vec<String> = [
            "--no-heading",
            "--with-filename",
            "--line-number",
            "--color",
            "never",
            "--sort",
            "path",
        ]
            .into_iter()
            .map(String::from)
            .collect();
        if p.case_insensitive {
            argv.push("--ignore-case".to_string());
        }
        if p.fixed_strings {
            argv.push("--fixed-strings".to_string());
        }
        if let Some(glob) = &p.glob {
            argv.push("--glob".to_string());
            argv.push(glob.clone());
        }
        if let Some(n) = p.context_lines.filter(|n| *n > 0) {
            argv.push("--context".to_string());
            argv.push(n.to_string());
        }
        if p.files_with_matches {
            argv.push("--files-with-matches".to_string());
        }
        if let Some(n) = p.max_count {
            argv.push("--max-count".to_string());
            argv.push(n.to_string());
        }
        argv.push("--regexp".to_string());
        argv.push(p.pattern.clone());
        argv.push("--".to_string());
        argv.push(path_operand(p.path.as_deref().unwrap_or(".")));
        argv
    }

    fn nouns(&self) -> (&'static str, &'static str) {
        if self.params.files_with_matches {
            ("file", "files")
        } else if self.params.context_lines.is_some_and(|n| n > 0) {
            ("line", "lines")
        } else {
            // One record per matching line, not per match.
            ("matching line", "matching lines")
        }
    }
}

#[async_trait]
impl ToolInvocation for Search {
    fn description(&self) -> String {
        format!(
            "Search for '{}' in {} with ripgrep",
            self.params.pattern,
            self.params.path.as_deref().unwrap_or(".")
        )
    }

    fn validate(&self) -> Option<String> {
        let p = &self.params;
        if p.pattern.is_empty() {
            return Some("pattern must not be empty".to_string());
        }
        if let Some(problem) = check_non_negative("context_lines", p.context_lines) {
            return Some(problem);
        }
        if p.files_with_matches && p.context_lines.is_some_and(|n| n > 0) {
            return Some("files_with_matches and context_lines are mutually exclusive".to_string());
        }
        match p.max_count {
            Some(n) if n < 1 => Some(format!("max_count must be >= 1, got {n}")),
            _ => None,
        }
    }

    async fn execute(&self, cancel: CancellationToken) -> ToolOutcome {
        let request = ExecutionRequest::new("rg")
            .args(self.argv())
            .cwd(self.ctx.working_dir())
            .cancel_token(cancel)
            .label(TOOL_NAME);

        let execution = match self.ctx.executor().execute(request).await {
            Ok(execution) => execution,
            Err(e) => return ToolOutcome::from_error(TOOL_NAME, &e),
        };

        // ripgrep exits 1 when nothing matched.
        let no_matches = execution.exit_code == Some(1);
        if !execution.success() && !no_matches {
            return ToolOutcome::from_failed_execution(TOOL_NAME, execution);
        }

        // Context groups are separated by `--` lines, which are not results.
        match count_records_where(&execution.output_path, b'\n', |line| line != b"--") {
            Ok(count) => ToolOutcome::completed(TOOL_NAME, execution, count, b'\n', self.nouns(), Vec::new()),
            Err(e) => ToolOutcome::from_error(
                TOOL_NAME,
                &TollgateError::storage(execution.output_path.display().to_string(), e.to_string()),
            ),
        }
    }
}
