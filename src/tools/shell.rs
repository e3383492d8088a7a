//! `run_command`: validated raw shell text.
//!
//! The text must pass [`security::validate`]. Only then is it handed,
//! unchanged, to the platform shell through the bounded executor.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{ToolContext, ToolInvocation, ToolOutcome};
use crate::error::TollgateError;
use crate::executor::count_delimited;
use crate::security;
use crate::shell::ShellConfig;

pub const TOOL_NAME: &str = "run_command";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunCommandParams {
    pub command: String,
}

#[derive(Debug)]
pub struct RunCommand {
    params: RunCommandParams,
    ctx: ToolContext,
    shell: ShellConfig,
}

impl RunCommand {
    pub fn new(params: RunCommandParams, ctx: ToolContext) -> Self {
        Self {
            params,
            ctx,
            shell: ShellConfig::default(),
        }
    }

    #[must_use]
    pub fn with_shell(mut self, shell: ShellConfig) -> Self {
        self.shell = shell;
        self
    }
}

#[async_trait]
impl ToolInvocation for RunCommand {
    fn description(&self) -> String {
        format!("Run read-only command: {}", self.params.command)
    }

    fn validate(&self) -> Option<String> {
        if self.params.command.trim().is_empty() {
            return Some("command must not be empty".to_string());
        }
        None
    }

    async fn execute(&self, cancel: CancellationToken) -> ToolOutcome {
        let command = &self.params.command;
        let verdict = security::validate(command);
        if !verdict.is_allowed() {
            let reason = verdict.denial_reason().unwrap_or("command denied");
            return ToolOutcome::denied(TOOL_NAME, command, reason);
        }

        let request = self
            .shell
            .request(command)
            .cwd(self.ctx.working_dir())
            .cancel_token(cancel);
        let execution = match self.ctx.executor().execute(request).await {
            Ok(execution) => execution,
            Err(e) => return ToolOutcome::from_error(TOOL_NAME, &e),
        };
        if !execution.success() {
            return ToolOutcome::from_failed_execution(TOOL_NAME, execution);
        }

        let count = match count_delimited(&execution.output_path, b'\n') {
            Ok(count) => count,
            Err(e) => {
                let err = TollgateError::storage(execution.output_path.display().to_string(), e.to_string());
                return ToolOutcome::from_error(TOOL_NAME, &err);
            }
        };
        let notes = verdict.warnings().iter().map(ToString::to_string).collect();
        ToolOutcome::completed(TOOL_NAME, execution, count, b'\n', ("line", "lines"), notes)
    }
}
