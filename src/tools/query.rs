//! `query`: structured-data queries with `jq`.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{path_operand, ToolContext, ToolInvocation, ToolOutcome};
use crate::error::TollgateError;
use crate::executor::{count_delimited, ExecutionRequest};

pub const TOOL_NAME: &str = "query";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryParams {
    /// jq filter, e.g. `.dependencies | keys[]`.
    pub filter: String,
    /// JSON file to query.
    pub file: String,
    /// Print strings without JSON quoting.
    #[serde(default)]
    pub raw_output: bool,
    /// One result per line.
    #[serde(default = "default_compact")]
    pub compact: bool,
    /// Read all inputs into one array.
    #[serde(default)]
    pub slurp: bool,
}

fn default_compact() -> bool {
    true
}

#[derive(Debug)]
pub struct Query {
    params: QueryParams,
    ctx: ToolContext,
}

impl Query {
    pub fn new(params: QueryParams, ctx: ToolContext) -> Self {
        Self { params, ctx }
    }

    /// The argv passed to `jq`.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let p = &self.params;
        let mut argv = Vec::new();
        if p.raw_output {
            argv.push("--raw-output".to_string());
        }
        if p.compact {
            argv.push("--compact-output".to_string());
        }
        if p.slurp {
            argv.push("--slurp".to_string());
        }
        argv.push(p.filter.clone());
        argv.push(path_operand(&p.file));
        argv
    }
}

#[async_trait]
impl ToolInvocation for Query {
    fn description(&self) -> String {
        format!("Query {} with jq filter '{}'", self.params.file, self.params.filter)
    }

    fn validate(&self) -> Option<String> {
        let p = &self.params;
        if p.filter.trim().is_empty() {
            return Some("filter must not be empty".to_string());
        }
        if p.filter.starts_with('-') {
            return Some("filter must not start with '-'".to_string());
        }
        if p.file.trim().is_empty() {
            return Some("file must not be empty".to_string());
        }
        None
    }

    async fn execute(&self, cancel: CancellationToken) -> ToolOutcome {
        let request = ExecutionRequest::new("jq")
            .args(self.argv())
            .cwd(self.ctx.working_dir())
            .cancel_token(cancel)
            .label(TOOL_NAME);

        let execution = match self.ctx.executor().execute(request).await {
            Ok(execution) => execution,
            Err(e) => return ToolOutcome::from_error(TOOL_NAME, &e),
        };
        if !execution.success() {
            return ToolOutcome::from_failed_execution(TOOL_NAME, execution);
        }

        let noun = if self.params.compact {
            ("result", "results")
        } else {
            ("line", "lines")
        };
        match count_delimited(&execution.output_path, b'\n') {
            Ok(count) => ToolOutcome::completed(TOOL_NAME, execution, count, b'\n', noun, Vec::new()),
            Err(e) => ToolOutcome::from_error(
                TOOL_NAME,
                &TollgateError::storage(execution.output_path.display().to_string(), e.to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::BoundedExecutor;
    use crate::tools::FixedAvailability;
    use std::sync::Arc;

    fn tool(params: serde_json::Value) -> Query {
        let ctx = ToolContext::new(
            BoundedExecutor::new(std::env::temp_dir().join("tollgate-test-artifacts")),
            ".",
            Arc::new(FixedAvailability::new(["jq"])),
        );
        Query::new(serde_json::from_value(params).unwrap(), ctx)
    }

    #[test]
    fn test_argv_defaults_to_compact() {
        let t = tool(serde_json::json!({ "filter": ".name", "file": "package.json" }));
        assert_eq!(t.argv(), ["--compact-output", ".name", "package.json"]);
    }

    #[test]
    fn test_argv_options() {
        let t = tool(serde_json::json!({
            "filter": ".[]",
            "file": "-data.json",
            "raw_output": true,
            "compact": false,
            "slurp": true
        }));
        assert_eq!(t.argv(), ["--raw-output", "--slurp", ".[]", "./-data.json"]);
    }

    #[test]
    fn test_validation() {
        assert!(tool(serde_json::json!({ "filter": "", "file": "a.json" })).validate().is_some());
        assert!(tool(serde_json::json!({ "filter": "--arg", "file": "a.json" }))
            .validate()
            .is_some());
        assert!(tool(serde_json::json!({ "filter": ".", "file": " " })).validate().is_some());
        assert!(tool(serde_json::json!({ "filter": ".", "file": "a.json" })).validate().is_none());
    }

    #[test]
    fn test_missing_file_field_is_schema_error() {
        let parsed: Result<QueryParams, _> = serde_json::from_value(serde_json::json!({ "filter": "." }));
        assert!(parsed.is_err());
    }
}
