//! Tool registry end to end: counts, summaries, fallbacks and denials.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tollgate::summary::{INLINE_THRESHOLD, PREVIEW_LINES};
use tollgate::tools::{FailureKind, FixedAvailability, ToolCall};
use tracing_test::traced_test;
use walkdir::WalkDir;

use crate::common::{require, TestContext};

fn populate(ctx: &TestContext, count: usize) {
    for i in 0..count {
        ctx.create_file(&format!("dir{}/file{i:03}.txt", i % 7), "x");
    }
    ctx.create_file("README.md", "# readme");
}

// =============================================================================
// find_files
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_find_count_matches_filesystem() {
    let ctx = TestContext::new();
    populate(&ctx, 137);

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("find_files", json!({ "pattern": "*.txt", "file_type": "file" })),
            CancellationToken::new(),
        )
        .await;

    let expected = WalkDir::new(ctx.workspace())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".txt"))
        .count();

    assert!(outcome.success, "{}", outcome.llm_summary);
    assert_eq!(outcome.item_count, expected);
    assert!(!outcome.inline);
    assert!(outcome.llm_summary.contains("137 entries"));
    assert!(outcome.artifact_path.unwrap().starts_with(ctx.artifacts()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_find_inline_boundary() {
    for (count, inline) in [(INLINE_THRESHOLD, true), (INLINE_THRESHOLD + 1, false)] {
        let ctx = TestContext::new();
        populate(&ctx, count);

        let outcome = ctx
            .registry()
            .invoke(
                ToolCall::new("find_files", json!({ "pattern": "*.txt" })),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.item_count, count);
        assert_eq!(outcome.inline, inline, "count {count}");
        let listed = outcome
            .llm_summary
            .lines()
            .filter(|l| l.ends_with(".txt"))
            .count();
        assert_eq!(listed, if inline { count } else { PREVIEW_LINES });
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_find_pattern_is_never_shell_text() {
    let ctx = TestContext::new();
    let marker = ctx.path().join("pwned");
    let pattern = format!("*.txt; touch {}", marker.display());

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("find_files", json!({ "pattern": pattern })),
            CancellationToken::new(),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.item_count, 0);
    assert!(!marker.exists());
}

// =============================================================================
// search
// =============================================================================

#[tokio::test]
async fn test_search_is_idempotent() {
    if !require("rg") {
        return;
    }
    let ctx = TestContext::new();
    for i in 0..60 {
        ctx.create_file(&format!("src/m{i:02}.rs"), "fn needle() {}\nfn other() {}\n");
    }
    let registry = ctx.registry();
    let call = ToolCall::new("search", json!({ "pattern": "needle", "path": "src" }));

    let first = registry.invoke(call.clone(), CancellationToken::new()).await;
    let second = registry.invoke(call, CancellationToken::new()).await;

    assert!(first.success, "{}", first.llm_summary);
    assert_eq!(first.item_count, 60);
    assert_eq!(first.item_count, second.item_count);
    assert_ne!(first.artifact_path, second.artifact_path);

    let preview = |text: &str| -> Vec<String> {
        text.lines()
            .filter(|l| l.contains("needle"))
            .map(str::to_string)
            .collect()
    };
    let first_preview = preview(&first.llm_summary);
    assert_eq!(first_preview.len(), PREVIEW_LINES);
    assert!(first_preview[0].starts_with("src/m00.rs:1:"), "{}", first_preview[0]);
    assert_eq!(first_preview, preview(&second.llm_summary));
}

#[tokio::test]
async fn test_search_without_matches_is_success() {
    if !require("rg") {
        return;
    }
    let ctx = TestContext::new();
    ctx.create_file("a.txt", "hay\n");

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("search", json!({ "pattern": "needle" })),
            CancellationToken::new(),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.item_count, 0);
    assert!(outcome.inline);
}

// =============================================================================
// list_directory
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_listing_falls_back_to_ls() {
    let ctx = TestContext::new();
    for name in ["a.rs", "b.rs", "c.rs"] {
        ctx.create_file(name, "");
    }
    let registry = ctx.registry_with(Arc::new(FixedAvailability::new(["ls", "find"])));

    let outcome = registry
        .invoke(
            ToolCall::new("list_directory", json!({ "path": ".", "sort": "name" })),
            CancellationToken::new(),
        )
        .await;

    assert!(outcome.success, "{}", outcome.llm_summary);
    assert_eq!(outcome.item_count, 3);
    assert!(outcome.notes.iter().any(|n| n.contains("eza is not installed")));
    assert!(outcome.llm_summary.contains("Note: eza is not installed"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_listing_fallback_note_survives_failure() {
    let ctx = TestContext::new();
    let registry = ctx.registry_with(Arc::new(FixedAvailability::new(["ls"])));

    let outcome = registry
        .invoke(
            ToolCall::new("list_directory", json!({ "path": "no-such-dir" })),
            CancellationToken::new(),
        )
        .await;

    assert!(!outcome.success);
    assert!(outcome.notes.iter().any(|n| n.contains("eza is not installed")));
    assert!(outcome.llm_summary.contains("Note: eza is not installed"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_listing_long_format_ignores_total_line() {
    let ctx = TestContext::new();
    for name in ["a.rs", "b.rs"] {
        ctx.create_file(name, "content");
    }
    let registry = ctx.registry_with(Arc::new(FixedAvailability::new(["ls"])));

    let outcome = registry
        .invoke(
            ToolCall::new("list_directory", json!({ "long": true })),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.item_count, 2);
}

#[tokio::test]
async fn test_listing_with_eza() {
    if !require("eza") {
        return;
    }
    let ctx = TestContext::new();
    for name in ["a.rs", "b.rs", "c.rs", "d.rs"] {
        ctx.create_file(name, "");
    }

    let outcome = ctx
        .registry()
        .invoke(ToolCall::new("list_directory", json!({})), CancellationToken::new())
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.item_count, 4);
    assert!(outcome.notes.is_empty());
}

// =============================================================================
// query
// =============================================================================

#[tokio::test]
async fn test_query_counts_output_lines() {
    if !require("jq") {
        return;
    }
    let ctx = TestContext::new();
    ctx.create_file("data.json", r#"{"items": [{"id": 1}, {"id": 2}, {"id": 3}]}"#);

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("query", json!({ "filter": ".items[].id", "file": "data.json" })),
            CancellationToken::new(),
        )
        .await;

    assert!(outcome.success, "{}", outcome.llm_summary);
    assert_eq!(outcome.item_count, 3);
    assert!(outcome.inline);
}

#[tokio::test]
async fn test_query_invalid_filter_reports_stderr() {
    if !require("jq") {
        return;
    }
    let ctx = TestContext::new();
    ctx.create_file("data.json", "{}");

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("query", json!({ "filter": ".[[[", "file": "data.json" })),
            CancellationToken::new(),
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::NonZeroExit));
}

// =============================================================================
// run_command
// =============================================================================

#[tokio::test]
#[traced_test]
async fn test_denied_command_spawns_nothing() {
    let ctx = TestContext::new();
    let victim = ctx.create_file("keep.txt", "data");

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("run_command", json!({ "command": "cat keep.txt && rm keep.txt" })),
            CancellationToken::new(),
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::SecurityDenied));
    assert!(outcome.execution.is_none());
    assert!(outcome.artifact_path.is_none());
    assert!(victim.exists());
    assert!(!ctx.artifacts().exists() || std::fs::read_dir(ctx.artifacts()).unwrap().count() == 0);
    assert!(logs_contain("Security: command denied"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_allowed_command_runs_in_workspace() {
    let ctx = TestContext::new();
    ctx.create_file("notes.txt", "one\ntwo\nthree\n");

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("run_command", json!({ "command": "cat notes.txt | wc -l" })),
            CancellationToken::new(),
        )
        .await;

    assert!(outcome.success, "{}", outcome.llm_summary);
    assert_eq!(outcome.item_count, 1);
    assert!(outcome.llm_summary.contains('3'));
}

#[cfg(unix)]
#[tokio::test]
async fn test_warnings_become_notes() {
    let ctx = TestContext::new();
    ctx.create_file("a.txt", "needle\n");

    let outcome = ctx
        .registry()
        .invoke(
            ToolCall::new("run_command", json!({ "command": "egrep needle a.txt" })),
            CancellationToken::new(),
        )
        .await;

    assert!(!outcome.notes.is_empty());
}

// =============================================================================
// invoke_all
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_invoke_all_preserves_order() {
    let ctx = TestContext::new();
    populate(&ctx, 5);
    let registry = ctx.registry().with_max_concurrency(2);

    let outcomes = registry
        .invoke_all(
            vec![
                ToolCall::new("find_files", json!({ "pattern": "*.txt" })),
                ToolCall::new("run_command", json!({ "command": "rm -rf dir0" })),
                ToolCall::new("teleport", json!({})),
                ToolCall::new("run_command", json!({ "command": "pwd" })),
            ],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0].item_count, 5);
    assert_eq!(outcomes[1].failure, Some(FailureKind::SecurityDenied));
    assert_eq!(outcomes[2].failure, Some(FailureKind::MalformedParameters));
    assert!(outcomes[3].success);
    assert!(ctx.workspace().join("dir0").exists());
}
