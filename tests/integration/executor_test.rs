//! Bounded executor: streaming to disk, failures and cancellation.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tollgate::executor::{count_delimited, ExecutionRequest, ExecutionStatus};

use crate::common::TestContext;

#[cfg(unix)]
#[tokio::test]
async fn test_cancellation_keeps_partial_output() {
    let ctx = TestContext::new();
    let executor = ctx.executor();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = executor
        .execute(
            ExecutionRequest::new("sh")
                .args(["-c", "echo started; sleep 30"])
                .cancel_token(token),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(!result.success());
    assert!(result.exit_code.is_none());
    let partial = std::fs::read_to_string(&result.output_path).unwrap();
    assert_eq!(partial, "started\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancellation_reaches_grandchildren() {
    let ctx = TestContext::new();
    let executor = ctx.executor();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = executor
        .execute(
            ExecutionRequest::new("sh")
                .args(["-c", "(sleep 1; echo late) & wait"])
                .cancel_token(token),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));

    // An orphaned subshell would still append after its sleep.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let output = std::fs::read_to_string(&result.output_path).unwrap();
    assert!(!output.contains("late"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_large_output_is_streamed_to_disk() {
    let ctx = TestContext::new();
    let result = ctx
        .executor()
        .execute(ExecutionRequest::new("sh").args(["-c", "seq 1 200000"]))
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(count_delimited(&result.output_path, b'\n').unwrap(), 200_000);
    assert_eq!(
        result.output_size_bytes,
        std::fs::metadata(&result.output_path).unwrap().len()
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_zero_exit_keeps_stderr() {
    let ctx = TestContext::new();
    let result = ctx
        .executor()
        .execute(ExecutionRequest::new("sh").args(["-c", "echo boom >&2; exit 3"]))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::NonZeroExit);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(std::fs::read_to_string(&result.error_path).unwrap(), "boom\n");
}

#[tokio::test]
async fn test_spawn_failure_still_writes_artifacts() {
    let ctx = TestContext::new();
    let result = ctx
        .executor()
        .execute(ExecutionRequest::new("tollgate-no-such-program-xyz"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::SpawnFailure);
    assert!(result.output_path.exists());
    let stderr = std::fs::read_to_string(&result.error_path).unwrap();
    assert!(stderr.contains("tollgate-no-such-program-xyz"));
}

#[tokio::test]
async fn test_concurrent_executions_get_distinct_artifacts() {
    let ctx = TestContext::new();
    let executor = ctx.executor();

    let runs = (0..8).map(|_| {
        executor.execute(ExecutionRequest::new("sh").args(["-c", "echo same"]).label("dup"))
    });
    let results = futures::future::join_all(runs).await;

    let mut paths: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().output_path)
        .collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 8);
}
