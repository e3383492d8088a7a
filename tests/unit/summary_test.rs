//! Inline-vs-reference summary policy.

use pretty_assertions::assert_eq;
use tollgate::summary::{summarize, INLINE_THRESHOLD, PREVIEW_LINES};
use tollgate::util::format_bytes;

use crate::common::TestContext;

fn numbered(n: usize) -> String {
    (0..n).map(|i| format!("item-{i:04}\n")).collect()
}

#[test]
fn test_boundary_exactly_threshold_is_inline() {
    let ctx = TestContext::new();
    let path = ctx.create_file("out.txt", &numbered(INLINE_THRESHOLD));

    let summary = summarize(&path, INLINE_THRESHOLD, b'\n').unwrap();

    assert!(summary.inline);
    assert_eq!(summary.preview_text.lines().count(), INLINE_THRESHOLD);
    assert_eq!(summary.render(), numbered(INLINE_THRESHOLD));
}

#[test]
fn test_boundary_one_over_threshold_is_preview() {
    let ctx = TestContext::new();
    let path = ctx.create_file("out.txt", &numbered(INLINE_THRESHOLD + 1));

    let summary = summarize(&path, INLINE_THRESHOLD + 1, b'\n').unwrap();

    assert!(!summary.inline);
    assert_eq!(summary.preview_text.lines().count(), PREVIEW_LINES);
    assert_eq!(summary.artifact_reference, path);
    let note = summary.retrieval_note().unwrap();
    assert!(note.contains(&path.display().to_string()));
}

#[test]
fn test_preview_is_bounded_for_large_artifacts() {
    let ctx = TestContext::new();
    let path = ctx.create_file("big.txt", &numbered(200_000));

    let summary = summarize(&path, 200_000, b'\n').unwrap();

    assert_eq!(summary.preview_text.lines().count(), PREVIEW_LINES);
    assert!(summary.preview_text.len() < 4096);
    assert!(summary.render().contains("200000 items"));
}

#[test]
fn test_empty_artifact() {
    let ctx = TestContext::new();
    let path = ctx.create_file("empty.txt", "");
    let summary = summarize(&path, 0, b'\n').unwrap();
    assert!(summary.inline);
    assert_eq!(summary.preview_text, "");
    assert_eq!(summary.artifact_bytes, 0);
}

#[test]
fn test_format_bytes_binary_units() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(1024), "1.00 KB");
    assert_eq!(format_bytes(1536), "1.50 KB");
    assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
    assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
}
