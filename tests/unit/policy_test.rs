//! File and URL policy through a session context.

use tollgate::config::FileSettings;
use tollgate::policy::{FilePolicy, SessionContext, UrlPolicy};

use crate::common::TestContext;

#[test]
fn test_read_then_edit_workflow() {
    let ctx = TestContext::new();
    ctx.create_file("src/main.rs", "fn main() {}");
    let policy = FilePolicy::new(ctx.workspace(), FileSettings::default());
    let session = SessionContext::new();

    let err = policy.check_edit("src/main.rs", session.access()).unwrap_err();
    assert_eq!(err.category(), "policy");

    policy.record_read("src/main.rs", session.access()).unwrap();
    let resolved = policy.check_edit("src/../src/main.rs", session.access()).unwrap();
    assert_eq!(resolved, ctx.workspace().join("src/main.rs"));

    session.reset();
    assert!(policy.check_edit("src/main.rs", session.access()).is_err());
}

#[test]
fn test_absolute_and_relative_spellings_agree() {
    let ctx = TestContext::new();
    let file = ctx.create_file("notes.md", "x");
    let policy = FilePolicy::new(ctx.workspace(), FileSettings::default());
    let session = SessionContext::new();

    policy
        .record_read(&file.display().to_string(), session.access())
        .unwrap();
    assert!(policy.check_edit("notes.md", session.access()).is_ok());
}

#[test]
fn test_new_file_exempt_from_read_requirement() {
    let ctx = TestContext::new();
    let policy = FilePolicy::new(ctx.workspace(), FileSettings::default());
    let session = SessionContext::new();
    assert!(policy.check_edit("fresh.rs", session.access()).is_ok());
    assert!(policy.check_create("fresh.rs").is_ok());
}

#[test]
fn test_default_protected_paths() {
    let ctx = TestContext::new();
    let policy = FilePolicy::new(ctx.workspace(), FileSettings::default());
    #[cfg(unix)]
    assert!(policy.check_create("/etc/tollgate-test.conf").is_err());
    #[cfg(windows)]
    assert!(policy.check_create(r"C:\Windows\tollgate-test.ini").is_err());
}

#[test]
fn test_url_policy_with_session() {
    let session = SessionContext::new();
    let policy = UrlPolicy::new(&[]).unwrap();

    assert!(policy.check("https://docs.rs/tokio", &session).is_ok());
    assert!(policy.check("https://paste.example.org/abc", &session).is_err());

    session.add_user_url("https://paste.example.org/abc");
    assert!(policy.check("https://paste.example.org/abc", &session).is_ok());
}
