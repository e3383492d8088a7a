//! Validator behaviour through the public API.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tollgate::security::{split_segments, validate, WarningKind};

fn allowed(cmd: &str) -> bool {
    validate(cmd).is_allowed()
}

// =============================================================================
// Allow-list and per-command rules
// =============================================================================

#[test]
fn test_read_only_commands_allowed() {
    for cmd in [
        "ls -la",
        "cat README.md",
        "head -n 20 src/lib.rs",
        "wc -l src/*.rs",
        "git log --oneline -5",
        "git diff --stat HEAD~1",
        "git show HEAD:Cargo.toml",
        "rg -n TODO src",
        "jq '.name' package.json",
        "pwd",
        "echo 'a && b'",
    ] {
        assert!(allowed(cmd), "expected allowed: {cmd}");
    }
}

#[test]
fn test_mutating_commands_denied() {
    for cmd in [
        "rm -rf target",
        "mv a b",
        "cp a b",
        "chmod +x run.sh",
        "touch x",
        "mkdir out",
        "sudo ls",
        "git commit -am wip",
        "git push --force",
        "git checkout -- .",
        "git reset --hard",
        "git branch -D main",
        "git branch --move a b",
        "git remote remove origin",
        "git remote set-url origin x",
        "git remote prune origin",
        "find . -type f -exec rm {} +",
        "find . -fprint out.txt",
        "sed --in-place 's/a/b/' f",
        "awk '{ system(\"id\") }' f",
        "xargs rm",
        "npm install",
    ] {
        let verdict = validate(cmd);
        assert!(!verdict.is_allowed(), "expected denied: {cmd}");
        assert!(verdict.denial_reason().is_some_and(|r| !r.is_empty()));
    }
}

#[test]
fn test_chained_commands_require_every_segment() {
    assert!(allowed("git status && git log -1 || pwd; ls | wc -l"));
    assert!(!allowed("git status && git push"));
    assert!(!allowed("ls | tee out.txt"));
    assert!(!allowed("ls; rm -rf /"));
}

#[test]
fn test_operators_inside_quotes_do_not_split() {
    assert!(allowed("grep 'a;rm -rf /' file.txt"));
    assert!(allowed("echo \"x | rm y\""));
    assert!(allowed(r"echo a\;rm"));
}

#[test]
fn test_write_redirection() {
    assert!(!allowed("curl http://example.com > out.txt"));
    assert!(!allowed("ls >> listing.txt"));
    assert!(!allowed("ls 2> errors.txt"));
    assert!(!allowed("ls &> all.txt"));
    assert!(!allowed("ls >| clobber.txt"));
    assert!(allowed("ls 2>/dev/null"));
    assert!(allowed("ls missing 2>&1 | head -3"));
}

#[test]
fn test_quoted_operator_does_not_hide_next_argument() {
    assert!(!allowed("find . '>' -delete"));
    assert!(!allowed("sed 's/a/b/' '<' -i file.txt"));
    assert!(!allowed("git diff '2>' --output=patch.diff"));
}

#[test]
fn test_expansions_denied() {
    for cmd in [
        "find . ${X:+-delete}",
        "find . $'-delete'",
        "find . {-delete,-print}",
        "bash -c 'find . ${X:+-delete}'",
        "bash -c \"find . {-delete,-print}\"",
        "echo $HOME",
    ] {
        assert!(!allowed(cmd), "expected denied: {cmd}");
    }
    assert!(allowed("echo '$HOME'"));
}

#[test]
fn test_abbreviated_long_options_denied() {
    for cmd in [
        "sed --in-pl 's/a/b/' f",
        "sort --out=x in",
        "sort --compress-prog=sh in",
        "git diff --outp=x",
        "git grep --open-files-in-pager=vim foo",
        "git grep -Ovim foo",
        "git --exec-path=/tmp log",
    ] {
        assert!(!allowed(cmd), "expected denied: {cmd}");
    }
}

#[test]
fn test_warning_kinds() {
    let verdict = validate("egrep -n foo src/lib.rs");
    assert!(verdict.is_allowed());
    assert_eq!(verdict.warnings()[0].kind(), WarningKind::Deprecated);

    let verdict = validate("find . -name '*.rs'");
    assert!(verdict.is_allowed());
    assert_eq!(verdict.warnings()[0].kind(), WarningKind::Suboptimal);
    assert!(verdict.warnings()[0].suggested_alternative().contains("find_files"));

    assert!(validate("git status").warnings().is_empty());
}

#[test]
fn test_verdict_serializes() {
    let json = serde_json::to_value(validate("rm x")).unwrap();
    assert_eq!(json["allowed"], serde_json::json!(false));
    assert!(json["denial_reason"].as_str().unwrap().contains("rm"));
}

// =============================================================================
// Properties
// =============================================================================

/// A command prefix and a flag that makes it unsafe, spelled with varied
/// quoting so the flag only appears after quote removal.
fn forbidden_flag() -> impl Strategy<Value = (&'static str, String)> {
    let flags = prop::sample::select(vec![
        ("find .", "-delete"),
        ("find .", "-fprint"),
        ("sed 's/a/b/'", "-i"),
        ("sed 's/a/b/'", "--in-place"),
        ("sort in", "-o"),
        ("git diff", "--output=p"),
        ("fd .", "-x"),
        ("rg foo", "--pre"),
    ]);
    (flags, 0usize..4).prop_map(|((base, flag), quoting)| {
        let flag = match quoting {
            0 => flag.to_string(),
            1 => format!("'{flag}'"),
            2 => format!("\"{flag}\""),
            _ => format!("{}'{}'", &flag[..2], &flag[2..]),
        };
        (base, flag)
    })
}

proptest! {
    #[test]
    fn prop_substitution_always_denied(
        prefix in "[a-z ]{0,12}",
        inner in "[a-z ]{0,12}",
        form in 0usize..4,
    ) {
        let sub = match form {
            0 => format!("$({inner})"),
            1 => format!("`{inner}`"),
            2 => format!("<({inner})"),
            _ => format!(">({inner})"),
        };
        let cmd = format!("echo {prefix}{sub}");
        prop_assert!(!validate(&cmd).is_allowed(), "allowed: {}", cmd);
    }

    #[test]
    fn prop_quoted_separators_never_split(text in "[a-z;|& ]{0,24}") {
        let cmd = format!("echo '{text}'");
        let segments = split_segments(&cmd).unwrap();
        prop_assert_eq!(segments.len(), 1);
    }

    #[test]
    fn prop_quoted_operator_before_forbidden_flag_denied(
        (base, flag) in forbidden_flag(),
        op in prop::sample::select(vec![">", "<", "2>", ">>", "&>", "<>"]),
        quoting in 0usize..3,
    ) {
        let op = match quoting {
            0 => format!("'{op}'"),
            1 => format!("\"{op}\""),
            _ => op.chars().map(|c| format!("\\{c}")).collect(),
        };
        let cmd = format!("{base} {op} {flag} x");
        prop_assert!(!allowed(&cmd), "allowed: {}", cmd);
    }

    #[test]
    fn prop_expanded_forbidden_flag_denied(
        (base, flag) in forbidden_flag(),
        form in 0usize..5,
        wrapped in any::<bool>(),
    ) {
        let word = match form {
            0 => format!("${{X:+{flag}}}"),
            1 => format!("$'{flag}'"),
            2 => format!("$\"{flag}\""),
            3 => format!("{{{flag},x}}"),
            _ => format!("{{x,{flag}}}"),
        };
        let mut cmd = format!("{base} {word} x");
        if wrapped {
            cmd = format!("bash -c {}", shell_words::quote(&cmd));
        }
        prop_assert!(!allowed(&cmd), "allowed: {}", cmd);
    }

    #[test]
    fn prop_long_option_prefixes_denied(
        (base, option) in prop::sample::select(vec![
            ("sed 's/a/b/'", "--in-place"),
            ("sort", "--output"),
            ("sort", "--compress-program"),
            ("git diff", "--output"),
            ("git diff", "--ext-diff"),
            ("git grep", "--open-files-in-pager"),
            ("fd", "--exec-batch"),
        ]),
        len in 3usize..24,
        with_value in any::<bool>(),
    ) {
        let prefix = &option[..len.min(option.len())];
        let flag = if with_value { format!("{prefix}=x") } else { prefix.to_string() };
        let cmd = format!("{base} {flag} file");
        prop_assert!(!allowed(&cmd), "allowed: {}", cmd);
    }

    #[test]
    fn prop_validate_never_panics(cmd in ".{0,64}") {
        let verdict = validate(&cmd);
        prop_assert!(verdict.is_allowed() || verdict.denial_reason().is_some());
    }
}
