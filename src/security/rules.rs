//! Read-only allow-list and per-command rules.
//!
//! A root command must appear in [`READ_ONLY_COMMANDS`]. Commands whose
//! flags can turn them into writers or launchers get an extra rule here.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::{Warning, WarningKind};

/// Programs presumed safe to execute, subject to the rules below.
///
/// # Safety Criteria
///
/// Commands are included only if, absent the flags rejected by
/// [`check_command`], they:
/// 1. Never modify files or system state
/// 2. Never execute other programs
///
/// Notably absent: `awk` (`system()`), `xargs`, `env`, `tee`, `less`,
/// `xxd` (writes its second argument), `curl`, `cargo`, `npm`.
pub static READ_ONLY_COMMANDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let commands = [
        // File inspection
        "cat",
        "head",
        "tail",
        "wc",
        "file",
        "stat",
        "md5sum",
        "sha1sum",
        "sha256sum",
        "hexdump",
        "strings",
        // Directory listing
        "ls",
        "eza",
        "exa",
        "lsd",
        "tree",
        "du",
        "df",
        "find",
        "fd",
        "fdfind",
        // Text search
        "grep",
        "egrep",
        "fgrep",
        "rg",
        "ag",
        "ack",
        "sed",
        // System info
        "pwd",
        "whoami",
        "hostname",
        "uname",
        "date",
        "uptime",
        "id",
        "groups",
        "ps",
        // Environment
        "printenv",
        "echo",
        "printf",
        "which",
        "whereis",
        "type",
        // Path manipulation
        "basename",
        "dirname",
        "realpath",
        "readlink",
        // Text processing
        "sort",
        "uniq",
        "cut",
        "tr",
        "diff",
        "cmp",
        "comm",
        "join",
        "paste",
        "fold",
        "fmt",
        "nl",
        "rev",
        "tac",
        "expand",
        "unexpand",
        "column",
        "seq",
        // Structured data
        "jq",
        "yq",
        // Version control
        "git",
        // Shell no-ops
        "test",
        "[",
        "true",
        "false",
    ];
    commands.into_iter().collect()
});

/// Shells whose `-c` wrapper is unwrapped and validated recursively.
pub(crate) static SHELL_WRAPPERS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["sh", "bash", "zsh", "dash", "ksh"].into_iter().collect());

/// Environment variables that change which program runs or what it loads.
static HIJACKING_ENV_VARS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "PATH",
        "IFS",
        "ENV",
        "BASH_ENV",
        "SHELLOPTS",
        "PROMPT_COMMAND",
        "PS4",
        "PAGER",
        "MANPAGER",
        "EDITOR",
        "VISUAL",
        "GIT_PAGER",
        "GIT_EXTERNAL_DIFF",
        "GIT_SSH",
        "GIT_SSH_COMMAND",
        "GIT_EDITOR",
        "GIT_DIR",
        "GIT_WORK_TREE",
    ]
    .into_iter()
    .collect()
});

/// Git subcommands that only read repository state.
pub(crate) static SAFE_GIT_SUBCOMMANDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let subcommands = [
        "status",
        "log",
        "diff",
        "show",
        "blame",
        "branch",
        "tag",
        "describe",
        "rev-parse",
        "rev-list",
        "ls-files",
        "ls-tree",
        "ls-remote",
        "cat-file",
        "shortlog",
        "remote",
        "reflog",
        "name-rev",
        "for-each-ref",
        "show-ref",
        "grep",
        "config",
        "merge-base",
        "count-objects",
        "whatchanged",
        "diff-tree",
        "diff-files",
        "diff-index",
        "check-ignore",
        "var",
        "version",
        "help",
    ];
    subcommands.into_iter().collect()
});

/// Git global flags whose value is the next argument.
///
/// Git matches global options exactly, so no prefix forms are needed here.
static GIT_FLAGS_WITH_ARGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["-C", "--git-dir", "--work-tree", "--namespace"]
        .into_iter()
        .collect()
});

/// `git remote` actions that change configuration or prune refs.
const GIT_REMOTE_MUTATIONS: &[&str] = &[
    "add",
    "remove",
    "rm",
    "rename",
    "set-url",
    "prune",
    "update",
    "set-head",
    "set-branches",
];

/// `git branch` long flags that delete, rename, copy or retarget branches.
const GIT_BRANCH_MUTATING_LONG: &[&str] = &[
    "--delete",
    "--move",
    "--copy",
    "--force",
    "--set-upstream",
    "--set-upstream-to",
    "--unset-upstream",
    "--edit-description",
    "--track",
    "--no-track",
    "--create-reflog",
];

/// Flags that put `git branch` / `git tag` in list mode, where positional
/// arguments are patterns rather than names to create.
const GIT_LIST_MODE_FLAGS: &[&str] = &[
    "-l",
    "--list",
    "-a",
    "--all",
    "-r",
    "--remotes",
    "--contains",
    "--no-contains",
    "--merged",
    "--no-merged",
    "--points-at",
];

static ENV_ASSIGNMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").expect("assignment regex should compile")
});

/// Returns `true` if `token` is a `NAME=value` shell assignment.
pub(crate) fn is_env_assignment(token: &str) -> bool {
    ENV_ASSIGNMENT_REGEX.is_match(token)
}

/// Rejects assignments that hijack program lookup or loading.
pub(crate) fn check_env_assignment(token: &str) -> Result<(), String> {
    let name = token.split_once('=').map_or(token, |(n, _)| n);
    if HIJACKING_ENV_VARS.contains(name)
        || name.starts_with("LD_")
        || name.starts_with("DYLD_")
        || name.starts_with("GIT_CONFIG")
    {
        return Err(format!(
            "setting {name} can change which program runs or what it loads"
        ));
    }
    Ok(())
}

/// Splits short flag clusters (`-la`) into their letters; long flags and
/// positional arguments yield nothing.
fn short_flag_letters(arg: &str) -> Option<&str> {
    arg.strip_prefix('-')
        .filter(|rest| !rest.is_empty() && !rest.starts_with('-'))
}

/// Finds an argument naming one of `options`, including abbreviations.
///
/// getopt_long and git's option parser both accept any unambiguous prefix of
/// a long option, so `--in-pl` is `--in-place`. Ambiguous prefixes are
/// matched too; the program would reject them anyway.
fn find_long_option(args: &[String], options: &[&str]) -> Option<String> {
    args.iter()
        .find(|a| {
            let name = a.split_once('=').map_or(a.as_str(), |(name, _)| name);
            name.len() > 2 && name.starts_with("--") && options.iter().any(|o| o.starts_with(name))
        })
        .cloned()
}

/// Finds a short flag cluster containing `flag` before any letter in
/// `takes_value`, which would consume the rest of the cluster.
fn find_short_flag(args: &[String], flag: char, takes_value: &str) -> Option<String> {
    args.iter()
        .find(|a| {
            short_flag_letters(a).is_some_and(|letters| {
                letters
                    .chars()
                    .take_while(|c| *c == flag || !takes_value.contains(*c))
                    .any(|c| c == flag)
            })
        })
        .cloned()
}

/// Roots with argument rules in [`check_command`]. An unquoted glob could
/// expand to one of the flags those rules reject.
pub(crate) fn has_option_rules(root: &str) -> bool {
    matches!(
        root,
        "find" | "sed" | "git" | "sort" | "uniq" | "rg" | "fd" | "fdfind" | "tree" | "yq" | "date" | "hostname"
    )
}

/// Applies root-command-specific rules. `root` must already be lowercased.
///
/// # Errors
///
/// Returns the denial reason when an argument makes the command unsafe.
pub(crate) fn check_command(root: &str, args: &[String]) -> Result<(), String> {
    match root {
        "find" => check_find(args),
        "sed" => check_sed(args),
        "git" => check_git(args),
        "sort" => {
            if let Some(flag) = find_long_option(args, &["--output"])
                .or_else(|| find_short_flag(args, 'o', "ktST"))
            {
                return Err(format!("sort {flag} writes to a file"));
            }
            if let Some(flag) = find_long_option(args, &["--compress-program"]) {
                return Err(format!("sort {flag} runs an external program"));
            }
            Ok(())
        }
        "uniq" => {
            let positional = args.iter().filter(|a| !a.starts_with('-')).count();
            if positional > 1 {
                return Err("uniq with an OUTPUT argument writes to a file".to_string());
            }
            Ok(())
        }
        "rg" => match find_long_option(args, &["--pre"]) {
            Some(flag) => Err(format!("rg {flag} runs an external preprocessor")),
            None => Ok(()),
        },
        "fd" | "fdfind" => {
            if let Some(flag) = find_long_option(args, &["--exec", "--exec-batch"])
                .or_else(|| find_short_flag(args, 'x', "etEdjSc"))
                .or_else(|| find_short_flag(args, 'X', "etEdjSc"))
            {
                return Err(format!("{root} {flag} runs commands for each result"));
            }
            Ok(())
        }
        "tree" => {
            if let Some(flag) = find_short_flag(args, 'o', "LPI") {
                return Err(format!("tree {flag} writes to a file"));
            }
            Ok(())
        }
        "yq" => {
            if let Some(flag) = find_long_option(args, &["--inplace"])
                .or_else(|| find_short_flag(args, 'i', ""))
            {
                return Err(format!("yq {flag} edits files in place"));
            }
            Ok(())
        }
        "date" => {
            if let Some(flag) = find_long_option(args, &["--set"]).or_else(|| {
                args.iter()
                    .find(|a| short_flag_letters(a).is_some_and(|l| l.starts_with('s')))
                    .cloned()
            }) {
                return Err(format!("date {flag} changes the system clock"));
            }
            Ok(())
        }
        "hostname" => {
            if args.iter().any(|a| !a.starts_with('-')) {
                return Err("hostname with an argument changes the host name".to_string());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_find(args: &[String]) -> Result<(), String> {
    const FORBIDDEN: &[&str] = &["-delete", "-exec", "-execdir", "-ok", "-okdir", "-fls"];
    match args
        .iter()
        .find(|a| FORBIDDEN.contains(&a.as_str()) || a.starts_with("-fprint"))
    {
        Some(arg) => Err(format!("find {arg} can modify files or run commands")),
        None => Ok(()),
    }
}

fn check_sed(args: &[String]) -> Result<(), String> {
    // `-e` and `-f` consume the rest of the cluster as their value.
    let in_place =
        find_long_option(args, &["--in-place"]).or_else(|| find_short_flag(args, 'i', "ef"));
    match in_place {
        Some(flag) => Err(format!("sed {flag} edits files in place")),
        None => Ok(()),
    }
}

fn check_git(args: &[String]) -> Result<(), String> {
    let mut iter = args.iter().enumerate();
    let mut sub_index = None;

    while let Some((i, arg)) = iter.next() {
        if arg == "-c" || arg.starts_with("--config-env") || (arg.starts_with("-c") && arg.len() > 2) {
            return Err(format!(
                "git {arg} overrides configuration, which can launch arbitrary programs"
            ));
        }
        // Bare `--exec-path` only prints the directory.
        if arg.starts_with("--exec-path=") {
            return Err(format!("git {arg} runs subcommands from another directory"));
        }
        if GIT_FLAGS_WITH_ARGS.contains(arg.as_str()) {
            iter.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        sub_index = Some(i);
        break;
    }

    let Some(sub_index) = sub_index else {
        let informational = args
            .iter()
            .all(|a| matches!(a.as_str(), "--version" | "--help" | "-h" | "--exec-path"));
        if !args.is_empty() && informational {
            return Ok(());
        }
        return Err("git requires a read-only subcommand".to_string());
    };

    let sub = args[sub_index].as_str();
    let rest = &args[sub_index + 1..];

    if !SAFE_GIT_SUBCOMMANDS.contains(sub) {
        return Err(format!("git {sub} is not a read-only git subcommand"));
    }
    if let Some(flag) = find_long_option(rest, &["--output", "--ext-diff"]) {
        return Err(format!("git {sub} {flag} can write files or run programs"));
    }

    match sub {
        "branch" => check_git_branch(rest),
        "remote" => check_git_remote(rest),
        "tag" => check_git_tag(rest),
        "config" => check_git_config(rest),
        "grep" => match find_long_option(rest, &["--open-files-in-pager"])
            .or_else(|| find_short_flag(rest, 'O', "efABCm"))
        {
            Some(flag) => Err(format!("git grep {flag} runs a pager program")),
            None => Ok(()),
        },
        "reflog" => match rest.iter().find(|a| !a.starts_with('-')).map(String::as_str) {
            None | Some("show") | Some("exists") => Ok(()),
            Some(action) => Err(format!("git reflog {action} modifies the reflog")),
        },
        _ => Ok(()),
    }
}

fn in_list_mode(args: &[String]) -> bool {
    args.iter().any(|a| {
        GIT_LIST_MODE_FLAGS
            .iter()
            .any(|f| a.as_str() == *f || a.starts_with(&format!("{f}=")))
            || short_flag_letters(a).is_some_and(|l| l.contains(['l', 'a', 'r']))
    })
}

fn check_git_branch(args: &[String]) -> Result<(), String> {
    if let Some(flag) = args
        .iter()
        .find(|a| short_flag_letters(a).is_some_and(|l| l.contains(['d', 'D', 'm', 'M', 'c', 'C', 'f', 'u'])))
    {
        return Err(format!("git branch {flag} deletes, renames or copies branches"));
    }
    if let Some(flag) = find_long_option(args, GIT_BRANCH_MUTATING_LONG) {
        return Err(format!("git branch {flag} modifies branches"));
    }
    if args.iter().any(|a| !a.starts_with('-')) && !in_list_mode(args) {
        return Err("git branch with a name creates a branch".to_string());
    }
    Ok(())
}

fn check_git_remote(args: &[String]) -> Result<(), String> {
    match args.iter().find(|a| !a.starts_with('-')).map(String::as_str) {
        None | Some("show") | Some("get-url") => Ok(()),
        Some(action) if GIT_REMOTE_MUTATIONS.contains(&action) => {
            Err(format!("git remote {action} modifies remote configuration"))
        }
        Some(action) => Err(format!("git remote {action} is not a read-only action")),
    }
}

fn check_git_tag(args: &[String]) -> Result<(), String> {
    if let Some(flag) = args
        .iter()
        .find(|a| short_flag_letters(a).is_some_and(|l| l.contains(['d', 'a', 's', 'f', 'm', 'F', 'u', 'e'])))
    {
        return Err(format!("git tag {flag} creates or deletes tags"));
    }
    if let Some(flag) = find_long_option(
        args,
        &["--delete", "--annotate", "--sign", "--force", "--message", "--file", "--local-user", "--edit"],
    ) {
        return Err(format!("git tag {flag} creates or deletes tags"));
    }
    if args.iter().any(|a| !a.starts_with('-')) && !in_list_mode(args) {
        return Err("git tag with a name creates a tag".to_string());
    }
    Ok(())
}

fn check_git_config(args: &[String]) -> Result<(), String> {
    const WRITES: &[&str] = &[
        "--unset",
        "--unset-all",
        "--add",
        "--replace-all",
        "--rename-section",
        "--remove-section",
        "--edit",
    ];
    let edit = args.iter().find(|a| short_flag_letters(a).is_some_and(|l| l.contains('e')));
    if let Some(flag) = find_long_option(args, WRITES).or_else(|| edit.cloned()) {
        return Err(format!("git config {flag} modifies configuration"));
    }
    let reads = args
        .iter()
        .any(|a| a.starts_with("--get") || matches!(a.as_str(), "--list" | "-l"));
    if !reads {
        return Err("git config is only permitted with --get* or --list".to_string());
    }
    Ok(())
}

/// Non-blocking suggestions for commands with a better structured tool.
pub(crate) fn optimization_hints(root: &str, args: &[String]) -> Vec<Warning> {
    let mut hints = Vec::new();
    match root {
        "egrep" | "fgrep" => hints.push(Warning::new(
            WarningKind::Deprecated,
            format!("{root} is deprecated in favour of grep -E / grep -F"),
            "search tool (ripgrep-backed, respects ignore files)",
        )),
        "grep" | "ack" | "ag" => hints.push(Warning::new(
            WarningKind::Suboptimal,
            format!("{root} scans files without ignore rules; the search tool is faster and bounded"),
            "search tool (ripgrep-backed, respects ignore files)",
        )),
        "find" => hints.push(Warning::new(
            WarningKind::Suboptimal,
            "find output is unbounded; the find_files tool stores results on disk and previews them",
            "find_files tool",
        )),
        "tree" => hints.push(Warning::new(
            WarningKind::Suboptimal,
            "tree output is unbounded; the list_directory tool previews large listings",
            "list_directory tool with tree=true",
        )),
        "ls" if args.iter().any(|a| {
            a == "--recursive" || short_flag_letters(a).is_some_and(|l| l.contains('R'))
        }) =>
        {
            hints.push(Warning::new(
                WarningKind::Suboptimal,
                "recursive ls output is unbounded; the list_directory tool previews large listings",
                "list_directory tool",
            ))
        }
        "sed" => hints.push(Warning::new(
            WarningKind::Suboptimal,
            "sed is for stream editing; file changes should go through the edit tool",
            "edit tool (exact string replacement)",
        )),
        _ => {}
    }
    hints
}
