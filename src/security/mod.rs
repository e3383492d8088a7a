//! Command security validation.
//!
//! [`validate`] classifies raw shell text as safe or unsafe before anything
//! is spawned. The model is allow-list first: a statement runs only if its
//! root program is in [`rules::READ_ONLY_COMMANDS`] and passes that
//! program's argument rules. Anything the parser cannot read unambiguously
//! is denied.
//!
//! # Example
//!
//! ```
//! use tollgate::security::validate;
//!
//! assert!(validate("git status && git log --oneline | head -5").is_allowed());
//!
//! let verdict = validate("find . -name '*.tmp' -delete");
//! assert!(!verdict.is_allowed());
//! assert!(verdict.denial_reason().unwrap().contains("-delete"));
//! ```

pub mod rules;
pub mod segments;

use serde::Serialize;
use std::fmt;
use tracing::debug;

pub use segments::{split_segments, CommandSegment, Separator, SplitError};

/// How deeply `sh -c '...'` wrappers are unwrapped before giving up.
pub const MAX_WRAPPER_DEPTH: usize = 3;

/// Category of a non-blocking warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The program is superseded by another invocation.
    Deprecated,
    /// A structured tool does the same job with bounded output.
    Suboptimal,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deprecated => f.write_str("deprecated"),
            Self::Suboptimal => f.write_str("suboptimal"),
        }
    }
}

/// An optimization hint attached to an allowed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    kind: WarningKind,
    message: String,
    suggested_alternative: String,
}

impl Warning {
    pub(crate) fn new(
        kind: WarningKind,
        message: impl Into<String>,
        suggested_alternative: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            suggested_alternative: suggested_alternative.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> WarningKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn suggested_alternative(&self) -> &str {
        &self.suggested_alternative
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (try: {})",
            self.kind, self.message, self.suggested_alternative
        )
    }
}

/// Outcome of [`validate`].
///
/// A denied verdict always carries a non-empty reason and never carries
/// warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityVerdict {
    allowed: bool,
    denial_reason: Option<String>,
    warnings: Vec<Warning>,
}

impl SecurityVerdict {
    fn allow(warnings: Vec<Warning>) -> Self {
        Self {
            allowed: true,
            denial_reason: None,
            warnings,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            allowed: false,
            denial_reason: Some(if reason.trim().is_empty() {
                "command denied".to_string()
            } else {
                reason
            }),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    #[must_use]
    pub fn denial_reason(&self) -> Option<&str> {
        self.denial_reason.as_deref()
    }

    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Converts a denial into a [`TollgateError::SecurityDenied`](crate::error::TollgateError).
    ///
    /// # Errors
    ///
    /// Returns the denial as an error when the verdict is not allowed.
    pub fn into_result(self, command: &str) -> crate::error::TollgateResult<Vec<Warning>> {
        match self.denial_reason {
            Some(reason) if !self.allowed => {
                Err(crate::error::TollgateError::security_denied(command, reason))
            }
            _ => Ok(self.warnings),
        }
    }
}

/// Validates raw shell text. Pure: no I/O, never panics on any input.
///
/// Every statement must pass; the first failing statement's reason is
/// returned. Warnings from all statements are concatenated in order.
#[must_use]
pub fn validate(command: &str) -> SecurityVerdict {
    let verdict = match validate_text(command, 0) {
        Ok(warnings) => SecurityVerdict::allow(warnings),
        Err(reason) => SecurityVerdict::deny(reason),
    };
    debug!(
        command = %command,
        allowed = verdict.allowed,
        warnings = verdict.warnings.len(),
        "Validated command"
    );
    verdict
}

fn validate_text(command: &str, depth: usize) -> Result<Vec<Warning>, String> {
    if command.trim().is_empty() {
        return Ok(Vec::new());
    }
    if depth > MAX_WRAPPER_DEPTH {
        return Err(format!(
            "shell wrappers nested more than {MAX_WRAPPER_DEPTH} levels deep"
        ));
    }

    let segments = split_segments(command).map_err(|e| format!("cannot parse command: {e}"))?;
    let mut warnings = Vec::new();
    for segment in &segments {
        warnings.extend(validate_segment(segment, depth)?);
    }
    Ok(warnings)
}

fn validate_segment(segment: &CommandSegment, depth: usize) -> Result<Vec<Warning>, String> {
    let text = segment.text();

    if let Some(kind) = segments::find_substitution(text) {
        return Err(format!("command substitution ({kind}) is not allowed"));
    }
    if segment.terminator() == Some(Separator::Background) {
        return Err("background execution (&) is not allowed".to_string());
    }
    let parse_error = |e: SplitError| format!("cannot parse command: {e}");
    if let Some(kind) = segments::find_expansion(text).map_err(parse_error)? {
        return Err(format!(
            "{kind} is not allowed; its value cannot be checked before it runs"
        ));
    }

    let redirections = segments::extract_redirections(text).map_err(parse_error)?;
    if let Some(redirect) = redirections.redirects.iter().find(|r| r.writes()) {
        return Err(format!("write redirection '{redirect}' is not allowed"));
    }

    let tokens = shell_words::split(&redirections.command)
        .map_err(|e| format!("cannot tokenize command: {e}"))?;

    let mut iter = tokens.iter().skip_while(|t| rules::is_env_assignment(t));
    let assignments = tokens
        .iter()
        .take_while(|t| rules::is_env_assignment(t))
        .collect::<Vec<_>>();
    for assignment in &assignments {
        rules::check_env_assignment(assignment)?;
    }

    let Some(root_token) = iter.next() else {
        if assignments.is_empty() {
            return Ok(Vec::new());
        }
        return Err("bare variable assignment is not allowed".to_string());
    };
    let args: Vec<String> = iter.cloned().collect();

    if root_token.contains('/') {
        return Err(format!(
            "'{root_token}' names a path; only allow-listed programs found on PATH may run"
        ));
    }
    let root = root_token.to_lowercase();

    if rules::SHELL_WRAPPERS.contains(root.as_str()) {
        return match shell_wrapper_body(&args) {
            Some(body) => validate_text(body, depth + 1),
            None => Err(format!("'{root}' is only allowed as a '{root} -c' wrapper")),
        };
    }

    if !rules::READ_ONLY_COMMANDS.contains(root.as_str()) {
        return Err(format!("'{root_token}' is not in the read-only allow-list"));
    }
    if rules::has_option_rules(&root) {
        if let Some(word) = segments::find_option_glob(&redirections.command).map_err(parse_error)? {
            return Err(format!(
                "unquoted pattern '{word}' could expand to an option for '{root}'; quote it"
            ));
        }
    }
    rules::check_command(&root, &args)?;

    Ok(rules::optimization_hints(&root, &args))
}

/// Extracts the script from `sh -c 'script'`, allowing only login-style
/// flags before `-c`.
fn shell_wrapper_body(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    for arg in iter.by_ref() {
        match arg.as_str() {
            "-c" | "-lc" => return iter.next().map(String::as_str),
            "-l" | "--login" | "--norc" | "--noprofile" => continue,
            _ => return None,
        }
    }
    None
}
