//! Quote-aware splitting of shell command text.
//!
//! Splitting happens on top-level control operators only: `;`, `&&`, `||`,
//! `|`, `|&`, newlines, and a lone `&` (background). Anything inside single
//! quotes, double quotes, or following a backslash escape is literal.
//!
//! The same quote-aware scan finds redirections and expansions, so a quoted
//! `'>'` is an ordinary argument and `"$x"` is still an expansion.

use std::fmt;

/// Control operator that terminated a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `;`
    Sequence,
    /// A newline.
    Newline,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|` or `|&`
    Pipe,
    /// A lone `&`, which backgrounds the preceding statement.
    Background,
}

impl Separator {
    /// Operators that require a statement on both sides.
    fn is_binary(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Pipe)
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Sequence => ";",
            Self::Newline => "\\n",
            Self::And => "&&",
            Self::Or => "||",
            Self::Pipe => "|",
            Self::Background => "&",
        };
        f.write_str(op)
    }
}

/// A single shell statement after splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSegment {
    text: String,
    terminator: Option<Separator>,
}

impl CommandSegment {
    /// The trimmed statement text, with quoting preserved.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The operator that ended this statement, if any.
    #[must_use]
    pub fn terminator(&self) -> Option<Separator> {
        self.terminator
    }
}

/// Why a command could not be split unambiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// A quote was opened and never closed.
    UnterminatedQuote(char),
    /// The text ends with a lone backslash.
    TrailingEscape,
    /// A binary operator is missing a statement on one side.
    DanglingOperator(Separator),
    /// `<<` or `<<<`, whose body the validator cannot see.
    HereDocument,
    /// A redirection operator with no word after it.
    MissingRedirectTarget,
}

impl fmt::Display for SplitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedQuote(q) => write!(f, "unterminated {q} quote"),
            Self::TrailingEscape => f.write_str("trailing escape character"),
            Self::DanglingOperator(op) => write!(f, "operator '{op}' is missing a command"),
            Self::HereDocument => f.write_str("here-documents are not supported"),
            Self::MissingRedirectTarget => f.write_str("redirection is missing its target"),
        }
    }
}

/// A character of command text annotated with its quoting state.
///
/// Quote delimiters, escape backslashes and escaped characters are all
/// marked quoted, so only shell-significant characters are unquoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScannedChar {
    pub(crate) ch: char,
    pub(crate) quoted: bool,
    /// A quote delimiter or escaping backslash, removed by quote removal.
    pub(crate) syntax: bool,
    /// Unquoted or double-quoted, where `$` still expands.
    pub(crate) expands: bool,
}

impl ScannedChar {
    fn plain(ch: char, in_double: bool) -> Self {
        Self {
            ch,
            quoted: in_double,
            syntax: false,
            expands: true,
        }
    }

    fn literal(ch: char, syntax: bool) -> Self {
        Self {
            ch,
            quoted: true,
            syntax,
            expands: false,
        }
    }

    /// Unquoted space or tab, the only word delimiters inside a statement.
    fn is_blank(self) -> bool {
        !self.quoted && matches!(self.ch, ' ' | '\t')
    }

    /// Ends a word: a blank or an unquoted operator character.
    fn ends_word(self) -> bool {
        self.is_blank() || (!self.quoted && matches!(self.ch, '<' | '>' | ';' | '|' | '&'))
    }
}

/// Annotates every character of `text` with its quoting state.
pub(crate) fn scan(text: &str) -> Result<Vec<ScannedChar>, SplitError> {
    let mut out = Vec::with_capacity(text.len());
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if in_single {
            if ch == '\'' {
                in_single = false;
            }
            out.push(ScannedChar::literal(ch, ch == '\''));
            continue;
        }

        match ch {
            '\\' => {
                let Some(next) = chars.next() else {
                    return Err(SplitError::TrailingEscape);
                };
                // Backslash-newline is a line continuation and vanishes.
                if next != '\n' {
                    // Inside double quotes only these characters are escaped.
                    let escapes = !in_double || matches!(next, '$' | '`' | '"' | '\\');
                    out.push(ScannedChar::literal(ch, escapes));
                    out.push(ScannedChar::literal(next, false));
                }
            }
            '"' => {
                in_double = !in_double;
                out.push(ScannedChar::literal(ch, true));
            }
            '\'' if !in_double => {
                in_single = true;
                out.push(ScannedChar::literal(ch, true));
            }
            _ => out.push(ScannedChar::plain(ch, in_double)),
        }
    }

    if in_single {
        return Err(SplitError::UnterminatedQuote('\''));
    }
    if in_double {
        return Err(SplitError::UnterminatedQuote('"'));
    }
    Ok(out)
}

/// Splits a command into statements on top-level control operators.
///
/// Empty statements produced by `;` or newlines are dropped. An empty
/// statement next to `&&`, `||` or `|` is an error.
///
/// # Errors
///
/// Returns [`SplitError`] when quoting is unbalanced or an operator dangles.
pub fn split_segments(command: &str) -> Result<Vec<CommandSegment>, SplitError> {
    let scanned = scan(command)?;
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut previous_op: Option<Separator> = None;
    let mut i = 0;

    let mut push = |current: &mut String,
                    terminator: Option<Separator>,
                    previous_op: &mut Option<Separator>|
     -> Result<(), SplitError> {
        let text = current.trim().to_string();
        current.clear();
        if text.is_empty() {
            if let Some(op) = terminator.filter(|op| op.is_binary()) {
                return Err(SplitError::DanglingOperator(op));
            }
            if let Some(op) = previous_op.filter(|op| op.is_binary()) {
                return Err(SplitError::DanglingOperator(op));
            }
        } else {
            segments.push(CommandSegment { text, terminator });
        }
        *previous_op = terminator;
        Ok(())
    };

    while i < scanned.len() {
        let ScannedChar { ch, quoted, .. } = scanned[i];
        let next = scanned.get(i + 1).filter(|c| !c.quoted).map(|c| c.ch);
        let prev = i
            .checked_sub(1)
            .and_then(|p| scanned.get(p))
            .filter(|c| !c.quoted)
            .map(|c| c.ch);

        if quoted {
            current.push(ch);
            i += 1;
            continue;
        }

        match ch {
            ';' => {
                push(&mut current, Some(Separator::Sequence), &mut previous_op)?;
                i += 1;
            }
            '\n' => {
                push(&mut current, Some(Separator::Newline), &mut previous_op)?;
                i += 1;
            }
            '&' if next == Some('&') => {
                push(&mut current, Some(Separator::And), &mut previous_op)?;
                i += 2;
            }
            // `>&1`, `<&0` and `&>file` are redirections, not operators.
            '&' if matches!(prev, Some('>') | Some('<')) || next == Some('>') => {
                current.push(ch);
                i += 1;
            }
            '&' => {
                push(&mut current, Some(Separator::Background), &mut previous_op)?;
                i += 1;
            }
            '|' if next == Some('|') => {
                push(&mut current, Some(Separator::Or), &mut previous_op)?;
                i += 2;
            }
            // `>|` forces a clobbering redirection.
            '|' if prev == Some('>') => {
                current.push(ch);
                i += 1;
            }
            '|' => {
                push(&mut current, Some(Separator::Pipe), &mut previous_op)?;
                i += if next == Some('&') { 2 } else { 1 };
            }
            _ => {
                current.push(ch);
                i += 1;
            }
        }
    }

    push(&mut current, None, &mut previous_op)?;
    Ok(segments)
}

/// Returns the command-substitution construct present in `text`, if any.
///
/// Checked on raw text regardless of quoting: inside double quotes these
/// still execute, and denying the single-quoted case too keeps the check
/// unambiguous.
#[must_use]
pub fn find_substitution(text: &str) -> Option<&'static str> {
    if text.contains("$(") {
        Some("$(...)")
    } else if text.contains('`') {
        Some("backticks")
    } else if text.contains("<(") {
        Some("<(...)")
    } else if text.contains(">(") {
        Some(">(...)")
    } else {
        None
    }
}

/// Returns the shell expansion present in `text` that the validator cannot
/// resolve, if any.
///
/// Parameter expansion (`$x`, `${x:+y}`), ANSI-C and locale quoting
/// (`$'..'`, `$".."`) and brace expansion (`{a,b}`, `{1..3}`) all produce
/// words that only exist at run time, so any argument rule could be
/// sidestepped through them.
///
/// # Errors
///
/// Returns [`SplitError`] when quoting is unbalanced.
pub fn find_expansion(text: &str) -> Result<Option<&'static str>, SplitError> {
    let scanned = scan(text)?;
    for (i, c) in scanned.iter().enumerate() {
        if !c.expands {
            continue;
        }
        match c.ch {
            '$' if dollar_expands(*c, scanned.get(i + 1).copied()) => {
                return Ok(Some("parameter expansion ($...)"));
            }
            '{' if !c.quoted && is_brace_expansion(&scanned[i + 1..]) => {
                return Ok(Some("brace expansion ({a,b})"));
            }
            _ => {}
        }
    }
    Ok(None)
}

fn dollar_expands(dollar: ScannedChar, next: Option<ScannedChar>) -> bool {
    match next {
        None => false,
        // `$'..'` and `$".."` when unquoted; a closing `"` ends the word.
        Some(n) if n.syntax => !dollar.quoted && matches!(n.ch, '\'' | '"'),
        Some(n) => !(n.ch.is_whitespace() || n.ends_word() || (!n.quoted && n.ch == ')')),
    }
}

fn is_brace_expansion(rest: &[ScannedChar]) -> bool {
    let mut separated = false;
    for (j, c) in rest.iter().enumerate() {
        if c.ends_word() {
            return false;
        }
        if c.quoted {
            continue;
        }
        match c.ch {
            ',' => separated = true,
            '.' if rest.get(j + 1).is_some_and(|n| !n.quoted && n.ch == '.') => separated = true,
            '}' if separated => return true,
            _ => {}
        }
    }
    false
}

/// Returns the first word whose unquoted glob could expand to something
/// starting with `-`.
///
/// A pattern like `*` or `-*` matches a file named `-i` as readily as any
/// other, turning a file name into an option at run time.
///
/// # Errors
///
/// Returns [`SplitError`] when quoting is unbalanced.
pub fn find_option_glob(text: &str) -> Result<Option<String>, SplitError> {
    let scanned = scan(text)?;
    let words = scanned.split(|c| c.is_blank()).filter(|w| !w.is_empty());
    for word in words {
        let Some(glob_at) = word
            .iter()
            .position(|c| !c.quoted && matches!(c.ch, '*' | '?' | '['))
        else {
            continue;
        };
        let prefix: String = word[..glob_at]
            .iter()
            .filter(|c| !c.syntax)
            .map(|c| c.ch)
            .collect();
        if prefix.is_empty() || prefix.starts_with('-') {
            return Ok(Some(word.iter().map(|c| c.ch).collect()));
        }
    }
    Ok(None)
}

/// One redirection found in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Operator text including any descriptor number, e.g. `2>` or `>&1`.
    pub operator: String,
    /// Target word after quote removal; `None` for descriptor duplication.
    pub target: Option<String>,
}

impl Redirect {
    /// `true` when the redirection can create or modify a file.
    #[must_use]
    pub fn writes(&self) -> bool {
        self.operator.contains('>') && self.target.as_deref().is_some_and(|t| t != "/dev/null")
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} {}", self.operator, target),
            None => f.write_str(&self.operator),
        }
    }
}

/// A statement with its redirections taken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirections {
    /// The remaining text with quoting intact, ready for word splitting.
    pub command: String,
    pub redirects: Vec<Redirect>,
}

/// Removes every unquoted redirection and its target from a statement.
///
/// Only unquoted `<`, `>` and `&>` are operators; a leading descriptor
/// number belongs to the operator only when it forms the whole word, as in
/// `2>`. Quoted operator characters stay in the command as arguments.
///
/// # Errors
///
/// Returns [`SplitError`] for unbalanced quoting, here-documents, or an
/// operator with no target.
pub fn extract_redirections(text: &str) -> Result<Redirections, SplitError> {
    let scanned = scan(text)?;
    let mut command = String::with_capacity(text.len());
    let mut redirects = Vec::new();
    let mut word_start = 0;
    let mut word_is_fd = false;
    let mut i = 0;

    while i < scanned.len() {
        let c = scanned[i];
        let next = scanned.get(i + 1).filter(|n| !n.quoted).map(|n| n.ch);
        let starts_redirect =
            !c.quoted && (matches!(c.ch, '<' | '>') || (c.ch == '&' && next == Some('>')));

        if !starts_redirect {
            if c.is_blank() {
                word_start = command.len() + c.ch.len_utf8();
                word_is_fd = false;
            } else {
                word_is_fd = (word_is_fd || command.len() == word_start)
                    && !c.quoted
                    && c.ch.is_ascii_digit();
            }
            command.push(c.ch);
            i += 1;
            continue;
        }

        let mut operator = String::new();
        if word_is_fd {
            operator.push_str(&command[word_start..]);
            command.truncate(word_start);
        }
        let op = read_operator(&scanned[i..])?;
        operator.push_str(op);
        i += op.len();

        let mut target = None;
        if op.ends_with('&') {
            let digits = scanned[i..]
                .iter()
                .take_while(|d| !d.quoted && (d.ch.is_ascii_digit() || d.ch == '-'))
                .count();
            if digits > 0 && scanned.get(i + digits).map_or(true, |n| n.ends_word()) {
                operator.extend(scanned[i..i + digits].iter().map(|d| d.ch));
                i += digits;
            } else {
                target = Some(read_target(&scanned, &mut i)?);
            }
        } else {
            target = Some(read_target(&scanned, &mut i)?);
        }

        redirects.push(Redirect { operator, target });
        command.push(' ');
        word_start = command.len();
        word_is_fd = false;
    }

    Ok(Redirections { command, redirects })
}

fn read_operator(rest: &[ScannedChar]) -> Result<&'static str, SplitError> {
    let at = |k: usize| rest.get(k).filter(|c| !c.quoted).map(|c| c.ch);
    let op = match (at(0), at(1), at(2)) {
        (Some('&'), Some('>'), Some('>')) => "&>>",
        (Some('&'), Some('>'), _) => "&>",
        (Some('<'), Some('<'), _) => return Err(SplitError::HereDocument),
        (Some('<'), Some('>'), _) => "<>",
        (Some('<'), Some('&'), _) => "<&",
        (Some('<'), _, _) => "<",
        (Some('>'), Some('>'), _) => ">>",
        (Some('>'), Some('|'), _) => ">|",
        (Some('>'), Some('&'), _) => ">&",
        _ => ">",
    };
    Ok(op)
}

fn read_target(scanned: &[ScannedChar], i: &mut usize) -> Result<String, SplitError> {
    while scanned.get(*i).is_some_and(|c| c.is_blank()) {
        *i += 1;
    }
    let start = *i;
    let mut target = String::new();
    while let Some(c) = scanned.get(*i).filter(|c| !c.ends_word()) {
        if !c.syntax {
            target.push(c.ch);
        }
        *i += 1;
    }
    if *i == start {
        return Err(SplitError::MissingRedirectTarget);
    }
    Ok(target)
}
