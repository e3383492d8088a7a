//! URL allow-list.
//!
//! A URL passes if the user typed it in the current turn, or if it is
//! `http`/`https` and its host matches a trusted pattern.

use glob::Pattern;
use tracing::warn;
use url::Url;

use super::access::SessionContext;
use crate::error::{TollgateError, TollgateResult};

/// Hosts trusted without user confirmation.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "github.com",
    "*.github.com",
    "raw.githubusercontent.com",
    "gist.githubusercontent.com",
    "docs.rs",
    "crates.io",
    "static.crates.io",
    "doc.rust-lang.org",
    "developer.mozilla.org",
    "docs.python.org",
    "pypi.org",
    "www.npmjs.com",
    "registry.npmjs.org",
    "stackoverflow.com",
    "pkg.go.dev",
];

#[derive(Debug, Clone)]
pub struct UrlPolicy {
    trusted: Vec<Pattern>,
}

impl UrlPolicy {
    /// Builds the policy from the default domains plus `extra` patterns.
    ///
    /// # Errors
    ///
    /// Returns a config error if a pattern is not a valid glob.
    pub fn new(extra: &[String]) -> TollgateResult<Self> {
        let trusted = DEFAULT_TRUSTED_DOMAINS
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .map(|p| {
                Pattern::new(&p.to_ascii_lowercase())
                    .map_err(|e| TollgateError::config(format!("invalid trusted domain '{p}': {e}")))
            })
            .collect::<TollgateResult<Vec<_>>>()?;
        Ok(Self { trusted })
    }

    fn host_is_trusted(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.');
        self.trusted.iter().any(|p| p.matches(host))
    }

    /// Checks a URL before it is fetched.
    ///
    /// # Errors
    ///
    /// Returns [`TollgateError::UrlPolicy`] when the URL is malformed, uses
    /// another scheme, or names an untrusted host the user did not supply.
    pub fn check(&self, raw: &str, session: &SessionContext) -> TollgateResult<Url> {
        let url = Url::parse(raw).map_err(|e| TollgateError::url_policy(raw, format!("malformed URL: {e}")))?;

        if session.is_user_supplied(raw) || session.is_user_supplied(url.as_str()) {
            return Ok(url);
        }

        if !matches!(url.scheme(), "http" | "https") {
            warn!(url = %raw, scheme = %url.scheme(), "Security: URL scheme rejected");
            return Err(TollgateError::url_policy(
                raw,
                format!("scheme '{}' is not allowed", url.scheme()),
            ));
        }

        match url.host_str() {
            Some(host) if self.host_is_trusted(host) => Ok(url),
            Some(host) => {
                warn!(url = %raw, host = %host, "Security: untrusted URL rejected");
                Err(TollgateError::url_policy(
                    raw,
                    format!("host '{host}' is not trusted and was not supplied by the user"),
                ))
            }
            None => Err(TollgateError::url_policy(raw, "URL has no host")),
        }
    }
}
