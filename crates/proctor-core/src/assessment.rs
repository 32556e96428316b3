//! Assessment URL normalization and session ids.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProctorError, ProctorResult};

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)([a-z][a-z0-9+.\-]*)://").expect("static regex"));

/// scheme://host[:port][/rest], host being a dotted name, `localhost`, or an IPv4 address.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?i)https?://(localhost|[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)+)(:\d{1,5})?([/?#][^\s]*)?$",
    )
    .expect("static regex")
});

/// A validated http(s) link to the hosted assessment form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssessmentUrl(String);

impl AssessmentUrl {
    /// Trim, default the scheme to `https://`, and validate.
    pub fn parse(input: &str) -> ProctorResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ProctorError::InvalidAssessmentUrl("empty URL".to_string()));
        }

        let candidate = match SCHEME_RE.captures(trimmed) {
            Some(caps) => {
                let scheme = caps[1].to_ascii_lowercase();
                if scheme != "http" && scheme != "https" {
                    return Err(ProctorError::InvalidAssessmentUrl(format!(
                        "unsupported scheme '{}'",
                        scheme
                    )));
                }
                trimmed.to_string()
            }
            None => format!("https://{}", trimmed),
        };

        if !URL_RE.is_match(&candidate) {
            return Err(ProctorError::InvalidAssessmentUrl(trimmed.to_string()));
        }
        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host part, lowercased.
    pub fn host(&self) -> String {
        URL_RE
            .captures(&self.0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default()
    }
}

impl fmt::Display for AssessmentUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one proctored attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_defaults_to_https() {
        let url = AssessmentUrl::parse("  docs.google.com/forms/d/abc/viewform ").unwrap();
        assert_eq!(url.as_str(), "https://docs.google.com/forms/d/abc/viewform");
        assert_eq!(url.host(), "docs.google.com");
    }

    #[test]
    fn test_accepts_http_and_localhost() {
        assert!(AssessmentUrl::parse("http://localhost:8080/quiz").is_ok());
        assert!(AssessmentUrl::parse("HTTPS://Forms.Example.org?id=1").is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        for bad in ["", "   ", "ftp://example.com", "javascript://alert(1)", "https://nodot", "https://exa mple.com"] {
            assert!(
                matches!(AssessmentUrl::parse(bad), Err(ProctorError::InvalidAssessmentUrl(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
