//! Source URL trust boundary.
//!
//! Every embed source passes through [`sanitize_source`] before it may be
//! bound to the frame's navigation target. Relative references stay within
//! the host origin and are trusted as-is; absolute URLs are parsed, and
//! when the safety policy is enforced their scheme must come from the
//! allowlist below.

use std::fmt;

use url::Url;

/// Schemes the safety policy accepts for absolute sources.
const SAFE_SCHEMES: &[&str] = &["http", "https", "ftp", "mailto", "tel", "file", "about"];

/// A source URL that has passed the trust step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrustedSource(String);

impl TrustedSource {
    /// The trusted URL text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrustedSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Rejection reasons from [`sanitize_source`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SourceUrlError {
    /// The source is absolute but not parseable as a URL.
    Invalid(url::ParseError),
    /// The scheme is outside the safety policy.
    UnsafeScheme,
}

impl fmt::Display for SourceUrlError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(err) => write!(formatter, "source URL does not parse: {err}"),
            Self::UnsafeScheme => formatter.write_str("source URL scheme is outside the safety policy"),
        }
    }
}

impl std::error::Error for SourceUrlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::UnsafeScheme => None,
        }
    }
}

/// Trust step for the embed source.
///
/// With `enforce_policy` false every source the host hands over is trusted
/// verbatim, matching the bypass path integrators opt into for content
/// they control. With it true the URL is re-validated and unsafe schemes
/// (`javascript:`, `data:`, ...) are rejected.
pub fn sanitize_source(raw: &str, enforce_policy: bool) -> Result<TrustedSource, SourceUrlError> {
    if !enforce_policy {
        return Ok(TrustedSource(raw.to_owned()));
    }
    match Url::parse(raw) {
        Ok(parsed) => {
            if SAFE_SCHEMES.contains(&parsed.scheme()) {
                Ok(TrustedSource(raw.to_owned()))
            } else {
                Err(SourceUrlError::UnsafeScheme)
            }
        }
        // A relative reference cannot leave the host origin.
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(TrustedSource(raw.to_owned())),
        Err(err) => Err(SourceUrlError::Invalid(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_mode_trusts_anything() {
        assert_eq!(
            sanitize_source("javascript:alert(1)", false).unwrap().as_str(),
            "javascript:alert(1)"
        );
    }

    #[test]
    fn policy_accepts_safe_schemes_and_relative_references() {
        for source in [
            "https://example.test/page.html",
            "http://example.test/",
            "file:///tmp/page.html",
            "page.html",
            "/nested/page.html",
        ] {
            assert!(sanitize_source(source, true).is_ok(), "rejected {source}");
        }
    }

    #[test]
    fn policy_rejects_unsafe_schemes() {
        for source in ["javascript:alert(1)", "data:text/html,<p>x</p>", "vbscript:x"] {
            assert_eq!(
                sanitize_source(source, true),
                Err(SourceUrlError::UnsafeScheme),
                "accepted {source}"
            );
        }
    }
}
