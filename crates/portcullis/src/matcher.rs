//! Protected-path matching.
//!
//! A [`PathMatcher`] answers one question: does this path require an
//! authenticated session? It is normalised once, when the gate is configured,
//! from one of three representations: a literal path prefix, a regular
//! expression, or an arbitrary predicate.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Serialisable matcher description, as written in a config file.
///
/// ```toml
/// protect = { prefix = "/admin*" }
/// # or
/// protect = { regex = "^/api/" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherSpec {
    /// Literal path prefix. A trailing `*` is accepted and ignored.
    Prefix(String),
    /// Regular expression tested against the request path.
    Regex(String),
}

/// Decides whether a request path requires authentication.
#[derive(Clone, Default)]
pub enum PathMatcher {
    /// Protect nothing. Used when no matcher is configured or it is invalid.
    #[default]
    Never,
    /// Protect every path starting with the prefix.
    Prefix(String),
    /// Protect every path the expression matches.
    Regex(Regex),
    /// Protect every path the predicate accepts.
    Predicate(Predicate),
}

impl PathMatcher {
    /// Build a prefix matcher. `"/admin*"` and `"/admin"` are equivalent.
    pub fn prefix(pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref();
        PathMatcher::Prefix(pattern.strip_suffix('*').unwrap_or(pattern).to_string())
    }

    /// Build a regex matcher, degrading to [`PathMatcher::Never`] if the
    /// expression does not compile.
    pub fn regex(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => PathMatcher::Regex(re),
            Err(e) => {
                log::warn!("Invalid protect regex '{pattern}', no path will be protected: {e}");
                PathMatcher::Never
            }
        }
    }

    /// Build a matcher from an arbitrary predicate.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        PathMatcher::Predicate(Arc::new(f))
    }

    /// Normalise an optional config-file description.
    pub fn from_spec(spec: Option<&MatcherSpec>) -> Self {
        match spec {
            Some(MatcherSpec::Prefix(p)) if !p.trim_end_matches('*').is_empty() => {
                PathMatcher::prefix(p)
            }
            Some(MatcherSpec::Prefix(_)) => {
                log::warn!("Empty protect prefix, no path will be protected");
                PathMatcher::Never
            }
            Some(MatcherSpec::Regex(r)) => PathMatcher::regex(r),
            None => {
                log::warn!("No protect matcher configured, no path will be protected");
                PathMatcher::Never
            }
        }
    }

    /// Whether `path` requires authentication.
    pub fn is_protected(&self, path: &str) -> bool {
        match self {
            PathMatcher::Never => false,
            PathMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathMatcher::Regex(re) => re.is_match(path),
            PathMatcher::Predicate(f) => f(path),
        }
    }
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMatcher::Never => f.write_str("Never"),
            PathMatcher::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            PathMatcher::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            PathMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
