//! Gate configuration.
//!
//! [`GateConfig`] is the serialisable form (all fields optional, TOML-friendly).
//! [`GateConfig::resolve`] derives the auth paths, checks their invariants and
//! normalises the matcher, producing the immutable [`GateSettings`] a gate runs on.

use std::path::Path;

use http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::GateError;
use crate::matcher::{MatcherSpec, PathMatcher};

/// Raw gate configuration, typically loaded from TOML.
///
/// ```toml
/// root_path = "/app"
/// user_field = "account"
/// protect = { prefix = "/app/admin*" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Whether the gate is active. When false, all requests pass through.
    pub enabled: bool,
    /// Application mount root.
    pub root_path: String,
    /// Login path. Defaults to `<root_path>/login`.
    pub login_path: Option<String>,
    /// Identity provider callback path. Defaults to `<login_path>/callback`.
    pub login_callback_path: Option<String>,
    /// Logout path. Defaults to `<root_path>/logout`.
    pub logout_path: Option<String>,
    /// Session key holding the authenticated user.
    pub user_field: String,
    /// Public host used to build the callback URL. Defaults to the request host.
    pub host: Option<String>,
    /// Public scheme used to build the callback URL. Defaults to the request scheme.
    pub protocol: Option<String>,
    /// Honour `X-Forwarded-Proto` / `X-Forwarded-Host` when building the callback URL.
    pub trust_proxy: bool,
    /// Which paths require authentication.
    pub protect: Option<MatcherSpec>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root_path: "/".to_string(),
            login_path: None,
            login_callback_path: None,
            logout_path: None,
            user_field: "user".to_string(),
            host: None,
            protocol: None,
            trust_proxy: false,
            protect: None,
        }
    }
}

impl GateConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, GateError> {
        toml::from_str(content).map_err(|e| GateError::Config(e.to_string()))
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| GateError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Derive and validate the auth paths and normalise the matcher.
    pub fn resolve(self) -> Result<GateSettings, GateError> {
        let root_path = normalize_root(&self.root_path)?;

        let login_path = match self.login_path {
            Some(p) => p,
            None => join_path(&root_path, "login"),
        };
        let login_callback_path = match self.login_callback_path {
            Some(p) => p,
            None => join_path(&login_path, "callback"),
        };
        let logout_path = match self.logout_path {
            Some(p) => p,
            None => join_path(&root_path, "logout"),
        };

        for (name, path) in [
            ("login_path", &login_path),
            ("login_callback_path", &login_callback_path),
            ("logout_path", &logout_path),
        ] {
            if !is_under(&root_path, path) {
                return Err(GateError::Config(format!(
                    "{name} '{path}' is not under root_path '{root_path}'"
                )));
            }
        }

        if login_path == login_callback_path
            || login_path == logout_path
            || login_callback_path == logout_path
        {
            return Err(GateError::Config(format!(
                "login_path '{login_path}', login_callback_path '{login_callback_path}' \
                 and logout_path '{logout_path}' must be distinct"
            )));
        }

        if self.user_field.is_empty() {
            return Err(GateError::Config("user_field must not be empty".to_string()));
        }

        let matcher = PathMatcher::from_spec(self.protect.as_ref());

        Ok(GateSettings {
            enabled: self.enabled,
            root_path,
            login_path,
            login_callback_path,
            logout_path,
            user_field: self.user_field,
            host: self.host,
            protocol: self.protocol,
            trust_proxy: self.trust_proxy,
            matcher,
        })
    }
}

/// Resolved, immutable gate settings.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Whether the gate is active.
    pub enabled: bool,
    /// Application mount root, always starting with `/`.
    pub root_path: String,
    /// Login path.
    pub login_path: String,
    /// Identity provider callback path.
    pub login_callback_path: String,
    /// Logout path.
    pub logout_path: String,
    /// Session key holding the authenticated user.
    pub user_field: String,
    /// Public host override.
    pub host: Option<String>,
    /// Public scheme override.
    pub protocol: Option<String>,
    /// Whether forwarding headers are trusted.
    pub trust_proxy: bool,
    /// Protected-path matcher.
    pub matcher: PathMatcher,
}

impl GateSettings {
    /// Replace the matcher, e.g. with a [`PathMatcher::predicate`] that cannot
    /// be expressed in a config file.
    pub fn with_matcher(mut self, matcher: PathMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Absolute URL the identity provider should send the user back to.
    pub fn callback_url(&self, parts: &Parts) -> String {
        let protocol = self
            .protocol
            .clone()
            .unwrap_or_else(|| request_protocol(parts, self.trust_proxy));
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| request_host(parts, self.trust_proxy));
        format!("{protocol}://{host}{}", self.login_callback_path)
    }
}

fn normalize_root(root: &str) -> Result<String, GateError> {
    if !root.starts_with('/') {
        return Err(GateError::Config(format!("root_path '{root}' must start with '/'")));
    }
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

fn is_under(root: &str, path: &str) -> bool {
    if root == "/" {
        return path.starts_with('/');
    }
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn join_path(base: &str, segment: &str) -> String {
    format!("{}/{segment}", base.trim_end_matches('/'))
}

fn forwarded_header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn request_protocol(parts: &Parts, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(proto) = forwarded_header(parts, "x-forwarded-proto") {
            return proto.to_string();
        }
    }
    parts.uri.scheme_str().unwrap_or("http").to_string()
}

fn request_host(parts: &Parts, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(host) = forwarded_header(parts, "x-forwarded-host") {
            return host.to_string();
        }
    }
    parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}
