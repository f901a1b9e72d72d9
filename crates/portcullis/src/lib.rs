//! Session-backed login gate for Tower and axum.
//!
//! Provides:
//! - [`AuthGateLayer`] / [`AuthGateService`] — Tower middleware parameterised over [`AuthHooks`]
//! - [`AuthGate`] — the same request handling, callable without Tower
//! - [`AuthHooks`] — trait the application implements to resolve and store users
//! - [`GateConfig`] / [`GateSettings`] — TOML-loadable configuration and its resolved form
//! - [`PathMatcher`] — which paths require authentication
//! - [`CurrentUser`] — the authenticated user, handed to downstream handlers
//! - [`GateError`] — gate error types
//!
//! The gate expects a `tower_sessions::SessionManagerLayer` to run before it.
//! A request without a session is always sent to the login flow.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use axum::{Router, routing::get};
//! use http::request::Parts;
//! use portcullis::{AuthGateLayer, AuthHooks, CurrentUser, GateConfig, HookError};
//! use tower_sessions::{MemoryStore, SessionManagerLayer};
//!
//! struct TrustedHeader;
//!
//! #[async_trait]
//! impl AuthHooks for TrustedHeader {
//!     type User = String;
//!
//!     async fn get_user(&self, parts: &Parts) -> Result<Option<String>, HookError> {
//!         Ok(parts
//!             .headers
//!             .get("x-remote-user")
//!             .and_then(|v| v.to_str().ok())
//!             .map(str::to_string))
//!     }
//! }
//!
//! # fn build() -> Result<Router, portcullis::GateError> {
//! let settings = GateConfig::from_toml_str(r#"protect = { prefix = "/admin*" }"#)?.resolve()?;
//!
//! let app = Router::new()
//!     .route(
//!         "/admin",
//!         get(|CurrentUser(user): CurrentUser<String>| async move { format!("hello {user}") }),
//!     )
//!     .layer(AuthGateLayer::new(settings, Arc::new(TrustedHeader)))
//!     .layer(SessionManagerLayer::new(MemoryStore::default()));
//! # Ok(app)
//! # }
//! ```

mod classify;
mod config;
mod error;
mod flows;
mod gate;
mod hooks;
mod matcher;
mod referer;
mod respond;
mod session;

pub use classify::{PathClass, classify};
pub use config::{GateConfig, GateSettings};
pub use error::{GateError, HookError};
pub use gate::{AuthGate, AuthGateLayer, AuthGateService};
pub use hooks::{AuthHooks, DeferredRedirect, LoginOutcome};
pub use matcher::{MatcherSpec, PathMatcher};
pub use referer::format_referer;
pub use respond::{UNAUTHORIZED_BODY, prefers_json, redirect, redirect_with_status};
pub use session::{CurrentUser, LOGIN_REFERER_KEY, session_from_parts, user_from_parts};
