//! Application hooks.
//!
//! The gate owns the redirect protocol; the application owns identity. The
//! [`AuthHooks`] trait is the seam between them: the application resolves
//! users, maps them to what should be stored in the session, and may override
//! redirects. Every method but [`AuthHooks::get_user`] has a default.

use std::fmt;

use async_trait::async_trait;
use axum::response::Response;
use http::request::Parts;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HookError;

/// Result of a login callback: the value to store in the session and an
/// optional place to send the user instead of the remembered referer.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome<U> {
    /// Value persisted under the session user field.
    pub user: U,
    /// Redirect override. Empty strings are ignored.
    pub redirect: Option<String>,
}

impl<U> LoginOutcome<U> {
    /// Store `user` and keep the default redirect.
    pub fn new(user: U) -> Self {
        Self {
            user,
            redirect: None,
        }
    }

    /// Send the user to `url` after storing them.
    pub fn redirect_to(mut self, url: impl Into<String>) -> Self {
        self.redirect = Some(url.into());
        self
    }

    pub(crate) fn redirect_override(&self) -> Option<&str> {
        self.redirect.as_deref().filter(|url| !url.is_empty())
    }
}

/// The gate's default "send this user to log in" response, not yet produced.
///
/// Handed to [`AuthHooks::redirect_handler`], which may run it, inspect its
/// target, or discard it and answer differently.
pub struct DeferredRedirect {
    location: String,
    perform: Box<dyn FnOnce() -> Response + Send>,
}

impl DeferredRedirect {
    pub(crate) fn new<F>(location: String, perform: F) -> Self
    where
        F: FnOnce() -> Response + Send + 'static,
    {
        Self {
            location,
            perform: Box::new(perform),
        }
    }

    /// Where the default redirect would send the user.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Produce the default redirect response.
    pub fn run(self) -> Response {
        (self.perform)()
    }
}

impl fmt::Debug for DeferredRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRedirect")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Application-supplied identity hooks.
///
/// `parts` is the request being handled. Its extensions carry the
/// `tower_sessions::Session`, so hooks can read the session directly.
///
/// Hooks are awaited one at a time per request.
#[async_trait]
pub trait AuthHooks: Send + Sync + 'static {
    /// The user value resolved by [`get_user`](Self::get_user) and stored in
    /// the session.
    type User: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Resolve a user directly from the request (trusted header, token,
    /// identity-provider callback parameters, ...).
    ///
    /// Errors are logged and treated as "no user".
    async fn get_user(&self, parts: &Parts) -> Result<Option<Self::User>, HookError>;

    /// Map a resolved user to the value stored in the session.
    ///
    /// Errors propagate as [`GateError::LoginCallback`](crate::GateError::LoginCallback).
    async fn login_callback(
        &self,
        _parts: &Parts,
        user: Self::User,
    ) -> Result<LoginOutcome<Self::User>, HookError> {
        Ok(LoginOutcome::new(user))
    }

    /// Run before the session user is cleared on logout. A returned URL
    /// overrides the post-logout redirect.
    ///
    /// Errors propagate as [`GateError::LogoutCallback`](crate::GateError::LogoutCallback).
    async fn logout_callback(
        &self,
        _parts: &Parts,
        _user: Self::User,
    ) -> Result<Option<String>, HookError> {
        Ok(None)
    }

    /// Extra check on top of "a session user is present".
    fn login_check(&self, _parts: &Parts, _user: &Self::User) -> bool {
        true
    }

    /// Build the identity provider URL the login path redirects to.
    fn login_url(&self, callback_url: &str, _root_path: &str) -> String {
        callback_url.to_string()
    }

    /// Intercept the redirect sent to unauthenticated visitors of protected paths.
    async fn redirect_handler(&self, _parts: &Parts, redirect: DeferredRedirect) -> Response {
        redirect.run()
    }
}
