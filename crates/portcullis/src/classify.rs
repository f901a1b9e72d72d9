//! Request path classification.

use crate::config::GateSettings;

/// What the gate should do with a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Start a login (also used for every request that has no session).
    Login,
    /// Complete a login on return from the identity provider.
    LoginCallback,
    /// Log out.
    Logout,
    /// Requires an authenticated session.
    Protected,
    /// Pass through untouched.
    Unprotected,
}

/// Classify `path`. The first matching rule wins:
///
/// 1. no session, or the login path: [`PathClass::Login`]
/// 2. the login callback path: [`PathClass::LoginCallback`]
/// 3. the logout path: [`PathClass::Logout`]
/// 4. not matched by the protect matcher: [`PathClass::Unprotected`]
/// 5. otherwise: [`PathClass::Protected`]
pub fn classify(settings: &GateSettings, has_session: bool, path: &str) -> PathClass {
    if !has_session || path == settings.login_path {
        PathClass::Login
    } else if path == settings.login_callback_path {
        PathClass::LoginCallback
    } else if path == settings.logout_path {
        PathClass::Logout
    } else if !settings.matcher.is_protected(path) {
        PathClass::Unprotected
    } else {
        PathClass::Protected
    }
}
