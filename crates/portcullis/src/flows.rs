//! Login, login-callback and logout handlers.
//!
//! Each handler answers the request itself; none of them calls the inner service.

use axum::response::Response;
use http::request::Parts;

use crate::GateError;
use crate::config::GateSettings;
use crate::hooks::AuthHooks;
use crate::referer::format_referer;
use crate::respond::redirect;
use crate::session::{self, session_from_parts};

/// Remember where the visitor came from and send them to the identity provider.
pub(crate) async fn login<H: AuthHooks>(
    settings: &GateSettings,
    hooks: &H,
    parts: &Parts,
) -> Result<Response, GateError> {
    if let Some(session) = session_from_parts(parts) {
        let referer = format_referer(parts, &settings.login_path, &settings.root_path);
        log::debug!("Remembering login referer '{referer}'");
        session::remember_referer(session, &referer).await?;
    }

    let callback_url = settings.callback_url(parts);
    let target = hooks.login_url(&callback_url, &settings.root_path);
    Ok(redirect(&parts.headers, &target))
}

/// Complete a login started by [`login`] and return to the remembered referer.
pub(crate) async fn login_callback<H: AuthHooks>(
    settings: &GateSettings,
    hooks: &H,
    parts: &Parts,
) -> Result<Response, GateError> {
    let Some(session) = session_from_parts(parts) else {
        return Ok(redirect(&parts.headers, &settings.root_path));
    };

    let mut referer = session::login_referer(session)
        .await?
        .unwrap_or_else(|| settings.root_path.clone());

    if session::load_user::<H::User>(session, &settings.user_field)
        .await?
        .is_some()
    {
        log::debug!("Login callback on an authenticated session, returning to '{referer}'");
        return Ok(redirect(&parts.headers, &referer));
    }

    let Some(user) = resolve_user(hooks, parts).await else {
        log::info!("Login callback resolved no user, returning to '{referer}'");
        return Ok(redirect(&parts.headers, &referer));
    };

    let outcome = hooks
        .login_callback(parts, user)
        .await
        .map_err(GateError::LoginCallback)?;
    session::store_user(session, &settings.user_field, &outcome.user).await?;
    if let Some(url) = outcome.redirect_override() {
        referer = url.to_string();
    }

    log::info!("User logged in, returning to '{referer}'");
    Ok(redirect(&parts.headers, &referer))
}

/// Run the logout hook, clear the session user and return to a safe referer.
pub(crate) async fn logout<H: AuthHooks>(
    settings: &GateSettings,
    hooks: &H,
    parts: &Parts,
) -> Result<Response, GateError> {
    let mut referer = format_referer(parts, &settings.logout_path, &settings.root_path);

    let Some(session) = session_from_parts(parts) else {
        return Ok(redirect(&parts.headers, &referer));
    };
    let Some(user) = session::load_user::<H::User>(session, &settings.user_field).await? else {
        log::debug!("Logout without a session user, returning to '{referer}'");
        return Ok(redirect(&parts.headers, &referer));
    };

    let override_url = hooks
        .logout_callback(parts, user)
        .await
        .map_err(GateError::LogoutCallback)?;
    session::clear_user(session, &settings.user_field).await?;
    if let Some(url) = override_url.filter(|url| !url.is_empty()) {
        referer = url;
    }

    log::info!("User logged out, returning to '{referer}'");
    Ok(redirect(&parts.headers, &referer))
}

/// Call [`AuthHooks::get_user`], downgrading failures to "no user".
pub(crate) async fn resolve_user<H: AuthHooks>(hooks: &H, parts: &Parts) -> Option<H::User> {
    match hooks.get_user(parts).await {
        Ok(user) => user,
        Err(e) => {
            log::error!("User resolution failed for {}: {e}", parts.uri.path());
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::error::HookError;
    use crate::hooks::LoginOutcome;
    use async_trait::async_trait;
    use http::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower_sessions::{MemoryStore, Session};

    #[derive(Default)]
    struct Hooks {
        user: Option<u64>,
        fail_get_user: bool,
        login_redirect: Option<String>,
        logout_redirect: Option<String>,
        fail_logout: bool,
        login_calls: AtomicUsize,
        logout_calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthHooks for Hooks {
        type User = u64;

        async fn get_user(&self, _parts: &Parts) -> Result<Option<u64>, HookError> {
            if self.fail_get_user {
                return Err("identity backend unavailable".into());
            }
            Ok(self.user)
        }

        async fn login_callback(
            &self,
            _parts: &Parts,
            user: u64,
        ) -> Result<LoginOutcome<u64>, HookError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = LoginOutcome::new(user * 10);
            Ok(match &self.login_redirect {
                Some(url) => outcome.redirect_to(url.clone()),
                None => outcome,
            })
        }

        async fn logout_callback(
            &self,
            _parts: &Parts,
            _user: u64,
        ) -> Result<Option<String>, HookError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_logout {
                return Err("audit log offline".into());
            }
            Ok(self.logout_redirect.clone())
        }

        fn login_url(&self, callback_url: &str, _root_path: &str) -> String {
            format!("https://idp.example/authorize?return_to={callback_url}")
        }
    }

    fn settings() -> GateSettings {
        GateConfig::default().resolve().unwrap()
    }

    fn new_session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn parts(uri: &str, session: Option<&Session>, referer: Option<&str>) -> Parts {
        let mut builder = http::Request::builder().uri(uri).header("host", "app.test");
        if let Some(r) = referer {
            builder = builder.header(http::header::REFERER, r);
        }
        let (mut parts, _body) = builder.body(()).unwrap().into_parts();
        if let Some(s) = session {
            parts.extensions.insert(s.clone());
        }
        parts
    }

    fn location(resp: &Response) -> &str {
        resp.headers()
            .get(http::header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_stores_referer_and_redirects_to_idp() {
        let s = new_session();
        let p = parts("/login", Some(&s), Some("/admin/panel"));
        let resp = login(&settings(), &Hooks::default(), &p).await.unwrap();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            location(&resp),
            "https://idp.example/authorize?return_to=http://app.test/login/callback"
        );
        assert_eq!(
            session::login_referer(&s).await.unwrap().as_deref(),
            Some("/admin/panel")
        );
    }

    #[tokio::test]
    async fn test_login_without_session_still_redirects() {
        let p = parts("/anything", None, Some("/admin/panel"));
        let resp = login(&settings(), &Hooks::default(), &p).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_callback_defaults_to_root() {
        let s = new_session();
        let hooks = Hooks {
            user: Some(1),
            ..Default::default()
        };
        let p = parts("/login/callback", Some(&s), None);
        let resp = login_callback(&settings(), &hooks, &p).await.unwrap();
        assert_eq!(location(&resp), "/");
        assert_eq!(
            session::load_user::<u64>(&s, "user").await.unwrap(),
            Some(10)
        );
    }

    #[tokio::test]
    async fn test_callback_without_user_is_silent() {
        let s = new_session();
        session::remember_referer(&s, "/reports").await.unwrap();
        let hooks = Hooks::default();
        let p = parts("/login/callback", Some(&s), None);
        let resp = login_callback(&settings(), &hooks, &p).await.unwrap();

        assert_eq!(location(&resp), "/reports");
        assert_eq!(hooks.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session::load_user::<u64>(&s, "user").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_callback_get_user_error_is_silent() {
        let s = new_session();
        let hooks = Hooks {
            fail_get_user: true,
            ..Default::default()
        };
        let p = parts("/login/callback", Some(&s), None);
        let resp = login_callback(&settings(), &hooks, &p).await.unwrap();
        assert_eq!(location(&resp), "/");
        assert_eq!(hooks.login_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_redirect_override() {
        let s = new_session();
        session::remember_referer(&s, "/reports").await.unwrap();
        let hooks = Hooks {
            user: Some(2),
            login_redirect: Some("/welcome".to_string()),
            ..Default::default()
        };
        let p = parts("/login/callback", Some(&s), None);
        let resp = login_callback(&settings(), &hooks, &p).await.unwrap();
        assert_eq!(location(&resp), "/welcome");
    }

    #[tokio::test]
    async fn test_callback_empty_override_is_ignored() {
        let s = new_session();
        session::remember_referer(&s, "/reports").await.unwrap();
        let hooks = Hooks {
            user: Some(2),
            login_redirect: Some(String::new()),
            ..Default::default()
        };
        let p = parts("/login/callback", Some(&s), None);
        let resp = login_callback(&settings(), &hooks, &p).await.unwrap();
        assert_eq!(location(&resp), "/reports");
    }

    #[tokio::test]
    async fn test_logout_clears_user() {
        let s = new_session();
        session::store_user(&s, "user", &5u64).await.unwrap();
        let hooks = Hooks::default();
        let p = parts("/logout", Some(&s), Some("/docs"));
        let resp = logout(&settings(), &hooks, &p).await.unwrap();

        assert_eq!(location(&resp), "/docs");
        assert_eq!(hooks.logout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session::load_user::<u64>(&s, "user").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_override() {
        let s = new_session();
        session::store_user(&s, "user", &5u64).await.unwrap();
        let hooks = Hooks {
            logout_redirect: Some("https://idp.example/logout".to_string()),
            ..Default::default()
        };
        let p = parts("/logout", Some(&s), None);
        let resp = logout(&settings(), &hooks, &p).await.unwrap();
        assert_eq!(location(&resp), "https://idp.example/logout");
    }

    #[tokio::test]
    async fn test_logout_error_propagates_and_keeps_user() {
        let s = new_session();
        session::store_user(&s, "user", &5u64).await.unwrap();
        let hooks = Hooks {
            fail_logout: true,
            ..Default::default()
        };
        let p = parts("/logout", Some(&s), None);
        let err = logout(&settings(), &hooks, &p).await.unwrap_err();

        assert!(matches!(err, GateError::LogoutCallback(_)));
        assert_eq!(session::load_user::<u64>(&s, "user").await.unwrap(), Some(5));
    }
}
