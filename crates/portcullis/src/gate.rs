//! The auth gate: Tower middleware that classifies each request and either
//! answers it with a login/callback/logout redirect or forwards it.
//!
//! [`AuthGateLayer`] and [`AuthGateService`] wrap any inner service. Both are
//! generic over [`AuthHooks`]; plug in any identity source.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::Request;
use http::request::Parts;
use tower::{Layer, Service};

use crate::GateError;
use crate::classify::{PathClass, classify};
use crate::config::GateSettings;
use crate::flows::{self, resolve_user};
use crate::hooks::{AuthHooks, DeferredRedirect};
use crate::respond::redirect;
use crate::session::{self, CurrentUser, session_from_parts};

/// The gate's request handling, independent of Tower.
///
/// Cheap to clone: settings and hooks are shared.
pub struct AuthGate<H: AuthHooks> {
    settings: Arc<GateSettings>,
    hooks: Arc<H>,
}

impl<H: AuthHooks> Clone for AuthGate<H> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<H: AuthHooks> AuthGate<H> {
    /// Create a gate from resolved settings and application hooks.
    pub fn new(settings: GateSettings, hooks: Arc<H>) -> Self {
        Self {
            settings: Arc::new(settings),
            hooks,
        }
    }

    /// The settings this gate runs on.
    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Handle one request, calling `inner` when the request may proceed.
    ///
    /// Login and logout callback failures and session store failures are
    /// returned as errors; everything else becomes a response.
    pub async fn handle<S>(&self, req: Request<Body>, mut inner: S) -> Result<Response, GateError>
    where
        S: Service<Request<Body>, Error = Infallible>,
        S::Response: IntoResponse,
    {
        let settings = &*self.settings;
        let hooks = &*self.hooks;

        if !settings.enabled {
            return Ok(call_inner(&mut inner, req).await);
        }

        let (mut parts, body) = req.into_parts();
        let class = classify(settings, session_from_parts(&parts).is_some(), parts.uri.path());
        log::trace!("{} {} classified as {class:?}", parts.method, parts.uri.path());

        match class {
            PathClass::Login => flows::login(settings, hooks, &parts).await,
            PathClass::LoginCallback => flows::login_callback(settings, hooks, &parts).await,
            PathClass::Logout => flows::logout(settings, hooks, &parts).await,
            PathClass::Unprotected => {
                Ok(call_inner(&mut inner, Request::from_parts(parts, body)).await)
            }
            PathClass::Protected => {
                if let Some(user) = self.authenticated_user(&parts).await? {
                    parts.extensions.insert(CurrentUser(user));
                    return Ok(call_inner(&mut inner, Request::from_parts(parts, body)).await);
                }

                let Some(user) = resolve_user(hooks, &parts).await else {
                    let deferred = self.login_redirect(&parts);
                    return Ok(hooks.redirect_handler(&parts, deferred).await);
                };

                let outcome = hooks
                    .login_callback(&parts, user)
                    .await
                    .map_err(GateError::LoginCallback)?;
                if let Some(session) = session_from_parts(&parts) {
                    session::store_user(session, &settings.user_field, &outcome.user).await?;
                }
                if let Some(url) = outcome.redirect_override() {
                    return Ok(redirect(&parts.headers, url));
                }

                log::debug!("Recognised user without a login round-trip");
                parts.extensions.insert(CurrentUser(outcome.user));
                Ok(call_inner(&mut inner, Request::from_parts(parts, body)).await)
            }
        }
    }

    /// The session user, if present and accepted by [`AuthHooks::login_check`].
    async fn authenticated_user(&self, parts: &Parts) -> Result<Option<H::User>, GateError> {
        let Some(session) = session_from_parts(parts) else {
            return Ok(None);
        };
        let user = session::load_user::<H::User>(session, &self.settings.user_field).await?;
        Ok(user.filter(|u| self.hooks.login_check(parts, u)))
    }

    /// The default response for an unauthenticated visit to a protected path.
    fn login_redirect(&self, parts: &Parts) -> DeferredRedirect {
        let current = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path());
        let encoded: String = url::form_urlencoded::byte_serialize(current.as_bytes()).collect();
        let location = format!("{}?redirect={encoded}", self.settings.login_path);

        let headers = parts.headers.clone();
        let target = location.clone();
        DeferredRedirect::new(location, move || redirect(&headers, &target))
    }
}

async fn call_inner<S>(inner: &mut S, req: Request<Body>) -> Response
where
    S: Service<Request<Body>, Error = Infallible>,
    S::Response: IntoResponse,
{
    inner
        .call(req)
        .await
        .unwrap_or_else(|infallible| match infallible {})
        .into_response()
}

/// Tower `Layer` that puts an [`AuthGate`] in front of services.
pub struct AuthGateLayer<H: AuthHooks> {
    gate: AuthGate<H>,
}

impl<H: AuthHooks> Clone for AuthGateLayer<H> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<H: AuthHooks> AuthGateLayer<H> {
    /// Create a new gate layer with the given settings and hooks.
    pub fn new(settings: GateSettings, hooks: Arc<H>) -> Self {
        Self {
            gate: AuthGate::new(settings, hooks),
        }
    }
}

impl<H: AuthHooks, S> Layer<S> for AuthGateLayer<H> {
    type Service = AuthGateService<H, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthGateService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Tower `Service` that runs the gate before forwarding requests.
///
/// Gate errors are logged and rendered with [`GateError`]'s `IntoResponse`.
pub struct AuthGateService<H: AuthHooks, S> {
    inner: S,
    gate: AuthGate<H>,
}

impl<H: AuthHooks, S: Clone> Clone for AuthGateService<H, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<H, S> Service<Request<Body>> for AuthGateService<H, S>
where
    H: AuthHooks,
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        Box::pin(async move {
            let path = req.uri().path().to_string();
            match gate.handle(req, inner).await {
                Ok(resp) => Ok(resp),
                Err(err) => {
                    log::error!("Auth gate failed for {path}: {err}");
                    Ok(err.into_response())
                }
            }
        })
    }
}
