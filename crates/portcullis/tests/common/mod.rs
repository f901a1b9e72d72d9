//! Shared harness for gate integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::request::Parts;
use http::{Request, StatusCode};
use portcullis::{
    AuthGateLayer, AuthHooks, CurrentUser, GateConfig, GateSettings, HookError, LoginOutcome,
    PathMatcher,
};
use serde::{Deserialize, Serialize};
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use tower_sessions::{MemoryStore, Session};

/// User value stored in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
}

/// Hooks modelled on an OAuth-style identity provider: a user is resolved
/// only when the callback carries `code=<id>`.
#[derive(Default)]
pub struct CodeHooks {
    pub get_user_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl CodeHooks {
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthHooks for CodeHooks {
    type User = Account;

    async fn get_user(&self, parts: &Parts) -> Result<Option<Account>, HookError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        let code = parts
            .uri
            .query()
            .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("code=")));
        match code {
            Some(id) => Ok(Some(Account { id: id.parse()? })),
            None => Ok(None),
        }
    }

    async fn login_callback(
        &self,
        _parts: &Parts,
        user: Account,
    ) -> Result<LoginOutcome<Account>, HookError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(LoginOutcome::new(user))
    }

    async fn logout_callback(
        &self,
        _parts: &Parts,
        _user: Account,
    ) -> Result<Option<String>, HookError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

/// Settings protecting `/admin*` under the default root.
pub fn admin_settings() -> GateSettings {
    GateConfig::default()
        .resolve()
        .unwrap()
        .with_matcher(PathMatcher::prefix("/admin*"))
}

/// Inner service answering 200 with the id of the user the gate handed over.
pub fn app_service() -> BoxCloneService<Request<Body>, Response, Infallible> {
    BoxCloneService::new(tower::service_fn(|req: Request<Body>| async move {
        let who = req
            .extensions()
            .get::<CurrentUser<Account>>()
            .map(|u| u.0.id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());
        Ok::<_, Infallible>((StatusCode::OK, who).into_response())
    }))
}

/// A fresh, store-backed session.
pub fn new_session() -> Session {
    Session::new(None, Arc::new(MemoryStore::default()), None)
}

/// Send one request through a gate in front of [`app_service`], with `session`
/// attached the way a session layer would.
pub async fn send(
    hooks: &Arc<CodeHooks>,
    session: &Session,
    builder: http::request::Builder,
) -> Response {
    let service = AuthGateLayer::new(admin_settings(), hooks.clone()).layer(app_service());
    let req = builder
        .extension(session.clone())
        .body(Body::empty())
        .unwrap();
    service.oneshot(req).await.unwrap()
}

/// The `Location` header of a response.
pub fn location(resp: &Response) -> Option<String> {
    resp.headers()
        .get(http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// The response body as text.
pub async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
