//! Session fields owned by the gate, and the authenticated user handed to
//! downstream handlers.

use axum::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower_sessions::Session;

use crate::GateError;

/// Session key remembering where to return after login.
pub const LOGIN_REFERER_KEY: &str = "_loginReferer";

/// The authenticated user, as stored in the session.
///
/// Inserted into request extensions by the gate whenever it lets an
/// authenticated request through to a protected handler. Also usable as an
/// axum extractor; extraction fails with `401` when the gate did not insert it.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser<U>(pub U);

impl<S, U> FromRequestParts<S> for CurrentUser<U>
where
    S: Send + Sync,
    U: Clone + Send + Sync + 'static,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser<U>>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Extract the authenticated user from HTTP request `Parts`, if present.
pub fn user_from_parts<U>(parts: &Parts) -> Option<&U>
where
    U: Send + Sync + 'static,
{
    parts.extensions.get::<CurrentUser<U>>().map(|u| &u.0)
}

/// The request's session, if a session layer is installed in front of the gate.
pub fn session_from_parts(parts: &Parts) -> Option<&Session> {
    parts.extensions.get::<Session>()
}

/// The session user, or `None` when the field is absent.
///
/// A value that no longer deserializes into `U` is removed and treated as absent.
pub(crate) async fn load_user<U>(session: &Session, field: &str) -> Result<Option<U>, GateError>
where
    U: DeserializeOwned,
{
    match session.get::<U>(field).await {
        Ok(user) => Ok(user),
        Err(tower_sessions::session::Error::SerdeJson(e)) => {
            log::warn!("Discarding unreadable session field '{field}': {e}");
            session.remove_value(field).await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Store a newly logged-in user under a fresh session ID.
pub(crate) async fn store_user<U>(session: &Session, field: &str, user: &U) -> Result<(), GateError>
where
    U: Serialize,
{
    session.cycle_id().await?;
    session.insert(field, user).await?;
    Ok(())
}

pub(crate) async fn clear_user(session: &Session, field: &str) -> Result<(), GateError> {
    session.remove_value(field).await?;
    Ok(())
}

pub(crate) async fn remember_referer(session: &Session, referer: &str) -> Result<(), GateError> {
    session.insert(LOGIN_REFERER_KEY, referer).await?;
    Ok(())
}

pub(crate) async fn login_referer(session: &Session) -> Result<Option<String>, GateError> {
    Ok(session
        .get::<String>(LOGIN_REFERER_KEY)
        .await?
        .filter(|r| !r.is_empty()))
}
