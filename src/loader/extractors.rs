use super::scope::RequestScope;
use crate::error::TidegateError;
use crate::session::SessionState;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use std::future::Future;

fn scoped_session(parts: &Parts) -> Option<SessionState> {
    parts
        .extensions
        .get::<RequestScope>()
        .and_then(|scope| scope.session.clone())
}

/// Axum extractor for the loaded session, if any
///
/// Never rejects. Yields `None` when no session was loaded, including when
/// the route is not behind a [`StoredSessionLoaderLayer`].
///
/// [`StoredSessionLoaderLayer`]: super::StoredSessionLoaderLayer
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentSession(session): CurrentSession) -> String {
///     match session {
///         Some(session) => format!("Hello, {}", session.user),
///         None => "Hello, stranger".to_string(),
///     }
/// }
/// ```
pub struct CurrentSession(pub Option<SessionState>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let session = scoped_session(parts);
        async move { Ok(CurrentSession(session)) }
    }
}

/// Axum extractor for routes that need a signed-in user
///
/// Rejects with 401 when no session was loaded.
pub struct RequireSession(pub SessionState);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = TidegateError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let session = scoped_session(parts);
        async move {
            session
                .map(RequireSession)
                .ok_or_else(|| TidegateError::unauthorized("no session"))
        }
    }
}
