use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::error::AppError;
use crate::session::SESSION_COOKIE;
use crate::state::AppState;

/// The session token carried by the request, if any.
pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE).map(|cookie| cookie.value())
}

/// Id of the logged-in user. Handlers taking this reject anonymous
/// requests with 401 before running.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        match state.identity.whoami(session_token(&jar)).await {
            Ok(user_id) => Ok(CurrentUser(user_id)),
            Err(AppError::Auth(_)) => Err(AppError::Auth("auth required")),
            Err(err) => Err(err),
        }
    }
}
