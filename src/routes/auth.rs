use axum::{extract::State, response::Json};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar},
    WithRejection,
};
use serde_json::{json, Value};

use crate::config::CookieConfig;
use crate::error::AppError;
use crate::extract::session_token;
use crate::models::auth::{AuthResponse, CredentialsRequest, MeResponse};
use crate::session::{Session, SESSION_COOKIE};
use crate::state::AppState;

fn session_cookie(config: &CookieConfig, session: &Session) -> Cookie<'static> {
    let max_age = time::Duration::try_from(config.ttl).unwrap_or(time::Duration::DAY);
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(config.same_site)
        .max_age(max_age)
        .build()
}

fn cleared_cookie(config: &CookieConfig) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE)
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(config.same_site)
        .build()
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let session = state.identity.register(payload, session_token(&jar)).await?;
    let user_id = session.user_id;
    let jar = jar.add(session_cookie(&state.cookie, &session));
    Ok((jar, Json(AuthResponse { ok: true, user_id })))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let session = state.identity.login(payload, session_token(&jar)).await?;
    let user_id = session.user_id;
    let jar = jar.add(session_cookie(&state.cookie, &session));
    Ok((jar, Json(AuthResponse { ok: true, user_id })))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), AppError> {
    state.identity.logout(session_token(&jar)).await?;
    let jar = jar.remove(cleared_cookie(&state.cookie));
    Ok((jar, Json(json!({ "ok": true }))))
}

pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<MeResponse>, AppError> {
    let user_id = state.identity.whoami(session_token(&jar)).await?;
    Ok(Json(MeResponse { user_id }))
}
