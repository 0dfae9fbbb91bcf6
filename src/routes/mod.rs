use std::path::Path;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::DeployProfile;
use crate::rate_limit::limit_auth_attempts;
use crate::state::AppState;

pub mod auth;
pub mod health;
pub mod records;

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

/// Gives the router's bare 405 the JSON error body, keeping its `Allow` header.
async fn method_not_allowed_envelope(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let mut enveloped = (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "method not allowed" })),
    )
        .into_response();
    if let Some(allow) = response.headers().get(header::ALLOW) {
        enveloped.headers_mut().insert(header::ALLOW, allow.clone());
    }
    enveloped
}

/// CORS for the cross-origin profile: listed origins only, with credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// The CORS layer a deployment profile needs, if any.
pub fn cors_for_profile(profile: DeployProfile, origins: &[String]) -> Option<CorsLayer> {
    match profile {
        DeployProfile::SameOrigin => None,
        DeployProfile::CrossOrigin => Some(cors_layer(origins)),
    }
}

/// Builds the whole application: JSON API under `/api`, health check, and
/// the static client as fallback.
pub fn build_router(state: AppState, static_dir: &Path, cors: Option<CorsLayer>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            limit_auth_attempts,
        ));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/workouts", records::router(state.workouts.clone()))
        .nest("/meals", records::router(state.meals.clone()))
        .route("/healthz", get(health::healthz))
        .fallback(api_not_found)
        .layer(middleware::map_response(method_not_allowed_envelope));

    let client = ServeDir::new(static_dir)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    let mut app = Router::new()
        .route("/healthz", get(health::healthz))
        .nest("/api", api)
        .fallback_service(client)
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ));

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
            .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
    )
}
