use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use vitaltrack::config::{CookieConfig, DeployProfile, HashConfig, RateLimitConfig};
use vitaltrack::repository::memory::{MemoryRecordRepository, MemoryUserRepository};
use vitaltrack::routes;
use vitaltrack::services::PasswordHasher;
use vitaltrack::session::MemorySessionStore;
use vitaltrack::{AppState, Backends};

struct TestApp {
    router: Router,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestResponse {
    /// `name=value` part of the session cookie set by this response.
    fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with("vt_session="))
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }
}

impl TestApp {
    fn new() -> Self {
        Self::with_rate_limit(100)
    }

    fn with_rate_limit(max_attempts: usize) -> Self {
        Self::build(DeployProfile::SameOrigin, max_attempts, &[])
    }

    fn cross_origin(origins: &[String]) -> Self {
        Self::build(DeployProfile::CrossOrigin, 100, origins)
    }

    fn build(profile: DeployProfile, max_attempts: usize, origins: &[String]) -> Self {
        let backends = Backends {
            users: Arc::new(MemoryUserRepository::default()),
            records: Arc::new(MemoryRecordRepository::default()),
            sessions: Arc::new(MemorySessionStore::default()),
        };
        let hasher =
            PasswordHasher::new(HashConfig { memory_kib: 8, iterations: 1, parallelism: 1 }).unwrap();
        let state = AppState::new(
            backends,
            hasher,
            CookieConfig::for_profile(profile, false, Duration::from_secs(3600)),
            RateLimitConfig {
                max_attempts,
                window: Duration::from_secs(900),
                trust_proxy: false,
            },
        );
        Self {
            router: routes::build_router(
                state,
                Path::new("public"),
                routes::cors_for_profile(profile, origins),
            ),
        }
    }

    async fn request(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&body).unwrap())
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, headers, body }
    }

    async fn register(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Registers a fresh user and returns its session cookie.
    async fn signed_in(&self, email: &str) -> String {
        let response = self.register(email, "pw").await;
        assert_eq!(response.status, StatusCode::OK);
        response.session_cookie().expect("register sets a session cookie")
    }
}

#[tokio::test]
async fn test_register_login_create_list_delete() {
    let app = TestApp::new();

    let registered = app.register("a@x.com", "pw").await;
    assert_eq!(registered.status, StatusCode::OK);
    assert_eq!(registered.body["ok"], true);
    let user_id = registered.body["userId"].as_str().unwrap().to_string();

    let logged_in = app.login("a@x.com", "pw").await;
    assert_eq!(logged_in.status, StatusCode::OK);
    assert_eq!(logged_in.body["userId"], user_id.as_str());
    let cookie = logged_in.session_cookie().unwrap();

    let created = app
        .request(
            Method::POST,
            "/api/workouts",
            Some(&cookie),
            Some(json!({"date": "2024-01-01", "exercise": "squat", "weight": "100", "reps": "5"})),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["ok"], true);
    let id = created.body["id"].as_str().unwrap().to_string();

    let listed = app.request(Method::GET, "/api/workouts", Some(&cookie), None).await;
    assert_eq!(listed.status, StatusCode::OK);
    let rows = listed.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], id.as_str());
    assert_eq!(rows[0]["user_id"], user_id.as_str());
    assert_eq!(rows[0]["date"], "2024-01-01");
    assert_eq!(rows[0]["exercise"], "squat");
    assert_eq!(rows[0]["weight"], 100.0);
    assert_eq!(rows[0]["reps"], 5.0);
    assert_eq!(rows[0]["notes"], Value::Null);

    let deleted = app
        .request(Method::DELETE, &format!("/api/workouts/{id}"), Some(&cookie), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({ "ok": true }));

    let listed = app.request(Method::GET, "/api/workouts", Some(&cookie), None).await;
    assert_eq!(listed.body, json!([]));
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let app = TestApp::new();
    let response = app.register("cookie@x.com", "pw").await;
    let raw = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_string();

    assert!(raw.starts_with("vt_session="));
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));
    assert!(raw.contains("Path=/"));
    assert!(raw.contains("Max-Age=3600"));
    assert!(!raw.contains("Secure"));
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new();
    assert_eq!(app.register("dup@x.com", "pw").await.status, StatusCode::OK);

    let second = app.register("dup@x.com", "other").await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.body, json!({ "error": "email already exists" }));

    // the original password still works, so nothing was overwritten
    assert_eq!(app.login("dup@x.com", "pw").await.status, StatusCode::OK);
    assert_eq!(app.login("dup@x.com", "other").await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_credentials_are_rejected() {
    let app = TestApp::new();
    let response = app
        .request(Method::POST, "/api/auth/register", None, Some(json!({ "email": "x@x.com" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({ "error": "email and password required" }));

    let response = app.login("", "pw").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let app = TestApp::new();
    app.register("known@x.com", "right").await;

    let wrong_password = app.login("known@x.com", "wrong").await;
    let unknown_email = app.login("nobody@x.com", "right").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
    assert_eq!(wrong_password.body, json!({ "error": "invalid credentials" }));
    assert!(wrong_password.session_cookie().is_none());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let cookie = app.signed_in("bye@x.com").await;

    let me = app.request(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert!(me.body["userId"].is_string());

    let logout = app
        .request(Method::POST, "/api/auth/logout", Some(&cookie), Some(json!({})))
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body, json!({ "ok": true }));

    let me = app.request(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.body, json!({ "error": "not logged in" }));

    // a second logout without any session still succeeds
    let logout = app.request(Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(logout.status, StatusCode::OK);
}

#[tokio::test]
async fn test_record_routes_require_session() {
    let app = TestApp::new();
    for (method, uri) in [
        (Method::GET, "/api/workouts"),
        (Method::POST, "/api/workouts"),
        (Method::GET, "/api/meals"),
        (Method::DELETE, "/api/meals/abc"),
    ] {
        let response = app
            .request(method, uri, Some("vt_session=forged"), Some(json!({})))
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(response.body, json!({ "error": "auth required" }));
    }
}

#[tokio::test]
async fn test_numeric_fields_validate_and_default_to_null() {
    let app = TestApp::new();
    let cookie = app.signed_in("nums@x.com").await;

    let rejected = app
        .request(
            Method::POST,
            "/api/workouts",
            Some(&cookie),
            Some(json!({"date": "2024-01-01", "exercise": "squat", "weight": "abc"})),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.body, json!({ "error": "weight must be a number" }));

    let missing = app
        .request(Method::POST, "/api/workouts", Some(&cookie), Some(json!({"exercise": "squat"})))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body, json!({ "error": "date and exercise required" }));

    let created = app
        .request(
            Method::POST,
            "/api/workouts",
            Some(&cookie),
            Some(json!({"date": "2024-01-01", "exercise": "plank", "reps": 3})),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let listed = app.request(Method::GET, "/api/workouts", Some(&cookie), None).await;
    let rows = listed.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["weight"], Value::Null);
    assert_eq!(rows[0]["reps"], 3.0);
}

#[tokio::test]
async fn test_lists_are_private_and_sorted() {
    let app = TestApp::new();
    let alice = app.signed_in("alice@x.com").await;
    let bob = app.signed_in("bob@x.com").await;

    for date in ["2024-01-15", "2024-02-01", "2023-11-30"] {
        let response = app
            .request(
                Method::POST,
                "/api/meals",
                Some(&alice),
                Some(json!({"date": date, "food": "rice", "calories": 300})),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let listed = app.request(Method::GET, "/api/meals", Some(&alice), None).await;
    let dates: Vec<&str> = listed
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, ["2024-02-01", "2024-01-15", "2023-11-30"]);

    let bobs = app.request(Method::GET, "/api/meals", Some(&bob), None).await;
    assert_eq!(bobs.body, json!([]));
}

#[tokio::test]
async fn test_update_meal_and_foreign_update_is_not_found() {
    let app = TestApp::new();
    let owner = app.signed_in("owner@x.com").await;
    let other = app.signed_in("other@x.com").await;

    let created = app
        .request(
            Method::POST,
            "/api/meals",
            Some(&owner),
            Some(json!({"date": "2024-03-01", "food": "pasta", "calories": "650", "notes": "dinner"})),
        )
        .await;
    let id = created.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/meals/{id}");

    let foreign = app
        .request(Method::PUT, &uri, Some(&other), Some(json!({"date": "2024-03-01", "food": "stolen"})))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.body, json!({ "error": "not found" }));

    let missing = app
        .request(
            Method::PUT,
            "/api/meals/00000000-0000-0000-0000-000000000000",
            Some(&owner),
            Some(json!({"date": "2024-03-01", "food": "ghost"})),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let updated = app
        .request(
            Method::PUT,
            &uri,
            Some(&owner),
            Some(json!({"date": "2024-03-02", "food": "pasta", "calories": 700, "protein": "25.5"})),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body, json!({ "ok": true }));

    let listed = app.request(Method::GET, "/api/meals", Some(&owner), None).await;
    let row = &listed.body[0];
    assert_eq!(row["date"], "2024-03-02");
    assert_eq!(row["food"], "pasta");
    assert_eq!(row["calories"], 700.0);
    assert_eq!(row["protein"], 25.5);
    assert_eq!(row["carbs"], Value::Null);
    assert_eq!(row["notes"], Value::Null);
}

#[tokio::test]
async fn test_delete_of_missing_record_succeeds() {
    let app = TestApp::new();
    let cookie = app.signed_in("del@x.com").await;
    app.request(
        Method::POST,
        "/api/workouts",
        Some(&cookie),
        Some(json!({"date": "2024-01-01", "exercise": "deadlift"})),
    )
    .await;

    for uri in ["/api/workouts/00000000-0000-0000-0000-000000000000", "/api/workouts/nope"] {
        let response = app.request(Method::DELETE, uri, Some(&cookie), None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({ "ok": true }));
    }

    let listed = app.request(Method::GET, "/api/workouts", Some(&cookie), None).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let app = TestApp::new();
    let cookie = app.signed_in("json@x.com").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/workouts")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let app = TestApp::with_rate_limit(2);

    assert_eq!(app.login("x@x.com", "pw").await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("x@x.com", "pw").await.status, StatusCode::UNAUTHORIZED);

    let limited = app.login("x@x.com", "pw").await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers.contains_key(header::RETRY_AFTER));
    assert!(limited.body["error"].is_string());

    // record routes are not subject to the auth limiter
    let workouts = app.request(Method::GET, "/api/workouts", None, None).await;
    assert_eq!(workouts.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_unknown_api_paths() {
    let app = TestApp::new();

    for uri in ["/healthz", "/api/healthz"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({ "ok": true }));
        assert_eq!(response.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    let response = app.request(Method::GET, "/api/nothing-here", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, json!({ "error": "not found" }));
}

#[tokio::test]
async fn test_cross_origin_cookie_is_secure_and_same_site_none() {
    let app = TestApp::cross_origin(&["https://client.example".to_string()]);
    let response = app.register("cross@x.com", "pw").await;
    assert_eq!(response.status, StatusCode::OK);

    let raw = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_string();
    assert!(raw.contains("SameSite=None"));
    assert!(raw.contains("Secure"));
    assert!(raw.contains("HttpOnly"));
}

#[tokio::test]
async fn test_cors_preflight_allows_listed_origin_with_credentials() {
    let app = TestApp::cross_origin(&["https://client.example".to_string()]);

    let preflight = |origin: &'static str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/auth/login")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app.router.clone().oneshot(preflight("https://client.example")).await.unwrap();
    assert!(allowed.status().is_success());
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://client.example"
    );
    assert_eq!(allowed.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let denied = app.router.clone().oneshot(preflight("https://evil.example")).await.unwrap();
    assert!(!denied.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_same_origin_has_no_cors_headers() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .header(header::ORIGIN, "https://client.example")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_wrong_method_uses_error_envelope() {
    let app = TestApp::new();
    let cookie = app.signed_in("method@x.com").await;
    let record_uri = format!("/api/workouts/{}", uuid::Uuid::new_v4());

    for (method, uri) in [
        (Method::PATCH, "/api/workouts"),
        (Method::GET, record_uri.as_str()),
        (Method::GET, "/api/auth/login"),
    ] {
        let response = app.request(method, uri, Some(&cookie), None).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        assert_eq!(response.body, json!({ "error": "method not allowed" }));
        assert!(response.headers.contains_key(header::ALLOW));
    }
}

#[tokio::test]
async fn test_undecodable_record_id_is_treated_as_unknown() {
    let app = TestApp::new();
    let cookie = app.signed_in("bytes@x.com").await;

    let deleted = app.request(Method::DELETE, "/api/workouts/%FF", Some(&cookie), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({ "ok": true }));

    let updated = app
        .request(
            Method::PUT,
            "/api/workouts/%FF",
            Some(&cookie),
            Some(json!({"date": "2024-01-01", "exercise": "squat"})),
        )
        .await;
    assert_eq!(updated.status, StatusCode::NOT_FOUND);
    assert_eq!(updated.body, json!({ "error": "not found" }));
}
