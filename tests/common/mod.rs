use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use event_budget_server::{AppState, auth, database, events, participants, payments};
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

#[derive(Clone)]
pub struct TestConfig {
    pub temp_dir_path: String,
}

impl TestConfig {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let temp_dir_path = temp_dir.path().to_string_lossy().to_string();
        std::mem::forget(temp_dir);
        Ok(Self { temp_dir_path })
    }

    pub fn data_path(&self) -> String {
        self.temp_dir_path.clone()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn setup_test_app() -> anyhow::Result<TestApp> {
    let test_config = TestConfig::new()?;

    let data_path = test_config.data_path();
    std::fs::create_dir_all(&data_path)?;

    let db = database::init_db(&data_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize database: {}", e))?;

    let app_state = AppState { db };

    let router = Router::new()
        .route("/auth/register", axum::routing::post(auth::register))
        .route("/auth/login", axum::routing::post(auth::login))
        .route("/auth/me", axum::routing::get(auth::me))
        .route("/auth/logout", axum::routing::post(auth::logout))
        .route(
            "/events",
            axum::routing::post(events::create_event).get(events::list_events),
        )
        .route(
            "/events/{id}",
            axum::routing::get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/{event_id}/participants",
            axum::routing::post(participants::create_participant),
        )
        .route(
            "/events/{event_id}/participants/{id}",
            axum::routing::put(participants::update_participant)
                .delete(participants::delete_participant),
        )
        .route(
            "/events/{event_id}/payments",
            axum::routing::post(payments::create_payment),
        )
        .route(
            "/events/{event_id}/payments/{id}",
            axum::routing::put(payments::update_payment)
                .delete(payments::delete_payment),
        )
        .with_state(app_state.clone());

    Ok(TestApp {
        router,
        state: app_state,
    })
}

#[allow(dead_code)]
pub async fn create_test_user(
    app_state: &AppState,
    username: &str,
    password: &str,
) -> anyhow::Result<String> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString},
    };
    use password_hash::rand_core::OsRng;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4().to_string();
    let email = format!("{}@example.com", username);

    let conn = app_state.db.write().await;
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        (
            user_id.as_str(),
            username,
            email.as_str(),
            hash.as_str(),
            "2024-01-01T00:00:00Z",
        ),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create test user: {}", e))?;

    Ok(user_id)
}

/// Logs in and returns the bearer token from the response body.
#[allow(dead_code)]
pub async fn login_user(app: &Router, username: &str, password: &str) -> anyhow::Result<String> {
    let payload = serde_json::json!({
        "username": username,
        "password": password
    });

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .map_err(|e| anyhow::anyhow!("Failed to build request: {}", e))?;

    let response = app
        .clone()
        .oneshot(request)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to execute request: {}", e))?;

    if response.status() != StatusCode::OK {
        return Err(anyhow::anyhow!("Login failed: {}", response.status()));
    }

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read response body: {}", e))?;
    let body: Value = serde_json::from_slice(&bytes)?;

    body["token"]
        .as_str()
        .map(|token| token.to_string())
        .ok_or_else(|| anyhow::anyhow!("No token in login response"))
}

/// Registers a fresh user through the API and returns its bearer token.
#[allow(dead_code)]
pub async fn register_and_login(app: &TestApp, username: &str) -> anyhow::Result<String> {
    create_test_user(&app.state, username, "secret123").await?;
    login_user(&app.router, username, "secret123").await
}

/// Issues a request with an optional bearer token and JSON body, returning
/// the status plus the parsed body (or the raw text when it is not JSON).
pub async fn api_request(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let body = match payload {
        Some(payload) => Body::from(payload.to_string()),
        None => Body::empty(),
    };

    let response = app
        .router
        .clone()
        .oneshot(builder.body(body).expect("build request"))
        .await
        .expect("execute request");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8(bytes.to_vec()).expect("utf8")));

    (status, body)
}
