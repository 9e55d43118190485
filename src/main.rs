use axum::{
    Router,
    response::Html,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use event_budget_server::{AppState, auth, config::Config, database, events, participants, payments};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load and validate configuration
    let config = Config::from_env().map_err(|e| format!("Configuration error: {}", e))?;

    // Initialize database
    let db = database::init_db(&config.data_path)
        .await
        .map_err(|e| format!("Failed to initialize database: {}", e))?;

    let app_state = AppState { db };

    // Configure CORS to allow frontend requests
    let frontend_origin =
        std::env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

    let frontend_origin_header = frontend_origin
        .parse::<axum::http::HeaderValue>()
        .map_err(|e| format!("Invalid FRONTEND_ORIGIN '{}': {}", frontend_origin, e))?;

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin_header)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::AUTHORIZATION,
        ]);

    // Build application router
    let app = Router::new()
        .route("/", get(root))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/events",
            post(events::create_event).get(events::list_events),
        )
        .route(
            "/events/{id}",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/{event_id}/participants",
            post(participants::create_participant),
        )
        .route(
            "/events/{event_id}/participants/{id}",
            put(participants::update_participant).delete(participants::delete_participant),
        )
        .route(
            "/events/{event_id}/payments",
            post(payments::create_payment),
        )
        .route(
            "/events/{event_id}/payments/{id}",
            put(payments::update_payment).delete(payments::delete_payment),
        )
        .layer(cors)
        .with_state(app_state);

    // Create TCP listener with proper error handling
    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", bind_address, e))?;

    info!("Server running on http://{}", bind_address);

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}

async fn root() -> Html<&'static str> {
    Html("<h1>Event Budget Server</h1><p>API Ready</p>")
}
