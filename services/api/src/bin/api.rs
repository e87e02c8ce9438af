//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{AtCoderProblemsAdapter, DbAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, session_handler, signup_handler},
        guest_problems_handler, list_problems_handler, list_statuses_handler,
        middleware::require_auth,
        profile::{get_profile_handler, update_profile_handler},
        refresh_problems_handler,
        rest::ApiDoc,
        state::AppState,
        update_memo_handler, update_status_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use problem_dojo_core::{BoardRegistry, MergeEngine};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Public Problem API Adapter ---
    let http_client = AtCoderProblemsAdapter::build_client(config.http_timeout)?;
    let problem_api = Arc::new(AtCoderProblemsAdapter::new(
        http_client,
        config.problems_url.clone(),
        config.problem_models_url.clone(),
        config.submissions_url.clone(),
    ));

    // --- 4. Build the Merge Engine and Shared AppState ---
    let engine = Arc::new(MergeEngine::new(
        problem_api.clone(),
        problem_api.clone(),
        problem_api,
        db_adapter.clone(),
        config.drain,
    ));

    let app_state = Arc::new(AppState {
        db: db_adapter.clone(),
        annotations: db_adapter,
        engine,
        boards: Arc::new(BoardRegistry::with_capacity(config.max_boards)),
        config: config.clone(),
    });

    // --- 5. Configure CORS ---
    let allowed_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/session", get(session_handler))
        .route("/statuses", get(list_statuses_handler))
        .route("/guest/{atcoder_id}/problems", get(guest_problems_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/profile", get(get_profile_handler).put(update_profile_handler))
        .route("/problems", get(list_problems_handler))
        .route("/problems/refresh", post(refresh_problems_handler))
        .route("/problems/{problem_id}/status", put(update_status_handler))
        .route("/problems/{problem_id}/memo", put(update_memo_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
