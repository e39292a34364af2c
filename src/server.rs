use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::config::Config;
use crate::handlers::{health_check, trigger_progress, upload_chunk, upload_complete};
use crate::middleware::add_security_headers;
use crate::state::AppState;
use crate::utils::shutdown_signal;
use crate::ws::upload_socket;

/// build the upload api router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!(
        "Building router with max upload size: {} bytes",
        config.max_upload_size
    );

    // configure rate limiting
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second((config.rate_limit_per_minute / 60).max(1))
            .burst_size(10)
            .finish()
            .unwrap(),
    );

    // configure cors
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_origin(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_origin(tower_http::cors::AllowOrigin::list(origins))
            .allow_headers(tower_http::cors::Any)
    };

    Router::new()
        .route("/api/fileupload/chunk", post(upload_chunk))
        .route("/api/fileupload/complete", post(upload_complete))
        .route("/api/fileupload/progress", post(trigger_progress))
        .route("/api/health", get(health_check))
        .route("/ws/upload", get(upload_socket))
        .layer(axum::middleware::from_fn(add_security_headers))
        .layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size))
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// bind and serve until shutdown
pub async fn start_server(app: Router, addr: SocketAddr) {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");

    tracing::debug!("Listener bound to {}", addr);
    tracing::info!("Server running and ready to accept connections");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
    }
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("Chunkbox starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 UPLOAD API: http://{}:{}/api/fileupload", config.host, config.port);
    tracing::info!("🔌 PROGRESS CHANNEL: ws://{}:{}/ws/upload", config.host, config.port);
    tracing::info!(
        "📁 Storage root: {:?}",
        config
            .storage_root
            .canonicalize()
            .unwrap_or(config.storage_root.clone())
    );
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
