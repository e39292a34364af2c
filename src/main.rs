use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

use chunkbox::config::Config;
use chunkbox::progress::BroadcastConfig;
use chunkbox::server::{build_router, print_startup_banner, start_server};
use chunkbox::session::spawn_idle_sweeper;
use chunkbox::state::AppState;

// use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    // load configuration from environment variables
    let config = Config::from_env();

    // build tokio runtime with configured worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        // create the storage root if it doesn't exist
        if !config.storage_root.exists() {
            std::fs::create_dir_all(&config.storage_root)
                .expect("Failed to create storage root");
            tracing::info!("Created storage root at: {:?}", config.storage_root);
        }

        // create shared state
        let state = Arc::new(AppState::new(
            config.storage_root.clone(),
            BroadcastConfig {
                step_percent: config.progress_step_percent,
                step_delay: config.progress_step_delay,
            },
        ));

        // reclaim abandoned sessions in the background
        spawn_idle_sweeper(
            state.sessions.clone(),
            state.store.clone(),
            config.session_idle,
        );

        let app = build_router(state, &config);

        let addr = SocketAddr::from((
            config
                .host
                .parse::<std::net::IpAddr>()
                .expect("Invalid HOST"),
            config.port,
        ));

        print_startup_banner(&config);

        start_server(app, addr).await;
    });
}
