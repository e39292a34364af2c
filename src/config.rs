use std::path::PathBuf;
use std::time::Duration;

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// root directory for in-flight chunks and merged artifacts
    pub storage_root: PathBuf,
    /// server bind address
    pub host: String,
    /// server port
    pub port: u16,
    /// maximum size of a single request body in bytes
    pub max_upload_size: usize,
    /// chunk size used by the bundled upload client
    pub chunk_size: usize,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// purge sessions with no activity for this long
    pub session_idle: Duration,
    /// percentage increment per simulated remote-transfer event
    pub progress_step_percent: u8,
    /// delay between simulated remote-transfer events
    pub progress_step_delay: Duration,
    /// cors allowed origins (comma-separated, `*` for any)
    pub cors_origins: Vec<String>,
    /// rate limit: requests per minute
    pub rate_limit_per_minute: u64,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        // parse cors origins
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // 0% steps would loop forever, clamp to at least 1
        let progress_step_percent = std::env::var("PROGRESS_STEP_PERCENT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10u8)
            .clamp(1, 100);

        Self {
            storage_root: std::env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "./uploads".to_string())
                .into(),
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(7070),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000 * 1024), // matches the client-side max
            chunk_size: std::env::var("CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500 * 1024),
            worker_threads: std::env::var("WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(8),
            session_idle: Duration::from_secs(
                std::env::var("SESSION_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30 * 60),
            ),
            progress_step_percent,
            progress_step_delay: Duration::from_millis(
                std::env::var("PROGRESS_STEP_MILLIS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(400),
            ),
            cors_origins,
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|r| r.parse().ok())
                .unwrap_or(600),
        }
    }
}
