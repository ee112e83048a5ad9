//! pdfbatch server
//!
//! REST API for bulk PDF batch processing. A client uploads source
//! documents, submits a batch of merge/split/delete/reorder/rename
//! instructions, and polls the returned job id while the chunked runner
//! works through them; the finished archive is downloadable once the job
//! completes.
//!
//! ## Architecture
//!
//! This binary wires the engine to in-memory stores and exposes:
//!
//! - Batch submission with synchronous validation
//! - Poll-based job status (no push/streaming)
//! - Per-IP rate limiting via tower-governor
//! - Source upload / result download for local mode

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post, put},
    Router,
};
use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pdfbatch_engine::{BatchConfig, MemoryBlobStore, MemoryJobStore};

mod api;
mod error;

use api::{
    handle_download_result, handle_get_job, handle_health, handle_submit_batch,
    handle_upload_file,
};

/// Command-line arguments for the pdfbatch server
#[derive(Parser, Debug)]
#[command(name = "pdfbatch-server")]
#[command(about = "pdfbatch server for bulk PDF batch processing")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Instructions processed concurrently per chunk
    #[arg(long, default_value = "10")]
    chunk_size: usize,

    /// Batch deadline in seconds
    #[arg(long, default_value = "1500")]
    deadline_secs: u64,

    /// Maximum instructions accepted per batch
    #[arg(long, default_value = "200")]
    max_instructions: usize,

    /// Rate limit: requests per second per IP
    #[arg(long, default_value = "10")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub blob: Arc<MemoryBlobStore>,
    pub jobs: Arc<MemoryJobStore>,
    pub config: BatchConfig,
}

impl AppState {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            blob: Arc::new(MemoryBlobStore::new()),
            jobs: Arc::new(MemoryJobStore::new()),
            config,
        }
    }
}

/// Routes shared between the binary and the test server
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // API endpoints
        .route("/api/batch", post(handle_submit_batch))
        .route("/api/jobs/:id", get(handle_get_job))
        .route("/api/files/:name", put(handle_upload_file))
        .route("/api/results/:job_id", get(handle_download_result))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pdfbatch server on {}:{}", args.host, args.port);

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .expect("Failed to create rate limiter config"),
    );

    // Create shared state
    let config = BatchConfig {
        chunk_size: args.chunk_size,
        deadline: Duration::from_secs(args.deadline_secs),
        max_instructions: args.max_instructions,
        ..BatchConfig::default()
    };
    let state = AppState::new(config);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = router(state)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!(
        "Chunk size: {}, deadline: {}s",
        args.chunk_size, args.deadline_secs
    );

    axum::serve(listener, app).await?;

    Ok(())
}
