//! DermaScan HTTP server
//!
//! Thin axum boundary over the diagnosis pipeline: image upload and
//! prediction, class metadata lookup and a health/readiness signal.
//! Request parsing, size limits and CORS live here; the core pipeline
//! stays transport-agnostic.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::state::AppState;

/// Maximum accepted upload size (16 MiB), enforced at the boundary
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// DermaScan diagnosis server
#[derive(Parser, Debug)]
#[command(name = "dermascan-server")]
#[command(version)]
#[command(about = "HTTP API for dermatoscopic lesion diagnosis")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Path to the trained model checkpoint
    #[arg(short, long, env = "DERMASCAN_MODEL", default_value = "models/lesion_classifier.mpk")]
    model: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("DermaScan server v{}", dermascan::VERSION);
    info!("  Backend: {}", dermascan::backend::backend_name());
    info!("  Model:   {}", cli.model.display());

    dermascan::classes::validate_registry()?;

    // A failed load leaves the server up but unready: the health
    // endpoint keeps reporting the state instead of the process
    // crash-looping under a supervisor.
    let engine = match dermascan::Engine::load(&cli.model, dermascan::backend::default_device()) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            warn!(error = %e, "model load failed; serving unready");
            None
        }
    };

    let state = Arc::new(AppState::new(engine));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/predict", post(routes::predict::predict))
        .route("/class_info/:id", get(routes::classes::class_info))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
