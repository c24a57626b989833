mod config;
mod errors;
mod export;
mod fitting;
mod layout;
mod render;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::export::{ExportCache, Exporter, PdfConverter};
use crate::layout::{FlowLayout, LayoutEngine};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on unparsable env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fitpdf v{}", env!("CARGO_PKG_VERSION"));

    // One layout engine shared by the scale search and the PDF converter
    let engine: Arc<dyn LayoutEngine> = Arc::new(FlowLayout);
    let converter = Arc::new(PdfConverter::new(engine.clone()));
    let tuning = config.engine_tuning();
    info!(
        "Export tuning: settle={:?}, timeout={:?}, buffer divisor={}",
        tuning.layout_settle, tuning.conversion_timeout, tuning.buffer_divisor
    );
    let exporter = Arc::new(Exporter::new(engine, converter, tuning));

    let cache = Arc::new(ExportCache::new(config.export_cache_capacity));
    info!("Export cache capacity: {}", config.export_cache_capacity);

    // Build app state
    let state = AppState {
        config: config.clone(),
        exporter,
        cache,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the editor's deploy host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
