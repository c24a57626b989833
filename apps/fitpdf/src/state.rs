use std::sync::Arc;

use crate::config::Config;
use crate::export::{ExportCache, Exporter};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Owns the layout engine and the PDF converter; one run per request.
    pub exporter: Arc<Exporter>,
    pub cache: Arc<ExportCache>,
}
