//! Axum route handlers for the Export API.

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::export::cache::ExportCache;
use crate::export::exporter::{ExportError, ExportOptions, ExportedDocument};
use crate::render::tree::RenderNodeSpec;
use crate::state::AppState;

const TEMPLATE_HEADER: HeaderName = HeaderName::from_static("x-fitpdf-template");
const SCALE_HEADER: HeaderName = HeaderName::from_static("x-fitpdf-scale");
const FALLBACK_HEADER: HeaderName = HeaderName::from_static("x-fitpdf-fallback");

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub content: RenderNodeSpec,
    #[serde(default)]
    pub options: ExportOptions,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/export
///
/// Fits the posted render tree onto pages and returns the PDF as an attachment.
pub async fn handle_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, AppError> {
    if request.content.tag.trim().is_empty() {
        return Err(AppError::Validation("content.tag cannot be empty".to_string()));
    }
    request.content.validate().map_err(AppError::Validation)?;
    request.options.validate().map_err(AppError::Validation)?;

    let key = ExportCache::key(&request.content, &request.options);
    if let Some(hit) = key.as_deref().and_then(|k| state.cache.get(k)) {
        info!("Serving cached export '{}'", hit.filename);
        return Ok(pdf_response(hit));
    }

    let exported = state
        .exporter
        .export(&request.content, &request.options)
        .await
        .map_err(|e| match e {
            ExportError::InvalidOptions(msg) | ExportError::InvalidContent(msg) => {
                AppError::Validation(msg)
            }
            other => AppError::Generation(other),
        })?;

    if let Some(key) = key {
        state.cache.insert(key, exported.clone());
        debug!("Export cache holds {} entries", state.cache.len());
    }
    Ok(pdf_response(exported))
}

fn pdf_response(exported: ExportedDocument) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_filename(&exported.filename)
    );
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (TEMPLATE_HEADER, exported.archetype.to_string()),
            (SCALE_HEADER, format!("{:.4}", exported.scale)),
            (FALLBACK_HEADER, exported.used_fallback.to_string()),
        ],
        exported.bytes,
    )
        .into_response()
}

/// Printable ASCII without quotes or backslashes.
fn header_safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
