//! Scale search engine.
//!
//! # Flow
//! 1. `base_scale` derives a starting scale from the content analysis, the template
//!    range and the strategy, minus a page-break buffer that grows with page count.
//! 2. `candidate_scales` fans the base out into at most five candidates inside the
//!    template range.
//! 3. Every candidate is measured concurrently on its own offscreen clone of the
//!    live document (`futures::future::join_all` on the calling task), after a
//!    staggered settle delay.
//! 4. `select_best` picks the winner.
//!
//! Clones are `OffscreenClone` guards, so each is detached before its candidate's
//! result is produced, whether the measurement succeeded or not.

use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fitting::analyzer::ContentAnalysis;
use crate::fitting::detector::{
    detect_text_splitting, page_count, PageLimitExceeded, SplitReport,
};
use crate::fitting::page::{Margins, PageGeometry};
use crate::fitting::scoring::{select_best, ScaleStrategy};
use crate::fitting::templates::{TemplateConfig, SCALE_EPSILON};
use crate::layout::{LayoutEngine, LayoutError};
use crate::render::document::Document;
use crate::render::tree::NodeId;

/// Violations recorded for a candidate whose measurement failed.
pub const FAILED_CANDIDATE_VIOLATIONS: u32 = 999;

const CANDIDATE_FACTORS: [f32; 4] = [1.0, 0.9, 0.85, 0.8];
const FLOOR_FACTOR: f32 = 0.75;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Measurement of one candidate scale.
///
/// `success == !has_text_splitting && page_break_violations == 0` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleTestResult {
    pub scale: f32,
    pub has_text_splitting: bool,
    /// 0–100.
    pub quality: f32,
    pub success: bool,
    pub problematic: Vec<NodeId>,
    pub page_break_violations: u32,
    pub render_time_ms: f32,
    pub pages: u32,
}

impl ScaleTestResult {
    pub fn measured(scale: f32, report: SplitReport, render_time_ms: f32) -> Self {
        let quality = (scale * 125.0 - report.violations as f32 * 10.0).clamp(0.0, 100.0);
        Self {
            scale,
            has_text_splitting: report.has_text_splitting,
            quality,
            success: !report.has_text_splitting && report.violations == 0,
            problematic: report.problematic,
            page_break_violations: report.violations,
            render_time_ms,
            pages: report.pages,
        }
    }

    /// A candidate whose measurement threw: maximally unfit.
    pub fn failed(scale: f32, render_time_ms: f32) -> Self {
        Self {
            scale,
            has_text_splitting: true,
            quality: 0.0,
            success: false,
            problematic: Vec::new(),
            page_break_violations: FAILED_CANDIDATE_VIOLATIONS,
            render_time_ms,
            pages: 0,
        }
    }
}

/// Settle delay before measuring candidate `i`: `settle_base + i × settle_step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchTuning {
    pub settle_base: Duration,
    pub settle_step: Duration,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            settle_base: Duration::from_millis(50),
            settle_step: Duration::from_millis(10),
        }
    }
}

impl SearchTuning {
    pub fn settle_delay(&self, index: usize) -> Duration {
        self.settle_base + self.settle_step * index as u32
    }
}

/// Everything a search needs besides the analysis. Borrows the live document.
pub struct SearchContext<'a> {
    pub document: &'a Document,
    pub engine: &'a dyn LayoutEngine,
    pub config: &'a TemplateConfig,
    pub page: PageGeometry,
    /// Margins the export will use; they set the printable area clones are measured in.
    pub margins: Margins,
    pub tuning: SearchTuning,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub scale: f32,
    pub results: Vec<ScaleTestResult>,
}

// ────────────────────────────────────────────────────────────────────────────
// Base scale and candidates
// ────────────────────────────────────────────────────────────────────────────

pub fn base_scale(
    analysis: &ContentAnalysis,
    config: &TemplateConfig,
    strategy: ScaleStrategy,
    page_height_mm: f32,
) -> f32 {
    let density = (analysis.text_density * 0.2).min(0.2);
    let complexity = if analysis.has_complex_layouts { 0.05 } else { 0.0 };
    let sections = analysis.sections.len() as f32 * 0.01;
    let span = config.preferred_scale - config.min_scale;

    let pages = page_count(
        analysis.content_height,
        config.preferred_scale,
        page_height_mm,
    );
    let extra_pages = pages.saturating_sub(1) as f32;

    let (base, buffer) = match strategy {
        ScaleStrategy::Conservative => (
            config.min_scale + span * 0.5 - (density + complexity + sections),
            if pages > 1 { 0.02 + 0.01 * extra_pages } else { 0.015 },
        ),
        ScaleStrategy::Quality => (
            config.max_scale - span * 0.3 - (0.5 * density + 0.5 * complexity),
            if pages > 1 { 0.015 + 0.008 * extra_pages } else { 0.01 },
        ),
        ScaleStrategy::Balanced => (
            config.preferred_scale - (density + complexity + sections),
            if pages > 1 { 0.01 + 0.005 * extra_pages } else { 0.008 },
        ),
    };

    debug!(
        "Base scale {:.4} before buffer {:.4} ({} pages, {:?})",
        base, buffer, pages, strategy
    );
    config.clamp_scale(base - buffer)
}

/// `{b, 0.9b, 0.85b, 0.8b, max(min, 0.75b)}` restricted to the template range, in
/// generation order, without duplicates. Never empty.
pub fn candidate_scales(base: f32, config: &TemplateConfig) -> Vec<f32> {
    let raw = CANDIDATE_FACTORS
        .iter()
        .map(|f| base * f)
        .chain(std::iter::once((base * FLOOR_FACTOR).max(config.min_scale)));

    let mut candidates: Vec<f32> = Vec::new();
    for scale in raw {
        if !config.contains_scale(scale) {
            continue;
        }
        if candidates.iter().any(|c| (c - scale).abs() < SCALE_EPSILON) {
            continue;
        }
        candidates.push(scale);
    }

    if candidates.is_empty() {
        candidates.push(config.clamp_scale(base));
    }
    candidates
}

// ────────────────────────────────────────────────────────────────────────────
// Search
// ────────────────────────────────────────────────────────────────────────────

pub async fn search_optimal_scale(
    ctx: &SearchContext<'_>,
    analysis: &ContentAnalysis,
    strategy: ScaleStrategy,
) -> SearchOutcome {
    let page_height = ctx.page.content_height_mm(&ctx.margins);
    let base = base_scale(analysis, ctx.config, strategy, page_height);
    let candidates = candidate_scales(base, ctx.config);
    info!(
        "Testing {} scale candidates from base {:.3} ({})",
        candidates.len(),
        base,
        ctx.config.name
    );

    let results = join_all(
        candidates
            .iter()
            .enumerate()
            .map(|(index, scale)| test_scale(ctx, analysis, *scale, index)),
    )
    .await;

    let attached = ctx.document.offscreen_count();
    if attached > 0 {
        warn!("{attached} offscreen clones still attached after the search");
    }

    let scale = match select_best(&results, strategy) {
        Some(best) => {
            info!(
                "Best scale {:.3}: violations={}, pages={}, success={}",
                best.scale, best.page_break_violations, best.pages, best.success
            );
            best.scale
        }
        None => ctx.config.clamp_scale(base),
    };

    SearchOutcome { scale, results }
}

async fn test_scale(
    ctx: &SearchContext<'_>,
    analysis: &ContentAnalysis,
    scale: f32,
    index: usize,
) -> ScaleTestResult {
    tokio::time::sleep(ctx.tuning.settle_delay(index)).await;

    let started = Instant::now();
    let measured = measure(ctx, analysis, scale);
    let render_time_ms = started.elapsed().as_secs_f32() * 1000.0;

    match measured {
        Ok(report) => {
            debug!(
                "Scale {:.3}: pages={}, violations={}, time={:.1}ms",
                scale, report.pages, report.violations, render_time_ms
            );
            ScaleTestResult::measured(scale, report, render_time_ms)
        }
        Err(e) => {
            warn!("Error testing scale {scale:.3}: {e}");
            ScaleTestResult::failed(scale, render_time_ms)
        }
    }
}

#[derive(Debug, Error)]
enum MeasureError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    PageLimit(#[from] PageLimitExceeded),
}

/// Lays out a fresh clone at the viewport for `scale` and runs the detector on it.
/// The clone is detached when this returns.
fn measure(
    ctx: &SearchContext<'_>,
    analysis: &ContentAnalysis,
    scale: f32,
) -> Result<SplitReport, MeasureError> {
    let mut clone = ctx.document.attach_offscreen();
    let sheet = ctx.document.computed_sheet();
    let viewport = ctx.page.viewport_width(&ctx.margins, scale);

    ctx.engine.layout(clone.tree_mut(), viewport, &sheet)?;
    let report = detect_text_splitting(
        clone.tree(),
        scale,
        ctx.page.content_height_mm(&ctx.margins),
        analysis,
    )?;
    Ok(report)
}
