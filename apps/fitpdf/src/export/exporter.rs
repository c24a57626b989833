//! Paginated exporter: the end-to-end page-fitting run.
//!
//! # Run
//! `Idle → Preparing → Analyzing → Searching → Exporting → Done`, or
//! `… → Exporting → Fallback → Done` when the primary conversion fails.
//!
//! 1. Preparing: `PreparedDocument` injects the override sheet and resets the root's
//!    inline style, then the run waits for the layout to settle.
//! 2. Analyzing: the live tree is laid out at the template's preferred scale and analysed.
//! 3. Searching: candidate scales are measured on offscreen clones.
//! 4. Exporting: the chosen scale is divided by the buffer divisor and the prepared
//!    tree is converted under a timeout.
//! 5. Fallback: after the prepared state has been restored, a fixed-parameter
//!    conversion is attempted once. Its failure is the only fatal outcome.
//!
//! Per-candidate diagnostics go to the log and never reach the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::export::converter::{ConversionError, ConversionJob, DocumentConverter, PageBreakConfig};
use crate::export::prepare::PreparedDocument;
use crate::fitting::analyzer::{analyze, ContentAnalysis};
use crate::fitting::classifier::classify;
use crate::fitting::page::{Margins, Orientation, PageFormat, PageGeometry};
use crate::fitting::scoring::ScaleStrategy;
use crate::fitting::search::{search_optimal_scale, SearchContext, SearchOutcome, SearchTuning};
use crate::fitting::templates::{Archetype, TemplateConfig};
use crate::layout::{LayoutEngine, LayoutError};
use crate::render::document::Document;
use crate::render::tree::{RenderNodeSpec, RenderTree};

/// Horizontal margins never go below this many millimetres.
const MIN_HORIZONTAL_MARGIN_MM: f32 = 15.0;
/// Vertical margins never go below this many millimetres.
const MIN_VERTICAL_MARGIN_MM: f32 = 10.0;

const FALLBACK_SCALE: f32 = 0.25;
const FALLBACK_MARGINS: [f32; 4] = [0.0, 20.0, 0.0, 20.0];
const FALLBACK_QUALITY: f32 = 0.92;

// ────────────────────────────────────────────────────────────────────────────
// Options
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub filename: String,
    /// Uniform margin in millimetres; raised to the template minimums if smaller.
    pub margin: Option<f32>,
    pub page_format: PageFormat,
    pub orientation: Orientation,
    /// JPEG quality for rasterised content, in (0, 1].
    pub raster_quality: f32,
    pub enable_dynamic_scale: bool,
    /// Overrides classification when set.
    pub archetype: Option<Archetype>,
    pub enable_content_aware_optimization: bool,
    pub enable_fallback_recovery: bool,
    pub strategy: ScaleStrategy,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            filename: "enhanced-resume.pdf".to_string(),
            margin: None,
            page_format: PageFormat::A4,
            orientation: Orientation::Portrait,
            raster_quality: 0.98,
            enable_dynamic_scale: true,
            archetype: None,
            enable_content_aware_optimization: true,
            enable_fallback_recovery: true,
            strategy: ScaleStrategy::Conservative,
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.filename.trim().is_empty() {
            return Err("filename cannot be empty".to_string());
        }
        if !(self.raster_quality > 0.0 && self.raster_quality <= 1.0) {
            return Err(format!(
                "raster_quality must be in (0, 1], got {}",
                self.raster_quality
            ));
        }
        if let Some(margin) = self.margin {
            if !margin.is_finite() || margin < 0.0 {
                return Err(format!("margin must be a non-negative number, got {margin}"));
            }
        }
        Ok(())
    }
}

/// Knobs for the run's timing and the final scale discount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineTuning {
    pub layout_settle: Duration,
    pub search: SearchTuning,
    /// Chosen scale is divided by this before conversion.
    pub buffer_divisor: f32,
    pub conversion_timeout: Duration,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            layout_settle: Duration::from_millis(150),
            search: SearchTuning::default(),
            buffer_divisor: 1.15,
            conversion_timeout: Duration::from_secs(30),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Results and errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Preparing,
    Analyzing,
    Searching,
    Exporting,
    Fallback,
    Done,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportPhase::Idle => "idle",
            ExportPhase::Preparing => "preparing",
            ExportPhase::Analyzing => "analyzing",
            ExportPhase::Searching => "searching",
            ExportPhase::Exporting => "exporting",
            ExportPhase::Fallback => "fallback",
            ExportPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Bytes,
    pub filename: String,
    pub archetype: Archetype,
    /// Scale handed to the converter.
    pub scale: f32,
    pub used_fallback: bool,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid export options: {0}")]
    InvalidOptions(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("PDF generation failed: {0}")]
    Conversion(#[source] ConversionError),

    #[error("PDF generation failed ({primary}) and the fallback also failed: {fallback}")]
    FallbackFailed {
        primary: ConversionError,
        fallback: ConversionError,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Exporter
// ────────────────────────────────────────────────────────────────────────────

pub struct Exporter {
    engine: Arc<dyn LayoutEngine>,
    converter: Arc<dyn DocumentConverter>,
    tuning: EngineTuning,
}

/// Logging context for one run.
struct Run {
    id: Uuid,
}

impl Run {
    fn enter(&self, phase: ExportPhase) {
        debug!(run_id = %self.id, "Export phase: {phase}");
    }
}

impl Exporter {
    pub fn new(
        engine: Arc<dyn LayoutEngine>,
        converter: Arc<dyn DocumentConverter>,
        tuning: EngineTuning,
    ) -> Self {
        Self {
            engine,
            converter,
            tuning,
        }
    }

    pub async fn export(
        &self,
        content: &RenderNodeSpec,
        options: &ExportOptions,
    ) -> Result<ExportedDocument, ExportError> {
        options.validate().map_err(ExportError::InvalidOptions)?;
        content.validate().map_err(ExportError::InvalidContent)?;

        let run = Run { id: Uuid::new_v4() };
        run.enter(ExportPhase::Idle);

        let document = Document::new(RenderTree::from_spec(content));
        let archetype = match options.archetype {
            Some(archetype) => archetype,
            None => classify(&document.tree()),
        };
        let config = archetype.config();
        let page = PageGeometry::new(options.page_format, options.orientation);
        let margins = export_margins(config, options.margin);
        info!(
            run_id = %run.id,
            "Starting export: template={}, strategy={:?}",
            archetype, options.strategy
        );

        let attempt = self
            .export_prepared(&run, &document, config, page, margins, options)
            .await;

        let primary = match attempt {
            Ok((bytes, scale)) => {
                run.enter(ExportPhase::Done);
                info!(run_id = %run.id, "Export completed at scale {scale:.3}");
                return Ok(ExportedDocument {
                    bytes,
                    filename: options.filename.clone(),
                    archetype,
                    scale,
                    used_fallback: false,
                });
            }
            Err(e) => e,
        };

        error!(run_id = %run.id, "Primary PDF generation failed: {primary}");
        if !options.enable_fallback_recovery {
            return Err(ExportError::Conversion(primary));
        }

        run.enter(ExportPhase::Fallback);
        let job = fallback_job(&document, &options.filename);
        match self.convert_bounded(job).await {
            Ok(bytes) => {
                run.enter(ExportPhase::Done);
                info!(run_id = %run.id, "Fallback export completed");
                Ok(ExportedDocument {
                    bytes,
                    filename: options.filename.clone(),
                    archetype,
                    scale: FALLBACK_SCALE,
                    used_fallback: true,
                })
            }
            Err(fallback) => {
                error!(run_id = %run.id, "Fallback PDF generation failed: {fallback}");
                Err(ExportError::FallbackFailed { primary, fallback })
            }
        }
    }

    /// Preparing through Exporting. The prepared state is restored when this returns.
    async fn export_prepared(
        &self,
        run: &Run,
        document: &Document,
        config: &TemplateConfig,
        page: PageGeometry,
        margins: Margins,
        options: &ExportOptions,
    ) -> Result<(Bytes, f32), ConversionError> {
        run.enter(ExportPhase::Preparing);
        let _prepared = PreparedDocument::prepare(document, config);
        tokio::time::sleep(self.tuning.layout_settle).await;

        let mut outcome: Option<SearchOutcome> = None;
        let chosen = if options.enable_dynamic_scale && options.enable_content_aware_optimization {
            run.enter(ExportPhase::Analyzing);
            match self.analyze_live(document, config, page, margins) {
                Ok(analysis) => {
                    info!(
                        run_id = %run.id,
                        "Analysis: detected={}, sections={}, height={:.0}, complex={}",
                        analysis.detected_archetype,
                        analysis.sections.len(),
                        analysis.content_height,
                        analysis.has_complex_layouts
                    );
                    run.enter(ExportPhase::Searching);
                    let ctx = SearchContext {
                        document,
                        engine: self.engine.as_ref(),
                        config,
                        page,
                        margins,
                        tuning: self.tuning.search,
                    };
                    let found = search_optimal_scale(&ctx, &analysis, options.strategy).await;
                    let scale = found.scale;
                    outcome = Some(found);
                    scale
                }
                Err(e) => {
                    warn!(
                        run_id = %run.id,
                        "Live layout failed, using preferred scale {:.3}: {e}",
                        config.preferred_scale
                    );
                    config.preferred_scale
                }
            }
        } else {
            config.preferred_scale
        };

        run.enter(ExportPhase::Exporting);
        let scale = buffer_scale(chosen, config, self.tuning.buffer_divisor);
        let job = ConversionJob {
            tree: document.tree().clone(),
            stylesheet: document.computed_sheet(),
            scale,
            margins,
            page,
            raster_quality: options.raster_quality,
            page_breaks: PageBreakConfig::for_template(config),
            title: title_from_filename(&options.filename),
        };
        let bytes = self.convert_bounded(job).await?;

        if let Some(outcome) = &outcome {
            let splitting = outcome
                .results
                .iter()
                .filter(|r| r.has_text_splitting)
                .count();
            if splitting > 0 {
                info!(
                    run_id = %run.id,
                    "{splitting}/{} candidates showed text splitting; exported at {scale:.3}",
                    outcome.results.len()
                );
            }
        }
        Ok((bytes, scale))
    }

    /// Lays out the live tree at the preferred scale and analyses it.
    fn analyze_live(
        &self,
        document: &Document,
        config: &TemplateConfig,
        page: PageGeometry,
        margins: Margins,
    ) -> Result<ContentAnalysis, LayoutError> {
        let sheet = document.computed_sheet();
        let viewport = page.viewport_width(&margins, config.preferred_scale);
        let mut tree = document.tree_mut();
        self.engine.layout(&mut tree, viewport, &sheet)?;
        Ok(analyze(&tree, config))
    }

    async fn convert_bounded(&self, job: ConversionJob) -> Result<Bytes, ConversionError> {
        let limit = self.tuning.conversion_timeout;
        match tokio::time::timeout(limit, self.converter.convert(job)).await {
            Ok(Ok(bytes)) if bytes.is_empty() => Err(ConversionError::EmptyOutput),
            Ok(result) => result,
            Err(_) => Err(ConversionError::Timeout {
                after_ms: limit.as_millis() as u64,
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Template margins raised to the global minimums and to the caller's margin.
pub fn export_margins(config: &TemplateConfig, user_margin: Option<f32>) -> Margins {
    let user = user_margin.unwrap_or(0.0);
    let horizontal = |m: f32| m.max(MIN_HORIZONTAL_MARGIN_MM).max(user);
    let vertical = |m: f32| m.max(MIN_VERTICAL_MARGIN_MM).max(user);
    Margins {
        top: vertical(config.margins.top),
        right: horizontal(config.margins.right),
        bottom: vertical(config.margins.bottom),
        left: horizontal(config.margins.left),
    }
}

/// `max(config.min_scale, chosen / divisor)`: the chosen scale discounted once more
/// for headroom against rasteriser drift.
///
/// The floor is the template's `min_scale` rather than a fixed 0.85. Template scales
/// here all sit below 0.4, so a fixed 0.85 floor would always win and discard the
/// search result. A divisor below 1 (or not finite) is treated as 1.
pub fn buffer_scale(chosen: f32, config: &TemplateConfig, divisor: f32) -> f32 {
    let divisor = if divisor.is_finite() && divisor >= 1.0 {
        divisor
    } else {
        1.0
    };
    (chosen / divisor).max(config.min_scale)
}

fn fallback_job(document: &Document, filename: &str) -> ConversionJob {
    ConversionJob {
        tree: document.tree().clone(),
        stylesheet: document.computed_sheet(),
        scale: FALLBACK_SCALE,
        margins: Margins::from_trbl(FALLBACK_MARGINS),
        page: PageGeometry::a4(),
        raster_quality: FALLBACK_QUALITY,
        page_breaks: PageBreakConfig::css_only(),
        title: title_from_filename(filename),
    }
}

fn title_from_filename(filename: &str) -> String {
    filename
        .strip_suffix(".pdf")
        .unwrap_or(filename)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::fitting::templates::{CLASSIC, MODERN};
    use crate::layout::FlowLayout;

    /// Records every job and answers from a script, one entry per call.
    struct ScriptedConverter {
        script: Mutex<Vec<Result<Bytes, ConversionError>>>,
        jobs: Mutex<Vec<ConversionJob>>,
        calls: AtomicUsize,
    }

    impl ScriptedConverter {
        fn new(script: Vec<Result<Bytes, ConversionError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                jobs: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DocumentConverter for ScriptedConverter {
        async fn convert(&self, job: ConversionJob) -> Result<Bytes, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.jobs.lock().push(job);
            let mut script = self.script.lock();
            if script.is_empty() {
                Ok(Bytes::from_static(b"%PDF-1.7"))
            } else {
                script.remove(0)
            }
        }
    }

    /// Never finishes.
    struct HangingConverter;

    #[async_trait]
    impl DocumentConverter for HangingConverter {
        async fn convert(&self, _job: ConversionJob) -> Result<Bytes, ConversionError> {
            futures::future::pending().await
        }
    }

    fn make_content() -> RenderNodeSpec {
        let items = (0..12)
            .map(|i| {
                RenderNodeSpec::element(
                    "div",
                    "experience-item",
                    vec![
                        RenderNodeSpec::text("h3", "job-title", &format!("Engineer {i}")),
                        RenderNodeSpec::text("p", "", &"Designed and shipped services. ".repeat(6)),
                    ],
                )
            })
            .collect();
        RenderNodeSpec::element(
            "div",
            "resume",
            vec![
                RenderNodeSpec::element("aside", "sidebar", vec![]),
                RenderNodeSpec::element("main", "main-content", items),
            ],
        )
    }

    fn make_exporter(converter: Arc<dyn DocumentConverter>) -> Exporter {
        Exporter::new(Arc::new(FlowLayout), converter, EngineTuning::default())
    }

    #[test]
    fn test_export_margins_apply_minimums_and_user_margin() {
        let margins = export_margins(&MODERN, None);
        assert_eq!(margins, Margins::from_trbl([10.0, 15.0, 10.0, 15.0]));

        let classic = export_margins(&CLASSIC, Some(12.0));
        assert_eq!(classic, Margins::from_trbl([12.0, 18.0, 12.0, 18.0]));
    }

    #[test]
    fn test_buffer_scale_discounts_and_floors() {
        assert!((buffer_scale(0.23, &MODERN, 1.15) - 0.2).abs() < 1e-5);
        assert_eq!(buffer_scale(0.12, &MODERN, 1.15), MODERN.min_scale);
        // A divisor below 1 would enlarge the output; it is ignored.
        assert_eq!(buffer_scale(0.2, &MODERN, 0.5), 0.2);
    }

    #[test]
    fn test_buffer_scale_stays_inside_every_template_range() {
        use crate::fitting::templates::Archetype;
        for archetype in Archetype::ALL {
            let config = archetype.config();
            for chosen in [config.min_scale, config.preferred_scale, config.max_scale] {
                let scale = buffer_scale(chosen, config, 1.15);
                assert!(config.contains_scale(scale), "{archetype:?}: {scale}");
                assert!(scale <= chosen);
            }
        }
    }

    #[test]
    fn test_options_validation() {
        assert!(ExportOptions::default().validate().is_ok());
        let bad_quality = ExportOptions {
            raster_quality: 0.0,
            ..Default::default()
        };
        assert!(bad_quality.validate().is_err());
        let bad_margin = ExportOptions {
            margin: Some(-1.0),
            ..Default::default()
        };
        assert!(bad_margin.validate().is_err());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ExportOptions =
            serde_json::from_str(r#"{"strategy":"quality","archetype":"classic"}"#).unwrap();
        assert_eq!(options.strategy, ScaleStrategy::Quality);
        assert_eq!(options.archetype, Some(Archetype::Classic));
        assert_eq!(options.filename, "enhanced-resume.pdf");
        assert!(options.enable_fallback_recovery);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_export_uses_searched_scale_within_range() {
        let converter = ScriptedConverter::new(vec![]);
        let exporter = make_exporter(converter.clone());

        let exported = exporter
            .export(&make_content(), &ExportOptions::default())
            .await
            .unwrap();

        assert!(!exported.used_fallback);
        assert_eq!(exported.archetype, Archetype::Modern);
        assert!(exported.scale >= MODERN.min_scale && exported.scale <= MODERN.max_scale);

        let jobs = converter.jobs.lock();
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.page_breaks.avoid.last().map(String::as_str), Some("*"));
        assert_eq!(job.margins.left, 15.0);
        assert!(!job.stylesheet.rules.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_scale_when_dynamic_disabled() {
        let converter = ScriptedConverter::new(vec![]);
        let exporter = make_exporter(converter.clone());
        let options = ExportOptions {
            enable_dynamic_scale: false,
            archetype: Some(Archetype::Classic),
            ..Default::default()
        };

        let exported = exporter.export(&make_content(), &options).await.unwrap();
        let expected = buffer_scale(CLASSIC.preferred_scale, &CLASSIC, 1.15);
        assert!((exported.scale - expected).abs() < 1e-6);
        assert_eq!(exported.archetype, Archetype::Classic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversion_failure_falls_back_with_restored_document() {
        let converter = ScriptedConverter::new(vec![Err(ConversionError::EmptyOutput)]);
        let exporter = make_exporter(converter.clone());

        let exported = exporter
            .export(&make_content(), &ExportOptions::default())
            .await
            .unwrap();

        assert!(exported.used_fallback);
        assert!(!exported.bytes.is_empty());
        let jobs = converter.jobs.lock();
        assert_eq!(jobs.len(), 2);
        let fallback = &jobs[1];
        assert_eq!(fallback.scale, FALLBACK_SCALE);
        assert_eq!(fallback.margins, Margins::from_trbl(FALLBACK_MARGINS));
        assert_eq!(fallback.raster_quality, FALLBACK_QUALITY);
        assert_eq!(fallback.page_breaks, PageBreakConfig::css_only());
        // Override sheet is gone by the time the fallback runs.
        assert!(fallback.stylesheet.rules.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_fallback_propagates() {
        let converter = ScriptedConverter::new(vec![Err(ConversionError::EmptyOutput)]);
        let exporter = make_exporter(converter.clone());
        let options = ExportOptions {
            enable_fallback_recovery: false,
            ..Default::default()
        };

        let result = exporter.export(&make_content(), &options).await;
        assert!(matches!(result, Err(ExportError::Conversion(_))));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_failure_is_single_error() {
        let converter = ScriptedConverter::new(vec![
            Err(ConversionError::EmptyOutput),
            Err(ConversionError::Worker("boom".to_string())),
        ]);
        let exporter = make_exporter(converter);

        let result = exporter
            .export(&make_content(), &ExportOptions::default())
            .await;
        match result {
            Err(ExportError::FallbackFailed { primary, fallback }) => {
                assert!(matches!(primary, ConversionError::EmptyOutput));
                assert!(matches!(fallback, ConversionError::Worker(_)));
            }
            other => panic!("expected FallbackFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_converter_times_out_instead_of_hanging() {
        let exporter = make_exporter(Arc::new(HangingConverter));
        let result = exporter
            .export(&make_content(), &ExportOptions::default())
            .await;
        match result {
            Err(ExportError::FallbackFailed { primary, fallback }) => {
                assert!(matches!(primary, ConversionError::Timeout { .. }));
                assert!(matches!(fallback, ConversionError::Timeout { .. }));
            }
            other => panic!("expected timeouts, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bytes_count_as_failure() {
        let converter = ScriptedConverter::new(vec![Ok(Bytes::new())]);
        let exporter = make_exporter(converter);
        let exported = exporter
            .export(&make_content(), &ExportOptions::default())
            .await
            .unwrap();
        assert!(exported.used_fallback);
    }

    #[tokio::test]
    async fn test_unbounded_lengths_rejected_before_any_work() {
        let converter = ScriptedConverter::new(vec![]);
        let exporter = make_exporter(converter.clone());
        let mut content = make_content();
        content.style.padding.top = Some(1e13);

        let result = exporter.export(&content, &ExportOptions::default()).await;
        assert!(matches!(result, Err(ExportError::InvalidContent(_))));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_any_work() {
        let converter = ScriptedConverter::new(vec![]);
        let exporter = make_exporter(converter.clone());
        let options = ExportOptions {
            raster_quality: 1.5,
            ..Default::default()
        };
        let result = exporter.export(&make_content(), &options).await;
        assert!(matches!(result, Err(ExportError::InvalidOptions(_))));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }
}
