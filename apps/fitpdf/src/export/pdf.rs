//! printpdf-backed `DocumentConverter`.
//!
//! # Pipeline
//! 1. Lay the job's tree out at the printable width for the job's scale.
//! 2. Resolve the page-break rules and paginate: a single forward walk in document
//!    order keeps a running downward shift. Forced breaks and avoided blocks that
//!    would straddle a boundary (and fit on one page) push everything after them to
//!    the next page; a text line is never cut in half.
//! 3. Emit one printpdf page per page of content with builtin-font text operations.
//!
//! Layout and serialisation are CPU-bound and run inside `spawn_blocking`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use printpdf::{
    BuiltinFont, ImageOptimizationOptions, Mm, Op, PdfDocument, PdfFontHandle, PdfPage,
    PdfSaveOptions, Point, Pt, TextItem,
};
use tracing::debug;

use crate::export::converter::{BreakRules, ConversionError, ConversionJob, DocumentConverter};
use crate::fitting::detector::{PageLimitExceeded, MAX_PAGES};
use crate::fitting::page::{mm_to_units, units_to_mm};
use crate::layout::LayoutEngine;
use crate::render::tree::{NodeId, RenderTree};

/// Baseline offset from the top of a line box, as a fraction of the font size.
const BASELINE_RATIO: f32 = 0.8;
const BOLD_WEIGHT: u16 = 600;
/// Slack for float noise when comparing against page boundaries.
const BOUNDARY_EPSILON: f32 = 1e-3;

pub struct PdfConverter {
    engine: Arc<dyn LayoutEngine>,
}

impl PdfConverter {
    pub fn new(engine: Arc<dyn LayoutEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl DocumentConverter for PdfConverter {
    async fn convert(&self, job: ConversionJob) -> Result<Bytes, ConversionError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || render_pdf(engine.as_ref(), job))
            .await
            .map_err(|e| ConversionError::Worker(format!("spawn_blocking failed: {e}")))?
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pagination
// ────────────────────────────────────────────────────────────────────────────

/// A text line assigned to a page, with its top relative to the page's printable area.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub node: NodeId,
    pub text: String,
    pub x: f32,
    pub top: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub lines: Vec<PlacedLine>,
}

/// Splits a laid-out tree into pages of `page_height` local units.
/// Always returns at least one page, and never more than `MAX_PAGES`.
pub fn paginate(
    tree: &RenderTree,
    rules: &BreakRules,
    page_height: f32,
) -> Result<Vec<PageContent>, PageLimitExceeded> {
    let mut paginator = Paginator {
        tree,
        rules,
        page_height,
        origin: tree.node(tree.root()).layout.y,
        shift: 0.0,
        placed: Vec::new(),
    };
    paginator.visit(tree.root());

    let page_total = paginator
        .placed
        .iter()
        .map(|(page, _)| page.saturating_add(1))
        .max()
        .unwrap_or(1);
    if page_total > MAX_PAGES as usize {
        return Err(PageLimitExceeded {
            pages: page_total as u64,
        });
    }
    let mut pages = vec![PageContent::default(); page_total];
    for (page, line) in paginator.placed {
        pages[page].lines.push(line);
    }
    Ok(pages)
}

struct Paginator<'a> {
    tree: &'a RenderTree,
    rules: &'a BreakRules,
    page_height: f32,
    origin: f32,
    shift: f32,
    placed: Vec<(usize, PlacedLine)>,
}

impl Paginator<'_> {
    fn visit(&mut self, id: NodeId) {
        if self.tree.is_hidden(id) {
            return;
        }
        let node = self.tree.node(id);
        let layout = &node.layout;

        if self.rules.before.contains(&id) {
            let top = self.position(layout.y);
            if top > BOUNDARY_EPSILON {
                self.push_to_next_page(top);
            }
        }

        if self.rules.avoid.contains(&id) && layout.height <= self.page_height {
            let top = self.position(layout.y);
            let bottom = top + layout.height;
            if self.straddles(top, bottom) {
                self.push_to_next_page(top);
            }
        }

        for line in &layout.lines {
            let mut top = self.position(line.y);
            if line.height <= self.page_height && self.straddles(top, top + line.height) {
                self.push_to_next_page(top);
                top = self.position(line.y);
            }
            let page = (top / self.page_height + BOUNDARY_EPSILON / self.page_height).floor();
            let page = page.max(0.0) as usize;
            self.placed.push((
                page,
                PlacedLine {
                    node: id,
                    text: line.text.clone(),
                    x: line.x,
                    top: top - page as f32 * self.page_height,
                },
            ));
        }

        for child in self.tree.children(id) {
            self.visit(*child);
        }

        if self.rules.after.contains(&id) {
            let bottom = self.position(layout.bottom());
            self.push_to_next_page(bottom);
        }
    }

    /// Position in paginated space of a layout y coordinate.
    fn position(&self, y: f32) -> f32 {
        y - self.origin + self.shift
    }

    fn straddles(&self, top: f32, bottom: f32) -> bool {
        let boundary = self.next_boundary(top);
        bottom > boundary + BOUNDARY_EPSILON
    }

    /// The first page boundary strictly after `y`.
    fn next_boundary(&self, y: f32) -> f32 {
        ((y + BOUNDARY_EPSILON) / self.page_height).floor() * self.page_height + self.page_height
    }

    fn push_to_next_page(&mut self, y: f32) {
        let page_start = ((y + BOUNDARY_EPSILON) / self.page_height).floor() * self.page_height;
        if (y - page_start).abs() <= BOUNDARY_EPSILON {
            return;
        }
        self.shift += self.next_boundary(y) - y;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering (runs inside spawn_blocking)
// ────────────────────────────────────────────────────────────────────────────

fn render_pdf(engine: &dyn LayoutEngine, mut job: ConversionJob) -> Result<Bytes, ConversionError> {
    if !job.scale.is_finite() || job.scale <= 0.0 {
        return Err(ConversionError::InvalidJob(format!(
            "scale must be positive, got {}",
            job.scale
        )));
    }

    let viewport = job.page.viewport_width(&job.margins, job.scale);
    engine.layout(&mut job.tree, viewport, &job.stylesheet)?;

    let rules = BreakRules::resolve(&job.tree, &job.page_breaks)?;
    let page_height = mm_to_units(job.page.content_height_mm(&job.margins), job.scale);
    let pages = paginate(&job.tree, &rules, page_height)
        .map_err(|e| ConversionError::InvalidJob(e.to_string()))?;
    debug!(
        "Paginated '{}' into {} pages at scale {:.3}",
        job.title,
        pages.len(),
        job.scale
    );

    let pdf_pages: Vec<PdfPage> = pages
        .iter()
        .map(|page| {
            PdfPage::new(
                Mm(job.page.width_mm),
                Mm(job.page.height_mm),
                page_ops(&job, page),
            )
        })
        .collect();

    let options = PdfSaveOptions {
        image_optimization: Some(ImageOptimizationOptions {
            quality: Some(job.raster_quality),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut warnings = Vec::new();
    let mut doc = PdfDocument::new(&job.title);
    let bytes = doc.with_pages(pdf_pages).save(&options, &mut warnings);
    if !warnings.is_empty() {
        debug!("printpdf reported {} warnings", warnings.len());
    }

    if bytes.is_empty() {
        return Err(ConversionError::EmptyOutput);
    }
    Ok(Bytes::from(bytes))
}

fn page_ops(job: &ConversionJob, page: &PageContent) -> Vec<Op> {
    let mut ops = Vec::with_capacity(page.lines.len() * 5);
    for line in &page.lines {
        let style = &job.tree.node(line.node).computed;
        let x_mm = job.margins.left + units_to_mm(line.x, job.scale);
        let baseline = line.top + style.font_size * BASELINE_RATIO;
        let y_mm = job.page.height_mm - job.margins.top - units_to_mm(baseline, job.scale);

        ops.extend([
            Op::StartTextSection,
            Op::SetTextCursor {
                pos: Point::new(Mm(x_mm), Mm(y_mm)),
            },
            Op::SetFont {
                font: PdfFontHandle::Builtin(builtin_font(
                    style.font_family.is_serif(),
                    style.font_weight >= BOLD_WEIGHT,
                )),
                size: Pt(style.font_size * job.scale),
            },
            Op::ShowText {
                items: vec![TextItem::Text(line.text.clone())],
            },
            Op::EndTextSection,
        ]);
    }
    ops
}

fn builtin_font(serif: bool, bold: bool) -> BuiltinFont {
    match (serif, bold) {
        (true, true) => BuiltinFont::TimesBold,
        (true, false) => BuiltinFont::TimesRoman,
        (false, true) => BuiltinFont::HelveticaBold,
        (false, false) => BuiltinFont::Helvetica,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::converter::PageBreakConfig;
    use crate::fitting::page::{Margins, PageGeometry};
    use crate::layout::FlowLayout;
    use crate::render::document::StyleSheet;
    use crate::render::style::{EdgesDecl, NodeStyle};
    use crate::render::tree::RenderNodeSpec;

    const PAGE: f32 = 100.0;

    fn text_style() -> NodeStyle {
        NodeStyle {
            font_size: Some(10.0),
            line_height: Some(1.0),
            ..Default::default()
        }
    }

    fn spacer(height: f32) -> RenderNodeSpec {
        RenderNodeSpec::element("div", "spacer", vec![]).with_style(NodeStyle {
            padding: EdgesDecl {
                top: Some(height),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn laid_out(children: Vec<RenderNodeSpec>) -> RenderTree {
        let spec = RenderNodeSpec::element("div", "resume", children).with_style(text_style());
        let mut tree = RenderTree::from_spec(&spec);
        FlowLayout
            .layout(&mut tree, 1000.0, &StyleSheet::default())
            .unwrap();
        tree
    }

    fn rules(tree: &RenderTree, avoid: &[&str], before: &[&str], after: &[&str]) -> BreakRules {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        let config = PageBreakConfig {
            modes: vec![],
            avoid: owned(avoid),
            before: owned(before),
            after: owned(after),
        };
        BreakRules::resolve(tree, &config).unwrap()
    }

    fn texts(page: &PageContent) -> Vec<&str> {
        page.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_empty_tree_yields_one_page() {
        let tree = laid_out(vec![]);
        let pages = paginate(&tree, &BreakRules::default(), PAGE).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].lines.is_empty());
    }

    #[test]
    fn test_line_crossing_boundary_moves_to_next_page() {
        // Line occupies 95..105.
        let tree = laid_out(vec![spacer(95.0), RenderNodeSpec::text("p", "", "Rust")]);
        let pages = paginate(&tree, &BreakRules::default(), PAGE).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].lines.is_empty());
        assert_eq!(texts(&pages[1]), vec!["Rust"]);
        assert!(pages[1].lines[0].top.abs() < 1e-3);
    }

    #[test]
    fn test_avoided_block_moves_whole() {
        // Block of four 10-unit lines at 75..115: without avoid, lines 1-2 stay on page 1.
        let block = RenderNodeSpec::element(
            "div",
            "experience-item",
            vec![
                RenderNodeSpec::text("p", "", "one"),
                RenderNodeSpec::text("p", "", "two"),
                RenderNodeSpec::text("p", "", "three"),
                RenderNodeSpec::text("p", "", "four"),
            ],
        );
        let tree = laid_out(vec![spacer(75.0), block]);

        let loose = paginate(&tree, &BreakRules::default(), PAGE).unwrap();
        assert_eq!(texts(&loose[0]), vec!["one", "two"]);

        let avoid = rules(&tree, &[".experience-item"], &[], &[]);
        let kept = paginate(&tree, &avoid, PAGE).unwrap();
        assert!(kept[0].lines.is_empty());
        assert_eq!(texts(&kept[1]), vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_avoided_block_taller_than_page_is_split() {
        let lines = (0..15)
            .map(|i| RenderNodeSpec::text("p", "", &format!("line{i}")))
            .collect();
        let tree = laid_out(vec![RenderNodeSpec::element("div", "section", lines)]);
        let pages = paginate(&tree, &rules(&tree, &[".section"], &[], &[]), PAGE).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].lines.len(), 10);
    }

    #[test]
    fn test_forced_breaks_before_and_after() {
        let tree = laid_out(vec![
            RenderNodeSpec::text("p", "", "intro"),
            RenderNodeSpec::text("p", "page-break-before", "second"),
            RenderNodeSpec::text("p", "page-break-after", "third"),
            RenderNodeSpec::text("p", "", "fourth"),
        ]);
        let pages = paginate(
            &tree,
            &rules(&tree, &[], &[".page-break-before"], &[".page-break-after"]),
            PAGE,
        )
        .unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(texts(&pages[0]), vec!["intro"]);
        assert_eq!(texts(&pages[1]), vec!["second", "third"]);
        assert_eq!(texts(&pages[2]), vec!["fourth"]);
    }

    #[test]
    fn test_break_before_at_page_start_is_noop() {
        let tree = laid_out(vec![RenderNodeSpec::text("p", "page-break-before", "first")]);
        let forced = rules(&tree, &[], &[".page-break-before"], &[]);
        let pages = paginate(&tree, &forced, PAGE).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn test_pdf_converter_produces_pdf_bytes() {
        let tree = RenderTree::from_spec(&RenderNodeSpec::element(
            "div",
            "resume",
            vec![
                RenderNodeSpec::text("h1", "", "Ada Lovelace"),
                RenderNodeSpec::text("p", "", &"Wrote the first program. ".repeat(40)),
            ],
        ));
        let job = ConversionJob {
            tree,
            stylesheet: StyleSheet::default(),
            scale: 0.25,
            margins: Margins::from_trbl([10.0, 15.0, 10.0, 15.0]),
            page: PageGeometry::a4(),
            raster_quality: 0.98,
            page_breaks: PageBreakConfig::css_only(),
            title: "resume".to_string(),
        };

        let converter = PdfConverter::new(Arc::new(FlowLayout));
        let bytes = converter.convert(job).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_paginate_rejects_runaway_page_count() {
        let tree = laid_out(vec![spacer(1e13), RenderNodeSpec::text("p", "", "Rust")]);
        let err = paginate(&tree, &BreakRules::default(), PAGE).unwrap_err();
        assert!(err.pages > u64::from(MAX_PAGES));
    }

    #[tokio::test]
    async fn test_pdf_converter_rejects_oversized_tree() {
        let spec = RenderNodeSpec::element(
            "div",
            "resume",
            vec![spacer(1e13), RenderNodeSpec::text("p", "", "Rust")],
        );
        let job = ConversionJob {
            tree: RenderTree::from_spec(&spec),
            stylesheet: StyleSheet::default(),
            scale: 0.2,
            margins: Margins::from_trbl([10.0, 15.0, 10.0, 15.0]),
            page: PageGeometry::a4(),
            raster_quality: 0.9,
            page_breaks: PageBreakConfig::css_only(),
            title: "runaway".to_string(),
        };
        let converter = PdfConverter::new(Arc::new(FlowLayout));
        assert!(matches!(
            converter.convert(job).await,
            Err(ConversionError::InvalidJob(_))
        ));
    }

    #[tokio::test]
    async fn test_pdf_converter_rejects_bad_scale() {
        let job = ConversionJob {
            tree: RenderTree::from_spec(&RenderNodeSpec::element("div", "", vec![])),
            stylesheet: StyleSheet::default(),
            scale: 0.0,
            margins: Margins::default(),
            page: PageGeometry::a4(),
            raster_quality: 0.9,
            page_breaks: PageBreakConfig::css_only(),
            title: "empty".to_string(),
        };
        let converter = PdfConverter::new(Arc::new(FlowLayout));
        assert!(matches!(
            converter.convert(job).await,
            Err(ConversionError::InvalidJob(_))
        ));
    }
}
