//! Conversion seam: turns a prepared render tree into PDF bytes.
//!
//! `Exporter` holds an `Arc<dyn DocumentConverter>`; `PdfConverter` is the printpdf
//! backend, tests swap in mocks.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fitting::page::{Margins, PageGeometry};
use crate::fitting::templates::TemplateConfig;
use crate::layout::LayoutError;
use crate::render::document::StyleSheet;
use crate::render::selector::{Selector, SelectorError};
use crate::render::style::BreakRule;
use crate::render::tree::{NodeId, RenderTree};

pub const BREAK_BEFORE_SELECTOR: &str = ".page-break-before";
pub const BREAK_AFTER_SELECTOR: &str = ".page-break-after";
/// Marker class honoured in `legacy` mode: a page break is forced before it.
pub const LEGACY_BREAK_CLASS: &str = "html2pdf__page-break";
pub const CATCH_ALL: &str = "*";

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("invalid conversion job: {0}")]
    InvalidJob(String),

    #[error("layout failed: {0}")]
    Layout(#[from] LayoutError),

    #[error("invalid page-break selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("converter produced an empty document")]
    EmptyOutput,

    #[error("conversion timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("conversion worker failed: {0}")]
    Worker(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Page-break configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageBreakMode {
    /// Every node is kept whole where it fits on a page.
    AvoidAll,
    /// Honour computed `break-*` styles.
    Css,
    /// Honour legacy break marker elements.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBreakConfig {
    pub modes: Vec<PageBreakMode>,
    pub avoid: Vec<String>,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl PageBreakConfig {
    /// Archetype selectors, then the policy's list, then the catch-all.
    pub fn for_template(config: &TemplateConfig) -> Self {
        let mut avoid: Vec<String> = Vec::new();
        let policy = config.page_break_policy.avoid_selectors();
        for selector in config
            .specific_selectors
            .iter()
            .chain(policy.iter())
            .chain(std::iter::once(&CATCH_ALL))
        {
            if !avoid.iter().any(|s| s.as_str() == *selector) {
                avoid.push(selector.to_string());
            }
        }

        Self {
            modes: vec![
                PageBreakMode::AvoidAll,
                PageBreakMode::Css,
                PageBreakMode::Legacy,
            ],
            avoid,
            before: vec![BREAK_BEFORE_SELECTOR.to_string()],
            after: vec![BREAK_AFTER_SELECTOR.to_string()],
        }
    }

    /// CSS-driven breaks only, no selector lists.
    pub fn css_only() -> Self {
        Self {
            modes: vec![PageBreakMode::Css],
            avoid: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    fn has_mode(&self, mode: PageBreakMode) -> bool {
        self.modes.contains(&mode)
    }
}

/// Page-break rules resolved against a laid-out tree.
#[derive(Debug, Default)]
pub struct BreakRules {
    pub avoid: HashSet<NodeId>,
    pub before: HashSet<NodeId>,
    pub after: HashSet<NodeId>,
}

impl BreakRules {
    pub fn resolve(tree: &RenderTree, config: &PageBreakConfig) -> Result<Self, SelectorError> {
        let root = tree.root();
        let mut rules = BreakRules::default();

        rules.avoid.extend(select_all(tree, &config.avoid)?);
        rules.before.extend(select_all(tree, &config.before)?);
        rules.after.extend(select_all(tree, &config.after)?);

        let all = tree.descendants(root);
        if config.has_mode(PageBreakMode::AvoidAll) {
            rules.avoid.extend(all.iter().copied());
        }
        if config.has_mode(PageBreakMode::Css) {
            for id in &all {
                let style = &tree.node(*id).computed;
                if style.break_inside == BreakRule::Avoid {
                    rules.avoid.insert(*id);
                }
                if style.break_before == BreakRule::Always {
                    rules.before.insert(*id);
                }
                if style.break_after == BreakRule::Always {
                    rules.after.insert(*id);
                }
            }
        }
        if config.has_mode(PageBreakMode::Legacy) {
            rules.before.extend(
                all.iter()
                    .copied()
                    .filter(|id| tree.node(*id).has_class(LEGACY_BREAK_CLASS)),
            );
        }
        Ok(rules)
    }
}

fn select_all(tree: &RenderTree, sources: &[String]) -> Result<Vec<NodeId>, SelectorError> {
    let mut out = Vec::new();
    for source in sources {
        out.extend(tree.select(tree.root(), &Selector::parse(source)?));
    }
    Ok(out)
}

// ────────────────────────────────────────────────────────────────────────────
// Job and trait
// ────────────────────────────────────────────────────────────────────────────

/// Everything a converter needs. The tree is a snapshot; converters own it.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub tree: RenderTree,
    pub stylesheet: StyleSheet,
    pub scale: f32,
    pub margins: Margins,
    pub page: PageGeometry,
    /// (0, 1].
    pub raster_quality: f32,
    pub page_breaks: PageBreakConfig,
    pub title: String,
}

#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, job: ConversionJob) -> Result<Bytes, ConversionError>;
}
