//! Content analyzer: measures a laid-out tree and reports break-sensitive sections.
//!
//! Read-only. The tree must have been through a layout pass; hidden nodes are ignored.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fitting::classifier::classify;
use crate::fitting::templates::{Archetype, TemplateConfig};
use crate::render::selector::Selector;
use crate::render::style::Display;
use crate::render::tree::{NodeId, RenderTree};

/// Selectors that mark a section in every archetype.
pub const GENERIC_SECTION_SELECTORS: [&str; 7] = [
    ".section",
    ".page-break-avoid",
    ".experience-item",
    ".education-item",
    ".skill-item",
    ".summary-section",
    ".header-section",
];

const TEXT_BEARING: &str = "p, span, div, h1, h2, h3, h4, h5, h6, li";
const COMPLEX_LAYOUT: &str = "table, .grid, .flex, .progress-bar, canvas, svg";
const HEADINGS: &str = "h1, h2, h3";

const MIN_SECTION_HEIGHT: f32 = 10.0;
const MIN_SECTION_TEXT: usize = 10;
const DEFAULT_LINE_HEIGHT: f32 = 16.0;
const MAX_SENSITIVITY: f32 = 5.0;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionCategory {
    Header,
    Summary,
    Experience,
    Skills,
    Education,
    Other,
}

/// One detected section. `node` refers into the analysed tree and resolves to the
/// same node in any clone of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionAnalysis {
    pub category: SectionCategory,
    pub node: NodeId,
    /// The selector that found this section.
    pub selector: String,
    pub height: f32,
    pub text_length: usize,
    pub complexity: f32,
    /// In [1, 5].
    pub break_sensitivity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub text_density: f32,
    pub element_count: usize,
    pub average_line_height: f32,
    pub content_height: f32,
    pub content_width: f32,
    pub has_complex_layouts: bool,
    pub detected_archetype: Archetype,
    pub sections: Vec<SectionAnalysis>,
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis
// ────────────────────────────────────────────────────────────────────────────

pub fn analyze(tree: &RenderTree, config: &TemplateConfig) -> ContentAnalysis {
    let root = tree.root();
    let root_box = &tree.node(root).layout;

    let text_nodes = visible_matches(tree, TEXT_BEARING);
    let total_text = text_nodes
        .iter()
        .map(|id| tree.text_content(*id))
        .collect::<Vec<_>>()
        .join(" ");
    let text_density =
        total_text.chars().count() as f32 / (root_box.width * root_box.height).max(1.0);

    let average_line_height = if text_nodes.is_empty() {
        DEFAULT_LINE_HEIGHT
    } else {
        text_nodes
            .iter()
            .map(|id| tree.node(*id).computed.line_height)
            .sum::<f32>()
            / text_nodes.len() as f32
    };

    let has_complex_layouts = !visible_matches(tree, COMPLEX_LAYOUT).is_empty()
        || tree.descendants(root).into_iter().any(|id| {
            !tree.is_hidden(id)
                && matches!(tree.node(id).computed.display, Display::Grid | Display::Flex)
        });

    ContentAnalysis {
        text_density,
        element_count: text_nodes.len(),
        average_line_height,
        content_height: root_box.height,
        content_width: root_box.width,
        has_complex_layouts,
        detected_archetype: classify(tree),
        sections: find_sections(tree, config),
    }
}

fn find_sections(tree: &RenderTree, config: &TemplateConfig) -> Vec<SectionAnalysis> {
    let root = tree.root();
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut sections = Vec::new();

    let selectors = config
        .specific_selectors
        .iter()
        .chain(GENERIC_SECTION_SELECTORS.iter());

    for source in selectors {
        let selector = match Selector::parse(source) {
            Ok(selector) => selector,
            Err(e) => {
                warn!("Skipping section selector '{source}': {e}");
                continue;
            }
        };

        for id in tree.select(root, &selector) {
            if tree.is_hidden(id) || seen.contains(&id) {
                continue;
            }
            let height = tree.node(id).layout.height;
            let text = tree.text_content(id);
            let text_length = text.chars().count();
            if height <= MIN_SECTION_HEIGHT || text_length <= MIN_SECTION_TEXT {
                continue;
            }

            seen.insert(id);
            let category = categorize(tree, id, source, &text);
            sections.push(SectionAnalysis {
                category,
                node: id,
                selector: source.to_string(),
                height,
                text_length,
                complexity: complexity(tree, id),
                break_sensitivity: break_sensitivity(tree, id, source, category, text_length),
            });
        }
    }
    sections
}

fn categorize(tree: &RenderTree, id: NodeId, selector: &str, text: &str) -> SectionCategory {
    let classes = tree.node(id).class_name().to_lowercase();
    let text = text.to_lowercase();

    if classes.contains("header") || selector.contains("header") {
        return SectionCategory::Header;
    }
    let keyed = [
        ("summary", SectionCategory::Summary),
        ("experience", SectionCategory::Experience),
        ("skill", SectionCategory::Skills),
        ("education", SectionCategory::Education),
    ];
    keyed
        .iter()
        .find(|(key, _)| classes.contains(key) || text.contains(key))
        .map(|(_, category)| *category)
        .unwrap_or(SectionCategory::Other)
}

fn complexity(tree: &RenderTree, id: NodeId) -> f32 {
    let node = tree.node(id);
    let styled = if node.computed.is_layout_affecting() {
        1.0
    } else {
        0.0
    };
    0.1 * node.children.len() as f32 + 0.5 * tree.max_depth(id) as f32 + styled
}

fn break_sensitivity(
    tree: &RenderTree,
    id: NodeId,
    selector: &str,
    category: SectionCategory,
    text_length: usize,
) -> f32 {
    let mut sensitivity = 1.0_f32;

    let critical_selector = selector.contains("experience") || selector.contains("skill");
    let critical_category = matches!(
        category,
        SectionCategory::Experience | SectionCategory::Skills
    );
    if critical_selector || critical_category {
        sensitivity *= 2.0;
    }

    let has_heading = Selector::parse(HEADINGS)
        .map(|headings| {
            tree.descendants(id)
                .into_iter()
                .skip(1)
                .any(|n| headings.matches(tree, n))
        })
        .unwrap_or(false);
    if has_heading {
        sensitivity *= 1.5;
    }

    if text_length > 200 {
        sensitivity *= 1.3;
    }
    sensitivity.min(MAX_SENSITIVITY)
}

fn visible_matches(tree: &RenderTree, selector: &str) -> Vec<NodeId> {
    match tree.query(tree.root(), selector) {
        Ok(ids) => ids.into_iter().filter(|id| !tree.is_hidden(*id)).collect(),
        Err(e) => {
            warn!("Invalid analysis selector '{selector}': {e}");
            Vec::new()
        }
    }
}
