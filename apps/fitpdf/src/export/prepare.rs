//! Export preparation: temporary style overrides on the live document.
//!
//! `PreparedDocument::prepare` injects the page-break override sheet and rewrites the
//! root's inline style for paged output. Dropping the guard restores the root's
//! original inline style and removes the sheet, on every exit path.

use crate::fitting::page::PX_TO_MM;
use crate::fitting::templates::TemplateConfig;
use crate::render::document::{Document, InjectedStyles, StyleSheet};
use crate::render::selector::Selector;
use crate::render::style::{BreakRule, EdgesDecl, NodeStyle};
use crate::render::tree::NodeId;

/// Selectors that receive section spacing and break protection.
pub const SECTION_SELECTORS: &str =
    ".page-break-avoid, .section, .experience-item, .education-item, .skill-item";
/// Elements that must not be separated from what follows them.
pub const CRITICAL_SELECTORS: &str = "h1, h2, h3, .job-title, .company-name, .skill-name";

const ORPHANS_WIDOWS: u8 = 3;

pub struct PreparedDocument<'d> {
    doc: &'d Document,
    root: NodeId,
    original_root_style: Option<NodeStyle>,
    _styles: InjectedStyles<'d>,
}

impl<'d> PreparedDocument<'d> {
    pub fn prepare(doc: &'d Document, config: &TemplateConfig) -> Self {
        let styles = doc.inject_styles(override_sheet(config));

        let mut tree = doc.tree_mut();
        let root = tree.root();
        let mut style = tree.inline_style(root).clone();
        style.width = None;
        style.max_width = None;
        style.margin = EdgesDecl::all(0.0);
        style.padding = EdgesDecl::all(0.0);
        if style.font_family.is_none() {
            style.font_family = Some(config.archetype.default_font());
        }
        let original = tree.set_inline_style(root, style);
        drop(tree);

        Self {
            doc,
            root,
            original_root_style: Some(original),
            _styles: styles,
        }
    }
}

impl Drop for PreparedDocument<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.original_root_style.take() {
            self.doc.tree_mut().set_inline_style(self.root, original);
        }
    }
}

/// `!important` rules layered over the document while an export runs.
pub fn override_sheet(config: &TemplateConfig) -> StyleSheet {
    let mut sheet = StyleSheet::default();
    let spacing = config.section_padding_mm / PX_TO_MM;

    push_rule(
        &mut sheet,
        SECTION_SELECTORS,
        NodeStyle {
            break_inside: Some(BreakRule::Avoid),
            margin: EdgesDecl {
                bottom: Some(spacing),
                ..Default::default()
            },
            padding: EdgesDecl {
                bottom: Some(spacing / 2.0),
                ..Default::default()
            },
            ..Default::default()
        },
    );

    for selector in config.specific_selectors {
        push_rule(
            &mut sheet,
            selector,
            NodeStyle {
                break_inside: Some(BreakRule::Avoid),
                orphans: Some(ORPHANS_WIDOWS),
                widows: Some(ORPHANS_WIDOWS),
                ..Default::default()
            },
        );
    }

    push_rule(
        &mut sheet,
        CRITICAL_SELECTORS,
        NodeStyle {
            break_after: Some(BreakRule::Avoid),
            break_inside: Some(BreakRule::Avoid),
            orphans: Some(ORPHANS_WIDOWS),
            widows: Some(ORPHANS_WIDOWS),
            ..Default::default()
        },
    );
    sheet
}

fn push_rule(sheet: &mut StyleSheet, selector: &str, declarations: NodeStyle) {
    match Selector::parse(selector) {
        Ok(selector) => sheet.push(selector, declarations, true),
        Err(e) => tracing::warn!("Skipping override for '{selector}': {e}"),
    }
}
