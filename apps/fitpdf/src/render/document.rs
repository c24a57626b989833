//! The live document: the user-visible render tree plus everything temporarily
//! attached to it during an export run.
//!
//! Two RAII guards scope every mutation:
//! - `OffscreenClone`: a disposable copy of the tree registered with the document
//!   while a scale candidate is measured; it detaches itself on drop.
//! - `InjectedStyles`: a style sheet layered over the document; removed on drop.
//!
//! Both guards release on every exit path (early return, `?`, panic unwinding),
//! so no measurement path needs its own cleanup code.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::render::selector::Selector;
use crate::render::style::NodeStyle;
use crate::render::tree::{NodeId, RenderTree};

// ────────────────────────────────────────────────────────────────────────────
// Style sheets
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: Selector,
    pub declarations: NodeStyle,
    /// `!important` rules win over inline styles.
    pub important: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    pub rules: Vec<StyleRule>,
}

impl StyleSheet {
    pub fn push(&mut self, selector: Selector, declarations: NodeStyle, important: bool) {
        self.rules.push(StyleRule {
            selector,
            declarations,
            important,
        });
    }

    pub fn extend(&mut self, other: &StyleSheet) {
        self.rules.extend(other.rules.iter().cloned());
    }

    /// Declared style for a node: normal rules, then inline style, then important rules.
    pub fn cascade(&self, tree: &RenderTree, id: NodeId) -> NodeStyle {
        let mut declared = NodeStyle::default();
        for rule in self.rules.iter().filter(|r| !r.important) {
            if rule.selector.matches(tree, id) {
                declared.overlay(&rule.declarations);
            }
        }
        declared.overlay(&tree.node(id).style);
        for rule in self.rules.iter().filter(|r| r.important) {
            if rule.selector.matches(tree, id) {
                declared.overlay(&rule.declarations);
            }
        }
        declared
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Document {
    tree: RwLock<RenderTree>,
    sheets: Mutex<Vec<(u64, StyleSheet)>>,
    offscreen: Mutex<BTreeSet<u64>>,
    next_id: AtomicU64,
}

impl Document {
    pub fn new(tree: RenderTree) -> Self {
        Self {
            tree: RwLock::new(tree),
            sheets: Mutex::new(Vec::new()),
            offscreen: Mutex::new(BTreeSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Read access to the live tree. Do not hold the guard across an `.await`.
    pub fn tree(&self) -> RwLockReadGuard<'_, RenderTree> {
        self.tree.read()
    }

    pub fn tree_mut(&self) -> RwLockWriteGuard<'_, RenderTree> {
        self.tree.write()
    }

    /// All injected sheets merged in injection order.
    pub fn computed_sheet(&self) -> StyleSheet {
        let mut merged = StyleSheet::default();
        for (_, sheet) in self.sheets.lock().iter() {
            merged.extend(sheet);
        }
        merged
    }

    #[cfg(test)]
    pub fn injected_sheet_count(&self) -> usize {
        self.sheets.lock().len()
    }

    pub fn inject_styles(&self, sheet: StyleSheet) -> InjectedStyles<'_> {
        let id = self.next_id();
        self.sheets.lock().push((id, sheet));
        InjectedStyles { doc: self, id }
    }

    /// Snapshots the live tree into a clone registered as attached to this document.
    pub fn attach_offscreen(&self) -> OffscreenClone<'_> {
        let tree = self.tree.read().clone();
        let id = self.next_id();
        self.offscreen.lock().insert(id);
        OffscreenClone {
            doc: self,
            id,
            tree,
        }
    }

    /// Number of offscreen clones currently attached.
    pub fn offscreen_count(&self) -> usize {
        self.offscreen.lock().len()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// A style sheet layered over the document for the guard's lifetime.
#[derive(Debug)]
pub struct InjectedStyles<'d> {
    doc: &'d Document,
    id: u64,
}

impl Drop for InjectedStyles<'_> {
    fn drop(&mut self) {
        self.doc.sheets.lock().retain(|(id, _)| *id != self.id);
    }
}

/// A disposable copy of the live tree, attached to the document until dropped.
#[derive(Debug)]
pub struct OffscreenClone<'d> {
    doc: &'d Document,
    id: u64,
    tree: RenderTree,
}

impl OffscreenClone<'_> {
    pub fn tree(&self) -> &RenderTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut RenderTree {
        &mut self.tree
    }
}

impl Drop for OffscreenClone<'_> {
    fn drop(&mut self) {
        self.doc.offscreen.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::style::BreakRule;
    use crate::render::tree::RenderNodeSpec;

    fn make_document() -> Document {
        Document::new(RenderTree::from_spec(&RenderNodeSpec::element(
            "div",
            "resume",
            vec![RenderNodeSpec::text("p", "summary", "Hello")
                .with_style(NodeStyle {
                    break_inside: Some(BreakRule::Auto),
                    font_size: Some(30.0),
                    ..Default::default()
                })],
        )))
    }

    fn avoid_rule(selector: &str, important: bool) -> StyleSheet {
        let mut sheet = StyleSheet::default();
        sheet.push(
            Selector::parse(selector).unwrap(),
            NodeStyle {
                break_inside: Some(BreakRule::Avoid),
                font_size: Some(10.0),
                ..Default::default()
            },
            important,
        );
        sheet
    }

    #[test]
    fn test_offscreen_clone_detaches_on_drop() {
        let doc = make_document();
        {
            let first = doc.attach_offscreen();
            let _second = doc.attach_offscreen();
            assert_eq!(doc.offscreen_count(), 2);
            drop(first);
            assert_eq!(doc.offscreen_count(), 1);
        }
        assert_eq!(doc.offscreen_count(), 0);
    }

    #[test]
    fn test_clone_mutation_does_not_touch_live_tree() {
        let doc = make_document();
        let mut clone = doc.attach_offscreen();
        let root = clone.tree().root();
        clone.tree_mut().node_mut(root).text = Some("changed".to_string());
        assert_eq!(doc.tree().node(root).text, None);
    }

    #[test]
    fn test_injected_styles_removed_on_drop() {
        let doc = make_document();
        {
            let _guard = doc.inject_styles(avoid_rule("p", true));
            assert_eq!(doc.injected_sheet_count(), 1);
            assert_eq!(doc.computed_sheet().rules.len(), 1);
        }
        assert_eq!(doc.injected_sheet_count(), 0);
        assert!(doc.computed_sheet().rules.is_empty());
    }

    #[test]
    fn test_cascade_important_beats_inline_and_inline_beats_normal() {
        let doc = make_document();
        let tree = doc.tree();
        let p = tree.query(tree.root(), "p").unwrap()[0];

        let normal = avoid_rule("p", false).cascade(&tree, p);
        assert_eq!(normal.break_inside, Some(BreakRule::Auto));
        assert_eq!(normal.font_size, Some(30.0));

        let important = avoid_rule("p", true).cascade(&tree, p);
        assert_eq!(important.break_inside, Some(BreakRule::Avoid));
        assert_eq!(important.font_size, Some(10.0));
    }
}
