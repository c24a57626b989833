//! Arena-backed render tree.
//!
//! The presentation layer sends a nested `RenderNodeSpec`; it is flattened into a
//! `RenderTree` whose nodes are addressed by `NodeId`. Cloning a tree preserves ids,
//! so a `NodeId` recorded while analysing the live tree resolves to the same node in
//! any offscreen clone.

use serde::{Deserialize, Serialize};

use crate::render::selector::{Selector, SelectorError};
use crate::render::style::{ComputedStyle, Display, NodeStyle};

// ────────────────────────────────────────────────────────────────────────────
// Input nodes
// ────────────────────────────────────────────────────────────────────────────

/// Serialized form of a render node, as produced by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderNodeSpec {
    pub tag: String,
    /// Space-separated class list.
    pub class: String,
    pub text: Option<String>,
    pub style: NodeStyle,
    pub children: Vec<RenderNodeSpec>,
}

impl RenderNodeSpec {
    pub fn element(tag: &str, class: &str, children: Vec<RenderNodeSpec>) -> Self {
        Self {
            tag: tag.to_string(),
            class: class.to_string(),
            children,
            ..Default::default()
        }
    }

    pub fn text(tag: &str, class: &str, text: &str) -> Self {
        Self {
            tag: tag.to_string(),
            class: class.to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = style;
        self
    }

    /// Checks the declared lengths of this node and every descendant.
    pub fn validate(&self) -> Result<(), String> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.style
                .check_lengths()
                .map_err(|e| format!("<{}>: {e}", node.tag))?;
            stack.extend(node.children.iter());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Arena types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// One wrapped line of text positioned by the layout engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Border-box geometry written by the layout engine. Coordinates are absolute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub lines: Vec<TextLine>,
}

impl LayoutBox {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub tag: String,
    pub classes: Vec<String>,
    pub text: Option<String>,
    /// Inline (declared) style.
    pub style: NodeStyle,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Valid after a layout pass.
    pub computed: ComputedStyle,
    /// Valid after a layout pass.
    pub layout: LayoutBox,
}

impl RenderNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }

    pub fn own_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTree {
    nodes: Vec<RenderNode>,
}

impl RenderTree {
    /// Flattens a nested node description into an arena. Its root becomes `NodeId(0)`.
    pub fn from_spec(spec: &RenderNodeSpec) -> Self {
        let mut tree = RenderTree { nodes: Vec::new() };
        tree.push_spec(spec, None);
        tree
    }

    fn push_spec(&mut self, spec: &RenderNodeSpec, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(RenderNode {
            tag: spec.tag.to_ascii_lowercase(),
            classes: spec.class.split_whitespace().map(str::to_string).collect(),
            text: spec.text.clone(),
            style: spec.style.clone(),
            parent,
            children: Vec::new(),
            computed: ComputedStyle::default(),
            layout: LayoutBox::default(),
        });
        for child in &spec.children {
            let child_id = self.push_spec(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &RenderNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut RenderNode {
        &mut self.nodes[id.0]
    }

    pub fn inline_style(&self, id: NodeId) -> &NodeStyle {
        &self.nodes[id.0].style
    }

    /// Replaces a node's inline style, returning the previous one.
    pub fn set_inline_style(&mut self, id: NodeId, style: NodeStyle) -> NodeStyle {
        std::mem::replace(&mut self.nodes[id.0].style, style)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Preorder traversal starting at (and including) `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// True if `id` or any ancestor is laid out with `display: none`.
    pub fn is_hidden(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.node(node).computed.display == Display::None {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Nodes under `scope` (inclusive) matching a selector, in document order.
    pub fn select(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    /// Parses and runs a selector in one step.
    pub fn query(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        Ok(self.select(scope, &Selector::parse(selector)?))
    }

    /// True if any node under `scope` matches. Invalid selectors never match.
    pub fn has_match(&self, scope: NodeId, selector: &str) -> bool {
        match Selector::parse(selector) {
            Ok(selector) => self
                .descendants(scope)
                .into_iter()
                .any(|id| selector.matches(self, id)),
            Err(_) => false,
        }
    }

    /// Concatenated trimmed text of the subtree, words separated by single spaces.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .map(|n| self.node(n).own_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Depth of the deepest descendant relative to `id` (a leaf has depth 0).
    pub fn max_depth(&self, id: NodeId) -> usize {
        self.children(id)
            .iter()
            .map(|child| 1 + self.max_depth(*child))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_spec() -> RenderNodeSpec {
        RenderNodeSpec::element(
            "DIV",
            "resume  modern",
            vec![
                RenderNodeSpec::text("h1", "name", "  Ada Lovelace "),
                RenderNodeSpec::element(
                    "div",
                    "section",
                    vec![RenderNodeSpec::element(
                        "ul",
                        "",
                        vec![RenderNodeSpec::text("li", "", "Analytical engine")],
                    )],
                ),
            ],
        )
    }

    #[test]
    fn test_from_spec_assigns_preorder_ids() {
        let tree = RenderTree::from_spec(&make_spec());
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.node(tree.root()).tag, "div");
        assert_eq!(tree.node(tree.root()).classes, vec!["resume", "modern"]);
        assert_eq!(tree.node(NodeId(1)).tag, "h1");
        assert_eq!(tree.parent(NodeId(4)), Some(NodeId(3)));
        assert_eq!(
            tree.descendants(tree.root()),
            (0..5).map(NodeId).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_text_content_and_depth() {
        let tree = RenderTree::from_spec(&make_spec());
        assert_eq!(
            tree.text_content(tree.root()),
            "Ada Lovelace Analytical engine"
        );
        assert_eq!(tree.max_depth(tree.root()), 3);
        assert_eq!(tree.max_depth(NodeId(1)), 0);
    }

    #[test]
    fn test_clone_preserves_ids() {
        let tree = RenderTree::from_spec(&make_spec());
        let clone = tree.clone();
        let ids = tree.query(tree.root(), "li").unwrap();
        assert_eq!(clone.node(ids[0]).own_text(), "Analytical engine");
    }

    #[test]
    fn test_validate_reaches_nested_nodes() {
        assert!(make_spec().validate().is_ok());

        let mut spec = make_spec();
        spec.children[1].children[0].style.padding.top = Some(f32::INFINITY);
        let err = spec.validate().unwrap_err();
        assert!(err.starts_with("<ul>"), "{err}");
    }

    #[test]
    fn test_has_match_ignores_invalid_selectors() {
        let tree = RenderTree::from_spec(&make_spec());
        assert!(tree.has_match(tree.root(), ".section"));
        assert!(!tree.has_match(tree.root(), "li:first-child"));
    }
}
