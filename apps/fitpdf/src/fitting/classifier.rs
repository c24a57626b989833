//! Template classifier: infers the layout archetype of a content tree.
//!
//! Checks run in priority order and the first hit wins; anything unrecognised is
//! treated as `Modern`. Each check accepts either the utility classes the templates
//! ship with or the equivalent declared styling, so hand-built trees classify too.
//! The classifier reads declared styles only and never needs a layout pass.

use crate::fitting::templates::Archetype;
use crate::render::style::{Display, NodeStyle, TextAlign};
use crate::render::tree::{NodeId, RenderTree};

/// Bottom border width (layout units) treated as a heavy rule under a header.
const HEAVY_BORDER: f32 = 2.0;
/// Font weight at or below which typography counts as low-emphasis.
const LIGHT_WEIGHT: u16 = 300;

pub fn classify(tree: &RenderTree) -> Archetype {
    let root = tree.root();

    if is_modern(tree, root) {
        Archetype::Modern
    } else if is_classic(tree, root) {
        Archetype::Classic
    } else if is_minimalist(tree, root) {
        Archetype::Minimalist
    } else if tree.has_match(root, ".profile-section") && tree.has_match(root, ".metrics-section") {
        Archetype::Executive
    } else if is_creative(tree, root) {
        Archetype::Creative
    } else {
        Archetype::Modern
    }
}

fn is_modern(tree: &RenderTree, root: NodeId) -> bool {
    if tree.has_match(root, ".sidebar") && tree.has_match(root, ".main-content") {
        return true;
    }
    // A fixed-width panel sitting in a flex row next to a fluid sibling.
    tree.descendants(root).into_iter().any(|id| {
        let style = &tree.node(id).style;
        if style.display != Some(Display::Flex) {
            return false;
        }
        let children = tree.children(id);
        let fixed = children
            .iter()
            .filter(|c| tree.node(**c).style.width.is_some())
            .count();
        fixed >= 1 && children.len() > fixed
    })
}

fn is_classic(tree: &RenderTree, root: NodeId) -> bool {
    if tree.has_match(root, ".text-center") && tree.has_match(root, ".border-b-2") {
        return true;
    }
    any_style(tree, root, |s| {
        s.text_align == Some(TextAlign::Center)
            && s.border_bottom_width.is_some_and(|w| w >= HEAVY_BORDER)
    })
}

fn is_minimalist(tree: &RenderTree, root: NodeId) -> bool {
    if tree.has_match(root, ".font-light") && tree.has_match(root, ".tracking-wide") {
        return true;
    }
    any_style(tree, root, |s| s.font_weight.is_some_and(|w| w <= LIGHT_WEIGHT))
        && any_style(tree, root, |s| s.letter_spacing.is_some_and(|l| l > 0.0))
}

fn is_creative(tree: &RenderTree, root: NodeId) -> bool {
    tree.has_match(root, ".creative-header")
        || tree.has_match(root, ".gradient")
        || any_style(tree, root, |s| s.background_gradient == Some(true))
}

fn any_style(tree: &RenderTree, root: NodeId, predicate: impl Fn(&NodeStyle) -> bool) -> bool {
    tree.descendants(root)
        .into_iter()
        .any(|id| predicate(&tree.node(id).style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tree::RenderNodeSpec;

    fn make_tree(children: Vec<RenderNodeSpec>) -> RenderTree {
        RenderTree::from_spec(&RenderNodeSpec::element("div", "resume", children))
    }

    #[test]
    fn test_empty_tree_falls_back_to_modern() {
        assert_eq!(classify(&make_tree(vec![])), Archetype::Modern);
    }

    #[test]
    fn test_class_markers() {
        let cases = [
            (vec![".sidebar", ".main-content"], Archetype::Modern),
            (vec![".text-center", ".border-b-2"], Archetype::Classic),
            (vec![".font-light", ".tracking-wide"], Archetype::Minimalist),
            (vec![".profile-section", ".metrics-section"], Archetype::Executive),
            (vec![".creative-header"], Archetype::Creative),
            (vec![".gradient"], Archetype::Creative),
        ];
        for (classes, expected) in cases {
            let children = classes
                .iter()
                .map(|c| RenderNodeSpec::element("div", c.trim_start_matches('.'), vec![]))
                .collect();
            assert_eq!(classify(&make_tree(children)), expected, "{classes:?}");
        }
    }

    #[test]
    fn test_priority_order_prefers_earlier_archetype() {
        let tree = make_tree(vec![
            RenderNodeSpec::element("div", "creative-header", vec![]),
            RenderNodeSpec::element("div", "text-center", vec![]),
            RenderNodeSpec::element("div", "border-b-2", vec![]),
        ]);
        assert_eq!(classify(&tree), Archetype::Classic);
    }

    #[test]
    fn test_structural_side_panel_is_modern() {
        let tree = make_tree(vec![
            RenderNodeSpec::element("div", "creative-header", vec![]),
            RenderNodeSpec::element(
                "div",
                "",
                vec![
                    RenderNodeSpec::element("aside", "", vec![]).with_style(NodeStyle {
                        width: Some(180.0),
                        ..Default::default()
                    }),
                    RenderNodeSpec::element("main", "", vec![]),
                ],
            )
            .with_style(NodeStyle {
                display: Some(Display::Flex),
                ..Default::default()
            }),
        ]);
        assert_eq!(classify(&tree), Archetype::Modern);
    }

    #[test]
    fn test_structural_centered_heavy_header_is_classic() {
        let tree = make_tree(vec![RenderNodeSpec::text("header", "", "Ada Lovelace")
            .with_style(NodeStyle {
                text_align: Some(TextAlign::Center),
                border_bottom_width: Some(3.0),
                ..Default::default()
            })]);
        assert_eq!(classify(&tree), Archetype::Classic);
    }

    #[test]
    fn test_gradient_background_is_creative() {
        let tree = make_tree(vec![RenderNodeSpec::element("header", "", vec![]).with_style(
            NodeStyle {
                background_gradient: Some(true),
                ..Default::default()
            },
        )]);
        assert_eq!(classify(&tree), Archetype::Creative);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let tree = make_tree(vec![
            RenderNodeSpec::element("div", "font-light", vec![]),
            RenderNodeSpec::element("div", "tracking-wide", vec![]),
        ]);
        let first = classify(&tree);
        assert_eq!(first, classify(&tree));
        assert_eq!(first, Archetype::Minimalist);
    }
}
