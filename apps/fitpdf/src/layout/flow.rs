//! Block-flow layout engine.
//!
//! `FlowLayout` resolves the cascade for every node, then places boxes top-down:
//! - block children stack vertically inside the parent's content box
//! - `display: flex` with `flex-direction: row` places children side by side; children
//!   with a fixed width keep it and the rest share what is left equally
//! - `position: absolute | fixed` children are placed but take no space in the flow
//! - `display: none` collapses the node and its subtree to zero-size boxes
//! - text wraps greedily at the content width using the static font-metric tables
//!
//! Grid containers are laid out as blocks; margin collapsing is not modelled.
//! A wider viewport never produces a taller document, which the scale search relies on.

use thiserror::Error;

use crate::layout::font_metrics::get_metrics;
use crate::render::document::StyleSheet;
use crate::render::style::{ComputedStyle, Display, FlexDirection, Position, TextAlign};
use crate::render::tree::{LayoutBox, NodeId, RenderTree, TextLine};

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("viewport width must be a positive finite number, got {0}")]
    InvalidViewport(f32),

    #[error("layout produced non-finite geometry at node {0}")]
    NonFiniteGeometry(usize),
}

/// Lays a render tree out at a given viewport width, writing `computed` and `layout`
/// into every node.
pub trait LayoutEngine: Send + Sync {
    fn layout(
        &self,
        tree: &mut RenderTree,
        viewport_width: f32,
        sheet: &StyleSheet,
    ) -> Result<(), LayoutError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlowLayout;

impl LayoutEngine for FlowLayout {
    fn layout(
        &self,
        tree: &mut RenderTree,
        viewport_width: f32,
        sheet: &StyleSheet,
    ) -> Result<(), LayoutError> {
        if !viewport_width.is_finite() || viewport_width <= 0.0 {
            return Err(LayoutError::InvalidViewport(viewport_width));
        }

        compute_styles(tree, sheet);
        let root = tree.root();
        place_block(tree, root, 0.0, 0.0, viewport_width);

        let root_box = &tree.node(root).layout;
        if !root_box.height.is_finite() || !root_box.width.is_finite() {
            return Err(LayoutError::NonFiniteGeometry(root.0));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Style resolution
// ────────────────────────────────────────────────────────────────────────────

fn compute_styles(tree: &mut RenderTree, sheet: &StyleSheet) {
    // Preorder guarantees every parent is resolved before its children.
    for id in tree.descendants(tree.root()) {
        let declared = sheet.cascade(tree, id);
        let parent = tree.parent(id).map(|p| tree.node(p).computed.clone());
        tree.node_mut(id).computed = ComputedStyle::resolve(parent.as_ref(), &declared);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Box placement
// ────────────────────────────────────────────────────────────────────────────

/// Places `id` with its margin box starting at (`x`, `y`) and `available` width.
/// Returns the outer (margin-box) height consumed in the flow.
fn place_block(tree: &mut RenderTree, id: NodeId, x: f32, y: f32, available: f32) -> f32 {
    let style = tree.node(id).computed.clone();

    if style.display == Display::None {
        collapse_subtree(tree, id, x, y);
        return 0.0;
    }

    let margin = style.margin;
    let padding = style.padding;
    let box_x = x + margin.left;
    let box_y = y + margin.top;

    let mut width = style
        .width
        .unwrap_or(available - margin.left - margin.right);
    if let Some(max_width) = style.max_width {
        width = width.min(max_width);
    }
    let width = width.max(0.0);

    let content_x = box_x + padding.left;
    let content_width = (width - padding.left - padding.right).max(0.0);
    let mut cursor = box_y + padding.top;

    let lines = wrap_own_text(tree, id, &style, content_x, cursor, content_width);
    cursor += lines.iter().map(|l| l.height).sum::<f32>();

    let children: Vec<NodeId> = tree.children(id).to_vec();
    let is_row = style.display == Display::Flex && style.flex_direction == FlexDirection::Row;
    if is_row {
        cursor += place_flex_row(tree, &children, content_x, cursor, content_width);
    } else {
        for child in children {
            if is_out_of_flow(tree, child) {
                place_block(tree, child, content_x, cursor, content_width);
                continue;
            }
            cursor += place_block(tree, child, content_x, cursor, content_width);
        }
    }

    let height = cursor + padding.bottom + style.border_bottom_width - box_y;
    tree.node_mut(id).layout = LayoutBox {
        x: box_x,
        y: box_y,
        width,
        height,
        lines,
    };

    height + margin.top + margin.bottom
}

/// Lays out the children of a flex row. Returns the row height.
fn place_flex_row(
    tree: &mut RenderTree,
    children: &[NodeId],
    x: f32,
    y: f32,
    content_width: f32,
) -> f32 {
    let in_flow: Vec<NodeId> = children
        .iter()
        .copied()
        .filter(|c| !is_out_of_flow(tree, *c))
        .collect();

    let mut fixed_total = 0.0_f32;
    let mut flexible = 0usize;
    for child in &in_flow {
        match fixed_outer_width(&tree.node(*child).computed) {
            Some(w) => fixed_total += w,
            None => flexible += 1,
        }
    }
    let share = if flexible > 0 {
        ((content_width - fixed_total) / flexible as f32).max(0.0)
    } else {
        0.0
    };

    let mut x_cursor = x;
    let mut row_height = 0.0_f32;
    for child in children {
        if is_out_of_flow(tree, *child) {
            place_block(tree, *child, x, y, content_width);
            continue;
        }
        let slot = fixed_outer_width(&tree.node(*child).computed).unwrap_or(share);
        let h = place_block(tree, *child, x_cursor, y, slot);
        row_height = row_height.max(h);
        x_cursor += slot;
    }
    row_height
}

fn fixed_outer_width(style: &ComputedStyle) -> Option<f32> {
    if style.display == Display::None {
        return Some(0.0);
    }
    style
        .width
        .map(|w| w + style.margin.left + style.margin.right)
}

fn is_out_of_flow(tree: &RenderTree, id: NodeId) -> bool {
    matches!(
        tree.node(id).computed.position,
        Position::Absolute | Position::Fixed
    )
}

fn wrap_own_text(
    tree: &RenderTree,
    id: NodeId,
    style: &ComputedStyle,
    content_x: f32,
    top: f32,
    content_width: f32,
) -> Vec<TextLine> {
    let text = tree.node(id).own_text();
    if text.is_empty() {
        return Vec::new();
    }

    let metrics = get_metrics(&style.font_family);
    metrics
        .wrap_lines(text, content_width, style.font_size, style.letter_spacing)
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let offset = match style.text_align {
                TextAlign::Left => 0.0,
                TextAlign::Center => ((content_width - line.width) / 2.0).max(0.0),
                TextAlign::Right => (content_width - line.width).max(0.0),
            };
            TextLine {
                text: line.text,
                x: content_x + offset,
                y: top + i as f32 * style.line_height,
                width: line.width,
                height: style.line_height,
            }
        })
        .collect()
}

fn collapse_subtree(tree: &mut RenderTree, id: NodeId, x: f32, y: f32) {
    for node in tree.descendants(id) {
        tree.node_mut(node).layout = LayoutBox {
            x,
            y,
            ..Default::default()
        };
    }
}
