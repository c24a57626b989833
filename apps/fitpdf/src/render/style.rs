//! Declared and computed styles for render-tree nodes.
//!
//! Declared styles (`NodeStyle`) carry only what a node or rule sets; every field is
//! optional so rules can be layered. `ComputedStyle` is the fully resolved value set
//! the layout engine and analyzers read, produced by `ComputedStyle::resolve`.
//!
//! Lengths are layout units: typographic points at scale 1.0.

use serde::{Deserialize, Serialize};

use crate::layout::font_metrics::FontFamily;

// ────────────────────────────────────────────────────────────────────────────
// Keyword enums
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Display {
    #[default]
    Block,
    /// Laid out as a block; inline formatting contexts are not modelled.
    Inline,
    Flex,
    Grid,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexDirection {
    #[default]
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// `break-inside` / `break-before` / `break-after` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakRule {
    #[default]
    Auto,
    Avoid,
    Always,
}

// ────────────────────────────────────────────────────────────────────────────
// Box edges
// ────────────────────────────────────────────────────────────────────────────

/// Declared box edges; unset sides fall through to the next layer of the cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgesDecl {
    pub top: Option<f32>,
    pub right: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
}

impl EdgesDecl {
    pub fn all(value: f32) -> Self {
        Self {
            top: Some(value),
            right: Some(value),
            bottom: Some(value),
            left: Some(value),
        }
    }

    fn overlay(&mut self, other: &EdgesDecl) {
        overlay(&mut self.top, other.top);
        overlay(&mut self.right, other.right);
        overlay(&mut self.bottom, other.bottom);
        overlay(&mut self.left, other.left);
    }

    fn resolve(&self) -> Edges {
        Edges {
            top: self.top.unwrap_or(0.0),
            right: self.right.unwrap_or(0.0),
            bottom: self.bottom.unwrap_or(0.0),
            left: self.left.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

// ────────────────────────────────────────────────────────────────────────────
// Declared style
// ────────────────────────────────────────────────────────────────────────────

/// Style values declared inline on a node or by a style rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStyle {
    pub display: Option<Display>,
    pub flex_direction: Option<FlexDirection>,
    pub position: Option<Position>,
    /// Any CSS transform; only its presence matters to the engine.
    pub transform: Option<String>,
    pub font_family: Option<FontFamily>,
    pub font_size: Option<f32>,
    pub font_weight: Option<u16>,
    /// Unitless multiplier of the font size.
    pub line_height: Option<f32>,
    pub letter_spacing: Option<f32>,
    pub text_align: Option<TextAlign>,
    pub width: Option<f32>,
    pub max_width: Option<f32>,
    pub margin: EdgesDecl,
    pub padding: EdgesDecl,
    pub border_bottom_width: Option<f32>,
    pub background_gradient: Option<bool>,
    pub break_inside: Option<BreakRule>,
    pub break_before: Option<BreakRule>,
    pub break_after: Option<BreakRule>,
    pub orphans: Option<u8>,
    pub widows: Option<u8>,
}

impl NodeStyle {
    /// Layers every value set in `other` on top of `self`.
    pub fn overlay(&mut self, other: &NodeStyle) {
        overlay(&mut self.display, other.display);
        overlay(&mut self.flex_direction, other.flex_direction);
        overlay(&mut self.position, other.position);
        if other.transform.is_some() {
            self.transform.clone_from(&other.transform);
        }
        overlay(&mut self.font_family, other.font_family);
        overlay(&mut self.font_size, other.font_size);
        overlay(&mut self.font_weight, other.font_weight);
        overlay(&mut self.line_height, other.line_height);
        overlay(&mut self.letter_spacing, other.letter_spacing);
        overlay(&mut self.text_align, other.text_align);
        overlay(&mut self.width, other.width);
        overlay(&mut self.max_width, other.max_width);
        self.margin.overlay(&other.margin);
        self.padding.overlay(&other.padding);
        overlay(&mut self.border_bottom_width, other.border_bottom_width);
        overlay(&mut self.background_gradient, other.background_gradient);
        overlay(&mut self.break_inside, other.break_inside);
        overlay(&mut self.break_before, other.break_before);
        overlay(&mut self.break_after, other.break_after);
        overlay(&mut self.orphans, other.orphans);
        overlay(&mut self.widows, other.widows);
    }
}

/// Largest absolute length accepted in a declared style, in layout units.
pub const MAX_DECLARED_LENGTH: f32 = 100_000.0;

impl NodeStyle {
    /// Rejects lengths that are not finite, exceed `MAX_DECLARED_LENGTH`, or are
    /// negative where only sizes make sense. Margins and letter spacing may be negative.
    pub fn check_lengths(&self) -> Result<(), String> {
        let sizes = [
            ("font_size", self.font_size),
            ("line_height", self.line_height),
            ("width", self.width),
            ("max_width", self.max_width),
            ("padding.top", self.padding.top),
            ("padding.right", self.padding.right),
            ("padding.bottom", self.padding.bottom),
            ("padding.left", self.padding.left),
            ("border_bottom_width", self.border_bottom_width),
        ];
        let offsets = [
            ("letter_spacing", self.letter_spacing),
            ("margin.top", self.margin.top),
            ("margin.right", self.margin.right),
            ("margin.bottom", self.margin.bottom),
            ("margin.left", self.margin.left),
        ];

        for (name, value, signed) in sizes
            .into_iter()
            .map(|(n, v)| (n, v, false))
            .chain(offsets.into_iter().map(|(n, v)| (n, v, true)))
        {
            let Some(value) = value else { continue };
            if !value.is_finite() || value.abs() > MAX_DECLARED_LENGTH {
                return Err(format!(
                    "{name} must be finite and within {MAX_DECLARED_LENGTH}, got {value}"
                ));
            }
            if !signed && value < 0.0 {
                return Err(format!("{name} cannot be negative, got {value}"));
            }
        }
        Ok(())
    }
}

fn overlay<T: Copy>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Computed style
// ────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_FONT_SIZE: f32 = 40.0;
pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;

/// Fully resolved style for a node after the cascade and inheritance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub position: Position,
    pub has_transform: bool,
    pub font_family: FontFamily,
    pub font_size: f32,
    pub font_weight: u16,
    /// Line height in layout units (font size × multiplier).
    pub line_height: f32,
    pub letter_spacing: f32,
    pub text_align: TextAlign,
    pub width: Option<f32>,
    pub max_width: Option<f32>,
    pub margin: Edges,
    pub padding: Edges,
    pub border_bottom_width: f32,
    pub background_gradient: bool,
    pub break_inside: BreakRule,
    pub break_before: BreakRule,
    pub break_after: BreakRule,
    pub orphans: u8,
    pub widows: u8,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            position: Position::Static,
            has_transform: false,
            font_family: FontFamily::Inter,
            font_size: DEFAULT_FONT_SIZE,
            font_weight: 400,
            line_height: DEFAULT_FONT_SIZE * DEFAULT_LINE_HEIGHT,
            letter_spacing: 0.0,
            text_align: TextAlign::Left,
            width: None,
            max_width: None,
            margin: Edges::default(),
            padding: Edges::default(),
            border_bottom_width: 0.0,
            background_gradient: false,
            break_inside: BreakRule::Auto,
            break_before: BreakRule::Auto,
            break_after: BreakRule::Auto,
            orphans: 2,
            widows: 2,
        }
    }
}

impl ComputedStyle {
    /// Resolves a declared (already cascaded) style against the parent's computed style.
    ///
    /// Font properties, text alignment and letter spacing inherit; box properties do not.
    pub fn resolve(parent: Option<&ComputedStyle>, declared: &NodeStyle) -> Self {
        let initial = ComputedStyle::default();
        let inherited = parent.unwrap_or(&initial);

        let font_size = declared.font_size.unwrap_or(inherited.font_size);
        let line_height = match declared.line_height {
            Some(multiplier) => font_size * multiplier,
            // Inherited multipliers scale with the child's own font size.
            None => font_size * (inherited.line_height / inherited.font_size.max(f32::EPSILON)),
        };

        Self {
            display: declared.display.unwrap_or_default(),
            flex_direction: declared.flex_direction.unwrap_or_default(),
            position: declared.position.unwrap_or_default(),
            has_transform: declared
                .transform
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty() && t.trim() != "none"),
            font_family: declared.font_family.unwrap_or(inherited.font_family),
            font_size,
            font_weight: declared.font_weight.unwrap_or(inherited.font_weight),
            line_height,
            letter_spacing: declared.letter_spacing.unwrap_or(inherited.letter_spacing),
            text_align: declared.text_align.unwrap_or(inherited.text_align),
            width: declared.width,
            max_width: declared.max_width,
            margin: declared.margin.resolve(),
            padding: declared.padding.resolve(),
            border_bottom_width: declared.border_bottom_width.unwrap_or(0.0),
            background_gradient: declared.background_gradient.unwrap_or(false),
            break_inside: declared.break_inside.unwrap_or_default(),
            break_before: declared.break_before.unwrap_or_default(),
            break_after: declared.break_after.unwrap_or_default(),
            orphans: declared.orphans.unwrap_or(inherited.orphans),
            widows: declared.widows.unwrap_or(inherited.widows),
        }
    }

    /// Layout-affecting styling: transforms, out-of-flow positioning, grid or flex.
    pub fn is_layout_affecting(&self) -> bool {
        self.has_transform
            || matches!(self.position, Position::Absolute | Position::Fixed)
            || matches!(self.display, Display::Grid | Display::Flex)
    }
}
