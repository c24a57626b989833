//! Physical page geometry and the layout-unit ↔ millimetre conversion.
//!
//! Layout units are typographic points at scale 1.0, so one unit rendered at
//! `scale` occupies `scale × PX_TO_MM` millimetres on paper.

use serde::{Deserialize, Serialize};

/// Millimetres per layout unit at scale 1.0.
pub const PX_TO_MM: f32 = 0.352778;

/// Converts a local (layout-unit) length at `scale` into millimetres.
pub fn units_to_mm(units: f32, scale: f32) -> f32 {
    units * scale * PX_TO_MM
}

/// Converts a physical length into local layout units at `scale`.
pub fn mm_to_units(mm: f32, scale: f32) -> f32 {
    mm / (scale * PX_TO_MM)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
}

impl PageFormat {
    /// Portrait (width, height) in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            PageFormat::A4 => (210.0, 297.0),
            PageFormat::Letter => (215.9, 279.4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    /// From a `[top, right, bottom, left]` array.
    pub const fn from_trbl(values: [f32; 4]) -> Self {
        Self {
            top: values[0],
            right: values[1],
            bottom: values[2],
            left: values[3],
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageGeometry {
    pub fn new(format: PageFormat, orientation: Orientation) -> Self {
        let (w, h) = format.dimensions_mm();
        match orientation {
            Orientation::Portrait => Self {
                width_mm: w,
                height_mm: h,
            },
            Orientation::Landscape => Self {
                width_mm: h,
                height_mm: w,
            },
        }
    }

    pub fn a4() -> Self {
        Self::new(PageFormat::A4, Orientation::Portrait)
    }

    /// Printable width once `margins` are taken off. Never below 1mm.
    pub fn content_width_mm(&self, margins: &Margins) -> f32 {
        (self.width_mm - margins.horizontal()).max(1.0)
    }

    /// Printable height once `margins` are taken off. Never below 1mm.
    pub fn content_height_mm(&self, margins: &Margins) -> f32 {
        (self.height_mm - margins.vertical()).max(1.0)
    }

    /// Viewport width, in layout units, that fills the printable width at `scale`.
    pub fn viewport_width(&self, margins: &Margins, scale: f32) -> f32 {
        mm_to_units(self.content_width_mm(margins), scale)
    }
}
