//! Static per-archetype template configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fitting::page::Margins;
use crate::layout::font_metrics::FontFamily;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// The five resume layout archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    #[default]
    Modern,
    Classic,
    Minimalist,
    Executive,
    Creative,
}

impl Archetype {
    #[cfg(test)]
    pub const ALL: [Archetype; 5] = [
        Archetype::Modern,
        Archetype::Classic,
        Archetype::Minimalist,
        Archetype::Executive,
        Archetype::Creative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Modern => "modern",
            Archetype::Classic => "classic",
            Archetype::Minimalist => "minimalist",
            Archetype::Executive => "executive",
            Archetype::Creative => "creative",
        }
    }

    /// Body typeface the template renders with when a node declares none.
    pub fn default_font(&self) -> FontFamily {
        match self {
            Archetype::Modern => FontFamily::Inter,
            Archetype::Classic => FontFamily::EbGaramond,
            Archetype::Minimalist => FontFamily::Lato,
            Archetype::Executive => FontFamily::ComputerModern,
            Archetype::Creative => FontFamily::Oswald,
        }
    }

    pub fn config(&self) -> &'static TemplateConfig {
        match self {
            Archetype::Modern => &MODERN,
            Archetype::Classic => &CLASSIC,
            Archetype::Minimalist => &MINIMALIST,
            Archetype::Executive => &EXECUTIVE,
            Archetype::Creative => &CREATIVE,
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How eagerly the converter is told to keep content away from page breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBreakPolicy {
    Aggressive,
    Moderate,
    Conservative,
}

impl PageBreakPolicy {
    /// Selectors the converter must not split, most specific first.
    pub fn avoid_selectors(&self) -> &'static [&'static str] {
        match self {
            PageBreakPolicy::Aggressive => &[
                ".page-break-avoid",
                ".section",
                ".experience-item",
                ".education-item",
                ".skill-item",
                ".sidebar",
                ".main-content",
                "p",
                "li",
                "span",
                "div",
                "h1",
                "h2",
                "h3",
                "h4",
                "h5",
                "h6",
            ],
            PageBreakPolicy::Moderate => &[
                ".page-break-avoid",
                ".section",
                ".experience-item",
                ".education-item",
                "h1",
                "h2",
                "h3",
                "p",
                "li",
            ],
            PageBreakPolicy::Conservative => &[".page-break-avoid", ".section", "h1", "h2"],
        }
    }
}

/// Immutable per-archetype configuration. Scales are unitless render scales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateConfig {
    pub archetype: Archetype,
    pub name: &'static str,
    pub preferred_scale: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub page_break_policy: PageBreakPolicy,
    /// Spacing added below each section, in millimetres.
    pub section_padding_mm: f32,
    /// Template margins in millimetres.
    pub margins: Margins,
    pub specific_selectors: &'static [&'static str],
}

impl TemplateConfig {
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    pub fn contains_scale(&self, scale: f32) -> bool {
        scale >= self.min_scale - SCALE_EPSILON && scale <= self.max_scale + SCALE_EPSILON
    }
}

/// Tolerance for range checks on computed scales.
pub const SCALE_EPSILON: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Static table
// ────────────────────────────────────────────────────────────────────────────

pub static MODERN: TemplateConfig = TemplateConfig {
    archetype: Archetype::Modern,
    name: "Modern",
    preferred_scale: 0.24,
    min_scale: 0.12,
    max_scale: 0.30,
    page_break_policy: PageBreakPolicy::Aggressive,
    section_padding_mm: 8.0,
    margins: Margins::from_trbl([0.0, 15.0, 0.0, 15.0]),
    specific_selectors: &[".sidebar", ".main-content", ".experience-item", ".skill-item"],
};

pub static CLASSIC: TemplateConfig = TemplateConfig {
    archetype: Archetype::Classic,
    name: "Classic",
    preferred_scale: 0.28,
    min_scale: 0.15,
    max_scale: 0.36,
    page_break_policy: PageBreakPolicy::Moderate,
    section_padding_mm: 6.0,
    margins: Margins::from_trbl([0.0, 18.0, 0.0, 18.0]),
    specific_selectors: &[".experience-item", ".education-item", ".skills-section"],
};

pub static MINIMALIST: TemplateConfig = TemplateConfig {
    archetype: Archetype::Minimalist,
    name: "Minimalist",
    preferred_scale: 0.30,
    min_scale: 0.17,
    max_scale: 0.40,
    page_break_policy: PageBreakPolicy::Conservative,
    section_padding_mm: 4.0,
    margins: Margins::from_trbl([0.0, 20.0, 0.0, 20.0]),
    specific_selectors: &[".space-y-8 > div", ".space-y-6 > div"],
};

pub static EXECUTIVE: TemplateConfig = TemplateConfig {
    archetype: Archetype::Executive,
    name: "Executive",
    preferred_scale: 0.26,
    min_scale: 0.13,
    max_scale: 0.33,
    page_break_policy: PageBreakPolicy::Aggressive,
    section_padding_mm: 10.0,
    margins: Margins::from_trbl([0.0, 16.0, 0.0, 16.0]),
    specific_selectors: &[".profile-section", ".experience-section", ".metrics-section"],
};

pub static CREATIVE: TemplateConfig = TemplateConfig {
    archetype: Archetype::Creative,
    name: "Creative",
    preferred_scale: 0.22,
    min_scale: 0.11,
    max_scale: 0.28,
    page_break_policy: PageBreakPolicy::Aggressive,
    section_padding_mm: 12.0,
    margins: Margins::from_trbl([0.0, 14.0, 0.0, 14.0]),
    specific_selectors: &[".creative-header", ".portfolio-section", ".skills-badges"],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::selector::Selector;

    #[test]
    fn test_every_config_has_ordered_scale_range() {
        for archetype in Archetype::ALL {
            let config = archetype.config();
            assert_eq!(config.archetype, archetype);
            assert!(config.min_scale < config.preferred_scale);
            assert!(config.preferred_scale < config.max_scale);
            assert!(config.contains_scale(config.preferred_scale));
        }
    }

    #[test]
    fn test_all_static_selectors_parse() {
        for archetype in Archetype::ALL {
            let config = archetype.config();
            for selector in config.specific_selectors {
                assert!(Selector::parse(selector).is_ok(), "bad selector {selector}");
            }
            for selector in config.page_break_policy.avoid_selectors() {
                assert!(Selector::parse(selector).is_ok(), "bad selector {selector}");
            }
        }
    }

    #[test]
    fn test_clamp_scale() {
        assert_eq!(MODERN.clamp_scale(0.5), 0.30);
        assert_eq!(MODERN.clamp_scale(0.01), 0.12);
        assert_eq!(MODERN.clamp_scale(0.2), 0.2);
    }
}
