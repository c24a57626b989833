//! Text-splitting / page-break detector.
//!
//! Works on an offscreen clone laid out for a candidate scale. Page boundaries are
//! projected back into the clone's local units; every analysed section near a
//! boundary earns violations weighted by its break sensitivity and by how close it
//! sits to the cut, and critical text elements near a cut add a flat penalty.
//!
//! Read-only: attaching and detaching the clone is the caller's job.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fitting::analyzer::ContentAnalysis;
use crate::fitting::page::{mm_to_units, units_to_mm};
use crate::render::selector::Selector;
use crate::render::tree::{NodeId, RenderTree};

/// Half-width of the danger zone around each page boundary, in millimetres.
pub const DANGER_ZONE_MM: f32 = 15.0;
/// Critical elements are checked against a zone this many times wider.
pub const CRITICAL_ZONE_FACTOR: f32 = 1.5;
pub const CRITICAL_SELECTORS: &str =
    "h1, h2, h3, h4, h5, h6, p, li, .job-title, .company-name, .skill-name";

/// Layouts needing more pages than this are rejected instead of measured.
pub const MAX_PAGES: u32 = 300;

const CRITICAL_PENALTY: u32 = 8;
/// Weighted proximities at or below this are noise.
const MIN_WEIGHT: f32 = 0.05;
const WEIGHT_MULTIPLIER: f32 = 15.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitReport {
    pub pages: u32,
    pub violations: u32,
    pub has_text_splitting: bool,
    /// Offending nodes in detection order, without duplicates.
    pub problematic: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("layout needs {pages} pages, limit is {MAX_PAGES}")]
pub struct PageLimitExceeded {
    pub pages: u64,
}

/// Pages needed for `height_units` of content rendered at `scale`. Always at least 1.
pub fn page_count(height_units: f32, scale: f32, page_height_mm: f32) -> u32 {
    let pages = (units_to_mm(height_units, scale) / page_height_mm).ceil();
    if pages.is_finite() && pages > 1.0 {
        pages as u32
    } else {
        1
    }
}

/// `page_count`, rejected above `MAX_PAGES`.
pub fn checked_page_count(
    height_units: f32,
    scale: f32,
    page_height_mm: f32,
) -> Result<u32, PageLimitExceeded> {
    let pages = page_count(height_units, scale, page_height_mm);
    if pages > MAX_PAGES {
        return Err(PageLimitExceeded {
            pages: u64::from(pages),
        });
    }
    Ok(pages)
}

/// Internal page boundaries in local units: `i × page_height / (scale × PX_TO_MM)`
/// for `i` in `1..pages`. Never more than `MAX_PAGES - 1` of them.
pub fn page_breaks(pages: u32, scale: f32, page_height_mm: f32) -> Vec<f32> {
    (1..pages.min(MAX_PAGES))
        .map(|i| mm_to_units(i as f32 * page_height_mm, scale))
        .collect()
}

pub fn detect_text_splitting(
    tree: &RenderTree,
    scale: f32,
    page_height_mm: f32,
    analysis: &ContentAnalysis,
) -> Result<SplitReport, PageLimitExceeded> {
    let root_box = &tree.node(tree.root()).layout;
    let pages = checked_page_count(root_box.height, scale, page_height_mm)?;
    if pages <= 1 {
        return Ok(SplitReport {
            pages,
            ..Default::default()
        });
    }

    let origin = root_box.y;
    let breaks = page_breaks(pages, scale, page_height_mm);
    let zone = mm_to_units(DANGER_ZONE_MM, scale);
    let critical_zone = zone * CRITICAL_ZONE_FACTOR;

    let mut violations = 0u32;
    let mut problematic = Vec::new();
    let mut seen = HashSet::new();
    let mut flag = |id: NodeId, problematic: &mut Vec<NodeId>| {
        if seen.insert(id) {
            problematic.push(id);
        }
    };

    for section in &analysis.sections {
        if section.node.0 >= tree.len() || tree.is_hidden(section.node) {
            continue;
        }
        let layout = &tree.node(section.node).layout;
        let top = layout.y - origin;
        let bottom = layout.bottom() - origin;

        for boundary in &breaks {
            let Some(proximity) = boundary_proximity(top, bottom, *boundary, zone) else {
                continue;
            };
            let weighted = section.break_sensitivity * proximity;
            if weighted > MIN_WEIGHT {
                violations += (weighted * WEIGHT_MULTIPLIER).ceil() as u32;
                flag(section.node, &mut problematic);
            }
        }
    }

    if let Ok(critical) = Selector::parse(CRITICAL_SELECTORS) {
        for id in tree.select(tree.root(), &critical) {
            if !tree.children(id).is_empty() || tree.is_hidden(id) {
                continue;
            }
            let layout = &tree.node(id).layout;
            if layout.height <= 0.0 {
                continue;
            }
            let top = layout.y - origin;
            let bottom = layout.bottom() - origin;
            for boundary in &breaks {
                if top < boundary + critical_zone && bottom > boundary - critical_zone {
                    violations += CRITICAL_PENALTY;
                    flag(id, &mut problematic);
                }
            }
        }
    }

    Ok(SplitReport {
        pages,
        violations,
        has_text_splitting: violations > 0,
        problematic,
    })
}

/// 1 when the extent straddles `boundary`, otherwise linear decay from 1 at the
/// boundary to 0 at the zone edge for whichever edge is closer. `None` outside the zone.
fn boundary_proximity(top: f32, bottom: f32, boundary: f32, zone: f32) -> Option<f32> {
    if top < boundary && bottom > boundary {
        return Some(1.0);
    }
    let distance = (top - boundary).abs().min((bottom - boundary).abs());
    (distance <= zone).then(|| 1.0 - distance / zone)
}
