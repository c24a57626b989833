// Page fitting: classify the template, analyse the content, search for the render
// scale that keeps text away from page boundaries.
// Measurement runs on offscreen clones; nothing here mutates the live document.

pub mod analyzer;
pub mod classifier;
pub mod detector;
pub mod page;
pub mod scoring;
pub mod search;
pub mod templates;

pub use search::SearchTuning;
