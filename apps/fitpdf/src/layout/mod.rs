// Layout: font metrics and the block-flow engine that measures render trees.
// Layout is CPU-bound; async callers run it inside tokio::task::spawn_blocking
// or on an offscreen clone they own.

pub mod flow;
pub mod font_metrics;

// Re-export the public API consumed by the fitting and export modules.
pub use flow::{FlowLayout, LayoutEngine, LayoutError};
