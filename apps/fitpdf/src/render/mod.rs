// Render tree model: the styled content tree handed over by the presentation layer.
// Nodes live in an arena; measurement happens on disposable clones attached to a
// `Document` and released by RAII guards.

pub mod document;
pub mod selector;
pub mod style;
pub mod tree;
