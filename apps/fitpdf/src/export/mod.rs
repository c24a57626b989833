// Export: prepare the live document, pick a scale, paginate and write the PDF.
// The converter sits behind `DocumentConverter`; the exporter owns the run order,
// the conversion timeout and the one-shot fallback.

pub mod cache;
pub mod converter;
pub mod exporter;
pub mod handlers;
pub mod pdf;
pub mod prepare;

pub use cache::ExportCache;
pub use exporter::{EngineTuning, ExportError, Exporter};
pub use pdf::PdfConverter;
